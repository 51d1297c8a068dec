//! Per-address option masks, set through `options ...` broadcasts.

use crate::errors::AppResult;
use crate::ledger::events::record_event;
use rusqlite::{params, Connection, OptionalExtension};
use serde_json::json;

/// Option mask for an address, if one was ever set.
pub fn get_address_options(db: &Connection, address: &str) -> AppResult<Option<i64>> {
    let options = db
        .query_row(
            "SELECT options FROM addresses WHERE address = ?1",
            params![address],
            |row| row.get(0),
        )
        .optional()?;
    Ok(options)
}

/// Create or update the option mask, journalling `NEW_ADDRESS_OPTIONS` on
/// first write and `ADDRESS_OPTIONS_UPDATE` afterwards.
pub fn upsert_address_options(
    db: &Connection,
    block_index: u32,
    address: &str,
    options: i64,
) -> AppResult<()> {
    let existing = get_address_options(db, address)?;
    let bindings = json!({
        "block_index": block_index,
        "address": address,
        "options": options,
    });

    match existing {
        None => {
            db.execute(
                "INSERT INTO addresses (address, options, block_index) VALUES (?1, ?2, ?3)",
                params![address, options, block_index],
            )?;
            record_event(
                db,
                block_index,
                "insert",
                "addresses",
                &bindings,
                None,
                None,
                "NEW_ADDRESS_OPTIONS",
            )
        }
        Some(_) => {
            db.execute(
                "UPDATE addresses SET options = ?2, block_index = ?3 WHERE address = ?1",
                params![address, options, block_index],
            )?;
            record_event(
                db,
                block_index,
                "update",
                "addresses",
                &bindings,
                None,
                None,
                "ADDRESS_OPTIONS_UPDATE",
            )
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::Database;

    #[test]
    fn test_insert_then_update() {
        let db = Database::in_memory().unwrap();
        let conn = db.connection();

        assert_eq!(get_address_options(conn, "a").unwrap(), None);
        upsert_address_options(conn, 100, "a", 1).unwrap();
        assert_eq!(get_address_options(conn, "a").unwrap(), Some(1));
        upsert_address_options(conn, 101, "a", 0).unwrap();
        assert_eq!(get_address_options(conn, "a").unwrap(), Some(0));

        let events: Vec<String> = conn
            .prepare("SELECT event FROM messages ORDER BY message_index")
            .unwrap()
            .query_map([], |row| row.get(0))
            .unwrap()
            .collect::<Result<_, _>>()
            .unwrap();
        assert_eq!(
            events,
            vec![
                "NEW_ADDRESS_OPTIONS".to_string(),
                "ADDRESS_OPTIONS_UPDATE".to_string()
            ]
        );
    }
}
