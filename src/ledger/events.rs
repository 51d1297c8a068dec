//! Event journal and the credit/debit primitives.
//!
//! Every state mutation appends a row to `messages` in emission order;
//! that order is consensus-observable output, equal across replays.

use crate::config::BTC;
use crate::errors::{AppResult, LedgerError};
use crate::ledger::balances::get_balance;
use rusqlite::{params, Connection};
use serde_json::json;
use tracing::debug;

/// Append one journal entry.
pub fn record_event(
    db: &Connection,
    block_index: u32,
    command: &str,
    category: &str,
    bindings: &serde_json::Value,
    tx_index: Option<u32>,
    tx_hash: Option<&str>,
    event: &str,
) -> AppResult<()> {
    let mut stmt = db.prepare_cached(
        "INSERT INTO messages (block_index, command, category, bindings, tx_index, tx_hash, event) \
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
    )?;
    stmt.execute(params![
        block_index,
        command,
        category,
        bindings.to_string(),
        tx_index,
        tx_hash,
        event
    ])?;
    Ok(())
}

/// Add `quantity` of `asset` to `address`.
///
/// Rejects negative quantities and balance overflow; BTC never has a
/// ledger balance.
#[allow(clippy::too_many_arguments)]
pub fn credit(
    db: &Connection,
    block_index: u32,
    address: &str,
    asset: &str,
    quantity: i64,
    tx_index: u32,
    action: &str,
    event: &str,
) -> Result<(), LedgerError> {
    if asset == BTC {
        return Err(LedgerError::AssetName(BTC.to_string()));
    }
    if quantity < 0 {
        return Err(LedgerError::NegativeQuantity);
    }

    let balance = get_balance(db, address, asset)?.unwrap_or(0);
    let new_balance = balance
        .checked_add(quantity)
        .ok_or(LedgerError::IntegerOverflow)?;

    set_balance(db, address, asset, new_balance)?;

    let mut stmt = db.prepare_cached(
        "INSERT INTO credits (block_index, address, asset, quantity, calling_function, event, tx_index) \
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
    )?;
    stmt.execute(params![block_index, address, asset, quantity, action, event, tx_index])?;

    let bindings = json!({
        "block_index": block_index,
        "address": address,
        "asset": asset,
        "quantity": quantity,
        "calling_function": action,
        "event": event,
        "tx_index": tx_index,
    });
    record_event(
        db,
        block_index,
        "insert",
        "credits",
        &bindings,
        Some(tx_index),
        Some(event),
        "CREDIT",
    )?;

    debug!("Credit {} {} to {} [{}]", quantity, asset, address, action);
    Ok(())
}

/// Remove `quantity` of `asset` from `address`; fails with
/// [`LedgerError::InsufficientFunds`] rather than going negative.
#[allow(clippy::too_many_arguments)]
pub fn debit(
    db: &Connection,
    block_index: u32,
    address: &str,
    asset: &str,
    quantity: i64,
    tx_index: u32,
    action: &str,
    event: &str,
) -> Result<(), LedgerError> {
    if asset == BTC {
        return Err(LedgerError::AssetName(BTC.to_string()));
    }
    if quantity < 0 {
        return Err(LedgerError::NegativeQuantity);
    }

    let balance = get_balance(db, address, asset)?.unwrap_or(0);
    if balance < quantity {
        return Err(LedgerError::InsufficientFunds);
    }

    set_balance(db, address, asset, balance - quantity)?;

    let mut stmt = db.prepare_cached(
        "INSERT INTO debits (block_index, address, asset, quantity, action, event, tx_index) \
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
    )?;
    stmt.execute(params![block_index, address, asset, quantity, action, event, tx_index])?;

    let bindings = json!({
        "block_index": block_index,
        "address": address,
        "asset": asset,
        "quantity": quantity,
        "action": action,
        "event": event,
        "tx_index": tx_index,
    });
    record_event(
        db,
        block_index,
        "insert",
        "debits",
        &bindings,
        Some(tx_index),
        Some(event),
        "DEBIT",
    )?;

    debug!("Debit {} {} from {} [{}]", quantity, asset, address, action);
    Ok(())
}

fn set_balance(
    db: &Connection,
    address: &str,
    asset: &str,
    quantity: i64,
) -> Result<(), LedgerError> {
    let mut stmt = db
        .prepare_cached(
            "INSERT INTO balances (address, asset, quantity) VALUES (?1, ?2, ?3) \
             ON CONFLICT (address, asset) DO UPDATE SET quantity = excluded.quantity",
        )
        .map_err(LedgerError::Database)?;
    stmt.execute(params![address, asset, quantity])
        .map_err(LedgerError::Database)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::Database;

    #[test]
    fn test_credit_then_debit() {
        let db = Database::in_memory().unwrap();
        let conn = db.connection();

        credit(conn, 100, "a", "XCP", 1_000, 1, "test credit", "hash1").unwrap();
        debit(conn, 100, "a", "XCP", 400, 2, "test debit", "hash2").unwrap();

        assert_eq!(get_balance(conn, "a", "XCP").unwrap(), Some(600));
    }

    #[test]
    fn test_debit_insufficient_funds() {
        let db = Database::in_memory().unwrap();
        let conn = db.connection();

        credit(conn, 100, "a", "XCP", 10, 1, "test", "h").unwrap();
        let result = debit(conn, 100, "a", "XCP", 11, 2, "test", "h");
        assert!(matches!(result, Err(LedgerError::InsufficientFunds)));
        // failed debit leaves the balance untouched
        assert_eq!(get_balance(conn, "a", "XCP").unwrap(), Some(10));
    }

    #[test]
    fn test_negative_quantity_rejected() {
        let db = Database::in_memory().unwrap();
        let conn = db.connection();
        assert!(matches!(
            credit(conn, 1, "a", "XCP", -1, 1, "t", "h"),
            Err(LedgerError::NegativeQuantity)
        ));
        assert!(matches!(
            debit(conn, 1, "a", "XCP", -1, 1, "t", "h"),
            Err(LedgerError::NegativeQuantity)
        ));
    }

    #[test]
    fn test_credit_overflow_detected() {
        let db = Database::in_memory().unwrap();
        let conn = db.connection();
        credit(conn, 1, "a", "XCP", i64::MAX, 1, "t", "h").unwrap();
        assert!(matches!(
            credit(conn, 1, "a", "XCP", 1, 2, "t", "h"),
            Err(LedgerError::IntegerOverflow)
        ));
    }

    #[test]
    fn test_btc_has_no_ledger_balance() {
        let db = Database::in_memory().unwrap();
        assert!(credit(db.connection(), 1, "a", "BTC", 1, 1, "t", "h").is_err());
    }

    #[test]
    fn test_journal_order_matches_emission() {
        let db = Database::in_memory().unwrap();
        let conn = db.connection();
        credit(conn, 1, "a", "XCP", 5, 1, "first", "h1").unwrap();
        debit(conn, 1, "a", "XCP", 2, 2, "second", "h2").unwrap();

        let events: Vec<String> = conn
            .prepare("SELECT event FROM messages ORDER BY message_index")
            .unwrap()
            .query_map([], |row| row.get(0))
            .unwrap()
            .collect::<Result<_, _>>()
            .unwrap();
        assert_eq!(events, vec!["CREDIT".to_string(), "DEBIT".to_string()]);
    }
}
