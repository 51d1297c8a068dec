//! Balance reads. Mutation goes exclusively through
//! [`events::credit`](crate::ledger::events::credit) and
//! [`events::debit`](crate::ledger::events::debit).

use crate::errors::AppResult;
use rusqlite::{params, Connection, OptionalExtension};

/// Balance of `(address, asset)`, or `None` when the address has never
/// touched the asset. A `Some(0)` row is meaningful: the empty-address
/// dispenser rule counts rows, not quantities.
pub fn get_balance(db: &Connection, address: &str, asset: &str) -> AppResult<Option<i64>> {
    let quantity = db
        .query_row(
            "SELECT quantity FROM balances WHERE address = ?1 AND asset = ?2",
            params![address, asset],
            |row| row.get(0),
        )
        .optional()?;
    Ok(quantity)
}

/// Number of balance rows for an address, zero-quantity rows included.
pub fn get_balances_count(db: &Connection, address: &str) -> AppResult<i64> {
    let count = db.query_row(
        "SELECT COUNT(*) FROM balances WHERE address = ?1",
        params![address],
        |row| row.get(0),
    )?;
    Ok(count)
}

/// Assets for which an address has a balance row.
pub fn get_address_assets(db: &Connection, address: &str) -> AppResult<Vec<String>> {
    let mut stmt = db.prepare_cached("SELECT asset FROM balances WHERE address = ?1")?;
    let assets = stmt
        .query_map(params![address], |row| row.get(0))?
        .collect::<Result<Vec<String>, _>>()?;
    Ok(assets)
}
