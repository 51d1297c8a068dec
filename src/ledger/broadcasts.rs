//! Broadcast (feed) queries and writes.

use crate::database::helpers::{broadcast_from_row, BROADCAST_SELECT_COLUMNS};
use crate::errors::AppResult;
use crate::ledger::events::record_event;
use crate::types::Broadcast;
use rusqlite::{params, Connection};

/// All broadcasts by `source` with the given status, feed order.
pub fn get_broadcasts_by_source(
    db: &Connection,
    source: &str,
    status: &str,
) -> AppResult<Vec<Broadcast>> {
    let sql = format!(
        "SELECT {BROADCAST_SELECT_COLUMNS} FROM broadcasts \
         WHERE source = ?1 AND status = ?2 ORDER BY tx_index ASC"
    );
    let mut stmt = db.prepare_cached(&sql)?;
    let broadcasts = stmt
        .query_map(params![source, status], broadcast_from_row)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(broadcasts)
}

/// Latest valid broadcast of a feed, if any.
pub fn get_last_broadcast(db: &Connection, source: &str) -> AppResult<Option<Broadcast>> {
    let broadcasts = get_broadcasts_by_source(db, source, "valid")?;
    Ok(broadcasts.into_iter().last())
}

/// Insert a broadcast row and journal it.
pub fn insert_broadcast(db: &Connection, broadcast: &Broadcast) -> AppResult<()> {
    let mut stmt = db.prepare_cached(
        "INSERT INTO broadcasts (tx_index, tx_hash, block_index, source, timestamp, value, \
         fee_fraction_int, text, mime_type, locked, status) \
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
    )?;
    stmt.execute(params![
        broadcast.tx_index,
        broadcast.tx_hash,
        broadcast.block_index,
        broadcast.source,
        broadcast.timestamp,
        broadcast.value,
        broadcast.fee_fraction_int,
        broadcast.text,
        broadcast.mime_type,
        broadcast.locked,
        broadcast.status,
    ])?;

    let bindings = serde_json::to_value(broadcast)?;
    record_event(
        db,
        broadcast.block_index,
        "insert",
        "broadcasts",
        &bindings,
        Some(broadcast.tx_index),
        Some(&broadcast.tx_hash),
        "BROADCAST",
    )
}

/// Last oracle price of a feed, as seen strictly before `block_index`.
#[derive(Debug, Clone, PartialEq)]
pub struct OraclePrice {
    pub last_price: f64,
    pub last_fee: i64,
    pub fiat_label: String,
    pub last_updated: u32,
}

/// `None` when the oracle has never broadcast a priced message before the
/// given height (a lock row does not count: it carries no value).
pub fn get_oracle_last_price(
    db: &Connection,
    oracle_address: &str,
    block_index: u32,
) -> AppResult<Option<OraclePrice>> {
    let sql = format!(
        "SELECT {BROADCAST_SELECT_COLUMNS} FROM broadcasts \
         WHERE source = ?1 AND status = 'valid' AND block_index < ?2 \
         ORDER BY tx_index DESC LIMIT 1"
    );
    let mut stmt = db.prepare_cached(&sql)?;
    let mut rows = stmt.query_map(params![oracle_address, block_index], broadcast_from_row)?;

    let Some(broadcast) = rows.next().transpose()? else {
        return Ok(None);
    };
    let (Some(last_price), Some(last_fee)) = (broadcast.value, broadcast.fee_fraction_int) else {
        return Ok(None);
    };

    // Oracle feeds label their fiat pair as "<price>-<label>" text
    let fiat_label = broadcast
        .text
        .as_deref()
        .and_then(|text| {
            let parts: Vec<&str> = text.split('-').collect();
            (parts.len() == 2).then(|| parts[1].to_string())
        })
        .unwrap_or_default();

    Ok(Some(OraclePrice {
        last_price,
        last_fee,
        fiat_label,
        last_updated: broadcast.block_index,
    }))
}
