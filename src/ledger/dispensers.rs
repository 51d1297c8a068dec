//! Dispenser store operations.

use crate::errors::AppResult;
use crate::database::helpers::{dispenser_from_row, DISPENSER_SELECT_COLUMNS};
use crate::ledger::events::record_event;
use crate::types::{Dispenser, DispenserStatus};
use rusqlite::{params, params_from_iter, Connection};
use serde_json::json;
use std::collections::HashSet;

/// Filter for [`get_dispensers`]. Empty fields match everything.
#[derive(Debug, Clone, Default)]
pub struct DispenserFilter {
    pub address: Option<String>,
    pub asset: Option<String>,
    pub status_in: Vec<i64>,
    pub origin: Option<String>,
}

impl DispenserFilter {
    pub fn at(address: &str) -> Self {
        Self {
            address: Some(address.to_string()),
            ..Self::default()
        }
    }

    pub fn asset(mut self, asset: &str) -> Self {
        self.asset = Some(asset.to_string());
        self
    }

    pub fn status(mut self, status: DispenserStatus) -> Self {
        self.status_in = vec![status.id()];
        self
    }

    /// Open or Closing, the two states a payment can still hit.
    pub fn live(mut self) -> Self {
        self.status_in = vec![DispenserStatus::Open.id(), DispenserStatus::Closing.id()];
        self
    }

    pub fn origin(mut self, origin: &str) -> Self {
        self.origin = Some(origin.to_string());
        self
    }
}

/// Dispensers matching the filter, ordered by asset then tx_index so every
/// replay walks them identically.
pub fn get_dispensers(db: &Connection, filter: &DispenserFilter) -> AppResult<Vec<Dispenser>> {
    let mut sql = format!("SELECT {DISPENSER_SELECT_COLUMNS} FROM dispensers WHERE 1 = 1");
    let mut values: Vec<Box<dyn rusqlite::ToSql>> = Vec::new();

    if let Some(address) = &filter.address {
        sql.push_str(&format!(" AND source = ?{}", values.len() + 1));
        values.push(Box::new(address.clone()));
    }
    if let Some(asset) = &filter.asset {
        sql.push_str(&format!(" AND asset = ?{}", values.len() + 1));
        values.push(Box::new(asset.clone()));
    }
    if !filter.status_in.is_empty() {
        let placeholders: Vec<String> = filter
            .status_in
            .iter()
            .enumerate()
            .map(|(i, _)| format!("?{}", values.len() + i + 1))
            .collect();
        sql.push_str(&format!(" AND status IN ({})", placeholders.join(", ")));
        for status in &filter.status_in {
            values.push(Box::new(*status));
        }
    }
    if let Some(origin) = &filter.origin {
        sql.push_str(&format!(" AND origin = ?{}", values.len() + 1));
        values.push(Box::new(origin.clone()));
    }
    sql.push_str(" ORDER BY asset ASC, tx_index ASC");

    let mut stmt = db.prepare(&sql)?;
    let dispensers = stmt
        .query_map(params_from_iter(values.iter()), dispenser_from_row)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(dispensers)
}

/// Count of dispensers at `source` with `status` opened by `origin`.
pub fn get_dispensers_count(
    db: &Connection,
    source: &str,
    status: DispenserStatus,
    origin: &str,
) -> AppResult<i64> {
    let count = db.query_row(
        "SELECT COUNT(*) FROM dispensers WHERE source = ?1 AND status = ?2 AND origin = ?3",
        params![source, status.id(), origin],
        |row| row.get(0),
    )?;
    Ok(count)
}

/// Refills recorded against one dispenser.
pub fn get_refilling_count(db: &Connection, dispenser_tx_hash: &str) -> AppResult<i64> {
    let count = db.query_row(
        "SELECT COUNT(*) FROM dispenser_refills WHERE dispenser_tx_hash = ?1",
        params![dispenser_tx_hash],
        |row| row.get(0),
    )?;
    Ok(count)
}

/// Closing dispensers whose delay has elapsed at `block_index`.
pub fn get_pending_dispensers(db: &Connection, block_index: u32) -> AppResult<Vec<Dispenser>> {
    let sql = format!(
        "SELECT {DISPENSER_SELECT_COLUMNS} FROM dispensers \
         WHERE status = ?1 AND close_block_index <= ?2 ORDER BY asset ASC, tx_index ASC"
    );
    let mut stmt = db.prepare_cached(&sql)?;
    let dispensers = stmt
        .query_map(
            params![DispenserStatus::Closing.id(), block_index],
            dispenser_from_row,
        )?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(dispensers)
}

/// Every address that hosts or ever hosted a dispenser; seeds the
/// dispensable cache at startup.
pub fn get_all_dispensables(db: &Connection) -> AppResult<HashSet<String>> {
    let mut stmt = db.prepare("SELECT DISTINCT source FROM dispensers")?;
    let addresses = stmt
        .query_map([], |row| row.get(0))?
        .collect::<Result<HashSet<String>, _>>()?;
    Ok(addresses)
}

/// Insert a dispenser row and journal `OPEN_DISPENSER`.
pub fn insert_dispenser(db: &Connection, dispenser: &Dispenser) -> AppResult<()> {
    let mut stmt = db.prepare_cached(
        "INSERT INTO dispensers (tx_index, tx_hash, block_index, source, asset, give_quantity, \
         escrow_quantity, satoshirate, status, give_remaining, oracle_address, origin, \
         dispense_count, close_block_index, last_status_tx_hash, last_status_tx_source) \
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16)",
    )?;
    stmt.execute(params![
        dispenser.tx_index,
        dispenser.tx_hash,
        dispenser.block_index,
        dispenser.source,
        dispenser.asset,
        dispenser.give_quantity,
        dispenser.escrow_quantity,
        dispenser.satoshirate,
        dispenser.status,
        dispenser.give_remaining,
        dispenser.oracle_address,
        dispenser.origin,
        dispenser.dispense_count,
        dispenser.close_block_index,
        dispenser.last_status_tx_hash,
        dispenser.last_status_tx_source,
    ])?;
    record_event(
        db,
        dispenser.block_index,
        "insert",
        "dispensers",
        &serde_json::to_value(dispenser)?,
        Some(dispenser.tx_index),
        Some(&dispenser.tx_hash),
        "OPEN_DISPENSER",
    )
}

/// Field updates applied by refill, close and dispense transitions.
#[derive(Debug, Clone, Default)]
pub struct DispenserUpdate {
    pub give_remaining: Option<i64>,
    pub status: Option<DispenserStatus>,
    pub dispense_count: Option<i64>,
    pub close_block_index: Option<u32>,
    pub last_status_tx_hash: Option<String>,
    pub last_status_tx_source: Option<String>,
}

/// Apply an update to the dispenser identified by `tx_hash` and journal
/// `DISPENSER_UPDATE`.
pub fn update_dispenser(
    db: &Connection,
    block_index: u32,
    tx_hash: &str,
    update: &DispenserUpdate,
) -> AppResult<()> {
    let mut sets = Vec::new();
    let mut values: Vec<Box<dyn rusqlite::ToSql>> = vec![Box::new(tx_hash.to_string())];
    let mut bindings = json!({ "tx_hash": tx_hash });

    if let Some(give_remaining) = update.give_remaining {
        values.push(Box::new(give_remaining));
        sets.push(format!("give_remaining = ?{}", values.len()));
        bindings["give_remaining"] = json!(give_remaining);
    }
    if let Some(status) = update.status {
        values.push(Box::new(status.id()));
        sets.push(format!("status = ?{}", values.len()));
        bindings["status"] = json!(status.id());
    }
    if let Some(dispense_count) = update.dispense_count {
        values.push(Box::new(dispense_count));
        sets.push(format!("dispense_count = ?{}", values.len()));
        bindings["dispense_count"] = json!(dispense_count);
    }
    if let Some(close_block_index) = update.close_block_index {
        values.push(Box::new(close_block_index));
        sets.push(format!("close_block_index = ?{}", values.len()));
        bindings["close_block_index"] = json!(close_block_index);
    }
    if let Some(last_status_tx_hash) = &update.last_status_tx_hash {
        values.push(Box::new(last_status_tx_hash.clone()));
        sets.push(format!("last_status_tx_hash = ?{}", values.len()));
        bindings["last_status_tx_hash"] = json!(last_status_tx_hash);
    }
    if let Some(last_status_tx_source) = &update.last_status_tx_source {
        values.push(Box::new(last_status_tx_source.clone()));
        sets.push(format!("last_status_tx_source = ?{}", values.len()));
        bindings["last_status_tx_source"] = json!(last_status_tx_source);
    }

    if sets.is_empty() {
        return Ok(());
    }

    let sql = format!(
        "UPDATE dispensers SET {} WHERE tx_hash = ?1",
        sets.join(", ")
    );
    db.execute(&sql, params_from_iter(values.iter()))?;

    record_event(
        db,
        block_index,
        "update",
        "dispensers",
        &bindings,
        None,
        Some(tx_hash),
        "DISPENSER_UPDATE",
    )
}

/// Record a refill into `dispenser_refills` and journal it.
#[allow(clippy::too_many_arguments)]
pub fn insert_refill(
    db: &Connection,
    tx_index: u32,
    tx_hash: &str,
    block_index: u32,
    source: &str,
    destination: &str,
    asset: &str,
    dispense_quantity: i64,
    dispenser_tx_hash: &str,
) -> AppResult<()> {
    let mut stmt = db.prepare_cached(
        "INSERT INTO dispenser_refills (tx_index, tx_hash, block_index, source, destination, \
         asset, dispense_quantity, dispenser_tx_hash) \
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
    )?;
    stmt.execute(params![
        tx_index,
        tx_hash,
        block_index,
        source,
        destination,
        asset,
        dispense_quantity,
        dispenser_tx_hash
    ])?;
    record_event(
        db,
        block_index,
        "insert",
        "dispenser_refills",
        &json!({
            "tx_index": tx_index,
            "tx_hash": tx_hash,
            "block_index": block_index,
            "source": source,
            "destination": destination,
            "asset": asset,
            "dispense_quantity": dispense_quantity,
            "dispenser_tx_hash": dispenser_tx_hash,
        }),
        Some(tx_index),
        Some(tx_hash),
        "REFILL_DISPENSER",
    )
}

/// Record a dispense into `dispenses` and journal it.
#[allow(clippy::too_many_arguments)]
pub fn insert_dispense(
    db: &Connection,
    tx_index: u32,
    dispense_index: u32,
    tx_hash: &str,
    block_index: u32,
    source: &str,
    destination: &str,
    asset: &str,
    dispense_quantity: i64,
    dispenser_tx_hash: &str,
    btc_amount: u64,
) -> AppResult<()> {
    let mut stmt = db.prepare_cached(
        "INSERT INTO dispenses (tx_index, dispense_index, tx_hash, block_index, source, \
         destination, asset, dispense_quantity, dispenser_tx_hash, btc_amount) \
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
    )?;
    stmt.execute(params![
        tx_index,
        dispense_index,
        tx_hash,
        block_index,
        source,
        destination,
        asset,
        dispense_quantity,
        dispenser_tx_hash,
        btc_amount as i64
    ])?;
    record_event(
        db,
        block_index,
        "insert",
        "dispenses",
        &json!({
            "tx_index": tx_index,
            "dispense_index": dispense_index,
            "tx_hash": tx_hash,
            "block_index": block_index,
            "source": source,
            "destination": destination,
            "asset": asset,
            "dispense_quantity": dispense_quantity,
            "dispenser_tx_hash": dispenser_tx_hash,
            "btc_amount": btc_amount,
        }),
        Some(tx_index),
        Some(tx_hash),
        "DISPENSE",
    )
}
