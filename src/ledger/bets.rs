//! Bet and bet-match store operations.
//!
//! Bets are matched by an engine outside the consensus core; the broadcast
//! engine settles, liquidates and cancels the matches recorded here.

use crate::config::XCP;
use crate::database::helpers::{
    bet_from_row, bet_match_from_row, BET_MATCH_SELECT_COLUMNS, BET_SELECT_COLUMNS,
};
use crate::errors::AppResult;
use crate::ledger::events::{credit, record_event};
use crate::types::{Bet, BetMatch, BetMatchResolution};
use rusqlite::{params, Connection};
use serde_json::json;
use tracing::info;

/// Bets on a feed with the given status.
pub fn get_bets_by_feed(db: &Connection, feed_address: &str, status: &str) -> AppResult<Vec<Bet>> {
    let sql = format!(
        "SELECT {BET_SELECT_COLUMNS} FROM bets \
         WHERE feed_address = ?1 AND status = ?2 ORDER BY tx_index ASC"
    );
    let mut stmt = db.prepare_cached(&sql)?;
    let bets = stmt
        .query_map(params![feed_address, status], bet_from_row)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(bets)
}

/// Pending matches on a feed in settlement order: `tx1_index` ascending,
/// then `tx0_index`. The order is consensus-observable.
pub fn get_pending_bet_matches(db: &Connection, feed_address: &str) -> AppResult<Vec<BetMatch>> {
    let sql = format!(
        "SELECT {BET_MATCH_SELECT_COLUMNS} FROM bet_matches \
         WHERE feed_address = ?1 AND status = 'pending' \
         ORDER BY tx1_index ASC, tx0_index ASC"
    );
    let mut stmt = db.prepare_cached(&sql)?;
    let matches = stmt
        .query_map(params![feed_address], bet_match_from_row)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(matches)
}

/// Insert an open bet (store surface for the external matching engine).
pub fn insert_bet(db: &Connection, bet: &Bet) -> AppResult<()> {
    let mut stmt = db.prepare_cached(
        "INSERT INTO bets (tx_index, tx_hash, block_index, source, feed_address, bet_type, \
         deadline, wager_quantity, wager_remaining, counterwager_quantity, \
         counterwager_remaining, target_value, leverage, expiration, expire_index, \
         fee_fraction_int, status) \
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17)",
    )?;
    stmt.execute(params![
        bet.tx_index,
        bet.tx_hash,
        bet.block_index,
        bet.source,
        bet.feed_address,
        bet.bet_type,
        bet.deadline,
        bet.wager_quantity,
        bet.wager_remaining,
        bet.counterwager_quantity,
        bet.counterwager_remaining,
        bet.target_value,
        bet.leverage,
        bet.expiration,
        bet.expire_index,
        bet.fee_fraction_int,
        bet.status,
    ])?;
    record_event(
        db,
        bet.block_index,
        "insert",
        "bets",
        &serde_json::to_value(bet)?,
        Some(bet.tx_index),
        Some(&bet.tx_hash),
        "OPEN_BET",
    )
}

/// Insert a matched pair (store surface for the external matching engine).
pub fn insert_bet_match(db: &Connection, bet_match: &BetMatch) -> AppResult<()> {
    let mut stmt = db.prepare_cached(
        "INSERT INTO bet_matches (id, tx0_index, tx0_hash, tx0_address, tx1_index, tx1_hash, \
         tx1_address, tx0_bet_type, tx1_bet_type, feed_address, initial_value, deadline, \
         target_value, leverage, forward_quantity, backward_quantity, tx0_block_index, \
         tx1_block_index, fee_fraction_int, status) \
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17, \
         ?18, ?19, ?20)",
    )?;
    stmt.execute(params![
        bet_match.id,
        bet_match.tx0_index,
        bet_match.tx0_hash,
        bet_match.tx0_address,
        bet_match.tx1_index,
        bet_match.tx1_hash,
        bet_match.tx1_address,
        bet_match.tx0_bet_type,
        bet_match.tx1_bet_type,
        bet_match.feed_address,
        bet_match.initial_value,
        bet_match.deadline,
        bet_match.target_value,
        bet_match.leverage,
        bet_match.forward_quantity,
        bet_match.backward_quantity,
        bet_match.tx0_block_index,
        bet_match.tx1_block_index,
        bet_match.fee_fraction_int,
        bet_match.status,
    ])?;
    record_event(
        db,
        bet_match.tx1_block_index,
        "insert",
        "bet_matches",
        &serde_json::to_value(bet_match)?,
        Some(bet_match.tx1_index),
        Some(&bet_match.tx1_hash),
        "BET_MATCH",
    )
}

/// Update a bet's status and journal the change.
pub fn update_bet_status(
    db: &Connection,
    block_index: u32,
    tx_hash: &str,
    status: &str,
) -> AppResult<()> {
    db.execute(
        "UPDATE bets SET status = ?2 WHERE tx_hash = ?1",
        params![tx_hash, status],
    )?;
    record_event(
        db,
        block_index,
        "update",
        "bets",
        &json!({ "tx_hash": tx_hash, "status": status }),
        None,
        Some(tx_hash),
        "BET_UPDATE",
    )
}

/// Update a bet match's status and journal the change.
pub fn update_bet_match_status(
    db: &Connection,
    block_index: u32,
    id: &str,
    status: &str,
) -> AppResult<()> {
    db.execute(
        "UPDATE bet_matches SET status = ?2 WHERE id = ?1",
        params![id, status],
    )?;
    record_event(
        db,
        block_index,
        "update",
        "bet_matches",
        &json!({ "id": id, "status": status }),
        None,
        None,
        "BET_MATCH_UPDATE",
    )
}

/// Cancel an open bet: recredit the remaining wager and mark it.
pub fn cancel_bet(
    db: &Connection,
    bet: &Bet,
    status: &str,
    block_index: u32,
    tx_index: u32,
) -> AppResult<()> {
    credit(
        db,
        block_index,
        &bet.source,
        XCP,
        bet.wager_remaining,
        tx_index,
        "recredit wager remaining",
        &bet.tx_hash,
    )?;
    update_bet_status(db, block_index, &bet.tx_hash, status)?;
    info!("Bet {} canceled [{}]", bet.tx_hash, status);
    Ok(())
}

/// Cancel a pending bet match: recredit both escrows and mark it.
pub fn cancel_bet_match(
    db: &Connection,
    bet_match: &BetMatch,
    status: &str,
    block_index: u32,
    tx_index: u32,
) -> AppResult<()> {
    credit(
        db,
        block_index,
        &bet_match.tx0_address,
        XCP,
        bet_match.forward_quantity,
        tx_index,
        "recredit forward quantity",
        &bet_match.id,
    )?;
    credit(
        db,
        block_index,
        &bet_match.tx1_address,
        XCP,
        bet_match.backward_quantity,
        tx_index,
        "recredit backward quantity",
        &bet_match.id,
    )?;
    update_bet_match_status(db, block_index, &bet_match.id, status)?;
    info!("Bet Match {} canceled [{}]", bet_match.id, status);
    Ok(())
}

/// Record a settlement outcome.
pub fn insert_bet_match_resolution(
    db: &Connection,
    resolution: &BetMatchResolution,
) -> AppResult<()> {
    let mut stmt = db.prepare_cached(
        "INSERT INTO bet_match_resolutions (bet_match_id, bet_match_type_id, block_index, \
         settled, bull_credit, bear_credit, winner, escrow_less_fee, fee) \
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
    )?;
    stmt.execute(params![
        resolution.bet_match_id,
        resolution.bet_match_type_id,
        resolution.block_index,
        resolution.settled,
        resolution.bull_credit,
        resolution.bear_credit,
        resolution.winner,
        resolution.escrow_less_fee,
        resolution.fee,
    ])?;
    record_event(
        db,
        resolution.block_index,
        "insert",
        "bet_match_resolutions",
        &serde_json::to_value(resolution)?,
        None,
        None,
        "BET_MATCH_RESOLUTION",
    )
}
