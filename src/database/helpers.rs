//! Shared row-mapping helpers.
//!
//! Column lists are paired with their `*_from_row` constructors; queries
//! must select exactly these columns in this order.

use crate::types::{Bet, BetMatch, Broadcast, Dispenser};
use rusqlite::Row;

/// Standard SELECT columns for broadcasts queries
pub const BROADCAST_SELECT_COLUMNS: &str = "tx_index, tx_hash, block_index, source, timestamp, \
    value, fee_fraction_int, text, mime_type, locked, status";

pub fn broadcast_from_row(row: &Row) -> rusqlite::Result<Broadcast> {
    Ok(Broadcast {
        tx_index: row.get(0)?,
        tx_hash: row.get(1)?,
        block_index: row.get(2)?,
        source: row.get(3)?,
        timestamp: row.get::<_, Option<i64>>(4)?.unwrap_or(0),
        value: row.get(5)?,
        fee_fraction_int: row.get(6)?,
        text: row.get(7)?,
        mime_type: row.get::<_, Option<String>>(8)?.unwrap_or_default(),
        locked: row.get(9)?,
        status: row.get(10)?,
    })
}

/// Standard SELECT columns for dispensers queries
pub const DISPENSER_SELECT_COLUMNS: &str = "tx_index, tx_hash, block_index, source, asset, \
    give_quantity, escrow_quantity, satoshirate, status, give_remaining, oracle_address, \
    origin, dispense_count, close_block_index, last_status_tx_hash, last_status_tx_source";

pub fn dispenser_from_row(row: &Row) -> rusqlite::Result<Dispenser> {
    Ok(Dispenser {
        tx_index: row.get(0)?,
        tx_hash: row.get(1)?,
        block_index: row.get(2)?,
        source: row.get(3)?,
        asset: row.get(4)?,
        give_quantity: row.get(5)?,
        escrow_quantity: row.get(6)?,
        satoshirate: row.get(7)?,
        status: row.get(8)?,
        give_remaining: row.get(9)?,
        oracle_address: row.get(10)?,
        origin: row.get(11)?,
        dispense_count: row.get(12)?,
        close_block_index: row.get(13)?,
        last_status_tx_hash: row.get(14)?,
        last_status_tx_source: row.get(15)?,
    })
}

/// Standard SELECT columns for bets queries
pub const BET_SELECT_COLUMNS: &str = "tx_index, tx_hash, block_index, source, feed_address, \
    bet_type, deadline, wager_quantity, wager_remaining, counterwager_quantity, \
    counterwager_remaining, target_value, leverage, expiration, expire_index, \
    fee_fraction_int, status";

pub fn bet_from_row(row: &Row) -> rusqlite::Result<Bet> {
    Ok(Bet {
        tx_index: row.get(0)?,
        tx_hash: row.get(1)?,
        block_index: row.get(2)?,
        source: row.get(3)?,
        feed_address: row.get(4)?,
        bet_type: row.get(5)?,
        deadline: row.get(6)?,
        wager_quantity: row.get(7)?,
        wager_remaining: row.get(8)?,
        counterwager_quantity: row.get(9)?,
        counterwager_remaining: row.get(10)?,
        target_value: row.get(11)?,
        leverage: row.get(12)?,
        expiration: row.get(13)?,
        expire_index: row.get(14)?,
        fee_fraction_int: row.get(15)?,
        status: row.get(16)?,
    })
}

/// Standard SELECT columns for bet_matches queries
pub const BET_MATCH_SELECT_COLUMNS: &str = "id, tx0_index, tx0_hash, tx0_address, tx1_index, \
    tx1_hash, tx1_address, tx0_bet_type, tx1_bet_type, feed_address, initial_value, deadline, \
    target_value, leverage, forward_quantity, backward_quantity, tx0_block_index, \
    tx1_block_index, fee_fraction_int, status";

pub fn bet_match_from_row(row: &Row) -> rusqlite::Result<BetMatch> {
    Ok(BetMatch {
        id: row.get(0)?,
        tx0_index: row.get(1)?,
        tx0_hash: row.get(2)?,
        tx0_address: row.get(3)?,
        tx1_index: row.get(4)?,
        tx1_hash: row.get(5)?,
        tx1_address: row.get(6)?,
        tx0_bet_type: row.get(7)?,
        tx1_bet_type: row.get(8)?,
        feed_address: row.get(9)?,
        initial_value: row.get(10)?,
        deadline: row.get(11)?,
        target_value: row.get(12)?,
        leverage: row.get(13)?,
        forward_quantity: row.get(14)?,
        backward_quantity: row.get(15)?,
        tx0_block_index: row.get(16)?,
        tx1_block_index: row.get(17)?,
        fee_fraction_int: row.get(18)?,
        status: row.get(19)?,
    })
}
