//! Ledger schema.
//!
//! Typed tables owned by the ledger store plus the append-only `messages`
//! event journal. Statements are idempotent so opening an existing ledger
//! is a no-op.

use crate::errors::AppResult;
use rusqlite::Connection;

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS blocks (
    block_index INTEGER PRIMARY KEY,
    block_time INTEGER NOT NULL
);

CREATE TABLE IF NOT EXISTS transactions (
    tx_index INTEGER PRIMARY KEY,
    tx_hash TEXT UNIQUE NOT NULL,
    block_index INTEGER NOT NULL,
    source TEXT NOT NULL,
    destination TEXT,
    btc_amount INTEGER NOT NULL DEFAULT 0,
    data BLOB,
    supported INTEGER NOT NULL DEFAULT 1
);

CREATE TABLE IF NOT EXISTS assets (
    asset_name TEXT PRIMARY KEY,
    asset_id INTEGER UNIQUE NOT NULL,
    asset_longname TEXT UNIQUE,
    block_index INTEGER NOT NULL
);

CREATE TABLE IF NOT EXISTS balances (
    address TEXT NOT NULL,
    asset TEXT NOT NULL,
    quantity INTEGER NOT NULL DEFAULT 0,
    UNIQUE (address, asset)
);
CREATE INDEX IF NOT EXISTS idx_balances_address ON balances (address);

CREATE TABLE IF NOT EXISTS credits (
    block_index INTEGER NOT NULL,
    address TEXT NOT NULL,
    asset TEXT NOT NULL,
    quantity INTEGER NOT NULL,
    calling_function TEXT,
    event TEXT,
    tx_index INTEGER NOT NULL
);

CREATE TABLE IF NOT EXISTS debits (
    block_index INTEGER NOT NULL,
    address TEXT NOT NULL,
    asset TEXT NOT NULL,
    quantity INTEGER NOT NULL,
    action TEXT,
    event TEXT,
    tx_index INTEGER NOT NULL
);

CREATE TABLE IF NOT EXISTS broadcasts (
    tx_index INTEGER PRIMARY KEY,
    tx_hash TEXT UNIQUE NOT NULL,
    block_index INTEGER NOT NULL,
    source TEXT NOT NULL,
    timestamp INTEGER,
    value REAL,
    fee_fraction_int INTEGER,
    text TEXT,
    mime_type TEXT,
    locked INTEGER NOT NULL DEFAULT 0,
    status TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_broadcasts_source ON broadcasts (source, status);

CREATE TABLE IF NOT EXISTS bets (
    tx_index INTEGER PRIMARY KEY,
    tx_hash TEXT UNIQUE NOT NULL,
    block_index INTEGER NOT NULL,
    source TEXT NOT NULL,
    feed_address TEXT NOT NULL,
    bet_type INTEGER NOT NULL,
    deadline INTEGER NOT NULL,
    wager_quantity INTEGER NOT NULL,
    wager_remaining INTEGER NOT NULL,
    counterwager_quantity INTEGER NOT NULL,
    counterwager_remaining INTEGER NOT NULL,
    target_value REAL,
    leverage INTEGER NOT NULL DEFAULT 5040,
    expiration INTEGER NOT NULL,
    expire_index INTEGER NOT NULL,
    fee_fraction_int INTEGER NOT NULL DEFAULT 0,
    status TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_bets_feed ON bets (feed_address, status);

CREATE TABLE IF NOT EXISTS bet_matches (
    id TEXT PRIMARY KEY,
    tx0_index INTEGER NOT NULL,
    tx0_hash TEXT NOT NULL,
    tx0_address TEXT NOT NULL,
    tx1_index INTEGER NOT NULL,
    tx1_hash TEXT NOT NULL,
    tx1_address TEXT NOT NULL,
    tx0_bet_type INTEGER NOT NULL,
    tx1_bet_type INTEGER NOT NULL,
    feed_address TEXT NOT NULL,
    initial_value REAL NOT NULL DEFAULT 0,
    deadline INTEGER NOT NULL,
    target_value REAL,
    leverage INTEGER NOT NULL DEFAULT 5040,
    forward_quantity INTEGER NOT NULL,
    backward_quantity INTEGER NOT NULL,
    tx0_block_index INTEGER NOT NULL,
    tx1_block_index INTEGER NOT NULL,
    fee_fraction_int INTEGER NOT NULL DEFAULT 0,
    status TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_bet_matches_feed ON bet_matches (feed_address, status);

CREATE TABLE IF NOT EXISTS bet_match_resolutions (
    bet_match_id TEXT PRIMARY KEY,
    bet_match_type_id INTEGER NOT NULL,
    block_index INTEGER NOT NULL,
    settled INTEGER,
    bull_credit INTEGER,
    bear_credit INTEGER,
    winner TEXT,
    escrow_less_fee INTEGER,
    fee INTEGER NOT NULL
);

CREATE TABLE IF NOT EXISTS dispensers (
    tx_index INTEGER PRIMARY KEY,
    tx_hash TEXT UNIQUE NOT NULL,
    block_index INTEGER NOT NULL,
    source TEXT NOT NULL,
    asset TEXT NOT NULL,
    give_quantity INTEGER NOT NULL,
    escrow_quantity INTEGER NOT NULL,
    satoshirate INTEGER NOT NULL,
    status INTEGER NOT NULL,
    give_remaining INTEGER NOT NULL,
    oracle_address TEXT,
    origin TEXT NOT NULL,
    dispense_count INTEGER NOT NULL DEFAULT 0,
    close_block_index INTEGER,
    last_status_tx_hash TEXT,
    last_status_tx_source TEXT
);
CREATE INDEX IF NOT EXISTS idx_dispensers_source_asset ON dispensers (source, asset, status);
CREATE INDEX IF NOT EXISTS idx_dispensers_closing ON dispensers (status, close_block_index);

CREATE TABLE IF NOT EXISTS dispenser_refills (
    tx_index INTEGER NOT NULL,
    tx_hash TEXT NOT NULL,
    block_index INTEGER NOT NULL,
    source TEXT NOT NULL,
    destination TEXT NOT NULL,
    asset TEXT NOT NULL,
    dispense_quantity INTEGER NOT NULL,
    dispenser_tx_hash TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS dispenses (
    tx_index INTEGER NOT NULL,
    dispense_index INTEGER NOT NULL,
    tx_hash TEXT NOT NULL,
    block_index INTEGER NOT NULL,
    source TEXT NOT NULL,
    destination TEXT NOT NULL,
    asset TEXT NOT NULL,
    dispense_quantity INTEGER NOT NULL,
    dispenser_tx_hash TEXT NOT NULL,
    btc_amount INTEGER NOT NULL,
    PRIMARY KEY (tx_index, dispense_index)
);

CREATE TABLE IF NOT EXISTS addresses (
    address TEXT PRIMARY KEY,
    options INTEGER NOT NULL DEFAULT 0,
    block_index INTEGER NOT NULL
);

CREATE TABLE IF NOT EXISTS messages (
    message_index INTEGER PRIMARY KEY AUTOINCREMENT,
    block_index INTEGER NOT NULL,
    command TEXT NOT NULL,
    category TEXT NOT NULL,
    bindings TEXT NOT NULL,
    tx_index INTEGER,
    tx_hash TEXT,
    event TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_messages_block ON messages (block_index);
";

/// Create all ledger tables and indexes.
pub fn setup_schema(connection: &Connection) -> AppResult<()> {
    connection.execute_batch(SCHEMA)?;
    Ok(())
}
