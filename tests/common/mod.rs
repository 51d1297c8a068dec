//! Common Test Utilities
//!
//! Shared setup for the integration suites: an in-memory ledger with a
//! parser wired for a chosen network, payload builders, and seeding
//! helpers for balances, bets and bet matches.

#![allow(dead_code)]

use xcp_consensus::codec;
use xcp_consensus::config::{Network, DEFAULT_REGULAR_DUST_SIZE};
use xcp_consensus::database::Database;
use xcp_consensus::ledger::events::credit;
use xcp_consensus::parser::{DispensableCache, OldestTxIndex, Parser, ParserContext};
use xcp_consensus::protocol::ProtocolRules;
use xcp_consensus::state::CurrentState;
use xcp_consensus::types::{Bet, BetMatch, BlockContext, TransactionContext};

/// An in-memory ledger plus a parser bound to it.
pub struct TestLedger {
    pub db: Database,
    pub parser: Parser,
}

/// Opt-in tracing for debugging test runs (`RUST_LOG=debug cargo test`).
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .try_init();
}

impl TestLedger {
    pub fn new(network: Network) -> Self {
        init_tracing();
        let db = Database::in_memory().expect("in-memory database");
        let state = CurrentState::new();
        let protocol = ProtocolRules::new(network, state.clone());
        let ctx = ParserContext::new(
            protocol,
            state,
            OldestTxIndex::empty(),
            DispensableCache::empty(),
            DEFAULT_REGULAR_DUST_SIZE,
        );
        Self {
            db,
            parser: Parser::new(ctx),
        }
    }

    pub fn regtest() -> Self {
        Self::new(Network::Regtest)
    }

    /// Point the parsing state at a height without replaying a block.
    pub fn set_height(&self, block_index: u32, block_time: u32) {
        self.parser
            .context()
            .state
            .set_current_block(block_index, block_time);
    }

    /// Seed a balance outside any block (tx_index 0).
    pub fn fund(&self, address: &str, asset: &str, quantity: i64) {
        credit(
            self.db.connection(),
            0,
            address,
            asset,
            quantity,
            0,
            "test seed",
            "seed",
        )
        .expect("seed credit");
    }

    pub fn balance(&self, address: &str, asset: &str) -> Option<i64> {
        xcp_consensus::ledger::balances::get_balance(self.db.connection(), address, asset)
            .expect("balance query")
    }

    /// Replay one block holding the given transactions.
    pub fn parse_block(&mut self, block_index: u32, transactions: &[TransactionContext]) {
        let block = BlockContext {
            block_index,
            block_time: 1_600_000_000 + block_index,
        };
        self.parser
            .parse_block(&mut self.db, &block, transactions)
            .expect("parse block");
    }

    /// Full event journal, in emission order.
    pub fn journal(&self) -> Vec<(String, String)> {
        self.db
            .connection()
            .prepare("SELECT event, bindings FROM messages ORDER BY message_index")
            .unwrap()
            .query_map([], |row| Ok((row.get(0)?, row.get(1)?)))
            .unwrap()
            .collect::<Result<_, _>>()
            .unwrap()
    }

    pub fn broadcast_status(&self, tx_hash: &str) -> Option<String> {
        self.db
            .connection()
            .query_row(
                "SELECT status FROM broadcasts WHERE tx_hash = ?1",
                [tx_hash],
                |row| row.get(0),
            )
            .ok()
    }
}

/// Next monotonically increasing tx_index across a test.
pub struct TxCounter {
    next: u32,
}

impl TxCounter {
    pub fn new() -> Self {
        Self { next: 1 }
    }

    pub fn next(&mut self) -> u32 {
        let index = self.next;
        self.next += 1;
        index
    }
}

pub fn make_tx(
    tx_index: u32,
    block_index: u32,
    source: &str,
    data: Vec<u8>,
) -> TransactionContext {
    TransactionContext {
        tx_index,
        tx_hash: format!("txhash{tx_index:04}"),
        block_index,
        source: source.to_string(),
        destination: None,
        btc_amount: 0,
        data,
    }
}

pub fn make_payment_tx(
    tx_index: u32,
    block_index: u32,
    source: &str,
    destination: &str,
    btc_amount: u64,
    data: Vec<u8>,
) -> TransactionContext {
    TransactionContext {
        tx_index,
        tx_hash: format!("txhash{tx_index:04}"),
        block_index,
        source: source.to_string(),
        destination: Some(destination.to_string()),
        btc_amount,
        data,
    }
}

/// Broadcast payload for the given ledger's network era.
pub fn broadcast_payload(
    ledger: &TestLedger,
    block_index: u32,
    timestamp: i64,
    value: f64,
    fee_fraction_int: i64,
    text: &str,
) -> Vec<u8> {
    let protocol = &ledger.parser.context().protocol;
    let mut data = codec::pack_message_type(protocol, 30, block_index);
    if protocol.enabled("taproot_support", Some(block_index)) {
        data.extend(
            codec::broadcast::pack_taproot(timestamp, value, fee_fraction_int, "", text)
                .expect("pack broadcast"),
        );
    } else {
        data.extend(
            codec::broadcast::pack_legacy(
                protocol,
                timestamp,
                value,
                fee_fraction_int,
                text,
                block_index,
            )
            .expect("pack broadcast"),
        );
    }
    data
}

/// Dispenser payload (no trailing addresses).
pub fn dispenser_payload(
    ledger: &TestLedger,
    block_index: u32,
    asset_id: u64,
    give_quantity: u64,
    escrow_quantity: u64,
    mainchainrate: u64,
    status: i64,
) -> Vec<u8> {
    let protocol = &ledger.parser.context().protocol;
    let mut data = codec::pack_message_type(protocol, 12, block_index);
    data.extend(
        codec::dispenser::pack(asset_id, give_quantity, escrow_quantity, mainchainrate, status)
            .expect("pack dispenser"),
    );
    data
}

/// Seed an open bet on a feed.
pub fn seed_bet(
    ledger: &TestLedger,
    tx_index: u32,
    source: &str,
    feed_address: &str,
    bet_type: i64,
    wager: i64,
) -> anyhow::Result<()> {
    let bet = Bet {
        tx_index,
        tx_hash: format!("bet{tx_index:04}"),
        block_index: 1,
        source: source.to_string(),
        feed_address: feed_address.to_string(),
        bet_type,
        deadline: 1_000,
        wager_quantity: wager,
        wager_remaining: wager,
        counterwager_quantity: wager,
        counterwager_remaining: wager,
        target_value: None,
        leverage: 5040,
        expiration: 100,
        expire_index: 1_000,
        fee_fraction_int: 0,
        status: "open".to_string(),
    };
    xcp_consensus::ledger::bets::insert_bet(ledger.db.connection(), &bet)?;
    Ok(())
}

/// Parameters for a seeded pending bet match.
pub struct MatchSpec {
    pub id_suffix: u32,
    pub feed_address: String,
    pub tx0_address: String,
    pub tx1_address: String,
    pub tx0_bet_type: i64,
    pub tx1_bet_type: i64,
    pub forward_quantity: i64,
    pub backward_quantity: i64,
    pub initial_value: f64,
    pub deadline: i64,
    pub target_value: Option<f64>,
    pub leverage: i64,
    pub fee_fraction_int: i64,
}

impl MatchSpec {
    pub fn cfd(feed: &str, bull: &str, bear: &str) -> Self {
        Self {
            id_suffix: 1,
            feed_address: feed.to_string(),
            tx0_address: bull.to_string(),
            tx1_address: bear.to_string(),
            tx0_bet_type: 0,
            tx1_bet_type: 1,
            forward_quantity: 100,
            backward_quantity: 100,
            initial_value: 10.0,
            deadline: 1_000,
            target_value: None,
            leverage: 5040,
            fee_fraction_int: 0,
        }
    }

    pub fn equal(feed: &str, equal: &str, notequal: &str, target_value: f64) -> Self {
        Self {
            id_suffix: 1,
            feed_address: feed.to_string(),
            tx0_address: equal.to_string(),
            tx1_address: notequal.to_string(),
            tx0_bet_type: 2,
            tx1_bet_type: 3,
            forward_quantity: 50,
            backward_quantity: 50,
            initial_value: 0.0,
            deadline: 1_000,
            target_value: Some(target_value),
            leverage: 5040,
            fee_fraction_int: 0,
        }
    }
}

/// Seed a pending bet match, returning its id.
pub fn seed_bet_match(ledger: &TestLedger, spec: &MatchSpec) -> anyhow::Result<String> {
    let tx0_hash = format!("match{:04}tx0", spec.id_suffix);
    let tx1_hash = format!("match{:04}tx1", spec.id_suffix);
    let id = format!("{tx0_hash}_{tx1_hash}");
    let bet_match = BetMatch {
        id: id.clone(),
        tx0_index: 10 + spec.id_suffix * 2,
        tx0_hash,
        tx0_address: spec.tx0_address.clone(),
        tx1_index: 11 + spec.id_suffix * 2,
        tx1_hash,
        tx1_address: spec.tx1_address.clone(),
        tx0_bet_type: spec.tx0_bet_type,
        tx1_bet_type: spec.tx1_bet_type,
        feed_address: spec.feed_address.clone(),
        initial_value: spec.initial_value,
        deadline: spec.deadline,
        target_value: spec.target_value,
        leverage: spec.leverage,
        forward_quantity: spec.forward_quantity,
        backward_quantity: spec.backward_quantity,
        tx0_block_index: 1,
        tx1_block_index: 1,
        fee_fraction_int: spec.fee_fraction_int,
        status: "pending".to_string(),
    };
    xcp_consensus::ledger::bets::insert_bet_match(ledger.db.connection(), &bet_match)?;
    Ok(id)
}

pub fn bet_match_status(ledger: &TestLedger, id: &str) -> String {
    ledger
        .db
        .connection()
        .query_row(
            "SELECT status FROM bet_matches WHERE id = ?1",
            [id],
            |row| row.get(0),
        )
        .expect("bet match status")
}
