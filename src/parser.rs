//! Deterministic replay: dispatch and block/transaction parse loop.
//!
//! The parser is the single writer. Blocks are consumed in height order,
//! transactions within a block in `tx_index` order, each inside a
//! savepoint so an interrupted transaction leaves no trace.

pub mod broadcast;
pub mod dispense;
pub mod dispenser;
pub mod oldest_tx;

pub use dispenser::DispensableCache;
pub use oldest_tx::OldestTxIndex;

use crate::config::AppConfig;
use crate::database::Database;
use crate::errors::AppResult;
use crate::ledger::events::record_event;
use crate::protocol::ProtocolRules;
use crate::state::CurrentState;
use crate::types::{BlockContext, MessageType, TransactionContext};
use rusqlite::{params, Connection};
use serde_json::json;
use tracing::{debug, info};

/// Everything the engines need besides the database handle: protocol
/// rules, parsing state, the oldest-tx look-aside and the dispensable
/// cache. Owned by the parser, threaded explicitly (no globals).
pub struct ParserContext {
    pub protocol: ProtocolRules,
    pub state: CurrentState,
    pub oldest_tx: OldestTxIndex,
    pub cache: DispensableCache,
    pub regular_dust_size: u64,
}

impl ParserContext {
    pub fn new(
        protocol: ProtocolRules,
        state: CurrentState,
        oldest_tx: OldestTxIndex,
        cache: DispensableCache,
        regular_dust_size: u64,
    ) -> Self {
        Self {
            protocol,
            state,
            oldest_tx,
            cache,
            regular_dust_size,
        }
    }

    /// Context from configuration, with the cache rebuilt from the store.
    pub fn from_config(config: &AppConfig, db: &Database) -> AppResult<Self> {
        let state = CurrentState::new();
        let protocol = ProtocolRules::new(config.network, state.clone());
        let oldest_tx = match &config.paths.oldest_tx_snapshot {
            Some(path) => OldestTxIndex::load_from_file(path)?,
            None => OldestTxIndex::empty(),
        };
        let cache = DispensableCache::init(db.connection())?;
        Ok(Self::new(
            protocol,
            state,
            oldest_tx,
            cache,
            config.dust.regular_dust_size,
        ))
    }
}

/// The single-writer parser task.
pub struct Parser {
    ctx: ParserContext,
}

impl Parser {
    pub fn new(ctx: ParserContext) -> Self {
        Self { ctx }
    }

    pub fn context(&self) -> &ParserContext {
        &self.ctx
    }

    pub fn context_mut(&mut self) -> &mut ParserContext {
        &mut self.ctx
    }

    /// Replay one block: every transaction in `tx_index` order, then the
    /// scheduled dispenser closes. All-or-nothing per block.
    pub fn parse_block(
        &mut self,
        db: &mut Database,
        block: &BlockContext,
        transactions: &[TransactionContext],
    ) -> AppResult<()> {
        self.ctx
            .state
            .set_current_block(block.block_index, block.block_time);

        let mut db_tx = db.connection_mut().transaction()?;
        db_tx.execute(
            "INSERT OR IGNORE INTO blocks (block_index, block_time) VALUES (?1, ?2)",
            params![block.block_index, block.block_time],
        )?;

        for tx in transactions {
            let savepoint = db_tx.savepoint()?;
            execute_transaction(&savepoint, &mut self.ctx, tx)?;
            savepoint.commit()?;
        }

        dispenser::close_pending(&db_tx, &self.ctx, block.block_index)?;
        db_tx.commit()?;

        debug!(
            "Block {} parsed ({} transactions)",
            block.block_index,
            transactions.len()
        );
        Ok(())
    }

    /// Replay a single transaction inside its own savepoint. Used by tests
    /// and mempool previews; `parse_block` is the production path.
    pub fn parse_transaction(
        &mut self,
        db: &mut Database,
        tx: &TransactionContext,
    ) -> AppResult<()> {
        let savepoint = db.connection_mut().savepoint()?;
        execute_transaction(&savepoint, &mut self.ctx, tx)?;
        savepoint.commit()?;
        Ok(())
    }
}

/// Record the transaction and route its payload to the owning engine.
fn execute_transaction(
    db: &Connection,
    ctx: &mut ParserContext,
    tx: &TransactionContext,
) -> AppResult<()> {
    let (message_type_id, payload) =
        crate::codec::unpack_message_type(&ctx.protocol, &tx.data, tx.block_index);
    let message_type = message_type_id.and_then(MessageType::from_id);
    let supported = message_type.is_some_and(|mt| mt.is_supported());

    db.execute(
        "INSERT INTO transactions (tx_index, tx_hash, block_index, source, destination, \
         btc_amount, data, supported) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
        params![
            tx.tx_index,
            tx.tx_hash,
            tx.block_index,
            tx.source,
            tx.destination,
            tx.btc_amount as i64,
            tx.data,
            supported,
        ],
    )?;
    record_event(
        db,
        tx.block_index,
        "insert",
        "transactions",
        &json!({
            "tx_index": tx.tx_index,
            "tx_hash": tx.tx_hash,
            "block_index": tx.block_index,
            "source": tx.source,
            "supported": supported,
        }),
        Some(tx.tx_index),
        Some(&tx.tx_hash),
        "NEW_TRANSACTION",
    )?;

    match message_type {
        Some(MessageType::Broadcast) => broadcast::parse(db, ctx, tx, payload)?,
        Some(MessageType::Dispenser) => dispenser::parse(db, ctx, tx, payload)?,
        Some(MessageType::Dispense) => dispense::parse(db, ctx, tx)?,
        _ => {
            // Recorded, no state change.
            info!(
                "Transaction {} [invalid: unknown message type]",
                tx.tx_hash
            );
        }
    }

    Ok(())
}
