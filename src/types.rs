//! Core domain types shared across codec, ledger and parser.

pub mod bet;
pub mod broadcast;
pub mod dispenser;
pub mod message;

pub use bet::{Bet, BetMatch, BetMatchResolution, BetType};
pub use broadcast::{Broadcast, BroadcastPayload};
pub use dispenser::{Dispenser, DispenserStatus};
pub use message::MessageType;

use serde::{Deserialize, Serialize};

/// A Bitcoin transaction as seen by the consensus core: chain coordinates,
/// the resolved source/destination, and the extracted protocol payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransactionContext {
    pub tx_index: u32,
    pub tx_hash: String,
    pub block_index: u32,
    pub source: String,
    pub destination: Option<String>,
    pub btc_amount: u64,
    /// Protocol payload with the 8-byte prefix already stripped.
    pub data: Vec<u8>,
}

/// Block coordinates handed to the parser ahead of its transactions.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct BlockContext {
    pub block_index: u32,
    pub block_time: u32,
}
