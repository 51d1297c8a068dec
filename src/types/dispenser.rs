use serde::{Deserialize, Serialize};

/// Dispenser lifecycle states as stored on the wire and in the ledger.
///
/// `OpenEmptyAddress` only ever appears in messages: during parsing it
/// resolves to `Open` (at the source or at a foreign empty address).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DispenserStatus {
    Open = 0,
    OpenEmptyAddress = 1,
    Closed = 10,
    Closing = 11,
}

impl DispenserStatus {
    pub fn from_id(value: i64) -> Option<Self> {
        match value {
            0 => Some(Self::Open),
            1 => Some(Self::OpenEmptyAddress),
            10 => Some(Self::Closed),
            11 => Some(Self::Closing),
            _ => None,
        }
    }

    pub fn id(&self) -> i64 {
        *self as i64
    }
}

/// A row of the dispensers table.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Dispenser {
    pub tx_index: u32,
    pub tx_hash: String,
    pub block_index: u32,
    /// Address the dispenser vends from (may differ from its origin).
    pub source: String,
    pub asset: String,
    pub give_quantity: i64,
    pub escrow_quantity: i64,
    pub satoshirate: i64,
    pub status: i64,
    pub give_remaining: i64,
    pub oracle_address: Option<String>,
    /// Address that opened (and may close or refill) the dispenser.
    pub origin: String,
    pub dispense_count: i64,
    pub close_block_index: Option<u32>,
    pub last_status_tx_hash: Option<String>,
    pub last_status_tx_source: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_round_trip() {
        for status in [
            DispenserStatus::Open,
            DispenserStatus::OpenEmptyAddress,
            DispenserStatus::Closed,
            DispenserStatus::Closing,
        ] {
            assert_eq!(DispenserStatus::from_id(status.id()), Some(status));
        }
        assert_eq!(DispenserStatus::from_id(2), None);
        assert_eq!(DispenserStatus::from_id(20), None);
    }
}
