use serde::{Deserialize, Serialize};

/// Bet flavours. CFD pairs sum to 1, Equal/NotEqual pairs to 5 — the sums
/// identify a match's family without consulting both rows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BetType {
    BullCfd = 0,
    BearCfd = 1,
    Equal = 2,
    NotEqual = 3,
}

impl BetType {
    pub fn id(&self) -> i64 {
        *self as i64
    }
}

/// Sum of the two bet types in a CFD match.
pub const CFD_TYPE_ID: i64 = BetType::BullCfd as i64 + BetType::BearCfd as i64;

/// Sum of the two bet types in an Equal/NotEqual match.
pub const EQUAL_TYPE_ID: i64 = BetType::Equal as i64 + BetType::NotEqual as i64;

/// A row of the bets table (open side of the order book).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Bet {
    pub tx_index: u32,
    pub tx_hash: String,
    pub block_index: u32,
    pub source: String,
    pub feed_address: String,
    pub bet_type: i64,
    pub deadline: i64,
    pub wager_quantity: i64,
    pub wager_remaining: i64,
    pub counterwager_quantity: i64,
    pub counterwager_remaining: i64,
    pub target_value: Option<f64>,
    pub leverage: i64,
    pub expiration: u32,
    pub expire_index: u32,
    pub fee_fraction_int: i64,
    pub status: String,
}

/// A matched pair of bets holding escrowed funds until the feed settles
/// them. `id` is `"{tx0_hash}_{tx1_hash}"`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BetMatch {
    pub id: String,
    pub tx0_index: u32,
    pub tx0_hash: String,
    pub tx0_address: String,
    pub tx1_index: u32,
    pub tx1_hash: String,
    pub tx1_address: String,
    pub tx0_bet_type: i64,
    pub tx1_bet_type: i64,
    pub feed_address: String,
    pub initial_value: f64,
    pub deadline: i64,
    pub target_value: Option<f64>,
    /// Leverage numerator over 5040.
    pub leverage: i64,
    pub forward_quantity: i64,
    pub backward_quantity: i64,
    pub tx0_block_index: u32,
    pub tx1_block_index: u32,
    /// Fee fraction snapshotted at match time.
    pub fee_fraction_int: i64,
    pub status: String,
}

/// Settlement outcome recorded per resolved bet match.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BetMatchResolution {
    pub bet_match_id: String,
    pub bet_match_type_id: i64,
    pub block_index: u32,
    pub settled: Option<bool>,
    pub bull_credit: Option<i64>,
    pub bear_credit: Option<i64>,
    pub winner: Option<String>,
    pub escrow_less_fee: Option<i64>,
    pub fee: i64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_family_sums() {
        assert_eq!(CFD_TYPE_ID, 1);
        assert_eq!(EQUAL_TYPE_ID, 5);
        assert_eq!(
            BetType::BullCfd.id() + BetType::BearCfd.id(),
            CFD_TYPE_ID
        );
        assert_eq!(
            BetType::Equal.id() + BetType::NotEqual.id(),
            EQUAL_TYPE_ID
        );
    }
}
