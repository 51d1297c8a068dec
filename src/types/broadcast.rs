use serde::{Deserialize, Serialize};

/// A row of the broadcasts table. A source address's ordered valid
/// broadcasts form its feed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Broadcast {
    pub tx_index: u32,
    pub tx_hash: String,
    pub block_index: u32,
    pub source: String,
    pub timestamp: i64,
    pub value: Option<f64>,
    pub fee_fraction_int: Option<i64>,
    pub text: Option<String>,
    pub mime_type: String,
    pub locked: bool,
    pub status: String,
}

/// Application-level reading of a broadcast's `(value, text)` pair.
///
/// The wire format keeps the magic values for compatibility; everything
/// above the codec works with this enum instead.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum BroadcastPayload {
    /// A feed price usable for bet settlement.
    Price(f64),
    /// Sentinel `-2`: drop all open bets on this feed.
    CancelBets,
    /// Sentinel `-3`: cancel pending bet matches on this feed.
    CancelPendingMatches,
    /// `text == "lock"` (case-insensitive): the feed accepts nothing more.
    Lock,
    /// Null or otherwise negative value: informational only.
    Inert,
}

impl BroadcastPayload {
    pub fn classify(value: Option<f64>, text: Option<&str>) -> Self {
        if let Some(text) = text {
            if text.eq_ignore_ascii_case("lock") {
                return Self::Lock;
            }
        }
        match value {
            Some(v) if v == -2.0 => Self::CancelBets,
            Some(v) if v == -3.0 => Self::CancelPendingMatches,
            Some(v) if v >= 0.0 => Self::Price(v),
            _ => Self::Inert,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_lock_wins_over_value() {
        let payload = BroadcastPayload::classify(Some(5.0), Some("LOCK"));
        assert_eq!(payload, BroadcastPayload::Lock);
    }

    #[test]
    fn test_classify_sentinels() {
        assert_eq!(
            BroadcastPayload::classify(Some(-2.0), Some("")),
            BroadcastPayload::CancelBets
        );
        assert_eq!(
            BroadcastPayload::classify(Some(-3.0), None),
            BroadcastPayload::CancelPendingMatches
        );
        assert_eq!(
            BroadcastPayload::classify(Some(-1.5), None),
            BroadcastPayload::Inert
        );
        assert_eq!(BroadcastPayload::classify(None, None), BroadcastPayload::Inert);
    }

    #[test]
    fn test_classify_price() {
        assert_eq!(
            BroadcastPayload::classify(Some(42.0), Some("odds")),
            BroadcastPayload::Price(42.0)
        );
    }
}
