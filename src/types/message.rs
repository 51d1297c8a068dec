use serde::{Deserialize, Serialize};

/// Message type identifiers embedded after the protocol prefix.
///
/// The consensus core routes Broadcast, Dispenser and Dispense; the other
/// identifiers are recognised so the dispatcher can tell an out-of-scope
/// message from garbage, but they cause no state change here.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MessageType {
    Send = 0,
    EnhancedSend = 2,
    Mpma = 3,
    Sweep = 4,
    Order = 10,
    BtcPay = 11,
    Dispenser = 12,
    Dispense = 13,
    Issuance = 20,
    Broadcast = 30,
    Bet = 40,
    Dividend = 50,
    Burn = 60,
    Cancel = 70,
    FairMinter = 90,
    FairMint = 91,
    Utxo = 100,
    Attach = 101,
    Detach = 102,
    Destroy = 110,
}

impl MessageType {
    pub fn from_id(value: u32) -> Option<Self> {
        match value {
            0 => Some(Self::Send),
            2 => Some(Self::EnhancedSend),
            3 => Some(Self::Mpma),
            4 => Some(Self::Sweep),
            10 => Some(Self::Order),
            11 => Some(Self::BtcPay),
            12 => Some(Self::Dispenser),
            13 => Some(Self::Dispense),
            20..=22 => Some(Self::Issuance),
            30 => Some(Self::Broadcast),
            40 => Some(Self::Bet),
            50 => Some(Self::Dividend),
            60 => Some(Self::Burn),
            70 => Some(Self::Cancel),
            90 => Some(Self::FairMinter),
            91 => Some(Self::FairMint),
            100 => Some(Self::Utxo),
            101 => Some(Self::Attach),
            102 => Some(Self::Detach),
            110 => Some(Self::Destroy),
            _ => None,
        }
    }

    /// Message families the consensus core executes.
    pub fn is_supported(&self) -> bool {
        matches!(self, Self::Broadcast | Self::Dispenser | Self::Dispense)
    }

    pub fn id(&self) -> u32 {
        *self as u32
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_core_ids() {
        assert_eq!(MessageType::from_id(30), Some(MessageType::Broadcast));
        assert_eq!(MessageType::from_id(12), Some(MessageType::Dispenser));
        assert_eq!(MessageType::from_id(13), Some(MessageType::Dispense));
        assert_eq!(MessageType::from_id(255), None);
    }

    #[test]
    fn test_supported_subset() {
        assert!(MessageType::Broadcast.is_supported());
        assert!(MessageType::Dispense.is_supported());
        assert!(!MessageType::Order.is_supported());
    }
}
