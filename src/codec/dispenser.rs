//! Dispenser message codec.
//!
//! Body: `>QQQQB` = (asset_id, give_quantity, escrow_quantity,
//! mainchainrate, status), optionally followed by a 21-byte packed
//! `action_address`, optionally followed by a 21-byte packed
//! `oracle_address`. The trailing addresses are present by status and
//! protocol flag; see [`unpack`].

use super::{address, CodecError};
use crate::ledger::assets::generate_asset_name;
use crate::protocol::ProtocolRules;
use crate::types::DispenserStatus;
use byteorder::{BigEndian, ReadBytesExt, WriteBytesExt};
use std::io::Cursor;

/// Fixed `>QQQQB` body length.
const BODY_LENGTH: usize = 33;

/// A decoded dispenser message, before validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DispenserData {
    pub asset_id: u64,
    pub asset: String,
    pub give_quantity: u64,
    pub escrow_quantity: u64,
    pub mainchainrate: u64,
    pub dispenser_status: i64,
    pub action_address: Option<String>,
    pub oracle_address: Option<String>,
}

/// Decode a dispenser body (message-type tag already stripped).
///
/// The action address is read for `OpenEmptyAddress` always, and for
/// `Closed` only when `dispenser_origin_permission_extended` is active and
/// bytes remain; any further bytes are the oracle address.
pub fn unpack(
    protocol: &ProtocolRules,
    message: &[u8],
    block_index: u32,
) -> Result<DispenserData, CodecError> {
    if message.len() < BODY_LENGTH {
        return Err(CodecError::CouldNotUnpack);
    }

    let mut cursor = Cursor::new(message);
    let asset_id = cursor
        .read_u64::<BigEndian>()
        .map_err(|_| CodecError::CouldNotUnpack)?;
    let give_quantity = cursor
        .read_u64::<BigEndian>()
        .map_err(|_| CodecError::CouldNotUnpack)?;
    let escrow_quantity = cursor
        .read_u64::<BigEndian>()
        .map_err(|_| CodecError::CouldNotUnpack)?;
    let mainchainrate = cursor
        .read_u64::<BigEndian>()
        .map_err(|_| CodecError::CouldNotUnpack)?;
    let dispenser_status = i64::from(cursor.read_u8().map_err(|_| CodecError::CouldNotUnpack)?);

    let mut read = BODY_LENGTH;
    let mut action_address = None;
    let mut oracle_address = None;

    let wants_action_address = dispenser_status == DispenserStatus::OpenEmptyAddress.id()
        || (protocol.enabled("dispenser_origin_permission_extended", Some(block_index))
            && dispenser_status == DispenserStatus::Closed.id()
            && message.len() > read);
    if wants_action_address {
        if message.len() < read + address::PACKED_LENGTH {
            return Err(CodecError::CouldNotUnpack);
        }
        action_address = Some(address::unpack_legacy(
            &message[read..read + address::PACKED_LENGTH],
        )?);
        read += address::PACKED_LENGTH;
    }

    if message.len() > read {
        if message.len() < read + address::PACKED_LENGTH {
            return Err(CodecError::CouldNotUnpack);
        }
        oracle_address = Some(address::unpack_legacy(
            &message[read..read + address::PACKED_LENGTH],
        )?);
    }

    let asset = generate_asset_name(asset_id).map_err(|_| CodecError::CouldNotUnpack)?;

    Ok(DispenserData {
        asset_id,
        asset,
        give_quantity,
        escrow_quantity,
        mainchainrate,
        dispenser_status,
        action_address,
        oracle_address,
    })
}

/// Encode the fixed `>QQQQB` body. Trailing addresses are appended by the
/// compose path according to status and flags.
pub fn pack(
    asset_id: u64,
    give_quantity: u64,
    escrow_quantity: u64,
    mainchainrate: u64,
    dispenser_status: i64,
) -> Result<Vec<u8>, CodecError> {
    let status = u8::try_from(dispenser_status)
        .map_err(|_| CodecError::Encode("status out of range".to_string()))?;

    let mut data = Vec::with_capacity(BODY_LENGTH);
    data.write_u64::<BigEndian>(asset_id)
        .and_then(|_| data.write_u64::<BigEndian>(give_quantity))
        .and_then(|_| data.write_u64::<BigEndian>(escrow_quantity))
        .and_then(|_| data.write_u64::<BigEndian>(mainchainrate))
        .and_then(|_| data.write_u8(status))
        .map_err(|e| CodecError::Encode(e.to_string()))?;
    Ok(data)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Network;
    use crate::state::CurrentState;

    const ADDRESS: &str = "1A1zP1eP5QGefi2DMPTfTL5SLmv7DivfNa";
    const ORACLE: &str = "1BitcoinEaterAddressDontSendf59kuE";

    // XCP has asset ID 1
    const XCP_ID: u64 = 1;

    fn mainnet() -> ProtocolRules {
        ProtocolRules::new(Network::Mainnet, CurrentState::new())
    }

    fn regtest() -> ProtocolRules {
        ProtocolRules::new(Network::Regtest, CurrentState::new())
    }

    #[test]
    fn test_open_round_trip() {
        let protocol = mainnet();
        let packed = pack(XCP_ID, 100, 500, 1_000, 0).unwrap();
        let data = unpack(&protocol, &packed, 700_000).unwrap();
        assert_eq!(data.asset, "XCP");
        assert_eq!(data.give_quantity, 100);
        assert_eq!(data.escrow_quantity, 500);
        assert_eq!(data.mainchainrate, 1_000);
        assert_eq!(data.dispenser_status, 0);
        assert_eq!(data.action_address, None);
        assert_eq!(data.oracle_address, None);
    }

    #[test]
    fn test_empty_address_reads_action_address() {
        let protocol = mainnet();
        let mut packed = pack(XCP_ID, 100, 500, 1_000, 1).unwrap();
        packed.extend_from_slice(&address::pack_legacy(ADDRESS).unwrap());
        let data = unpack(&protocol, &packed, 700_000).unwrap();
        assert_eq!(data.dispenser_status, 1);
        assert_eq!(data.action_address.as_deref(), Some(ADDRESS));
    }

    #[test]
    fn test_empty_address_missing_bytes() {
        let protocol = mainnet();
        let packed = pack(XCP_ID, 100, 500, 1_000, 1).unwrap();
        assert_eq!(
            unpack(&protocol, &packed, 700_000),
            Err(CodecError::CouldNotUnpack)
        );
    }

    #[test]
    fn test_closed_action_address_gated_by_flag() {
        let mut packed = pack(XCP_ID, 0, 0, 0, 10).unwrap();
        packed.extend_from_slice(&address::pack_legacy(ADDRESS).unwrap());

        // Flag active: the trailing bytes are an action address
        let data = unpack(&mainnet(), &packed, 700_000).unwrap();
        assert_eq!(data.action_address.as_deref(), Some(ADDRESS));
        assert_eq!(data.oracle_address, None);

        // Flag inactive: the same bytes read as an oracle address
        let data = unpack(&mainnet(), &packed, 690_000).unwrap();
        assert_eq!(data.action_address, None);
        assert_eq!(data.oracle_address.as_deref(), Some(ADDRESS));
    }

    #[test]
    fn test_oracle_after_action_address() {
        let protocol = regtest();
        let mut packed = pack(XCP_ID, 100, 500, 2_500, 1).unwrap();
        packed.extend_from_slice(&address::pack_legacy(ADDRESS).unwrap());
        packed.extend_from_slice(&address::pack_legacy(ORACLE).unwrap());
        let data = unpack(&protocol, &packed, 10).unwrap();
        assert_eq!(data.action_address.as_deref(), Some(ADDRESS));
        assert_eq!(data.oracle_address.as_deref(), Some(ORACLE));
    }

    #[test]
    fn test_truncated_body() {
        let protocol = mainnet();
        assert_eq!(
            unpack(&protocol, &[0u8; 20], 700_000),
            Err(CodecError::CouldNotUnpack)
        );
    }
}
