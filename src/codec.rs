//! Wire codec for protocol payloads.
//!
//! Layouts are consensus-critical and reproduced bit-exactly: big-endian
//! fixed-width fields, Pascal/varint text framing, 21-byte legacy address
//! packing, and the CBOR framing of the taproot era.

pub mod address;
pub mod broadcast;
pub mod dispenser;

use crate::protocol::ProtocolRules;
use byteorder::{BigEndian, ByteOrder};
use thiserror::Error;

/// Codec failures. On the replay path these are demoted to
/// `"invalid: could not unpack"` statuses and never abort a block.
#[derive(Error, Debug, PartialEq, Eq)]
pub enum CodecError {
    #[error("could not unpack")]
    CouldNotUnpack,

    /// The varint text length disagrees with the bytes present.
    #[error("could not unpack text")]
    CouldNotUnpackText,

    #[error("could not pack: {0}")]
    Encode(String),
}

/// Split the leading message-type tag from a payload.
///
/// Taproot-era messages carry a one-byte tag; everything before that uses
/// a four-byte big-endian word. A leading zero byte always falls through
/// to the legacy form (0 is not a valid short tag).
pub fn unpack_message_type<'a>(
    protocol: &ProtocolRules,
    data: &'a [u8],
    block_index: u32,
) -> (Option<u32>, &'a [u8]) {
    if data.len() > 1 && protocol.enabled("taproot_support", Some(block_index)) {
        let short_id = u32::from(data[0]);
        if short_id > 0 {
            return (Some(short_id), &data[1..]);
        }
    }
    if data.len() >= 4 {
        let message_type_id = BigEndian::read_u32(&data[0..4]);
        return (Some(message_type_id), &data[4..]);
    }
    (None, data)
}

/// Inverse of [`unpack_message_type`] for the compose path.
pub fn pack_message_type(
    protocol: &ProtocolRules,
    message_type_id: u32,
    block_index: u32,
) -> Vec<u8> {
    if message_type_id > 0
        && message_type_id <= 255
        && protocol.enabled("taproot_support", Some(block_index))
    {
        vec![message_type_id as u8]
    } else {
        let mut buf = [0u8; 4];
        BigEndian::write_u32(&mut buf, message_type_id);
        buf.to_vec()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Network;
    use crate::state::CurrentState;

    fn rules(network: Network) -> ProtocolRules {
        ProtocolRules::new(network, CurrentState::new())
    }

    #[test]
    fn test_legacy_four_byte_tag() {
        let protocol = rules(Network::Mainnet);
        let data = [0u8, 0, 0, 30, 0xAA, 0xBB];
        let (id, rest) = unpack_message_type(&protocol, &data, 400_000);
        assert_eq!(id, Some(30));
        assert_eq!(rest, &[0xAA, 0xBB]);
    }

    #[test]
    fn test_short_tag_when_taproot_active() {
        let protocol = rules(Network::Regtest);
        let data = [30u8, 0xAA];
        let (id, rest) = unpack_message_type(&protocol, &data, 10);
        assert_eq!(id, Some(30));
        assert_eq!(rest, &[0xAA]);
    }

    #[test]
    fn test_zero_first_byte_falls_back_to_legacy() {
        let protocol = rules(Network::Regtest);
        let data = [0u8, 0, 0, 12, 0x01];
        let (id, rest) = unpack_message_type(&protocol, &data, 10);
        assert_eq!(id, Some(12));
        assert_eq!(rest, &[0x01]);
    }

    #[test]
    fn test_truncated_payload_has_no_tag() {
        let protocol = rules(Network::Mainnet);
        let (id, _) = unpack_message_type(&protocol, &[0u8, 0], 400_000);
        assert_eq!(id, None);
    }

    #[test]
    fn test_pack_round_trip_both_eras() {
        let legacy = rules(Network::Mainnet);
        let packed = pack_message_type(&legacy, 30, 400_000);
        assert_eq!(packed.len(), 4);
        let (id, _) = unpack_message_type(&legacy, &packed, 400_000);
        assert_eq!(id, Some(30));

        let taproot = rules(Network::Regtest);
        let packed = pack_message_type(&taproot, 30, 10);
        assert_eq!(packed, vec![30]);
        let (id, _) = unpack_message_type(&taproot, &[packed, vec![0u8]].concat(), 10);
        assert_eq!(id, Some(30));
    }
}
