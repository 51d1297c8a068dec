//! Broadcast message codec.
//!
//! Legacy form: `>IdI` header (timestamp, value, fee_fraction_int) followed
//! by the feed text as a Pascal string (total text area ≤ 52 bytes), a raw
//! byte string, or — once `broadcast_pack_text` activates — a varint
//! length-prefixed string. Taproot form: a CBOR array
//! `[timestamp, value, fee_fraction_int, mime_type, content]`, with a
//! fallback to the legacy layout when CBOR decoding fails.

use super::CodecError;
use crate::protocol::ProtocolRules;
use crate::utils::content::{bytes_to_content, content_to_bytes};
use bitcoin::consensus::encode::VarInt;
use byteorder::{BigEndian, ReadBytesExt, WriteBytesExt};
use minicbor::data::Type;
use std::io::Cursor;

/// Fixed `>IdI` header length.
const HEADER_LENGTH: usize = 16;

/// Longest text area still encoded as a Pascal string.
const PASCAL_LIMIT: usize = 52;

/// A decoded broadcast, before validation.
///
/// `timestamp` and `fee_fraction_int` are kept wide: the CBOR form can
/// carry integers past the ledger bounds and overflow detection is a
/// validation concern, not a codec one.
#[derive(Debug, Clone, PartialEq)]
pub struct BroadcastData {
    pub timestamp: i128,
    pub value: Option<f64>,
    pub fee_fraction_int: i128,
    pub mime_type: String,
    pub text: String,
}

/// Decode a broadcast body (message-type tag already stripped).
pub fn unpack(
    protocol: &ProtocolRules,
    message: &[u8],
    block_index: u32,
) -> Result<BroadcastData, CodecError> {
    if protocol.enabled("taproot_support", Some(block_index)) {
        match load_cbor(message) {
            Ok(data) => Ok(data),
            Err(_) => load_legacy(protocol, message, block_index),
        }
    } else {
        load_legacy(protocol, message, block_index)
    }
}

/// Encode a broadcast body in the legacy (pre-taproot) layout.
pub fn pack_legacy(
    protocol: &ProtocolRules,
    timestamp: i64,
    value: f64,
    fee_fraction_int: i64,
    text: &str,
    block_index: u32,
) -> Result<Vec<u8>, CodecError> {
    let timestamp = u32::try_from(timestamp)
        .map_err(|_| CodecError::Encode("timestamp out of range".to_string()))?;
    let fee_fraction_int = u32::try_from(fee_fraction_int)
        .map_err(|_| CodecError::Encode("fee fraction out of range".to_string()))?;

    let mut data = Vec::with_capacity(HEADER_LENGTH + text.len() + 1);
    data.write_u32::<BigEndian>(timestamp)
        .and_then(|_| data.write_f64::<BigEndian>(value))
        .and_then(|_| data.write_u32::<BigEndian>(fee_fraction_int))
        .map_err(|e| CodecError::Encode(e.to_string()))?;

    let text_bytes = text.as_bytes();
    if protocol.enabled("broadcast_pack_text", Some(block_index)) {
        data.extend_from_slice(&bitcoin::consensus::encode::serialize(&VarInt(
            text_bytes.len() as u64,
        )));
        data.extend_from_slice(text_bytes);
    } else if text_bytes.len() <= PASCAL_LIMIT {
        data.push(text_bytes.len() as u8);
        data.extend_from_slice(text_bytes);
    } else {
        data.extend_from_slice(text_bytes);
    }
    Ok(data)
}

/// Encode a broadcast body in the taproot CBOR layout.
pub fn pack_taproot(
    timestamp: i64,
    value: f64,
    fee_fraction_int: i64,
    mime_type: &str,
    text: &str,
) -> Result<Vec<u8>, CodecError> {
    let effective_mime = if mime_type.is_empty() {
        "text/plain"
    } else {
        mime_type
    };
    let content = content_to_bytes(text, effective_mime).map_err(CodecError::Encode)?;

    let mut buf = Vec::new();
    let mut encoder = minicbor::Encoder::new(&mut buf);
    encoder
        .array(5)
        .and_then(|e| e.i64(timestamp))
        .and_then(|e| e.f64(value))
        .and_then(|e| e.i64(fee_fraction_int))
        .and_then(|e| e.str(mime_type))
        .and_then(|e| e.bytes(&content))
        .map_err(|e| CodecError::Encode(e.to_string()))?;
    Ok(buf)
}

fn load_cbor(message: &[u8]) -> Result<BroadcastData, CodecError> {
    let mut decoder = minicbor::Decoder::new(message);

    let array_len = decoder.array().map_err(|_| CodecError::CouldNotUnpack)?;
    if array_len != Some(5) {
        return Err(CodecError::CouldNotUnpack);
    }

    let timestamp = decode_int(&mut decoder)?;

    let value = match decoder.datatype().map_err(|_| CodecError::CouldNotUnpack)? {
        Type::F16 | Type::F32 | Type::F64 => Some(
            decoder.f64().map_err(|_| CodecError::CouldNotUnpack)?,
        ),
        Type::Null => {
            decoder.skip().map_err(|_| CodecError::CouldNotUnpack)?;
            None
        }
        _ => Some(decode_int(&mut decoder)? as f64),
    };

    let fee_fraction_int = decode_int(&mut decoder)?;

    let mime_type = match decoder.datatype().map_err(|_| CodecError::CouldNotUnpack)? {
        Type::String => decoder
            .str()
            .map_err(|_| CodecError::CouldNotUnpack)?
            .to_owned(),
        Type::Null => {
            decoder.skip().map_err(|_| CodecError::CouldNotUnpack)?;
            String::new()
        }
        _ => return Err(CodecError::CouldNotUnpack),
    };

    let content = match decoder.datatype().map_err(|_| CodecError::CouldNotUnpack)? {
        Type::Bytes => decoder
            .bytes()
            .map_err(|_| CodecError::CouldNotUnpack)?
            .to_vec(),
        Type::String => decoder
            .str()
            .map_err(|_| CodecError::CouldNotUnpack)?
            .as_bytes()
            .to_vec(),
        _ => return Err(CodecError::CouldNotUnpack),
    };

    let mime_type = if mime_type.is_empty() {
        "text/plain".to_string()
    } else {
        mime_type
    };
    let text = bytes_to_content(&content, &mime_type).map_err(|_| CodecError::CouldNotUnpack)?;

    Ok(BroadcastData {
        timestamp,
        value,
        fee_fraction_int,
        mime_type,
        text,
    })
}

fn decode_int(decoder: &mut minicbor::Decoder) -> Result<i128, CodecError> {
    decoder
        .int()
        .map(i128::from)
        .map_err(|_| CodecError::CouldNotUnpack)
}

fn load_legacy(
    protocol: &ProtocolRules,
    message: &[u8],
    block_index: u32,
) -> Result<BroadcastData, CodecError> {
    if message.len() < HEADER_LENGTH {
        return Err(CodecError::CouldNotUnpack);
    }

    let mut cursor = Cursor::new(message);
    let timestamp = cursor
        .read_u32::<BigEndian>()
        .map_err(|_| CodecError::CouldNotUnpack)?;
    let value = cursor
        .read_f64::<BigEndian>()
        .map_err(|_| CodecError::CouldNotUnpack)?;
    let fee_fraction_int = cursor
        .read_u32::<BigEndian>()
        .map_err(|_| CodecError::CouldNotUnpack)?;

    let text_area = &message[HEADER_LENGTH..];
    let text_bytes: &[u8] = if protocol.enabled("broadcast_pack_text", Some(block_index)) {
        let (VarInt(text_len), _) =
            bitcoin::consensus::encode::deserialize_partial::<VarInt>(text_area)
                .map_err(|_| CodecError::CouldNotUnpack)?;
        let text_len = text_len as usize;
        if text_len == 0 {
            &[]
        } else if text_len > text_area.len() {
            return Err(CodecError::CouldNotUnpackText);
        } else {
            // The length counts from the end of the payload
            &text_area[text_area.len() - text_len..]
        }
    } else if text_area.is_empty() {
        &[]
    } else if text_area.len() <= PASCAL_LIMIT {
        let declared = text_area[0] as usize;
        let taken = declared.min(text_area.len() - 1);
        &text_area[1..1 + taken]
    } else {
        text_area
    };

    // Undecodable text degrades to empty rather than failing the message
    let text = String::from_utf8(text_bytes.to_vec()).unwrap_or_default();

    Ok(BroadcastData {
        timestamp: i128::from(timestamp),
        value: Some(value),
        fee_fraction_int: i128::from(fee_fraction_int),
        mime_type: "text/plain".to_string(),
        text,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Network;
    use crate::state::CurrentState;

    const PASCAL_HEIGHT: u32 = 400_000;
    const VARINT_HEIGHT: u32 = 800_000;

    fn mainnet() -> ProtocolRules {
        ProtocolRules::new(Network::Mainnet, CurrentState::new())
    }

    fn regtest() -> ProtocolRules {
        ProtocolRules::new(Network::Regtest, CurrentState::new())
    }

    #[test]
    fn test_pascal_round_trip() {
        let protocol = mainnet();
        let packed =
            pack_legacy(&protocol, 1_609_459_200, 100.5, 5_000_000, "odds", PASCAL_HEIGHT)
                .unwrap();
        let data = unpack(&protocol, &packed, PASCAL_HEIGHT).unwrap();
        assert_eq!(data.timestamp, 1_609_459_200);
        assert_eq!(data.value, Some(100.5));
        assert_eq!(data.fee_fraction_int, 5_000_000);
        assert_eq!(data.text, "odds");
        assert_eq!(data.mime_type, "text/plain");
    }

    #[test]
    fn test_pascal_empty_text() {
        let protocol = mainnet();
        let packed = pack_legacy(&protocol, 100, 1.0, 0, "", PASCAL_HEIGHT).unwrap();
        let data = unpack(&protocol, &packed, PASCAL_HEIGHT).unwrap();
        assert_eq!(data.text, "");
    }

    #[test]
    fn test_long_text_uses_raw_string() {
        let protocol = mainnet();
        let text = "x".repeat(60);
        let packed = pack_legacy(&protocol, 100, 1.0, 0, &text, PASCAL_HEIGHT).unwrap();
        assert_eq!(packed.len(), 16 + 60);
        let data = unpack(&protocol, &packed, PASCAL_HEIGHT).unwrap();
        assert_eq!(data.text, text);
    }

    #[test]
    fn test_varint_round_trip() {
        let protocol = mainnet();
        let text = "price feed text that easily exceeds the old pascal limit of fifty-two";
        let packed = pack_legacy(&protocol, 1_700_000_000, 20.0, 0, text, VARINT_HEIGHT).unwrap();
        let data = unpack(&protocol, &packed, VARINT_HEIGHT).unwrap();
        assert_eq!(data.text, text);
        assert_eq!(data.value, Some(20.0));
    }

    #[test]
    fn test_varint_zero_length() {
        let protocol = mainnet();
        let packed = pack_legacy(&protocol, 100, 1.0, 0, "", VARINT_HEIGHT).unwrap();
        let data = unpack(&protocol, &packed, VARINT_HEIGHT).unwrap();
        assert_eq!(data.text, "");
    }

    #[test]
    fn test_varint_length_mismatch() {
        let protocol = mainnet();
        let mut packed = pack_legacy(&protocol, 100, 1.0, 0, "abc", VARINT_HEIGHT).unwrap();
        // Declare more text than the payload carries
        packed[HEADER_LENGTH] = 200;
        assert_eq!(
            unpack(&protocol, &packed, VARINT_HEIGHT),
            Err(CodecError::CouldNotUnpackText)
        );
    }

    #[test]
    fn test_truncated_header() {
        let protocol = mainnet();
        assert_eq!(
            unpack(&protocol, &[0u8; 10], PASCAL_HEIGHT),
            Err(CodecError::CouldNotUnpack)
        );
    }

    #[test]
    fn test_cbor_round_trip() {
        let protocol = regtest();
        let packed = pack_taproot(1_700_000_000, 42.5, 1_000, "text/plain", "hello").unwrap();
        let data = unpack(&protocol, &packed, 10).unwrap();
        assert_eq!(data.timestamp, 1_700_000_000);
        assert_eq!(data.value, Some(42.5));
        assert_eq!(data.fee_fraction_int, 1_000);
        assert_eq!(data.mime_type, "text/plain");
        assert_eq!(data.text, "hello");
    }

    #[test]
    fn test_cbor_binary_content() {
        let protocol = regtest();
        let packed = pack_taproot(100, 0.0, 0, "application/octet-stream", "cafebabe").unwrap();
        let data = unpack(&protocol, &packed, 10).unwrap();
        assert_eq!(data.mime_type, "application/octet-stream");
        assert_eq!(data.text, "cafebabe");
    }

    #[test]
    fn test_taproot_falls_back_to_legacy() {
        // A legacy payload in the taproot era still decodes via fallback
        let protocol = regtest();
        let legacy_protocol = mainnet();
        let packed =
            pack_legacy(&legacy_protocol, 500, 7.0, 0, "legacy", PASCAL_HEIGHT).unwrap();
        let data = unpack(&protocol, &packed, 10).unwrap();
        assert_eq!(data.timestamp, 500);
        // Regtest has broadcast_pack_text active, so the text area reads as
        // varint-prefixed; the fallback recovers the header regardless
        assert_eq!(data.value, Some(7.0));
    }
}
