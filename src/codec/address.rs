//! Legacy 21-byte address packing: one version byte plus hash160,
//! i.e. a base58check address with the checksum stripped.

use super::CodecError;
use bitcoin::base58;

pub const PACKED_LENGTH: usize = 21;

/// Pack a base58check address into its 21-byte wire form.
///
/// Only legacy addresses fit this encoding; bech32 destinations cannot
/// appear in the trailing address fields of a dispenser message.
pub fn pack_legacy(address: &str) -> Result<[u8; PACKED_LENGTH], CodecError> {
    let decoded = base58::decode_check(address)
        .map_err(|e| CodecError::Encode(format!("not a legacy address: {e}")))?;
    decoded
        .try_into()
        .map_err(|_| CodecError::Encode("not a legacy address: wrong payload length".to_string()))
}

/// Unpack a 21-byte wire form back into a base58check address.
pub fn unpack_legacy(bytes: &[u8]) -> Result<String, CodecError> {
    if bytes.len() != PACKED_LENGTH {
        return Err(CodecError::CouldNotUnpack);
    }
    Ok(base58::encode_check(bytes))
}

#[cfg(test)]
mod tests {
    use super::*;

    // Genesis coinbase address
    const ADDRESS: &str = "1A1zP1eP5QGefi2DMPTfTL5SLmv7DivfNa";

    #[test]
    fn test_pack_unpack_round_trip() {
        let packed = pack_legacy(ADDRESS).unwrap();
        assert_eq!(packed.len(), PACKED_LENGTH);
        assert_eq!(packed[0], 0x00); // mainnet P2PKH version
        assert_eq!(unpack_legacy(&packed).unwrap(), ADDRESS);
    }

    #[test]
    fn test_pack_rejects_garbage() {
        assert!(pack_legacy("not-an-address").is_err());
    }

    #[test]
    fn test_unpack_rejects_wrong_length() {
        assert_eq!(
            unpack_legacy(&[0u8; 20]),
            Err(CodecError::CouldNotUnpack)
        );
    }
}
