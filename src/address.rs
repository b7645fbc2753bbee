//! TRON address encoding
//!
//! TRON addresses are 21 bytes: a `0x41` network prefix followed by the
//! 20-byte account id used inside the EVM. The node API reports them as
//! hex (`41...`), users see them as base58check strings (`T...`).

use crate::error::DecodeError;
use alloy_primitives::Address;

/// Mainnet address prefix byte.
pub const ADDRESS_PREFIX: u8 = 0x41;

/// Length of a prefixed TRON address in bytes.
pub const ADDRESS_LEN: usize = 21;

/// Convert a hex address (with or without `0x`, with or without the
/// `41` prefix) to its base58check display form.
pub fn hex_to_display(s: &str) -> Result<String, DecodeError> {
    let s = s.strip_prefix("0x").unwrap_or(s);
    let bytes = hex::decode(s).map_err(|e| DecodeError::InvalidHex {
        field: "address",
        reason: e.to_string(),
    })?;

    match bytes.len() {
        20 => Ok(evm_to_display(Address::from_slice(&bytes))),
        ADDRESS_LEN if bytes[0] == ADDRESS_PREFIX => Ok(encode_base58check(&bytes)),
        ADDRESS_LEN => Err(DecodeError::InvalidAddress(format!(
            "unexpected prefix byte 0x{:02x}",
            bytes[0]
        ))),
        n => Err(DecodeError::InvalidAddress(format!(
            "expected 20 or 21 bytes, got {}",
            n
        ))),
    }
}

/// Display form of a 20-byte account id.
pub fn evm_to_display(addr: Address) -> String {
    let mut payload = [0u8; ADDRESS_LEN];
    payload[0] = ADDRESS_PREFIX;
    payload[1..].copy_from_slice(addr.as_slice());
    encode_base58check(&payload)
}

/// Parse a base58check display address back to its 21 raw bytes.
pub fn parse_display(s: &str) -> Result<[u8; ADDRESS_LEN], DecodeError> {
    let bytes = bs58::decode(s)
        .with_check(None)
        .into_vec()
        .map_err(|e| DecodeError::InvalidAddress(format!("{}: {}", s, e)))?;

    if bytes.len() != ADDRESS_LEN {
        return Err(DecodeError::InvalidAddress(format!(
            "{}: expected {} bytes, got {}",
            s,
            ADDRESS_LEN,
            bytes.len()
        )));
    }
    if bytes[0] != ADDRESS_PREFIX {
        return Err(DecodeError::InvalidAddress(format!(
            "{}: unexpected prefix byte 0x{:02x}",
            s, bytes[0]
        )));
    }

    let mut out = [0u8; ADDRESS_LEN];
    out.copy_from_slice(&bytes);
    Ok(out)
}

fn encode_base58check(payload: &[u8]) -> String {
    bs58::encode(payload).with_check().into_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    // USDT on TRON mainnet.
    const USDT_HEX: &str = "41a614f803b6fd780986a42c78ec9c7f77e6ded13c";
    const USDT_BASE58: &str = "TR7NHqjeKQxGTCi8q8ZY4pL8otSzgjLj6t";

    #[test]
    fn test_hex_to_display_known_address() {
        assert_eq!(hex_to_display(USDT_HEX).unwrap(), USDT_BASE58);
    }

    #[test]
    fn test_hex_to_display_without_prefix_byte() {
        // Same account id, 20-byte form as it appears in ABI slots
        let display = hex_to_display("0xa614f803b6fd780986a42c78ec9c7f77e6ded13c").unwrap();
        assert_eq!(display, USDT_BASE58);
    }

    #[test]
    fn test_parse_display_roundtrip() {
        let bytes = parse_display(USDT_BASE58).unwrap();
        assert_eq!(hex::encode(bytes), USDT_HEX);
    }

    #[test]
    fn test_rejects_wrong_prefix() {
        let err = hex_to_display("42a614f803b6fd780986a42c78ec9c7f77e6ded13c").unwrap_err();
        assert!(matches!(err, DecodeError::InvalidAddress(_)));
    }

    #[test]
    fn test_rejects_wrong_length() {
        assert!(hex_to_display("41a614").is_err());
        assert!(hex_to_display("zz").is_err());
    }

    #[test]
    fn test_parse_display_rejects_bad_checksum() {
        // Last character changed
        assert!(parse_display("TR7NHqjeKQxGTCi8q8ZY4pL8otSzgjLj6u").is_err());
    }
}
