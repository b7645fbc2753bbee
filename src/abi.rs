//! Contract call data decoding
//!
//! Call data is a 4-byte function selector followed by one 32-byte
//! big-endian slot per static parameter. Addresses occupy the low 20
//! bytes of their slot.

use crate::address::ADDRESS_PREFIX;
use crate::error::DecodeError;
use alloy_primitives::{Address, U256};

/// Width of one ABI slot in bytes.
pub const SLOT_LEN: usize = 32;

/// Width of a function selector in bytes.
pub const SELECTOR_LEN: usize = 4;

/// `transfer(address,uint256)`
pub const TRANSFER_SELECTOR: [u8; 4] = [0xa9, 0x05, 0x9c, 0xbb];

/// Static parameter types understood by the decoder.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamType {
    Address,
    Uint256,
}

/// A decoded parameter value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Token {
    Address(Address),
    Uint(U256),
}

impl Token {
    pub fn into_address(self) -> Option<Address> {
        match self {
            Token::Address(a) => Some(a),
            _ => None,
        }
    }

    pub fn into_uint(self) -> Option<U256> {
        match self {
            Token::Uint(v) => Some(v),
            _ => None,
        }
    }
}

/// Decoded `transfer(address,uint256)` call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferCall {
    pub to: Address,
    pub amount: U256,
}

/// Parse a hex selector string such as `a9059cbb`.
pub fn parse_selector(s: &str) -> Result<[u8; 4], DecodeError> {
    let s = s.strip_prefix("0x").unwrap_or(s);
    let bytes = hex::decode(s).map_err(|e| DecodeError::InvalidHex {
        field: "selector",
        reason: e.to_string(),
    })?;
    bytes
        .try_into()
        .map_err(|b: Vec<u8>| DecodeError::CallDataTooShort {
            expected: SELECTOR_LEN,
            actual: b.len(),
        })
}

/// Whether hex call data starts with the given selector.
///
/// Cheap prefix test done before any full decode.
pub fn has_selector(data_hex: &str, selector: &[u8; 4]) -> bool {
    let data = data_hex.strip_prefix("0x").unwrap_or(data_hex);
    match data.get(..SELECTOR_LEN * 2) {
        Some(prefix) => prefix.eq_ignore_ascii_case(&hex::encode(selector)),
        None => false,
    }
}

/// Decode static parameters from their slots.
///
/// Trailing bytes past the last slot are ignored.
pub fn decode_params(types: &[ParamType], data: &[u8]) -> Result<Vec<Token>, DecodeError> {
    let expected = types.len() * SLOT_LEN;
    if data.len() < expected {
        return Err(DecodeError::CallDataTooShort {
            expected,
            actual: data.len(),
        });
    }

    types
        .iter()
        .enumerate()
        .map(|(i, ty)| {
            let slot = &data[i * SLOT_LEN..(i + 1) * SLOT_LEN];
            match ty {
                ParamType::Address => decode_address_slot(slot, i).map(Token::Address),
                ParamType::Uint256 => Ok(Token::Uint(U256::from_be_slice(slot))),
            }
        })
        .collect()
}

/// Decode a full call: hex data, selector check, then parameters.
pub fn decode_call(
    data_hex: &str,
    selector: &[u8; 4],
    types: &[ParamType],
) -> Result<Vec<Token>, DecodeError> {
    let data = data_hex.strip_prefix("0x").unwrap_or(data_hex);
    let bytes = hex::decode(data).map_err(|e| DecodeError::InvalidHex {
        field: "call data",
        reason: e.to_string(),
    })?;

    if bytes.len() < SELECTOR_LEN {
        return Err(DecodeError::CallDataTooShort {
            expected: SELECTOR_LEN,
            actual: bytes.len(),
        });
    }
    if bytes[..SELECTOR_LEN] != selector[..] {
        return Err(DecodeError::SelectorMismatch {
            expected: hex::encode(selector),
            actual: hex::encode(&bytes[..SELECTOR_LEN]),
        });
    }

    decode_params(types, &bytes[SELECTOR_LEN..])
}

/// Decode a token `transfer(address,uint256)` call.
pub fn decode_transfer(data_hex: &str, selector: &[u8; 4]) -> Result<TransferCall, DecodeError> {
    let mut tokens = decode_call(data_hex, selector, &[ParamType::Address, ParamType::Uint256])?
        .into_iter();

    // decode_params yields exactly one token per requested type
    let to = tokens
        .next()
        .and_then(Token::into_address)
        .ok_or(DecodeError::CallDataTooShort {
            expected: SELECTOR_LEN + 2 * SLOT_LEN,
            actual: 0,
        })?;
    let amount = tokens
        .next()
        .and_then(Token::into_uint)
        .ok_or(DecodeError::CallDataTooShort {
            expected: SELECTOR_LEN + 2 * SLOT_LEN,
            actual: 0,
        })?;

    Ok(TransferCall { to, amount })
}

/// The upper 12 bytes of an address slot must be zero. TRON wallets
/// sometimes leave the `0x41` network prefix in the byte right before
/// the account id, which is accepted.
fn decode_address_slot(slot: &[u8], index: usize) -> Result<Address, DecodeError> {
    let (padding, account) = slot.split_at(SLOT_LEN - 20);
    let (head, last) = padding.split_at(padding.len() - 1);
    if head.iter().any(|b| *b != 0) || !(last[0] == 0 || last[0] == ADDRESS_PREFIX) {
        return Err(DecodeError::DirtyAddressPadding { slot: index });
    }
    Ok(Address::from_slice(account))
}
