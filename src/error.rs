//! Typed errors for the decoding, queueing and filtering stages
//!
//! Collaborator-facing code (RPC, storage, registry) uses `anyhow` with
//! context; these enums cover failures callers need to match on.

use thiserror::Error;

/// Failure to interpret a contract payload as a transfer.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum DecodeError {
    #[error("invalid hex in {field}: {reason}")]
    InvalidHex { field: &'static str, reason: String },

    #[error("call data too short: expected at least {expected} bytes, got {actual}")]
    CallDataTooShort { expected: usize, actual: usize },

    #[error("function selector mismatch: expected {expected}, got {actual}")]
    SelectorMismatch { expected: String, actual: String },

    #[error("address slot {slot} has non-zero padding")]
    DirtyAddressPadding { slot: usize },

    #[error("invalid address: {0}")]
    InvalidAddress(String),

    #[error("amount {amount} cannot be scaled by 10^{decimals}")]
    AmountOutOfRange { amount: u64, decimals: u32 },

    #[error("malformed {kind} payload: {reason}")]
    MalformedPayload { kind: String, reason: String },
}

/// Admission queue failure.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum QueueError {
    #[error("admission queue is closed")]
    Closed,
}

/// Address filter construction failure.
#[derive(Debug, Error, PartialEq)]
pub enum FilterError {
    #[error("false positive rate must be in (0, 1), got {0}")]
    InvalidFalsePositiveRate(f64),
}
