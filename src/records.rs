//! Persisted record types
//!
//! Stored with postcard, which is compact and deterministic.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

/// Highest block whose transactions were fully admitted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckpointRecord {
    pub last_block_number: u64,
}

impl CheckpointRecord {
    pub fn encode(&self) -> Result<Vec<u8>> {
        postcard::to_allocvec(self).context("Failed to serialize checkpoint record")
    }

    pub fn decode(bytes: &[u8]) -> Result<Self> {
        postcard::from_bytes(bytes).context("Failed to deserialize checkpoint record")
    }
}
