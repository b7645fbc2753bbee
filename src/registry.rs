//! Watched-address registry
//!
//! The registry owns the durable list of addresses to watch. The
//! pipeline only ever reads a point-in-time copy of it.

use crate::address::parse_display;
use anyhow::{Context, Result};
use async_trait::async_trait;
use std::path::{Path, PathBuf};

/// Source of the addresses to watch.
#[async_trait]
pub trait AddressRegistry: Send + Sync {
    /// All currently watched addresses, in display form.
    async fn list_watched_addresses(&self) -> Result<Vec<String>>;
}

/// Registry backed by a plain text file, re-read on every call.
///
/// One base58check address per line. Empty lines and lines starting
/// with '#' are ignored.
pub struct WatchlistFile {
    path: PathBuf,
}

impl WatchlistFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl AddressRegistry for WatchlistFile {
    async fn list_watched_addresses(&self) -> Result<Vec<String>> {
        let contents = tokio::fs::read_to_string(&self.path)
            .await
            .with_context(|| format!("Failed to read watchlist file: {:?}", self.path))?;
        parse_watchlist(&contents)
    }
}

/// Fixed in-memory list of addresses.
pub struct StaticRegistry {
    addresses: Vec<String>,
}

impl StaticRegistry {
    pub fn new(addresses: Vec<String>) -> Self {
        Self { addresses }
    }
}

#[async_trait]
impl AddressRegistry for StaticRegistry {
    async fn list_watched_addresses(&self) -> Result<Vec<String>> {
        Ok(self.addresses.clone())
    }
}

/// Parse watchlist file contents, validating every address.
pub fn parse_watchlist(contents: &str) -> Result<Vec<String>> {
    let mut addresses = Vec::new();
    for (line_num, line) in contents.lines().enumerate() {
        let line = line.trim();

        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        parse_display(line)
            .with_context(|| format!("Invalid address on line {}: {}", line_num + 1, line))?;
        addresses.push(line.to_string());
    }

    Ok(addresses)
}
