//! CLI implementation for watchctl
//!
//! Operator tooling around the watcher: inspect or seed the checkpoint,
//! decode transfer call data, convert addresses and validate watchlist
//! files. All commands output pretty JSON.

use crate::abi::{decode_transfer, parse_selector, TRANSFER_SELECTOR};
use crate::address::{evm_to_display, hex_to_display, parse_display};
use crate::registry::parse_watchlist;
use crate::store::{CheckpointStore, RocksCheckpointStore};
use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde_json::{json, Value};
use std::path::{Path, PathBuf};

/// Watcher operator CLI tool
#[derive(Parser)]
#[command(name = "watchctl")]
#[command(about = "TRON transfer watcher CLI tool")]
pub struct Cli {
    /// Path to the RocksDB database directory
    #[arg(short, long, default_value = "./watcher_db")]
    db_path: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Get the last processed block number
    GetCheckpoint,
    /// Set the block number the watcher resumes after
    InitCheckpoint {
        /// Block number
        block: u64,
    },
    /// Decode a token transfer call
    DecodeCall {
        /// Call data in hex (with or without 0x prefix)
        data: String,
        /// Function selector in hex (8 hex chars)
        #[arg(short, long)]
        selector: Option<String>,
    },
    /// Convert an address between hex and base58check form
    Address {
        /// Hex (41-prefixed or 20-byte) or base58check address
        address: String,
    },
    /// Validate a watchlist file
    CheckWatchlist {
        /// Path to watchlist file (one address per line)
        path: PathBuf,
    },
}

fn open_store(db_path: &Path) -> Result<RocksCheckpointStore> {
    RocksCheckpointStore::open(db_path)
        .with_context(|| format!("Failed to open database at {:?}", db_path))
}

/// Execute a single command, returning its JSON result.
pub fn execute(command: Commands, db_path: &Path) -> Result<Value> {
    let result = match command {
        Commands::GetCheckpoint => {
            let store = open_store(db_path)?;
            json!({ "last_block_number": store.load()? })
        }
        Commands::InitCheckpoint { block } => {
            let store = open_store(db_path)?;
            store.save(block)?;
            json!({ "status": "ok", "last_block_number": block })
        }
        Commands::DecodeCall { data, selector } => {
            let selector = match selector {
                Some(s) => parse_selector(&s)
                    .with_context(|| format!("Invalid selector: {}", s))?,
                None => TRANSFER_SELECTOR,
            };
            let call = decode_transfer(&data, &selector).context("Failed to decode call data")?;
            json!({
                "selector": hex::encode(selector),
                "to": evm_to_display(call.to),
                "to_hex": format!("0x{:x}", call.to),
                "amount": call.amount.to_string(),
            })
        }
        Commands::Address { address } => {
            if let Ok(bytes) = parse_display(&address) {
                json!({
                    "base58": address,
                    "hex": hex::encode(bytes),
                })
            } else {
                let display = hex_to_display(&address)
                    .with_context(|| format!("Not a TRON address: {}", address))?;
                let bytes = parse_display(&display)?;
                json!({
                    "base58": display,
                    "hex": hex::encode(bytes),
                })
            }
        }
        Commands::CheckWatchlist { path } => {
            let contents = std::fs::read_to_string(&path)
                .with_context(|| format!("Failed to read watchlist file: {:?}", path))?;
            let addresses = parse_watchlist(&contents)?;
            json!({
                "path": path,
                "count": addresses.len(),
                "addresses": addresses,
            })
        }
    };
    Ok(result)
}

/// Run the CLI command and print JSON output.
pub fn run() -> Result<()> {
    let cli = Cli::parse();
    let result = execute(cli.command, &cli.db_path)?;

    // Pretty print JSON
    println!("{}", serde_json::to_string_pretty(&result)?);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::{NamedTempFile, TempDir};

    const USDT_HEX: &str = "41a614f803b6fd780986a42c78ec9c7f77e6ded13c";
    const USDT_BASE58: &str = "TR7NHqjeKQxGTCi8q8ZY4pL8otSzgjLj6t";

    #[test]
    fn test_checkpoint_commands() {
        let dir = TempDir::new().unwrap();

        let empty = execute(Commands::GetCheckpoint, dir.path()).unwrap();
        assert_eq!(empty["last_block_number"], Value::Null);

        execute(Commands::InitCheckpoint { block: 42 }, dir.path()).unwrap();
        let got = execute(Commands::GetCheckpoint, dir.path()).unwrap();
        assert_eq!(got["last_block_number"], 42);

        assert!(execute(Commands::InitCheckpoint { block: 41 }, dir.path()).is_err());
    }

    #[test]
    fn test_decode_call() {
        let data = format!(
            "0xa9059cbb{:0>64}{:064x}",
            &USDT_HEX[2..],
            1_500_000u64
        );
        let out = execute(
            Commands::DecodeCall {
                data,
                selector: None,
            },
            Path::new("unused"),
        )
        .unwrap();
        assert_eq!(out["to"], USDT_BASE58);
        assert_eq!(out["amount"], "1500000");
        assert_eq!(out["selector"], "a9059cbb");
    }

    #[test]
    fn test_address_both_directions() {
        let from_hex = execute(
            Commands::Address {
                address: USDT_HEX.into(),
            },
            Path::new("unused"),
        )
        .unwrap();
        assert_eq!(from_hex["base58"], USDT_BASE58);

        let from_base58 = execute(
            Commands::Address {
                address: USDT_BASE58.into(),
            },
            Path::new("unused"),
        )
        .unwrap();
        assert_eq!(from_base58["hex"], USDT_HEX);

        assert!(execute(
            Commands::Address {
                address: "nope".into()
            },
            Path::new("unused"),
        )
        .is_err());
    }

    #[test]
    fn test_check_watchlist() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "# treasury").unwrap();
        writeln!(file, "{}", USDT_BASE58).unwrap();
        let out = execute(
            Commands::CheckWatchlist {
                path: file.path().to_path_buf(),
            },
            Path::new("unused"),
        )
        .unwrap();
        assert_eq!(out["count"], 1);
        assert_eq!(out["addresses"][0], USDT_BASE58);
    }
}
