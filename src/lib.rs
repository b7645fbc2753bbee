//! tron-watch - TRON transfer watcher
//!
//! Follows the TRON chain head, admits every transaction of each new block
//! to a bounded-by-backpressure queue, and decodes native TRX and TRC20
//! token transfers touching a watched set of addresses. The watched set
//! lives in a refreshable bloom-filter-fronted snapshot; progress is kept
//! in a RocksDB checkpoint so a restart resumes where it stopped.

pub mod abi;
pub mod address;
pub mod bloom;
pub mod cli;
pub mod config;
pub mod decoder;
pub mod error;
pub mod filter;
pub mod keys;
pub mod notify;
pub mod poller;
pub mod queue;
pub mod records;
pub mod registry;
pub mod rpc;
pub mod store;
pub mod types;
pub mod watcher;

#[cfg(test)]
mod testing;

// Re-export the main types for convenience
pub use config::WatcherConfig;
pub use error::{DecodeError, FilterError, QueueError};
pub use filter::AddressFilter;
pub use notify::Notifier;
pub use poller::{BlockPoller, PollerState, TickOutcome};
pub use registry::AddressRegistry;
pub use rpc::{ChainClient, TronClient};
pub use store::{CheckpointStore, MemoryCheckpointStore, RocksCheckpointStore};
pub use types::{TransferAmount, TransferEvent};
pub use watcher::Watcher;
