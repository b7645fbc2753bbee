//! CheckpointStore trait and implementations
//!
//! Persists the number of the last block whose transactions were fully
//! admitted. The value only ever moves forward.

use crate::keys::checkpoint_key;
use crate::records::CheckpointRecord;
use anyhow::{Context, Result};
use rocksdb::{ColumnFamilyDescriptor, Options, WriteOptions, DB};
use std::path::Path;
use std::sync::{Arc, Mutex};

/// Durable "last processed block" marker.
pub trait CheckpointStore: Send + Sync {
    /// The persisted block number, or `None` if never initialized.
    fn load(&self) -> Result<Option<u64>>;

    /// Persist `block` as the last processed block.
    ///
    /// Either the new value is durable when this returns `Ok`, or an
    /// error is returned and the previous value is still in place.
    /// Saving a value lower than the stored one is an error.
    fn save(&self, block: u64) -> Result<()>;
}

impl<T: CheckpointStore + ?Sized> CheckpointStore for Arc<T> {
    fn load(&self) -> Result<Option<u64>> {
        (**self).load()
    }

    fn save(&self, block: u64) -> Result<()> {
        (**self).save(block)
    }
}

/// RocksDB-backed checkpoint store.
///
/// Column families:
/// - meta: singleton records (checkpoint)
pub struct RocksCheckpointStore {
    db: DB,
}

impl RocksCheckpointStore {
    /// Open or create a RocksDB database at the given path.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let mut opts = Options::default();
        opts.create_if_missing(true);
        opts.create_missing_column_families(true);

        let column_families = vec![ColumnFamilyDescriptor::new("meta", Options::default())];

        let db = DB::open_cf_descriptors(&opts, path, column_families)
            .context("Failed to open RocksDB database")?;

        Ok(Self { db })
    }

    fn get_cf(&self, name: &str) -> Result<&rocksdb::ColumnFamily> {
        self.db
            .cf_handle(name)
            .with_context(|| format!("Column family '{}' not found", name))
    }
}

impl CheckpointStore for RocksCheckpointStore {
    fn load(&self) -> Result<Option<u64>> {
        let cf = self.get_cf("meta")?;
        match self
            .db
            .get_cf(cf, checkpoint_key())
            .context("Failed to get checkpoint")?
        {
            Some(bytes) => Ok(Some(CheckpointRecord::decode(&bytes)?.last_block_number)),
            None => Ok(None),
        }
    }

    fn save(&self, block: u64) -> Result<()> {
        if let Some(current) = self.load()? {
            if block < current {
                anyhow::bail!(
                    "Refusing to move checkpoint backwards from {} to {}",
                    current,
                    block
                );
            }
        }

        let cf = self.get_cf("meta")?;
        let value = CheckpointRecord {
            last_block_number: block,
        }
        .encode()?;

        let mut write_opts = WriteOptions::default();
        write_opts.set_sync(true);
        self.db
            .put_cf_opt(cf, checkpoint_key(), value, &write_opts)
            .context("Failed to put checkpoint")?;
        Ok(())
    }
}

/// In-memory checkpoint store, lost on restart.
#[derive(Default)]
pub struct MemoryCheckpointStore {
    value: Mutex<Option<u64>>,
}

impl MemoryCheckpointStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_checkpoint(block: u64) -> Self {
        Self {
            value: Mutex::new(Some(block)),
        }
    }
}

impl CheckpointStore for MemoryCheckpointStore {
    fn load(&self) -> Result<Option<u64>> {
        let guard = self
            .value
            .lock()
            .map_err(|_| anyhow::anyhow!("Checkpoint lock poisoned"))?;
        Ok(*guard)
    }

    fn save(&self, block: u64) -> Result<()> {
        let mut guard = self
            .value
            .lock()
            .map_err(|_| anyhow::anyhow!("Checkpoint lock poisoned"))?;
        if let Some(current) = *guard {
            if block < current {
                anyhow::bail!(
                    "Refusing to move checkpoint backwards from {} to {}",
                    current,
                    block
                );
            }
        }
        *guard = Some(block);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn create_test_store() -> (RocksCheckpointStore, TempDir) {
        let temp_dir = TempDir::new().unwrap();
        let store = RocksCheckpointStore::open(temp_dir.path()).unwrap();
        (store, temp_dir)
    }

    #[test]
    fn test_missing_checkpoint_is_none() {
        let (store, _temp_dir) = create_test_store();
        assert_eq!(store.load().unwrap(), None);
    }

    #[test]
    fn test_checkpoint_roundtrip() {
        let (store, _temp_dir) = create_test_store();
        store.save(100).unwrap();
        assert_eq!(store.load().unwrap(), Some(100));

        // Upsert
        store.save(101).unwrap();
        assert_eq!(store.load().unwrap(), Some(101));

        // Same value again is fine
        store.save(101).unwrap();
        assert_eq!(store.load().unwrap(), Some(101));
    }

    #[test]
    fn test_checkpoint_never_moves_backwards() {
        let (store, _temp_dir) = create_test_store();
        store.save(200).unwrap();
        assert!(store.save(199).is_err());
        assert_eq!(store.load().unwrap(), Some(200));
    }

    #[test]
    fn test_checkpoint_survives_reopen() {
        let temp_dir = TempDir::new().unwrap();
        {
            let store = RocksCheckpointStore::open(temp_dir.path()).unwrap();
            store.save(65_992_300).unwrap();
        }
        let store = RocksCheckpointStore::open(temp_dir.path()).unwrap();
        assert_eq!(store.load().unwrap(), Some(65_992_300));
    }

    #[test]
    fn test_memory_store() {
        let store = MemoryCheckpointStore::new();
        assert_eq!(store.load().unwrap(), None);
        store.save(5).unwrap();
        assert!(store.save(4).is_err());
        assert_eq!(store.load().unwrap(), Some(5));

        let seeded = MemoryCheckpointStore::with_checkpoint(9);
        assert_eq!(seeded.load().unwrap(), Some(9));
    }
}
