//! Watched-address filter
//!
//! Two tiers: a bloom filter answers the common "not watched" case with
//! k hash evaluations, the exact set confirms positives. Snapshots are
//! immutable and published with an atomic pointer swap, so lookups never
//! lock and never see a half-built snapshot.

use crate::bloom::BloomFilter;
use crate::error::FilterError;
use crate::registry::AddressRegistry;
use anyhow::{Context, Result};
use arc_swap::ArcSwap;
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Default target false positive rate.
pub const DEFAULT_FALSE_POSITIVE_RATE: f64 = 0.01;

/// Point-in-time view of the watched addresses.
#[derive(Debug)]
pub struct FilterSnapshot {
    bloom: BloomFilter,
    exact: HashSet<String>,
}

impl FilterSnapshot {
    /// Build a snapshot sized for `addresses` at rate `p`.
    pub fn build(addresses: &[String], p: f64) -> Result<Self, FilterError> {
        validate_rate(p)?;

        let mut bloom = BloomFilter::with_rate(addresses.len(), p);
        for address in addresses {
            bloom.insert(address.as_bytes());
        }
        let exact = addresses.iter().cloned().collect();

        Ok(Self { bloom, exact })
    }

    pub fn is_member(&self, address: &str) -> bool {
        if !self.bloom.contains(address.as_bytes()) {
            return false;
        }
        self.exact.contains(address)
    }

    /// Number of distinct addresses in the exact set.
    pub fn len(&self) -> usize {
        self.exact.len()
    }

    pub fn is_empty(&self) -> bool {
        self.exact.is_empty()
    }

    pub fn bloom(&self) -> &BloomFilter {
        &self.bloom
    }
}

/// Shared, refreshable address filter.
pub struct AddressFilter {
    current: ArcSwap<FilterSnapshot>,
    false_positive_rate: f64,
}

impl AddressFilter {
    /// Create a filter with an empty snapshot.
    ///
    /// Fails if `false_positive_rate` is not strictly between 0 and 1.
    pub fn new(false_positive_rate: f64) -> Result<Self, FilterError> {
        let empty = FilterSnapshot::build(&[], false_positive_rate)?;
        Ok(Self {
            current: ArcSwap::from_pointee(empty),
            false_positive_rate,
        })
    }

    pub fn is_member(&self, address: &str) -> bool {
        self.current.load().is_member(address)
    }

    /// The snapshot currently published.
    pub fn snapshot(&self) -> Arc<FilterSnapshot> {
        self.current.load_full()
    }

    /// Build a new snapshot and publish it atomically.
    pub fn refresh(&self, addresses: &[String]) -> Result<(), FilterError> {
        let snapshot = FilterSnapshot::build(addresses, self.false_positive_rate)?;
        debug!(
            "Built address filter: {} addresses, m={}, k={}",
            snapshot.len(),
            snapshot.bloom.size_bits(),
            snapshot.bloom.hash_count()
        );
        self.current.store(Arc::new(snapshot));
        Ok(())
    }

    /// Fetch the watched addresses and rebuild on the blocking pool.
    ///
    /// On any error the previously published snapshot stays in place.
    pub async fn reload(self: &Arc<Self>, registry: &dyn AddressRegistry) -> Result<usize> {
        let addresses = registry
            .list_watched_addresses()
            .await
            .context("Failed to list watched addresses")?;
        let count = addresses.len();

        let filter = Arc::clone(self);
        tokio::task::spawn_blocking(move || filter.refresh(&addresses))
            .await
            .context("Filter rebuild task failed")?
            .context("Failed to build address filter")?;

        if self.snapshot().is_empty() {
            warn!("Registry returned no watched addresses");
        } else {
            info!("Watched addresses updated ({} addresses)", count);
        }
        Ok(count)
    }
}

fn validate_rate(p: f64) -> Result<(), FilterError> {
    if p > 0.0 && p < 1.0 {
        Ok(())
    } else {
        Err(FilterError::InvalidFalsePositiveRate(p))
    }
}
