//! Watcher configuration
//!
//! Every tunable of the pipeline with its default. Values are checked
//! once at startup; an invalid configuration is the only fatal error.

use crate::abi::{parse_selector, TRANSFER_SELECTOR};
use crate::filter::DEFAULT_FALSE_POSITIVE_RATE;
use crate::queue::DEFAULT_MAX_DEPTH;
use anyhow::{Context, Result};
use std::time::Duration;

/// Default TRON full node.
pub const DEFAULT_FULL_NODE: &str = "https://api.trongrid.io";

/// Largest scale a `rust_decimal::Decimal` can carry.
const MAX_NATIVE_DECIMALS: u32 = 28;

/// Pipeline settings.
#[derive(Debug, Clone, PartialEq)]
pub struct WatcherConfig {
    /// Time between poll ticks
    pub poll_interval: Duration,
    /// Queue depth above which the poller stops admitting blocks
    pub max_queue_depth: usize,
    /// Target false positive rate of the address bloom filter
    pub false_positive_rate: f64,
    /// Time between address filter rebuilds
    pub filter_refresh_interval: Duration,
    /// Native amounts are divided by 10^native_decimals
    pub native_decimals: u32,
    /// Function selector of a token transfer call
    pub transfer_selector: [u8; 4],
    /// Number of concurrent decode workers
    pub workers: usize,
}

impl Default for WatcherConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_millis(3_000),
            max_queue_depth: DEFAULT_MAX_DEPTH,
            false_positive_rate: DEFAULT_FALSE_POSITIVE_RATE,
            filter_refresh_interval: Duration::from_millis(10_000),
            native_decimals: 6,
            transfer_selector: TRANSFER_SELECTOR,
            workers: 1,
        }
    }
}

impl WatcherConfig {
    /// Set the transfer selector from its hex form.
    pub fn with_selector_hex(mut self, selector: &str) -> Result<Self> {
        self.transfer_selector = parse_selector(selector)
            .with_context(|| format!("Invalid transfer selector: {}", selector))?;
        Ok(self)
    }

    /// Reject settings the pipeline cannot run with.
    pub fn validate(&self) -> Result<()> {
        if self.poll_interval.is_zero() {
            anyhow::bail!("Poll interval must be greater than zero");
        }
        if self.filter_refresh_interval.is_zero() {
            anyhow::bail!("Filter refresh interval must be greater than zero");
        }
        if !(self.false_positive_rate > 0.0 && self.false_positive_rate < 1.0) {
            anyhow::bail!(
                "False positive rate must be in (0, 1), got {}",
                self.false_positive_rate
            );
        }
        if self.native_decimals > MAX_NATIVE_DECIMALS {
            anyhow::bail!(
                "Native decimals must be at most {}, got {}",
                MAX_NATIVE_DECIMALS,
                self.native_decimals
            );
        }
        if self.workers == 0 {
            anyhow::bail!("At least one decode worker is required");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = WatcherConfig::default();
        assert_eq!(config.poll_interval, Duration::from_secs(3));
        assert_eq!(config.max_queue_depth, 10_000);
        assert_eq!(config.false_positive_rate, 0.01);
        assert_eq!(config.filter_refresh_interval, Duration::from_secs(10));
        assert_eq!(config.native_decimals, 6);
        assert_eq!(hex::encode(config.transfer_selector), "a9059cbb");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_invalid_values_rejected() {
        let bad = [
            WatcherConfig {
                poll_interval: Duration::ZERO,
                ..Default::default()
            },
            WatcherConfig {
                false_positive_rate: 1.0,
                ..Default::default()
            },
            WatcherConfig {
                native_decimals: 29,
                ..Default::default()
            },
            WatcherConfig {
                workers: 0,
                ..Default::default()
            },
        ];
        for config in bad {
            assert!(config.validate().is_err(), "{:?} accepted", config);
        }
    }

    #[test]
    fn test_selector_hex() {
        let config = WatcherConfig::default().with_selector_hex("0x23b872dd").unwrap();
        assert_eq!(config.transfer_selector, [0x23, 0xb8, 0x72, 0xdd]);
        assert!(WatcherConfig::default().with_selector_hex("xyz").is_err());
    }
}
