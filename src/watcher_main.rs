//! TRON transfer watcher binary
//!
//! Follows the chain head, decodes native and token transfers touching
//! watched addresses and reports each one through the configured
//! notifiers.

use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing::info;
use tracing_subscriber::EnvFilter;
use tron_watch::config::{WatcherConfig, DEFAULT_FULL_NODE};
use tron_watch::notify::{FanoutNotifier, LogNotifier, Notifier, WebhookNotifier};
use tron_watch::registry::WatchlistFile;
use tron_watch::rpc::TronClient;
use tron_watch::store::RocksCheckpointStore;
use tron_watch::watcher::Watcher;

/// TRON transfer watcher
#[derive(Parser)]
#[command(name = "watcher")]
#[command(about = "Monitor TRON blocks for transfers to and from watched addresses")]
struct Args {
    /// Full node HTTP API URL
    #[arg(short, long, env = "FULL_NODE", default_value = DEFAULT_FULL_NODE)]
    rpc_url: String,

    /// TronGrid API key, sent as TRON-PRO-API-KEY
    #[arg(long, env = "TRON_PRO_API_KEY")]
    api_key: Option<String>,

    /// Path to watchlist file (one base58 address per line)
    #[arg(short, long, default_value = "watchlist.txt")]
    watchlist: PathBuf,

    /// Path to RocksDB database directory
    #[arg(short, long, default_value = "./watcher_db")]
    db_path: PathBuf,

    /// Milliseconds between polls for new blocks
    #[arg(long, default_value_t = 3_000)]
    poll_interval_ms: u64,

    /// Milliseconds between watchlist reloads
    #[arg(long, default_value_t = 10_000)]
    refresh_interval_ms: u64,

    /// Queue depth above which block admission pauses
    #[arg(long, default_value_t = 10_000)]
    max_queue_depth: usize,

    /// Target false positive rate of the address filter
    #[arg(long, default_value_t = 0.01)]
    false_positive_rate: f64,

    /// Decimals of the native currency
    #[arg(long, default_value_t = 6)]
    native_decimals: u32,

    /// Token transfer function selector (hex)
    #[arg(long, default_value = "a9059cbb")]
    selector: String,

    /// Number of decode workers; events are only in block order with one
    #[arg(long, default_value_t = 1)]
    workers: usize,

    /// Webhook receiving a JSON POST per transfer
    #[arg(long)]
    webhook_url: Option<String>,
}

impl Args {
    fn config(&self) -> Result<WatcherConfig> {
        WatcherConfig {
            poll_interval: Duration::from_millis(self.poll_interval_ms),
            max_queue_depth: self.max_queue_depth,
            false_positive_rate: self.false_positive_rate,
            filter_refresh_interval: Duration::from_millis(self.refresh_interval_ms),
            native_decimals: self.native_decimals,
            workers: self.workers,
            ..Default::default()
        }
        .with_selector_hex(&self.selector)
    }

    fn notifier(&self) -> Result<Arc<dyn Notifier>> {
        let notifier: Arc<dyn Notifier> = match &self.webhook_url {
            Some(url) => {
                let notifiers: Vec<Box<dyn Notifier>> = vec![
                    Box::new(LogNotifier),
                    Box::new(WebhookNotifier::new(url.clone())?),
                ];
                Arc::new(FanoutNotifier::new(notifiers))
            }
            None => Arc::new(LogNotifier),
        };
        Ok(notifier)
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();

    info!("Starting TRON transfer watcher");
    info!("RPC URL: {}", args.rpc_url);
    info!("Database: {:?}", args.db_path);

    let config = args.config()?;

    // Create RPC client
    let client = Arc::new(TronClient::new(args.rpc_url.clone(), args.api_key.clone())?);

    // Open checkpoint store
    let store = RocksCheckpointStore::open(&args.db_path)
        .with_context(|| format!("Failed to open database at {:?}", args.db_path))?;

    let registry = Arc::new(WatchlistFile::new(args.watchlist.clone()));
    info!("Watchlist: {:?}", registry.path());
    let watcher = Watcher::new(config, client, store, registry, args.notifier()?)?;

    // Initialize (load watchlist into the address filter)
    watcher.initialize().await;

    // Handle Ctrl+C gracefully
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Received Ctrl+C, shutting down gracefully...");
            let _ = shutdown_tx.send(true);
        }
    });

    watcher.run(shutdown_rx).await.context("Watcher error")?;

    info!("Watcher stopped");
    Ok(())
}
