//! Main watcher loop
//!
//! Wires the block poller, the decode workers and the address filter
//! refresh task together and runs them until shutdown.

use crate::config::WatcherConfig;
use crate::decoder::{run_decode_worker, TransferDecoder};
use crate::filter::AddressFilter;
use crate::notify::Notifier;
use crate::poller::{wait_for_shutdown, BlockPoller};
use crate::queue::AdmissionQueue;
use crate::registry::AddressRegistry;
use crate::rpc::ChainClient;
use crate::store::CheckpointStore;
use anyhow::{Context, Result};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::MissedTickBehavior;
use tracing::{error, info, warn};

/// TRON transfer watcher.
pub struct Watcher<C, S> {
    config: WatcherConfig,
    client: Arc<C>,
    store: S,
    registry: Arc<dyn AddressRegistry>,
    notifier: Arc<dyn Notifier>,
    filter: Arc<AddressFilter>,
}

impl<C, S> Watcher<C, S>
where
    C: ChainClient + 'static,
    S: CheckpointStore + 'static,
{
    /// Create a new watcher. Fails on an invalid configuration.
    pub fn new(
        config: WatcherConfig,
        client: Arc<C>,
        store: S,
        registry: Arc<dyn AddressRegistry>,
        notifier: Arc<dyn Notifier>,
    ) -> Result<Self> {
        config.validate().context("Invalid watcher configuration")?;
        let filter = Arc::new(
            AddressFilter::new(config.false_positive_rate)
                .context("Failed to create address filter")?,
        );
        Ok(Self {
            config,
            client,
            store,
            registry,
            notifier,
            filter,
        })
    }

    pub fn filter(&self) -> &Arc<AddressFilter> {
        &self.filter
    }

    /// Load the watched addresses for the first time.
    ///
    /// On failure the filter stays empty and the refresh task keeps
    /// retrying once `run` starts.
    pub async fn initialize(&self) -> usize {
        info!("Initializing watcher...");
        match self.filter.reload(self.registry.as_ref()).await {
            Ok(count) => {
                info!("Loaded {} addresses to watch", count);
                count
            }
            Err(e) => {
                warn!("Error loading watched addresses, will retry: {:#}", e);
                0
            }
        }
    }

    /// Run until `shutdown` turns true.
    ///
    /// Returns once the poller has stopped and every decode worker has
    /// drained the queue.
    pub async fn run(self, shutdown: watch::Receiver<bool>) -> Result<()> {
        info!("Starting watcher loop...");

        let (sender, consumer) = AdmissionQueue::new();
        let mut poller = BlockPoller::new(
            Arc::clone(&self.client),
            self.store,
            sender,
            self.config.max_queue_depth,
        )
        .with_shutdown(shutdown.clone());

        let refresh = tokio::spawn(run_filter_refresh(
            Arc::clone(&self.filter),
            Arc::clone(&self.registry),
            self.config.filter_refresh_interval,
            shutdown,
        ));

        let decoder = Arc::new(TransferDecoder::new(
            Arc::clone(&self.client),
            Arc::clone(&self.filter),
            &self.config,
        ));
        let workers: Vec<_> = (0..self.config.workers)
            .map(|id| {
                tokio::spawn(run_decode_worker(
                    id,
                    consumer.clone(),
                    Arc::clone(&decoder),
                    Arc::clone(&self.notifier),
                ))
            })
            .collect();
        drop(consumer);

        poller.run(self.config.poll_interval).await;

        // Closing the queue lets the workers finish what was admitted
        let checkpoint = poller.checkpoint();
        drop(poller);

        let mut processed = 0;
        for worker in workers {
            match worker.await {
                Ok(n) => processed += n,
                Err(e) => error!("Decode worker panicked: {}", e),
            }
        }
        if let Err(e) = refresh.await {
            error!("Filter refresh task panicked: {}", e);
        }

        info!(
            "Watcher stopped at block {} after decoding {} transactions",
            checkpoint, processed
        );
        Ok(())
    }
}

/// Rebuild the address filter from `registry` every `interval` until
/// shutdown. Failures keep the current snapshot and are retried on the
/// next tick.
pub async fn run_filter_refresh(
    filter: Arc<AddressFilter>,
    registry: Arc<dyn AddressRegistry>,
    interval: Duration,
    shutdown: watch::Receiver<bool>,
) {
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    // First tick fires immediately; the initial load already happened
    ticker.tick().await;
    let mut shutdown = Some(shutdown);

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                if let Err(e) = filter.reload(registry.as_ref()).await {
                    warn!("Error refreshing watched addresses: {:#}", e);
                }
            }
            _ = wait_for_shutdown(&mut shutdown) => break,
        }
    }

    info!("Filter refresh stopped");
}
