//! Block poller
//!
//! Walks the chain from the checkpoint to the head, one block at a time,
//! admitting every transaction of a block to the queue before moving the
//! checkpoint to that block. Anything that goes wrong leaves the
//! checkpoint where it was, so the next tick retries the same block:
//! admission is at-least-once.

use crate::queue::{QueueSender, QueuedTransaction};
use crate::rpc::ChainClient;
use crate::store::CheckpointStore;
use anyhow::{Context, Result};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::MissedTickBehavior;
use tracing::{error, info, warn};

/// Poller state between and during ticks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollerState {
    Idle,
    CatchingUp,
    Throttled,
}

/// What a single tick did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TickOutcome {
    /// Head at or below the checkpoint
    Idle { head: u64 },
    /// Blocks `from..=to` were admitted
    CaughtUp { from: u64, to: u64 },
    /// Queue too deep before admitting `at_block`
    Throttled { depth: usize, at_block: u64 },
    /// Shutdown requested before admitting `at_block`
    Interrupted { at_block: u64 },
}

/// Drives ingestion from the chain into the admission queue.
pub struct BlockPoller<C, S> {
    client: Arc<C>,
    store: Arc<S>,
    queue: QueueSender,
    max_depth: usize,
    state: PollerState,
    /// Highest block whose transactions were all enqueued
    last_admitted: u64,
    /// Highest block known to be durably saved
    last_persisted: u64,
    bootstrapped: bool,
    shutdown: Option<watch::Receiver<bool>>,
}

impl<C: ChainClient, S: CheckpointStore + 'static> BlockPoller<C, S> {
    pub fn new(client: Arc<C>, store: S, queue: QueueSender, max_depth: usize) -> Self {
        Self {
            client,
            store: Arc::new(store),
            queue,
            max_depth,
            state: PollerState::Idle,
            last_admitted: 0,
            last_persisted: 0,
            bootstrapped: false,
            shutdown: None,
        }
    }

    /// Stop between blocks once `shutdown` turns true.
    pub fn with_shutdown(mut self, shutdown: watch::Receiver<bool>) -> Self {
        self.shutdown = Some(shutdown);
        self
    }

    pub fn state(&self) -> PollerState {
        self.state
    }

    /// Last block whose transactions were all admitted.
    pub fn checkpoint(&self) -> u64 {
        self.last_admitted
    }

    /// Load the checkpoint, seeding it with the chain head on first run.
    ///
    /// `tick` calls this until it succeeds, so calling it up front is
    /// optional.
    pub async fn bootstrap(&mut self) -> Result<u64> {
        let stored = self
            .with_store(|store| store.load())
            .await
            .context("Failed to load checkpoint")?;
        let checkpoint = match stored {
            Some(block) => {
                info!("Resuming from block number {}", block);
                block
            }
            None => {
                let head = self
                    .client
                    .get_current_block()
                    .await
                    .context("Failed to get current block")?;
                self.with_store(move |store| store.save(head))
                    .await
                    .context("Failed to save initial checkpoint")?;
                info!("Starting from current block number {}", head);
                head
            }
        };

        self.last_admitted = checkpoint;
        self.last_persisted = checkpoint;
        self.bootstrapped = true;
        Ok(checkpoint)
    }

    /// Run a store operation on the blocking pool; saves are synced
    /// writes.
    async fn with_store<T, F>(&self, op: F) -> Result<T>
    where
        F: FnOnce(&S) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let store = Arc::clone(&self.store);
        tokio::task::spawn_blocking(move || op(&*store))
            .await
            .context("Checkpoint store task failed")?
    }

    /// Run one poll cycle.
    pub async fn tick(&mut self) -> Result<TickOutcome> {
        let result = self.poll().await;
        if result.is_err() {
            self.state = PollerState::Idle;
        }
        result
    }

    async fn poll(&mut self) -> Result<TickOutcome> {
        if !self.bootstrapped {
            self.bootstrap().await?;
        }

        // A save that failed earlier must land before anything moves on
        if self.last_persisted < self.last_admitted {
            self.persist(self.last_admitted).await?;
        }

        let head = self
            .client
            .get_current_block()
            .await
            .context("Failed to get current block")?;

        if head <= self.last_admitted {
            self.state = PollerState::Idle;
            return Ok(TickOutcome::Idle { head });
        }

        self.state = PollerState::CatchingUp;
        let from = self.last_admitted + 1;

        for number in from..=head {
            if self.shutdown_requested() {
                info!("Shutdown requested, stopping before block {}", number);
                self.state = PollerState::Idle;
                return Ok(TickOutcome::Interrupted { at_block: number });
            }

            let depth = self.queue.depth();
            if depth > self.max_depth {
                warn!(
                    "Admission queue depth {} exceeds {}, pausing before block {}",
                    depth, self.max_depth, number
                );
                self.state = PollerState::Throttled;
                return Ok(TickOutcome::Throttled {
                    depth,
                    at_block: number,
                });
            }

            self.admit_block(number).await?;
        }

        self.state = PollerState::Idle;
        Ok(TickOutcome::CaughtUp { from, to: head })
    }

    /// Enqueue every transaction of `number`, then checkpoint it.
    async fn admit_block(&mut self, number: u64) -> Result<()> {
        let block = self
            .client
            .get_block(number)
            .await
            .with_context(|| format!("Failed to fetch block {}", number))?;

        info!(
            "Processing block: {} ({} transactions)",
            number,
            block.transactions.len()
        );

        for transaction in block.transactions {
            self.queue
                .enqueue(QueuedTransaction {
                    block_number: number,
                    transaction,
                })
                .with_context(|| format!("Failed to enqueue transaction of block {}", number))?;
        }

        self.last_admitted = number;
        self.persist(number).await
    }

    async fn persist(&mut self, number: u64) -> Result<()> {
        match self.with_store(move |store| store.save(number)).await {
            Ok(()) => {
                self.last_persisted = number;
                Ok(())
            }
            Err(e) => {
                error!(
                    "Error updating last block number to {} (durable checkpoint is {}): {:#}",
                    number, self.last_persisted, e
                );
                Err(e.context(format!("Failed to save checkpoint {}", number)))
            }
        }
    }

    fn shutdown_requested(&self) -> bool {
        self.shutdown.as_ref().is_some_and(|rx| *rx.borrow())
    }

    /// Tick every `interval` until shutdown.
    ///
    /// Tick errors are logged and retried on the next tick.
    pub async fn run(&mut self, interval: Duration) {
        info!("Starting monitoring, polling every {:?}", interval);

        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut shutdown = self.shutdown.clone();

        loop {
            tokio::select! {
                _ = ticker.tick() => {}
                _ = wait_for_shutdown(&mut shutdown) => break,
            }

            if self.shutdown_requested() {
                break;
            }

            match self.tick().await {
                Ok(TickOutcome::Interrupted { .. }) => break,
                Ok(_) => {}
                Err(e) => error!("Error polling new blocks: {:#}", e),
            }
        }

        info!("Block poller stopped at block {}", self.last_admitted);
    }
}

/// Resolves once the shutdown flag is set; never resolves without a
/// receiver.
pub(crate) async fn wait_for_shutdown(shutdown: &mut Option<watch::Receiver<bool>>) {
    match shutdown {
        Some(rx) => {
            while !*rx.borrow() {
                if rx.changed().await.is_err() {
                    // Sender gone without signalling, keep running
                    std::future::pending::<()>().await;
                }
            }
        }
        None => std::future::pending::<()>().await,
    }
}
