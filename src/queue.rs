//! Admission queue between the block poller and the decode workers
//!
//! Unbounded channel plus an atomic depth counter. The poller reads the
//! depth before admitting each block and stalls when it is too deep, so
//! the queue overshoots its limit by at most one block of transactions.

use crate::error::QueueError;
use crate::types::Transaction;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::{mpsc, Mutex};

/// Default depth above which the poller stops admitting blocks.
pub const DEFAULT_MAX_DEPTH: usize = 10_000;

/// A transaction waiting to be decoded.
#[derive(Debug, Clone)]
pub struct QueuedTransaction {
    pub block_number: u64,
    pub transaction: Transaction,
}

/// Constructor for the sender/consumer pair.
pub struct AdmissionQueue;

impl AdmissionQueue {
    #[allow(clippy::new_ret_no_self)]
    pub fn new() -> (QueueSender, QueueConsumer) {
        let (tx, rx) = mpsc::unbounded_channel();
        let depth = Arc::new(AtomicUsize::new(0));
        (
            QueueSender {
                tx,
                depth: Arc::clone(&depth),
            },
            QueueConsumer {
                rx: Arc::new(Mutex::new(rx)),
                depth,
            },
        )
    }
}

/// Producer side, owned by the poller. Dropping it closes the queue.
pub struct QueueSender {
    tx: mpsc::UnboundedSender<QueuedTransaction>,
    depth: Arc<AtomicUsize>,
}

impl QueueSender {
    /// Number of items enqueued and not yet received.
    pub fn depth(&self) -> usize {
        self.depth.load(Ordering::Acquire)
    }

    pub fn enqueue(&self, item: QueuedTransaction) -> Result<(), QueueError> {
        // Count first so a fast consumer never decrements below zero
        self.depth.fetch_add(1, Ordering::AcqRel);
        self.tx.send(item).map_err(|_| {
            self.depth.fetch_sub(1, Ordering::AcqRel);
            QueueError::Closed
        })
    }
}

/// Consumer side. Clone it once per decode worker.
#[derive(Clone)]
pub struct QueueConsumer {
    rx: Arc<Mutex<mpsc::UnboundedReceiver<QueuedTransaction>>>,
    depth: Arc<AtomicUsize>,
}

impl QueueConsumer {
    /// Next pending item, or `None` once the sender is gone and the
    /// queue is drained.
    pub async fn recv(&self) -> Option<QueuedTransaction> {
        let item = self.rx.lock().await.recv().await;
        if item.is_some() {
            self.depth.fetch_sub(1, Ordering::AcqRel);
        }
        item
    }

    pub fn depth(&self) -> usize {
        self.depth.load(Ordering::Acquire)
    }
}
