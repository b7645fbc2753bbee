//! In-memory collaborators shared by the unit tests

use crate::address::hex_to_display;
use crate::error::DecodeError;
use crate::notify::Notifier;
use crate::rpc::ChainClient;
use crate::types::{Block, Transaction, TransferEvent};
use anyhow::Result;
use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::sync::Mutex;

/// Scriptable chain: settable head, canned blocks, injectable failures.
#[derive(Default)]
pub struct MockChain {
    head: Mutex<u64>,
    blocks: Mutex<HashMap<u64, Block>>,
    failing_blocks: Mutex<HashSet<u64>>,
    head_fails: Mutex<bool>,
    fetched: Mutex<Vec<u64>>,
}

impl MockChain {
    pub fn with_head(head: u64) -> Self {
        let chain = Self::default();
        chain.set_head(head);
        chain
    }

    pub fn set_head(&self, head: u64) {
        *self.head.lock().unwrap() = head;
    }

    pub fn fail_head(&self, fail: bool) {
        *self.head_fails.lock().unwrap() = fail;
    }

    pub fn fail_block(&self, number: u64) {
        self.failing_blocks.lock().unwrap().insert(number);
    }

    pub fn heal_block(&self, number: u64) {
        self.failing_blocks.lock().unwrap().remove(&number);
    }

    /// Add block `number` whose transactions have the given ids.
    pub fn add_block(&self, number: u64, tx_ids: &[&str]) {
        let transactions = tx_ids
            .iter()
            .map(|id| Transaction {
                id: id.to_string(),
                contracts: Vec::new(),
            })
            .collect();
        self.blocks.lock().unwrap().insert(
            number,
            Block {
                number,
                transactions,
            },
        );
    }

    pub fn insert_block(&self, block: Block) {
        self.blocks.lock().unwrap().insert(block.number, block);
    }

    /// Block numbers requested so far, in order.
    pub fn fetched(&self) -> Vec<u64> {
        self.fetched.lock().unwrap().clone()
    }
}

#[async_trait]
impl ChainClient for MockChain {
    async fn get_current_block(&self) -> Result<u64> {
        if *self.head_fails.lock().unwrap() {
            anyhow::bail!("connection refused");
        }
        Ok(*self.head.lock().unwrap())
    }

    async fn get_block(&self, number: u64) -> Result<Block> {
        self.fetched.lock().unwrap().push(number);
        if self.failing_blocks.lock().unwrap().contains(&number) {
            anyhow::bail!("timeout fetching block {}", number);
        }
        Ok(self
            .blocks
            .lock()
            .unwrap()
            .get(&number)
            .cloned()
            .unwrap_or(Block {
                number,
                transactions: Vec::new(),
            }))
    }

    fn decode_address(&self, hex: &str) -> Result<String, DecodeError> {
        hex_to_display(hex)
    }
}

/// Records every event it receives.
#[derive(Default)]
pub struct CollectingNotifier {
    events: Mutex<Vec<TransferEvent>>,
}

impl CollectingNotifier {
    pub fn events(&self) -> Vec<TransferEvent> {
        self.events.lock().unwrap().clone()
    }
}

#[async_trait]
impl Notifier for CollectingNotifier {
    async fn notify(&self, event: &TransferEvent) {
        self.events.lock().unwrap().push(event.clone());
    }
}
