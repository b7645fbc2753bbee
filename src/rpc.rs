//! Chain client for TRON full nodes
//!
//! Talks to the node's HTTP wallet API (`/wallet/...`), which is what
//! TronGrid and self-hosted java-tron nodes expose.

use crate::address::hex_to_display;
use crate::error::DecodeError;
use crate::types::{Block, RawBlock, Transaction};
use anyhow::{Context, Result};
use async_trait::async_trait;
use serde_json::{json, Value};
use std::time::Duration;

/// Per-request timeout.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Header carrying the TronGrid API key.
const API_KEY_HEADER: &str = "TRON-PRO-API-KEY";

/// What the pipeline needs from the chain.
#[async_trait]
pub trait ChainClient: Send + Sync {
    /// Number of the current head block.
    async fn get_current_block(&self) -> Result<u64>;

    /// Block `number` with its transactions in node order.
    async fn get_block(&self, number: u64) -> Result<Block>;

    /// Convert a hex address from a contract payload to display form.
    fn decode_address(&self, hex: &str) -> Result<String, DecodeError>;
}

/// HTTP client for a TRON full node.
pub struct TronClient {
    client: reqwest::Client,
    url: String,
    api_key: Option<String>,
}

impl TronClient {
    /// Create a new client for the node at `url`.
    pub fn new(url: String, api_key: Option<String>) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .context("Failed to build HTTP client")?;

        Ok(Self {
            client,
            url: url.trim_end_matches('/').to_string(),
            api_key,
        })
    }

    /// POST to a wallet API endpoint and return the JSON body.
    async fn call(&self, endpoint: &str, body: Value) -> Result<Value> {
        let mut request = self
            .client
            .post(format!("{}/wallet/{}", self.url, endpoint))
            .json(&body);
        if let Some(key) = &self.api_key {
            request = request.header(API_KEY_HEADER, key);
        }

        let response = request
            .send()
            .await
            .with_context(|| format!("Failed to send {} request", endpoint))?
            .error_for_status()
            .with_context(|| format!("{} request rejected", endpoint))?;

        let json: Value = response
            .json()
            .await
            .with_context(|| format!("Failed to parse {} response", endpoint))?;

        // The wallet API reports failures in-band
        if let Some(error) = json.get("Error") {
            anyhow::bail!("Node error: {}", error);
        }

        Ok(json)
    }
}

#[async_trait]
impl ChainClient for TronClient {
    async fn get_current_block(&self) -> Result<u64> {
        let result = self.call("getnowblock", json!({})).await?;
        let block: RawBlock =
            serde_json::from_value(result).context("Failed to deserialize head block")?;
        block.number().context("Head block response has no header")
    }

    async fn get_block(&self, number: u64) -> Result<Block> {
        let result = self.call("getblockbynum", json!({ "num": number })).await?;
        raw_to_block(number, result)
    }

    fn decode_address(&self, hex: &str) -> Result<String, DecodeError> {
        hex_to_display(hex)
    }
}

/// Validate a `getblockbynum` response and convert it.
fn raw_to_block(requested: u64, result: Value) -> Result<Block> {
    let raw: RawBlock = serde_json::from_value(result)
        .with_context(|| format!("Failed to deserialize block {}", requested))?;

    let number = raw
        .number()
        .with_context(|| format!("Block {} not found", requested))?;
    if number != requested {
        anyhow::bail!("Requested block {} but node returned {}", requested, number);
    }

    Ok(Block {
        number,
        transactions: raw.transactions.into_iter().map(Transaction::from).collect(),
    })
}
