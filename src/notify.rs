//! Transfer notifications
//!
//! The core hands finished events to a [`Notifier`] and does not wait on
//! or inspect the outcome. Delivery problems stay inside the notifier.

use crate::types::TransferEvent;
use anyhow::{Context, Result};
use async_trait::async_trait;
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

const WEBHOOK_TIMEOUT: Duration = Duration::from_secs(10);

/// Receives transfer events. No ordering guarantee is given.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(&self, event: &TransferEvent);
}

#[async_trait]
impl<T: Notifier + ?Sized> Notifier for Arc<T> {
    async fn notify(&self, event: &TransferEvent) {
        (**self).notify(event).await
    }
}

/// Writes an alert line per event to the log.
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn notify(&self, event: &TransferEvent) {
        match &event.token_address {
            Some(token) => info!(
                "TRC20 Token Transfer Alert: tx={} token={} from={} to={} amount={}",
                event.tx_id,
                token,
                event.from_address.as_deref().unwrap_or("N/A"),
                event.to_address,
                event.amount
            ),
            None => info!(
                "TRX Transfer Alert: tx={} from={} to={} amount={} TRX",
                event.tx_id,
                event.from_address.as_deref().unwrap_or("N/A"),
                event.to_address,
                event.amount
            ),
        }
    }
}

/// POSTs each event as JSON to a webhook URL.
pub struct WebhookNotifier {
    client: reqwest::Client,
    url: String,
}

impl WebhookNotifier {
    pub fn new(url: String) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(WEBHOOK_TIMEOUT)
            .build()
            .context("Failed to build webhook HTTP client")?;
        Ok(Self { client, url })
    }

    async fn deliver(&self, event: &TransferEvent) -> Result<()> {
        self.client
            .post(&self.url)
            .json(&event_payload(event))
            .send()
            .await
            .context("Failed to send webhook")?
            .error_for_status()
            .context("Webhook rejected event")?;
        Ok(())
    }
}

#[async_trait]
impl Notifier for WebhookNotifier {
    async fn notify(&self, event: &TransferEvent) {
        if let Err(e) = self.deliver(event).await {
            warn!(
                "Webhook delivery failed for tx {} (contract {}): {:#}",
                event.tx_id, event.contract_index, e
            );
        }
    }
}

/// Sends every event to each inner notifier in turn.
pub struct FanoutNotifier {
    notifiers: Vec<Box<dyn Notifier>>,
}

impl FanoutNotifier {
    pub fn new(notifiers: Vec<Box<dyn Notifier>>) -> Self {
        Self { notifiers }
    }
}

#[async_trait]
impl Notifier for FanoutNotifier {
    async fn notify(&self, event: &TransferEvent) {
        for notifier in &self.notifiers {
            notifier.notify(event).await;
        }
    }
}

/// JSON body sent to webhooks.
pub fn event_payload(event: &TransferEvent) -> Value {
    json!({
        "kind": if event.is_token_transfer() { "token" } else { "native" },
        "txId": event.tx_id,
        "contractIndex": event.contract_index,
        "fromAddress": event.from_address,
        "toAddress": event.to_address,
        "amount": event.amount.to_string(),
        "tokenAddress": event.token_address,
    })
}
