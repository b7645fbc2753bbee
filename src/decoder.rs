//! Transfer decoding
//!
//! Turns queued transactions into [`TransferEvent`]s for watched
//! addresses. Native transfers match on either endpoint; token transfers
//! match on the destination only, since the sender of a `transfer` call
//! is not part of the call data.
//!
//! A contract that fails to decode is logged and skipped. It never stops
//! the remaining contracts of the transaction or later transactions.

use crate::abi::{decode_transfer, has_selector};
use crate::config::WatcherConfig;
use crate::error::DecodeError;
use crate::filter::AddressFilter;
use crate::notify::Notifier;
use crate::queue::QueueConsumer;
use crate::rpc::ChainClient;
use crate::types::{
    Contract, NativeTransfer, TokenInvocation, Transaction, TransferAmount, TransferEvent,
};
use rust_decimal::Decimal;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Classifies and decodes contracts, consulting the address filter.
pub struct TransferDecoder<C> {
    client: Arc<C>,
    filter: Arc<AddressFilter>,
    native_decimals: u32,
    selector: [u8; 4],
}

impl<C: ChainClient> TransferDecoder<C> {
    pub fn new(client: Arc<C>, filter: Arc<AddressFilter>, config: &WatcherConfig) -> Self {
        Self {
            client,
            filter,
            native_decimals: config.native_decimals,
            selector: config.transfer_selector,
        }
    }

    /// All transfer events of `tx` that touch a watched address.
    pub fn decode_transaction(&self, tx: &Transaction) -> Vec<TransferEvent> {
        let mut events = Vec::new();
        for (index, contract) in tx.contracts.iter().enumerate() {
            match self.decode_contract(&tx.id, index, contract) {
                Ok(Some(event)) => events.push(event),
                Ok(None) => {}
                Err(e) => warn!(
                    "Error decoding contract {} of transaction {}: {}",
                    index, tx.id, e
                ),
            }
        }
        events
    }

    /// Decode one contract. `Ok(None)` means not a transfer, or not one
    /// involving a watched address.
    pub fn decode_contract(
        &self,
        tx_id: &str,
        index: usize,
        contract: &Contract,
    ) -> Result<Option<TransferEvent>, DecodeError> {
        match contract {
            Contract::NativeTransfer(t) => self.decode_native(tx_id, index, t),
            Contract::TokenInvocation(t) => self.decode_token(tx_id, index, t),
            Contract::Other { .. } => Ok(None),
            Contract::Malformed { kind, reason } => Err(DecodeError::MalformedPayload {
                kind: kind.clone(),
                reason: reason.clone(),
            }),
        }
    }

    fn decode_native(
        &self,
        tx_id: &str,
        index: usize,
        transfer: &NativeTransfer,
    ) -> Result<Option<TransferEvent>, DecodeError> {
        let to = self.client.decode_address(&transfer.to_address)?;
        let from = self.client.decode_address(&transfer.owner_address)?;

        if !self.filter.is_member(&to) && !self.filter.is_member(&from) {
            return Ok(None);
        }

        let amount = scale_native(transfer.amount, self.native_decimals)?;
        Ok(Some(TransferEvent {
            tx_id: tx_id.to_string(),
            contract_index: index,
            from_address: Some(from),
            to_address: to,
            amount: TransferAmount::Native(amount),
            token_address: None,
        }))
    }

    fn decode_token(
        &self,
        tx_id: &str,
        index: usize,
        invocation: &TokenInvocation,
    ) -> Result<Option<TransferEvent>, DecodeError> {
        let data = match invocation.data.as_deref() {
            Some(data) if has_selector(data, &self.selector) => data,
            _ => return Ok(None),
        };

        let call = decode_transfer(data, &self.selector)?;
        let to = self.client.decode_address(&hex::encode(call.to.as_slice()))?;
        if !self.filter.is_member(&to) {
            return Ok(None);
        }

        let token = self.client.decode_address(&invocation.contract_address)?;
        Ok(Some(TransferEvent {
            tx_id: tx_id.to_string(),
            contract_index: index,
            from_address: None,
            to_address: to,
            amount: TransferAmount::Token(call.amount),
            token_address: Some(token),
        }))
    }
}

/// Convert an amount in the smallest native unit to whole units.
pub fn scale_native(amount: u64, decimals: u32) -> Result<Decimal, DecodeError> {
    Decimal::try_from_i128_with_scale(i128::from(amount), decimals)
        .map(|d| d.normalize())
        .map_err(|_| DecodeError::AmountOutOfRange { amount, decimals })
}

/// Pull transactions off the queue until it closes, forwarding every
/// decoded event to `notifier`. Returns the number of transactions
/// processed.
pub async fn run_decode_worker<C: ChainClient>(
    id: usize,
    consumer: QueueConsumer,
    decoder: Arc<TransferDecoder<C>>,
    notifier: Arc<dyn Notifier>,
) -> u64 {
    info!("Decode worker {} started", id);
    let mut processed = 0u64;

    while let Some(item) = consumer.recv().await {
        let events = decoder.decode_transaction(&item.transaction);
        for event in &events {
            notifier.notify(event).await;
        }
        processed += 1;
        debug!(
            "Worker {} processed tx {} from block {} ({} events, {} pending)",
            id,
            item.transaction.id,
            item.block_number,
            events.len(),
            consumer.depth()
        );
    }

    info!("Decode worker {} stopped after {} transactions", id, processed);
    processed
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::address::evm_to_display;
    use crate::queue::{AdmissionQueue, QueuedTransaction};
    use crate::testing::{CollectingNotifier, MockChain};
    use alloy_primitives::{Address, U256};

    const ALICE_HEX: &str = "41a614f803b6fd780986a42c78ec9c7f77e6ded13c";
    const BOB_HEX: &str = "41b614f803b6fd780986a42c78ec9c7f77e6ded13d";
    const TOKEN_HEX: &str = "41c614f803b6fd780986a42c78ec9c7f77e6ded13e";

    fn display(hex: &str) -> String {
        crate::address::hex_to_display(hex).unwrap()
    }

    fn decoder_watching(watched: &[&str]) -> TransferDecoder<MockChain> {
        let filter = Arc::new(AddressFilter::new(0.01).unwrap());
        let addresses: Vec<String> = watched.iter().map(|h| display(h)).collect();
        filter.refresh(&addresses).unwrap();
        TransferDecoder::new(
            Arc::new(MockChain::default()),
            filter,
            &WatcherConfig::default(),
        )
    }

    fn native(from: &str, to: &str, amount: u64) -> Contract {
        Contract::NativeTransfer(NativeTransfer {
            owner_address: from.into(),
            to_address: to.into(),
            amount,
        })
    }

    fn token_call(to_hex: &str, amount: U256) -> Contract {
        // ABI slot holds the 20-byte account id without the 41 prefix
        let data = format!(
            "a9059cbb{:0>64}{}",
            &to_hex[2..],
            hex::encode(amount.to_be_bytes::<32>())
        );
        Contract::TokenInvocation(TokenInvocation {
            contract_address: TOKEN_HEX.into(),
            data: Some(data),
        })
    }

    fn tx(id: &str, contracts: Vec<Contract>) -> Transaction {
        Transaction {
            id: id.into(),
            contracts,
        }
    }

    #[test]
    fn test_native_amount_scaling() {
        assert_eq!(scale_native(5_000_000, 6).unwrap().to_string(), "5");
        assert_eq!(scale_native(1_500_000, 6).unwrap().to_string(), "1.5");
        assert_eq!(scale_native(1, 6).unwrap().to_string(), "0.000001");
        assert_eq!(scale_native(0, 6).unwrap().to_string(), "0");
    }

    #[test]
    fn test_native_transfer_to_watched() {
        let decoder = decoder_watching(&[BOB_HEX]);
        let events =
            decoder.decode_transaction(&tx("t1", vec![native(ALICE_HEX, BOB_HEX, 5_000_000)]));

        assert_eq!(events.len(), 1);
        let event = &events[0];
        assert_eq!(event.tx_id, "t1");
        assert_eq!(event.to_address, display(BOB_HEX));
        assert_eq!(event.from_address.as_deref(), Some(display(ALICE_HEX).as_str()));
        assert_eq!(event.amount.to_string(), "5");
        assert_eq!(event.token_address, None);
    }

    #[test]
    fn test_native_transfer_from_watched() {
        let decoder = decoder_watching(&[ALICE_HEX]);
        let events = decoder.decode_transaction(&tx("t1", vec![native(ALICE_HEX, BOB_HEX, 1)]));
        assert_eq!(events.len(), 1);
    }

    #[test]
    fn test_native_transfer_unwatched() {
        let decoder = decoder_watching(&[TOKEN_HEX]);
        let events = decoder.decode_transaction(&tx("t1", vec![native(ALICE_HEX, BOB_HEX, 1)]));
        assert!(events.is_empty());
    }

    #[test]
    fn test_token_transfer_to_watched() {
        let decoder = decoder_watching(&[BOB_HEX]);
        let amount = U256::from(9_007_199_254_740_993u64);
        let events = decoder.decode_transaction(&tx("t2", vec![token_call(BOB_HEX, amount)]));

        assert_eq!(events.len(), 1);
        let event = &events[0];
        assert_eq!(event.to_address, display(BOB_HEX));
        assert_eq!(event.from_address, None);
        assert_eq!(event.amount, TransferAmount::Token(amount));
        assert_eq!(event.token_address, Some(display(TOKEN_HEX)));
    }

    #[test]
    fn test_token_transfer_destination_resolution() {
        let decoder = decoder_watching(&[BOB_HEX]);
        let to = Address::from_slice(&hex::decode(&BOB_HEX[2..]).unwrap());
        let call = token_call(BOB_HEX, U256::from(1u64));
        let events = decoder.decode_transaction(&tx("t2", vec![call]));
        assert_eq!(events[0].to_address, evm_to_display(to));
    }

    #[test]
    fn test_non_transfer_call_ignored() {
        let decoder = decoder_watching(&[BOB_HEX]);
        // approve(address,uint256) to a watched spender
        let approve = Contract::TokenInvocation(TokenInvocation {
            contract_address: TOKEN_HEX.into(),
            data: Some(format!("095ea7b3{:0>64}{:0>64}", &BOB_HEX[2..], "1")),
        });
        let no_data = Contract::TokenInvocation(TokenInvocation {
            contract_address: TOKEN_HEX.into(),
            data: None,
        });
        let other = Contract::Other {
            kind: "FreezeBalanceV2Contract".into(),
        };

        let events = decoder.decode_transaction(&tx("t3", vec![approve, no_data, other]));
        assert!(events.is_empty());
    }

    #[test]
    fn test_decode_failure_does_not_stop_siblings() {
        let decoder = decoder_watching(&[BOB_HEX]);
        let truncated = Contract::TokenInvocation(TokenInvocation {
            contract_address: TOKEN_HEX.into(),
            data: Some("a9059cbb0000".into()),
        });
        let malformed = Contract::Malformed {
            kind: "TransferContract".into(),
            reason: "missing field `to_address`".into(),
        };
        let bad_address = native("41zz", BOB_HEX, 1);

        let events = decoder.decode_transaction(&tx(
            "t4",
            vec![
                truncated,
                malformed,
                bad_address,
                native(ALICE_HEX, BOB_HEX, 2_000_000),
            ],
        ));

        assert_eq!(events.len(), 1);
        assert_eq!(events[0].contract_index, 3);
        assert_eq!(events[0].amount.to_string(), "2");
    }

    #[test]
    fn test_malformed_contract_is_error() {
        let decoder = decoder_watching(&[]);
        let contract = Contract::Malformed {
            kind: "TriggerSmartContract".into(),
            reason: "bad".into(),
        };
        assert!(matches!(
            decoder.decode_contract("t", 0, &contract),
            Err(DecodeError::MalformedPayload { .. })
        ));
    }

    #[tokio::test]
    async fn test_worker_drains_queue_and_notifies() {
        let decoder = Arc::new(decoder_watching(&[BOB_HEX]));
        let notifier = Arc::new(CollectingNotifier::default());
        let (sender, consumer) = AdmissionQueue::new();

        for (i, amount) in [1_000_000u64, 2_000_000, 3_000_000].iter().enumerate() {
            sender
                .enqueue(QueuedTransaction {
                    block_number: 100,
                    transaction: tx(&format!("t{}", i), vec![native(ALICE_HEX, BOB_HEX, *amount)]),
                })
                .unwrap();
        }
        drop(sender);

        let processed = run_decode_worker(0, consumer, decoder, notifier.clone()).await;
        assert_eq!(processed, 3);

        // A single worker preserves queue order
        let amounts: Vec<String> = notifier
            .events()
            .iter()
            .map(|e| e.amount.to_string())
            .collect();
        assert_eq!(amounts, vec!["1", "2", "3"]);
    }
}
