//! TRON node API types
//!
//! `Raw*` structs mirror the JSON returned by the node's HTTP API.
//! They are converted at the boundary into [`Block`], [`Transaction`]
//! and the closed [`Contract`] enum, so the rest of the pipeline never
//! touches untyped payloads.

use alloy_primitives::U256;
use rust_decimal::Decimal;
use serde::Deserialize;
use serde_json::Value;
use std::fmt;

/// Contract type of a native TRX transfer.
pub const TRANSFER_CONTRACT: &str = "TransferContract";

/// Contract type of a smart contract invocation.
pub const TRIGGER_SMART_CONTRACT: &str = "TriggerSmartContract";

/// Kind reported for a transaction envelope that failed to parse.
pub const UNPARSEABLE_TRANSACTION: &str = "Transaction";

/// Block as returned by `getnowblock` / `getblockbynum`.
///
/// A block that does not exist comes back as `{}`, hence the optional
/// header.
#[derive(Debug, Clone, Deserialize)]
pub struct RawBlock {
    #[serde(rename = "blockID", default)]
    pub block_id: Option<String>,

    #[serde(default)]
    pub block_header: Option<RawBlockHeader>,

    /// Omitted entirely for empty blocks. Kept untyped so one odd
    /// transaction cannot fail the whole block.
    #[serde(default)]
    pub transactions: Vec<Value>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RawBlockHeader {
    pub raw_data: RawHeaderData,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RawHeaderData {
    /// Genesis omits the number
    #[serde(default)]
    pub number: u64,

    #[serde(default)]
    pub timestamp: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RawTransaction {
    #[serde(rename = "txID")]
    pub tx_id: String,

    pub raw_data: RawTransactionData,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RawTransactionData {
    #[serde(default)]
    pub contract: Vec<Value>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RawContract {
    #[serde(rename = "type")]
    pub kind: String,

    #[serde(default)]
    pub parameter: RawParameter,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawParameter {
    #[serde(default)]
    pub value: Value,
}

impl RawBlock {
    /// Block number, if the node returned an actual block.
    pub fn number(&self) -> Option<u64> {
        self.block_header.as_ref().map(|h| h.raw_data.number)
    }
}

/// A block with its transactions in node order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Block {
    pub number: u64,
    pub transactions: Vec<Transaction>,
}

/// A transaction and the contracts it executes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transaction {
    pub id: String,
    pub contracts: Vec<Contract>,
}

/// Parameters of a `TransferContract`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct NativeTransfer {
    /// Sender, hex with `41` prefix
    pub owner_address: String,
    /// Receiver, hex with `41` prefix
    pub to_address: String,
    /// Amount in sun (10^-6 TRX); zero is omitted by the node
    #[serde(default)]
    pub amount: u64,
}

/// Parameters of a `TriggerSmartContract`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct TokenInvocation {
    /// Called contract, hex with `41` prefix
    pub contract_address: String,
    /// Call data, hex without `0x`
    #[serde(default)]
    pub data: Option<String>,
}

/// One contract of a transaction, classified by kind.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Contract {
    NativeTransfer(NativeTransfer),
    TokenInvocation(TokenInvocation),
    /// Any other contract type; never produces a transfer
    Other { kind: String },
    /// Known kind whose parameters did not match the expected shape
    Malformed { kind: String, reason: String },
}

impl From<RawContract> for Contract {
    fn from(raw: RawContract) -> Self {
        match raw.kind.as_str() {
            TRANSFER_CONTRACT => match serde_json::from_value(raw.parameter.value) {
                Ok(p) => Contract::NativeTransfer(p),
                Err(e) => Contract::Malformed {
                    kind: raw.kind,
                    reason: e.to_string(),
                },
            },
            TRIGGER_SMART_CONTRACT => match serde_json::from_value(raw.parameter.value) {
                Ok(p) => Contract::TokenInvocation(p),
                Err(e) => Contract::Malformed {
                    kind: raw.kind,
                    reason: e.to_string(),
                },
            },
            _ => Contract::Other { kind: raw.kind },
        }
    }
}

impl From<Value> for Contract {
    fn from(value: Value) -> Self {
        let kind = value
            .get("type")
            .and_then(Value::as_str)
            .unwrap_or("unknown")
            .to_string();
        match serde_json::from_value::<RawContract>(value) {
            Ok(raw) => raw.into(),
            Err(e) => Contract::Malformed {
                kind,
                reason: e.to_string(),
            },
        }
    }
}

impl From<RawTransaction> for Transaction {
    fn from(raw: RawTransaction) -> Self {
        Self {
            id: raw.tx_id,
            contracts: raw
                .raw_data
                .contract
                .into_iter()
                .map(Contract::from)
                .collect(),
        }
    }
}

/// A transaction whose envelope does not parse becomes a single
/// `Malformed` contract, which the decoder logs and skips.
impl From<Value> for Transaction {
    fn from(value: Value) -> Self {
        let id = value
            .get("txID")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();
        match serde_json::from_value::<RawTransaction>(value) {
            Ok(raw) => raw.into(),
            Err(e) => Self {
                id,
                contracts: vec![Contract::Malformed {
                    kind: UNPARSEABLE_TRANSACTION.to_string(),
                    reason: e.to_string(),
                }],
            },
        }
    }
}

/// Transferred value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransferAmount {
    /// Native coin, already scaled to whole units
    Native(Decimal),
    /// Token amount in the token's smallest unit
    Token(U256),
}

impl fmt::Display for TransferAmount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransferAmount::Native(d) => write!(f, "{}", d),
            TransferAmount::Token(v) => write!(f, "{}", v),
        }
    }
}

/// A transfer touching a watched address.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferEvent {
    pub tx_id: String,
    /// Position of the contract within the transaction
    pub contract_index: usize,
    /// Unknown for token transfers
    pub from_address: Option<String>,
    pub to_address: String,
    pub amount: TransferAmount,
    /// Token contract, `None` for native transfers
    pub token_address: Option<String>,
}

impl TransferEvent {
    pub fn is_token_transfer(&self) -> bool {
        self.token_address.is_some()
    }
}
