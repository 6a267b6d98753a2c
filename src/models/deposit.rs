use ethers::types::U256;
use serde::{Deserialize, Serialize};

/// A subscribed deposit event occurred in the given transaction
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogMatch {
    pub transaction_hash: String,
}

impl LogMatch {
    pub fn new(transaction_hash: impl Into<String>) -> Self {
        Self {
            transaction_hash: transaction_hash.into(),
        }
    }
}

/// Transaction fields the pipeline needs from the chain
#[derive(Debug, Clone, PartialEq)]
pub struct ChainTransaction {
    pub hash: String,
    pub from: String,
    pub to: Option<String>,
    pub value: U256,      // wei
    pub gas_price: U256,  // wei
    pub gas_limit: U256,
    pub block_number: Option<u64>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ChainBlock {
    pub number: u64,
    pub timestamp: u64,
}

/// A transaction enriched with its containing block
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedTx {
    pub transaction: ChainTransaction,
    pub block: ChainBlock,
    /// gas price * gas limit, in wei
    pub gas_fee: U256,
    /// No native value was transferred
    pub internal: bool,
}

/// Canonical deposit document handed to every sink
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DepositRecord {
    pub block_number: u64,
    pub block_timestamp: u64,
    pub fee: String,
    pub hash: String,
    pub pubkey: String,
    pub from: String,
    pub to: Option<String>,
    pub value: String,
    pub gas_price: String,
    pub formatted_timestamp: String,
}

impl DepositRecord {
    /// Human-readable chat message for this deposit
    pub fn notification_message(&self) -> String {
        format!(
            "New Ethereum Transaction Detected:\nFrom: {}\nTo: {}\nValue: {} ETH\nGas Price: {} Gwei\nTimestamp: {}",
            self.from,
            self.to.as_deref().unwrap_or("(contract creation)"),
            self.value,
            self.gas_price,
            self.formatted_timestamp,
        )
    }
}
