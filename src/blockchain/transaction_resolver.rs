use serde_json::json;
use std::sync::Arc;

use crate::blockchain::chain_client::ChainClient;
use crate::blockchain::units::{format_ether, format_gwei};
use crate::error::{MalformedInput, ResolutionError};
use crate::logging::LogContext;
use crate::models::ResolvedTx;

/// Outcome of a resolution that reached the chain
#[derive(Debug, Clone, PartialEq)]
pub enum Resolution {
    Found(ResolvedTx),
    /// The node has no transaction with this hash
    NotFound,
}

/// Fetches a transaction and its block, and derives the fee and internal flag
pub struct TransactionResolver {
    client: Arc<dyn ChainClient>,
}

impl TransactionResolver {
    pub fn new(client: Arc<dyn ChainClient>) -> Self {
        Self { client }
    }

    pub async fn resolve(&self, tx_hash: &str) -> Result<Resolution, ResolutionError> {
        let context = LogContext::new("resolver", "resolve").with_transaction_hash(tx_hash);

        let transaction = match self.client.get_transaction(tx_hash).await? {
            Some(tx) => tx,
            None => {
                context.warn("Transaction not found");
                return Ok(Resolution::NotFound);
            }
        };

        let block_number = transaction
            .block_number
            .ok_or_else(|| ResolutionError::Pending(tx_hash.to_string()))?;

        let block = self
            .client
            .get_block(block_number)
            .await?
            .ok_or(ResolutionError::BlockNotFound { block_number })?;

        let gas_fee = transaction
            .gas_price
            .checked_mul(transaction.gas_limit)
            .ok_or_else(|| {
                MalformedInput::new("fee", format!(
                    "gas price {} * gas limit {} overflows 256 bits",
                    transaction.gas_price, transaction.gas_limit
                ))
            })?;

        // the formatted value is "0.0" exactly when the value is zero
        let internal = transaction.value.is_zero();

        let context = context
            .with_block_number(block_number)
            .with_metadata("from", json!(transaction.from))
            .with_metadata("to", json!(transaction.to))
            .with_metadata("value", json!(format_ether(transaction.value)))
            .with_metadata("gas_price_gwei", json!(format_gwei(transaction.gas_price).ok()))
            .with_metadata("fee", json!(format_ether(gas_fee)))
            .with_metadata("block_timestamp", json!(block.timestamp));
        context.info("Transaction details resolved");
        if internal {
            context.info("Internal transaction: no native value transferred");
        }

        Ok(Resolution::Found(ResolvedTx {
            transaction,
            block,
            gas_fee,
            internal,
        }))
    }
}
