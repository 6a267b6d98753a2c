use async_trait::async_trait;
use ethers::providers::Middleware;
use ethers::types::{BlockId, BlockNumber, Transaction, H256, U256};
use ethers::utils::to_checksum;
use serde_json::json;
use std::str::FromStr;
use std::sync::Arc;

use crate::error::{MalformedInput, ResolutionError};
use crate::logging::{LogContext, PerformanceMonitor};
use crate::models::{ChainBlock, ChainTransaction};

/// Read access to the chain used by the transaction resolver
#[async_trait]
pub trait ChainClient: Send + Sync {
    /// `Ok(None)` when the node does not know the transaction
    async fn get_transaction(&self, hash: &str) -> Result<Option<ChainTransaction>, ResolutionError>;

    /// `Ok(None)` when the node does not know the block
    async fn get_block(&self, number: u64) -> Result<Option<ChainBlock>, ResolutionError>;
}

/// Chain client backed by any ethers middleware, normally a shared WebSocket provider
pub struct EthersChainClient<M> {
    provider: Arc<M>,
}

impl<M> EthersChainClient<M> {
    pub fn new(provider: Arc<M>) -> Self {
        Self { provider }
    }
}

#[async_trait]
impl<M> ChainClient for EthersChainClient<M>
where
    M: Middleware + 'static,
{
    async fn get_transaction(&self, hash: &str) -> Result<Option<ChainTransaction>, ResolutionError> {
        let tx_hash = parse_transaction_hash(hash)?;

        let monitor = PerformanceMonitor::new("eth_getTransactionByHash")
            .with_metadata("transaction_hash", json!(hash));
        let result = self.provider.get_transaction(tx_hash).await;
        monitor.finish_with_result(&result);

        let transaction = result.map_err(|e| ResolutionError::Rpc {
            method: "eth_getTransactionByHash".to_string(),
            message: e.to_string(),
        })?;

        transaction
            .map(|tx| convert_transaction(&tx))
            .transpose()
            .map_err(ResolutionError::from)
    }

    async fn get_block(&self, number: u64) -> Result<Option<ChainBlock>, ResolutionError> {
        let monitor = PerformanceMonitor::new("eth_getBlockByNumber")
            .with_metadata("block_number", json!(number));
        let block_id = BlockId::Number(BlockNumber::Number(number.into()));
        let result = self.provider.get_block(block_id).await;
        monitor.finish_with_result(&result);

        let block = result.map_err(|e| ResolutionError::Rpc {
            method: "eth_getBlockByNumber".to_string(),
            message: e.to_string(),
        })?;

        match block {
            Some(block) => {
                let timestamp = u256_to_u64(block.timestamp, "blockTimestamp")?;
                LogContext::new("chain_client", "get_block")
                    .with_block_number(number)
                    .debug(&format!("Retrieved block {} with timestamp {}", number, timestamp));
                Ok(Some(ChainBlock { number, timestamp }))
            }
            None => Ok(None),
        }
    }
}

/// Parse a 32-byte `0x` transaction hash
pub fn parse_transaction_hash(hash: &str) -> Result<H256, MalformedInput> {
    let digits = hash.strip_prefix("0x").unwrap_or(hash);
    if digits.len() != 64 {
        return Err(MalformedInput::new(
            "hash",
            format!("expected 32-byte hex transaction hash, got '{}'", hash),
        ));
    }
    H256::from_str(digits)
        .map_err(|e| MalformedInput::new("hash", format!("invalid hex '{}': {}", hash, e)))
}

/// Map an ethers transaction onto the fields the pipeline uses
pub fn convert_transaction(tx: &Transaction) -> Result<ChainTransaction, MalformedInput> {
    let gas_price = tx
        .gas_price
        .or(tx.max_fee_per_gas)
        .ok_or_else(|| MalformedInput::new("gasPrice", "transaction carries no gas price"))?;

    Ok(ChainTransaction {
        hash: format!("{:#x}", tx.hash),
        from: to_checksum(&tx.from, None),
        to: tx.to.map(|to| to_checksum(&to, None)),
        value: tx.value,
        gas_price,
        gas_limit: tx.gas,
        block_number: tx.block_number.map(|n| n.as_u64()),
    })
}

fn u256_to_u64(value: U256, field: &str) -> Result<u64, MalformedInput> {
    if value > U256::from(u64::MAX) {
        return Err(MalformedInput::new(field, format!("{} does not fit in 64 bits", value)));
    }
    Ok(value.low_u64())
}

#[cfg(test)]
mod tests {
    use super::*;
    use ethers::types::{Address, U64};

    fn sample_transaction() -> Transaction {
        Transaction {
            hash: H256::repeat_byte(0xaa),
            from: Address::repeat_byte(0x11),
            to: Some(Address::repeat_byte(0x22)),
            value: U256::from(15) * U256::exp10(17),
            gas_price: Some(U256::from(20) * U256::exp10(9)),
            gas: U256::from(21_000),
            block_number: Some(U64::from(18_570_000u64)),
            ..Default::default()
        }
    }

    #[test]
    fn test_parse_transaction_hash() {
        let hash = format!("0x{}", "ab".repeat(32));
        assert_eq!(parse_transaction_hash(&hash).unwrap(), H256::repeat_byte(0xab));

        assert!(parse_transaction_hash("0x1234").is_err());
        assert!(parse_transaction_hash(&format!("0x{}", "zz".repeat(32))).is_err());
    }

    #[test]
    fn test_convert_transaction() {
        let converted = convert_transaction(&sample_transaction()).unwrap();

        assert_eq!(converted.hash, format!("0x{}", "aa".repeat(32)));
        assert_eq!(converted.from, to_checksum(&Address::repeat_byte(0x11), None));
        assert_eq!(converted.to, Some(to_checksum(&Address::repeat_byte(0x22), None)));
        assert_eq!(converted.gas_limit, U256::from(21_000));
        assert_eq!(converted.block_number, Some(18_570_000));
    }

    #[test]
    fn test_convert_transaction_falls_back_to_max_fee() {
        let mut tx = sample_transaction();
        tx.gas_price = None;
        tx.max_fee_per_gas = Some(U256::from(30) * U256::exp10(9));

        let converted = convert_transaction(&tx).unwrap();
        assert_eq!(converted.gas_price, U256::from(30) * U256::exp10(9));

        tx.max_fee_per_gas = None;
        let err = convert_transaction(&tx).unwrap_err();
        assert_eq!(err.field, "gasPrice");
    }

    #[test]
    fn test_u256_to_u64() {
        assert_eq!(u256_to_u64(U256::from(1_700_000_000u64), "ts").unwrap(), 1_700_000_000);
        assert!(u256_to_u64(U256::MAX, "ts").is_err());
    }
}
