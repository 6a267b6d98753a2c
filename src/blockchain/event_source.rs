use async_trait::async_trait;
use ethers::providers::{Middleware, Provider, PubsubClient, Ws};
use ethers::types::{Address, Filter, H256};
use ethers::utils::keccak256;
use futures::stream::{BoxStream, StreamExt};
use std::str::FromStr;
use std::sync::Arc;

use crate::error::{ConfigError, MonitorError};
use crate::logging::LogContext;
use crate::models::LogMatch;

/// Push source of deposit log matches.
///
/// The returned stream ends when the underlying connection drops and is not
/// restarted. Dropping it unsubscribes.
#[async_trait]
pub trait EventSource: Send + Sync {
    async fn subscribe<'a>(&'a self) -> Result<BoxStream<'a, LogMatch>, MonitorError>;
}

/// Log subscription over a WebSocket provider, keyed by contract address and topic0
pub struct WsEventSource<P: PubsubClient = Ws> {
    provider: Arc<Provider<P>>,
    filter: Filter,
}

impl<P: PubsubClient> WsEventSource<P> {
    pub fn new(provider: Arc<Provider<P>>, filter: Filter) -> Self {
        Self { provider, filter }
    }

    pub fn filter(&self) -> &Filter {
        &self.filter
    }
}

#[async_trait]
impl<P> EventSource for WsEventSource<P>
where
    P: PubsubClient + 'static,
{
    async fn subscribe<'a>(&'a self) -> Result<BoxStream<'a, LogMatch>, MonitorError> {
        let stream = self
            .provider
            .subscribe_logs(&self.filter)
            .await
            .map_err(|e| MonitorError::Subscription(e.to_string()))?;

        LogContext::new("event_source", "subscribe")
            .with_metadata("subscription_id", serde_json::json!(format!("{:#x}", stream.id)))
            .info("Subscribed to deposit events");

        let matches = stream.filter_map(|entry| async move {
            match entry.transaction_hash {
                Some(hash) => Some(LogMatch::new(format!("{:#x}", hash))),
                None => {
                    log::debug!("Dropping log without transaction hash at index {:?}", entry.log_index);
                    None
                }
            }
        });

        Ok(matches.boxed())
    }
}

/// Compute topic0 for an event: keccak-256 of the signature text, or a
/// precomputed 32-byte `0x` hash taken verbatim.
pub fn event_topic(signature: &str) -> Result<H256, ConfigError> {
    let trimmed = signature.trim();
    if trimmed.is_empty() {
        return Err(ConfigError::InvalidValue {
            key: "chain.event_signature".to_string(),
            value: signature.to_string(),
        });
    }

    if let Some(digits) = trimmed.strip_prefix("0x") {
        if digits.len() == 64 {
            return H256::from_str(digits).map_err(|_| ConfigError::InvalidValue {
                key: "chain.event_signature".to_string(),
                value: signature.to_string(),
            });
        }
    }

    Ok(H256::from(keccak256(trimmed.as_bytes())))
}

/// Build the log filter for the monitored contract and event
pub fn deposit_filter(contract_address: &str, event_signature: &str) -> Result<Filter, ConfigError> {
    let address = Address::from_str(contract_address).map_err(|_| ConfigError::InvalidValue {
        key: "chain.contract_address".to_string(),
        value: contract_address.to_string(),
    })?;
    let topic = event_topic(event_signature)?;

    Ok(Filter::new().address(address).topic0(topic))
}

#[cfg(test)]
mod tests {
    use super::*;
    use ethers::types::{Topic, ValueOrArray};

    #[test]
    fn test_event_topic_hashes_signature() {
        let topic = event_topic("Transfer(address,address,uint256)").unwrap();
        assert_eq!(
            format!("{:#x}", topic),
            "0xddf252ad1be2c89b69c2b068fc378daa952ba7f163c4a11628f55a4df523b3ef"
        );
    }

    #[test]
    fn test_event_topic_accepts_precomputed_hash() {
        let precomputed = format!("0x{}", "12".repeat(32));
        assert_eq!(event_topic(&precomputed).unwrap(), H256::repeat_byte(0x12));
    }

    #[test]
    fn test_event_topic_rejects_empty_signature() {
        assert!(event_topic("   ").is_err());
    }

    #[test]
    fn test_deposit_filter() {
        let filter = deposit_filter(
            "0x00000000219ab540356cBB839Cbe05303d7705Fa",
            "Deposit(address,uint256)",
        )
        .unwrap();

        let expected_address = Address::from_str("0x00000000219ab540356cBB839Cbe05303d7705Fa").unwrap();
        assert_eq!(filter.address, Some(ValueOrArray::Value(expected_address)));

        let expected_topic: Topic = H256::from(keccak256("Deposit(address,uint256)".as_bytes())).into();
        assert_eq!(filter.topics[0], Some(expected_topic));
    }

    #[test]
    fn test_deposit_filter_rejects_bad_address() {
        let err = deposit_filter("0x1234", "Deposit(address,uint256)").unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { ref key, .. } if key == "chain.contract_address"));
    }
}
