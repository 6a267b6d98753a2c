//! Wiring shared by the monitor and tester binaries.

use ethers::providers::{Provider, Ws};
use log::{info, warn};
use prometheus::Registry;
use std::sync::Arc;

use crate::blockchain::{ChainClient, DepositProcessor, ProcessOutcome, TransactionResolver};
use crate::config::AppConfig;
use crate::database::DepositStore;
use crate::error::MonitorError;
use crate::logging::LogContext;
use crate::sinks::{AuditLog, DepositMetrics, Notifier, SinkFanout, TelegramNotifier};

pub async fn connect_provider(ws_url: &str) -> Result<Arc<Provider<Ws>>, MonitorError> {
    let ws = Ws::connect(ws_url)
        .await
        .map_err(|e| MonitorError::Subscription(format!("failed to connect to {}: {}", ws_url, e)))?;
    info!("Connected to chain endpoint {}", ws_url);
    Ok(Arc::new(Provider::new(ws)))
}

/// Builds the resolve/build/fanout pipeline writing into `collection`.
/// Metrics are registered on `registry`.
pub fn build_processor(
    config: &AppConfig,
    chain: Arc<dyn ChainClient>,
    store: Arc<dyn DepositStore>,
    collection: &str,
    registry: &Registry,
) -> Result<DepositProcessor, MonitorError> {
    let metrics = DepositMetrics::new(registry)?;

    let notifier = Arc::new(TelegramNotifier::new(&config.notification)?);
    if !notifier.is_configured() {
        warn!("Telegram bot token or chat id missing, notifications are disabled");
    }

    let audit = Arc::new(AuditLog::new(&config.audit.path));

    let fanout = SinkFanout::new(
        metrics,
        store,
        notifier,
        audit,
        collection,
        config.processing.test_mode,
    );

    Ok(DepositProcessor::new(TransactionResolver::new(chain), fanout))
}

/// Processes each hash once, in order, then closes the store.
///
/// Per-hash failures are reported in the outcomes; only closing the store
/// can fail the batch.
pub async fn process_hashes(
    processor: &DepositProcessor,
    store: &dyn DepositStore,
    hashes: &[String],
) -> Result<Vec<(String, ProcessOutcome)>, MonitorError> {
    let mut outcomes = Vec::with_capacity(hashes.len());
    for hash in hashes {
        let outcome = processor.process_transaction(hash).await;
        outcomes.push((hash.clone(), outcome));
    }

    LogContext::new("app", "process_hashes")
        .with_metadata("count", serde_json::json!(outcomes.len()))
        .info("Transaction batch processed");

    store.close().await?;
    Ok(outcomes)
}
