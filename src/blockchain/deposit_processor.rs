use std::fmt;

use crate::blockchain::deposit_builder::DepositRecordBuilder;
use crate::blockchain::transaction_resolver::{Resolution, TransactionResolver};
use crate::error::MonitorError;
use crate::logging::{ErrorLogger, LogContext};
use crate::sinks::{FanoutReport, SinkFanout};

/// Result of processing one matched transaction
#[derive(Debug)]
pub enum ProcessOutcome {
    Delivered(FanoutReport),
    NotFound,
    Failed(MonitorError),
}

impl ProcessOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, ProcessOutcome::Delivered(_))
    }
}

impl fmt::Display for ProcessOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProcessOutcome::Delivered(report) => write!(
                f,
                "delivered (metrics: {}, store: {}, notification: {}, audit: {})",
                report.metrics, report.store, report.notification, report.audit
            ),
            ProcessOutcome::NotFound => write!(f, "transaction not found"),
            ProcessOutcome::Failed(e) => write!(f, "failed: {}", e),
        }
    }
}

/// Runs resolve, build and fanout for a single transaction hash
pub struct DepositProcessor {
    resolver: TransactionResolver,
    fanout: SinkFanout,
}

impl DepositProcessor {
    pub fn new(resolver: TransactionResolver, fanout: SinkFanout) -> Self {
        Self { resolver, fanout }
    }

    /// Never fails; every outcome ends with an audit entry
    pub async fn process_transaction(&self, tx_hash: &str) -> ProcessOutcome {
        LogContext::new("processor", "process_transaction")
            .with_transaction_hash(tx_hash)
            .debug("Processing deposit transaction");

        match self.resolver.resolve(tx_hash).await {
            Ok(Resolution::Found(resolved)) => match DepositRecordBuilder::build(&resolved) {
                Ok(record) => {
                    let report = self.fanout.deliver(&record, &resolved).await;
                    LogContext::new("processor", "process_transaction")
                        .with_transaction_hash(tx_hash)
                        .with_block_number(record.block_number)
                        .info("Deposit transaction processed");
                    ProcessOutcome::Delivered(report)
                }
                Err(e) => self.fail(tx_hash, MonitorError::Malformed(e)),
            },
            Ok(Resolution::NotFound) => {
                self.fanout.audit_failure(tx_hash, None);
                ProcessOutcome::NotFound
            }
            Err(e) => self.fail(tx_hash, MonitorError::Resolution(e)),
        }
    }

    fn fail(&self, tx_hash: &str, error: MonitorError) -> ProcessOutcome {
        ErrorLogger::log_error(
            &error,
            Some(LogContext::new("processor", "process_transaction").with_transaction_hash(tx_hash)),
        );
        self.fanout.audit_failure(tx_hash, Some(&error.to_string()));
        ProcessOutcome::Failed(error)
    }
}
