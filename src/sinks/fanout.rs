use serde_json::json;
use std::fmt;
use std::sync::Arc;

use crate::database::DepositStore;
use crate::error::SinkError;
use crate::logging::{LogContext, PerformanceMonitor};
use crate::models::{DepositRecord, ResolvedTx};
use crate::sinks::audit_log::{AuditEntry, AuditLog};
use crate::sinks::metrics::DepositMetrics;
use crate::sinks::notifier::Notifier;

/// Outcome of one sink for one record
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SinkStatus {
    Delivered,
    Skipped,
    Failed(String),
}

impl SinkStatus {
    fn from_result(result: Result<(), SinkError>) -> Self {
        match result {
            Ok(()) => SinkStatus::Delivered,
            Err(e) => SinkStatus::Failed(e.to_string()),
        }
    }

    pub fn is_failed(&self) -> bool {
        matches!(self, SinkStatus::Failed(_))
    }
}

impl fmt::Display for SinkStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SinkStatus::Delivered => write!(f, "delivered"),
            SinkStatus::Skipped => write!(f, "skipped"),
            SinkStatus::Failed(reason) => write!(f, "failed: {}", reason),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FanoutReport {
    pub metrics: SinkStatus,
    pub store: SinkStatus,
    pub notification: SinkStatus,
    pub audit: SinkStatus,
}

impl FanoutReport {
    pub fn has_failures(&self) -> bool {
        [&self.metrics, &self.store, &self.notification, &self.audit]
            .iter()
            .any(|status| status.is_failed())
    }
}

/// Delivers a deposit record to every sink, isolating each sink's failure
pub struct SinkFanout {
    metrics: DepositMetrics,
    store: Arc<dyn DepositStore>,
    notifier: Arc<dyn Notifier>,
    audit: Arc<AuditLog>,
    collection: String,
    test_mode: bool,
}

impl SinkFanout {
    pub fn new(
        metrics: DepositMetrics,
        store: Arc<dyn DepositStore>,
        notifier: Arc<dyn Notifier>,
        audit: Arc<AuditLog>,
        collection: impl Into<String>,
        test_mode: bool,
    ) -> Self {
        Self {
            metrics,
            store,
            notifier,
            audit,
            collection: collection.into(),
            test_mode,
        }
    }

    pub fn store(&self) -> &Arc<dyn DepositStore> {
        &self.store
    }

    pub fn is_test_mode(&self) -> bool {
        self.test_mode
    }

    /// Run metrics, store, notification and audit in that order
    pub async fn deliver(&self, record: &DepositRecord, resolved: &ResolvedTx) -> FanoutReport {
        let metrics = SinkStatus::from_result(self.metrics.record(record));

        let store = if self.test_mode {
            SinkStatus::Skipped
        } else {
            let monitor = PerformanceMonitor::new("store_insert")
                .with_metadata("transaction_hash", json!(record.hash))
                .with_metadata("collection", json!(self.collection));
            let result = self.store.insert(&self.collection, record).await;
            monitor.finish_with_result(&result);
            SinkStatus::from_result(result.map_err(SinkError::from))
        };

        let notification = if self.test_mode || !self.notifier.is_configured() {
            SinkStatus::Skipped
        } else {
            let monitor = PerformanceMonitor::new("notify")
                .with_metadata("transaction_hash", json!(record.hash));
            let result = self.notifier.send(&record.notification_message()).await;
            monitor.finish_with_result(&result);
            SinkStatus::from_result(result)
        };

        let audit = SinkStatus::from_result(
            self.audit.append(&AuditEntry::success(&record.hash, resolved.internal)),
        );

        let report = FanoutReport { metrics, store, notification, audit };
        self.log_report(&record.hash, &report);
        report
    }

    /// Audit an attempt that produced no record. `error` is `None` for a
    /// transaction that was simply not found.
    pub fn audit_failure(&self, tx_hash: &str, error: Option<&str>) -> SinkStatus {
        let status = SinkStatus::from_result(self.audit.append(&AuditEntry::failure(tx_hash, error)));
        if let SinkStatus::Failed(reason) = &status {
            LogContext::new("fanout", "audit_failure")
                .with_transaction_hash(tx_hash)
                .with_sink("audit")
                .error(&format!("Failed to write audit entry: {}", reason));
        }
        status
    }

    fn log_report(&self, tx_hash: &str, report: &FanoutReport) {
        let sinks = [
            ("metrics", &report.metrics),
            ("store", &report.store),
            ("notification", &report.notification),
            ("audit", &report.audit),
        ];

        for (sink, status) in sinks {
            if let SinkStatus::Failed(reason) = status {
                LogContext::new("fanout", "deliver")
                    .with_transaction_hash(tx_hash)
                    .with_sink(sink)
                    .error(&format!("Sink delivery failed: {}", reason));
            }
        }

        let context = LogContext::new("fanout", "deliver")
            .with_transaction_hash(tx_hash)
            .with_metadata("metrics", json!(report.metrics.to_string()))
            .with_metadata("store", json!(report.store.to_string()))
            .with_metadata("notification", json!(report.notification.to_string()))
            .with_metadata("audit", json!(report.audit.to_string()));
        if report.has_failures() {
            context.warn("Fanout completed with failed sinks");
        } else {
            context.debug("Fanout completed");
        }
    }
}
