pub mod audit_log;
pub mod fanout;
pub mod metrics;
pub mod notifier;

pub use audit_log::{AuditEntry, AuditLog};
pub use fanout::{FanoutReport, SinkFanout, SinkStatus};
pub use metrics::DepositMetrics;
pub use notifier::{Notifier, TelegramNotifier};
