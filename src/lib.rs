pub mod api;
pub mod app;
pub mod blockchain;
pub mod config;
pub mod database;
pub mod error;
pub mod logging;
pub mod models;
pub mod sinks;

pub use blockchain::{DepositMonitor, DepositProcessor, MonitorHandle, TransactionResolver};
pub use config::{AppConfig, ChainConfig, LoggingConfig, NotificationConfig, ProcessingConfig, StoreConfig};
pub use error::{MonitorError, Result};
pub use logging::{ErrorLogger, LogContext, PerformanceMonitor};
pub use models::DepositRecord;
