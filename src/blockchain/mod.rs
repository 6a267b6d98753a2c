pub mod chain_client;
pub mod deposit_builder;
pub mod deposit_monitor;
pub mod deposit_processor;
pub mod event_source;
pub mod transaction_resolver;
pub mod units;

pub use chain_client::{ChainClient, EthersChainClient};
pub use deposit_builder::DepositRecordBuilder;
pub use deposit_monitor::{DepositMonitor, MonitorHandle, MonitorState, MonitorStatus, DEFAULT_MAX_IN_FLIGHT};
pub use deposit_processor::{DepositProcessor, ProcessOutcome};
pub use event_source::{deposit_filter, event_topic, EventSource, WsEventSource};
pub use transaction_resolver::{Resolution, TransactionResolver};
