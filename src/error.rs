use thiserror::Error;

/// Main error type for the deposit monitor
#[derive(Error, Debug)]
pub enum MonitorError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Failed to subscribe to deposit events: {0}")]
    Subscription(String),

    #[error("Deposit event subscription closed by the chain connection")]
    SubscriptionClosed,

    #[error("Resolution error: {0}")]
    Resolution(#[from] ResolutionError),

    #[error("Malformed input: {0}")]
    Malformed(#[from] MalformedInput),

    #[error("Sink error: {0}")]
    Sink(#[from] SinkError),

    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("Metrics registry error: {0}")]
    Metrics(#[from] prometheus::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Failures while fetching a transaction or its block from the chain
#[derive(Error, Debug)]
pub enum ResolutionError {
    #[error("Chain RPC call {method} failed: {message}")]
    Rpc { method: String, message: String },

    #[error("Block {block_number} not found")]
    BlockNotFound { block_number: u64 },

    #[error("Transaction {0} has not been mined yet")]
    Pending(String),

    #[error(transparent)]
    Malformed(#[from] MalformedInput),
}

/// Unexpected numeric or shape violation in data returned by the chain
#[derive(Error, Debug, Clone, PartialEq)]
#[error("{field}: {reason}")]
pub struct MalformedInput {
    pub field: String,
    pub reason: String,
}

impl MalformedInput {
    pub fn new(field: &str, reason: impl Into<String>) -> Self {
        Self {
            field: field.to_string(),
            reason: reason.into(),
        }
    }
}

/// Per-sink delivery failures. These never leave the fanout.
#[derive(Error, Debug)]
pub enum SinkError {
    #[error("Store write failed: {0}")]
    Store(#[from] StoreError),

    #[error("Notification request failed: {0}")]
    Notification(String),

    #[error("Invalid metric value for {metric}: {value}")]
    InvalidMetric { metric: String, value: String },

    #[error("Audit log write failed: {0}")]
    AuditLog(#[from] std::io::Error),
}

/// Document store errors
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Database connection failed: {0}")]
    Connection(#[from] rusqlite::Error),

    #[error("Serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Store operation failed: {0}")]
    Operation(String),

    #[error("Store connection is closed")]
    Closed,

    #[error("Record not found")]
    NotFound,
}

/// Configuration errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Invalid configuration value for {key}: {value}")]
    InvalidValue { key: String, value: String },

    #[error("Configuration file not found: {0}")]
    FileNotFound(String),

    #[error("Configuration parsing failed: {0}")]
    Parsing(String),

    #[error("Invalid URL format: {0}")]
    InvalidUrl(String),
}

/// Result type alias for convenience
pub type Result<T> = std::result::Result<T, MonitorError>;

/// Error severity levels for logging
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorSeverity {
    /// Stops the process
    Critical,
    /// Lost a deposit or a sink delivery
    High,
    /// Transient, the next event is unaffected
    Medium,
    /// Expected outcome
    Low,
}

impl MonitorError {
    /// Get the severity level of an error
    pub fn severity(&self) -> ErrorSeverity {
        match self {
            MonitorError::Config(_) => ErrorSeverity::Critical,
            MonitorError::Subscription(_) => ErrorSeverity::Critical,
            MonitorError::SubscriptionClosed => ErrorSeverity::Critical,
            MonitorError::Metrics(_) => ErrorSeverity::Critical,

            MonitorError::Malformed(_) => ErrorSeverity::High,
            MonitorError::Resolution(ResolutionError::Malformed(_)) => ErrorSeverity::High,
            MonitorError::Store(StoreError::Closed) => ErrorSeverity::High,
            MonitorError::Sink(SinkError::AuditLog(_)) => ErrorSeverity::High,

            MonitorError::Resolution(ResolutionError::Pending(_)) => ErrorSeverity::Low,
            MonitorError::Sink(SinkError::InvalidMetric { .. }) => ErrorSeverity::Low,
            _ => ErrorSeverity::Medium,
        }
    }

    /// Check if the error is transient, i.e. a later event may succeed
    pub fn is_recoverable(&self) -> bool {
        match self {
            MonitorError::Resolution(ResolutionError::Rpc { .. }) => true,
            MonitorError::Resolution(ResolutionError::BlockNotFound { .. }) => true,
            MonitorError::Resolution(ResolutionError::Pending(_)) => true,
            MonitorError::Sink(_) => true,
            MonitorError::Store(StoreError::Connection(_)) => true,

            MonitorError::Config(_) => false,
            MonitorError::Subscription(_) => false,
            MonitorError::SubscriptionClosed => false,
            MonitorError::Malformed(_) => false,
            _ => false,
        }
    }

    /// Short machine-readable code for structured logs
    pub fn code(&self) -> &'static str {
        match self {
            MonitorError::Config(_) => "config",
            MonitorError::Subscription(_) => "subscription",
            MonitorError::SubscriptionClosed => "subscription_closed",
            MonitorError::Resolution(_) => "resolution",
            MonitorError::Malformed(_) => "malformed_input",
            MonitorError::Sink(_) => "sink",
            MonitorError::Store(_) => "store",
            MonitorError::Metrics(_) => "metrics",
            MonitorError::Io(_) => "io",
        }
    }
}
