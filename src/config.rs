use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::Path;
use crate::error::ConfigError;

/// Main application configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub chain: ChainConfig,
    pub store: StoreConfig,
    pub notification: NotificationConfig,
    pub audit: AuditConfig,
    pub metrics: MetricsConfig,
    pub processing: ProcessingConfig,
    pub logging: LoggingConfig,
}

/// Chain connection configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChainConfig {
    /// WebSocket endpoint of the chain node
    pub ws_url: String,
    /// Deposit contract whose events are monitored
    pub contract_address: String,
    /// Event signature text, or a precomputed 0x topic hash
    pub event_signature: String,
}

/// Document store configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    /// SQLite database file path
    pub path: String,
    /// Collection that deposit records are written to
    pub collection: String,
}

/// Chat notification configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotificationConfig {
    /// Telegram bot token
    pub bot_token: String,
    /// Destination chat id
    pub chat_id: String,
    /// Bot API base URL
    pub api_base: String,
    /// Request timeout in seconds
    pub timeout_seconds: u64,
}

/// Audit log configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditConfig {
    /// Append-only text file with one line per processing attempt
    pub path: String,
}

/// Metrics exporter configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricsConfig {
    /// Serve GET /metrics
    pub enabled: bool,
    /// Bind address
    pub host: String,
    /// Bind port
    pub port: u16,
}

/// Processing configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProcessingConfig {
    /// Suppress store and notification side effects
    pub test_mode: bool,
    /// Upper bound on concurrently processed log matches
    pub max_in_flight: usize,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level (error, warn, info, debug, trace)
    pub level: String,
    /// Log format (json, pretty)
    pub format: String,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            chain: ChainConfig::default(),
            store: StoreConfig::default(),
            notification: NotificationConfig::default(),
            audit: AuditConfig::default(),
            metrics: MetricsConfig::default(),
            processing: ProcessingConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl Default for ChainConfig {
    fn default() -> Self {
        Self {
            ws_url: "ws://127.0.0.1:8546".to_string(),
            // Beacon chain deposit contract on Ethereum mainnet
            contract_address: "0x00000000219ab540356cBB839Cbe05303d7705Fa".to_string(),
            event_signature: "Deposit(address,uint256)".to_string(),
        }
    }
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            path: "./deposits.db".to_string(),
            collection: "rt deposits".to_string(),
        }
    }
}

impl Default for NotificationConfig {
    fn default() -> Self {
        Self {
            bot_token: String::new(),
            chat_id: String::new(),
            api_base: "https://api.telegram.org".to_string(),
            timeout_seconds: 15,
        }
    }
}

impl Default for AuditConfig {
    fn default() -> Self {
        Self {
            path: "./transactions.log".to_string(),
        }
    }
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            host: "0.0.0.0".to_string(),
            port: 9100,
        }
    }
}

impl Default for ProcessingConfig {
    fn default() -> Self {
        Self {
            test_mode: false,
            max_in_flight: crate::blockchain::DEFAULT_MAX_IN_FLIGHT,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "pretty".to_string(),
        }
    }
}

fn parse_env<T: std::str::FromStr>(key: &str) -> Result<Option<T>, ConfigError> {
    match env::var(key) {
        Ok(raw) => raw
            .parse()
            .map(Some)
            .map_err(|_| ConfigError::InvalidValue {
                key: key.to_string(),
                value: raw,
            }),
        Err(_) => Ok(None),
    }
}

/// Reads `key`, falling back to the older deployment name `legacy`
fn env_or_legacy(key: &str, legacy: &str) -> Option<String> {
    env::var(key).or_else(|_| env::var(legacy)).ok()
}

impl AppConfig {
    /// Load configuration from file and environment variables
    /// Environment variables take precedence over file values
    pub fn load() -> Result<Self, ConfigError> {
        let mut config = Self::load_from_file()?;
        config.apply_env_overrides()?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from TOML file
    pub fn load_from_file() -> Result<Self, ConfigError> {
        let config_path = env::var("CONFIG_FILE").unwrap_or_else(|_| "config.toml".to_string());

        if !Path::new(&config_path).exists() {
            return Ok(Self::default());
        }

        let content = fs::read_to_string(&config_path)
            .map_err(|_| ConfigError::FileNotFound(config_path.clone()))?;
        let config: AppConfig = toml::from_str(&content)
            .map_err(|e| ConfigError::Parsing(e.to_string()))?;
        Ok(config)
    }

    /// Apply environment variable overrides
    pub fn apply_env_overrides(&mut self) -> Result<(), ConfigError> {
        // Chain configuration
        if let Some(ws_url) = env_or_legacy("CHAIN_WS_URL", "ALCHEMY_WS_URL") {
            self.chain.ws_url = ws_url;
        }
        if let Some(address) = env_or_legacy("DEPOSIT_CONTRACT_ADDRESS", "BEACON_DEPOSIT_CONTRACT_ADDRESS") {
            self.chain.contract_address = address;
        }
        if let Ok(signature) = env::var("DEPOSIT_EVENT_SIGNATURE") {
            self.chain.event_signature = signature;
        }

        // Store configuration
        if let Ok(path) = env::var("STORE_PATH") {
            self.store.path = path;
        }
        if let Ok(collection) = env::var("STORE_COLLECTION") {
            self.store.collection = collection;
        }

        // Notification configuration
        if let Ok(token) = env::var("TELEGRAM_BOT_TOKEN") {
            self.notification.bot_token = token;
        }
        if let Some(chat_id) = env_or_legacy("TELEGRAM_CHAT_ID", "CHAT_ID") {
            self.notification.chat_id = chat_id;
        }
        if let Ok(api_base) = env::var("TELEGRAM_API_BASE") {
            self.notification.api_base = api_base;
        }
        if let Some(timeout) = parse_env("NOTIFY_TIMEOUT_SECONDS")? {
            self.notification.timeout_seconds = timeout;
        }

        // Audit log
        if let Some(path) = env_or_legacy("AUDIT_LOG_PATH", "LOG_FILE_PATH") {
            self.audit.path = path;
        }

        // Metrics exporter
        if let Some(enabled) = parse_env("METRICS_ENABLED")? {
            self.metrics.enabled = enabled;
        }
        if let Ok(host) = env::var("METRICS_HOST") {
            self.metrics.host = host;
        }
        if let Some(port) = parse_env("METRICS_PORT")? {
            self.metrics.port = port;
        }

        // Processing
        if let Some(test_mode) = parse_env("TEST_MODE")? {
            self.processing.test_mode = test_mode;
        }
        if let Some(max_in_flight) = parse_env("MAX_IN_FLIGHT")? {
            self.processing.max_in_flight = max_in_flight;
        }

        // Logging configuration
        if let Ok(level) = env::var("LOG_LEVEL") {
            self.logging.level = level;
        }
        if let Ok(format) = env::var("LOG_FORMAT") {
            self.logging.format = format;
        }

        Ok(())
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.chain.ws_url.starts_with("ws://") && !self.chain.ws_url.starts_with("wss://") {
            return Err(ConfigError::InvalidUrl(self.chain.ws_url.clone()));
        }

        let address = &self.chain.contract_address;
        let is_hex_address = address.len() == 42
            && address.starts_with("0x")
            && address[2..].chars().all(|c| c.is_ascii_hexdigit());
        if !is_hex_address {
            return Err(ConfigError::InvalidValue {
                key: "chain.contract_address".to_string(),
                value: address.clone(),
            });
        }

        if self.chain.event_signature.trim().is_empty() {
            return Err(ConfigError::InvalidValue {
                key: "chain.event_signature".to_string(),
                value: self.chain.event_signature.clone(),
            });
        }

        if self.store.path.trim().is_empty() {
            return Err(ConfigError::InvalidValue {
                key: "store.path".to_string(),
                value: self.store.path.clone(),
            });
        }

        if self.store.collection.trim().is_empty() {
            return Err(ConfigError::InvalidValue {
                key: "store.collection".to_string(),
                value: self.store.collection.clone(),
            });
        }

        if !self.notification.api_base.starts_with("http://")
            && !self.notification.api_base.starts_with("https://")
        {
            return Err(ConfigError::InvalidUrl(self.notification.api_base.clone()));
        }

        if self.notification.timeout_seconds == 0 || self.notification.timeout_seconds > 300 {
            return Err(ConfigError::InvalidValue {
                key: "notification.timeout_seconds".to_string(),
                value: self.notification.timeout_seconds.to_string(),
            });
        }

        if self.audit.path.trim().is_empty() {
            return Err(ConfigError::InvalidValue {
                key: "audit.path".to_string(),
                value: self.audit.path.clone(),
            });
        }

        if self.metrics.port == 0 {
            return Err(ConfigError::InvalidValue {
                key: "metrics.port".to_string(),
                value: self.metrics.port.to_string(),
            });
        }

        if self.processing.max_in_flight == 0 || self.processing.max_in_flight > 10_000 {
            return Err(ConfigError::InvalidValue {
                key: "processing.max_in_flight".to_string(),
                value: self.processing.max_in_flight.to_string(),
            });
        }

        let valid_levels = ["error", "warn", "info", "debug", "trace"];
        if !valid_levels.contains(&self.logging.level.as_str()) {
            return Err(ConfigError::InvalidValue {
                key: "logging.level".to_string(),
                value: self.logging.level.clone(),
            });
        }

        let valid_formats = ["json", "pretty"];
        if !valid_formats.contains(&self.logging.format.as_str()) {
            return Err(ConfigError::InvalidValue {
                key: "logging.format".to_string(),
                value: self.logging.format.clone(),
            });
        }

        Ok(())
    }

    /// Generate a sample configuration file
    pub fn generate_sample_config() -> Result<String, ConfigError> {
        let config = Self::default();
        toml::to_string_pretty(&config)
            .map_err(|e| ConfigError::Parsing(e.to_string()))
    }
}
