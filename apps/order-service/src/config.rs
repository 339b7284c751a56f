//! Configuration module for the order service.
//!
//! Provides configuration loading, validation, and environment variable
//! interpolation for every order service component.
//!
//! # Usage
//!
//! ```rust,ignore
//! use order_service::config::load_config;
//!
//! // Load from ORDER_SERVICE_CONFIG, or config.yaml, or built-in defaults
//! let config = load_config(None)?;
//!
//! // Load from custom path
//! let config = load_config(Some("custom/config.yaml"))?;
//!
//! println!("HTTP port: {}", config.server.http_port);
//! ```

use std::collections::HashMap;
use std::net::SocketAddr;
use std::time::Duration;

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::application::ports::{DEAD_LETTER_QUEUE, MAIN_QUEUE};
use crate::domain::idempotency::MAX_TTL_SECS;
use crate::domain::order_lifecycle::PriceSanityPolicy;

/// Environment variable naming the config file.
pub const CONFIG_PATH_ENV: &str = "ORDER_SERVICE_CONFIG";
/// Config file read when no path is given.
pub const DEFAULT_CONFIG_PATH: &str = "config.yaml";

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Failed to read configuration file.
    #[error("Failed to read config file '{path}': {source}")]
    ReadError {
        /// Path to the config file.
        path: String,
        /// The underlying IO error.
        source: std::io::Error,
    },

    /// Failed to parse YAML configuration.
    #[error("Failed to parse config YAML: {0}")]
    ParseError(#[from] serde_yaml_bw::Error),

    /// Configuration validation failed.
    #[error("Config validation failed: {0}")]
    ValidationError(String),
}

/// Root configuration structure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct Config {
    /// Server configuration.
    #[serde(default)]
    pub server: ServerConfig,
    /// Worker pool configuration.
    #[serde(default)]
    pub worker: WorkerConfig,
    /// Submission checks configuration.
    #[serde(default)]
    pub submission: SubmissionConfig,
    /// Order repository configuration.
    #[serde(default)]
    pub persistence: PersistenceConfig,
    /// Idempotency store configuration.
    #[serde(default)]
    pub idempotency: IdempotencyConfig,
    /// Order broker configuration.
    #[serde(default)]
    pub broker: BrokerConfig,
    /// Market data configuration.
    #[serde(default)]
    pub market_data: MarketDataConfig,
    /// Authentication configuration.
    #[serde(default)]
    pub auth: AuthConfig,
    /// Observability configuration.
    #[serde(default)]
    pub observability: ObservabilityConfig,
}

/// Server configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerConfig {
    /// HTTP server port.
    #[serde(default = "default_http_port")]
    pub http_port: u16,
    /// Bind address.
    #[serde(default = "default_bind_address")]
    pub bind_address: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            http_port: default_http_port(),
            bind_address: default_bind_address(),
        }
    }
}

impl ServerConfig {
    /// Socket address the HTTP server binds.
    ///
    /// # Errors
    ///
    /// Returns `ValidationError` if the bind address is not an IP address.
    pub fn http_addr(&self) -> Result<SocketAddr, ConfigError> {
        format!("{}:{}", self.bind_address, self.http_port)
            .parse()
            .map_err(|e| {
                ConfigError::ValidationError(format!(
                    "server.bind_address '{}' is invalid: {e}",
                    self.bind_address
                ))
            })
    }
}

const fn default_http_port() -> u16 {
    8080
}
fn default_bind_address() -> String {
    "0.0.0.0".to_string()
}

/// Worker pool configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkerConfig {
    /// Number of concurrent consumers.
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,
    /// Redeliveries allowed before a retryable failure becomes terminal.
    #[serde(default = "default_max_redeliveries")]
    pub max_redeliveries: u32,
    /// Per-message processing deadline in milliseconds.
    #[serde(default = "default_processing_timeout_ms")]
    pub processing_timeout_ms: u64,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            concurrency: default_concurrency(),
            max_redeliveries: default_max_redeliveries(),
            processing_timeout_ms: default_processing_timeout_ms(),
        }
    }
}

impl WorkerConfig {
    /// Per-message processing deadline.
    #[must_use]
    pub const fn processing_timeout(&self) -> Duration {
        Duration::from_millis(self.processing_timeout_ms)
    }
}

const fn default_concurrency() -> usize {
    8
}
const fn default_max_redeliveries() -> u32 {
    5
}
const fn default_processing_timeout_ms() -> u64 {
    30_000
}

/// Submission checks configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubmissionConfig {
    /// Deadline for each market data call in milliseconds.
    #[serde(default = "default_market_data_timeout_ms")]
    pub market_data_timeout_ms: u64,
    /// Idempotency record lifetime in seconds.
    #[serde(default = "default_idempotency_ttl_secs")]
    pub idempotency_ttl_secs: u64,
    /// Maximum relative deviation of a limit price from the market.
    #[serde(default = "default_max_price_deviation")]
    pub max_price_deviation: Decimal,
    /// Buy limits above `market * buy_limit_ceiling` are rejected.
    #[serde(default = "default_buy_limit_ceiling")]
    pub buy_limit_ceiling: Decimal,
    /// Sell limits below `market * sell_limit_floor` are rejected.
    #[serde(default = "default_sell_limit_floor")]
    pub sell_limit_floor: Decimal,
}

impl Default for SubmissionConfig {
    fn default() -> Self {
        Self {
            market_data_timeout_ms: default_market_data_timeout_ms(),
            idempotency_ttl_secs: default_idempotency_ttl_secs(),
            max_price_deviation: default_max_price_deviation(),
            buy_limit_ceiling: default_buy_limit_ceiling(),
            sell_limit_floor: default_sell_limit_floor(),
        }
    }
}

impl SubmissionConfig {
    /// Deadline for each market data call.
    #[must_use]
    pub const fn market_data_timeout(&self) -> Duration {
        Duration::from_millis(self.market_data_timeout_ms)
    }

    /// Price band policy.
    #[must_use]
    pub const fn price_policy(&self) -> PriceSanityPolicy {
        PriceSanityPolicy {
            max_deviation: self.max_price_deviation,
            buy_limit_ceiling: self.buy_limit_ceiling,
            sell_limit_floor: self.sell_limit_floor,
        }
    }
}

const fn default_market_data_timeout_ms() -> u64 {
    5_000
}
const fn default_idempotency_ttl_secs() -> u64 {
    MAX_TTL_SECS
}
const fn default_max_price_deviation() -> Decimal {
    dec!(0.10)
}
const fn default_buy_limit_ceiling() -> Decimal {
    dec!(1.05)
}
const fn default_sell_limit_floor() -> Decimal {
    dec!(0.95)
}

/// Order repository backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum PersistenceBackend {
    /// Process-local map.
    #[default]
    Memory,
    /// SQLite database.
    Sqlite,
}

/// Order repository configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PersistenceConfig {
    /// Backend.
    #[serde(default)]
    pub backend: PersistenceBackend,
    /// SQLite connection URL.
    #[serde(default = "default_orders_database_url")]
    pub database_url: String,
    /// Connection pool size.
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
}

impl Default for PersistenceConfig {
    fn default() -> Self {
        Self {
            backend: PersistenceBackend::default(),
            database_url: default_orders_database_url(),
            max_connections: default_max_connections(),
        }
    }
}

fn default_orders_database_url() -> String {
    "sqlite://orders.db?mode=rwc".to_string()
}
const fn default_max_connections() -> u32 {
    5
}

/// Idempotency store backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum IdempotencyBackend {
    /// Process-local map.
    #[default]
    Memory,
    /// Redis.
    Redis,
}

/// Idempotency store configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdempotencyConfig {
    /// Backend.
    #[serde(default)]
    pub backend: IdempotencyBackend,
    /// Redis connection URL.
    #[serde(default = "default_redis_url")]
    pub redis_url: String,
}

impl Default for IdempotencyConfig {
    fn default() -> Self {
        Self {
            backend: IdempotencyBackend::default(),
            redis_url: default_redis_url(),
        }
    }
}

fn default_redis_url() -> String {
    "redis://127.0.0.1:6379".to_string()
}

/// Order broker backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum BrokerBackend {
    /// Process-local queues.
    #[default]
    Memory,
    /// SQLite-backed durable queues.
    Sqlite,
}

/// Order broker configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BrokerConfig {
    /// Backend.
    #[serde(default)]
    pub backend: BrokerBackend,
    /// SQLite connection URL.
    #[serde(default = "default_broker_database_url")]
    pub database_url: String,
    /// Main queue name.
    #[serde(default = "default_main_queue")]
    pub main_queue: String,
    /// Dead-letter queue name.
    #[serde(default = "default_dead_letter_queue")]
    pub dead_letter_queue: String,
    /// Poll interval for durable backends in milliseconds.
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
}

impl Default for BrokerConfig {
    fn default() -> Self {
        Self {
            backend: BrokerBackend::default(),
            database_url: default_broker_database_url(),
            main_queue: default_main_queue(),
            dead_letter_queue: default_dead_letter_queue(),
            poll_interval_ms: default_poll_interval_ms(),
        }
    }
}

impl BrokerConfig {
    /// Poll interval for durable backends.
    #[must_use]
    pub const fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

fn default_broker_database_url() -> String {
    "sqlite://broker.db?mode=rwc".to_string()
}
fn default_main_queue() -> String {
    MAIN_QUEUE.to_string()
}
fn default_dead_letter_queue() -> String {
    DEAD_LETTER_QUEUE.to_string()
}
const fn default_poll_interval_ms() -> u64 {
    100
}

/// Market data backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum MarketDataBackend {
    /// Fixed prices from configuration.
    #[default]
    Static,
    /// Remote HTTP provider.
    Http,
}

/// Market data configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MarketDataConfig {
    /// Backend.
    #[serde(default)]
    pub backend: MarketDataBackend,
    /// Provider base URL.
    #[serde(default)]
    pub base_url: String,
    /// Provider API key.
    #[serde(default)]
    pub api_key: String,
    /// Static prices by symbol.
    #[serde(default)]
    pub prices: HashMap<String, Decimal>,
    /// Static market state.
    #[serde(default = "default_true")]
    pub market_open: bool,
}

impl Default for MarketDataConfig {
    fn default() -> Self {
        Self {
            backend: MarketDataBackend::default(),
            base_url: String::new(),
            api_key: String::new(),
            prices: HashMap::new(),
            market_open: true,
        }
    }
}

/// Authentication configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct AuthConfig {
    /// Bearer token to user ID.
    #[serde(default)]
    pub tokens: HashMap<String, String>,
    /// Trust loopback gRPC peers presenting `x-user-id`.
    #[serde(default)]
    pub trust_loopback: bool,
}

/// Observability configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct ObservabilityConfig {
    /// Logging configuration.
    #[serde(default)]
    pub logging: LoggingConfig,
    /// Metrics configuration.
    #[serde(default)]
    pub metrics: MetricsConfig,
}

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// One JSON object per line.
    #[default]
    Json,
    /// Human-readable multi-line output.
    Pretty,
}

/// Logging configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level or filter directive.
    #[serde(default = "default_log_level")]
    pub level: String,
    /// Output format.
    #[serde(default)]
    pub format: LogFormat,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: LogFormat::default(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

/// Prometheus metrics configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetricsConfig {
    /// Start the exporter.
    #[serde(default)]
    pub enabled: bool,
    /// Exporter listen address.
    #[serde(default = "default_metrics_listen_addr")]
    pub listen_addr: String,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            listen_addr: default_metrics_listen_addr(),
        }
    }
}

fn default_metrics_listen_addr() -> String {
    "0.0.0.0:9090".to_string()
}

const fn default_true() -> bool {
    true
}

// ============================================
// Configuration Loading
// ============================================

/// Load configuration from a YAML file with environment variable interpolation.
///
/// # Arguments
///
/// * `path` - Optional path to the config file. Falls back to
///   `ORDER_SERVICE_CONFIG`, then to `config.yaml`. A missing
///   `config.yaml` yields the built-in defaults; a missing explicit
///   path is an error.
///
/// # Errors
///
/// Returns a `ConfigError` if the file cannot be read, parsed, or validated.
pub fn load_config(path: Option<&str>) -> Result<Config, ConfigError> {
    let explicit = path
        .map(str::to_string)
        .or_else(|| std::env::var(CONFIG_PATH_ENV).ok().filter(|p| !p.is_empty()));

    let path = explicit.as_deref().unwrap_or(DEFAULT_CONFIG_PATH);

    let contents = match std::fs::read_to_string(path) {
        Ok(contents) => contents,
        Err(e) if explicit.is_none() && e.kind() == std::io::ErrorKind::NotFound => {
            let config = Config::default();
            validate_config(&config)?;
            return Ok(config);
        }
        Err(e) => {
            return Err(ConfigError::ReadError {
                path: path.to_string(),
                source: e,
            });
        }
    };

    load_config_from_string(&contents)
}

/// Load configuration from a YAML string (useful for testing).
///
/// # Errors
///
/// Returns a `ConfigError` if the YAML cannot be parsed or validated.
pub fn load_config_from_string(yaml: &str) -> Result<Config, ConfigError> {
    let interpolated = interpolate_env_vars(yaml);
    let config: Config = if interpolated.trim().is_empty() {
        Config::default()
    } else {
        serde_yaml_bw::from_str(&interpolated)?
    };
    validate_config(&config)?;
    Ok(config)
}

/// Interpolate environment variables in a string.
///
/// Supports both `${VAR}` and `${VAR:-default}` syntax.
#[allow(clippy::expect_used)] // Regex is compile-time constant; expect() is safe here
fn interpolate_env_vars(input: &str) -> String {
    use std::sync::OnceLock;

    static ENV_VAR_REGEX: OnceLock<regex::Regex> = OnceLock::new();

    let re = ENV_VAR_REGEX.get_or_init(|| {
        regex::Regex::new(r"\$\{([A-Za-z_][A-Za-z0-9_]*)(?::-([^}]*))?\}")
            .expect("env var regex is valid")
    });

    re.replace_all(input, |caps: &regex::Captures<'_>| {
        let default_value = caps.get(2).map_or("", |m| m.as_str());
        match caps.get(1).map(|m| std::env::var(m.as_str())) {
            Some(Ok(v)) if !v.is_empty() => v,
            _ => default_value.to_string(),
        }
    })
    .into_owned()
}

/// Validate configuration values.
fn validate_config(config: &Config) -> Result<(), ConfigError> {
    let invalid = |msg: &str| Err(ConfigError::ValidationError(msg.to_string()));

    config.server.http_addr()?;

    if config.worker.concurrency == 0 {
        return invalid("worker.concurrency must be at least 1");
    }
    if config.worker.processing_timeout_ms == 0 {
        return invalid("worker.processing_timeout_ms must be positive");
    }

    let submission = &config.submission;
    if submission.market_data_timeout_ms == 0 {
        return invalid("submission.market_data_timeout_ms must be positive");
    }
    if !(1..=MAX_TTL_SECS).contains(&submission.idempotency_ttl_secs) {
        return Err(ConfigError::ValidationError(format!(
            "submission.idempotency_ttl_secs must be between 1 and {MAX_TTL_SECS}"
        )));
    }
    if submission.max_price_deviation <= Decimal::ZERO {
        return invalid("submission.max_price_deviation must be positive");
    }
    if submission.buy_limit_ceiling < Decimal::ONE {
        return invalid("submission.buy_limit_ceiling must be at least 1");
    }
    if submission.sell_limit_floor <= Decimal::ZERO || submission.sell_limit_floor > Decimal::ONE {
        return invalid("submission.sell_limit_floor must be in (0, 1]");
    }

    if config.persistence.backend == PersistenceBackend::Sqlite {
        if config.persistence.database_url.is_empty() {
            return invalid("persistence.database_url is required for the sqlite backend");
        }
        if config.persistence.max_connections == 0 {
            return invalid("persistence.max_connections must be at least 1");
        }
    }

    if config.idempotency.backend == IdempotencyBackend::Redis
        && config.idempotency.redis_url.is_empty()
    {
        return invalid("idempotency.redis_url is required for the redis backend");
    }

    let broker = &config.broker;
    if broker.main_queue.is_empty() || broker.dead_letter_queue.is_empty() {
        return invalid("broker queue names must not be empty");
    }
    if broker.main_queue == broker.dead_letter_queue {
        return invalid("broker.main_queue and broker.dead_letter_queue must differ");
    }
    if broker.backend == BrokerBackend::Sqlite {
        if broker.database_url.is_empty() {
            return invalid("broker.database_url is required for the sqlite backend");
        }
        if broker.poll_interval_ms == 0 {
            return invalid("broker.poll_interval_ms must be positive");
        }
    }

    if config.market_data.backend == MarketDataBackend::Http && config.market_data.base_url.is_empty()
    {
        return invalid("market_data.base_url is required for the http backend");
    }
    if config.market_data.prices.values().any(|p| *p <= Decimal::ZERO) {
        return invalid("market_data.prices must all be positive");
    }

    if config.observability.metrics.enabled
        && config
            .observability
            .metrics
            .listen_addr
            .parse::<SocketAddr>()
            .is_err()
    {
        return invalid("observability.metrics.listen_addr must be a socket address");
    }

    Ok(())
}
