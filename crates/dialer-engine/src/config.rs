use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{DialerError, Result};

/// Dialer engine configuration
///
/// Every section has production defaults, so a TOML file only needs to name
/// the values it overrides:
///
/// ```
/// use rvoip_dialer_engine::config::DialerConfig;
///
/// let config = DialerConfig::from_toml_str(r#"
///     [pacer]
///     tick_interval_ms = 250
///
///     [queue]
///     default_retry_delay_secs = 900
/// "#).unwrap();
///
/// assert_eq!(config.pacer.tick_interval_ms, 250);
/// assert_eq!(config.queue.default_retry_delay_secs, 900);
/// assert_eq!(config.leases.default_ttl_secs, 120);
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct DialerConfig {
    /// General dialer settings
    pub general: GeneralConfig,

    /// Pacer loop configuration
    pub pacer: PacerConfig,

    /// Contact lease configuration
    pub leases: LeaseConfig,

    /// Queue generation and retry defaults
    pub queue: QueueConfig,

    /// Bulk contact ingestion defaults
    pub ingest: IngestConfig,

    /// Database configuration
    pub database: DatabaseConfig,

    /// Logging configuration
    pub logging: LoggingSettings,
}

/// General dialer configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// Base URL the telephony provider posts call progress to
    pub callback_base_url: String,

    /// Caller id used when a campaign does not set its own
    pub default_caller_id: String,

    /// Capacity of the outbound event channel
    pub event_channel_capacity: usize,
}

/// Pacer loop configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PacerConfig {
    /// Interval between scheduler ticks (milliseconds)
    pub tick_interval_ms: u64,

    /// Window over which the abandon rate is measured (seconds)
    pub abandon_window_secs: u64,

    /// Outcomes needed in the window before the abandon rate is trusted
    pub abandon_min_samples: u32,

    /// Lower bound of the throttle factor applied when abandon rate is high
    pub min_throttle_factor: f64,

    /// Extra ready entries fetched per tick to absorb lease races
    pub selection_slack: u32,
}

/// Contact lease configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LeaseConfig {
    /// Lease time-to-live for a dial attempt (seconds)
    pub default_ttl_secs: u64,

    /// Reap stale dialing entries every N ticks
    pub reap_every_ticks: u32,
}

/// Queue generation defaults
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct QueueConfig {
    /// Entries generated when the caller does not specify a batch size
    pub default_batch_size: usize,

    /// Hard ceiling on a single generation batch
    pub max_batch_size: usize,

    /// Retry cool-down applied to new campaigns (seconds)
    pub default_retry_delay_secs: u64,

    /// Attempt limit applied to new campaigns
    pub default_max_attempts: u32,

    /// Regenerate the queue automatically when a running campaign drains it
    pub auto_replenish: bool,
}

/// Bulk ingestion defaults
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct IngestConfig {
    /// Attempt limit stamped on newly ingested contacts
    pub default_max_attempts: u32,

    /// Maximum rows accepted in a single upload
    pub max_rows_per_upload: usize,
}

/// Database configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    /// Database file path (":memory:" for in-memory)
    pub database_path: String,

    /// Maximum database connections
    pub max_connections: u32,

    /// Connection acquire timeout (seconds)
    pub acquire_timeout_secs: u64,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingSettings {
    /// Default filter directive when RUST_LOG is unset
    pub level: String,

    /// Emit JSON lines instead of human readable output
    pub json: bool,

    /// Include file and line information
    pub file_info: bool,

    /// Log each pacer tick span with its timings when it closes
    pub log_spans: bool,

    /// Extra filter directives, e.g. "rvoip_dialer_engine::lease=debug"
    pub directives: Vec<String>,
}

impl DialerConfig {
    /// Parse a TOML document, filling gaps with defaults, and validate it
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: DialerConfig = toml::from_str(content)?;
        config.validate().map_err(DialerError::config)?;
        Ok(config)
    }

    /// Load and validate a TOML configuration file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .map_err(|e| DialerError::config(format!("failed to read {}: {}", path.display(), e)))?;
        Self::from_toml_str(&content)
    }

    /// Validate the configuration for consistency and correctness
    pub fn validate(&self) -> std::result::Result<(), String> {
        if self.general.callback_base_url.is_empty() {
            return Err("callback_base_url cannot be empty".to_string());
        }

        if self.general.event_channel_capacity == 0 {
            return Err("event_channel_capacity must be greater than 0".to_string());
        }

        if self.pacer.tick_interval_ms == 0 {
            return Err("tick_interval_ms must be greater than 0".to_string());
        }

        if self.pacer.tick_interval_ms > 60_000 {
            return Err("tick_interval_ms cannot exceed 60000ms (1 minute)".to_string());
        }

        if !(self.pacer.min_throttle_factor > 0.0 && self.pacer.min_throttle_factor <= 1.0) {
            return Err("min_throttle_factor must be in (0, 1]".to_string());
        }

        if self.leases.default_ttl_secs == 0 {
            return Err("default_ttl_secs must be greater than 0".to_string());
        }

        if self.queue.default_batch_size == 0 || self.queue.max_batch_size == 0 {
            return Err("queue batch sizes must be greater than 0".to_string());
        }

        if self.queue.default_batch_size > self.queue.max_batch_size {
            return Err("default_batch_size cannot exceed max_batch_size".to_string());
        }

        if self.queue.default_max_attempts == 0 || self.ingest.default_max_attempts == 0 {
            return Err("max attempts must be greater than 0".to_string());
        }

        if self.database.database_path.is_empty() {
            return Err("database_path cannot be empty".to_string());
        }

        if self.logging.level.parse::<tracing::Level>().is_err() {
            return Err(format!("unknown log level: {}", self.logging.level));
        }

        if self.database.max_connections == 0 {
            return Err("max_connections must be greater than 0".to_string());
        }

        Ok(())
    }
}

impl PacerConfig {
    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms)
    }

    pub fn abandon_window(&self) -> chrono::Duration {
        chrono::Duration::seconds(self.abandon_window_secs as i64)
    }
}

impl LeaseConfig {
    pub fn default_ttl(&self) -> Duration {
        Duration::from_secs(self.default_ttl_secs)
    }
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            callback_base_url: "http://127.0.0.1:8080/dialer/outcomes".to_string(),
            default_caller_id: "+15550000000".to_string(),
            event_channel_capacity: 1024,
        }
    }
}

impl Default for PacerConfig {
    fn default() -> Self {
        Self {
            tick_interval_ms: 1000,
            abandon_window_secs: 900, // 15 minutes
            abandon_min_samples: 20,
            min_throttle_factor: 0.25,
            selection_slack: 8,
        }
    }
}

impl Default for LeaseConfig {
    fn default() -> Self {
        Self {
            default_ttl_secs: 120,
            reap_every_ticks: 10,
        }
    }
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            default_batch_size: 500,
            max_batch_size: 10_000,
            default_retry_delay_secs: 3600, // 1 hour
            default_max_attempts: 3,
            auto_replenish: true,
        }
    }
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            default_max_attempts: 3,
            max_rows_per_upload: 50_000,
        }
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            database_path: "dialer.db".to_string(),
            max_connections: 5,
            acquire_timeout_secs: 30,
        }
    }
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
            file_info: false,
            log_spans: false,
            // sqlx logs every statement at info
            directives: vec!["sqlx=warn".to_string()],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        assert!(DialerConfig::default().validate().is_ok());
    }

    #[test]
    fn test_rejects_zero_tick_interval() {
        let mut config = DialerConfig::default();
        config.pacer.tick_interval_ms = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_rejects_batch_default_above_ceiling() {
        let mut config = DialerConfig::default();
        config.queue.default_batch_size = config.queue.max_batch_size + 1;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_toml_overrides_and_validation() {
        let config = DialerConfig::from_toml_str(
            r#"
            [leases]
            default_ttl_secs = 45

            [database]
            database_path = ":memory:"
            "#,
        )
        .unwrap();
        assert_eq!(config.leases.default_ttl_secs, 45);
        assert_eq!(config.database.database_path, ":memory:");
        assert_eq!(config.pacer.abandon_min_samples, 20);

        let bad = DialerConfig::from_toml_str("[leases]\ndefault_ttl_secs = 0\n");
        assert!(matches!(bad, Err(DialerError::Config(_))));

        let malformed = DialerConfig::from_toml_str("[pacer\n");
        assert!(matches!(malformed, Err(DialerError::Config(_))));
    }
}
