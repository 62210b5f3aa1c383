//! Configuration for the poller.

use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;
use voltlink_common::config::{LoggingConfig, ZenohConfig};

use crate::alarm::AlarmThresholds;

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),
    #[error("Failed to parse config: {0}")]
    Parse(#[from] json5::Error),
    #[error("Validation error: {0}")]
    Validation(String),
}

/// Complete poller configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PollerConfig {
    /// Zenoh connection settings
    #[serde(default)]
    pub zenoh: ZenohConfig,

    /// Device connection settings
    #[serde(default)]
    pub modbus: ModbusConfig,

    /// Cadence and backoff settings
    #[serde(default)]
    pub poll: PollConfig,

    /// High-temperature alarm settings
    #[serde(default)]
    pub alarm: AlarmConfig,

    /// Key expressions to publish on
    #[serde(default)]
    pub keys: KeyConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Modbus TCP connection settings for the single polled device.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModbusConfig {
    /// Host address (IP)
    #[serde(default = "default_host")]
    pub host: String,

    /// TCP port
    #[serde(default = "default_modbus_port")]
    pub port: u16,

    /// Modbus unit/slave ID (1-247)
    #[serde(default = "default_unit_id")]
    pub unit_id: u8,

    /// Per-transaction timeout in milliseconds
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_modbus_port() -> u16 {
    5020
}

fn default_unit_id() -> u8 {
    1
}

fn default_timeout_ms() -> u64 {
    1000
}

impl Default for ModbusConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_modbus_port(),
            unit_id: default_unit_id(),
            timeout_ms: default_timeout_ms(),
        }
    }
}

impl ModbusConfig {
    pub fn socket_addr(&self) -> Result<SocketAddr, ConfigError> {
        format!("{}:{}", self.host, self.port)
            .parse()
            .map_err(|e| ConfigError::Validation(format!("Invalid modbus address: {}", e)))
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

/// Poll cadence and failure backoff.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PollConfig {
    /// Base poll period in seconds
    #[serde(default = "default_period_secs")]
    pub period_secs: u64,

    /// Backoff cap in seconds
    #[serde(default = "default_max_backoff_secs")]
    pub max_backoff_secs: u64,
}

fn default_period_secs() -> u64 {
    1
}

fn default_max_backoff_secs() -> u64 {
    30
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            period_secs: default_period_secs(),
            max_backoff_secs: default_max_backoff_secs(),
        }
    }
}

impl PollConfig {
    pub fn period(&self) -> Duration {
        Duration::from_secs(self.period_secs)
    }

    pub fn max_backoff(&self) -> Duration {
        Duration::from_secs(self.max_backoff_secs)
    }
}

/// High-temperature alarm thresholds and debounce windows.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AlarmConfig {
    /// Raise threshold in degrees Celsius
    #[serde(default = "default_temp_hi")]
    pub temp_hi: f64,

    /// Clear threshold in degrees Celsius
    #[serde(default = "default_temp_lo")]
    pub temp_lo: f64,

    /// Debounce window before raising, in seconds
    #[serde(default = "default_raise_after_secs")]
    pub raise_after_secs: u64,

    /// Debounce window before clearing, in seconds
    #[serde(default = "default_clear_after_secs")]
    pub clear_after_secs: u64,
}

fn default_temp_hi() -> f64 {
    60.0
}

fn default_temp_lo() -> f64 {
    58.0
}

fn default_raise_after_secs() -> u64 {
    5
}

fn default_clear_after_secs() -> u64 {
    3
}

impl Default for AlarmConfig {
    fn default() -> Self {
        Self {
            temp_hi: default_temp_hi(),
            temp_lo: default_temp_lo(),
            raise_after_secs: default_raise_after_secs(),
            clear_after_secs: default_clear_after_secs(),
        }
    }
}

impl AlarmConfig {
    pub fn thresholds(&self) -> AlarmThresholds {
        AlarmThresholds {
            hi: self.temp_hi,
            lo: self.temp_lo,
            raise_after: Duration::from_secs(self.raise_after_secs),
            clear_after: Duration::from_secs(self.clear_after_secs),
        }
    }
}

/// Key expressions the poller publishes on.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KeyConfig {
    #[serde(default = "default_telemetry_key")]
    pub telemetry: String,

    #[serde(default = "default_alarm_key")]
    pub alarms: String,

    #[serde(default = "default_status_key")]
    pub status: String,
}

fn default_telemetry_key() -> String {
    "voltlink/telemetry".to_string()
}

fn default_alarm_key() -> String {
    "voltlink/alarms".to_string()
}

fn default_status_key() -> String {
    "voltlink/@/status".to_string()
}

impl Default for KeyConfig {
    fn default() -> Self {
        Self {
            telemetry: default_telemetry_key(),
            alarms: default_alarm_key(),
            status: default_status_key(),
        }
    }
}

impl PollerConfig {
    /// Load configuration from a JSON5 file.
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        let config: PollerConfig = json5::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.modbus.unit_id == 0 {
            return Err(ConfigError::Validation(
                "unit_id must be 1-247".to_string(),
            ));
        }

        if self.modbus.timeout_ms == 0 {
            return Err(ConfigError::Validation(
                "timeout_ms must be positive".to_string(),
            ));
        }

        if self.poll.period_secs == 0 {
            return Err(ConfigError::Validation(
                "period_secs must be positive".to_string(),
            ));
        }

        if self.poll.max_backoff_secs == 0 {
            return Err(ConfigError::Validation(
                "max_backoff_secs must be positive".to_string(),
            ));
        }

        // The hysteresis band is meaningless unless lo < hi.
        if self.alarm.temp_lo >= self.alarm.temp_hi {
            return Err(ConfigError::Validation(format!(
                "alarm temp_lo ({}) must be below temp_hi ({})",
                self.alarm.temp_lo, self.alarm.temp_hi
            )));
        }

        Ok(())
    }
}
