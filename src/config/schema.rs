//! Configuration file schema.
//!
//! Every key has a default, so an empty file (or no file) is valid. The
//! `[session]` section maps onto [`SessionConfigBuilder`] and goes through the
//! same validation as a hand-built configuration.

use super::builder::{
    SessionConfigBuilder, DEFAULT_BAUD_RATE, DEFAULT_IO_TIMEOUT_MS, DEFAULT_MAX_FAILURE_COUNT,
    DEFAULT_READ_DELAY_MS, DEFAULT_RETRY_DELAY_MS,
};
use super::error::{ConfigError, ConfigResult};
use crate::port::{DataBits, Parity, StopBits};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Root configuration structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Session configuration
    pub session: SessionSettings,
    /// Logging configuration
    pub logging: LoggingConfig,
}

/// `[session]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionSettings {
    /// Channel identifier, e.g. `/dev/ttyUSB0` or `COM3`
    pub port: Option<String>,
    pub baud_rate: u32,
    pub data_bits: DataBits,
    pub stop_bits: StopBits,
    pub parity: Parity,
    pub retry_delay_ms: u64,
    pub read_delay_ms: u64,
    pub io_timeout_ms: u64,
    pub max_failure_count: u32,
    pub auto_reconnect: bool,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            port: None,
            baud_rate: DEFAULT_BAUD_RATE,
            data_bits: DataBits::Eight,
            stop_bits: StopBits::One,
            parity: Parity::None,
            retry_delay_ms: DEFAULT_RETRY_DELAY_MS,
            read_delay_ms: DEFAULT_READ_DELAY_MS,
            io_timeout_ms: DEFAULT_IO_TIMEOUT_MS,
            max_failure_count: DEFAULT_MAX_FAILURE_COUNT,
            auto_reconnect: false,
        }
    }
}

impl SessionSettings {
    /// Turn the file section into a builder. Fails if no port is configured.
    pub fn to_builder(&self) -> ConfigResult<SessionConfigBuilder> {
        let port = self
            .port
            .as_deref()
            .ok_or_else(|| ConfigError::MissingRequired("session.port".to_string()))?;

        Ok(SessionConfigBuilder::new(port)
            .baud_rate(self.baud_rate)
            .data_bits(self.data_bits)
            .stop_bits(self.stop_bits)
            .parity(self.parity)
            .retry_delay(Duration::from_millis(self.retry_delay_ms))
            .read_delay(Duration::from_millis(self.read_delay_ms))
            .io_timeout(Duration::from_millis(self.io_timeout_ms))
            .max_failure_count(self.max_failure_count)
            .auto_reconnect(self.auto_reconnect))
    }
}

/// `[logging]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level: "trace", "debug", "info", "warn", "error"
    pub level: String,
    /// Log format: "json", "pretty", "compact"
    pub format: LogFormat,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::Compact,
        }
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// JSON format
    Json,
    /// Pretty format with colors
    Pretty,
    /// Compact format
    #[default]
    Compact,
}
