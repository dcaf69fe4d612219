//! Immutable session configuration and its builder.

use super::error::{ConfigError, ConfigResult};
use crate::logging::LogSink;
use crate::port::{DataBits, FramingParams, Parity, StopBits};
use std::sync::Arc;
use std::time::Duration;

pub const DEFAULT_BAUD_RATE: u32 = 115_200;
pub const DEFAULT_RETRY_DELAY_MS: u64 = 3000;
pub const DEFAULT_READ_DELAY_MS: u64 = 100;
pub const DEFAULT_IO_TIMEOUT_MS: u64 = 1000;
pub const DEFAULT_MAX_FAILURE_COUNT: u32 = 3;

/// Everything a session needs to know, fixed before the session starts.
#[derive(Clone)]
pub struct SessionConfig {
    channel_id: String,
    baud_rate: u32,
    data_bits: DataBits,
    stop_bits: StopBits,
    parity: Parity,
    retry_delay: Duration,
    read_delay: Duration,
    io_timeout: Duration,
    max_failure_count: u32,
    auto_reconnect: bool,
    log_sink: Option<LogSink>,
}

impl SessionConfig {
    /// Start a builder for the given channel identifier.
    pub fn builder(channel_id: impl Into<String>) -> SessionConfigBuilder {
        SessionConfigBuilder::new(channel_id)
    }

    pub fn channel_id(&self) -> &str {
        &self.channel_id
    }

    pub fn baud_rate(&self) -> u32 {
        self.baud_rate
    }

    pub fn data_bits(&self) -> DataBits {
        self.data_bits
    }

    pub fn stop_bits(&self) -> StopBits {
        self.stop_bits
    }

    pub fn parity(&self) -> Parity {
        self.parity
    }

    /// Wait between two checks of the auto-reconnect loop.
    pub fn retry_delay(&self) -> Duration {
        self.retry_delay
    }

    /// Grace period between the write and the read of an exchange.
    pub fn read_delay(&self) -> Duration {
        self.read_delay
    }

    pub fn io_timeout(&self) -> Duration {
        self.io_timeout
    }

    pub fn max_failure_count(&self) -> u32 {
        self.max_failure_count
    }

    pub fn auto_reconnect(&self) -> bool {
        self.auto_reconnect
    }

    /// The custom log sink, if any. `None` means lines go to `tracing` only,
    /// so they reach the console once a subscriber such as
    /// [`init_tracing`](crate::logging::init_tracing) is installed.
    pub fn log_sink(&self) -> Option<&LogSink> {
        self.log_sink.as_ref()
    }

    /// The parameters handed to the driver after a successful open.
    pub fn framing(&self) -> FramingParams {
        FramingParams {
            baud_rate: self.baud_rate,
            data_bits: self.data_bits,
            stop_bits: self.stop_bits,
            parity: self.parity,
            timeout: self.io_timeout,
        }
    }
}

impl std::fmt::Debug for SessionConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionConfig")
            .field("channel_id", &self.channel_id)
            .field("baud_rate", &self.baud_rate)
            .field("data_bits", &self.data_bits)
            .field("stop_bits", &self.stop_bits)
            .field("parity", &self.parity)
            .field("retry_delay", &self.retry_delay)
            .field("read_delay", &self.read_delay)
            .field("io_timeout", &self.io_timeout)
            .field("max_failure_count", &self.max_failure_count)
            .field("auto_reconnect", &self.auto_reconnect)
            .field("custom_log_sink", &self.log_sink.is_some())
            .finish()
    }
}

/// Fluent builder for [`SessionConfig`]. Validation happens in [`build`](Self::build).
#[derive(Clone)]
pub struct SessionConfigBuilder {
    channel_id: String,
    baud_rate: u32,
    data_bits: DataBits,
    stop_bits: StopBits,
    parity: Parity,
    retry_delay: Duration,
    read_delay: Duration,
    io_timeout: Duration,
    max_failure_count: u32,
    auto_reconnect: bool,
    log_sink: Option<LogSink>,
}

impl SessionConfigBuilder {
    pub fn new(channel_id: impl Into<String>) -> Self {
        Self {
            channel_id: channel_id.into(),
            baud_rate: DEFAULT_BAUD_RATE,
            data_bits: DataBits::Eight,
            stop_bits: StopBits::One,
            parity: Parity::None,
            retry_delay: Duration::from_millis(DEFAULT_RETRY_DELAY_MS),
            read_delay: Duration::from_millis(DEFAULT_READ_DELAY_MS),
            io_timeout: Duration::from_millis(DEFAULT_IO_TIMEOUT_MS),
            max_failure_count: DEFAULT_MAX_FAILURE_COUNT,
            auto_reconnect: false,
            log_sink: None,
        }
    }

    pub fn channel_id(mut self, channel_id: impl Into<String>) -> Self {
        self.channel_id = channel_id.into();
        self
    }

    pub fn baud_rate(mut self, baud_rate: u32) -> Self {
        self.baud_rate = baud_rate;
        self
    }

    pub fn data_bits(mut self, data_bits: DataBits) -> Self {
        self.data_bits = data_bits;
        self
    }

    pub fn stop_bits(mut self, stop_bits: StopBits) -> Self {
        self.stop_bits = stop_bits;
        self
    }

    pub fn parity(mut self, parity: Parity) -> Self {
        self.parity = parity;
        self
    }

    pub fn retry_delay(mut self, delay: Duration) -> Self {
        self.retry_delay = delay;
        self
    }

    pub fn read_delay(mut self, delay: Duration) -> Self {
        self.read_delay = delay;
        self
    }

    pub fn io_timeout(mut self, timeout: Duration) -> Self {
        self.io_timeout = timeout;
        self
    }

    pub fn max_failure_count(mut self, count: u32) -> Self {
        self.max_failure_count = count;
        self
    }

    pub fn auto_reconnect(mut self, enabled: bool) -> Self {
        self.auto_reconnect = enabled;
        self
    }

    /// Receive every session log line. Without a sink, lines only go to
    /// `tracing` and print to the console once the caller installs a
    /// subscriber, e.g. with [`init_tracing`](crate::logging::init_tracing).
    pub fn log_sink<F>(mut self, sink: F) -> Self
    where
        F: Fn(&str) + Send + Sync + 'static,
    {
        self.log_sink = Some(Arc::new(sink));
        self
    }

    pub fn build(self) -> ConfigResult<SessionConfig> {
        if self.channel_id.trim().is_empty() {
            return Err(ConfigError::MissingRequired("channel id".to_string()));
        }
        if self.baud_rate == 0 {
            return Err(ConfigError::validation(
                "baud_rate",
                "must be greater than zero",
            ));
        }
        if self.io_timeout.is_zero() {
            return Err(ConfigError::validation(
                "io_timeout",
                "must be greater than zero",
            ));
        }

        Ok(SessionConfig {
            channel_id: self.channel_id,
            baud_rate: self.baud_rate,
            data_bits: self.data_bits,
            stop_bits: self.stop_bits,
            parity: self.parity,
            retry_delay: self.retry_delay,
            read_delay: self.read_delay,
            io_timeout: self.io_timeout,
            max_failure_count: self.max_failure_count,
            auto_reconnect: self.auto_reconnect,
            log_sink: self.log_sink,
        })
    }
}
