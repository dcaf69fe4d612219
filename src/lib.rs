//! Serial Session Library
//!
//! Keeps a single exclusive serial channel usable for long-running programs:
//! it opens the port with fixed framing, serializes every read and write,
//! counts I/O failures, and resets or re-establishes the connection on its own.
//!
//! # Modules
//!
//! - `config`: Session configuration builder and TOML file loading
//! - `error`: Session error taxonomy
//! - `logging`: Log sink type and tracing setup
//! - `port`: Channel binding traits, the `serialport` backend and a mock
//! - `session`: Connection management, auto-reconnect and exchanges

pub mod config;
pub mod error;
pub mod logging;
pub mod port;
pub mod session;

// Re-export commonly used types for convenience
pub use config::{ConfigError, ConfigLoader, ConfigResult, SessionConfig, SessionConfigBuilder};
pub use error::{SessionError, SessionResult};
pub use logging::{init_tracing, LogSink};
pub use port::{
    ChannelBinding, DataBits, FramingParams, MockBinding, Parity, PortError, SerialPortAdapter,
    SerialportBinding, StopBits,
};
pub use session::{FailureTracker, Session};

/// List the serial channels the host driver reports. Empty if enumeration fails.
pub fn list_available_channels() -> Vec<String> {
    match SerialportBinding::new().list_channels() {
        Ok(channels) => channels,
        Err(e) => {
            tracing::warn!("Failed to list channels: {}", e);
            Vec::new()
        }
    }
}
