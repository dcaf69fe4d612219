//! Configuration for serial sessions.
//!
//! Sessions are configured through [`SessionConfigBuilder`], validated once at
//! `build()`, and never mutated afterwards. The binary additionally reads a
//! TOML file whose `[session]` section feeds the same builder.
//!
//! # Configuration Resolution
//!
//! The file is looked up in the following locations (in order of priority):
//!
//! 1. `SERIAL_SESSION_CONFIG` environment variable (explicit path)
//! 2. `./serial-session.toml` (current directory)
//! 3. `~/.config/serial-session/serial-session.toml` (XDG on Linux/macOS)
//! 4. `%APPDATA%\serial-session\serial-session.toml` (Windows)
//! 5. Built-in defaults (no file required)
//!
//! Any value can then be overridden with `SERIAL_SESSION_<SECTION>_<KEY>`.
//!
//! # Example
//!
//! ```rust
//! use serial_session::config::SessionConfig;
//! use std::time::Duration;
//!
//! let config = SessionConfig::builder("/dev/ttyUSB0")
//!     .baud_rate(9600)
//!     .auto_reconnect(true)
//!     .retry_delay(Duration::from_millis(500))
//!     .build()?;
//! assert_eq!(config.max_failure_count(), 3);
//! # Ok::<(), serial_session::config::ConfigError>(())
//! ```

mod builder;
mod error;
mod loader;
mod schema;

pub use builder::{
    SessionConfig, SessionConfigBuilder, DEFAULT_BAUD_RATE, DEFAULT_IO_TIMEOUT_MS,
    DEFAULT_MAX_FAILURE_COUNT, DEFAULT_READ_DELAY_MS, DEFAULT_RETRY_DELAY_MS,
};
pub use error::{ConfigError, ConfigResult};
pub use loader::{resolve_config_path, ConfigLoader};
pub use schema::{Config, LogFormat, LoggingConfig, SessionSettings};
