//! Configuration loader with file resolution and environment override support.

use super::error::{ConfigError, ConfigResult};
use super::schema::Config;
use crate::port::{DataBits, Parity, StopBits};
use std::path::{Path, PathBuf};

/// Environment variable prefix for overrides
const ENV_PREFIX: &str = "SERIAL_SESSION";

/// Config file name
const CONFIG_FILE_NAME: &str = "serial-session.toml";

/// Environment variable for explicit config path
const CONFIG_PATH_ENV: &str = "SERIAL_SESSION_CONFIG";

/// Configuration loader with resolution and override logic.
#[derive(Debug, Clone)]
pub struct ConfigLoader {
    /// Resolved config file path (if any)
    pub config_path: Option<PathBuf>,
    /// The loaded configuration
    pub config: Config,
}

impl ConfigLoader {
    /// Load configuration using standard resolution order.
    ///
    /// Resolution priority (highest to lowest):
    /// 1. `SERIAL_SESSION_CONFIG` environment variable (explicit path)
    /// 2. `./serial-session.toml` (current directory)
    /// 3. `~/.config/serial-session/serial-session.toml` (XDG on Linux/macOS)
    /// 4. `%APPDATA%\serial-session\serial-session.toml` (Windows)
    /// 5. Built-in defaults (no file required)
    ///
    /// Environment variables can override any config file values.
    pub fn load() -> ConfigResult<Self> {
        let config_path = resolve_config_path();

        let mut config = if let Some(ref path) = config_path {
            load_from_file(path)?
        } else {
            Config::default()
        };

        apply_env_overrides(&mut config)?;

        Ok(Self { config_path, config })
    }

    /// Load configuration from a specific file path.
    pub fn load_from(path: impl AsRef<Path>) -> ConfigResult<Self> {
        let path = path.as_ref().to_path_buf();
        let mut config = load_from_file(&path)?;
        apply_env_overrides(&mut config)?;

        Ok(Self {
            config_path: Some(path),
            config,
        })
    }

    /// Create a loader with default configuration (no file).
    pub fn with_defaults() -> Self {
        let mut config = Config::default();
        // Still apply env overrides even with defaults
        let _ = apply_env_overrides(&mut config);

        Self {
            config_path: None,
            config,
        }
    }

    /// Get the loaded configuration.
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Consume the loader and return the configuration.
    pub fn into_config(self) -> Config {
        self.config
    }
}

/// Resolve the configuration file path using standard locations.
pub fn resolve_config_path() -> Option<PathBuf> {
    if let Ok(path) = std::env::var(CONFIG_PATH_ENV) {
        let path = PathBuf::from(path);
        if path.exists() {
            return Some(path);
        }
    }

    let cwd_config = PathBuf::from(CONFIG_FILE_NAME);
    if cwd_config.exists() {
        return Some(cwd_config);
    }

    if let Some(config_dir) = get_config_dir() {
        let app_config = config_dir.join("serial-session").join(CONFIG_FILE_NAME);
        if app_config.exists() {
            return Some(app_config);
        }
    }

    None
}

/// Get the platform-specific config directory.
fn get_config_dir() -> Option<PathBuf> {
    #[cfg(target_os = "windows")]
    {
        std::env::var("APPDATA").ok().map(PathBuf::from)
    }

    #[cfg(not(target_os = "windows"))]
    {
        std::env::var("XDG_CONFIG_HOME")
            .ok()
            .map(PathBuf::from)
            .or_else(|| {
                std::env::var("HOME")
                    .ok()
                    .map(|h| PathBuf::from(h).join(".config"))
            })
    }
}

/// Load configuration from a file.
fn load_from_file(path: &Path) -> ConfigResult<Config> {
    let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
        path: path.to_path_buf(),
        source: e,
    })?;

    toml::from_str(&content).map_err(ConfigError::ParseError)
}

fn env_var(key: &str) -> Option<(String, String)> {
    let name = format!("{}_{}", ENV_PREFIX, key);
    std::env::var(&name).ok().map(|val| (name, val))
}

fn parse_env<T: std::str::FromStr>(name: &str, val: &str, what: &str) -> ConfigResult<T> {
    val.trim()
        .parse()
        .map_err(|_| ConfigError::env_parse(name, format!("Invalid {}", what)))
}

fn parse_bool(val: &str) -> bool {
    val.eq_ignore_ascii_case("true") || val == "1"
}

/// Apply environment variable overrides to the configuration.
///
/// Environment variables follow the pattern: `SERIAL_SESSION_<SECTION>_<KEY>`
/// For example:
/// - `SERIAL_SESSION_SESSION_PORT=/dev/ttyUSB1`
/// - `SERIAL_SESSION_SESSION_BAUD_RATE=9600`
/// - `SERIAL_SESSION_LOGGING_LEVEL=debug`
fn apply_env_overrides(config: &mut Config) -> ConfigResult<()> {
    let session = &mut config.session;

    if let Some((_, val)) = env_var("SESSION_PORT") {
        session.port = Some(val);
    }
    if let Some((name, val)) = env_var("SESSION_BAUD_RATE") {
        session.baud_rate = parse_env(&name, &val, "baud rate")?;
    }
    if let Some((name, val)) = env_var("SESSION_DATA_BITS") {
        let bits: u8 = parse_env(&name, &val, "data bits")?;
        session.data_bits = DataBits::try_from(bits)
            .map_err(|b| ConfigError::env_parse(&name, format!("{} data bits not in 5..=8", b)))?;
    }
    if let Some((name, val)) = env_var("SESSION_STOP_BITS") {
        session.stop_bits = match val.trim() {
            "1" => StopBits::One,
            "1.5" => StopBits::OnePointFive,
            "2" => StopBits::Two,
            _ => return Err(ConfigError::env_parse(name, "Expected 1, 1.5 or 2")),
        };
    }
    if let Some((name, val)) = env_var("SESSION_PARITY") {
        session.parity = match val.trim().to_ascii_lowercase().as_str() {
            "none" => Parity::None,
            "even" => Parity::Even,
            "odd" => Parity::Odd,
            "mark" => Parity::Mark,
            "space" => Parity::Space,
            _ => return Err(ConfigError::env_parse(name, "Unknown parity")),
        };
    }
    if let Some((name, val)) = env_var("SESSION_RETRY_DELAY_MS") {
        session.retry_delay_ms = parse_env(&name, &val, "retry delay")?;
    }
    if let Some((name, val)) = env_var("SESSION_READ_DELAY_MS") {
        session.read_delay_ms = parse_env(&name, &val, "read delay")?;
    }
    if let Some((name, val)) = env_var("SESSION_IO_TIMEOUT_MS") {
        session.io_timeout_ms = parse_env(&name, &val, "I/O timeout")?;
    }
    if let Some((name, val)) = env_var("SESSION_MAX_FAILURE_COUNT") {
        session.max_failure_count = parse_env(&name, &val, "failure count")?;
    }
    if let Some((_, val)) = env_var("SESSION_AUTO_RECONNECT") {
        session.auto_reconnect = parse_bool(&val);
    }

    if let Some((_, val)) = env_var("LOGGING_LEVEL") {
        config.logging.level = val;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use std::env;

    #[test]
    #[serial]
    fn test_default_loader() {
        let loader = ConfigLoader::with_defaults();
        assert_eq!(loader.config().session.baud_rate, 115_200);
    }

    #[test]
    #[serial]
    fn test_env_override() {
        env::set_var("SERIAL_SESSION_SESSION_PORT", "COM9");
        env::set_var("SERIAL_SESSION_SESSION_BAUD_RATE", "57600");
        env::set_var("SERIAL_SESSION_SESSION_STOP_BITS", "1.5");
        env::set_var("SERIAL_SESSION_SESSION_AUTO_RECONNECT", "1");

        let loader = ConfigLoader::with_defaults();
        let session = &loader.config().session;
        assert_eq!(session.port.as_deref(), Some("COM9"));
        assert_eq!(session.baud_rate, 57600);
        assert_eq!(session.stop_bits, StopBits::OnePointFive);
        assert!(session.auto_reconnect);

        env::remove_var("SERIAL_SESSION_SESSION_PORT");
        env::remove_var("SERIAL_SESSION_SESSION_BAUD_RATE");
        env::remove_var("SERIAL_SESSION_SESSION_STOP_BITS");
        env::remove_var("SERIAL_SESSION_SESSION_AUTO_RECONNECT");
    }

    #[test]
    #[serial]
    fn test_invalid_env_value_is_reported() {
        env::set_var("SERIAL_SESSION_SESSION_DATA_BITS", "9");

        let mut config = Config::default();
        let err = apply_env_overrides(&mut config).unwrap_err();
        assert!(matches!(err, ConfigError::EnvParseError { .. }));

        env::remove_var("SERIAL_SESSION_SESSION_DATA_BITS");
    }

    #[test]
    #[serial]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(CONFIG_FILE_NAME);
        std::fs::write(
            &path,
            "[session]\nport = \"/dev/ttyS1\"\nmax_failure_count = 5\n",
        )
        .unwrap();

        let loader = ConfigLoader::load_from(&path).unwrap();
        assert_eq!(loader.config_path.as_deref(), Some(path.as_path()));
        assert_eq!(loader.config().session.port.as_deref(), Some("/dev/ttyS1"));
        assert_eq!(loader.config().session.max_failure_count, 5);
    }

    #[test]
    #[serial]
    fn test_missing_file_is_read_error() {
        let err = ConfigLoader::load_from("/nonexistent/serial-session.toml").unwrap_err();
        assert!(matches!(err, ConfigError::ReadError { .. }));
    }
}
