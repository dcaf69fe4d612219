//! Log sink plumbing and tracing setup.
//!
//! Session events are always emitted through `tracing`. A caller-supplied
//! [`LogSink`] additionally receives each line as plain text, which is how UIs
//! consume the session log without installing a subscriber.

use crate::config::{LogFormat, LoggingConfig};
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

/// Callback receiving one formatted log line per session event.
pub type LogSink = Arc<dyn Fn(&str) + Send + Sync>;

/// Routes session log lines to `tracing` and the optional sink.
#[derive(Clone, Default)]
pub(crate) struct SessionLogger {
    sink: Option<LogSink>,
}

impl SessionLogger {
    pub(crate) fn new(sink: Option<LogSink>) -> Self {
        Self { sink }
    }

    pub(crate) fn info(&self, message: &str) {
        tracing::info!("{}", message);
        self.forward(message);
    }

    pub(crate) fn warn(&self, message: &str) {
        tracing::warn!("{}", message);
        self.forward(message);
    }

    fn forward(&self, message: &str) {
        if let Some(sink) = &self.sink {
            sink(message);
        }
    }
}

impl std::fmt::Debug for SessionLogger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionLogger")
            .field("custom_sink", &self.sink.is_some())
            .finish()
    }
}

/// Install a global fmt subscriber. `RUST_LOG` takes precedence over the
/// configured level. Returns `false` if a subscriber was already installed.
pub fn init_tracing(config: &LoggingConfig) -> bool {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.level.as_str()));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);

    let result = match config.format {
        LogFormat::Json => builder.json().try_init(),
        LogFormat::Compact => builder.compact().try_init(),
        LogFormat::Pretty => builder.pretty().try_init(),
    };
    result.is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;

    #[test]
    fn test_sink_receives_lines() {
        let lines = Arc::new(Mutex::new(Vec::new()));
        let captured = Arc::clone(&lines);
        let sink: LogSink = Arc::new(move |line: &str| captured.lock().push(line.to_string()));

        let logger = SessionLogger::new(Some(sink));
        logger.info("connected");
        logger.warn("write failed");

        assert_eq!(*lines.lock(), vec!["connected", "write failed"]);
    }

    #[test]
    fn test_default_logger_has_no_sink() {
        let logger = SessionLogger::default();
        logger.info("goes to tracing only");
        assert!(format!("{logger:?}").contains("custom_sink: false"));
    }
}
