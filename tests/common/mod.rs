//! Shared test utilities for session tests.
//!
//! - Session builders wired to a `MockBinding`
//! - Log capture through the configurable sink
//! - Waiting helpers for status and driver counters

#![allow(dead_code)]

use parking_lot::Mutex;
use serial_session::{MockBinding, Session, SessionConfig, SessionConfigBuilder};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::watch;

pub const CHANNEL: &str = "PORT-A";

/// Builder with short delays so tests finish quickly.
pub fn fast_config() -> SessionConfigBuilder {
    SessionConfig::builder(CHANNEL)
        .retry_delay(Duration::from_millis(20))
        .read_delay(Duration::from_millis(10))
        .io_timeout(Duration::from_millis(50))
}

/// Build a session on a fresh mock binding.
pub fn mock_session(builder: SessionConfigBuilder) -> (Session, MockBinding) {
    let binding = MockBinding::new();
    let session = session_on(builder, &binding);
    (session, binding)
}

/// Build a session on an existing mock binding.
pub fn session_on(builder: SessionConfigBuilder, binding: &MockBinding) -> Session {
    let config = builder.build().expect("valid test configuration");
    Session::with_binding(config, Arc::new(binding.clone()))
}

/// Collects every line handed to the log sink.
#[derive(Clone, Default)]
pub struct LogCapture {
    lines: Arc<Mutex<Vec<String>>>,
}

impl LogCapture {
    pub fn new() -> Self {
        Self::default()
    }

    /// Attach this capture as the builder's log sink.
    pub fn attach(&self, builder: SessionConfigBuilder) -> SessionConfigBuilder {
        let lines = Arc::clone(&self.lines);
        builder.log_sink(move |line| lines.lock().push(line.to_string()))
    }

    pub fn lines(&self) -> Vec<String> {
        self.lines.lock().clone()
    }

    pub fn contains(&self, needle: &str) -> bool {
        self.lines.lock().iter().any(|line| line.contains(needle))
    }
}

/// Wait until the status receiver reports `expected`.
pub async fn wait_for_status(
    status: &mut watch::Receiver<bool>,
    expected: bool,
    limit: Duration,
) -> bool {
    matches!(
        tokio::time::timeout(limit, status.wait_for(|v| *v == expected)).await,
        Ok(Ok(_))
    )
}

/// Poll `condition` until it holds or `limit` elapses.
pub async fn eventually<F>(limit: Duration, mut condition: F) -> bool
where
    F: FnMut() -> bool,
{
    let deadline = Instant::now() + limit;
    loop {
        if condition() {
            return true;
        }
        if Instant::now() >= deadline {
            return false;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
}
