//! Connection state and the manager that mutates it.
//!
//! Every function here is blocking and expects the caller to hold the session
//! lock, i.e. to own `&mut ConnectionState`. The session runs them on tokio's
//! blocking pool.

use super::tracker::FailureTracker;
use crate::config::SessionConfig;
use crate::error::{SessionError, SessionResult};
use crate::logging::SessionLogger;
use crate::port::{ChannelBinding, PortError, SerialPortAdapter};
use std::sync::Arc;
use tokio::sync::watch;
use tracing::debug;

/// Largest chunk returned by a single read.
const READ_BUFFER_SIZE: usize = 1024;

pub(crate) type PortAdapter = Box<dyn SerialPortAdapter>;

/// Handle, failure counter and published status, always mutated together.
pub(crate) struct ConnectionState {
    handle: Option<PortAdapter>,
    failures: FailureTracker,
    connected: watch::Sender<bool>,
    terminated: bool,
}

impl ConnectionState {
    pub(crate) fn new(max_failure_count: u32) -> (Self, watch::Receiver<bool>) {
        let (connected, status) = watch::channel(false);
        let state = Self {
            handle: None,
            failures: FailureTracker::new(max_failure_count),
            connected,
            terminated: false,
        };
        (state, status)
    }

    /// A handle is installed and the driver still reports it open.
    pub(crate) fn is_live(&self) -> bool {
        self.handle.as_ref().is_some_and(|h| h.is_open())
    }

    pub(crate) fn is_terminated(&self) -> bool {
        self.terminated
    }

    pub(crate) fn failure_count(&self) -> u32 {
        self.failures.count()
    }

    fn publish(&self, connected: bool) {
        self.connected.send_if_modified(|current| {
            let changed = *current != connected;
            *current = connected;
            changed
        });
    }
}

impl std::fmt::Debug for ConnectionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionState")
            .field("handle", &self.handle)
            .field("failures", &self.failures)
            .field("connected", &*self.connected.borrow())
            .field("terminated", &self.terminated)
            .finish()
    }
}

/// The only code allowed to open, close or reset the channel.
pub(crate) struct ConnectionManager {
    config: SessionConfig,
    binding: Arc<dyn ChannelBinding>,
    log: SessionLogger,
}

impl ConnectionManager {
    pub(crate) fn new(config: SessionConfig, binding: Arc<dyn ChannelBinding>) -> Self {
        let log = SessionLogger::new(config.log_sink().cloned());
        Self {
            config,
            binding,
            log,
        }
    }

    pub(crate) fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub(crate) fn binding(&self) -> &Arc<dyn ChannelBinding> {
        &self.binding
    }

    pub(crate) fn log(&self) -> &SessionLogger {
        &self.log
    }

    fn channel(&self) -> String {
        self.config.channel_id().to_string()
    }

    /// Open the channel and apply its parameters.
    ///
    /// On failure no handle is left installed and the published status is
    /// `false`; a handle that opened but rejected its parameters is closed first.
    pub(crate) fn connect(&self, state: &mut ConnectionState) -> SessionResult<()> {
        if state.terminated {
            return Err(SessionError::Terminated);
        }
        if state.is_live() {
            return Err(SessionError::AlreadyConnected {
                channel: self.channel(),
            });
        }
        if let Some(stale) = state.handle.take() {
            debug!("Releasing stale handle on {}", self.config.channel_id());
            self.close_handle(stale);
        }

        let mut handle = match self.binding.open(self.config.channel_id()) {
            Ok(handle) => handle,
            Err(source) => {
                state.publish(false);
                let err = SessionError::OpenFailed {
                    channel: self.channel(),
                    source,
                };
                self.log.warn(&err.to_string());
                return Err(err);
            }
        };

        if let Err(source) = handle.set_params(&self.config.framing()) {
            self.close_handle(handle);
            state.publish(false);
            let err = SessionError::ParamsRejected {
                channel: self.channel(),
                source,
            };
            self.log.warn(&err.to_string());
            return Err(err);
        }

        state.handle = Some(handle);
        state.failures.reset();
        state.publish(true);
        self.log.info(&format!(
            "Connected to {} at {} baud",
            self.config.channel_id(),
            self.config.baud_rate()
        ));
        Ok(())
    }

    /// Close the handle if any. Always ends disconnected with a zero counter.
    pub(crate) fn disconnect(&self, state: &mut ConnectionState) {
        if let Some(handle) = state.handle.take() {
            if self.close_handle(handle) {
                self.log
                    .info(&format!("Disconnected from {}", self.config.channel_id()));
            }
        }
        state.failures.reset();
        state.publish(false);
    }

    /// Reconnect if there is no handle, the driver reports it closed, or the
    /// failure threshold was reached. Always disconnects fully before reconnecting.
    pub(crate) fn ensure_connected(&self, state: &mut ConnectionState) -> SessionResult<()> {
        if state.terminated {
            return Err(SessionError::Terminated);
        }

        match &state.handle {
            None => debug!("No handle on {}, connecting", self.config.channel_id()),
            Some(handle) if !handle.is_open() => self.log.warn(&format!(
                "Channel {} reported closed, reconnecting",
                self.config.channel_id()
            )),
            Some(_) if state.failures.threshold_reached() => self.log.warn(&format!(
                "{} consecutive failures on {} (max {}), forcing reconnect",
                state.failures.count(),
                self.config.channel_id(),
                state.failures.max()
            )),
            Some(_) => return Ok(()),
        }

        self.disconnect(state);
        self.connect(state)
    }

    /// Write the whole payload in as many driver calls as it takes.
    pub(crate) fn write_all(&self, state: &mut ConnectionState, data: &[u8]) -> SessionResult<usize> {
        let write_failed = |source| SessionError::WriteFailed {
            channel: self.channel(),
            source,
        };
        let handle = state
            .handle
            .as_mut()
            .ok_or_else(|| write_failed(PortError::NotOpen))?;

        let mut written = 0;
        while written < data.len() {
            match handle.write_bytes(&data[written..]) {
                Ok(0) => {
                    return Err(write_failed(PortError::Io(std::io::Error::new(
                        std::io::ErrorKind::WriteZero,
                        format!("{} of {} bytes written", written, data.len()),
                    ))))
                }
                Ok(n) => written += n,
                Err(source) => return Err(write_failed(source)),
            }
        }

        debug!("Wrote {} bytes to {}", written, self.config.channel_id());
        Ok(written)
    }

    /// Read whatever the driver delivers in one call. No data is a failure.
    pub(crate) fn read(&self, state: &mut ConnectionState) -> SessionResult<Vec<u8>> {
        let read_failed = |source| SessionError::ReadFailed {
            channel: self.channel(),
            source,
        };
        let handle = state
            .handle
            .as_mut()
            .ok_or_else(|| read_failed(PortError::NotOpen))?;

        let mut buffer = vec![0u8; READ_BUFFER_SIZE];
        match handle.read_bytes(&mut buffer) {
            Ok(0) => Err(read_failed(PortError::NoData)),
            Ok(n) => {
                buffer.truncate(n);
                debug!("Read {} bytes from {}", n, self.config.channel_id());
                Ok(buffer)
            }
            Err(source) if source.is_no_data() => Err(read_failed(PortError::NoData)),
            Err(source) => Err(read_failed(source)),
        }
    }

    /// Count a failed operation and log it.
    pub(crate) fn record_failure(&self, state: &mut ConnectionState, err: &SessionError) {
        if matches!(err, SessionError::Terminated) {
            debug!("Rejected operation on stopped session {}", self.config.channel_id());
            return;
        }
        let count = state.failures.record();
        self.log.warn(&format!(
            "{} (failure {}/{})",
            err,
            count,
            state.failures.max()
        ));
    }

    /// Release the channel for good. Later connects fail with `Terminated`.
    pub(crate) fn terminate(&self, state: &mut ConnectionState) {
        if state.terminated {
            return;
        }
        self.disconnect(state);
        state.terminated = true;
        self.log
            .info(&format!("Session on {} stopped", self.config.channel_id()));
    }

    /// Returns `false` if the driver reported a close failure (logged, not raised).
    fn close_handle(&self, handle: PortAdapter) -> bool {
        match handle.close() {
            Ok(()) => true,
            Err(source) => {
                let err = SessionError::CloseFailed {
                    channel: self.channel(),
                    source,
                };
                self.log.warn(&err.to_string());
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::port::MockBinding;
    use pretty_assertions::assert_eq;

    fn manager(binding: &MockBinding, max_failures: u32) -> (ConnectionManager, ConnectionState) {
        let config = SessionConfig::builder("PORT-A")
            .max_failure_count(max_failures)
            .build()
            .unwrap();
        let (state, _status) = ConnectionState::new(config.max_failure_count());
        (ConnectionManager::new(config, Arc::new(binding.clone())), state)
    }

    #[test]
    fn test_connect_installs_handle_and_publishes() {
        let binding = MockBinding::new();
        let (manager, mut state) = manager(&binding, 3);
        let status = state.connected.subscribe();

        manager.connect(&mut state).unwrap();

        assert!(state.is_live());
        assert!(*status.borrow());
        assert_eq!(state.failure_count(), 0);
        assert_eq!(binding.last_params().unwrap().baud_rate, 115_200);
    }

    #[test]
    fn test_connect_twice_is_already_connected() {
        let binding = MockBinding::new();
        let (manager, mut state) = manager(&binding, 3);
        manager.connect(&mut state).unwrap();
        state.failures.record();

        let err = manager.connect(&mut state).unwrap_err();

        assert!(matches!(err, SessionError::AlreadyConnected { .. }));
        assert_eq!(state.failure_count(), 1);
        assert_eq!(binding.open_count(), 1);
        assert!(state.is_live());
    }

    #[test]
    fn test_open_failure_leaves_no_handle() {
        let binding = MockBinding::new();
        binding.fail_next_opens(1);
        let (manager, mut state) = manager(&binding, 3);

        let err = manager.connect(&mut state).unwrap_err();

        assert!(matches!(err, SessionError::OpenFailed { .. }));
        assert!(state.handle.is_none());
        assert!(!*state.connected.borrow());
    }

    #[test]
    fn test_rejected_params_close_the_handle() {
        let binding = MockBinding::new();
        binding.reject_params(true);
        let (manager, mut state) = manager(&binding, 3);

        let err = manager.connect(&mut state).unwrap_err();

        assert!(matches!(err, SessionError::ParamsRejected { .. }));
        assert!(state.handle.is_none());
        assert_eq!(binding.close_count(), 1);
        assert!(!binding.has_live_handle());
    }

    #[test]
    fn test_disconnect_is_idempotent_and_swallows_close_errors() {
        let binding = MockBinding::new();
        binding.fail_close(true);
        let (manager, mut state) = manager(&binding, 3);
        manager.connect(&mut state).unwrap();
        state.failures.record();

        manager.disconnect(&mut state);
        manager.disconnect(&mut state);

        assert!(state.handle.is_none());
        assert_eq!(state.failure_count(), 0);
        assert!(!*state.connected.borrow());
        assert_eq!(binding.close_count(), 1);
    }

    #[test]
    fn test_ensure_connected_keeps_healthy_handle() {
        let binding = MockBinding::new();
        let (manager, mut state) = manager(&binding, 3);
        manager.connect(&mut state).unwrap();
        state.failures.record();

        manager.ensure_connected(&mut state).unwrap();

        assert_eq!(binding.open_count(), 1);
        assert_eq!(state.failure_count(), 1);
    }

    #[test]
    fn test_ensure_connected_resets_at_threshold() {
        let binding = MockBinding::new();
        let (manager, mut state) = manager(&binding, 2);
        manager.connect(&mut state).unwrap();
        state.failures.record();
        state.failures.record();

        manager.ensure_connected(&mut state).unwrap();

        assert_eq!(binding.close_count(), 1);
        assert_eq!(binding.open_count(), 2);
        assert_eq!(state.failure_count(), 0);
    }

    #[test]
    fn test_ensure_connected_replaces_closed_handle() {
        let binding = MockBinding::new();
        let (manager, mut state) = manager(&binding, 3);
        manager.connect(&mut state).unwrap();
        binding.simulate_unplug();

        manager.ensure_connected(&mut state).unwrap();

        assert_eq!(binding.open_count(), 2);
        assert!(state.is_live());
    }

    #[test]
    fn test_read_without_data_names_channel() {
        let binding = MockBinding::new();
        let (manager, mut state) = manager(&binding, 3);
        manager.connect(&mut state).unwrap();

        let err = manager.read(&mut state).unwrap_err();

        match err {
            SessionError::ReadFailed { channel, source } => {
                assert_eq!(channel, "PORT-A");
                assert!(matches!(source, PortError::NoData));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_terminate_blocks_later_connects() {
        let binding = MockBinding::new();
        let (manager, mut state) = manager(&binding, 3);
        manager.connect(&mut state).unwrap();

        manager.terminate(&mut state);
        manager.terminate(&mut state);

        assert_eq!(binding.close_count(), 1);
        assert!(matches!(
            manager.ensure_connected(&mut state),
            Err(SessionError::Terminated)
        ));
        assert_eq!(binding.open_count(), 1);
    }

    #[test]
    fn test_record_failure_ignores_terminated() {
        let binding = MockBinding::new();
        let (manager, mut state) = manager(&binding, 3);

        manager.record_failure(&mut state, &SessionError::Terminated);
        assert_eq!(state.failure_count(), 0);

        manager.record_failure(
            &mut state,
            &SessionError::WriteFailed {
                channel: "PORT-A".into(),
                source: PortError::NotOpen,
            },
        );
        assert_eq!(state.failure_count(), 1);
    }
}
