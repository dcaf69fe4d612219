//! Resilient session over one exclusive serial channel.
//!
//! # Architecture
//!
//! ```text
//! write / read / send_receive ─┐
//! connect / disconnect / stop ─┼──> session lock ──> ConnectionManager ──> ChannelBinding
//! auto-reconnect loop ─────────┘        │
//!                                       └──> watch<bool> ──> subscribers
//! ```
//!
//! Every operation that touches the handle takes the same lock, runs
//! `ensure_connected` inside it, and performs its driver calls on tokio's
//! blocking pool. Failures never escape the high-level operations: they are
//! logged, counted, and reported as `false` / `None`.

mod exchange;
mod manager;
mod reconnect;
mod tracker;

pub use tracker::FailureTracker;

use crate::config::SessionConfig;
use crate::error::{SessionError, SessionResult};
use crate::port::{ChannelBinding, SerialportBinding};
use manager::{ConnectionManager, ConnectionState};
use reconnect::ReconnectTask;
use std::sync::Arc;
use tokio::sync::{watch, Mutex};
use tracing::warn;

/// State shared between the session handle and its background task.
pub(crate) struct SessionInner {
    manager: ConnectionManager,
    state: Arc<Mutex<ConnectionState>>,
    status: watch::Receiver<bool>,
}

/// A managed connection to one serial channel.
///
/// # Example
/// ```no_run
/// use serial_session::{Session, SessionConfig};
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let config = SessionConfig::builder("/dev/ttyUSB0").auto_reconnect(true).build()?;
/// let session = Session::new(config);
/// session.start().await;
///
/// if let Some(reply) = session.send_receive_text("AT\r\n").await {
///     println!("device said {reply:?}");
/// }
/// session.stop().await;
/// # Ok(())
/// # }
/// ```
pub struct Session {
    inner: Arc<SessionInner>,
    reconnect: parking_lot::Mutex<Option<ReconnectTask>>,
}

impl Session {
    /// Create a session on the host's serial driver. Nothing is opened until `start()`.
    pub fn new(config: SessionConfig) -> Self {
        Self::with_binding(config, Arc::new(SerialportBinding::new()))
    }

    /// Create a session on a custom channel binding.
    pub fn with_binding(config: SessionConfig, binding: Arc<dyn ChannelBinding>) -> Self {
        let (state, status) = ConnectionState::new(config.max_failure_count());
        Self {
            inner: Arc::new(SessionInner {
                manager: ConnectionManager::new(config, binding),
                state: Arc::new(Mutex::new(state)),
                status,
            }),
            reconnect: parking_lot::Mutex::new(None),
        }
    }

    pub fn config(&self) -> &SessionConfig {
        self.inner.manager.config()
    }

    pub fn channel_id(&self) -> &str {
        self.config().channel_id()
    }

    /// Bring the session up.
    ///
    /// With auto-reconnect this spawns the background loop and returns
    /// immediately; otherwise it makes exactly one connect attempt. Connect
    /// failures are logged and reflected in the status, never returned.
    /// A stopped session stays stopped.
    pub async fn start(&self) {
        if self.inner.state.lock().await.is_terminated() {
            self.inner.manager.log().warn(&format!(
                "Session on {} was stopped, not restarting",
                self.channel_id()
            ));
            return;
        }

        if self.config().auto_reconnect() {
            let mut slot = self.reconnect.lock();
            if slot.is_some() {
                warn!("Session on {} already started", self.channel_id());
                return;
            }
            *slot = Some(ReconnectTask::spawn(Arc::clone(&self.inner)));
            return;
        }

        match self.connect().await {
            Ok(()) | Err(SessionError::AlreadyConnected { .. }) => {}
            Err(SessionError::TaskFailed(e)) => self.log_task_failure(&e),
            // Already logged by the manager.
            Err(_) => {}
        }
    }

    /// Tear the session down: cancel the background loop, wait for it, then
    /// release the handle. Operations issued afterwards fail without touching
    /// the driver. Calling `stop()` again is a no-op.
    pub async fn stop(&self) {
        let task = self.reconnect.lock().take();
        if let Some(task) = task {
            task.shutdown().await;
        }

        let result = self
            .with_state(|manager, state| {
                manager.terminate(state);
                Ok(())
            })
            .await;
        if let Err(SessionError::TaskFailed(e)) = result {
            self.log_task_failure(&e);
        }
    }

    /// Open the channel now. Fails with `AlreadyConnected` if it is open.
    pub async fn connect(&self) -> SessionResult<()> {
        self.with_state(|manager, state| manager.connect(state)).await
    }

    /// Close the channel if open. Close failures are logged, never returned.
    pub async fn disconnect(&self) {
        let result = self
            .with_state(|manager, state| {
                manager.disconnect(state);
                Ok(())
            })
            .await;
        if let Err(SessionError::TaskFailed(e)) = result {
            self.log_task_failure(&e);
        }
    }

    /// Write raw bytes. Returns `false` if the channel could not be
    /// (re)established or the driver reported an error.
    pub async fn write(&self, data: impl AsRef<[u8]>) -> bool {
        let data = data.as_ref().to_vec();
        self.run_io(move |manager, state| manager.write_all(state, &data))
            .await
            .is_some()
    }

    /// Write UTF-8 text.
    pub async fn write_text(&self, text: &str) -> bool {
        self.write(text.as_bytes()).await
    }

    /// Read one chunk. `None` when nothing arrived or the channel failed.
    pub async fn read_bytes(&self) -> Option<Vec<u8>> {
        self.run_io(|manager, state| manager.read(state)).await
    }

    /// Read one chunk as text, replacing invalid UTF-8.
    pub async fn read_text(&self) -> Option<String> {
        self.read_bytes()
            .await
            .map(|bytes| String::from_utf8_lossy(&bytes).into_owned())
    }

    /// Latest published connection status.
    pub fn is_connected(&self) -> bool {
        *self.inner.status.borrow()
    }

    /// Observe connection status changes.
    pub fn subscribe(&self) -> watch::Receiver<bool> {
        self.inner.status.clone()
    }

    /// Consecutive failures counted since the last connect or disconnect.
    pub async fn failure_count(&self) -> u32 {
        self.inner.state.lock().await.failure_count()
    }

    /// Channels the binding can see right now. Empty if enumeration fails.
    pub async fn list_available_channels(&self) -> Vec<String> {
        let inner = Arc::clone(&self.inner);
        let listed =
            tokio::task::spawn_blocking(move || inner.manager.binding().list_channels()).await;
        match listed {
            Ok(Ok(channels)) => channels,
            Ok(Err(e)) => {
                self.inner
                    .manager
                    .log()
                    .warn(&format!("Failed to list channels: {}", e));
                Vec::new()
            }
            Err(e) => {
                self.log_task_failure(&e);
                Vec::new()
            }
        }
    }

    /// Run `f` on the blocking pool while holding the session lock.
    async fn with_state<T, F>(&self, f: F) -> SessionResult<T>
    where
        F: FnOnce(&ConnectionManager, &mut ConnectionState) -> SessionResult<T> + Send + 'static,
        T: Send + 'static,
    {
        let mut guard = Arc::clone(&self.inner.state).lock_owned().await;
        let inner = Arc::clone(&self.inner);
        tokio::task::spawn_blocking(move || f(&inner.manager, &mut guard)).await?
    }

    /// `ensure_connected` followed by `op`, counting any failure.
    async fn run_io<T, F>(&self, op: F) -> Option<T>
    where
        F: FnOnce(&ConnectionManager, &mut ConnectionState) -> SessionResult<T> + Send + 'static,
        T: Send + 'static,
    {
        let result = self
            .with_state(move |manager, state| {
                let result = manager
                    .ensure_connected(state)
                    .and_then(|()| op(manager, state));
                if let Err(e) = &result {
                    manager.record_failure(state, e);
                }
                result
            })
            .await;
        self.settle(result)
    }

    /// Collapse a result to the caller-facing `Option`. Operation errors were
    /// already logged under the lock.
    fn settle<T>(&self, result: SessionResult<T>) -> Option<T> {
        match result {
            Ok(value) => Some(value),
            Err(SessionError::TaskFailed(e)) => {
                self.log_task_failure(&e);
                None
            }
            Err(_) => None,
        }
    }

    fn log_task_failure(&self, err: &tokio::task::JoinError) {
        self.inner.manager.log().warn(&format!(
            "Channel task for {} failed: {}",
            self.channel_id(),
            err
        ));
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        if let Some(task) = self.reconnect.get_mut().take() {
            task.cancel();
        }
        // Best effort: if an operation still holds the lock, the handle is
        // released when the last reference to the state goes away.
        if let Ok(mut state) = self.inner.state.try_lock() {
            self.inner.manager.terminate(&mut state);
        }
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("channel_id", &self.channel_id())
            .field("connected", &self.is_connected())
            .field("auto_reconnect", &self.config().auto_reconnect())
            .finish()
    }
}
