//! Background task that keeps the channel open between calls.

use super::SessionInner;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// Handle on a running auto-reconnect loop.
#[derive(Debug)]
pub(crate) struct ReconnectTask {
    token: CancellationToken,
    handle: JoinHandle<()>,
}

impl ReconnectTask {
    pub(crate) fn spawn(inner: Arc<SessionInner>) -> Self {
        let token = CancellationToken::new();
        let handle = tokio::spawn(run(inner, token.clone()));
        Self { token, handle }
    }

    /// Signal the loop without waiting for it.
    pub(crate) fn cancel(&self) {
        self.token.cancel();
    }

    /// Cancel the loop and wait until it has exited. A connect attempt already
    /// running on the blocking pool is allowed to finish first.
    pub(crate) async fn shutdown(self) {
        self.token.cancel();
        if let Err(e) = self.handle.await {
            if !e.is_cancelled() {
                warn!("Auto-reconnect task ended abnormally: {}", e);
            }
        }
    }
}

async fn run(inner: Arc<SessionInner>, token: CancellationToken) {
    let channel = inner.manager.config().channel_id().to_string();
    let retry_delay = inner.manager.config().retry_delay();
    inner.manager.log().info(&format!(
        "Auto-reconnect enabled for {} (retry every {:?})",
        channel, retry_delay
    ));

    loop {
        let guard = tokio::select! {
            biased;
            () = token.cancelled() => break,
            guard = Arc::clone(&inner.state).lock_owned() => guard,
        };

        let worker = Arc::clone(&inner);
        let attempt = tokio::task::spawn_blocking(move || {
            let mut state = guard;
            if state.is_terminated() {
                return false;
            }
            if !state.is_live() {
                // Failures are logged by the manager; the loop just tries again later.
                let _ = worker.manager.connect(&mut state);
            }
            true
        })
        .await;
        match attempt {
            Ok(true) => {}
            Ok(false) => break,
            Err(e) => warn!("Reconnect attempt on {} did not complete: {}", channel, e),
        }

        tokio::select! {
            biased;
            () = token.cancelled() => break,
            () = tokio::time::sleep(retry_delay) => {}
        }
    }

    debug!("Auto-reconnect loop for {} exited", channel);
}
