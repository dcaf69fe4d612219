//! Request/response exchanges: write, settle, read.

use super::Session;
use crate::error::SessionResult;
use std::sync::Arc;

impl Session {
    /// Write `request`, wait the configured read delay, then read one reply.
    ///
    /// The lock is held from the write through the read, so no other operation
    /// can slip in between. Any failure is logged, counted once, and yields
    /// `None`; the exchange is not retried here.
    pub async fn send_receive(&self, request: impl AsRef<[u8]>) -> Option<Vec<u8>> {
        let request = request.as_ref().to_vec();
        let read_delay = self.config().read_delay();

        let guard = Arc::clone(&self.inner.state).lock_owned().await;
        let inner = Arc::clone(&self.inner);
        let sent = tokio::task::spawn_blocking(move || {
            let mut state = guard;
            let written: SessionResult<usize> = inner
                .manager
                .ensure_connected(&mut state)
                .and_then(|()| inner.manager.write_all(&mut state, &request));
            if let Err(e) = &written {
                inner.manager.record_failure(&mut state, e);
            }
            (state, written)
        })
        .await;

        let state = match sent {
            Ok((state, Ok(_))) => state,
            Ok((_, Err(_))) => return None,
            Err(e) => return self.settle(Err(e.into())),
        };

        tokio::time::sleep(read_delay).await;

        let inner = Arc::clone(&self.inner);
        let received = tokio::task::spawn_blocking(move || {
            let mut state = state;
            let reply = inner.manager.read(&mut state);
            if let Err(e) = &reply {
                inner.manager.record_failure(&mut state, e);
            }
            reply
        })
        .await;

        match received {
            Ok(reply) => self.settle(reply),
            Err(e) => self.settle(Err(e.into())),
        }
    }

    /// Text form of [`send_receive`](Self::send_receive). Invalid UTF-8 in the
    /// reply is replaced.
    pub async fn send_receive_text(&self, request: &str) -> Option<String> {
        self.send_receive(request.as_bytes())
            .await
            .map(|bytes| String::from_utf8_lossy(&bytes).into_owned())
    }
}
