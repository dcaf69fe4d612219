use crate::port::PortError;
use thiserror::Error;

/// Errors raised inside a session.
///
/// Only `connect()` and configuration building hand these to callers. The
/// high-level I/O operations log them and return `false` / `None` instead.
#[derive(Debug, Error)]
pub enum SessionError {
    #[error("Channel {channel} is already connected")]
    AlreadyConnected { channel: String },

    #[error("Failed to open channel {channel}: {source}")]
    OpenFailed {
        channel: String,
        #[source]
        source: PortError,
    },

    #[error("Channel {channel} rejected its parameters: {source}")]
    ParamsRejected {
        channel: String,
        #[source]
        source: PortError,
    },

    #[error("Write to channel {channel} failed: {source}")]
    WriteFailed {
        channel: String,
        #[source]
        source: PortError,
    },

    #[error("Read from channel {channel} failed: {source}")]
    ReadFailed {
        channel: String,
        #[source]
        source: PortError,
    },

    #[error("Closing channel {channel} failed: {source}")]
    CloseFailed {
        channel: String,
        #[source]
        source: PortError,
    },

    #[error("Session has been stopped")]
    Terminated,

    #[error("Blocking channel task failed: {0}")]
    TaskFailed(#[from] tokio::task::JoinError),
}

/// Convenient Result type for session operations.
pub type SessionResult<T> = Result<T, SessionError>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error as _;

    #[test]
    fn test_display_names_channel() {
        let err = SessionError::AlreadyConnected {
            channel: "PORT-A".into(),
        };
        assert_eq!(err.to_string(), "Channel PORT-A is already connected");

        let err = SessionError::ReadFailed {
            channel: "PORT-A".into(),
            source: PortError::NoData,
        };
        assert_eq!(
            err.to_string(),
            "Read from channel PORT-A failed: No data available"
        );
    }

    #[test]
    fn test_source_is_preserved() {
        let err = SessionError::OpenFailed {
            channel: "COM7".into(),
            source: PortError::not_found("COM7"),
        };
        let source = err.source().expect("source");
        assert_eq!(source.to_string(), "Serial port not found: COM7");
    }
}
