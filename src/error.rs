//! Error types
//!
//! Per-viewer failures (`HandshakeError`, `SessionWriteError`) stay inside the
//! task that owns the connection. Only bind failures and `SourceError` reach
//! the caller of the server run methods.

use std::net::SocketAddr;
use std::time::Duration;

use tokio_tungstenite::tungstenite;

/// Crate-wide result type
pub type Result<T> = std::result::Result<T, Error>;

/// Top-level relay error
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("failed to bind {addr}: {source}")]
    Bind {
        addr: SocketAddr,
        #[source]
        source: std::io::Error,
    },

    #[error("sample source failed: {0}")]
    Source(#[from] SourceError),
}

/// WebSocket upgrade failure for a single incoming connection
#[derive(Debug, thiserror::Error)]
pub enum HandshakeError {
    #[error("handshake not completed within {0:?}")]
    Timeout(Duration),

    #[error("upgrade rejected with HTTP {status}")]
    Rejected { status: u16 },

    #[error("protocol error: {0}")]
    Protocol(#[source] tungstenite::Error),
}

impl From<tungstenite::Error> for HandshakeError {
    fn from(err: tungstenite::Error) -> Self {
        match err {
            tungstenite::Error::Http(response) => HandshakeError::Rejected {
                status: response.status().as_u16(),
            },
            other => HandshakeError::Protocol(other),
        }
    }
}

/// Failure to deliver a sample to one viewer
#[derive(Debug, thiserror::Error)]
pub enum SessionWriteError {
    #[error("write did not complete within {0:?}")]
    Timeout(Duration),

    #[error("connection closed by peer")]
    Closed,

    #[error("protocol error: {0}")]
    Protocol(#[source] tungstenite::Error),
}

impl From<tungstenite::Error> for SessionWriteError {
    fn from(err: tungstenite::Error) -> Self {
        match err {
            tungstenite::Error::ConnectionClosed | tungstenite::Error::AlreadyClosed => {
                SessionWriteError::Closed
            }
            other => SessionWriteError::Protocol(other),
        }
    }
}

/// Failure of the sample producer
#[derive(Debug, thiserror::Error)]
pub enum SourceError {
    #[error("source read failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("source failed: {0}")]
    Failed(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_closed_errors_map_to_closed() {
        let err: SessionWriteError = tungstenite::Error::ConnectionClosed.into();
        assert!(matches!(err, SessionWriteError::Closed));

        let err: SessionWriteError = tungstenite::Error::AlreadyClosed.into();
        assert!(matches!(err, SessionWriteError::Closed));
    }

    #[test]
    fn test_source_error_wraps_into_error() {
        let err: Error = SourceError::Failed("simulation crashed".into()).into();
        assert!(matches!(err, Error::Source(_)));
        assert!(err.to_string().contains("simulation crashed"));
    }
}
