//! WebSocket upgrade
//!
//! ```text
//! Viewer                                   Relay
//!   |                                        |
//!   |--- GET /ws  Upgrade: websocket ------->|
//!   |                                        |  path check
//!   |<-- 101 Switching Protocols ------------|
//!   |                                        |
//!   |<========== text frames (samples) ======|
//! ```
//!
//! A failed upgrade only costs the connection it happened on.

use std::time::Duration;

use tokio::io::{AsyncRead, AsyncWrite};
use tokio_tungstenite::tungstenite::handshake::server::{ErrorResponse, Request, Response};
use tokio_tungstenite::tungstenite::http::StatusCode;
use tokio_tungstenite::WebSocketStream;

use crate::error::HandshakeError;

/// Upgrade `stream` to a WebSocket within `timeout`
///
/// When `path` is set, requests for any other path are answered with
/// 404 and rejected.
pub async fn accept<S>(
    stream: S,
    path: Option<&str>,
    timeout: Duration,
) -> Result<WebSocketStream<S>, HandshakeError>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let check_path = |request: &Request, response: Response| -> Result<Response, ErrorResponse> {
        let requested = request.uri().path();
        match path {
            Some(expected) if requested != expected => {
                tracing::debug!(requested, expected, "Rejecting upgrade for unknown path");
                let mut reject = ErrorResponse::new(Some(format!("no viewer endpoint at {requested}")));
                *reject.status_mut() = StatusCode::NOT_FOUND;
                Err(reject)
            }
            _ => Ok(response),
        }
    };

    match tokio::time::timeout(timeout, tokio_tungstenite::accept_hdr_async(stream, check_path)).await
    {
        Ok(Ok(ws)) => Ok(ws),
        Ok(Err(e)) => Err(e.into()),
        Err(_) => Err(HandshakeError::Timeout(timeout)),
    }
}

#[cfg(test)]
mod tests {
    use tokio::io::{AsyncReadExt, AsyncWriteExt};

    use super::*;

    const UPGRADE_REQUEST: &str = "GET /ws HTTP/1.1\r\n\
        Host: localhost\r\n\
        Connection: Upgrade\r\n\
        Upgrade: websocket\r\n\
        Sec-WebSocket-Version: 13\r\n\
        Sec-WebSocket-Key: dGhlIHNhbXBsZSBub25jZQ==\r\n\r\n";

    async fn respond(request: &str, path: Option<&str>) -> (Result<(), HandshakeError>, String) {
        let (server_io, mut client_io) = tokio::io::duplex(4096);

        let server = tokio::spawn({
            let path = path.map(str::to_owned);
            async move {
                accept(server_io, path.as_deref(), Duration::from_secs(1))
                    .await
                    .map(|_| ())
            }
        });

        client_io.write_all(request.as_bytes()).await.unwrap();
        let result = server.await.unwrap();

        let mut buf = vec![0u8; 1024];
        let n = client_io.read(&mut buf).await.unwrap_or(0);
        (result, String::from_utf8_lossy(&buf[..n]).into_owned())
    }

    #[tokio::test]
    async fn test_valid_upgrade() {
        let (result, response) = respond(UPGRADE_REQUEST, None).await;

        assert!(result.is_ok());
        assert!(response.starts_with("HTTP/1.1 101"));
        // RFC 6455 sample key/accept pair
        assert!(response.contains("s3pPLMBiTxaQ9kYGzzhZRbK+xOo="));
    }

    #[tokio::test]
    async fn test_path_match_accepted() {
        let (result, _) = respond(UPGRADE_REQUEST, Some("/ws")).await;
        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn test_wrong_path_rejected() {
        let (result, response) = respond(UPGRADE_REQUEST, Some("/telemetry")).await;

        assert!(matches!(result, Err(HandshakeError::Rejected { status: 404 })));
        assert!(response.starts_with("HTTP/1.1 404"));
    }

    #[tokio::test]
    async fn test_malformed_request_rejected() {
        let (result, _) = respond("GET / HTTP/1.1\r\nHost: localhost\r\n\r\n", None).await;
        assert!(result.is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn test_silent_client_times_out() {
        let (server_io, _client_io) = tokio::io::duplex(4096);

        let result = accept(server_io, None, Duration::from_secs(3)).await;
        assert!(matches!(result, Err(HandshakeError::Timeout(_))));
    }
}
