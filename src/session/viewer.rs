//! Viewer session delivery loop
//!
//! Drains one viewer's queue onto its WebSocket. The loop also reads the
//! inbound half so that a viewer closing its side is noticed even when no
//! samples are flowing.

use std::sync::Arc;
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::time::{Interval, MissedTickBehavior};
use tokio_tungstenite::tungstenite::{self, Message};
use tokio_tungstenite::WebSocketStream;

use crate::error::SessionWriteError;
use crate::hub::BroadcastHub;

use super::config::SessionConfig;
use super::handle::ViewerHandle;

/// Why a delivery loop stopped
#[derive(Debug)]
enum Exit {
    Cancelled,
    PeerClosed,
    Failed(SessionWriteError),
}

/// One viewer's delivery loop
pub struct ViewerSession {
    handle: Arc<ViewerHandle>,
    hub: Arc<BroadcastHub>,
    config: SessionConfig,
}

impl ViewerSession {
    pub fn new(handle: Arc<ViewerHandle>, hub: Arc<BroadcastHub>, config: SessionConfig) -> Self {
        Self {
            handle,
            hub,
            config,
        }
    }

    /// Deliver queued samples until the viewer goes away or the session is
    /// cancelled, then unregister from the hub and release the connection.
    ///
    /// Returns an error only when a write to the viewer failed.
    pub async fn run<T>(self, ws: WebSocketStream<T>) -> Result<(), SessionWriteError>
    where
        T: AsyncRead + AsyncWrite + Unpin,
    {
        let session_id = self.handle.id();
        let (mut sink, mut inbound) = ws.split();

        let mut cadence = self.config.send_interval.map(|period| {
            let mut ticker = tokio::time::interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            ticker
        });
        let mut ready = cadence.is_none();
        let cancel = self.handle.cancel_token().clone();
        let queue = self.handle.queue();

        tracing::debug!(
            session_id = %session_id,
            peer = %self.handle.peer_addr(),
            cadence_ms = self.config.send_interval.map(|d| d.as_millis() as u64),
            "Delivery loop started"
        );

        let exit = loop {
            tokio::select! {
                biased;

                _ = cancel.cancelled() => break Exit::Cancelled,

                msg = inbound.next() => {
                    if let Some(exit) = self.on_inbound(msg) {
                        break exit;
                    }
                }

                _ = next_tick(&mut cadence), if !ready => {
                    ready = true;
                }

                sample = queue.pop(), if ready => {
                    let Some(sample) = sample else {
                        break Exit::Cancelled;
                    };

                    let size = sample.len();
                    let write = tokio::time::timeout(
                        self.config.write_timeout,
                        sink.send(sample.to_message()),
                    );

                    let result = tokio::select! {
                        biased;
                        _ = cancel.cancelled() => break Exit::Cancelled,
                        result = write => result,
                    };

                    match result {
                        Ok(Ok(())) => {
                            self.handle.record_sent(size);
                            tracing::trace!(session_id = %session_id, bytes = size, "Sample sent");
                        }
                        Ok(Err(e)) => break Exit::Failed(e.into()),
                        Err(_) => break Exit::Failed(SessionWriteError::Timeout(self.config.write_timeout)),
                    }

                    ready = cadence.is_none();
                }
            }
        };

        // Closing: stop accepting samples and leave the registry before
        // touching the connection again.
        self.handle.close();
        self.hub.unregister(session_id).await;

        if !matches!(exit, Exit::Failed(_)) {
            close_quietly(&mut sink, self.config.close_timeout).await;
        }
        drop(sink);
        drop(inbound);
        self.handle.mark_closed();

        let stats = self.handle.stats();
        match exit {
            Exit::Failed(e) => {
                tracing::debug!(
                    session_id = %session_id,
                    error = %e,
                    samples_sent = stats.samples_sent,
                    "Viewer write failed, session closed"
                );
                Err(e)
            }
            exit => {
                tracing::debug!(
                    session_id = %session_id,
                    reason = ?exit,
                    samples_sent = stats.samples_sent,
                    samples_dropped = stats.samples_dropped,
                    "Session closed"
                );
                Ok(())
            }
        }
    }

    /// Handle one inbound item; returns `Some` when the loop must stop.
    fn on_inbound(&self, msg: Option<Result<Message, tungstenite::Error>>) -> Option<Exit> {
        match msg {
            None | Some(Ok(Message::Close(_))) => Some(Exit::PeerClosed),
            Some(Ok(Message::Text(text))) => {
                tracing::trace!(
                    session_id = %self.handle.id(),
                    len = text.len(),
                    "Ignoring inbound text message"
                );
                None
            }
            Some(Ok(Message::Binary(data))) => {
                tracing::trace!(
                    session_id = %self.handle.id(),
                    len = data.len(),
                    "Ignoring inbound binary message"
                );
                None
            }
            // Pings are answered by the protocol layer
            Some(Ok(_)) => None,
            Some(Err(e)) => Some(Exit::Failed(e.into())),
        }
    }
}

async fn next_tick(cadence: &mut Option<Interval>) {
    match cadence {
        Some(ticker) => {
            ticker.tick().await;
        }
        None => std::future::pending().await,
    }
}

async fn close_quietly<S>(sink: &mut S, timeout: Duration)
where
    S: futures_util::Sink<Message> + Unpin,
{
    let _ = tokio::time::timeout(timeout, sink.close()).await;
}

#[cfg(test)]
mod tests {
    use std::net::{IpAddr, Ipv4Addr, SocketAddr};

    use tokio::io::DuplexStream;
    use tokio_tungstenite::tungstenite::protocol::Role;

    use super::*;
    use crate::hub::Sample;
    use crate::session::{DropPolicy, SessionId, SessionPhase};

    async fn ws_pair() -> (WebSocketStream<DuplexStream>, WebSocketStream<DuplexStream>) {
        let (server_io, client_io) = tokio::io::duplex(64 * 1024);
        tokio::join!(
            WebSocketStream::from_raw_socket(server_io, Role::Server, None),
            WebSocketStream::from_raw_socket(client_io, Role::Client, None),
        )
    }

    async fn active_viewer(
        hub: &Arc<BroadcastHub>,
        id: u64,
        config: &SessionConfig,
    ) -> Arc<ViewerHandle> {
        let addr = SocketAddr::new(IpAddr::V4(Ipv4Addr::LOCALHOST), 40000 + id as u16);
        let handle = Arc::new(ViewerHandle::new(SessionId(id), addr, config));
        assert!(handle.activate());
        hub.register(Arc::clone(&handle)).await.unwrap();
        handle
    }

    async fn next_text(client: &mut WebSocketStream<DuplexStream>) -> String {
        loop {
            match client.next().await {
                Some(Ok(Message::Text(text))) => return text.as_str().to_string(),
                Some(Ok(_)) => continue,
                other => panic!("expected text message, got {:?}", other),
            }
        }
    }

    #[tokio::test]
    async fn test_delivers_in_broadcast_order() {
        let hub = Arc::new(BroadcastHub::new());
        let config = SessionConfig::default();
        let handle = active_viewer(&hub, 1, &config).await;

        let (server, mut client) = ws_pair().await;
        let session = ViewerSession::new(handle, Arc::clone(&hub), config);
        let task = tokio::spawn(session.run(server));

        for i in 0..20 {
            hub.broadcast(Sample::text(i.to_string())).await;
        }
        for i in 0..20 {
            assert_eq!(next_text(&mut client).await, i.to_string());
        }

        client.close(None).await.unwrap();
        assert!(task.await.unwrap().is_ok());
    }

    #[tokio::test]
    async fn test_drop_oldest_before_first_drain() {
        let hub = Arc::new(BroadcastHub::new());
        let config = SessionConfig::default()
            .queue_capacity(4)
            .drop_policy(DropPolicy::DropOldest);
        let handle = active_viewer(&hub, 1, &config).await;

        for s in ["1", "2", "3", "4", "5"] {
            hub.broadcast(Sample::text(s)).await;
        }

        let (server, mut client) = ws_pair().await;
        let task = tokio::spawn(ViewerSession::new(handle, Arc::clone(&hub), config).run(server));

        for expected in ["2", "3", "4", "5"] {
            assert_eq!(next_text(&mut client).await, expected);
        }

        client.close(None).await.unwrap();
        task.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn test_peer_close_unregisters() {
        let hub = Arc::new(BroadcastHub::new());
        let config = SessionConfig::default();
        let handle = active_viewer(&hub, 1, &config).await;
        assert_eq!(hub.session_count().await, 1);

        let (server, mut client) = ws_pair().await;
        let task = tokio::spawn(
            ViewerSession::new(Arc::clone(&handle), Arc::clone(&hub), config).run(server),
        );

        client.close(None).await.unwrap();
        task.await.unwrap().unwrap();

        assert_eq!(hub.session_count().await, 0);
        assert_eq!(handle.phase(), SessionPhase::Closed);
    }

    #[tokio::test]
    async fn test_dropped_connection_unregisters() {
        let hub = Arc::new(BroadcastHub::new());
        let config = SessionConfig::default();
        let handle = active_viewer(&hub, 1, &config).await;

        let (server, client) = ws_pair().await;
        let task = tokio::spawn(ViewerSession::new(handle, Arc::clone(&hub), config).run(server));

        drop(client);
        let _ = task.await.unwrap();

        assert!(!hub.contains(SessionId(1)).await);
    }

    #[tokio::test]
    async fn test_cancel_sends_close_frame() {
        let hub = Arc::new(BroadcastHub::new());
        let config = SessionConfig::default();
        let handle = active_viewer(&hub, 1, &config).await;

        let (server, mut client) = ws_pair().await;
        let task = tokio::spawn(
            ViewerSession::new(Arc::clone(&handle), Arc::clone(&hub), config).run(server),
        );

        handle.close();

        let msg = client.next().await;
        assert!(matches!(msg, Some(Ok(Message::Close(_)))));
        task.await.unwrap().unwrap();
        assert_eq!(hub.session_count().await, 0);
    }

    #[tokio::test]
    async fn test_inbound_messages_ignored() {
        let hub = Arc::new(BroadcastHub::new());
        let config = SessionConfig::default();
        let handle = active_viewer(&hub, 1, &config).await;

        let (server, mut client) = ws_pair().await;
        let task = tokio::spawn(ViewerSession::new(handle, Arc::clone(&hub), config).run(server));

        client.send(Message::text("hello relay")).await.unwrap();
        hub.broadcast(Sample::text("still here")).await;

        assert_eq!(next_text(&mut client).await, "still here");
        assert_eq!(hub.session_count().await, 1);

        client.close(None).await.unwrap();
        task.await.unwrap().unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_send_interval_paces_delivery() {
        let hub = Arc::new(BroadcastHub::new());
        let config = SessionConfig::default().send_interval(Duration::from_millis(100));
        let handle = active_viewer(&hub, 1, &config).await;

        for s in ["a", "b", "c"] {
            hub.broadcast(Sample::text(s)).await;
        }

        let (server, mut client) = ws_pair().await;
        let task = tokio::spawn(ViewerSession::new(handle, Arc::clone(&hub), config).run(server));

        let start = tokio::time::Instant::now();
        for expected in ["a", "b", "c"] {
            assert_eq!(next_text(&mut client).await, expected);
        }
        assert!(start.elapsed() >= Duration::from_millis(200));

        client.close(None).await.unwrap();
        task.await.unwrap().unwrap();
    }
}
