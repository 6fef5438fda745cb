//! Relay server listener
//!
//! Handles the TCP accept loop and spawns one task per connection. Each task
//! performs the WebSocket upgrade, registers the viewer with the hub and runs
//! its delivery loop.

use std::future::Future;
use std::io;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;

use crate::error::{Error, Result};
use crate::hub::BroadcastHub;
use crate::server::config::ServerConfig;
use crate::server::handshake;
use crate::session::{SessionId, ViewerHandle, ViewerSession};
use crate::source::{self, SampleSource};

/// Pause after an accept error that is not tied to a single connection
const ACCEPT_ERROR_BACKOFF: Duration = Duration::from_millis(100);

/// Telemetry relay server
pub struct RelayServer {
    config: ServerConfig,
    hub: Arc<BroadcastHub>,
    next_session_id: AtomicU64,
    connection_semaphore: Option<Arc<Semaphore>>,
    shutdown: CancellationToken,
    tasks: TaskTracker,
}

impl RelayServer {
    /// Create a new server with the given configuration
    pub fn new(config: ServerConfig) -> Self {
        Self::with_hub(config, Arc::new(BroadcastHub::new()))
    }

    /// Create a server that registers viewers with an existing hub
    pub fn with_hub(config: ServerConfig, hub: Arc<BroadcastHub>) -> Self {
        let connection_semaphore = if config.max_connections > 0 {
            Some(Arc::new(Semaphore::new(config.max_connections)))
        } else {
            None
        };

        Self {
            config,
            hub,
            next_session_id: AtomicU64::new(1),
            connection_semaphore,
            shutdown: CancellationToken::new(),
            tasks: TaskTracker::new(),
        }
    }

    /// Get a reference to the broadcast hub
    pub fn hub(&self) -> &Arc<BroadcastHub> {
        &self.hub
    }

    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    /// Get the configured bind address
    pub fn bind_addr(&self) -> SocketAddr {
        self.config.bind_addr
    }

    /// Stop accepting and close every session
    ///
    /// Any running `serve`/`run*` call returns once its teardown is done.
    pub fn shutdown(&self) {
        self.shutdown.cancel();
    }

    /// Bind the listening socket
    pub async fn listen(&self) -> Result<TcpListener> {
        let addr = self.config.bind_addr;
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|source| Error::Bind { addr, source })?;

        tracing::info!(
            addr = %listener.local_addr().unwrap_or(addr),
            path = self.config.path.as_deref().unwrap_or("*"),
            "Relay listening"
        );
        Ok(listener)
    }

    /// Run the server
    ///
    /// This method blocks until the server is shut down.
    pub async fn run(&self) -> Result<()> {
        self.run_until(std::future::pending::<()>()).await
    }

    /// Run the server with graceful shutdown
    pub async fn run_until<F>(&self, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()>,
    {
        let listener = self.listen().await?;
        self.serve(listener, shutdown).await;
        Ok(())
    }

    /// Run the server and broadcast everything `source` produces
    ///
    /// Returns when `shutdown` resolves, when the source is exhausted, or
    /// with `Error::Source` when the source fails. In every case all viewer
    /// sessions are closed first.
    pub async fn run_with_source<S, F>(&self, mut source: S, shutdown: F) -> Result<()>
    where
        S: SampleSource,
        F: Future<Output = ()>,
    {
        let listener = self.listen().await?;

        tokio::select! {
            _ = self.serve(listener, shutdown) => Ok(()),
            pumped = source::pump(&mut source, &self.hub) => {
                // The accept loop is gone with the serve future
                self.close_sessions().await;
                pumped.map(|_| ()).map_err(Error::from)
            }
        }
    }

    /// Accept viewers on `listener` until `shutdown` resolves
    pub async fn serve<F>(&self, listener: TcpListener, shutdown: F)
    where
        F: Future<Output = ()>,
    {
        tokio::select! {
            _ = shutdown => {
                tracing::info!("Shutdown signal received");
            }
            _ = self.shutdown.cancelled() => {
                tracing::info!("Shutdown requested");
            }
            _ = self.accept_loop(&listener) => {}
        }

        // Stop accepting before tearing sessions down
        drop(listener);
        self.close_sessions().await;
    }

    async fn accept_loop(&self, listener: &TcpListener) {
        loop {
            match listener.accept().await {
                Ok((socket, peer_addr)) => {
                    self.handle_connection(socket, peer_addr);
                }
                Err(e) => match accept_error_backoff(&e) {
                    Some(backoff) => {
                        tracing::error!(
                            error = %e,
                            backoff_ms = backoff.as_millis() as u64,
                            "Failed to accept connection"
                        );
                        tokio::time::sleep(backoff).await;
                    }
                    None => {
                        tracing::debug!(error = %e, "Connection dropped before accept");
                    }
                },
            }
        }
    }

    async fn close_sessions(&self) {
        self.shutdown.cancel();
        let closed = self.hub.close_all().await;

        self.tasks.close();
        if tokio::time::timeout(self.config.shutdown_timeout, self.tasks.wait())
            .await
            .is_err()
        {
            tracing::warn!(
                remaining = self.tasks.len(),
                "Shutdown timed out waiting for sessions"
            );
        }
        tracing::info!(viewers = closed, "Relay stopped");
    }

    fn handle_connection(&self, socket: TcpStream, peer_addr: SocketAddr) {
        // Check connection limit
        let permit = match self.acquire_permit() {
            Ok(permit) => permit,
            Err(()) => {
                tracing::warn!(peer = %peer_addr, "Connection rejected: limit reached");
                return;
            }
        };

        let session_id = SessionId(self.next_session_id.fetch_add(1, Ordering::Relaxed));

        tracing::debug!(
            session_id = %session_id,
            peer = %peer_addr,
            "New connection"
        );

        if self.config.tcp_nodelay {
            if let Err(e) = socket.set_nodelay(true) {
                tracing::debug!(session_id = %session_id, error = %e, "Failed to set TCP_NODELAY");
            }
        }

        let config = self.config.clone();
        let hub = Arc::clone(&self.hub);
        let cancel = self.shutdown.child_token();

        self.tasks.spawn(async move {
            let _permit = permit;
            serve_viewer(session_id, socket, peer_addr, config, hub, cancel).await;
        });
    }

    fn acquire_permit(&self) -> std::result::Result<Option<OwnedSemaphorePermit>, ()> {
        match self.connection_semaphore {
            Some(ref sem) => sem.clone().try_acquire_owned().map(Some).map_err(|_| ()),
            None => Ok(None),
        }
    }
}

/// How long to wait before accepting again after `err`
///
/// Errors about one aborted connection retry at once. Anything else (out of
/// file descriptors, out of memory) persists until resources free up.
fn accept_error_backoff(err: &io::Error) -> Option<Duration> {
    match err.kind() {
        io::ErrorKind::ConnectionAborted
        | io::ErrorKind::ConnectionReset
        | io::ErrorKind::ConnectionRefused
        | io::ErrorKind::Interrupted => None,
        _ => Some(ACCEPT_ERROR_BACKOFF),
    }
}

/// Upgrade, register and run one viewer connection
async fn serve_viewer(
    session_id: SessionId,
    socket: TcpStream,
    peer_addr: SocketAddr,
    config: ServerConfig,
    hub: Arc<BroadcastHub>,
    cancel: CancellationToken,
) {
    let upgrade = handshake::accept(socket, config.path.as_deref(), config.handshake_timeout);
    let ws = tokio::select! {
        _ = cancel.cancelled() => return,
        result = upgrade => match result {
            Ok(ws) => ws,
            Err(e) => {
                tracing::warn!(
                    session_id = %session_id,
                    peer = %peer_addr,
                    error = %e,
                    "Handshake failed"
                );
                return;
            }
        },
    };

    let handle = Arc::new(ViewerHandle::with_cancel(
        session_id,
        peer_addr,
        &config.session,
        cancel,
    ));
    handle.activate();

    if let Err(e) = hub.register(Arc::clone(&handle)).await {
        tracing::warn!(session_id = %session_id, error = %e, "Failed to register viewer");
        return;
    }

    let session = ViewerSession::new(handle, hub, config.session);
    if let Err(e) = session.run(ws).await {
        tracing::debug!(
            session_id = %session_id,
            error = %e,
            "Connection error"
        );
    }

    tracing::debug!(session_id = %session_id, "Connection closed");
}
