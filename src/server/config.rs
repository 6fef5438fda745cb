//! Server configuration

use std::net::{Ipv4Addr, SocketAddr};
use std::time::Duration;

use crate::session::{DropPolicy, SessionConfig};

/// Default listening port
pub const DEFAULT_PORT: u16 = 8899;

/// Server configuration options
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Address to bind to
    pub bind_addr: SocketAddr,

    /// Only accept upgrades for this request path (None = any path)
    pub path: Option<String>,

    /// Maximum concurrent connections (0 = unlimited)
    pub max_connections: usize,

    /// WebSocket upgrade must complete within this time
    pub handshake_timeout: Duration,

    /// Enable TCP_NODELAY (disable Nagle's algorithm)
    pub tcp_nodelay: bool,

    /// Time to wait for session tasks to finish on shutdown
    pub shutdown_timeout: Duration,

    /// Settings applied to every viewer session
    pub session: SessionConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from((Ipv4Addr::LOCALHOST, DEFAULT_PORT)),
            path: None,
            max_connections: 0, // Unlimited
            handshake_timeout: Duration::from_secs(10),
            tcp_nodelay: true, // Samples are small and latency-sensitive
            shutdown_timeout: Duration::from_secs(5),
            session: SessionConfig::default(),
        }
    }
}

impl ServerConfig {
    /// Create a new config with custom bind address
    pub fn with_addr(addr: SocketAddr) -> Self {
        Self {
            bind_addr: addr,
            ..Default::default()
        }
    }

    /// Set the bind address
    pub fn bind(mut self, addr: SocketAddr) -> Self {
        self.bind_addr = addr;
        self
    }

    /// Restrict upgrades to a single request path (e.g. "/ws")
    pub fn path(mut self, path: impl Into<String>) -> Self {
        let path = path.into();
        self.path = Some(if path.starts_with('/') {
            path
        } else {
            format!("/{path}")
        });
        self
    }

    /// Set maximum connections
    pub fn max_connections(mut self, max: usize) -> Self {
        self.max_connections = max;
        self
    }

    /// Set handshake timeout
    pub fn handshake_timeout(mut self, timeout: Duration) -> Self {
        self.handshake_timeout = timeout;
        self
    }

    /// Set shutdown timeout
    pub fn shutdown_timeout(mut self, timeout: Duration) -> Self {
        self.shutdown_timeout = timeout;
        self
    }

    /// Set per-viewer queue capacity
    pub fn queue_capacity(mut self, capacity: usize) -> Self {
        self.session = self.session.queue_capacity(capacity);
        self
    }

    /// Set per-viewer overflow policy
    pub fn drop_policy(mut self, policy: DropPolicy) -> Self {
        self.session = self.session.drop_policy(policy);
        self
    }

    /// Rate-limit delivery to each viewer
    pub fn send_interval(mut self, interval: Duration) -> Self {
        self.session = self.session.send_interval(interval);
        self
    }

    /// Replace all session settings
    pub fn session(mut self, session: SessionConfig) -> Self {
        self.session = session;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = ServerConfig::default();

        assert_eq!(config.bind_addr.port(), DEFAULT_PORT);
        assert!(config.bind_addr.ip().is_loopback());
        assert!(config.path.is_none());
        assert_eq!(config.max_connections, 0);
        assert!(config.tcp_nodelay);
        assert_eq!(config.session.drop_policy, DropPolicy::DropOldest);
    }

    #[test]
    fn test_with_addr() {
        let addr: SocketAddr = "0.0.0.0:9000".parse().unwrap();
        let config = ServerConfig::with_addr(addr);

        assert_eq!(config.bind_addr, addr);
    }

    #[test]
    fn test_path_normalized() {
        assert_eq!(ServerConfig::default().path("ws").path.as_deref(), Some("/ws"));
        assert_eq!(ServerConfig::default().path("/ws").path.as_deref(), Some("/ws"));
    }

    #[test]
    fn test_builder_chaining() {
        let addr: SocketAddr = "127.0.0.1:9001".parse().unwrap();
        let config = ServerConfig::default()
            .bind(addr)
            .max_connections(50)
            .handshake_timeout(Duration::from_secs(2))
            .queue_capacity(4)
            .drop_policy(DropPolicy::DropNewest)
            .send_interval(Duration::from_millis(33));

        assert_eq!(config.bind_addr, addr);
        assert_eq!(config.max_connections, 50);
        assert_eq!(config.handshake_timeout, Duration::from_secs(2));
        assert_eq!(config.session.queue_capacity, 4);
        assert_eq!(config.session.drop_policy, DropPolicy::DropNewest);
        assert_eq!(config.session.send_interval, Some(Duration::from_millis(33)));
    }
}
