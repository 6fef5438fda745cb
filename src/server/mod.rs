//! Relay server
//!
//! Accepts viewer connections, upgrades them to WebSocket and hands each one
//! to its own viewer session.

pub mod config;
pub mod handshake;
pub mod listener;

pub use config::ServerConfig;
pub use listener::RelayServer;
