//! Live telemetry relay
//!
//! Fans out a continuous stream of samples from a single producer to any
//! number of WebSocket viewers. Each viewer gets its own bounded queue and
//! delivery task, so a slow or broken viewer never stalls the producer or
//! the other viewers.
//!
//! # Architecture
//!
//! ```text
//!   [SampleSource] ──pump──► BroadcastHub::broadcast()
//!                                   │
//!               ┌───────────────────┼───────────────────┐
//!               ▼                   ▼                   ▼
//!        OutboundQueue        OutboundQueue        OutboundQueue
//!               │                   │                   │
//!        ViewerSession        ViewerSession        ViewerSession
//!        delivery loop        delivery loop        delivery loop
//!               │                   │                   │
//!               └──────► WebSocket ◄┴──── RelayServer accept loop
//! ```
//!
//! # Example
//!
//! ```no_run
//! use telemetry_relay::source::Oscillator;
//! use telemetry_relay::{RelayServer, ServerConfig};
//!
//! # async fn example() -> telemetry_relay::error::Result<()> {
//! let server = RelayServer::new(ServerConfig::default());
//! server
//!     .run_with_source(Oscillator::new(), async {
//!         let _ = tokio::signal::ctrl_c().await;
//!     })
//!     .await
//! # }
//! ```

pub mod error;
pub mod hub;
pub mod server;
pub mod session;
pub mod source;
pub mod stats;

pub use error::{Error, Result};
pub use hub::{BroadcastHub, BroadcastReport, HubError, Sample};
pub use server::{RelayServer, ServerConfig};
pub use session::{DropPolicy, SessionConfig, SessionId, SessionPhase, ViewerHandle};
pub use source::SampleSource;
