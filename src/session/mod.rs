//! Viewer sessions
//!
//! A session is created for every upgraded WebSocket connection. It owns a
//! bounded outbound queue and runs its own delivery loop, so a slow or
//! broken viewer only ever affects itself.

pub mod config;
pub mod handle;
pub mod queue;
pub mod state;
pub mod viewer;

pub use config::{DropPolicy, ParseDropPolicyError, SessionConfig};
pub use handle::ViewerHandle;
pub use queue::{OutboundQueue, PushOutcome};
pub use state::{PhaseCell, SessionId, SessionPhase};
pub use viewer::ViewerSession;
