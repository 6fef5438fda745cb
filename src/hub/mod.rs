//! Broadcast hub for live fan-out
//!
//! The hub holds every connected viewer session and pushes each sample onto
//! every session's bounded queue. It is the only structure shared between
//! the acceptor, the sample pump and the sessions.
//!
//! # Architecture
//!
//! ```text
//!                       Arc<BroadcastHub>
//!                 ┌─────────────────────────┐
//!                 │ sessions: HashMap<Id,   │
//!                 │   ViewerHandle {        │
//!                 │     queue (bounded),    │
//!                 │     phase, cancel,      │
//!                 │   }                     │
//!                 │ >                       │
//!                 └───────────┬─────────────┘
//!                             │
//!      ┌──────────────────────┼──────────────────────┐
//!      │                      │                      │
//!      ▼                      ▼                      ▼
//!  [Source pump]         [Viewer]               [Viewer]
//!  hub.broadcast()       queue.pop()            queue.pop()
//!      │                      │                      │
//!      └──► offer() ──► queue ┴──► ws.send() ──► TCP ┘
//! ```
//!
//! # Zero-Copy Design
//!
//! `Sample` payloads are reference counted, so every queue holds a handle to
//! the same allocation.

pub mod error;
pub mod sample;
pub mod store;

pub use error::HubError;
pub use sample::Sample;
pub use store::{BroadcastHub, BroadcastReport};
