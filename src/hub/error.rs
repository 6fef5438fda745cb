//! Hub error types

use crate::session::SessionId;

/// Error type for hub registry operations
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum HubError {
    /// A session with this ID is already registered
    #[error("session already registered: {0}")]
    AlreadyRegistered(SessionId),
    /// Only sessions in the Active phase can be registered
    #[error("session not active: {0}")]
    NotActive(SessionId),
}
