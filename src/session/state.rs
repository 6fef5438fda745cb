//! Session state machine
//!
//! Tracks a viewer session from the WebSocket upgrade to the release of its
//! connection. Phases only move forward; a reconnecting viewer gets a new
//! session.

use std::fmt;
use std::sync::atomic::{AtomicU8, Ordering};

/// Unique identifier of a viewer session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SessionId(pub u64);

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Session lifecycle phase
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
#[repr(u8)]
pub enum SessionPhase {
    /// Upgrade completed, not yet registered with the hub
    Connecting = 0,
    /// Registered and receiving samples
    Active = 1,
    /// Delivery stopped, connection being released
    Closing = 2,
    /// Connection released
    Closed = 3,
}

impl SessionPhase {
    fn from_u8(value: u8) -> Self {
        match value {
            0 => SessionPhase::Connecting,
            1 => SessionPhase::Active,
            2 => SessionPhase::Closing,
            _ => SessionPhase::Closed,
        }
    }

    /// Whether the session can no longer receive samples
    pub fn is_terminal(self) -> bool {
        self >= SessionPhase::Closing
    }
}

impl fmt::Display for SessionPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SessionPhase::Connecting => "connecting",
            SessionPhase::Active => "active",
            SessionPhase::Closing => "closing",
            SessionPhase::Closed => "closed",
        };
        f.write_str(name)
    }
}

/// Lock-free phase holder shared between the hub and the delivery loop
#[derive(Debug)]
pub struct PhaseCell(AtomicU8);

impl PhaseCell {
    pub fn new() -> Self {
        Self(AtomicU8::new(SessionPhase::Connecting as u8))
    }

    pub fn get(&self) -> SessionPhase {
        SessionPhase::from_u8(self.0.load(Ordering::Acquire))
    }

    /// Connecting -> Active. Returns false from any other phase.
    pub fn activate(&self) -> bool {
        self.0
            .compare_exchange(
                SessionPhase::Connecting as u8,
                SessionPhase::Active as u8,
                Ordering::AcqRel,
                Ordering::Acquire,
            )
            .is_ok()
    }

    /// Move to Closing unless already there or past it.
    ///
    /// Returns true if this call performed the transition.
    pub fn begin_close(&self) -> bool {
        let prev = self
            .0
            .fetch_max(SessionPhase::Closing as u8, Ordering::AcqRel);
        prev < SessionPhase::Closing as u8
    }

    pub fn finish_close(&self) {
        self.0.store(SessionPhase::Closed as u8, Ordering::Release);
    }
}

impl Default for PhaseCell {
    fn default() -> Self {
        Self::new()
    }
}
