//! Broadcast hub implementation
//!
//! The registry of live viewer sessions. Broadcasting only pushes onto each
//! session's bounded queue, so the producer never waits on a viewer.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tokio::sync::RwLock;

use crate::session::{PushOutcome, SessionId, ViewerHandle};
use crate::stats::HubStats;

use super::error::HubError;
use super::sample::Sample;

/// Outcome of one `broadcast` call
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BroadcastReport {
    /// Sessions that queued the sample (possibly discarding an older one)
    pub queued: usize,
    /// Sessions whose queue overflow discarded a sample
    pub dropped: usize,
    /// Sessions removed during this call (closed or stalled)
    pub evicted: usize,
}

/// Registry of connected viewers and fan-out point for samples
///
/// Thread-safe via `RwLock`: broadcasts take the read side concurrently,
/// register/unregister take the write side briefly.
pub struct BroadcastHub {
    sessions: RwLock<HashMap<SessionId, Arc<ViewerHandle>>>,
    total_registered: AtomicU64,
    total_evicted: AtomicU64,
    samples_broadcast: AtomicU64,
    samples_dropped: AtomicU64,
}

impl BroadcastHub {
    pub fn new() -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
            total_registered: AtomicU64::new(0),
            total_evicted: AtomicU64::new(0),
            samples_broadcast: AtomicU64::new(0),
            samples_dropped: AtomicU64::new(0),
        }
    }

    /// Register an active viewer session
    ///
    /// Registering the same session twice is rejected so that it never
    /// receives a sample more than once.
    pub async fn register(&self, session: Arc<ViewerHandle>) -> Result<(), HubError> {
        let id = session.id();
        if !session.is_active() {
            return Err(HubError::NotActive(id));
        }

        let mut sessions = self.sessions.write().await;
        if sessions.contains_key(&id) {
            return Err(HubError::AlreadyRegistered(id));
        }

        tracing::info!(
            session_id = %id,
            peer = %session.peer_addr(),
            viewers = sessions.len() + 1,
            "Viewer registered"
        );
        sessions.insert(id, session);
        self.total_registered.fetch_add(1, Ordering::Relaxed);

        Ok(())
    }

    /// Remove a session; no-op if it is already gone
    ///
    /// Returns true if the session was registered.
    pub async fn unregister(&self, id: SessionId) -> bool {
        let removed = self.sessions.write().await.remove(&id);

        match removed {
            Some(session) => {
                session.close();
                tracing::info!(session_id = %id, "Viewer unregistered");
                true
            }
            None => false,
        }
    }

    /// Queue a sample for every registered viewer
    ///
    /// Never waits on a viewer and never fails: overflow is resolved by each
    /// session's drop policy, and sessions that are closed or stalled are
    /// removed before this call returns.
    pub async fn broadcast(&self, sample: Sample) -> BroadcastReport {
        let mut report = BroadcastReport::default();
        let mut evict = Vec::new();

        {
            let sessions = self.sessions.read().await;
            for (id, session) in sessions.iter() {
                match session.offer(sample.clone()) {
                    PushOutcome::Queued => report.queued += 1,
                    PushOutcome::DroppedOldest => {
                        report.queued += 1;
                        report.dropped += 1;
                    }
                    PushOutcome::DroppedNewest => report.dropped += 1,
                    PushOutcome::Stalled => {
                        report.dropped += 1;
                        evict.push(*id);
                    }
                    PushOutcome::Closed => evict.push(*id),
                }
            }
        }

        if !evict.is_empty() {
            report.evicted = self.evict(&evict).await;
        }

        self.samples_broadcast.fetch_add(1, Ordering::Relaxed);
        if report.dropped > 0 {
            self.samples_dropped
                .fetch_add(report.dropped as u64, Ordering::Relaxed);
            tracing::trace!(dropped = report.dropped, "Queue overflow during broadcast");
        }

        report
    }

    async fn evict(&self, ids: &[SessionId]) -> usize {
        let mut sessions = self.sessions.write().await;
        let mut evicted = 0;

        for id in ids {
            if let Some(session) = sessions.remove(id) {
                session.close();
                evicted += 1;
                tracing::warn!(
                    session_id = %id,
                    queue_len = session.queue().len(),
                    "Viewer evicted"
                );
            }
        }

        self.total_evicted
            .fetch_add(evicted as u64, Ordering::Relaxed);
        evicted
    }

    /// Remove and close every session
    ///
    /// Returns the number of sessions closed.
    pub async fn close_all(&self) -> usize {
        let drained: Vec<_> = self.sessions.write().await.drain().collect();

        for (_, session) in &drained {
            session.close();
        }
        if !drained.is_empty() {
            tracing::info!(viewers = drained.len(), "Closed all viewer sessions");
        }

        drained.len()
    }

    /// Number of registered sessions
    pub async fn session_count(&self) -> usize {
        self.sessions.read().await.len()
    }

    /// Whether a session is registered
    pub async fn contains(&self, id: SessionId) -> bool {
        self.sessions.read().await.contains_key(&id)
    }

    /// Snapshot of hub counters
    pub async fn stats(&self) -> HubStats {
        HubStats {
            active_sessions: self.session_count().await,
            total_sessions: self.total_registered.load(Ordering::Relaxed),
            evicted_sessions: self.total_evicted.load(Ordering::Relaxed),
            samples_broadcast: self.samples_broadcast.load(Ordering::Relaxed),
            samples_dropped: self.samples_dropped.load(Ordering::Relaxed),
        }
    }
}

impl Default for BroadcastHub {
    fn default() -> Self {
        Self::new()
    }
}
