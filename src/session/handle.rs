//! Shared view of a viewer session
//!
//! The hub holds one `ViewerHandle` per registered viewer and only ever
//! pushes onto its queue. The session's own delivery loop holds the other
//! end and owns the connection.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

use tokio_util::sync::CancellationToken;

use crate::hub::Sample;
use crate::stats::SessionStats;

use super::config::SessionConfig;
use super::queue::{OutboundQueue, PushOutcome};
use super::state::{PhaseCell, SessionId, SessionPhase};

/// Hub-side handle of a viewer session
#[derive(Debug)]
pub struct ViewerHandle {
    id: SessionId,
    peer_addr: SocketAddr,
    queue: OutboundQueue,
    phase: PhaseCell,
    cancel: CancellationToken,
    connected_at: Instant,
    samples_sent: AtomicU64,
    bytes_sent: AtomicU64,
    samples_dropped: AtomicU64,
}

impl ViewerHandle {
    /// Create a handle in the `Connecting` phase
    pub fn new(id: SessionId, peer_addr: SocketAddr, config: &SessionConfig) -> Self {
        Self::with_cancel(id, peer_addr, config, CancellationToken::new())
    }

    /// Create a handle whose cancellation follows `cancel`
    pub fn with_cancel(
        id: SessionId,
        peer_addr: SocketAddr,
        config: &SessionConfig,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            id,
            peer_addr,
            queue: OutboundQueue::new(config.queue_capacity, config.drop_policy),
            phase: PhaseCell::new(),
            cancel,
            connected_at: Instant::now(),
            samples_sent: AtomicU64::new(0),
            bytes_sent: AtomicU64::new(0),
            samples_dropped: AtomicU64::new(0),
        }
    }

    pub fn id(&self) -> SessionId {
        self.id
    }

    pub fn peer_addr(&self) -> SocketAddr {
        self.peer_addr
    }

    pub fn phase(&self) -> SessionPhase {
        self.phase.get()
    }

    pub fn is_active(&self) -> bool {
        self.phase.get() == SessionPhase::Active
    }

    pub fn queue(&self) -> &OutboundQueue {
        &self.queue
    }

    /// Token cancelled when the session must stop
    pub fn cancel_token(&self) -> &CancellationToken {
        &self.cancel
    }

    /// Mark the upgrade as complete (Connecting -> Active)
    pub fn activate(&self) -> bool {
        self.phase.activate()
    }

    /// Enqueue a sample for this viewer without waiting
    pub fn offer(&self, sample: Sample) -> PushOutcome {
        let outcome = self.queue.push(sample);
        if outcome.is_drop() {
            self.samples_dropped.fetch_add(1, Ordering::Relaxed);
        }
        outcome
    }

    /// Stop the session: Active/Connecting -> Closing, closes the queue and
    /// interrupts the delivery loop. Safe to call more than once.
    ///
    /// Returns true if this call started the close.
    pub fn close(&self) -> bool {
        let started = self.phase.begin_close();
        self.queue.close();
        self.cancel.cancel();
        started
    }

    /// Closing -> Closed, once the connection is released
    pub(crate) fn mark_closed(&self) {
        self.phase.finish_close();
    }

    pub(crate) fn record_sent(&self, bytes: usize) {
        self.samples_sent.fetch_add(1, Ordering::Relaxed);
        self.bytes_sent.fetch_add(bytes as u64, Ordering::Relaxed);
    }

    /// Snapshot of this session's counters
    pub fn stats(&self) -> SessionStats {
        SessionStats {
            session_id: self.id,
            phase: self.phase(),
            samples_sent: self.samples_sent.load(Ordering::Relaxed),
            bytes_sent: self.bytes_sent.load(Ordering::Relaxed),
            samples_dropped: self.samples_dropped.load(Ordering::Relaxed),
            queue_len: self.queue.len(),
            duration: self.connected_at.elapsed(),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::net::{IpAddr, Ipv4Addr};

    use super::*;
    use crate::session::DropPolicy;

    fn handle(capacity: usize) -> ViewerHandle {
        let addr = SocketAddr::new(IpAddr::V4(Ipv4Addr::LOCALHOST), 50000);
        let config = SessionConfig::default()
            .queue_capacity(capacity)
            .drop_policy(DropPolicy::DropNewest);
        ViewerHandle::new(SessionId(7), addr, &config)
    }

    #[test]
    fn test_new_handle_is_connecting() {
        let handle = handle(4);

        assert_eq!(handle.id(), SessionId(7));
        assert_eq!(handle.phase(), SessionPhase::Connecting);
        assert!(!handle.is_active());
        assert!(handle.activate());
        assert!(handle.is_active());
    }

    #[test]
    fn test_offer_counts_drops() {
        let handle = handle(1);
        handle.activate();

        assert_eq!(handle.offer(Sample::text("a")), PushOutcome::Queued);
        assert_eq!(handle.offer(Sample::text("b")), PushOutcome::DroppedNewest);
        assert_eq!(handle.offer(Sample::text("c")), PushOutcome::DroppedNewest);

        let stats = handle.stats();
        assert_eq!(stats.samples_dropped, 2);
        assert_eq!(stats.queue_len, 1);
    }

    #[test]
    fn test_close_cancels_and_closes_queue() {
        let handle = handle(4);
        handle.activate();
        handle.offer(Sample::text("pending"));

        assert!(handle.close());
        assert!(!handle.close());

        assert_eq!(handle.phase(), SessionPhase::Closing);
        assert!(handle.cancel_token().is_cancelled());
        assert!(handle.queue().is_closed());
        assert_eq!(handle.offer(Sample::text("late")), PushOutcome::Closed);

        handle.mark_closed();
        assert_eq!(handle.phase(), SessionPhase::Closed);
    }

    #[test]
    fn test_record_sent() {
        let handle = handle(4);
        handle.record_sent(10);
        handle.record_sent(5);

        let stats = handle.stats();
        assert_eq!(stats.samples_sent, 2);
        assert_eq!(stats.bytes_sent, 15);
    }
}
