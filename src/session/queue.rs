//! Bounded outbound queue for one viewer
//!
//! Single producer (the hub) and single consumer (the session's delivery
//! loop). Pushing never waits: when the queue is full the configured
//! `DropPolicy` decides which sample is discarded.

use std::collections::VecDeque;
use std::time::Instant;

use parking_lot::Mutex;
use tokio::sync::Notify;

use crate::hub::Sample;

use super::config::DropPolicy;

/// Result of pushing a sample onto a queue
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PushOutcome {
    /// Sample queued without loss
    Queued,
    /// Sample queued, the oldest queued sample was discarded
    DroppedOldest,
    /// Queue full, the incoming sample was discarded
    DroppedNewest,
    /// Queue full and not drained within the stall timeout; the viewer
    /// should be disconnected
    Stalled,
    /// Queue closed, the session is going away
    Closed,
}

impl PushOutcome {
    /// Whether a sample was lost because of overflow
    pub fn is_drop(self) -> bool {
        matches!(
            self,
            PushOutcome::DroppedOldest | PushOutcome::DroppedNewest | PushOutcome::Stalled
        )
    }
}

#[derive(Debug)]
struct Inner {
    items: VecDeque<Sample>,
    closed: bool,
    /// When a push first found the queue full; cleared by the consumer
    full_since: Option<Instant>,
}

/// Bounded FIFO of pending samples
#[derive(Debug)]
pub struct OutboundQueue {
    inner: Mutex<Inner>,
    notify: Notify,
    capacity: usize,
    policy: DropPolicy,
}

impl OutboundQueue {
    /// Create a queue holding at most `capacity` samples (minimum 1)
    pub fn new(capacity: usize, policy: DropPolicy) -> Self {
        let capacity = capacity.max(1);
        Self {
            inner: Mutex::new(Inner {
                items: VecDeque::with_capacity(capacity),
                closed: false,
                full_since: None,
            }),
            notify: Notify::new(),
            capacity,
            policy,
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn policy(&self) -> DropPolicy {
        self.policy
    }

    pub fn len(&self) -> usize {
        self.inner.lock().items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.lock().items.is_empty()
    }

    pub fn is_closed(&self) -> bool {
        self.inner.lock().closed
    }

    /// Enqueue a sample without waiting
    pub fn push(&self, sample: Sample) -> PushOutcome {
        let outcome = {
            let mut inner = self.inner.lock();

            if inner.closed {
                return PushOutcome::Closed;
            }

            if inner.items.len() < self.capacity {
                inner.items.push_back(sample);
                PushOutcome::Queued
            } else {
                match self.policy {
                    DropPolicy::DropOldest => {
                        inner.items.pop_front();
                        inner.items.push_back(sample);
                        PushOutcome::DroppedOldest
                    }
                    DropPolicy::DropNewest => PushOutcome::DroppedNewest,
                    DropPolicy::DisconnectOnTimeout { timeout } => {
                        let full_since = *inner.full_since.get_or_insert_with(Instant::now);
                        if full_since.elapsed() >= timeout {
                            PushOutcome::Stalled
                        } else {
                            PushOutcome::DroppedNewest
                        }
                    }
                }
            }
        };

        if matches!(outcome, PushOutcome::Queued | PushOutcome::DroppedOldest) {
            self.notify.notify_one();
        }
        outcome
    }

    /// Take the next sample without waiting
    pub fn try_pop(&self) -> Option<Sample> {
        let mut inner = self.inner.lock();
        if inner.closed {
            return None;
        }
        let sample = inner.items.pop_front()?;
        inner.full_since = None;
        Some(sample)
    }

    /// Wait for the next sample
    ///
    /// Returns `None` once the queue is closed; samples still pending at
    /// that point are discarded.
    pub async fn pop(&self) -> Option<Sample> {
        loop {
            let notified = self.notify.notified();
            {
                let mut inner = self.inner.lock();
                if inner.closed {
                    return None;
                }
                if let Some(sample) = inner.items.pop_front() {
                    inner.full_since = None;
                    return Some(sample);
                }
            }
            notified.await;
        }
    }

    /// Close the queue, dropping pending samples and waking the consumer
    pub fn close(&self) {
        {
            let mut inner = self.inner.lock();
            inner.closed = true;
            inner.items.clear();
        }
        self.notify.notify_one();
    }
}
