//! Statistics for viewer sessions and the broadcast hub

use std::time::Duration;

use crate::session::{SessionId, SessionPhase};

/// Session-level statistics
#[derive(Debug, Clone)]
pub struct SessionStats {
    /// Session the counters belong to
    pub session_id: SessionId,
    /// Phase at the time of the snapshot
    pub phase: SessionPhase,
    /// Samples written to the viewer
    pub samples_sent: u64,
    /// Payload bytes written to the viewer
    pub bytes_sent: u64,
    /// Samples lost to queue overflow
    pub samples_dropped: u64,
    /// Samples waiting in the outbound queue
    pub queue_len: usize,
    /// Connection duration
    pub duration: Duration,
}

impl SessionStats {
    /// Fraction of offered samples lost to overflow (0.0 - 1.0)
    pub fn drop_ratio(&self) -> f64 {
        let offered = self.samples_sent + self.samples_dropped + self.queue_len as u64;
        if offered > 0 {
            self.samples_dropped as f64 / offered as f64
        } else {
            0.0
        }
    }

    /// Average samples per second delivered to this viewer
    pub fn send_rate(&self) -> f64 {
        let secs = self.duration.as_secs_f64();
        if secs > 0.0 {
            self.samples_sent as f64 / secs
        } else {
            0.0
        }
    }
}

/// Hub-wide statistics
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HubStats {
    /// Currently registered sessions
    pub active_sessions: usize,
    /// Sessions ever registered
    pub total_sessions: u64,
    /// Sessions removed by the hub because they were closed or stalled
    pub evicted_sessions: u64,
    /// `broadcast` calls
    pub samples_broadcast: u64,
    /// Per-session overflow drops, summed over all sessions
    pub samples_dropped: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stats(sent: u64, dropped: u64, queued: usize, secs: u64) -> SessionStats {
        SessionStats {
            session_id: SessionId(1),
            phase: SessionPhase::Active,
            samples_sent: sent,
            bytes_sent: sent * 10,
            samples_dropped: dropped,
            queue_len: queued,
            duration: Duration::from_secs(secs),
        }
    }

    #[test]
    fn test_drop_ratio() {
        assert_eq!(stats(0, 0, 0, 1).drop_ratio(), 0.0);
        assert_eq!(stats(6, 2, 0, 1).drop_ratio(), 0.25);
        assert_eq!(stats(2, 1, 1, 1).drop_ratio(), 0.25);
    }

    #[test]
    fn test_send_rate() {
        assert_eq!(stats(300, 0, 0, 10).send_rate(), 30.0);
        assert_eq!(stats(300, 0, 0, 0).send_rate(), 0.0);
    }

    #[test]
    fn test_hub_stats_default() {
        let stats = HubStats::default();
        assert_eq!(stats.active_sessions, 0);
        assert_eq!(stats.total_sessions, 0);
        assert_eq!(stats.samples_broadcast, 0);
    }
}
