//! Per-viewer session configuration

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

/// What to do when a viewer's outbound queue is full
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DropPolicy {
    /// Discard the oldest queued sample to make room (latest value wins)
    DropOldest,
    /// Discard the incoming sample
    DropNewest,
    /// Discard the incoming sample; disconnect the viewer once its queue has
    /// been full without draining for longer than `timeout`
    DisconnectOnTimeout { timeout: Duration },
}

impl Default for DropPolicy {
    fn default() -> Self {
        DropPolicy::DropOldest
    }
}

impl fmt::Display for DropPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DropPolicy::DropOldest => f.write_str("drop-oldest"),
            DropPolicy::DropNewest => f.write_str("drop-newest"),
            DropPolicy::DisconnectOnTimeout { .. } => {
                f.write_str("block-and-disconnect-on-timeout")
            }
        }
    }
}

/// Error returned when parsing an unknown drop policy name
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown drop policy '{0}', expected drop-oldest, drop-newest or block-and-disconnect-on-timeout")]
pub struct ParseDropPolicyError(String);

impl FromStr for DropPolicy {
    type Err = ParseDropPolicyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "drop-oldest" | "oldest" => Ok(DropPolicy::DropOldest),
            "drop-newest" | "newest" => Ok(DropPolicy::DropNewest),
            "block-and-disconnect-on-timeout" | "disconnect" => {
                Ok(DropPolicy::DisconnectOnTimeout {
                    timeout: DEFAULT_STALL_TIMEOUT,
                })
            }
            _ => Err(ParseDropPolicyError(s.to_string())),
        }
    }
}

/// Stall allowance used when the disconnect policy is parsed from a name
pub const DEFAULT_STALL_TIMEOUT: Duration = Duration::from_secs(5);

/// Default outbound queue capacity per viewer
pub const DEFAULT_QUEUE_CAPACITY: usize = 32;

/// Session configuration options
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Maximum samples waiting to be written to one viewer
    pub queue_capacity: usize,

    /// Overflow behavior for a full queue
    pub drop_policy: DropPolicy,

    /// Send at most one sample per interval (None = as fast as queued)
    pub send_interval: Option<Duration>,

    /// A single write must finish within this time
    pub write_timeout: Duration,

    /// Time allowed for the close frame on teardown
    pub close_timeout: Duration,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
            drop_policy: DropPolicy::DropOldest,
            send_interval: None,
            write_timeout: Duration::from_secs(5),
            close_timeout: Duration::from_secs(1),
        }
    }
}

impl SessionConfig {
    /// Set queue capacity (at least 1)
    pub fn queue_capacity(mut self, capacity: usize) -> Self {
        self.queue_capacity = capacity.max(1);
        self
    }

    /// Set the overflow policy
    pub fn drop_policy(mut self, policy: DropPolicy) -> Self {
        self.drop_policy = policy;
        self
    }

    /// Rate-limit delivery to one sample per `interval`
    pub fn send_interval(mut self, interval: Duration) -> Self {
        self.send_interval = (!interval.is_zero()).then_some(interval);
        self
    }

    /// Set write timeout
    pub fn write_timeout(mut self, timeout: Duration) -> Self {
        self.write_timeout = timeout;
        self
    }

    /// Set close timeout
    pub fn close_timeout(mut self, timeout: Duration) -> Self {
        self.close_timeout = timeout;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = SessionConfig::default();

        assert_eq!(config.queue_capacity, DEFAULT_QUEUE_CAPACITY);
        assert_eq!(config.drop_policy, DropPolicy::DropOldest);
        assert!(config.send_interval.is_none());
    }

    #[test]
    fn test_queue_capacity_floor() {
        let config = SessionConfig::default().queue_capacity(0);
        assert_eq!(config.queue_capacity, 1);
    }

    #[test]
    fn test_zero_send_interval_disables_cadence() {
        let config = SessionConfig::default().send_interval(Duration::ZERO);
        assert!(config.send_interval.is_none());

        let config = SessionConfig::default().send_interval(Duration::from_millis(33));
        assert_eq!(config.send_interval, Some(Duration::from_millis(33)));
    }

    #[test]
    fn test_parse_drop_policy() {
        assert_eq!("drop-oldest".parse(), Ok(DropPolicy::DropOldest));
        assert_eq!("Drop-Newest".parse(), Ok(DropPolicy::DropNewest));
        assert_eq!(
            "block-and-disconnect-on-timeout".parse(),
            Ok(DropPolicy::DisconnectOnTimeout {
                timeout: DEFAULT_STALL_TIMEOUT
            })
        );
        assert!("keep-everything".parse::<DropPolicy>().is_err());
    }

    #[test]
    fn test_drop_policy_display_parses_back() {
        for policy in [DropPolicy::DropOldest, DropPolicy::DropNewest] {
            assert_eq!(policy.to_string().parse(), Ok(policy));
        }
    }
}
