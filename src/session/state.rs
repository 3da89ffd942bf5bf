//! # Session State
//!
//! Link session states, timing parameters and the activity watchdog.

use std::fmt;
use std::time::Duration;
use tokio::time::Instant;

use crate::config::Config;

/// Lifecycle state of the link session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LinkState {
    /// Link closed, waiting for an open command
    Idle,
    /// Repeatedly trying to open the link
    Opening,
    /// Link open, waiting for the first bytes
    AwaitingData,
    /// Receiving data, waiting for an RMC date/time
    AwaitingTimeSync,
    /// Decoding and resolving position fixes
    Streaming,
}

impl LinkState {
    pub fn is_open(self) -> bool {
        matches!(
            self,
            LinkState::AwaitingData | LinkState::AwaitingTimeSync | LinkState::Streaming
        )
    }
}

impl fmt::Display for LinkState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            LinkState::Idle => "idle",
            LinkState::Opening => "opening",
            LinkState::AwaitingData => "awaiting data",
            LinkState::AwaitingTimeSync => "awaiting time sync",
            LinkState::Streaming => "streaming",
        };
        f.write_str(name)
    }
}

/// Timing and retry parameters of a link session
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionTimings {
    /// Give up opening after this long
    pub open_timeout: Duration,
    /// Close if no bytes arrive after opening
    pub data_timeout: Duration,
    /// Close if no RMC date/time arrives
    pub sync_timeout: Duration,
    /// Restart if no valid fix arrives while streaming
    pub stream_timeout: Duration,
    /// Bound on a single line read
    pub read_timeout: Duration,
    /// Poll period while awaiting the first bytes
    pub poll_interval: Duration,
    /// Pause between failed open attempts
    pub open_retry_interval: Duration,
    /// Failed open attempts before giving up
    pub open_fail_budget: u32,
    /// Consecutive text-decoding errors that force a close
    pub decode_error_limit: u32,
}

impl Default for SessionTimings {
    fn default() -> Self {
        Self::from(&Config::default())
    }
}

impl From<&Config> for SessionTimings {
    fn from(config: &Config) -> Self {
        Self {
            open_timeout: Duration::from_secs(config.session.open_timeout_s),
            data_timeout: Duration::from_secs(config.session.data_timeout_s),
            sync_timeout: Duration::from_secs(config.session.sync_timeout_s),
            stream_timeout: Duration::from_secs(config.session.stream_timeout_s),
            read_timeout: Duration::from_millis(config.serial.read_timeout_ms),
            poll_interval: Duration::from_millis(config.session.poll_interval_ms),
            open_retry_interval: Duration::from_millis(config.serial.open_retry_interval_ms),
            open_fail_budget: config.serial.open_fail_budget,
            decode_error_limit: config.session.decode_error_limit,
        }
    }
}

/// Tracks time since the last sign of progress
#[derive(Debug, Clone, Copy)]
pub struct Watchdog {
    last_tick: Instant,
}

impl Watchdog {
    pub fn new() -> Self {
        Self {
            last_tick: Instant::now(),
        }
    }

    /// Record progress
    pub fn tick(&mut self) {
        self.last_tick = Instant::now();
    }

    pub fn elapsed(&self) -> Duration {
        self.last_tick.elapsed()
    }

    /// True once more than `limit` has passed since the last tick
    pub fn expired(&self, limit: Duration) -> bool {
        self.elapsed() > limit
    }
}

impl Default for Watchdog {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_state_display() {
        assert_eq!(LinkState::Idle.to_string(), "idle");
        assert_eq!(LinkState::AwaitingTimeSync.to_string(), "awaiting time sync");
    }

    #[test]
    fn test_open_states() {
        assert!(!LinkState::Idle.is_open());
        assert!(!LinkState::Opening.is_open());
        assert!(LinkState::AwaitingData.is_open());
        assert!(LinkState::Streaming.is_open());
    }

    #[test]
    fn test_default_timings() {
        let timings = SessionTimings::default();
        assert_eq!(timings.open_timeout, Duration::from_secs(60));
        assert_eq!(timings.data_timeout, Duration::from_secs(300));
        assert_eq!(timings.sync_timeout, Duration::from_secs(300));
        assert_eq!(timings.stream_timeout, Duration::from_secs(600));
        assert_eq!(timings.open_retry_interval, Duration::from_secs(2));
        assert_eq!(timings.open_fail_budget, 5);
        assert_eq!(timings.decode_error_limit, 3);
        assert!(timings.stream_timeout > timings.data_timeout);
    }

    #[tokio::test(start_paused = true)]
    async fn test_watchdog_expiry() {
        let mut watchdog = Watchdog::new();
        let limit = Duration::from_secs(10);
        assert!(!watchdog.expired(limit));

        tokio::time::advance(Duration::from_secs(11)).await;
        assert!(watchdog.expired(limit));

        watchdog.tick();
        assert!(!watchdog.expired(limit));
    }
}
