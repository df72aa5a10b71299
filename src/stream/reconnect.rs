/// Reconnect schedule for the stream client
///
/// Linear backoff: attempt k (1-based) waits `k * base_delay`. After
/// `max_attempts` consecutive failures the client gives up.
use std::time::Duration;

use crate::config::StreamConfig;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReconnectPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
}

impl ReconnectPolicy {
    pub fn new(max_attempts: u32, base_delay: Duration) -> Self {
        Self {
            max_attempts,
            base_delay,
        }
    }

    pub fn from_config(config: &StreamConfig) -> Self {
        Self::new(
            config.max_reconnect_attempts,
            Duration::from_millis(config.reconnect_base_delay_ms),
        )
    }

    /// Delay before attempt `attempt` (1-based)
    pub fn delay_for(&self, attempt: u32) -> Duration {
        self.base_delay.saturating_mul(attempt)
    }

    /// Next attempt number and its delay, given how many attempts were made
    /// since the last successful connection; `None` once the ceiling is hit.
    pub fn next_attempt(&self, attempts_made: u32) -> Option<(u32, Duration)> {
        if attempts_made >= self.max_attempts {
            return None;
        }
        let attempt = attempts_made + 1;
        Some((attempt, self.delay_for(attempt)))
    }
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self::from_config(&StreamConfig::default())
    }
}
