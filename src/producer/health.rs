/// Per-connection liveness
///
/// After `heartbeat_interval` of client silence the server pings; a
/// connection is dropped when that ping goes unanswered for `pong_timeout`
/// or when the client stays silent for `idle_timeout` altogether.
use std::time::{Duration, Instant};

use crate::config::ProducerConfig;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HealthConfig {
    pub heartbeat_interval: Duration,
    pub idle_timeout: Duration,
    pub pong_timeout: Duration,
}

impl HealthConfig {
    pub fn from_config(config: &ProducerConfig) -> Self {
        Self {
            heartbeat_interval: Duration::from_secs(config.heartbeat_secs),
            idle_timeout: Duration::from_secs(config.client_idle_timeout_secs),
            pong_timeout: Duration::from_secs(config.pong_timeout_secs),
        }
    }

    /// Cadence of `evaluate` calls in the connection loop (10 ms ..= 1 s)
    pub fn check_interval(&self) -> Duration {
        (self.pong_timeout / 2).clamp(Duration::from_millis(10), Duration::from_secs(1))
    }
}

impl Default for HealthConfig {
    fn default() -> Self {
        Self::from_config(&ProducerConfig::default())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HealthVerdict {
    Healthy,
    SendPing,
    /// Silent past the idle timeout
    Idle(Duration),
    PongMissed,
}

#[derive(Debug)]
pub struct ConnectionHealth {
    last_seen: Instant,
    ping_sent_at: Option<Instant>,
    config: HealthConfig,
}

impl ConnectionHealth {
    pub fn new(config: HealthConfig) -> Self {
        Self::starting_at(config, Instant::now())
    }

    fn starting_at(config: HealthConfig, now: Instant) -> Self {
        Self {
            last_seen: now,
            ping_sent_at: None,
            config,
        }
    }

    /// Inbound traffic of any kind; answers an outstanding ping as well
    pub fn touch(&mut self, now: Instant) {
        self.last_seen = now;
        self.ping_sent_at = None;
    }

    pub fn ping_sent(&mut self, now: Instant) {
        self.ping_sent_at = Some(now);
    }

    pub fn evaluate(&self, now: Instant) -> HealthVerdict {
        let silent = now.saturating_duration_since(self.last_seen);
        if silent > self.config.idle_timeout {
            return HealthVerdict::Idle(silent);
        }

        match self.ping_sent_at {
            Some(sent) if now.saturating_duration_since(sent) > self.config.pong_timeout => {
                HealthVerdict::PongMissed
            }
            Some(_) => HealthVerdict::Healthy,
            None if silent > self.config.heartbeat_interval => HealthVerdict::SendPing,
            None => HealthVerdict::Healthy,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> HealthConfig {
        HealthConfig {
            heartbeat_interval: Duration::from_secs(30),
            idle_timeout: Duration::from_secs(90),
            pong_timeout: Duration::from_secs(10),
        }
    }

    #[test]
    fn test_ping_then_pong() {
        let start = Instant::now();
        let mut health = ConnectionHealth::starting_at(config(), start);

        assert_eq!(health.evaluate(start + Duration::from_secs(29)), HealthVerdict::Healthy);
        assert_eq!(health.evaluate(start + Duration::from_secs(31)), HealthVerdict::SendPing);

        health.ping_sent(start + Duration::from_secs(31));
        assert_eq!(health.evaluate(start + Duration::from_secs(35)), HealthVerdict::Healthy);

        health.touch(start + Duration::from_secs(36));
        assert_eq!(health.evaluate(start + Duration::from_secs(50)), HealthVerdict::Healthy);
    }

    #[test]
    fn test_missed_pong_and_idle() {
        let start = Instant::now();
        let mut health = ConnectionHealth::starting_at(config(), start);

        health.ping_sent(start + Duration::from_secs(31));
        assert_eq!(
            health.evaluate(start + Duration::from_secs(42)),
            HealthVerdict::PongMissed
        );

        let quiet = ConnectionHealth::starting_at(config(), start);
        assert_eq!(
            quiet.evaluate(start + Duration::from_secs(91)),
            HealthVerdict::Idle(Duration::from_secs(91))
        );
    }

    #[test]
    fn test_config_mapping() {
        let health = HealthConfig::default();
        assert_eq!(health, config());
        assert_eq!(health.check_interval(), Duration::from_secs(1));

        let fast = HealthConfig {
            pong_timeout: Duration::from_millis(30),
            ..config()
        };
        assert_eq!(fast.check_interval(), Duration::from_millis(15));
    }
}
