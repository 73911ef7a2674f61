use std::time::Duration;

use thiserror::Error;

pub const DEFAULT_TICK_INTERVAL: Duration = Duration::from_secs(1);

/// Timing policy for one peer's state machine. Every timeout is expressed in
/// ticks; `tick_interval` is the only wall-clock value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PeerConfig {
    pub tick_interval: Duration,
    /// Relay pings sent by `trying` before the peer is considered offline.
    pub trying_attempts: u32,
    /// Ticks spent probing direct candidates before settling on the relay.
    pub establishing_ticks: u32,
    /// Ticks between keepalive pings on an established path.
    pub keepalive_ticks: u32,
    /// Ticks without any inbound traffic before an established path is torn down.
    pub idle_timeout_ticks: u32,
    pub retry_backoff_initial: u32,
    pub retry_backoff_max: u32,
}

impl Default for PeerConfig {
    fn default() -> Self {
        Self {
            tick_interval: DEFAULT_TICK_INTERVAL,
            trying_attempts: 5,
            establishing_ticks: 5,
            keepalive_ticks: 5,
            idle_timeout_ticks: 15,
            retry_backoff_initial: 1,
            retry_backoff_max: 60,
        }
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("tick interval must be non-zero")]
    ZeroTickInterval,
    #[error("{0} must be at least one tick")]
    ZeroTicks(&'static str),
    #[error("idle timeout ({idle}) must exceed keepalive interval ({keepalive})")]
    IdleNotAboveKeepalive { idle: u32, keepalive: u32 },
    #[error("initial backoff ({initial}) exceeds maximum ({max})")]
    BackoffInverted { initial: u32, max: u32 },
}

impl PeerConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.tick_interval.is_zero() {
            return Err(ConfigError::ZeroTickInterval);
        }
        let counts = [
            ("trying_attempts", self.trying_attempts),
            ("establishing_ticks", self.establishing_ticks),
            ("keepalive_ticks", self.keepalive_ticks),
            ("idle_timeout_ticks", self.idle_timeout_ticks),
            ("retry_backoff_initial", self.retry_backoff_initial),
        ];
        if let Some((name, _)) = counts.iter().find(|(_, v)| *v == 0) {
            return Err(ConfigError::ZeroTicks(*name));
        }
        if self.idle_timeout_ticks <= self.keepalive_ticks {
            return Err(ConfigError::IdleNotAboveKeepalive {
                idle: self.idle_timeout_ticks,
                keepalive: self.keepalive_ticks,
            });
        }
        if self.retry_backoff_initial > self.retry_backoff_max {
            return Err(ConfigError::BackoffInverted {
                initial: self.retry_backoff_initial,
                max: self.retry_backoff_max,
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        assert_eq!(PeerConfig::default().validate(), Ok(()));
    }

    #[test]
    fn zero_tick_interval_rejected() {
        let cfg = PeerConfig {
            tick_interval: Duration::ZERO,
            ..PeerConfig::default()
        };
        assert_eq!(cfg.validate(), Err(ConfigError::ZeroTickInterval));
    }

    #[test]
    fn zero_count_names_the_field() {
        let cfg = PeerConfig {
            establishing_ticks: 0,
            ..PeerConfig::default()
        };
        assert_eq!(
            cfg.validate(),
            Err(ConfigError::ZeroTicks("establishing_ticks"))
        );
    }

    #[test]
    fn idle_timeout_must_exceed_keepalive() {
        let cfg = PeerConfig {
            keepalive_ticks: 10,
            idle_timeout_ticks: 10,
            ..PeerConfig::default()
        };
        assert_eq!(
            cfg.validate(),
            Err(ConfigError::IdleNotAboveKeepalive {
                idle: 10,
                keepalive: 10
            })
        );
    }

    #[test]
    fn inverted_backoff_rejected() {
        let cfg = PeerConfig {
            retry_backoff_initial: 8,
            retry_backoff_max: 4,
            ..PeerConfig::default()
        };
        assert_eq!(
            cfg.validate(),
            Err(ConfigError::BackoffInverted { initial: 8, max: 4 })
        );
    }
}
