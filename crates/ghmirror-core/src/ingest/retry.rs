//! Backoff policy for raw-event processing.
//!
//! `min(base * 2^attempts, max)` with ±20% jitter to spread retry storms.

use crate::config::MirrorConfig;
use rand::Rng;
use std::time::Duration;

/// Retry policy for the raw-event lifecycle.
#[derive(Debug, Clone)]
pub struct RawEventRetryPolicy {
    /// Attempts before a row goes to `failed`.
    pub max_attempts: u32,

    /// Initial backoff.
    pub base_delay: Duration,

    /// Backoff ceiling.
    pub max_delay: Duration,

    /// Jitter range as a fraction (0.2 = ±20%).
    pub jitter: f64,
}

impl Default for RawEventRetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            base_delay: Duration::from_secs(60),
            max_delay: Duration::from_secs(30 * 60),
            jitter: 0.2,
        }
    }
}

impl RawEventRetryPolicy {
    pub fn from_config(config: &MirrorConfig) -> Self {
        Self {
            max_attempts: config.raw_event_max_attempts,
            base_delay: config.raw_event_backoff_base(),
            max_delay: config.raw_event_backoff_max(),
            jitter: 0.2,
        }
    }

    /// Whether another attempt is allowed after `attempts` completed ones.
    pub fn should_retry(&self, attempts: u32) -> bool {
        attempts < self.max_attempts
    }

    /// Delay before the next attempt, given `attempts` completed ones.
    pub fn backoff_delay(&self, attempts: u32) -> Duration {
        let exp = attempts.min(16);
        let base = self
            .base_delay
            .saturating_mul(1u32.checked_shl(exp).unwrap_or(u32::MAX))
            .min(self.max_delay);
        self.apply_jitter(base)
    }

    fn apply_jitter(&self, delay: Duration) -> Duration {
        if self.jitter <= 0.0 {
            return delay;
        }
        let mut rng = rand::thread_rng();
        let factor = rng.gen_range((1.0 - self.jitter)..=(1.0 + self.jitter));
        Duration::from_secs_f64((delay.as_secs_f64() * factor).max(0.0))
    }
}

#[cfg(test)]
#[path = "retry_tests.rs"]
mod tests;
