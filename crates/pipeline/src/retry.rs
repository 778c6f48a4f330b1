//! Retry policy
//!
//! Exponential backoff with random jitter. A stage does not sleep on the
//! backoff itself: it hands the message back to the channel with the backoff
//! as the redelivery delay, so other messages keep flowing.

use std::time::Duration;

use rand::Rng;
use tally_config::RetryConfig;

/// When and how long to wait before another attempt
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    /// Retries after the first attempt (0 disables retrying)
    pub max_retries: u32,
    /// Delay before the first retry
    pub initial_backoff: Duration,
    /// Upper bound for the delay, before jitter
    pub max_backoff: Duration,
    /// Growth factor per retry
    pub multiplier: f64,
    /// Random extra delay as a fraction of the backoff (0-1)
    pub jitter_factor: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            initial_backoff: Duration::from_millis(100),
            max_backoff: Duration::from_secs(10),
            multiplier: 2.0,
            jitter_factor: 0.1,
        }
    }
}

impl From<&RetryConfig> for RetryPolicy {
    fn from(config: &RetryConfig) -> Self {
        Self {
            max_retries: config.max_retries,
            initial_backoff: config.initial_backoff,
            max_backoff: config.max_backoff,
            multiplier: config.multiplier,
            jitter_factor: config.jitter_factor,
        }
    }
}

impl RetryPolicy {
    /// Policy that never retries
    pub fn disabled() -> Self {
        Self {
            max_retries: 0,
            ..Self::default()
        }
    }

    /// Whether a message that just failed its `attempt`-th attempt
    /// (starting at 1) may be tried again
    #[inline]
    pub fn allows(&self, attempt: u32) -> bool {
        attempt <= self.max_retries
    }

    /// Backoff without jitter before retry number `retry` (starting at 1)
    pub fn base_backoff(&self, retry: u32) -> Duration {
        let exponent = retry.saturating_sub(1).min(63) as i32;
        let millis = self.initial_backoff.as_millis() as f64 * self.multiplier.powi(exponent);
        let capped = millis.min(self.max_backoff.as_millis() as f64);
        Duration::from_millis(capped as u64)
    }

    /// Backoff before retry number `retry` (starting at 1), jitter included
    pub fn backoff(&self, retry: u32) -> Duration {
        let base = self.base_backoff(retry);
        let jitter_range = (base.as_millis() as f64 * self.jitter_factor) as u64;
        let jitter = if jitter_range > 0 {
            rand::thread_rng().gen_range(0..jitter_range)
        } else {
            0
        };
        base.saturating_add(Duration::from_millis(jitter))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_allows() {
        let policy = RetryPolicy::default();
        assert!(policy.allows(1));
        assert!(policy.allows(3));
        assert!(!policy.allows(4));

        let disabled = RetryPolicy::disabled();
        assert!(!disabled.allows(1));
    }

    #[test]
    fn test_base_backoff_grows_and_caps() {
        let policy = RetryPolicy {
            max_backoff: Duration::from_millis(500),
            ..RetryPolicy::default()
        };
        assert_eq!(policy.base_backoff(1), Duration::from_millis(100));
        assert_eq!(policy.base_backoff(2), Duration::from_millis(200));
        assert_eq!(policy.base_backoff(3), Duration::from_millis(400));
        assert_eq!(policy.base_backoff(4), Duration::from_millis(500));
        assert_eq!(policy.base_backoff(200), Duration::from_millis(500));
    }

    #[test]
    fn test_jitter_bounds() {
        let policy = RetryPolicy::default();
        for _ in 0..100 {
            let delay = policy.backoff(2);
            assert!(delay >= Duration::from_millis(200));
            assert!(delay < Duration::from_millis(220));
        }
    }

    #[test]
    fn test_no_jitter() {
        let policy = RetryPolicy {
            jitter_factor: 0.0,
            ..RetryPolicy::default()
        };
        assert_eq!(policy.backoff(1), Duration::from_millis(100));
    }

    #[test]
    fn test_from_config() {
        let config = RetryConfig {
            max_retries: 7,
            ..RetryConfig::default()
        };
        let policy = RetryPolicy::from(&config);
        assert_eq!(policy.max_retries, 7);
        assert_eq!(policy.initial_backoff, config.initial_backoff);
    }
}
