//! Retry budget and backoff calculation.

use rand::Rng;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Exponent cap for the backoff doubling, so `2^attempt` cannot overflow.
const MAX_BACKOFF_EXPONENT: u32 = 32;

/// Configuration for retry behavior.
///
/// The delay for attempt `n` (0-based) is `min(base_delay * 2^n, max_delay)`
/// plus, when jitter is enabled, a uniformly random extra of up to 30% of
/// the capped delay. Jitter spreads out retries from many callers that
/// failed at the same moment.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Maximum number of retries after the initial attempt.
    pub max_retries: u32,

    /// Delay before the first retry.
    pub base_delay: Duration,

    /// Upper bound on the computed delay (before jitter).
    pub max_delay: Duration,

    /// Whether to add random jitter to delays.
    pub jitter: bool,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay: Duration::from_millis(300),
            max_delay: Duration::from_secs(30),
            jitter: true,
        }
    }
}

impl RetryConfig {
    /// Creates a new retry configuration with defaults.
    pub fn new() -> Self {
        Self::default()
    }

    /// Disables retries; the initial attempt is the only attempt.
    pub fn no_retry() -> Self {
        Self {
            max_retries: 0,
            ..Self::default()
        }
    }

    /// Sets the maximum number of retries.
    pub fn with_max_retries(mut self, retries: u32) -> Self {
        self.max_retries = retries;
        self
    }

    /// Sets the base delay.
    pub fn with_base_delay(mut self, delay: Duration) -> Self {
        self.base_delay = delay;
        self
    }

    /// Sets the maximum delay.
    pub fn with_max_delay(mut self, delay: Duration) -> Self {
        self.max_delay = delay;
        self
    }

    /// Enables or disables jitter.
    pub fn with_jitter(mut self, jitter: bool) -> Self {
        self.jitter = jitter;
        self
    }

    /// Calculates the delay to wait after failed attempt `attempt` (0-based).
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let exponent = attempt.min(MAX_BACKOFF_EXPONENT);
        let raw_ms = (self.base_delay.as_millis() as u64)
            .saturating_mul(2u64.saturating_pow(exponent));
        let capped_ms = raw_ms.min(self.max_delay.as_millis() as u64);

        let final_ms = if self.jitter {
            let extra = rand::thread_rng().gen_range(0.0..=0.3) * capped_ms as f64;
            capped_ms.saturating_add(extra as u64)
        } else {
            capped_ms
        };

        Duration::from_millis(final_ms)
    }

    /// Returns whether another attempt should be made after failed attempt
    /// `attempt` (0-based).
    pub fn should_retry(&self, attempt: u32) -> bool {
        attempt < self.max_retries
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = RetryConfig::default();
        assert_eq!(config.max_retries, 3);
        assert_eq!(config.base_delay, Duration::from_millis(300));
        assert!(config.jitter);
    }

    #[test]
    fn test_no_retry() {
        let config = RetryConfig::no_retry();
        assert!(!config.should_retry(0));
    }

    #[test]
    fn test_delay_doubles_without_jitter() {
        let config = RetryConfig::new()
            .with_base_delay(Duration::from_millis(100))
            .with_jitter(false);

        assert_eq!(config.delay_for_attempt(0), Duration::from_millis(100));
        assert_eq!(config.delay_for_attempt(1), Duration::from_millis(200));
        assert_eq!(config.delay_for_attempt(2), Duration::from_millis(400));
        assert_eq!(config.delay_for_attempt(3), Duration::from_millis(800));
    }

    #[test]
    fn test_delay_capped() {
        let config = RetryConfig::new()
            .with_base_delay(Duration::from_secs(1))
            .with_max_delay(Duration::from_secs(5))
            .with_jitter(false);

        // 1s * 2^3 = 8s, but capped at 5s
        assert_eq!(config.delay_for_attempt(3), Duration::from_secs(5));
    }

    #[test]
    fn test_jitter_envelope() {
        let config = RetryConfig::new()
            .with_base_delay(Duration::from_millis(1000))
            .with_jitter(true);

        for _ in 0..100 {
            let delay = config.delay_for_attempt(0);
            assert!(delay >= Duration::from_millis(1000));
            assert!(delay <= Duration::from_millis(1300));
        }
    }

    #[test]
    fn test_huge_attempt_does_not_overflow() {
        let config = RetryConfig::new().with_jitter(false);
        assert_eq!(config.delay_for_attempt(u32::MAX), config.max_delay);
    }

    #[test]
    fn test_should_retry() {
        let config = RetryConfig::new().with_max_retries(3);
        assert!(config.should_retry(0));
        assert!(config.should_retry(2));
        assert!(!config.should_retry(3));
    }
}
