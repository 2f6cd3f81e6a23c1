//! Circuit breaker configuration.

use crate::core::CallError;

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Configuration for a circuit breaker.
///
/// Immutable after construction; build one with the `with_*` setters and
/// hand it to [`CircuitBreaker::new`](crate::circuit_breaker::CircuitBreaker::new)
/// or use it as the template for a
/// [`BreakerRegistry`](crate::circuit_breaker::BreakerRegistry).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CircuitBreakerConfig {
    /// Number of consecutive failures before opening the circuit.
    pub failure_threshold: u32,

    /// Number of successes in half-open state to close the circuit.
    pub success_threshold: u32,

    /// How long to keep the circuit open before probing the destination.
    pub reset_timeout: Duration,

    /// Maximum number of concurrent probes in half-open state.
    pub half_open_max_probes: u32,

    /// What types of errors count as failures.
    pub failure_policy: FailurePolicy,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 5,
            success_threshold: 3,
            reset_timeout: Duration::from_secs(30),
            half_open_max_probes: 1,
            failure_policy: FailurePolicy::default(),
        }
    }
}

impl CircuitBreakerConfig {
    /// Creates a new configuration with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the failure threshold.
    pub fn with_failure_threshold(mut self, threshold: u32) -> Self {
        self.failure_threshold = threshold.max(1);
        self
    }

    /// Sets the success threshold.
    pub fn with_success_threshold(mut self, threshold: u32) -> Self {
        self.success_threshold = threshold.max(1);
        self
    }

    /// Sets the reset timeout.
    pub fn with_reset_timeout(mut self, timeout: Duration) -> Self {
        self.reset_timeout = timeout;
        self
    }

    /// Sets the maximum number of concurrent half-open probes.
    pub fn with_half_open_max_probes(mut self, max: u32) -> Self {
        self.half_open_max_probes = max.max(1);
        self
    }

    /// Sets the failure policy.
    pub fn with_failure_policy(mut self, policy: FailurePolicy) -> Self {
        self.failure_policy = policy;
        self
    }

    /// Creates a configuration that trips early and recovers cautiously.
    ///
    /// This configuration:
    /// - Uses a lower failure threshold (3)
    /// - Keeps circuits open longer (60 seconds)
    /// - Requires more successful probes before closing (5)
    pub fn strict() -> Self {
        Self {
            failure_threshold: 3,
            success_threshold: 5,
            reset_timeout: Duration::from_secs(60),
            half_open_max_probes: 1,
            failure_policy: FailurePolicy::default(),
        }
    }

    /// Creates a configuration optimized for high availability.
    ///
    /// This configuration:
    /// - Uses a higher failure threshold (10)
    /// - Keeps circuits open for a shorter time (10 seconds)
    /// - Allows more concurrent probes and closes after fewer successes
    pub fn high_availability() -> Self {
        Self {
            failure_threshold: 10,
            success_threshold: 2,
            reset_timeout: Duration::from_secs(10),
            half_open_max_probes: 3,
            failure_policy: FailurePolicy::default(),
        }
    }
}

/// Defines what types of errors count as failures for the circuit breaker.
///
/// Errors that do not count still fail the call; they just leave the
/// breaker's failure accounting untouched.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FailurePolicy {
    /// Count connectivity failures as failures.
    pub count_network: bool,
    /// Count timeouts as failures.
    pub count_timeouts: bool,
    /// Count server errors (5xx) as failures.
    pub count_server_errors: bool,
    /// Count rate limiting as failures.
    pub count_rate_limited: bool,
    /// Count all errors as failures.
    pub count_all_errors: bool,
}

impl Default for FailurePolicy {
    fn default() -> Self {
        Self {
            count_network: true,
            count_timeouts: true,
            count_server_errors: true,
            count_rate_limited: false, // Rate limiting is expected behavior
            count_all_errors: false,
        }
    }
}

impl FailurePolicy {
    /// Creates a new failure policy.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a policy that counts all errors as failures.
    pub fn all_errors() -> Self {
        Self {
            count_all_errors: true,
            ..Self::default()
        }
    }

    /// Determines if an error should be counted as a failure.
    ///
    /// `CircuitOpen` never counts: the breaker raised it itself without the
    /// destination being attempted.
    pub fn should_count(&self, error: &CallError) -> bool {
        if matches!(error, CallError::CircuitOpen { .. }) {
            return false;
        }
        if self.count_all_errors {
            return true;
        }

        match error {
            CallError::Network { .. } => self.count_network,
            CallError::Timeout { .. } => self.count_timeouts,
            CallError::Server { .. } => self.count_server_errors,
            CallError::RateLimited { .. } => self.count_rate_limited,
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = CircuitBreakerConfig::default();
        assert_eq!(config.failure_threshold, 5);
        assert_eq!(config.success_threshold, 3);
        assert_eq!(config.reset_timeout, Duration::from_secs(30));
    }

    #[test]
    fn test_config_builder() {
        let config = CircuitBreakerConfig::new()
            .with_failure_threshold(10)
            .with_reset_timeout(Duration::from_secs(60));

        assert_eq!(config.failure_threshold, 10);
        assert_eq!(config.reset_timeout, Duration::from_secs(60));
    }

    #[test]
    fn test_failure_policy_defaults() {
        let policy = FailurePolicy::default();

        assert!(policy.should_count(&CallError::timeout(Duration::from_secs(30))));
        assert!(policy.should_count(&CallError::network("d", "refused")));
        assert!(policy.should_count(&CallError::server("d", 502)));
        assert!(!policy.should_count(&CallError::rate_limited("d", None)));
        assert!(!policy.should_count(&CallError::client("d", 404)));
        assert!(!policy.should_count(&CallError::Cancelled));
    }

    #[test]
    fn test_failure_policy_all_errors_excludes_circuit_open() {
        let policy = FailurePolicy::all_errors();

        assert!(policy.should_count(&CallError::client("d", 404)));
        assert!(policy.should_count(&CallError::Cancelled));
        assert!(!policy.should_count(&CallError::circuit_open("d", None)));
    }
}
