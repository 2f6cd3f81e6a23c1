//! Circuit breaker state machine data.

use serde::{Deserialize, Serialize};
use std::time::Duration;
use tokio::time::Instant;

/// The current state of a circuit breaker.
#[derive(Debug, Clone)]
pub enum BreakerState {
    /// Circuit is closed; calls pass through normally.
    Closed {
        /// Number of consecutive failures observed.
        failure_count: u32,
    },

    /// Circuit is open; calls are rejected without being attempted.
    Open {
        /// When the circuit was opened.
        opened_at: Instant,
        /// When the circuit should transition to half-open.
        until: Instant,
    },

    /// Circuit is half-open; probe calls are allowed through.
    HalfOpen {
        /// Number of consecutive successful probes.
        success_count: u32,
        /// Number of probes currently in flight.
        inflight_probes: u32,
    },
}

impl BreakerState {
    /// Creates a new closed state.
    pub fn closed() -> Self {
        Self::Closed { failure_count: 0 }
    }

    /// Returns `true` if the circuit is closed.
    pub fn is_closed(&self) -> bool {
        matches!(self, Self::Closed { .. })
    }

    /// Returns `true` if the circuit is open.
    pub fn is_open(&self) -> bool {
        matches!(self, Self::Open { .. })
    }

    /// Returns `true` if the circuit is half-open.
    pub fn is_half_open(&self) -> bool {
        matches!(self, Self::HalfOpen { .. })
    }

    /// Returns the consecutive failure count if closed.
    pub fn failure_count(&self) -> Option<u32> {
        match self {
            Self::Closed { failure_count } => Some(*failure_count),
            _ => None,
        }
    }

    /// Returns the name of the state.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Closed { .. } => "closed",
            Self::Open { .. } => "open",
            Self::HalfOpen { .. } => "half_open",
        }
    }
}

impl Default for BreakerState {
    fn default() -> Self {
        Self::closed()
    }
}

impl std::fmt::Display for BreakerState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Metrics about circuit breaker behavior.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BreakerMetrics {
    /// Total number of calls routed through the breaker.
    pub total_calls: u64,
    /// Number of successful calls.
    pub successful_calls: u64,
    /// Number of failed calls.
    pub failed_calls: u64,
    /// Number of calls rejected due to an open circuit.
    pub rejected_calls: u64,
    /// Number of times the circuit has opened.
    pub times_opened: u64,
    /// Number of times the circuit has closed from half-open.
    pub times_closed: u64,
}

impl BreakerMetrics {
    /// Creates new empty metrics.
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a successful call.
    pub fn record_success(&mut self) {
        self.total_calls += 1;
        self.successful_calls += 1;
    }

    /// Records a failed call.
    pub fn record_failure(&mut self) {
        self.total_calls += 1;
        self.failed_calls += 1;
    }

    /// Records a rejected call.
    pub fn record_rejected(&mut self) {
        self.total_calls += 1;
        self.rejected_calls += 1;
    }

    /// Records that the circuit opened.
    pub fn record_opened(&mut self) {
        self.times_opened += 1;
    }

    /// Records that the circuit closed.
    pub fn record_closed(&mut self) {
        self.times_closed += 1;
    }

    /// Returns the success rate (0.0 to 1.0).
    pub fn success_rate(&self) -> f64 {
        if self.total_calls == 0 {
            return 1.0;
        }
        self.successful_calls as f64 / self.total_calls as f64
    }

    /// Returns the failure rate (0.0 to 1.0).
    pub fn failure_rate(&self) -> f64 {
        if self.total_calls == 0 {
            return 0.0;
        }
        self.failed_calls as f64 / self.total_calls as f64
    }
}

/// A read-only view of a breaker's state, suitable for monitoring.
#[derive(Debug, Clone, Serialize)]
pub struct BreakerSnapshot {
    /// Destination this breaker guards.
    pub destination: String,
    /// Name of the current state.
    pub state: &'static str,
    /// Consecutive failure count (zero unless closed).
    pub failure_count: u32,
    /// How long ago the most recent counted failure happened.
    pub last_failure_age: Option<Duration>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_breaker_state_default() {
        let state = BreakerState::default();
        assert!(state.is_closed());
        assert_eq!(state.failure_count(), Some(0));
    }

    #[test]
    fn test_breaker_state_names() {
        assert_eq!(BreakerState::closed().name(), "closed");
        assert_eq!(
            BreakerState::Open {
                opened_at: Instant::now(),
                until: Instant::now(),
            }
            .name(),
            "open"
        );
        assert_eq!(
            BreakerState::HalfOpen {
                success_count: 0,
                inflight_probes: 0,
            }
            .name(),
            "half_open"
        );
    }

    #[test]
    fn test_metrics() {
        let mut metrics = BreakerMetrics::new();
        assert_eq!(metrics.success_rate(), 1.0);
        assert_eq!(metrics.failure_rate(), 0.0);

        metrics.record_success();
        metrics.record_success();
        metrics.record_failure();

        assert_eq!(metrics.total_calls, 3);
        assert_eq!(metrics.successful_calls, 2);
        assert_eq!(metrics.failed_calls, 1);
        assert!((metrics.success_rate() - 0.666).abs() < 0.01);
    }
}
