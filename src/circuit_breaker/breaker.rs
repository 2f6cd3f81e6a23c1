//! Circuit breaker implementation.

use crate::audit;
use crate::circuit_breaker::config::CircuitBreakerConfig;
use crate::circuit_breaker::state::{BreakerMetrics, BreakerSnapshot, BreakerState};
use crate::core::{ArcClock, CallError, TokioClock};

use std::fmt;
use std::future::Future;
use std::sync::{Arc, RwLock};
use tokio::time::Instant;

/// A circuit breaker guarding a single destination.
///
/// The breaker monitors failures and prevents cascading failures by
/// temporarily rejecting calls to an unhealthy destination.
///
/// # States
///
/// - **Closed**: Normal operation. Calls pass through, failures are counted.
/// - **Open**: Destination is failing. Calls are rejected immediately.
/// - **Half-Open**: Probing. A limited number of calls are allowed through
///   to test whether the destination has recovered.
///
/// The breaker holds no timers: the open-to-half-open transition is
/// evaluated lazily on the next admission check after the reset timeout
/// elapses.
///
/// # Example
///
/// ```rust,ignore
/// use callguard::circuit_breaker::{CircuitBreaker, CircuitBreakerConfig};
///
/// let breaker = CircuitBreaker::new("api.example.com", CircuitBreakerConfig::default());
///
/// let result = breaker.call(|| async { perform_request().await }).await;
/// ```
pub struct CircuitBreaker {
    /// Destination this breaker guards.
    destination: String,
    /// Current state of the circuit.
    state: RwLock<BreakerState>,
    /// Configuration.
    config: CircuitBreakerConfig,
    /// Metrics.
    metrics: RwLock<BreakerMetrics>,
    /// When the most recent counted failure happened.
    last_failure: RwLock<Option<Instant>>,
    /// Time source.
    clock: ArcClock,
}

impl CircuitBreaker {
    /// Creates a new circuit breaker for the given destination.
    pub fn new(destination: impl Into<String>, config: CircuitBreakerConfig) -> Self {
        Self {
            destination: destination.into(),
            state: RwLock::new(BreakerState::closed()),
            config,
            metrics: RwLock::new(BreakerMetrics::new()),
            last_failure: RwLock::new(None),
            clock: Arc::new(TokioClock),
        }
    }

    /// Creates a new circuit breaker with default configuration.
    pub fn with_defaults(destination: impl Into<String>) -> Self {
        Self::new(destination, CircuitBreakerConfig::default())
    }

    /// Replaces the time source. Intended for tests and simulations.
    pub fn with_clock(mut self, clock: ArcClock) -> Self {
        self.clock = clock;
        self
    }

    /// Returns the destination this breaker guards.
    pub fn destination(&self) -> &str {
        &self.destination
    }

    /// Returns the current state of the circuit breaker.
    pub fn state(&self) -> BreakerState {
        self.state
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    /// Returns a copy of the current metrics.
    pub fn metrics(&self) -> BreakerMetrics {
        self.metrics
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    /// Returns a reference to the configuration.
    pub fn config(&self) -> &CircuitBreakerConfig {
        &self.config
    }

    /// Returns a read-only snapshot for monitoring.
    pub fn snapshot(&self) -> BreakerSnapshot {
        let state = self
            .state
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        let last_failure = *self
            .last_failure
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner());

        BreakerSnapshot {
            destination: self.destination.clone(),
            state: state.name(),
            failure_count: state.failure_count().unwrap_or(0),
            last_failure_age: last_failure
                .map(|at| self.clock.now().saturating_duration_since(at)),
        }
    }

    /// Executes `operation` under the breaker's admission rules.
    ///
    /// When fail-fast applies, returns [`CallError::CircuitOpen`] without
    /// invoking `operation`. Otherwise the operation's outcome is recorded
    /// against the breaker (filtered through the configured
    /// [`FailurePolicy`](crate::circuit_breaker::FailurePolicy)) and
    /// returned unchanged.
    pub async fn call<F, Fut, T>(&self, operation: F) -> Result<T, CallError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, CallError>>,
    {
        self.check_admission()?;

        match operation().await {
            Ok(value) => {
                self.record_success();
                Ok(value)
            }
            Err(error) => {
                self.record_failure(&error);
                Err(error)
            }
        }
    }

    /// Forces the circuit into the open state.
    ///
    /// Operator override for manual incident response; normal traffic never
    /// calls this.
    pub fn force_open(&self) {
        let now = self.clock.now();
        let mut state = self
            .state
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        let from = state.name();
        *state = self.open_state(now);
        drop(state);

        self.metrics
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .record_opened();

        tracing::warn!(destination = %self.destination, "Circuit forced open");
        audit::emit_breaker_transition(&self.destination, from, "open");
    }

    /// Forces the circuit into the closed state, resetting counters.
    pub fn force_close(&self) {
        let mut state = self
            .state
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        let from = state.name();
        *state = BreakerState::closed();
        drop(state);

        self.metrics
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .record_closed();

        tracing::info!(destination = %self.destination, "Circuit forced closed");
        audit::emit_breaker_transition(&self.destination, from, "closed");
    }

    /// Resets the circuit breaker state and metrics.
    pub fn reset(&self) {
        *self
            .state
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner()) = BreakerState::closed();
        *self
            .metrics
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner()) = BreakerMetrics::new();
        *self
            .last_failure
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner()) = None;
    }

    fn open_state(&self, now: Instant) -> BreakerState {
        BreakerState::Open {
            opened_at: now,
            until: now + self.config.reset_timeout,
        }
    }

    /// Checks if a call should be admitted, transitioning state if needed.
    fn check_admission(&self) -> Result<(), CallError> {
        let mut state = self
            .state
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        let now = self.clock.now();

        match &*state {
            BreakerState::Closed { .. } => Ok(()),

            BreakerState::Open { until, .. } => {
                if now >= *until {
                    // Reset timeout elapsed; admit this call as the first probe
                    *state = BreakerState::HalfOpen {
                        success_count: 0,
                        inflight_probes: 1,
                    };
                    drop(state);

                    tracing::info!(
                        destination = %self.destination,
                        "Circuit half-open, probing destination"
                    );
                    audit::emit_breaker_transition(&self.destination, "open", "half_open");
                    Ok(())
                } else {
                    let hint = format!("circuit may recover in {:?}", *until - now);
                    drop(state);
                    Err(self.reject(hint))
                }
            }

            BreakerState::HalfOpen {
                success_count,
                inflight_probes,
            } => {
                if *inflight_probes < self.config.half_open_max_probes {
                    *state = BreakerState::HalfOpen {
                        success_count: *success_count,
                        inflight_probes: inflight_probes + 1,
                    };
                    Ok(())
                } else {
                    drop(state);
                    Err(self.reject("maximum probes in flight".to_string()))
                }
            }
        }
    }

    fn reject(&self, hint: String) -> CallError {
        self.metrics
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .record_rejected();

        tracing::debug!(
            destination = %self.destination,
            recovery_hint = %hint,
            "Call rejected by open circuit"
        );
        audit::emit_call_rejected(&self.destination, &hint);

        CallError::circuit_open(&self.destination, Some(hint))
    }

    /// Records a successful call.
    fn record_success(&self) {
        let mut state = self
            .state
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        self.metrics
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .record_success();

        match &*state {
            BreakerState::Closed { .. } => {
                // Reset failure count on success
                *state = BreakerState::closed();
            }

            BreakerState::HalfOpen {
                success_count,
                inflight_probes,
            } => {
                let successes = success_count + 1;
                if successes >= self.config.success_threshold {
                    *state = BreakerState::closed();
                    drop(state);

                    self.metrics
                        .write()
                        .unwrap_or_else(|poisoned| poisoned.into_inner())
                        .record_closed();

                    tracing::info!(
                        destination = %self.destination,
                        probes = successes,
                        "Circuit closed after successful probes"
                    );
                    audit::emit_breaker_transition(&self.destination, "half_open", "closed");
                } else {
                    *state = BreakerState::HalfOpen {
                        success_count: successes,
                        inflight_probes: inflight_probes.saturating_sub(1),
                    };
                }
            }

            BreakerState::Open { .. } => {
                // Late completion from before the trip; nothing to do
            }
        }
    }

    /// Records a failed call.
    fn record_failure(&self, error: &CallError) {
        let counts = self.config.failure_policy.should_count(error);

        let mut state = self
            .state
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());

        if !counts {
            // The probe still settled, even if the error is not counted
            if let BreakerState::HalfOpen {
                success_count,
                inflight_probes,
            } = &*state
            {
                *state = BreakerState::HalfOpen {
                    success_count: *success_count,
                    inflight_probes: inflight_probes.saturating_sub(1),
                };
            }
            return;
        }

        let now = self.clock.now();
        self.metrics
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .record_failure();
        *self
            .last_failure
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner()) = Some(now);

        match &*state {
            BreakerState::Closed { failure_count } => {
                let failures = failure_count + 1;
                if failures >= self.config.failure_threshold {
                    *state = self.open_state(now);
                    drop(state);
                    self.on_opened("closed", failures, error);
                } else {
                    *state = BreakerState::Closed {
                        failure_count: failures,
                    };
                }
            }

            BreakerState::HalfOpen { .. } => {
                // Any counted failure while probing reopens the circuit
                *state = self.open_state(now);
                drop(state);
                self.on_opened("half_open", 1, error);
            }

            BreakerState::Open { .. } => {
                // Already open, nothing to do
            }
        }
    }

    fn on_opened(&self, from: &'static str, failures: u32, error: &CallError) {
        self.metrics
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .record_opened();

        tracing::warn!(
            destination = %self.destination,
            consecutive_failures = failures,
            reset_timeout_ms = self.config.reset_timeout.as_millis() as u64,
            error = %error,
            "Circuit opened"
        );
        audit::emit_breaker_transition(&self.destination, from, "open");
    }
}

impl fmt::Debug for CircuitBreaker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CircuitBreaker")
            .field("destination", &self.destination)
            .field(
                "state",
                &*self
                    .state
                    .read()
                    .unwrap_or_else(|poisoned| poisoned.into_inner()),
            )
            .field("config", &self.config)
            .finish()
    }
}
