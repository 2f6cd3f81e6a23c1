//! The resilient call wrapper.
//!
//! [`resilient_call`] wraps a single asynchronous operation with per-attempt
//! timeout enforcement, a retry loop driven by error classification and
//! backoff, and optional delegation to a circuit breaker.

use crate::audit;
use crate::circuit_breaker::CircuitBreaker;
use crate::core::{ArcClock, ArcObserver, CallError, RetryObserver, TokioClock};
use crate::retry::backoff::RetryConfig;

use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

/// Options for a resilient call.
///
/// ```rust
/// use callguard::retry::{CallOptions, RetryConfig};
/// use std::time::Duration;
///
/// let options = CallOptions::for_destination("api.example.com")
///     .with_timeout(Duration::from_secs(5))
///     .with_retry(RetryConfig::default().with_max_retries(2));
/// ```
pub struct CallOptions {
    /// Retry budget and backoff policy.
    pub retry: RetryConfig,

    /// Deadline for each individual attempt.
    pub timeout: Duration,

    /// Destination label used for logging and audit events.
    pub destination: Option<String>,

    /// Breaker guarding this call's destination, if any.
    ///
    /// When set, the whole retry loop runs as one breaker-protected call:
    /// an open circuit rejects before the first attempt, and the breaker
    /// records a single outcome for the call no matter how many attempts
    /// it took.
    pub breaker: Option<Arc<CircuitBreaker>>,

    /// Subscribers notified each time a retry is scheduled.
    pub observers: Vec<ArcObserver>,

    /// Time source for backoff waits.
    pub clock: ArcClock,
}

impl Default for CallOptions {
    fn default() -> Self {
        Self {
            retry: RetryConfig::default(),
            timeout: Duration::from_secs(10),
            destination: None,
            breaker: None,
            observers: Vec::new(),
            clock: Arc::new(TokioClock),
        }
    }
}

impl CallOptions {
    /// Creates options with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates options labeled with a destination.
    pub fn for_destination(destination: impl Into<String>) -> Self {
        Self {
            destination: Some(destination.into()),
            ..Self::default()
        }
    }

    /// Sets the retry configuration.
    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    /// Sets the per-attempt timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Sets the circuit breaker guarding this call.
    pub fn with_breaker(mut self, breaker: Arc<CircuitBreaker>) -> Self {
        self.breaker = Some(breaker);
        self
    }

    /// Adds a retry observer. May be called multiple times.
    pub fn with_observer<O: RetryObserver + 'static>(mut self, observer: O) -> Self {
        self.observers.push(Arc::new(observer));
        self
    }

    /// Replaces the time source. Intended for tests and simulations.
    pub fn with_clock(mut self, clock: ArcClock) -> Self {
        self.clock = clock;
        self
    }
}

impl fmt::Debug for CallOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CallOptions")
            .field("retry", &self.retry)
            .field("timeout", &self.timeout)
            .field("destination", &self.destination)
            .field("breaker", &self.breaker.as_ref().map(|b| b.destination()))
            .field("observers", &self.observers.len())
            .finish()
    }
}

/// Executes `operation` resiliently according to `options`.
///
/// Each attempt races the operation against `options.timeout`; an elapsed
/// deadline cancels the in-flight attempt (the future is dropped) and
/// counts as a retryable [`CallError::Timeout`]. Retryable failures are
/// retried up to `options.retry.max_retries` times, waiting the server's
/// rate-limit hint when one is present and the computed backoff otherwise.
/// Non-retryable failures and exhausted budgets propagate the final error.
///
/// When `options.breaker` is set, the whole loop is delegated to
/// [`CircuitBreaker::call`]: a [`CallError::CircuitOpen`] rejection
/// short-circuits before any attempt is made.
///
/// # Example
///
/// ```rust,ignore
/// use callguard::retry::{resilient_call, CallOptions};
///
/// let options = CallOptions::for_destination("api.example.com");
/// let body = resilient_call(&options, || async { fetch_page().await }).await?;
/// ```
pub async fn resilient_call<F, Fut, T>(options: &CallOptions, operation: F) -> Result<T, CallError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, CallError>>,
{
    match &options.breaker {
        Some(breaker) => breaker.call(|| run_attempts(options, operation)).await,
        None => run_attempts(options, operation).await,
    }
}

/// The retry loop: attempts, classification, backoff.
async fn run_attempts<F, Fut, T>(options: &CallOptions, mut operation: F) -> Result<T, CallError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, CallError>>,
{
    let call_id = Uuid::new_v4();
    let started = options.clock.now();
    let mut attempt: u32 = 0;

    loop {
        let outcome = match tokio::time::timeout(options.timeout, operation()).await {
            Ok(result) => result,
            Err(_) => Err(CallError::timeout(options.timeout)),
        };

        match outcome {
            Ok(value) => {
                if attempt > 0 {
                    tracing::debug!(
                        call_id = %call_id,
                        destination = ?options.destination,
                        attempts = attempt + 1,
                        "Call succeeded after retries"
                    );
                }
                audit::emit_call_completed(
                    call_id,
                    options.destination.as_deref(),
                    attempt + 1,
                    options.clock.now().saturating_duration_since(started),
                    "success",
                );
                return Ok(value);
            }

            Err(error) if error.is_retryable() && options.retry.should_retry(attempt) => {
                // A server-provided rate-limit hint overrides the backoff
                let delay = error
                    .retry_after()
                    .unwrap_or_else(|| options.retry.delay_for_attempt(attempt));

                for observer in &options.observers {
                    observer.on_retry(&error, attempt, delay);
                }
                tracing::debug!(
                    call_id = %call_id,
                    destination = ?options.destination,
                    attempt = attempt,
                    delay_ms = delay.as_millis() as u64,
                    error = %error,
                    "Attempt failed, retrying"
                );
                audit::emit_retry_scheduled(
                    call_id,
                    options.destination.as_deref(),
                    &error,
                    attempt,
                    delay,
                );

                options.clock.sleep(delay).await;
                attempt += 1;
            }

            Err(error) => {
                tracing::warn!(
                    call_id = %call_id,
                    destination = ?options.destination,
                    attempts = attempt + 1,
                    error = %error,
                    "Call failed"
                );
                audit::emit_call_completed(
                    call_id,
                    options.destination.as_deref(),
                    attempt + 1,
                    options.clock.now().saturating_duration_since(started),
                    "failure",
                );
                return Err(error);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::circuit_breaker::CircuitBreakerConfig;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Mutex;
    use tokio::time::Instant;

    fn fail_n_then_succeed(
        failures: u32,
        counter: Arc<AtomicU32>,
    ) -> impl FnMut() -> std::pin::Pin<Box<dyn Future<Output = Result<u16, CallError>> + Send>>
    {
        move || {
            let n = counter.fetch_add(1, Ordering::SeqCst);
            Box::pin(async move {
                if n < failures {
                    Err(CallError::server("api.example.com", 500))
                } else {
                    Ok(200)
                }
            })
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_returns_success_after_transient_failures() {
        let calls = Arc::new(AtomicU32::new(0));
        let options = CallOptions::new().with_retry(RetryConfig::default().with_max_retries(5));

        let result = resilient_call(&options, fail_n_then_succeed(3, Arc::clone(&calls))).await;

        assert_eq!(result, Ok(200));
        assert_eq!(calls.load(Ordering::SeqCst), 4);
    }

    #[tokio::test(start_paused = true)]
    async fn test_exhausted_retries_surface_final_error() {
        let calls = Arc::new(AtomicU32::new(0));
        let options = CallOptions::new().with_retry(RetryConfig::default().with_max_retries(2));

        let result = resilient_call(&options, fail_n_then_succeed(99, Arc::clone(&calls))).await;

        assert_eq!(result, Err(CallError::server("api.example.com", 500)));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_rate_limit_hint_overrides_backoff() {
        let invocations = Arc::new(Mutex::new(Vec::new()));
        let seen = Arc::clone(&invocations);
        let options = CallOptions::new().with_retry(RetryConfig::default().with_max_retries(1));

        let result = resilient_call(&options, move || {
            let seen = Arc::clone(&seen);
            async move {
                let mut at = seen.lock().unwrap();
                at.push(Instant::now());
                if at.len() == 1 {
                    Err(CallError::rate_limited(
                        "api.example.com",
                        Some(Duration::from_secs(2)),
                    ))
                } else {
                    Ok(200)
                }
            }
        })
        .await;

        assert_eq!(result, Ok(200));
        let at = invocations.lock().unwrap();
        assert_eq!(at.len(), 2);
        assert_eq!(at[1] - at[0], Duration::from_secs(2));
    }

    #[tokio::test(start_paused = true)]
    async fn test_client_error_is_not_retried() {
        let calls = Arc::new(AtomicU32::new(0));
        let counter = Arc::clone(&calls);
        let options = CallOptions::new().with_retry(RetryConfig::default().with_max_retries(5));

        let result = resilient_call(&options, move || {
            counter.fetch_add(1, Ordering::SeqCst);
            async { Err::<u16, _>(CallError::client("api.example.com", 404)) }
        })
        .await;

        assert_eq!(result, Err(CallError::client("api.example.com", 404)));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancellation_is_not_retried() {
        let calls = Arc::new(AtomicU32::new(0));
        let counter = Arc::clone(&calls);
        let options = CallOptions::new();

        let result = resilient_call(&options, move || {
            counter.fetch_add(1, Ordering::SeqCst);
            async { Err::<u16, _>(CallError::Cancelled) }
        })
        .await;

        assert_eq!(result, Err(CallError::Cancelled));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_cancels_attempt_and_retries() {
        let calls = Arc::new(AtomicU32::new(0));
        let counter = Arc::clone(&calls);
        let options = CallOptions::new()
            .with_timeout(Duration::from_secs(1))
            .with_retry(RetryConfig::default().with_max_retries(1));

        let result = resilient_call(&options, move || {
            let n = counter.fetch_add(1, Ordering::SeqCst);
            async move {
                if n == 0 {
                    // Never settles inside the attempt deadline
                    tokio::time::sleep(Duration::from_secs(3600)).await;
                }
                Ok(200)
            }
        })
        .await;

        assert_eq!(result, Ok(200));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_surfaces_when_budget_exhausted() {
        let options = CallOptions::new()
            .with_timeout(Duration::from_secs(1))
            .with_retry(RetryConfig::no_retry());

        let result: Result<u16, _> = resilient_call(&options, || async {
            tokio::time::sleep(Duration::from_secs(3600)).await;
            Ok(200)
        })
        .await;

        assert_eq!(result, Err(CallError::timeout(Duration::from_secs(1))));
    }

    #[tokio::test(start_paused = true)]
    async fn test_open_breaker_short_circuits_before_any_attempt() {
        let breaker = Arc::new(CircuitBreaker::with_defaults("api.example.com"));
        breaker.force_open();

        let calls = Arc::new(AtomicU32::new(0));
        let counter = Arc::clone(&calls);
        let options = CallOptions::for_destination("api.example.com").with_breaker(breaker);

        let result = resilient_call(&options, move || {
            counter.fetch_add(1, Ordering::SeqCst);
            async { Ok::<u16, _>(200) }
        })
        .await;

        assert!(matches!(result, Err(CallError::CircuitOpen { .. })));
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_breaker_records_one_outcome_per_call() {
        let breaker = Arc::new(CircuitBreaker::new(
            "api.example.com",
            CircuitBreakerConfig::default().with_failure_threshold(10),
        ));
        let calls = Arc::new(AtomicU32::new(0));
        let options = CallOptions::new()
            .with_breaker(Arc::clone(&breaker))
            .with_retry(RetryConfig::default().with_max_retries(2));

        let _ = resilient_call(&options, fail_n_then_succeed(99, Arc::clone(&calls))).await;

        // Three attempts happened, but the breaker saw one logical failure
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        assert_eq!(breaker.metrics().failed_calls, 1);
        assert_eq!(breaker.state().failure_count(), Some(1));
    }

    #[tokio::test(start_paused = true)]
    async fn test_observers_see_each_scheduled_retry() {
        let first = Arc::new(AtomicU32::new(0));
        let second = Arc::new(AtomicU32::new(0));
        let f = Arc::clone(&first);
        let s = Arc::clone(&second);

        let calls = Arc::new(AtomicU32::new(0));
        let options = CallOptions::new()
            .with_retry(RetryConfig::default().with_max_retries(3))
            .with_observer(move |_: &CallError, _: u32, _: Duration| {
                f.fetch_add(1, Ordering::SeqCst);
            })
            .with_observer(move |_: &CallError, _: u32, _: Duration| {
                s.fetch_add(1, Ordering::SeqCst);
            });

        let result = resilient_call(&options, fail_n_then_succeed(2, Arc::clone(&calls))).await;

        assert_eq!(result, Ok(200));
        assert_eq!(first.load(Ordering::SeqCst), 2);
        assert_eq!(second.load(Ordering::SeqCst), 2);
    }
}
