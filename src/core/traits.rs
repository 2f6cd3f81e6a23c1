//! Core traits for the callguard library.
//!
//! This module defines the seams the resilience primitives are built on:
//! the [`Clock`] abstraction that makes every timer injectable, and the
//! [`RetryObserver`] event sink that lets multiple subscribers (metrics,
//! logging, UI progress) watch retry scheduling without changing the call
//! signature.

use crate::core::error::CallError;

use async_trait::async_trait;
use std::fmt::Debug;
use std::sync::{Arc, RwLock};
use std::time::Duration;
use tokio::time::Instant;

/// A source of time for breakers, backoff waits, and queue cooldowns.
///
/// Production code uses [`TokioClock`]; tests can inject [`ManualClock`]
/// (or run under tokio's paused test clock) to simulate time passage
/// deterministically instead of sleeping in real time.
#[async_trait]
pub trait Clock: Send + Sync + Debug {
    /// Returns the current instant.
    fn now(&self) -> Instant;

    /// Suspends the current task for `duration`.
    async fn sleep(&self, duration: Duration);
}

/// A shared, dynamically dispatched clock.
pub type ArcClock = Arc<dyn Clock>;

/// The default clock, backed by the tokio timer.
///
/// Under `#[tokio::test(start_paused = true)]` the tokio timer is virtual,
/// so this clock is already deterministic in tests that use paused time.
#[derive(Debug, Clone, Copy, Default)]
pub struct TokioClock;

#[async_trait]
impl Clock for TokioClock {
    fn now(&self) -> Instant {
        Instant::now()
    }

    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}

/// A manually advanced clock for tests.
///
/// `now()` returns a stored instant; `sleep()` advances it and returns
/// immediately, so code under test never waits in real time.
///
/// # Example
///
/// ```rust
/// use callguard::core::{Clock, ManualClock};
/// use std::time::Duration;
///
/// let clock = ManualClock::new();
/// let before = clock.now();
/// clock.advance(Duration::from_secs(30));
/// assert_eq!(clock.now() - before, Duration::from_secs(30));
/// ```
#[derive(Debug)]
pub struct ManualClock {
    now: RwLock<Instant>,
}

impl ManualClock {
    /// Creates a manual clock starting at the current instant.
    pub fn new() -> Self {
        Self {
            now: RwLock::new(Instant::now()),
        }
    }

    /// Advances the clock by `duration`.
    pub fn advance(&self, duration: Duration) {
        let mut now = self
            .now
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        *now += duration;
    }
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Clock for ManualClock {
    fn now(&self) -> Instant {
        *self
            .now
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    async fn sleep(&self, duration: Duration) {
        self.advance(duration);
    }
}

/// An event sink notified each time a retry is scheduled.
///
/// Observers must not block; they are invoked synchronously between the
/// failed attempt and the backoff wait.
pub trait RetryObserver: Send + Sync {
    /// Called when attempt `attempt` (0-based) failed with `error` and the
    /// next attempt will start after `delay`.
    fn on_retry(&self, error: &CallError, attempt: u32, delay: Duration);
}

/// A shared, dynamically dispatched retry observer.
pub type ArcObserver = Arc<dyn RetryObserver>;

/// Bare closures work as observers.
impl<F> RetryObserver for F
where
    F: Fn(&CallError, u32, Duration) + Send + Sync,
{
    fn on_retry(&self, error: &CallError, attempt: u32, delay: Duration) {
        self(error, attempt, delay)
    }
}

/// A retry observer that logs each scheduled retry through `tracing`.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingRetryObserver;

impl RetryObserver for TracingRetryObserver {
    fn on_retry(&self, error: &CallError, attempt: u32, delay: Duration) {
        tracing::warn!(
            attempt = attempt,
            delay_ms = delay.as_millis() as u64,
            destination = ?error.destination(),
            error = %error,
            "Retry scheduled"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[tokio::test]
    async fn test_manual_clock_advances_on_sleep() {
        let clock = ManualClock::new();
        let before = clock.now();
        clock.sleep(Duration::from_secs(5)).await;
        assert_eq!(clock.now() - before, Duration::from_secs(5));
    }

    #[test]
    fn test_closure_observer() {
        let hits = Arc::new(AtomicU32::new(0));
        let hits_clone = Arc::clone(&hits);
        let observer = move |_: &CallError, _: u32, _: Duration| {
            hits_clone.fetch_add(1, Ordering::SeqCst);
        };

        observer.on_retry(&CallError::Cancelled, 0, Duration::ZERO);
        observer.on_retry(&CallError::Cancelled, 1, Duration::ZERO);
        assert_eq!(hits.load(Ordering::SeqCst), 2);
    }
}
