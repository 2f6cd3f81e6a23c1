//! Bounded-concurrency admission queue.
//!
//! [`BoundedQueue`] admits at most `max_concurrent` operations at a time;
//! everyone else waits in FIFO order. After each completion the freed slot
//! is withheld for a configurable minimum delay before the next waiter is
//! admitted, which caps the aggregate completion rate against a touchy
//! destination.

use crate::core::{ArcClock, CallError, TokioClock};

use std::fmt;
use std::future::Future;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;

/// A FIFO queue admitting a bounded number of concurrent operations.
///
/// Admission order is submission order: the underlying semaphore queues
/// waiters fairly, so no submission can overtake an earlier one.
///
/// # Example
///
/// ```rust,ignore
/// use callguard::queue::BoundedQueue;
/// use std::time::Duration;
///
/// let queue = BoundedQueue::new(4, Duration::from_millis(50));
/// let result = queue.submit(|| async { fetch_page().await }).await;
/// ```
pub struct BoundedQueue {
    /// Admission permits; one per concurrency slot.
    semaphore: Arc<Semaphore>,
    /// Maximum number of concurrently admitted operations.
    max_concurrent: usize,
    /// Minimum delay between a completion and the next admission.
    min_delay: Duration,
    /// Currently admitted operations.
    in_flight: AtomicUsize,
    /// Submissions waiting for admission.
    pending: AtomicUsize,
    /// Time source for the inter-completion delay.
    clock: ArcClock,
}

impl BoundedQueue {
    /// Creates a queue with the given concurrency limit and minimum
    /// inter-completion delay.
    pub fn new(max_concurrent: usize, min_delay: Duration) -> Self {
        let max_concurrent = max_concurrent.max(1);
        Self {
            semaphore: Arc::new(Semaphore::new(max_concurrent)),
            max_concurrent,
            min_delay,
            in_flight: AtomicUsize::new(0),
            pending: AtomicUsize::new(0),
            clock: Arc::new(TokioClock),
        }
    }

    /// Replaces the time source. Intended for tests and simulations.
    pub fn with_clock(mut self, clock: ArcClock) -> Self {
        self.clock = clock;
        self
    }

    /// Returns the maximum number of concurrently admitted operations.
    pub fn max_concurrent(&self) -> usize {
        self.max_concurrent
    }

    /// Returns the minimum inter-completion delay.
    pub fn min_delay(&self) -> Duration {
        self.min_delay
    }

    /// Returns the number of currently admitted operations.
    pub fn in_flight(&self) -> usize {
        self.in_flight.load(Ordering::Relaxed)
    }

    /// Returns the number of submissions waiting for admission.
    pub fn pending(&self) -> usize {
        self.pending.load(Ordering::Relaxed)
    }

    /// Returns `true` if every concurrency slot is taken.
    pub fn is_full(&self) -> bool {
        self.in_flight() >= self.max_concurrent
    }

    /// Submits an operation, waiting for admission if the queue is full.
    ///
    /// The operation's own outcome is returned unchanged; a failed
    /// operation frees its slot exactly like a successful one.
    pub async fn submit<F, Fut, T>(&self, operation: F) -> Result<T, CallError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, CallError>>,
    {
        self.pending.fetch_add(1, Ordering::SeqCst);
        let permit = Arc::clone(&self.semaphore)
            .acquire_owned()
            .await
            .map_err(|_| CallError::internal("admission queue closed"));
        self.pending.fetch_sub(1, Ordering::SeqCst);
        let permit = permit?;

        self.in_flight.fetch_add(1, Ordering::SeqCst);
        let result = operation().await;
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        if self.min_delay.is_zero() {
            drop(permit);
        } else {
            // Hold the freed slot back for the cooldown without blocking
            // this caller's return
            let clock = Arc::clone(&self.clock);
            let delay = self.min_delay;
            tokio::spawn(async move {
                clock.sleep(delay).await;
                drop(permit);
            });
        }

        result
    }
}

impl fmt::Debug for BoundedQueue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BoundedQueue")
            .field("max_concurrent", &self.max_concurrent)
            .field("min_delay", &self.min_delay)
            .field("in_flight", &self.in_flight())
            .field("pending", &self.pending())
            .finish()
    }
}
