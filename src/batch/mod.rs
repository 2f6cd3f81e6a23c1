//! Batch execution with partial-failure semantics.
//!
//! [`run_batch`] drives a list of independent operations in fixed-size
//! waves: every operation in a wave runs concurrently, and the wave is
//! awaited in full before the next one starts. Outcomes come back in input
//! order, each tagged fulfilled or rejected.

use crate::core::CallError;

use futures::future::join_all;
use serde::Serialize;
use std::future::Future;

/// Options for a batch run.
#[derive(Debug, Clone, Serialize)]
pub struct BatchOptions {
    /// Number of operations run concurrently per wave.
    pub max_concurrent: usize,

    /// Abort the batch on the first rejection instead of collecting it.
    pub stop_on_error: bool,
}

impl Default for BatchOptions {
    fn default() -> Self {
        Self {
            max_concurrent: 4,
            stop_on_error: false,
        }
    }
}

impl BatchOptions {
    /// Creates options with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the wave size.
    pub fn with_max_concurrent(mut self, max: usize) -> Self {
        self.max_concurrent = max.max(1);
        self
    }

    /// Sets whether the first rejection aborts the batch.
    pub fn with_stop_on_error(mut self, stop: bool) -> Self {
        self.stop_on_error = stop;
        self
    }
}

/// The per-item result of a batch run.
#[derive(Debug)]
pub enum BatchOutcome<T> {
    /// The operation succeeded with this value.
    Fulfilled(T),
    /// The operation failed with this error.
    Rejected(CallError),
}

impl<T> BatchOutcome<T> {
    /// Returns `true` if the operation succeeded.
    pub fn is_fulfilled(&self) -> bool {
        matches!(self, Self::Fulfilled(_))
    }

    /// Returns `true` if the operation failed.
    pub fn is_rejected(&self) -> bool {
        matches!(self, Self::Rejected(_))
    }

    /// Returns the success value, if any.
    pub fn value(&self) -> Option<&T> {
        match self {
            Self::Fulfilled(value) => Some(value),
            Self::Rejected(_) => None,
        }
    }

    /// Consumes the outcome, returning the success value if any.
    pub fn into_value(self) -> Option<T> {
        match self {
            Self::Fulfilled(value) => Some(value),
            Self::Rejected(_) => None,
        }
    }

    /// Returns the error, if any.
    pub fn error(&self) -> Option<&CallError> {
        match self {
            Self::Fulfilled(_) => None,
            Self::Rejected(error) => Some(error),
        }
    }
}

/// Runs `operations` in waves of `options.max_concurrent`.
///
/// Returns one [`BatchOutcome`] per operation, in input order, regardless
/// of completion order inside a wave. With `stop_on_error` set, the first
/// rejection (by input order) is propagated instead and the remaining
/// waves never start; the already-started wave still runs to completion
/// before the error is returned.
///
/// # Example
///
/// ```rust,ignore
/// use callguard::batch::{run_batch, BatchOptions};
///
/// let operations: Vec<_> = urls
///     .into_iter()
///     .map(|url| move || fetch(url))
///     .collect();
///
/// let outcomes = run_batch(operations, &BatchOptions::new().with_max_concurrent(3)).await?;
/// ```
pub async fn run_batch<F, Fut, T>(
    operations: Vec<F>,
    options: &BatchOptions,
) -> Result<Vec<BatchOutcome<T>>, CallError>
where
    F: FnOnce() -> Fut,
    Fut: Future<Output = Result<T, CallError>>,
{
    let total = operations.len();
    let wave_size = options.max_concurrent.max(1);
    let mut outcomes = Vec::with_capacity(total);
    let mut remaining = operations.into_iter();

    loop {
        let wave: Vec<F> = remaining.by_ref().take(wave_size).collect();
        if wave.is_empty() {
            break;
        }

        let results = join_all(wave.into_iter().map(|operation| operation())).await;

        for result in results {
            match result {
                Ok(value) => outcomes.push(BatchOutcome::Fulfilled(value)),
                Err(error) => {
                    if options.stop_on_error {
                        tracing::debug!(
                            completed = outcomes.len(),
                            total = total,
                            error = %error,
                            "Batch aborted on first rejection"
                        );
                        return Err(error);
                    }
                    outcomes.push(BatchOutcome::Rejected(error));
                }
            }
        }
    }

    Ok(outcomes)
}
