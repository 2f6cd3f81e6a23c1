//! # Callguard
//!
//! Resilient outbound-call primitives: per-destination circuit breakers,
//! retry with exponential backoff, timeout enforcement, bounded
//! concurrency, and batch execution.
//!
//! ## Overview
//!
//! Callguard wraps caller-supplied asynchronous operations with the
//! standard resilience patterns, allowing you to:
//!
//! - Retry transient failures with capped, jittered exponential backoff
//! - Enforce a deadline on every attempt, cancelling the in-flight call
//! - Fail fast against destinations that keep failing (circuit breaking)
//! - Bound how many calls run concurrently, with FIFO admission
//! - Run batches of independent calls with partial-failure semantics
//!
//! The crate owns no transport: the operation is any future the caller
//! supplies (an HTTP request, an RPC, a database call), and outcomes are
//! classified through the [`CallError`] taxonomy.
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use callguard::circuit_breaker::{BreakerRegistry, CircuitBreakerConfig};
//! use callguard::retry::{resilient_call, CallOptions};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     // One registry per application, shared by dependency injection
//!     let registry = BreakerRegistry::new(CircuitBreakerConfig::default());
//!
//!     let options = CallOptions::for_destination("api.example.com")
//!         .with_breaker(registry.get_or_create("api.example.com"));
//!
//!     let body = resilient_call(&options, || async {
//!         fetch("https://api.example.com/health").await
//!     })
//!     .await?;
//!
//!     println!("{body}");
//!     Ok(())
//! }
//! ```
//!
//! ## Architecture
//!
//! The library is organized into several layers:
//!
//! - **Core**: Error taxonomy, failure classification, and the clock and
//!   observer seams
//! - **Circuit Breaker**: Per-destination fail-fast state machines and
//!   their registry
//! - **Retry**: Backoff calculation and the resilient call wrapper
//! - **Queue**: Bounded-concurrency FIFO admission
//! - **Batch**: Wave-based execution of independent operations
//! - **Audit**: Structured event records for compliance and monitoring

#![warn(missing_docs)]
#![warn(clippy::all)]
#![deny(unsafe_code)]

pub mod audit;
pub mod batch;
pub mod circuit_breaker;
pub mod core;
pub mod queue;
pub mod retry;

// Re-export commonly used types at the crate root
pub use crate::batch::{run_batch, BatchOptions, BatchOutcome};
pub use crate::circuit_breaker::{
    BreakerRegistry, BreakerState, CircuitBreaker, CircuitBreakerConfig,
};
pub use crate::core::{CallError, CallResult, RetryObserver};
pub use crate::queue::BoundedQueue;
pub use crate::retry::{resilient_call, CallOptions, RetryConfig};

/// Prelude module for convenient imports.
///
/// ```rust
/// use callguard::prelude::*;
/// ```
pub mod prelude {
    pub use crate::batch::{run_batch, BatchOptions, BatchOutcome};
    pub use crate::circuit_breaker::{
        BreakerRegistry, BreakerState, CircuitBreaker, CircuitBreakerConfig, FailurePolicy,
    };
    pub use crate::core::{CallError, CallResult, Clock, RetryObserver, TokioClock};
    pub use crate::queue::BoundedQueue;
    pub use crate::retry::{resilient_call, CallOptions, RetryConfig};
}
