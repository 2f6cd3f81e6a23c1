//! Retrying, timeout-bounded call execution.
//!
//! The [`resilient_call`] wrapper drives a caller-supplied asynchronous
//! operation through a per-attempt deadline and a classified retry loop,
//! optionally delegating fail-fast decisions to a
//! [`CircuitBreaker`](crate::circuit_breaker::CircuitBreaker).

mod backoff;
mod call;

pub use backoff::RetryConfig;
pub use call::{resilient_call, CallOptions};
