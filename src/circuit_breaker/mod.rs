//! Circuit breaker implementation for destination resilience.
//!
//! The circuit breaker pattern prevents cascading failures by temporarily
//! stopping traffic to failing destinations and periodically probing them
//! to detect recovery.
//!
//! ## States
//!
//! - **Closed**: Normal operation; calls pass through.
//! - **Open**: Destination is failing; calls are rejected immediately.
//! - **Half-Open**: Probing the destination to see if it has recovered.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use callguard::circuit_breaker::{BreakerRegistry, CircuitBreakerConfig};
//! use std::time::Duration;
//!
//! let registry = BreakerRegistry::new(
//!     CircuitBreakerConfig::default()
//!         .with_failure_threshold(5)
//!         .with_reset_timeout(Duration::from_secs(30)),
//! );
//!
//! let breaker = registry.get_or_create("api.example.com");
//! let result = breaker.call(|| async { perform_request().await }).await;
//! ```

mod breaker;
mod config;
mod registry;
mod state;

pub use breaker::CircuitBreaker;
pub use config::{CircuitBreakerConfig, FailurePolicy};
pub use registry::BreakerRegistry;
pub use state::{BreakerMetrics, BreakerSnapshot, BreakerState};
