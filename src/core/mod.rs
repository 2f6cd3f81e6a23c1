//! Core types and traits for the callguard library.
//!
//! This module provides the fundamental building blocks used throughout
//! the library:
//!
//! - [`error`] - Structured error types and failure classification
//! - [`traits`] - The `Clock` and `RetryObserver` seams

pub mod error;
pub mod traits;

// Re-export commonly used types at the core level
pub use error::{CallError, CallResult};
pub use traits::{
    ArcClock, ArcObserver, Clock, ManualClock, RetryObserver, TokioClock, TracingRetryObserver,
};
