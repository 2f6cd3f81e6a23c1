//! Error types for the callguard library.
//!
//! This module provides structured, typed errors for every failure class an
//! outbound call can hit. The library never panics; all errors are returned
//! as `Result` values.

use std::time::Duration;
use thiserror::Error;

/// The main error type for resilient call operations.
///
/// Each variant carries enough context to decide whether the failure is
/// worth retrying and whether it should count against the destination's
/// circuit breaker.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CallError {
    /// Connectivity to the destination failed (DNS, connect, reset, ...).
    #[error("network error calling '{destination}': {message}")]
    Network {
        /// Destination that could not be reached.
        destination: String,
        /// Human-readable description of the failure.
        message: String,
    },

    /// The attempt did not settle before its deadline.
    #[error("call timed out after {elapsed:?}")]
    Timeout {
        /// How long the attempt ran before being cancelled.
        elapsed: Duration,
    },

    /// The destination answered with a server-side error (HTTP 5xx).
    #[error("server error from '{destination}': status {status}")]
    Server {
        /// Destination that answered.
        destination: String,
        /// The status code returned.
        status: u16,
    },

    /// The destination is rate limiting us (HTTP 429).
    #[error("rate limited by '{destination}': retry after {retry_after:?}")]
    RateLimited {
        /// Destination applying the limit.
        destination: String,
        /// Server-provided wait hint, if any.
        retry_after: Option<Duration>,
    },

    /// The request itself was rejected (HTTP 4xx other than 429).
    #[error("client error from '{destination}': status {status}")]
    Client {
        /// Destination that rejected the request.
        destination: String,
        /// The status code returned.
        status: u16,
    },

    /// The circuit breaker for this destination is open.
    #[error("circuit breaker open for '{destination}'")]
    CircuitOpen {
        /// Destination with the open circuit.
        destination: String,
        /// When the circuit might admit traffic again (if known).
        recovery_hint: Option<String>,
    },

    /// The caller cancelled the operation.
    #[error("call was cancelled by the caller")]
    Cancelled,

    /// An internal error occurred.
    #[error("internal error: {message}")]
    Internal {
        /// Description of the internal error.
        message: String,
    },

    /// Configuration error.
    #[error("configuration error: {message}")]
    Configuration {
        /// Description of the configuration error.
        message: String,
    },
}

impl CallError {
    /// Returns `true` if this error is worth retrying.
    ///
    /// Connectivity failures, timeouts, server errors, and rate limiting
    /// are transient; everything else is terminal for the current call.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::Network { .. }
                | Self::Timeout { .. }
                | Self::Server { .. }
                | Self::RateLimited { .. }
        )
    }

    /// Returns `true` if this error suggests the destination itself is
    /// unhealthy, as opposed to this particular request being bad.
    pub fn indicates_unhealthy_destination(&self) -> bool {
        matches!(
            self,
            Self::Network { .. } | Self::Timeout { .. } | Self::Server { .. }
        )
    }

    /// Returns the destination name if this error is associated with one.
    pub fn destination(&self) -> Option<&str> {
        match self {
            Self::Network { destination, .. }
            | Self::Server { destination, .. }
            | Self::RateLimited { destination, .. }
            | Self::Client { destination, .. }
            | Self::CircuitOpen { destination, .. } => Some(destination),
            _ => None,
        }
    }

    /// Returns the server-provided wait hint for a rate-limited call.
    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            Self::RateLimited { retry_after, .. } => *retry_after,
            _ => None,
        }
    }

    /// Maps an HTTP status code to an error, if the status is an error.
    ///
    /// Statuses below 400 (success and redirects) map to `None`. A 429 maps
    /// to [`CallError::RateLimited`] without a wait hint; use
    /// [`CallError::rate_limited`] directly when the response carried a
    /// `Retry-After` header.
    pub fn from_status(destination: impl Into<String>, status: u16) -> Option<Self> {
        match status {
            0..=399 => None,
            429 => Some(Self::RateLimited {
                destination: destination.into(),
                retry_after: None,
            }),
            400..=499 => Some(Self::Client {
                destination: destination.into(),
                status,
            }),
            _ => Some(Self::Server {
                destination: destination.into(),
                status,
            }),
        }
    }

    /// Creates a `Network` error.
    pub fn network(destination: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Network {
            destination: destination.into(),
            message: message.into(),
        }
    }

    /// Creates a `Timeout` error.
    pub fn timeout(elapsed: Duration) -> Self {
        Self::Timeout { elapsed }
    }

    /// Creates a `Server` error.
    pub fn server(destination: impl Into<String>, status: u16) -> Self {
        Self::Server {
            destination: destination.into(),
            status,
        }
    }

    /// Creates a `RateLimited` error with an optional wait hint.
    pub fn rate_limited(destination: impl Into<String>, retry_after: Option<Duration>) -> Self {
        Self::RateLimited {
            destination: destination.into(),
            retry_after,
        }
    }

    /// Creates a `Client` error.
    pub fn client(destination: impl Into<String>, status: u16) -> Self {
        Self::Client {
            destination: destination.into(),
            status,
        }
    }

    /// Creates a `CircuitOpen` error.
    pub fn circuit_open(destination: impl Into<String>, recovery_hint: Option<String>) -> Self {
        Self::CircuitOpen {
            destination: destination.into(),
            recovery_hint,
        }
    }

    /// Creates an `Internal` error.
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// Creates a `Configuration` error.
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }
}

/// A specialized `Result` type for resilient call operations.
pub type CallResult<T> = Result<T, CallError>;
