//! Structured audit logging for call outcomes and breaker transitions.
//!
//! This module provides functions for emitting structured audit events
//! using the `tracing` crate under the `callguard::audit` target. Events
//! can be captured by any tracing subscriber (JSON file, OpenTelemetry,
//! etc.) without this crate owning a sink.

mod events;

pub use events::{
    emit_breaker_transition, emit_call_completed, emit_call_rejected, emit_retry_scheduled,
    AuditEvent, BreakerAuditEvent, CallAuditEvent, RejectionAuditEvent, RetryAuditEvent,
};
