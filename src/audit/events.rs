//! Audit event types and emission functions.

use crate::core::CallError;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use uuid::Uuid;

/// Base trait for audit events.
pub trait AuditEvent: Serialize {
    /// Returns the event type name.
    fn event_type(&self) -> &'static str;

    /// Returns the timestamp of the event.
    fn timestamp(&self) -> DateTime<Utc>;

    /// Returns the event as a JSON value, for embedding in log pipelines.
    fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or(serde_json::Value::Null)
    }
}

/// Audit event for a scheduled retry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryAuditEvent {
    /// Unique event ID.
    pub event_id: Uuid,

    /// Timestamp of the event.
    pub timestamp: DateTime<Utc>,

    /// ID of the call being retried.
    pub call_id: Uuid,

    /// Destination of the call, if labeled.
    pub destination: Option<String>,

    /// The failed attempt number (0-based).
    pub attempt: u32,

    /// How long the wrapper will wait before the next attempt.
    pub delay_ms: u64,

    /// Rendered error that triggered the retry.
    pub error: String,
}

impl RetryAuditEvent {
    /// Creates a new retry event.
    pub fn new(
        call_id: Uuid,
        destination: Option<&str>,
        error: &CallError,
        attempt: u32,
        delay: Duration,
    ) -> Self {
        Self {
            event_id: Uuid::new_v4(),
            timestamp: Utc::now(),
            call_id,
            destination: destination.map(String::from),
            attempt,
            delay_ms: delay.as_millis() as u64,
            error: error.to_string(),
        }
    }
}

impl AuditEvent for RetryAuditEvent {
    fn event_type(&self) -> &'static str {
        "retry_scheduled"
    }

    fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }
}

/// Audit event for a circuit breaker state transition.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BreakerAuditEvent {
    /// Unique event ID.
    pub event_id: Uuid,

    /// Timestamp of the event.
    pub timestamp: DateTime<Utc>,

    /// Destination whose breaker transitioned.
    pub destination: String,

    /// State before the transition.
    pub from_state: String,

    /// State after the transition.
    pub to_state: String,
}

impl BreakerAuditEvent {
    /// Creates a new breaker transition event.
    pub fn new(destination: &str, from_state: &str, to_state: &str) -> Self {
        Self {
            event_id: Uuid::new_v4(),
            timestamp: Utc::now(),
            destination: destination.to_string(),
            from_state: from_state.to_string(),
            to_state: to_state.to_string(),
        }
    }
}

impl AuditEvent for BreakerAuditEvent {
    fn event_type(&self) -> &'static str {
        "breaker_transition"
    }

    fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }
}

/// Audit event for a call rejected by an open circuit.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RejectionAuditEvent {
    /// Unique event ID.
    pub event_id: Uuid,

    /// Timestamp of the event.
    pub timestamp: DateTime<Utc>,

    /// Destination that rejected the call.
    pub destination: String,

    /// Why the call was rejected.
    pub reason: String,
}

impl RejectionAuditEvent {
    /// Creates a new rejection event.
    pub fn new(destination: &str, reason: &str) -> Self {
        Self {
            event_id: Uuid::new_v4(),
            timestamp: Utc::now(),
            destination: destination.to_string(),
            reason: reason.to_string(),
        }
    }
}

impl AuditEvent for RejectionAuditEvent {
    fn event_type(&self) -> &'static str {
        "call_rejected"
    }

    fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }
}

/// Audit event for a completed resilient call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CallAuditEvent {
    /// Unique event ID.
    pub event_id: Uuid,

    /// Timestamp of the event.
    pub timestamp: DateTime<Utc>,

    /// ID of the completed call.
    pub call_id: Uuid,

    /// Destination of the call, if labeled.
    pub destination: Option<String>,

    /// Number of attempts made, including the first.
    pub attempts: u32,

    /// Total wall-clock duration across all attempts and waits.
    pub duration_ms: u64,

    /// Terminal outcome, `success` or `failure`.
    pub outcome: String,
}

impl CallAuditEvent {
    /// Creates a new call completion event.
    pub fn new(
        call_id: Uuid,
        destination: Option<&str>,
        attempts: u32,
        duration: Duration,
        outcome: &str,
    ) -> Self {
        Self {
            event_id: Uuid::new_v4(),
            timestamp: Utc::now(),
            call_id,
            destination: destination.map(String::from),
            attempts,
            duration_ms: duration.as_millis() as u64,
            outcome: outcome.to_string(),
        }
    }
}

impl AuditEvent for CallAuditEvent {
    fn event_type(&self) -> &'static str {
        "call_completed"
    }

    fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }
}

/// Emits an audit record for a scheduled retry.
pub fn emit_retry_scheduled(
    call_id: Uuid,
    destination: Option<&str>,
    error: &CallError,
    attempt: u32,
    delay: Duration,
) {
    let event = RetryAuditEvent::new(call_id, destination, error, attempt, delay);
    tracing::info!(
        target: "callguard::audit",
        event_type = event.event_type(),
        event_id = %event.event_id,
        call_id = %event.call_id,
        destination = ?event.destination,
        attempt = event.attempt,
        delay_ms = event.delay_ms,
        error = %event.error,
        "Retry scheduled"
    );
}

/// Emits an audit record for a circuit breaker state transition.
pub fn emit_breaker_transition(destination: &str, from_state: &str, to_state: &str) {
    let event = BreakerAuditEvent::new(destination, from_state, to_state);
    tracing::info!(
        target: "callguard::audit",
        event_type = event.event_type(),
        event_id = %event.event_id,
        destination = %event.destination,
        from_state = %event.from_state,
        to_state = %event.to_state,
        "Breaker transition"
    );
}

/// Emits an audit record for a call rejected by an open circuit.
pub fn emit_call_rejected(destination: &str, reason: &str) {
    let event = RejectionAuditEvent::new(destination, reason);
    tracing::info!(
        target: "callguard::audit",
        event_type = event.event_type(),
        event_id = %event.event_id,
        destination = %event.destination,
        reason = %event.reason,
        "Call rejected"
    );
}

/// Emits an audit record for a completed resilient call.
pub fn emit_call_completed(
    call_id: Uuid,
    destination: Option<&str>,
    attempts: u32,
    duration: Duration,
    outcome: &str,
) {
    let event = CallAuditEvent::new(call_id, destination, attempts, duration, outcome);
    tracing::info!(
        target: "callguard::audit",
        event_type = event.event_type(),
        event_id = %event.event_id,
        call_id = %event.call_id,
        destination = ?event.destination,
        attempts = event.attempts,
        duration_ms = event.duration_ms,
        outcome = %event.outcome,
        "Call completed"
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_types() {
        let retry = RetryAuditEvent::new(
            Uuid::new_v4(),
            Some("api.example.com"),
            &CallError::server("api.example.com", 500),
            0,
            Duration::from_millis(300),
        );
        assert_eq!(retry.event_type(), "retry_scheduled");

        let transition = BreakerAuditEvent::new("api.example.com", "closed", "open");
        assert_eq!(transition.event_type(), "breaker_transition");
    }

    #[test]
    fn test_to_json_carries_fields() {
        let event = BreakerAuditEvent::new("api.example.com", "closed", "open");
        let json = event.to_json();

        assert_eq!(json["destination"], "api.example.com");
        assert_eq!(json["from_state"], "closed");
        assert_eq!(json["to_state"], "open");
    }

    #[test]
    fn test_call_event_duration() {
        let event = CallAuditEvent::new(
            Uuid::new_v4(),
            None,
            4,
            Duration::from_millis(1234),
            "success",
        );
        assert_eq!(event.duration_ms, 1234);
        assert_eq!(event.attempts, 4);
    }
}
