//! Audit events emitted once per tool call.

use std::fmt;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use capgate_primitives::{CallId, GatewayError, HandlerError, PrincipalId};
use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{info, warn};

/// Result of a call as recorded for audit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum AuditOutcome {
    /// Handler ran and returned a value.
    Success,
    /// Token rejected or meta-capability missing.
    Denied {
        /// Internal reason code; never sent to the caller.
        reason: &'static str,
    },
    /// Tool absent or not visible to the caller.
    NotFound,
    /// Arguments failed schema validation.
    InvalidArguments {
        /// Offending field.
        field: String,
    },
    /// Handler reported a failure.
    HandlerFailed,
    /// Handler exceeded its deadline.
    Timeout,
    /// Caller cancelled the call.
    Cancelled,
}

impl AuditOutcome {
    /// Stable code for the outcome.
    #[must_use]
    pub const fn code(&self) -> &'static str {
        match self {
            Self::Success => "ok",
            Self::Denied { .. } => "denied",
            Self::NotFound => "not_found",
            Self::InvalidArguments { .. } => "invalid_arguments",
            Self::HandlerFailed => "handler_failed",
            Self::Timeout => "timeout",
            Self::Cancelled => "cancelled",
        }
    }

    /// Returns true for successful calls.
    #[must_use]
    pub const fn is_success(&self) -> bool {
        matches!(self, Self::Success)
    }
}

impl From<&GatewayError> for AuditOutcome {
    fn from(err: &GatewayError) -> Self {
        match err {
            GatewayError::Auth(auth) => Self::Denied {
                reason: auth.reason_code(),
            },
            GatewayError::NotFound(_) => Self::NotFound,
            GatewayError::Validation(validation) => Self::InvalidArguments {
                field: validation.field.clone(),
            },
            GatewayError::Handler(HandlerError::Failed { .. }) => Self::HandlerFailed,
            GatewayError::Handler(HandlerError::Timeout) => Self::Timeout,
            GatewayError::Handler(HandlerError::Cancelled) => Self::Cancelled,
        }
    }
}

/// Structured record of a single `tools.call`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AuditEvent {
    /// Correlation id shared with the handler context.
    pub call_id: CallId,
    /// Verified principal, absent when the token was rejected.
    pub principal: Option<PrincipalId>,
    /// Requested tool name as supplied by the caller.
    pub tool: String,
    /// What happened.
    pub outcome: AuditOutcome,
    /// Time spent inside the gateway.
    #[serde(with = "duration_millis")]
    pub duration: Duration,
    /// When the call was received.
    pub timestamp: DateTime<Utc>,
}

mod duration_millis {
    use std::time::Duration;

    use serde::Serializer;

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(u64::try_from(value.as_millis()).unwrap_or(u64::MAX))
    }
}

/// Receives audit events. Implementations must not block.
pub trait AuditSink: Send + Sync {
    /// Records the supplied event.
    fn record(&self, event: &AuditEvent);
}

/// Sink that writes events to the tracing system.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingAuditSink;

impl AuditSink for TracingAuditSink {
    fn record(&self, event: &AuditEvent) {
        let principal = event.principal.as_ref().map(PrincipalId::as_str);
        let duration_ms = u64::try_from(event.duration.as_millis()).unwrap_or(u64::MAX);
        if event.outcome.is_success() {
            info!(
                call_id = %event.call_id,
                principal,
                tool = %event.tool,
                outcome = event.outcome.code(),
                duration_ms,
                "tool call audited"
            );
        } else {
            warn!(
                call_id = %event.call_id,
                principal,
                tool = %event.tool,
                outcome = event.outcome.code(),
                detail = ?event.outcome,
                duration_ms,
                "tool call audited"
            );
        }
    }
}

/// Sink that keeps every event in memory.
#[derive(Debug, Default)]
pub struct CollectingAuditSink {
    events: Mutex<Vec<AuditEvent>>,
}

impl CollectingAuditSink {
    /// Creates an empty collector.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a snapshot of the recorded events.
    #[must_use]
    pub fn events(&self) -> Vec<AuditEvent> {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Removes and returns the recorded events.
    pub fn drain(&self) -> Vec<AuditEvent> {
        std::mem::take(&mut *self.events.lock().unwrap_or_else(PoisonError::into_inner))
    }
}

impl AuditSink for CollectingAuditSink {
    fn record(&self, event: &AuditEvent) {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(event.clone());
    }
}

/// Sink that forwards events to several sinks in order.
#[derive(Default, Clone)]
pub struct CompositeAuditSink {
    sinks: Vec<Arc<dyn AuditSink>>,
}

impl fmt::Debug for CompositeAuditSink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CompositeAuditSink")
            .field("sinks", &self.sinks.len())
            .finish()
    }
}

impl CompositeAuditSink {
    /// Creates a composite sink from the supplied list.
    #[must_use]
    pub fn new<I>(sinks: I) -> Self
    where
        I: IntoIterator<Item = Arc<dyn AuditSink>>,
    {
        Self {
            sinks: sinks.into_iter().collect(),
        }
    }

    /// Adds a sink to the set.
    pub fn push(&mut self, sink: Arc<dyn AuditSink>) {
        self.sinks.push(sink);
    }
}

impl AuditSink for CompositeAuditSink {
    fn record(&self, event: &AuditEvent) {
        for sink in &self.sinks {
            sink.record(event);
        }
    }
}
