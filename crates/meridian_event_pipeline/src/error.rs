//! Error types for the event pipeline.
//!
//! Each layer gets its own error enum so callers can match on the failure
//! class without string inspection. Validation failures are NOT errors - they
//! are returned as data in a `ValidationResult` - so nothing here covers a
//! payload merely failing its schema checks inside the validator itself.

use uuid::Uuid;

/// Errors surfaced by the ingestion path of the pipeline facade.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    /// Event type string is not of the form `<domain>.<action>`.
    #[error("invalid event type '{0}': expected '<domain>.<action>'")]
    InvalidEventType(String),
    /// Payload failed schema validation; per-field messages included.
    #[error("validation failed for '{event_type}': {}", .errors.join("; "))]
    Validation {
        event_type: String,
        errors: Vec<String>,
    },
    /// A domain transformer rejected the payload.
    #[error(transparent)]
    Transform(#[from] TransformError),
    /// The job could not be handed to the queue backing store.
    #[error(transparent)]
    Enqueue(#[from] QueueError),
    /// A bus publish failed (remote transport unavailable).
    #[error(transparent)]
    Publish(#[from] BusError),
}

impl PipelineError {
    /// True for failures the producer can fix by correcting the payload.
    pub fn is_client_fault(&self) -> bool {
        matches!(
            self,
            PipelineError::InvalidEventType(_) | PipelineError::Validation { .. }
        )
    }
}

/// A domain transformer failed on a specific event.
///
/// Transformer failures abort processing of that one event and propagate to
/// the caller; they never corrupt registry state for other events.
#[derive(Debug, thiserror::Error)]
#[error("transformer for domain '{domain}' failed on '{event_type}': {reason}")]
pub struct TransformError {
    pub domain: String,
    pub event_type: String,
    pub reason: String,
}

impl TransformError {
    pub fn new(
        domain: impl Into<String>,
        event_type: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        Self {
            domain: domain.into(),
            event_type: event_type.into(),
            reason: reason.into(),
        }
    }
}

/// Errors from the queue router and its backing store.
#[derive(Debug, thiserror::Error)]
pub enum QueueError {
    /// No queue is registered under this name. Routing itself never produces
    /// this (unknown domains fall back to the system queue); it only occurs
    /// when a caller addresses a queue directly.
    #[error("no queue named '{0}'")]
    UnknownQueue(String),
    /// The referenced job does not exist in the store.
    #[error("unknown job {0}")]
    UnknownJob(Uuid),
    /// The queue has been shut down and is no longer accepting jobs.
    #[error("queue '{0}' is not accepting jobs")]
    NotAccepting(String),
}

/// Errors from the broadcast bus.
#[derive(Debug, thiserror::Error)]
pub enum BusError {
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    /// The remote delivery path rejected a forward. Local handlers have
    /// already been invoked by the time this is raised.
    #[error("transport failure on channel '{channel}': {reason}")]
    Transport { channel: String, reason: String },
    /// A subscriber handler returned an error. Dispatch to the remaining
    /// handlers is unaffected.
    #[error("handler '{handler}' failed: {reason}")]
    Handler { handler: String, reason: String },
}

/// A domain processor failed while executing a job.
///
/// Raised inside workers only; the queue retries per its policy and marks the
/// job terminally failed once attempts are exhausted.
#[derive(Debug, thiserror::Error)]
#[error("processing failed: {reason}")]
pub struct ProcessError {
    pub reason: String,
}

impl ProcessError {
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }
}
