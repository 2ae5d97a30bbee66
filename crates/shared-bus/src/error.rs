//! # Bus Errors
//!
//! Two error families flow through the bus:
//!
//! - [`BusError`] is what callers of `publish`/`subscribe`/`retry` can see.
//!   Only argument validation and runtime availability ever reach a
//!   publisher; the other variants are built for logging and reporting.
//! - [`HandlerError`] is what a subscriber returns when it cannot consume a
//!   payload. The bus converts it into a dead-letter entry.

use thiserror::Error;

/// Errors surfaced by the event bus.
#[derive(Debug, Error)]
pub enum BusError {
    /// Malformed publish/subscribe/retry call. Fatal to the caller, never retried.
    #[error("Invalid argument: {reason}")]
    InvalidArgument { reason: String },

    /// A subscriber failed during normal delivery.
    ///
    /// Recovered locally by isolation and recorded to the dead-letter store.
    #[error("Subscriber '{subscriber}' failed on topic '{topic}': {source}")]
    HandlerFailure {
        topic: String,
        subscriber: String,
        #[source]
        source: HandlerError,
    },

    /// A dead-letter entry spent its retry budget and was dropped.
    #[error("Retry budget exhausted on topic '{topic}' after {retry_count} retries")]
    RetryExhausted { topic: String, retry_count: u32 },

    /// `publish` was called outside of a Tokio runtime.
    #[error("No Tokio runtime available to dispatch events")]
    RuntimeUnavailable,

    /// The dispatch task went away before reporting completion.
    #[error("Dispatch on topic '{topic}' was aborted before completion")]
    DispatchAborted { topic: String },
}

impl BusError {
    /// Shorthand for [`BusError::InvalidArgument`].
    pub fn invalid(reason: impl Into<String>) -> Self {
        Self::InvalidArgument {
            reason: reason.into(),
        }
    }
}

/// Failure reported by a subscriber.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum HandlerError {
    /// A downstream sink (audit log, analytics store) could not be written.
    #[error("Sink unavailable: {0}")]
    SinkUnavailable(String),

    /// The subscriber refused the payload.
    #[error("Payload rejected: {0}")]
    Rejected(String),

    /// The subscriber panicked; caught at the bus boundary.
    #[error("Subscriber panicked: {0}")]
    Panicked(String),

    /// Any other failure.
    #[error("{0}")]
    Other(String),
}

impl HandlerError {
    /// Short label for metrics and logs.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::SinkUnavailable(_) => "sink_unavailable",
            Self::Rejected(_) => "rejected",
            Self::Panicked(_) => "panicked",
            Self::Other(_) => "other",
        }
    }
}
