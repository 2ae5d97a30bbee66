//! # Bus Observer
//!
//! Hook for the metrics/logging collaborator. The bus already logs every
//! failure through `tracing`; an observer adds counters and gauges on top.
//! All methods default to no-ops.

use crate::dlq::DeadLetterEntry;
use crate::error::HandlerError;
use crate::retry::RetryReport;
use crate::topic::Topic;
use std::time::Duration;

/// Callbacks fired by the bus and the retry coordinator.
pub trait BusObserver<P>: Send + Sync {
    /// An event was accepted for dispatch.
    fn on_published(&self, _topic: &Topic, _subscribers: usize) {}

    /// A subscriber failed during normal delivery.
    fn on_handler_failure(&self, _topic: &Topic, _subscriber: &str, _error: &HandlerError) {}

    /// The dead-letter partition of `topic` now holds `depth` entries.
    fn on_dead_letter_depth(&self, _topic: &Topic, _depth: usize) {}

    /// A dead-letter entry was delivered by a retry.
    fn on_redelivered(&self, _topic: &Topic, _entry: &DeadLetterEntry<P>) {}

    /// A dead-letter entry failed again and went back into the store.
    fn on_requeued(&self, _topic: &Topic, _entry: &DeadLetterEntry<P>) {}

    /// A dead-letter entry spent its retry budget and was dropped.
    fn on_retry_exhausted(&self, _topic: &Topic, _entry: &DeadLetterEntry<P>) {}

    /// A retry pass finished.
    fn on_retry_pass(&self, _report: &RetryReport<P>, _elapsed: Duration) {}
}

/// Observer that ignores everything.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopObserver;

impl<P> BusObserver<P> for NoopObserver {}
