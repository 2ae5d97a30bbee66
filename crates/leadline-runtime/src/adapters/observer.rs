//! # Prometheus Bus Observer
//!
//! Bridges bus and retry callbacks to the `leadline-telemetry` metrics.

use std::time::Duration;

use leadline_telemetry::{
    DEAD_LETTER_DEPTH, EVENTS_PUBLISHED, HANDLER_FAILURES, RETRY_EXHAUSTED, RETRY_PASS_DURATION,
    RETRY_REDELIVERED, RETRY_REQUEUED,
};
use shared_bus::{BusObserver, DeadLetterEntry, HandlerError, RetryReport, Topic};

/// Records bus activity as Prometheus metrics, labelled by topic.
#[derive(Debug, Clone, Copy, Default)]
pub struct PrometheusObserver;

impl<P> BusObserver<P> for PrometheusObserver {
    fn on_published(&self, topic: &Topic, _subscribers: usize) {
        EVENTS_PUBLISHED.with_label_values(&[topic.as_str()]).inc();
    }

    fn on_handler_failure(&self, topic: &Topic, _subscriber: &str, error: &HandlerError) {
        HANDLER_FAILURES
            .with_label_values(&[topic.as_str(), error.kind()])
            .inc();
    }

    fn on_dead_letter_depth(&self, topic: &Topic, depth: usize) {
        DEAD_LETTER_DEPTH
            .with_label_values(&[topic.as_str()])
            .set(i64::try_from(depth).unwrap_or(i64::MAX));
    }

    fn on_redelivered(&self, topic: &Topic, _entry: &DeadLetterEntry<P>) {
        RETRY_REDELIVERED.with_label_values(&[topic.as_str()]).inc();
    }

    fn on_requeued(&self, topic: &Topic, _entry: &DeadLetterEntry<P>) {
        RETRY_REQUEUED.with_label_values(&[topic.as_str()]).inc();
    }

    fn on_retry_exhausted(&self, topic: &Topic, _entry: &DeadLetterEntry<P>) {
        RETRY_EXHAUSTED.with_label_values(&[topic.as_str()]).inc();
    }

    fn on_retry_pass(&self, report: &RetryReport<P>, elapsed: Duration) {
        if report.is_noop() {
            return;
        }
        RETRY_PASS_DURATION
            .with_label_values(&[report.topic.as_str()])
            .observe(elapsed.as_secs_f64());
    }
}
