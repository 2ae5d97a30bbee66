//! # Retry Coordinator
//!
//! Drains a topic's dead-letter partition and redelivers each entry through
//! a caller-supplied handler.
//!
//! ## Pass Semantics
//!
//! ```text
//! drain(topic) ──→ [e1, e2, e3]          (snapshot; later failures wait
//!                    │                     for the next pass)
//!                    ↓
//!        retry_count ≥ max? ── yes ──→ drop + RetryExhausted report
//!                    │ no
//!                    ↓
//!             handler(payload)
//!              │            │
//!             ok          error
//!              │            │
//!          delivered   retry_count + 1 ≥ max? ── yes ──→ drop + report
//!                           │ no
//!                           ↓
//!                       requeue
//! ```
//!
//! The coordinator never schedules itself; the caller owns the cadence.

use crate::dlq::{DeadLetterEntry, DeadLetterStore};
use crate::error::BusError;
use crate::events::Payload;
use crate::observer::{BusObserver, NoopObserver};
use crate::subscriber::{invoke, Subscriber};
use crate::topic::Topic;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, error, info, warn};

/// Outcome of one retry pass over a topic.
#[derive(Debug, Clone)]
pub struct RetryReport<P> {
    /// Topic that was drained.
    pub topic: Topic,
    /// Entries delivered on this pass.
    pub redelivered: usize,
    /// Entries that failed again and were put back.
    pub requeued: usize,
    /// Entries dropped for good on this pass.
    pub exhausted: Vec<DeadLetterEntry<P>>,
}

impl<P> RetryReport<P> {
    fn new(topic: Topic) -> Self {
        Self {
            topic,
            redelivered: 0,
            requeued: 0,
            exhausted: Vec::new(),
        }
    }

    /// Number of entries drained and handled on this pass.
    #[must_use]
    pub fn processed(&self) -> usize {
        self.redelivered + self.requeued + self.exhausted.len()
    }

    /// `true` if the pass found nothing to do.
    #[must_use]
    pub fn is_noop(&self) -> bool {
        self.processed() == 0
    }
}

/// Bounded redelivery of dead-lettered payloads.
pub struct RetryCoordinator<P: Payload> {
    store: Arc<DeadLetterStore<P>>,
    observer: Arc<dyn BusObserver<P>>,
}

impl<P: Payload> RetryCoordinator<P> {
    /// Coordinator over `store` without an observer.
    #[must_use]
    pub fn new(store: Arc<DeadLetterStore<P>>) -> Self {
        Self::with_observer(store, Arc::new(NoopObserver))
    }

    /// Coordinator reporting to `observer`.
    #[must_use]
    pub fn with_observer(store: Arc<DeadLetterStore<P>>, observer: Arc<dyn BusObserver<P>>) -> Self {
        Self { store, observer }
    }

    /// The store this coordinator drains.
    #[must_use]
    pub fn store(&self) -> &Arc<DeadLetterStore<P>> {
        &self.store
    }

    /// Run one retry pass over `topic`.
    ///
    /// # Errors
    ///
    /// `BusError::InvalidArgument` if `topic` is not a valid topic name.
    /// Handler failures are never returned; they requeue or exhaust entries.
    pub async fn retry<H>(
        &self,
        topic: &str,
        handler: &H,
        max_retries: u32,
    ) -> Result<RetryReport<P>, BusError>
    where
        H: Subscriber<P> + ?Sized,
    {
        let topic = Topic::new(topic)?;
        Ok(self.retry_topic(&topic, handler, max_retries).await)
    }

    /// Run one retry pass over an already validated topic.
    pub async fn retry_topic<H>(&self, topic: &Topic, handler: &H, max_retries: u32) -> RetryReport<P>
    where
        H: Subscriber<P> + ?Sized,
    {
        let started = Instant::now();
        let mut report = RetryReport::new(topic.clone());

        let entries = self.store.drain_entries(topic);
        if entries.is_empty() {
            debug!(topic = %topic, "No dead-letter entries to retry");
            return report;
        }

        info!(
            topic = %topic,
            entries = entries.len(),
            max_retries,
            handler = handler.name(),
            "Retrying dead-letter entries"
        );

        for entry in entries {
            if entry.retry_count >= max_retries {
                self.exhaust(topic, entry, &mut report);
                continue;
            }

            match invoke(handler, entry.payload.clone()).await {
                Ok(()) => {
                    debug!(topic = %topic, retry_count = entry.retry_count, "Dead-letter entry redelivered");
                    self.observer.on_redelivered(topic, &entry);
                    report.redelivered += 1;
                }
                Err(err) => {
                    let entry = entry.after_failure(&err);
                    if entry.retry_count >= max_retries {
                        self.exhaust(topic, entry, &mut report);
                        continue;
                    }

                    warn!(
                        topic = %topic,
                        retry_count = entry.retry_count,
                        max_retries,
                        error = %err,
                        "Retry failed, entry requeued"
                    );
                    self.observer.on_requeued(topic, &entry);
                    self.store.requeue(topic, entry);
                    report.requeued += 1;
                }
            }
        }

        self.observer
            .on_dead_letter_depth(topic, self.store.len(topic));
        self.observer.on_retry_pass(&report, started.elapsed());

        info!(
            topic = %topic,
            redelivered = report.redelivered,
            requeued = report.requeued,
            exhausted = report.exhausted.len(),
            "Retry pass complete"
        );
        report
    }

    fn exhaust(&self, topic: &Topic, entry: DeadLetterEntry<P>, report: &mut RetryReport<P>) {
        let exhausted = BusError::RetryExhausted {
            topic: topic.to_string(),
            retry_count: entry.retry_count,
        };
        error!(
            topic = %topic,
            retry_count = entry.retry_count,
            subscriber = entry.subscriber.as_deref().unwrap_or("unknown"),
            last_error = entry.last_error.as_deref().unwrap_or(""),
            payload = ?entry.payload,
            "{exhausted}; entry dropped"
        );
        self.observer.on_retry_exhausted(topic, &entry);
        report.exhausted.push(entry);
    }
}
