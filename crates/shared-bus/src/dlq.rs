//! # Dead-Letter Store
//!
//! Per-topic holding area for payloads whose delivery failed.
//!
//! Partitions live in a sharded map keyed by topic: appends and drains on
//! one topic are serialised by that topic's shard lock, while unrelated
//! topics proceed in parallel. A drain takes the whole partition in one
//! critical section, so two concurrent drains never both see an entry.

use crate::error::HandlerError;
use crate::events::Payload;
use crate::topic::Topic;
use dashmap::DashMap;
use tracing::debug;

/// A payload waiting for redelivery.
#[derive(Debug, Clone, PartialEq)]
pub struct DeadLetterEntry<P> {
    /// The payload that failed.
    pub payload: P,
    /// Retries attempted so far. Never decreases while the entry is stored.
    pub retry_count: u32,
    /// Subscriber whose failure created the entry, if known.
    pub subscriber: Option<String>,
    /// Most recent failure.
    pub last_error: Option<String>,
}

impl<P> DeadLetterEntry<P> {
    /// Fresh entry with `retry_count = 0`.
    pub fn new(payload: P) -> Self {
        Self {
            payload,
            retry_count: 0,
            subscriber: None,
            last_error: None,
        }
    }

    /// The entry after one more failed attempt.
    #[must_use]
    pub fn after_failure(self, error: &HandlerError) -> Self {
        Self {
            retry_count: self.retry_count.saturating_add(1),
            last_error: Some(error.to_string()),
            ..self
        }
    }
}

/// Dead-letter partitions, one per topic.
pub struct DeadLetterStore<P> {
    partitions: DashMap<Topic, Vec<DeadLetterEntry<P>>>,
}

impl<P: Payload> DeadLetterStore<P> {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self {
            partitions: DashMap::new(),
        }
    }

    /// Append `{payload, retry_count: 0}` to the topic's partition.
    pub fn add_entry(&self, topic: &Topic, payload: P) {
        self.append(topic, DeadLetterEntry::new(payload));
    }

    /// Append a fresh entry carrying failure diagnostics.
    ///
    /// Returns the partition depth after the append.
    pub fn record_failure(
        &self,
        topic: &Topic,
        payload: P,
        subscriber: &str,
        error: &HandlerError,
    ) -> usize {
        let entry = DeadLetterEntry {
            subscriber: Some(subscriber.to_string()),
            last_error: Some(error.to_string()),
            ..DeadLetterEntry::new(payload)
        };
        self.append(topic, entry)
    }

    /// Put an entry back, keeping its retry count.
    ///
    /// Returns the partition depth after the append.
    pub fn requeue(&self, topic: &Topic, entry: DeadLetterEntry<P>) -> usize {
        self.append(topic, entry)
    }

    /// Remove and return every entry of the topic, oldest first.
    pub fn drain_entries(&self, topic: &Topic) -> Vec<DeadLetterEntry<P>> {
        let drained = self
            .partitions
            .get_mut(topic)
            .map(|mut partition| std::mem::take(&mut *partition))
            .unwrap_or_default();

        if !drained.is_empty() {
            debug!(topic = %topic, entries = drained.len(), "Dead-letter partition drained");
        }
        drained
    }

    /// Copy of the topic's entries without removing them.
    #[must_use]
    pub fn peek(&self, topic: &Topic) -> Vec<DeadLetterEntry<P>> {
        self.partitions
            .get(topic)
            .map(|partition| partition.value().clone())
            .unwrap_or_default()
    }

    /// Number of entries for `topic`.
    #[must_use]
    pub fn len(&self, topic: &Topic) -> usize {
        self.partitions.get(topic).map_or(0, |p| p.len())
    }

    /// Number of entries across all topics.
    #[must_use]
    pub fn total_len(&self) -> usize {
        self.partitions.iter().map(|p| p.len()).sum()
    }

    /// `true` if no topic holds an entry.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.total_len() == 0
    }

    /// Topics that have (or had) a partition, sorted by name.
    #[must_use]
    pub fn topics(&self) -> Vec<Topic> {
        let mut topics: Vec<Topic> = self.partitions.iter().map(|p| p.key().clone()).collect();
        topics.sort();
        topics
    }

    fn append(&self, topic: &Topic, entry: DeadLetterEntry<P>) -> usize {
        let retry_count = entry.retry_count;
        let mut partition = self.partitions.entry(topic.clone()).or_default();
        partition.push(entry);
        let depth = partition.len();
        drop(partition);

        debug!(topic = %topic, retry_count, depth, "Dead-letter entry added");
        depth
    }
}

impl<P: Payload> Default for DeadLetterStore<P> {
    fn default() -> Self {
        Self::new()
    }
}
