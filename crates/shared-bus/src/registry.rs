//! # Topic Registry
//!
//! Maps each topic to its subscribers in registration order.

use crate::events::Payload;
use crate::subscriber::Subscriber;
use crate::topic::Topic;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use tracing::debug;
use uuid::Uuid;

/// Handle identifying one registration, used to unsubscribe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(Uuid);

impl SubscriptionId {
    fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl fmt::Display for SubscriptionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

struct Registration<P: Payload> {
    id: SubscriptionId,
    subscriber: Arc<dyn Subscriber<P>>,
}

/// Topic name to ordered subscriber list.
///
/// Lookups hand out a snapshot, so a publish never holds the lock while
/// handlers run.
pub struct TopicRegistry<P: Payload> {
    topics: RwLock<HashMap<Topic, Vec<Registration<P>>>>,
}

impl<P: Payload> TopicRegistry<P> {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self {
            topics: RwLock::new(HashMap::new()),
        }
    }

    /// Append a subscriber to the topic's list.
    pub fn subscribe(&self, topic: Topic, subscriber: Arc<dyn Subscriber<P>>) -> SubscriptionId {
        let id = SubscriptionId::new();
        let name = subscriber.name().to_string();

        let position = {
            let mut topics = self.topics.write();
            let registrations = topics.entry(topic.clone()).or_default();
            registrations.push(Registration { id, subscriber });
            registrations.len()
        };

        debug!(topic = %topic, subscriber = %name, id = %id, position, "Subscriber registered");
        id
    }

    /// Subscribers for `topic` in registration order (empty if none).
    #[must_use]
    pub fn subscribers(&self, topic: &Topic) -> Vec<Arc<dyn Subscriber<P>>> {
        self.topics
            .read()
            .get(topic)
            .map(|registrations| {
                registrations
                    .iter()
                    .map(|r| Arc::clone(&r.subscriber))
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Remove one registration. Returns `false` if it was not found.
    ///
    /// The topic itself stays known to the registry.
    pub fn unsubscribe(&self, topic: &Topic, id: SubscriptionId) -> bool {
        let mut topics = self.topics.write();
        let Some(registrations) = topics.get_mut(topic) else {
            return false;
        };

        let before = registrations.len();
        registrations.retain(|r| r.id != id);
        let removed = registrations.len() != before;

        if removed {
            debug!(topic = %topic, id = %id, "Subscriber removed");
        }
        removed
    }

    /// Number of subscribers on `topic`.
    #[must_use]
    pub fn subscriber_count(&self, topic: &Topic) -> usize {
        self.topics.read().get(topic).map_or(0, Vec::len)
    }

    /// All topics that ever had a subscriber, sorted by name.
    #[must_use]
    pub fn topics(&self) -> Vec<Topic> {
        let mut topics: Vec<Topic> = self.topics.read().keys().cloned().collect();
        topics.sort();
        topics
    }
}

impl<P: Payload> Default for TopicRegistry<P> {
    fn default() -> Self {
        Self::new()
    }
}
