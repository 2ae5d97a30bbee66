//! # Event Publisher
//!
//! The publishing side of the bus and the [`EventBus`] that ties the
//! registry, the dead-letter store and the retry coordinator together.
//!
//! ## Dispatch
//!
//! ```text
//! publish(topic, payload)
//!        │  validate topic, snapshot subscribers
//!        ↓
//!  spawned dispatch task ── polls every handler concurrently,
//!        │                  first poll in registration order
//!        ├── S1 ok
//!        ├── S2 error/panic ──→ DeadLetterStore.record_failure
//!        └── S3 ok
//!        ↓
//!  DeliveryReport ──→ Dispatch::completed()   (optional to await)
//! ```

use crate::dlq::DeadLetterStore;
use crate::error::{BusError, HandlerError};
use crate::events::{Payload, TopicKeyed};
use crate::observer::{BusObserver, NoopObserver};
use crate::registry::{SubscriptionId, TopicRegistry};
use crate::retry::{RetryCoordinator, RetryReport};
use crate::subscriber::{invoke, ChannelSubscriber, EventStream, FnSubscriber, Subscriber};
use crate::topic::Topic;
use futures::future::join_all;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::runtime::Handle;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info, warn};

/// Trait for publishing events to the bus.
///
/// Producers depend on this rather than on [`EventBus`] so they can be
/// tested against a stub.
pub trait EventPublisher<P: Payload>: Send + Sync {
    /// Publish `payload` on `topic`.
    ///
    /// Returns once every subscriber has been scheduled, not once they have
    /// completed. Subscriber failures never surface here.
    fn publish(&self, topic: &str, payload: P) -> Result<Dispatch, BusError>;

    /// Get the total number of events published.
    fn events_published(&self) -> u64;
}

/// Per-publish delivery summary.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeliveryReport {
    pub topic: Topic,
    /// Subscribers that returned success.
    pub delivered: usize,
    /// Subscribers whose failure went to the dead-letter store.
    pub failed: usize,
}

impl DeliveryReport {
    /// Number of subscribers invoked.
    #[must_use]
    pub fn subscribers(&self) -> usize {
        self.delivered + self.failed
    }

    /// `true` if no subscriber failed.
    #[must_use]
    pub fn all_delivered(&self) -> bool {
        self.failed == 0
    }
}

/// Handle returned by `publish`.
///
/// Dropping it does not cancel delivery.
#[derive(Debug)]
pub struct Dispatch {
    topic: Topic,
    subscribers: usize,
    completion: oneshot::Receiver<DeliveryReport>,
}

impl Dispatch {
    /// Topic the event was published on.
    #[must_use]
    pub fn topic(&self) -> &Topic {
        &self.topic
    }

    /// Subscribers the event was dispatched to.
    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.subscribers
    }

    /// Wait until every subscriber has finished.
    ///
    /// # Errors
    ///
    /// `BusError::DispatchAborted` if the runtime dropped the dispatch task.
    pub async fn completed(self) -> Result<DeliveryReport, BusError> {
        let topic = self.topic;
        self.completion
            .await
            .map_err(|_| BusError::DispatchAborted {
                topic: topic.to_string(),
            })
    }
}

/// Shared state a dispatch task needs to capture failures.
struct FailureCapture<P: Payload> {
    dead_letters: Arc<DeadLetterStore<P>>,
    observer: Arc<dyn BusObserver<P>>,
    failures: AtomicU64,
}

impl<P: Payload> FailureCapture<P> {
    fn record(&self, topic: &Topic, subscriber: &str, payload: P, error: HandlerError) {
        self.failures.fetch_add(1, Ordering::Relaxed);
        self.observer.on_handler_failure(topic, subscriber, &error);

        let depth = self
            .dead_letters
            .record_failure(topic, payload, subscriber, &error);
        self.observer.on_dead_letter_depth(topic, depth);

        let failure = BusError::HandlerFailure {
            topic: topic.to_string(),
            subscriber: subscriber.to_string(),
            source: error,
        };
        warn!(
            topic = %topic,
            subscriber,
            depth,
            "{failure}; payload routed to dead-letter store"
        );
    }
}

async fn deliver<P: Payload>(
    capture: Arc<FailureCapture<P>>,
    topic: Topic,
    subscriber: Arc<dyn Subscriber<P>>,
    payload: P,
) -> bool {
    match invoke(subscriber.as_ref(), payload.clone()).await {
        Ok(()) => {
            debug!(topic = %topic, subscriber = subscriber.name(), "Event delivered");
            true
        }
        Err(error) => {
            capture.record(&topic, subscriber.name(), payload, error);
            false
        }
    }
}

/// In-process publish/subscribe bus with failure isolation.
///
/// Owns its registry, dead-letter store and retry coordinator; share it via
/// `Arc<EventBus<P>>`. A fresh bus has no subscribers and no dead letters.
pub struct EventBus<P: Payload> {
    registry: Arc<TopicRegistry<P>>,
    capture: Arc<FailureCapture<P>>,
    retry: RetryCoordinator<P>,
    events_published: AtomicU64,
}

impl<P: Payload> EventBus<P> {
    /// Create a bus without an observer.
    #[must_use]
    pub fn new() -> Self {
        Self::with_observer(Arc::new(NoopObserver))
    }

    /// Create a bus reporting to `observer`.
    #[must_use]
    pub fn with_observer(observer: Arc<dyn BusObserver<P>>) -> Self {
        let dead_letters = Arc::new(DeadLetterStore::new());
        let retry = RetryCoordinator::with_observer(Arc::clone(&dead_letters), Arc::clone(&observer));

        Self {
            registry: Arc::new(TopicRegistry::new()),
            capture: Arc::new(FailureCapture {
                dead_letters,
                observer,
                failures: AtomicU64::new(0),
            }),
            retry,
            events_published: AtomicU64::new(0),
        }
    }

    /// Register `subscriber` on `topic`, after any existing subscribers.
    ///
    /// # Errors
    ///
    /// `BusError::InvalidArgument` if `topic` is not a valid topic name.
    pub fn subscribe(
        &self,
        topic: &str,
        subscriber: Arc<dyn Subscriber<P>>,
    ) -> Result<SubscriptionId, BusError> {
        let topic = Topic::new(topic)?;
        Ok(self.registry.subscribe(topic, subscriber))
    }

    /// Register an async closure as a subscriber.
    ///
    /// # Errors
    ///
    /// `BusError::InvalidArgument` if `topic` is not a valid topic name.
    pub fn subscribe_fn<F, Fut>(
        &self,
        topic: &str,
        name: impl Into<String>,
        f: F,
    ) -> Result<SubscriptionId, BusError>
    where
        F: Fn(P) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<(), HandlerError>> + Send + 'static,
    {
        self.subscribe(topic, Arc::new(FnSubscriber::new(name, f)))
    }

    /// Subscribe with a channel and get the payloads as a stream.
    ///
    /// # Errors
    ///
    /// `BusError::InvalidArgument` if `topic` is not a valid topic name.
    pub fn subscribe_stream(&self, topic: &str) -> Result<EventStream<P>, BusError> {
        let topic = Topic::new(topic)?;
        let (sender, receiver) = mpsc::unbounded_channel();
        let id = self
            .registry
            .subscribe(topic.clone(), Arc::new(ChannelSubscriber::new(sender)));

        Ok(EventStream::new(receiver, topic, id, Arc::clone(&self.registry)))
    }

    /// Remove a registration. Returns `false` if it was not found.
    pub fn unsubscribe(&self, topic: &str, id: SubscriptionId) -> bool {
        Topic::new(topic).is_ok_and(|topic| self.registry.unsubscribe(&topic, id))
    }

    /// Number of subscribers on `topic`.
    #[must_use]
    pub fn subscriber_count(&self, topic: &str) -> usize {
        Topic::new(topic).map_or(0, |topic| self.registry.subscriber_count(&topic))
    }

    /// Publish `payload` to every subscriber of `topic`.
    ///
    /// Handlers run on a spawned task; a failing or panicking handler is
    /// recorded to the dead-letter store and does not affect its siblings.
    ///
    /// # Errors
    ///
    /// - `BusError::InvalidArgument` - `topic` is not a valid topic name
    /// - `BusError::RuntimeUnavailable` - called outside a Tokio runtime
    pub fn publish(&self, topic: &str, payload: P) -> Result<Dispatch, BusError> {
        let topic = Topic::new(topic)?;
        let runtime = Handle::try_current().map_err(|_| BusError::RuntimeUnavailable)?;

        let subscribers = self.registry.subscribers(&topic);
        let subscriber_count = subscribers.len();

        // Counted as soon as dispatch is attempted.
        self.events_published.fetch_add(1, Ordering::Relaxed);
        self.capture.observer.on_published(&topic, subscriber_count);

        let (done_tx, done_rx) = oneshot::channel();

        if subscribers.is_empty() {
            debug!(topic = %topic, "Event published with no subscribers");
            let _ = done_tx.send(DeliveryReport {
                topic: topic.clone(),
                delivered: 0,
                failed: 0,
            });
            return Ok(Dispatch {
                topic,
                subscribers: 0,
                completion: done_rx,
            });
        }

        let deliveries: Vec<_> = subscribers
            .into_iter()
            .map(|subscriber| {
                deliver(
                    Arc::clone(&self.capture),
                    topic.clone(),
                    subscriber,
                    payload.clone(),
                )
            })
            .collect();

        info!(topic = %topic, subscribers = subscriber_count, "Dispatching event");

        let report_topic = topic.clone();
        runtime.spawn(async move {
            let outcomes = join_all(deliveries).await;
            let delivered = outcomes.iter().filter(|ok| **ok).count();
            let report = DeliveryReport {
                topic: report_topic,
                delivered,
                failed: outcomes.len() - delivered,
            };
            // Receiver may have been dropped: fire-and-forget publish.
            let _ = done_tx.send(report);
        });

        Ok(Dispatch {
            topic,
            subscribers: subscriber_count,
            completion: done_rx,
        })
    }

    /// Publish a payload on the topic it names itself.
    ///
    /// # Errors
    ///
    /// Same as [`EventBus::publish`].
    pub fn emit(&self, event: P) -> Result<Dispatch, BusError>
    where
        P: TopicKeyed,
    {
        let topic = event.topic_name();
        self.publish(topic, event)
    }

    /// Run one retry pass over `topic` with `handler`.
    ///
    /// # Errors
    ///
    /// `BusError::InvalidArgument` if `topic` is not a valid topic name.
    pub async fn retry<H>(
        &self,
        topic: &str,
        handler: &H,
        max_retries: u32,
    ) -> Result<RetryReport<P>, BusError>
    where
        H: Subscriber<P> + ?Sized,
    {
        self.retry.retry(topic, handler, max_retries).await
    }

    /// The dead-letter store fed by this bus.
    #[must_use]
    pub fn dead_letters(&self) -> &Arc<DeadLetterStore<P>> {
        &self.capture.dead_letters
    }

    /// Report the current dead-letter depth of `topic` to the bus observer.
    pub fn refresh_dead_letter_depth(&self, topic: &Topic) -> usize {
        let depth = self.capture.dead_letters.len(topic);
        self.capture.observer.on_dead_letter_depth(topic, depth);
        depth
    }

    /// The subscriber registry.
    #[must_use]
    pub fn registry(&self) -> &Arc<TopicRegistry<P>> {
        &self.registry
    }

    /// The retry coordinator draining this bus's dead letters.
    #[must_use]
    pub fn retry_coordinator(&self) -> &RetryCoordinator<P> {
        &self.retry
    }

    /// Total events accepted for dispatch.
    #[must_use]
    pub fn events_published(&self) -> u64 {
        self.events_published.load(Ordering::Relaxed)
    }

    /// Total subscriber failures captured during normal delivery.
    #[must_use]
    pub fn handler_failures(&self) -> u64 {
        self.capture.failures.load(Ordering::Relaxed)
    }
}

impl<P: Payload> Default for EventBus<P> {
    fn default() -> Self {
        Self::new()
    }
}

impl<P: Payload> EventPublisher<P> for EventBus<P> {
    fn publish(&self, topic: &str, payload: P) -> Result<Dispatch, BusError> {
        EventBus::publish(self, topic, payload)
    }

    fn events_published(&self) -> u64 {
        EventBus::events_published(self)
    }
}
