//! # Subscribers
//!
//! Defines the consuming side of the bus: the [`Subscriber`] capability,
//! a closure adapter, and channel-backed [`EventStream`]s.

use crate::error::HandlerError;
use crate::events::Payload;
use crate::registry::{SubscriptionId, TopicRegistry};
use crate::topic::Topic;
use async_trait::async_trait;
use futures::FutureExt;
use std::any::Any;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use thiserror::Error;
use tokio::sync::mpsc;
use tokio_stream::Stream;
use tracing::debug;

/// Errors from stream subscription operations.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SubscriptionError {
    /// The subscription was removed from the bus.
    #[error("Subscription closed")]
    Closed,
}

/// Consume an event payload, return success or failure.
///
/// A subscriber is registered on exactly one topic per registration. The
/// same value may be registered on several topics and reused as a retry
/// handler.
#[async_trait]
pub trait Subscriber<P: Payload>: Send + Sync {
    /// Handle one payload.
    ///
    /// Returning an error (or panicking) routes the payload to the
    /// dead-letter store for this topic; sibling subscribers are unaffected.
    async fn handle(&self, payload: P) -> Result<(), HandlerError>;

    /// Name used in logs and dead-letter diagnostics.
    fn name(&self) -> &str {
        "anonymous"
    }
}

#[async_trait]
impl<P, S> Subscriber<P> for Arc<S>
where
    P: Payload,
    S: Subscriber<P> + ?Sized,
{
    async fn handle(&self, payload: P) -> Result<(), HandlerError> {
        (**self).handle(payload).await
    }

    fn name(&self) -> &str {
        (**self).name()
    }
}

/// Adapter turning an async closure into a [`Subscriber`].
pub struct FnSubscriber<F> {
    name: String,
    f: F,
}

impl<F> FnSubscriber<F> {
    /// Wrap `f` under the given subscriber name.
    pub fn new(name: impl Into<String>, f: F) -> Self {
        Self {
            name: name.into(),
            f,
        }
    }
}

#[async_trait]
impl<P, F, Fut> Subscriber<P> for FnSubscriber<F>
where
    P: Payload,
    F: Fn(P) -> Fut + Send + Sync,
    Fut: Future<Output = Result<(), HandlerError>> + Send + 'static,
{
    async fn handle(&self, payload: P) -> Result<(), HandlerError> {
        (self.f)(payload).await
    }

    fn name(&self) -> &str {
        &self.name
    }
}

/// Run a handler, converting a panic into [`HandlerError::Panicked`].
pub(crate) async fn invoke<P, S>(subscriber: &S, payload: P) -> Result<(), HandlerError>
where
    P: Payload,
    S: Subscriber<P> + ?Sized,
{
    match AssertUnwindSafe(subscriber.handle(payload))
        .catch_unwind()
        .await
    {
        Ok(result) => result,
        Err(panic) => Err(HandlerError::Panicked(panic_message(panic.as_ref()))),
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(msg) = panic.downcast_ref::<&str>() {
        (*msg).to_string()
    } else if let Some(msg) = panic.downcast_ref::<String>() {
        msg.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

/// Subscriber forwarding payloads into an [`EventStream`].
pub(crate) struct ChannelSubscriber<P> {
    sender: mpsc::UnboundedSender<P>,
}

impl<P> ChannelSubscriber<P> {
    pub(crate) fn new(sender: mpsc::UnboundedSender<P>) -> Self {
        Self { sender }
    }
}

#[async_trait]
impl<P: Payload> Subscriber<P> for ChannelSubscriber<P> {
    async fn handle(&self, payload: P) -> Result<(), HandlerError> {
        self.sender
            .send(payload)
            .map_err(|_| HandlerError::Other("event stream receiver dropped".to_string()))
    }

    fn name(&self) -> &str {
        "event-stream"
    }
}

/// A stream of payloads published on one topic.
///
/// Implements `tokio_stream::Stream`. When dropped, the underlying
/// subscription is removed from the bus.
pub struct EventStream<P: Payload> {
    receiver: mpsc::UnboundedReceiver<P>,
    topic: Topic,
    id: SubscriptionId,
    registry: Arc<TopicRegistry<P>>,
}

impl<P: Payload> EventStream<P> {
    pub(crate) fn new(
        receiver: mpsc::UnboundedReceiver<P>,
        topic: Topic,
        id: SubscriptionId,
        registry: Arc<TopicRegistry<P>>,
    ) -> Self {
        Self {
            receiver,
            topic,
            id,
            registry,
        }
    }

    /// Receive the next payload.
    ///
    /// Returns `None` once the bus side has gone away.
    pub async fn recv(&mut self) -> Option<P> {
        self.receiver.recv().await
    }

    /// Try to receive the next payload without waiting.
    ///
    /// # Returns
    ///
    /// - `Ok(Some(payload))` - A payload was available
    /// - `Ok(None)` - Nothing available yet
    /// - `Err(SubscriptionError::Closed)` - The sending side is gone
    pub fn try_recv(&mut self) -> Result<Option<P>, SubscriptionError> {
        match self.receiver.try_recv() {
            Ok(payload) => Ok(Some(payload)),
            Err(mpsc::error::TryRecvError::Empty) => Ok(None),
            Err(mpsc::error::TryRecvError::Disconnected) => Err(SubscriptionError::Closed),
        }
    }

    /// Topic this stream listens on.
    #[must_use]
    pub fn topic(&self) -> &Topic {
        &self.topic
    }

    /// Registration id of the backing subscriber.
    #[must_use]
    pub fn id(&self) -> SubscriptionId {
        self.id
    }
}

impl<P: Payload> Stream for EventStream<P> {
    type Item = P;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.receiver.poll_recv(cx)
    }
}

impl<P: Payload> Drop for EventStream<P> {
    fn drop(&mut self) {
        self.registry.unsubscribe(&self.topic, self.id);
        debug!(topic = %self.topic, id = %self.id, "Event stream dropped");
    }
}
