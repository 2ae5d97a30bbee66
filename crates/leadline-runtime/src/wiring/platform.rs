//! # Event Platform
//!
//! Builds the platform bus and attaches the subscribers to their topics.
//!
//! ```text
//!   lead.new ─────────→ LeadLogSubscriber
//!   Insight.New ──────→ InsightAuditSubscriber ──┐
//!   quote.sent ───────→ QuoteAnalyticsSubscriber ─┼──→ AuditSink
//!   quote.conversion ─→ QuoteAnalyticsSubscriber ─┘
//! ```
//!
//! Each topic also gets a retry target: the handler that redelivers its
//! dead letters.

use std::sync::Arc;

use shared_bus::{
    BusError, BusObserver, Dispatch, EventBus, EventTopic, PlatformEvent, Subscriber, Topic,
};
use tracing::info;

use crate::adapters::{AuditSink, EventProducer, PrometheusObserver};
use crate::handlers::{InsightAuditSubscriber, LeadLogSubscriber, QuoteAnalyticsSubscriber};

/// Topic paired with the handler used to retry its dead letters.
#[derive(Clone)]
pub struct RetryTarget {
    pub topic: Topic,
    pub handler: Arc<dyn Subscriber<PlatformEvent>>,
}

impl std::fmt::Debug for RetryTarget {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RetryTarget")
            .field("topic", &self.topic)
            .field("handler", &self.handler.name())
            .finish()
    }
}

/// The wired platform: bus, sink and retry targets.
pub struct EventPlatform {
    bus: Arc<EventBus<PlatformEvent>>,
    sink: Arc<dyn AuditSink>,
    targets: Vec<RetryTarget>,
}

impl EventPlatform {
    /// Wire the platform with Prometheus metrics.
    pub fn new(sink: Arc<dyn AuditSink>) -> Result<Self, BusError> {
        Self::with_observer(sink, Arc::new(PrometheusObserver))
    }

    /// Wire the platform reporting to `observer`.
    pub fn with_observer(
        sink: Arc<dyn AuditSink>,
        observer: Arc<dyn BusObserver<PlatformEvent>>,
    ) -> Result<Self, BusError> {
        let bus = Arc::new(EventBus::with_observer(observer));

        let lead_log: Arc<dyn Subscriber<PlatformEvent>> = Arc::new(LeadLogSubscriber);
        let insight_audit: Arc<dyn Subscriber<PlatformEvent>> =
            Arc::new(InsightAuditSubscriber::new(Arc::clone(&sink)));
        let quote_analytics: Arc<dyn Subscriber<PlatformEvent>> =
            Arc::new(QuoteAnalyticsSubscriber::new(Arc::clone(&sink)));

        let wiring = [
            (EventTopic::LeadNew, lead_log),
            (EventTopic::InsightNew, insight_audit),
            (EventTopic::QuoteSent, Arc::clone(&quote_analytics)),
            (EventTopic::QuoteConversion, quote_analytics),
        ];

        let mut targets = Vec::with_capacity(wiring.len());
        for (topic, handler) in wiring {
            bus.subscribe(topic.as_str(), Arc::clone(&handler))?;
            targets.push(RetryTarget {
                topic: Topic::new(topic.as_str())?,
                handler,
            });
        }

        info!(topics = targets.len(), "Event platform wired");

        Ok(Self { bus, sink, targets })
    }

    /// Publish an event on its own topic.
    pub fn emit(&self, event: PlatformEvent) -> Result<Dispatch, BusError> {
        self.bus.emit(event)
    }

    /// Producer bound to this platform's bus.
    #[must_use]
    pub fn producer(&self) -> EventProducer<EventBus<PlatformEvent>> {
        EventProducer::new(Arc::clone(&self.bus))
    }

    #[must_use]
    pub fn bus(&self) -> &Arc<EventBus<PlatformEvent>> {
        &self.bus
    }

    #[must_use]
    pub fn sink(&self) -> &Arc<dyn AuditSink> {
        &self.sink
    }

    /// Topics with dead letters to retry, in wiring order.
    #[must_use]
    pub fn retry_targets(&self) -> &[RetryTarget] {
        &self.targets
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::InMemoryAuditSink;
    use serde_json::json;
    use shared_bus::{NewInsight, NoopObserver};
    use std::time::Duration;
    use tokio::time::timeout;

    fn platform(sink: &Arc<InMemoryAuditSink>) -> EventPlatform {
        EventPlatform::with_observer(sink.clone(), Arc::new(NoopObserver)).unwrap()
    }

    #[test]
    fn test_every_topic_is_wired() {
        let sink = Arc::new(InMemoryAuditSink::new());
        let platform = platform(&sink);

        for topic in EventTopic::ALL {
            assert_eq!(platform.bus().subscriber_count(topic.as_str()), 1, "{topic}");
        }

        let targets: Vec<&str> = platform
            .retry_targets()
            .iter()
            .map(|t| t.topic.as_str())
            .collect();
        assert_eq!(
            targets,
            vec!["lead.new", "Insight.New", "quote.sent", "quote.conversion"]
        );
    }

    #[tokio::test]
    async fn test_insight_emit_writes_audit_row() {
        let sink = Arc::new(InMemoryAuditSink::new());
        let platform = platform(&sink);

        let dispatch = platform
            .emit(PlatformEvent::InsightCreated(NewInsight {
                workspace_id: "ws-1".into(),
                details: json!({"k": "v"}),
            }))
            .unwrap();
        let report = timeout(Duration::from_secs(1), dispatch.completed())
            .await
            .expect("timeout")
            .unwrap();

        assert!(report.all_delivered());
        assert_eq!(sink.audit_records().len(), 1);
        assert!(platform.bus().dead_letters().is_empty());
    }

    #[tokio::test]
    async fn test_sink_outage_dead_letters_insight() {
        let sink = Arc::new(InMemoryAuditSink::new());
        sink.set_available(false);
        let platform = platform(&sink);

        let dispatch = platform
            .producer()
            .insight_created("ws-1", json!({}))
            .unwrap();
        let report = timeout(Duration::from_secs(1), dispatch.completed())
            .await
            .expect("timeout")
            .unwrap();

        assert_eq!(report.failed, 1);
        let topic = Topic::new("Insight.New").unwrap();
        let entries = platform.bus().dead_letters().peek(&topic);
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].subscriber.as_deref(), Some("insight-audit"));
    }
}
