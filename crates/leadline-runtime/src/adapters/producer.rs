//! # Event Producer
//!
//! Producer-side adapter: workflows call it after their own unit of work to
//! announce what happened. Publishing returns as soon as subscribers are
//! scheduled; their outcomes never flow back here.

use std::sync::Arc;

use serde_json::Value;
use shared_bus::{
    BusError, ConversionStatus, Dispatch, EventPublisher, NewInsight, NewLead, PlatformEvent,
    QuoteConversion, QuoteSent, TopicKeyed,
};
use tracing::info;
use uuid::Uuid;

/// Publishes platform events through any [`EventPublisher`].
pub struct EventProducer<B: EventPublisher<PlatformEvent>> {
    bus: Arc<B>,
}

impl<B: EventPublisher<PlatformEvent>> Clone for EventProducer<B> {
    fn clone(&self) -> Self {
        Self {
            bus: Arc::clone(&self.bus),
        }
    }
}

impl<B: EventPublisher<PlatformEvent>> EventProducer<B> {
    pub fn new(bus: Arc<B>) -> Self {
        Self { bus }
    }

    /// Announce a new lead on `lead.new`.
    pub fn lead_created(
        &self,
        id: impl Into<String>,
        name: impl Into<String>,
        email: impl Into<String>,
    ) -> Result<Dispatch, BusError> {
        self.publish(PlatformEvent::LeadCreated(NewLead {
            id: id.into(),
            name: name.into(),
            email: email.into(),
        }))
    }

    /// Announce a new insight on `Insight.New`.
    pub fn insight_created(
        &self,
        workspace_id: impl Into<String>,
        details: Value,
    ) -> Result<Dispatch, BusError> {
        self.publish(PlatformEvent::InsightCreated(NewInsight {
            workspace_id: workspace_id.into(),
            details,
        }))
    }

    /// Announce a sent quote on `quote.sent`.
    ///
    /// Returns the generated quote id together with the dispatch handle.
    pub fn quote_sent(
        &self,
        workspace_id: impl Into<String>,
        amount: f64,
    ) -> Result<(String, Dispatch), BusError> {
        if !amount.is_finite() || amount < 0.0 {
            return Err(BusError::invalid(format!(
                "quote amount must be a non-negative number, got {amount}"
            )));
        }

        let quote_id = Uuid::new_v4().to_string();
        let dispatch = self.publish(PlatformEvent::QuoteSent(QuoteSent {
            quote_id: quote_id.clone(),
            workspace_id: workspace_id.into(),
            amount,
        }))?;
        Ok((quote_id, dispatch))
    }

    /// Announce the outcome of a quote on `quote.conversion`.
    pub fn quote_converted(
        &self,
        quote_id: impl Into<String>,
        workspace_id: impl Into<String>,
        status: ConversionStatus,
    ) -> Result<Dispatch, BusError> {
        self.publish(PlatformEvent::QuoteConversion(QuoteConversion {
            quote_id: quote_id.into(),
            workspace_id: workspace_id.into(),
            status,
        }))
    }

    fn publish(&self, event: PlatformEvent) -> Result<Dispatch, BusError> {
        let topic = event.topic_name();
        let dispatch = self.bus.publish(topic, event)?;
        info!(
            topic,
            subscribers = dispatch.subscriber_count(),
            "Event published"
        );
        Ok(dispatch)
    }
}
