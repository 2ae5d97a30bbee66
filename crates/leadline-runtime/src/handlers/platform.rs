//! # Platform Subscribers
//!
//! Subscribers attached to the platform topics.
//!
//! ## Flow
//!
//! 1. `lead.new` → `LeadLogSubscriber` logs the lead
//! 2. `Insight.New` → `InsightAuditSubscriber` writes an `audit_log` row
//! 3. `quote.sent` / `quote.conversion` → `QuoteAnalyticsSubscriber` writes
//!    an `events` row
//!
//! A sink failure is returned to the bus, which parks the event in the
//! dead-letter store for the retry scheduler.

use std::sync::Arc;

use async_trait::async_trait;
use leadline_telemetry::SINK_WRITES;
use shared_bus::{HandlerError, PlatformEvent, Subscriber, TopicKeyed};
use tracing::{info, warn};

use crate::adapters::{AnalyticsRecord, AuditRecord, AuditSink, SinkRecord};

/// Audit action written for new insights.
pub const INSIGHT_CREATED_ACTION: &str = "Insight Created";

fn unexpected(subscriber: &str, event: &PlatformEvent) -> HandlerError {
    HandlerError::Rejected(format!(
        "{subscriber} does not handle {} events",
        event.topic_name()
    ))
}

async fn write(sink: &dyn AuditSink, record: SinkRecord) -> Result<(), HandlerError> {
    let table = record.table();
    match sink.append(record).await {
        Ok(()) => {
            SINK_WRITES.with_label_values(&[table, "ok"]).inc();
            Ok(())
        }
        Err(e) => {
            SINK_WRITES.with_label_values(&[table, "error"]).inc();
            Err(e.into())
        }
    }
}

/// Logs every new lead.
#[derive(Debug, Default, Clone, Copy)]
pub struct LeadLogSubscriber;

#[async_trait]
impl Subscriber<PlatformEvent> for LeadLogSubscriber {
    async fn handle(&self, event: PlatformEvent) -> Result<(), HandlerError> {
        let PlatformEvent::LeadCreated(lead) = &event else {
            return Err(unexpected(self.name(), &event));
        };

        info!(
            lead_id = %lead.id,
            name = %lead.name,
            email = %lead.email,
            "New lead received"
        );
        Ok(())
    }

    fn name(&self) -> &str {
        "lead-log"
    }
}

/// Writes an `audit_log` row for every new insight.
pub struct InsightAuditSubscriber {
    sink: Arc<dyn AuditSink>,
}

impl InsightAuditSubscriber {
    pub fn new(sink: Arc<dyn AuditSink>) -> Self {
        Self { sink }
    }
}

#[async_trait]
impl Subscriber<PlatformEvent> for InsightAuditSubscriber {
    async fn handle(&self, event: PlatformEvent) -> Result<(), HandlerError> {
        let insight = match event {
            PlatformEvent::InsightCreated(insight) => insight,
            other => return Err(unexpected(self.name(), &other)),
        };

        let workspace_id = insight.workspace_id.clone();
        let record = AuditRecord::now(INSIGHT_CREATED_ACTION, insight.workspace_id, insight.details);

        if let Err(e) = write(self.sink.as_ref(), record.into()).await {
            warn!(workspace_id = %workspace_id, error = %e, "Insight audit write failed");
            return Err(e);
        }

        info!(workspace_id = %workspace_id, "Insight audit record written");
        Ok(())
    }

    fn name(&self) -> &str {
        "insight-audit"
    }
}

/// Writes an `events` row for quote analytics.
pub struct QuoteAnalyticsSubscriber {
    sink: Arc<dyn AuditSink>,
}

impl QuoteAnalyticsSubscriber {
    pub fn new(sink: Arc<dyn AuditSink>) -> Self {
        Self { sink }
    }
}

#[async_trait]
impl Subscriber<PlatformEvent> for QuoteAnalyticsSubscriber {
    async fn handle(&self, event: PlatformEvent) -> Result<(), HandlerError> {
        let payload = match &event {
            PlatformEvent::QuoteSent(quote) => serde_json::to_value(quote),
            PlatformEvent::QuoteConversion(conversion) => serde_json::to_value(conversion),
            _ => return Err(unexpected(self.name(), &event)),
        }
        .map_err(|e| HandlerError::Rejected(e.to_string()))?;

        let event_type = event.topic_name();
        write(self.sink.as_ref(), AnalyticsRecord::now(event_type, payload).into()).await?;

        info!(event_type, workspace_id = ?event.workspace_id(), "Analytics event recorded");
        Ok(())
    }

    fn name(&self) -> &str {
        "quote-analytics"
    }
}
