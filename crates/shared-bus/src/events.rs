//! # Platform Events
//!
//! Defines the payload bound for the bus and the typed events the platform
//! publishes. Each [`PlatformEvent`] variant belongs to exactly one topic, so
//! subscribers receive a statically known shape instead of a loose map.

use serde::{Deserialize, Serialize};
use std::fmt::Debug;

/// Anything that can travel through an [`EventBus`](crate::EventBus).
///
/// Payloads are cloned once per subscriber and kept in the dead-letter store
/// on failure, hence `Clone`; `Debug` is used when an entry is reported as
/// permanently failed.
pub trait Payload: Clone + Debug + Send + Sync + 'static {}

impl<T> Payload for T where T: Clone + Debug + Send + Sync + 'static {}

/// A payload that knows which topic it is published on.
pub trait TopicKeyed {
    /// The topic name this payload belongs to.
    fn topic_name(&self) -> &'static str;
}

/// All events that can be published on the platform bus.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "topic", content = "payload")]
pub enum PlatformEvent {
    // =========================================================================
    // LEADS
    // =========================================================================
    /// A lead was created in a workspace.
    #[serde(rename = "lead.new")]
    LeadCreated(NewLead),

    // =========================================================================
    // INSIGHTS
    // =========================================================================
    /// An intel insight was created. Consumed by the audit log subscriber.
    #[serde(rename = "Insight.New")]
    InsightCreated(NewInsight),

    // =========================================================================
    // QUOTES (analytics)
    // =========================================================================
    /// A quote was sent to a customer.
    #[serde(rename = "quote.sent")]
    QuoteSent(QuoteSent),

    /// A quote was accepted or rejected.
    #[serde(rename = "quote.conversion")]
    QuoteConversion(QuoteConversion),
}

/// Payload of `lead.new`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewLead {
    pub id: String,
    pub name: String,
    pub email: String,
}

/// Payload of `Insight.New`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewInsight {
    pub workspace_id: String,
    /// Free-form details; an empty object when absent.
    #[serde(default = "empty_object")]
    pub details: serde_json::Value,
}

/// Payload of `quote.sent`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuoteSent {
    pub quote_id: String,
    pub workspace_id: String,
    pub amount: f64,
}

/// Payload of `quote.conversion`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuoteConversion {
    pub quote_id: String,
    pub workspace_id: String,
    pub status: ConversionStatus,
}

/// Outcome of a quote.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConversionStatus {
    Accepted,
    Rejected,
}

fn empty_object() -> serde_json::Value {
    serde_json::Value::Object(serde_json::Map::new())
}

impl PlatformEvent {
    /// Get the topic for this event.
    #[must_use]
    pub fn topic(&self) -> EventTopic {
        match self {
            Self::LeadCreated(_) => EventTopic::LeadNew,
            Self::InsightCreated(_) => EventTopic::InsightNew,
            Self::QuoteSent(_) => EventTopic::QuoteSent,
            Self::QuoteConversion(_) => EventTopic::QuoteConversion,
        }
    }

    /// Workspace the event belongs to, if it carries one.
    #[must_use]
    pub fn workspace_id(&self) -> Option<&str> {
        match self {
            Self::LeadCreated(_) => None,
            Self::InsightCreated(insight) => Some(&insight.workspace_id),
            Self::QuoteSent(quote) => Some(&quote.workspace_id),
            Self::QuoteConversion(conversion) => Some(&conversion.workspace_id),
        }
    }
}

impl TopicKeyed for PlatformEvent {
    fn topic_name(&self) -> &'static str {
        self.topic().as_str()
    }
}

/// Topics used by the platform.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EventTopic {
    /// `lead.new`
    LeadNew,
    /// `Insight.New`
    InsightNew,
    /// `quote.sent`
    QuoteSent,
    /// `quote.conversion`
    QuoteConversion,
}

impl EventTopic {
    /// Every platform topic.
    pub const ALL: [EventTopic; 4] = [
        EventTopic::LeadNew,
        EventTopic::InsightNew,
        EventTopic::QuoteSent,
        EventTopic::QuoteConversion,
    ];

    /// Wire name of the topic.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::LeadNew => "lead.new",
            Self::InsightNew => "Insight.New",
            Self::QuoteSent => "quote.sent",
            Self::QuoteConversion => "quote.conversion",
        }
    }
}

impl std::fmt::Display for EventTopic {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
