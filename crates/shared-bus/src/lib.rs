//! # Shared Bus - In-Process Event Bus with Dead-Letter Recovery
//!
//! Topic-keyed publish/subscribe for the Leadline platform services.
//!
//! ## Delivery Model
//!
//! ```text
//! ┌──────────────┐  publish(topic, payload)  ┌──────────────┐
//! │  Producer    │ ────────────────────────→ │  EventBus    │
//! └──────────────┘                           └──────┬───────┘
//!                                                   │ one task per publish,
//!                          ┌────────────────────────┼─────────────────┐
//!                          ↓                        ↓                 ↓
//!                    Subscriber 1             Subscriber 2      Subscriber 3
//!                          │ Err / panic
//!                          ↓
//!                 ┌──────────────────┐   retry(topic, handler, max)
//!                 │ DeadLetterStore  │ ←────────────────────────── RetryCoordinator
//!                 └──────────────────┘
//! ```
//!
//! ## Guarantees
//!
//! - Subscribers of a topic are started in registration order.
//! - A failing subscriber never prevents its siblings from running, and
//!   never surfaces as an error to the publisher.
//! - Each failure adds exactly one dead-letter entry with `retry_count = 0`.
//! - A retry pass drains the partition atomically; entries whose retry
//!   budget is spent are reported and dropped.

// Nursery lints that are too strict
#![allow(clippy::missing_const_for_fn)]
// Allow in tests
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]
#![cfg_attr(test, allow(clippy::panic))]

pub mod dlq;
pub mod error;
pub mod events;
pub mod observer;
pub mod publisher;
pub mod registry;
pub mod retry;
pub mod subscriber;
pub mod topic;

// Re-export main types
pub use dlq::{DeadLetterEntry, DeadLetterStore};
pub use error::{BusError, HandlerError};
pub use events::{
    ConversionStatus, EventTopic, NewInsight, NewLead, Payload, PlatformEvent, QuoteConversion,
    QuoteSent, TopicKeyed,
};
pub use observer::{BusObserver, NoopObserver};
pub use publisher::{DeliveryReport, Dispatch, EventBus, EventPublisher};
pub use registry::{SubscriptionId, TopicRegistry};
pub use retry::{RetryCoordinator, RetryReport};
pub use subscriber::{EventStream, FnSubscriber, Subscriber, SubscriptionError};
pub use topic::Topic;

/// Retry budget used when none is configured.
pub const DEFAULT_MAX_RETRIES: u32 = 3;
