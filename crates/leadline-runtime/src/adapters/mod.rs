//! # Adapter Implementations
//!
//! Concrete implementations of the ports the platform talks through:
//!
//! ```text
//! ┌────────────────────────────────────────────────────────────────┐
//! │                    OUTER LAYER (Adapters)                      │
//! │  EventProducer, InMemoryAuditSink, PrometheusObserver          │
//! │                          ↑ implements ↑                        │
//! │                    MIDDLE LAYER (Ports)                        │
//! │  EventPublisher, trait AuditSink, BusObserver                  │
//! │                          ↑ uses ↑                              │
//! │                    INNER LAYER (Handlers)                      │
//! │  LeadLogSubscriber, InsightAuditSubscriber, ...                │
//! └────────────────────────────────────────────────────────────────┘
//! ```

pub mod audit_sink;
pub mod observer;
pub mod producer;

pub use audit_sink::*;
pub use observer::*;
pub use producer::*;
