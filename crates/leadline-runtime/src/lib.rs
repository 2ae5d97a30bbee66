//! # Leadline Runtime Library
//!
//! This library exposes the runtime modules for the binary and for tests.
//! The main entry point is the `main.rs` binary.
//!
//! ## Architectural Patterns
//!
//! - **EDA (Event-Driven Architecture)**: Producers and consumers meet only on the bus
//! - **Hexagonal Architecture**: Ports define contracts, Adapters implement them
//! - **Caller-owned retry**: Failures are parked at publish time and redelivered by the scheduler

// Additional allows to match CI configuration
#![allow(clippy::type_complexity)]
#![allow(clippy::too_many_lines)]

pub mod adapters;
pub mod container;
pub mod handlers;
pub mod wiring;

pub use container::{ConfigError, RetryConfig, RuntimeConfig};
pub use wiring::{EventPlatform, RetryScheduler, RetryTarget};
