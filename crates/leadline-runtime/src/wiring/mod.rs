//! # Platform Wiring
//!
//! Subscriber registration and the retry cadence.

pub mod platform;
pub mod scheduler;

pub use platform::{EventPlatform, RetryTarget};
pub use scheduler::RetryScheduler;
