//! # Event Handlers
//!
//! Subscribers that process platform events.

pub mod platform;

pub use platform::*;
