//! # Integration Tests
//!
//! Cross-crate scenarios exercised against real buses, never mocks of the bus.

pub mod platform_flow;
pub mod scenarios;
