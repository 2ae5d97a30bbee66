//! # Runtime Container
//!
//! Configuration shared by every runtime component.

pub mod config;

pub use config::{ConfigError, RetryConfig, RuntimeConfig};
