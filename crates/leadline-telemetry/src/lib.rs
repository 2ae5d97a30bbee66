//! # Leadline Telemetry
//!
//! Logging and metrics for the Leadline event platform.
//!
//! ## Components
//!
//! - **Logs**: `tracing-subscriber` with pretty or JSON output
//! - **Metrics**: Prometheus counters, gauges and histograms in a dedicated registry
//!
//! ## Usage
//!
//! ```rust,ignore
//! use leadline_telemetry::{init_telemetry, TelemetryConfig};
//!
//! fn main() {
//!     let config = TelemetryConfig::from_env();
//!     let _guard = init_telemetry(&config).expect("Failed to init telemetry");
//!
//!     // Logs and metrics are now being collected
//! }
//! ```
//!
//! ## Environment Variables
//!
//! | Variable | Default | Description |
//! |----------|---------|-------------|
//! | `LEADLINE_SERVICE_NAME` | `leadline` | Service name in logs |
//! | `LEADLINE_LOG_LEVEL` | `info` | Log level filter (falls back to `RUST_LOG`) |
//! | `LEADLINE_JSON_LOGS` | `false` (`true` in containers) | JSON log output |
//! | `LEADLINE_CONSOLE_OUTPUT` | `true` | Write logs to stdout |

mod config;
mod logging;
mod metrics;

pub use config::TelemetryConfig;
pub use logging::{env_filter, init_logging};
pub use metrics::{
    encode_metrics, register_metrics, HistogramTimer, MetricsHandle, DEAD_LETTER_DEPTH,
    EVENTS_PUBLISHED, HANDLER_FAILURES, REGISTRY, RETRY_EXHAUSTED, RETRY_PASS_DURATION,
    RETRY_REDELIVERED, RETRY_REQUEUED, SCHEDULER_TICK_DURATION, SINK_WRITES,
};

use thiserror::Error;

/// Telemetry initialization errors
#[derive(Error, Debug)]
pub enum TelemetryError {
    #[error("Failed to initialize logging: {0}")]
    LoggingInit(String),

    #[error("Failed to initialize Prometheus metrics: {0}")]
    MetricsInit(String),
}

/// Initialize logging and register metrics.
///
/// Returns a guard that should be held for the lifetime of the application.
pub fn init_telemetry(config: &TelemetryConfig) -> Result<TelemetryGuard, TelemetryError> {
    // Metrics first (synchronous, idempotent)
    let metrics = register_metrics()?;
    init_logging(config)?;

    Ok(TelemetryGuard {
        service_name: config.service_name.clone(),
        _metrics: metrics,
    })
}

/// Guard that keeps telemetry active.
pub struct TelemetryGuard {
    service_name: String,
    _metrics: MetricsHandle,
}

impl Drop for TelemetryGuard {
    fn drop(&mut self) {
        tracing::info!(service = %self.service_name, "Shutting down telemetry...");
    }
}
