//! # Leadline Runtime
//!
//! The main entry point for the Leadline event platform.
//!
//! ## Event Flow
//!
//! ```text
//! Workflow ──emit──→ EventBus ──→ subscribers ──→ AuditSink
//!                        │ failure
//!                        ↓
//!                 DeadLetterStore ←──drain/requeue── RetryScheduler (every interval)
//! ```
//!
//! ## Startup Sequence
//!
//! 1. Initialize telemetry (logging + metrics)
//! 2. Load configuration from the environment
//! 3. Wire the platform (bus, subscribers, sink)
//! 4. Spawn the retry scheduler
//! 5. Emit demo events (optional)
//! 6. Run until Ctrl+C

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use serde_json::json;
use shared_bus::ConversionStatus;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use leadline_runtime::adapters::InMemoryAuditSink;
use leadline_runtime::{EventPlatform, RetryScheduler, RuntimeConfig};
use leadline_telemetry::{encode_metrics, init_telemetry, TelemetryConfig};

/// The runtime owning the platform and its background tasks.
struct LeadlineRuntime {
    /// Wired platform.
    platform: Arc<EventPlatform>,
    /// Loaded configuration.
    config: RuntimeConfig,
    /// Shutdown signal sender.
    shutdown_tx: watch::Sender<bool>,
    /// Shutdown signal receiver.
    shutdown_rx: watch::Receiver<bool>,
}

impl LeadlineRuntime {
    /// Create a runtime backed by the in-memory sink.
    fn new(config: RuntimeConfig) -> Result<Self> {
        info!("Creating Leadline runtime");

        let sink = Arc::new(InMemoryAuditSink::new());
        let platform =
            Arc::new(EventPlatform::new(sink).context("Failed to wire event platform")?);
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        Ok(Self {
            platform,
            config,
            shutdown_tx,
            shutdown_rx,
        })
    }

    /// Start background tasks and return the scheduler handle.
    fn start(&self) -> Result<JoinHandle<()>> {
        info!("===========================================");
        info!("  Leadline Runtime v{}", env!("CARGO_PKG_VERSION"));
        info!("===========================================");

        let scheduler = RetryScheduler::new(
            Arc::clone(&self.platform),
            self.config.retry.clone(),
            self.shutdown_rx.clone(),
        );
        let handle = tokio::spawn(scheduler.run());

        if self.config.demo_events {
            self.emit_demo_events()
                .context("Failed to emit demo events")?;
        }

        info!(
            max_retries = self.config.retry.max_retries,
            retry_interval_secs = self.config.retry.interval.as_secs(),
            "Runtime started"
        );
        Ok(handle)
    }

    /// One event per platform topic.
    fn emit_demo_events(&self) -> Result<()> {
        let producer = self.platform.producer();

        producer.lead_created("lead-1", "Ada Lovelace", "ada@example.com")?;
        producer.insight_created(
            "workspace-1",
            json!({"summary": "Lead engagement up 12% week over week"}),
        )?;
        let (quote_id, _) = producer.quote_sent("workspace-1", 1250.0)?;
        producer.quote_converted(quote_id, "workspace-1", ConversionStatus::Accepted)?;

        info!("Demo events emitted");
        Ok(())
    }

    /// Signal shutdown and wait for the scheduler to stop.
    async fn shutdown(&self, scheduler: JoinHandle<()>) {
        info!("Initiating graceful shutdown...");

        if let Err(e) = self.shutdown_tx.send(true) {
            error!("Failed to send shutdown signal: {}", e);
        }

        match tokio::time::timeout(Duration::from_secs(5), scheduler).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => error!("Retry scheduler task failed: {}", e),
            Err(_) => warn!("Retry scheduler did not stop within 5s"),
        }

        let pending = self.platform.bus().dead_letters().total_len();
        if pending > 0 {
            warn!(pending, "Shutting down with undelivered dead letters");
        }

        match encode_metrics() {
            Ok(text) => debug!(metrics = %text, "Final metrics snapshot"),
            Err(e) => warn!("Failed to encode metrics: {}", e),
        }

        info!("Shutdown complete");
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let _telemetry = init_telemetry(&TelemetryConfig::from_env())
        .context("Failed to initialize telemetry")?;

    let config = RuntimeConfig::from_env().context("Failed to load runtime configuration")?;

    let runtime = LeadlineRuntime::new(config)?;
    let scheduler = runtime.start()?;

    info!("Runtime is running. Press Ctrl+C to stop.");
    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for Ctrl+C")?;

    runtime.shutdown(scheduler).await;

    Ok(())
}
