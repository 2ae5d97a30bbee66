//! # Retry Scheduler
//!
//! Owns the retry cadence: every `interval` it runs one retry pass per
//! retry target with the configured budget, then reports the dead-letter
//! depth to the bus observer. Stops when the shutdown signal flips to `true`.

use std::sync::Arc;

use leadline_telemetry::{time_histogram, SCHEDULER_TICK_DURATION};
use shared_bus::{PlatformEvent, RetryReport};
use tokio::sync::watch;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::{debug, info};

use crate::container::RetryConfig;
use crate::wiring::EventPlatform;

/// Periodic driver for dead-letter retries.
pub struct RetryScheduler {
    platform: Arc<EventPlatform>,
    config: RetryConfig,
    shutdown_rx: watch::Receiver<bool>,
}

impl RetryScheduler {
    pub fn new(
        platform: Arc<EventPlatform>,
        config: RetryConfig,
        shutdown_rx: watch::Receiver<bool>,
    ) -> Self {
        Self {
            platform,
            config,
            shutdown_rx,
        }
    }

    /// Run one retry pass over every target, in wiring order.
    pub async fn run_once(&self) -> Vec<RetryReport<PlatformEvent>> {
        let _timer = time_histogram!(SCHEDULER_TICK_DURATION);
        let bus = self.platform.bus();
        let mut reports = Vec::with_capacity(self.platform.retry_targets().len());

        for target in self.platform.retry_targets() {
            let report = bus
                .retry_coordinator()
                .retry_topic(&target.topic, target.handler.as_ref(), self.config.max_retries)
                .await;

            bus.refresh_dead_letter_depth(&target.topic);
            reports.push(report);
        }

        let processed: usize = reports.iter().map(RetryReport::processed).sum();
        if processed > 0 {
            info!(
                processed,
                remaining = bus.dead_letters().total_len(),
                "Retry tick complete"
            );
        } else {
            debug!("Retry tick found no dead letters");
        }

        reports
    }

    /// Run until shutdown. Returns immediately when retries are disabled.
    pub async fn run(mut self) {
        if !self.config.enabled {
            info!("Retry scheduler disabled");
            return;
        }

        let period = self.config.interval;
        let mut ticker = interval_at(Instant::now() + period, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        info!(
            interval_secs = period.as_secs(),
            max_retries = self.config.max_retries,
            "Retry scheduler started"
        );

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    self.run_once().await;
                }
                changed = self.shutdown_rx.changed() => {
                    if changed.is_err() || *self.shutdown_rx.borrow() {
                        info!("Retry scheduler shutdown signal received");
                        break;
                    }
                }
            }
        }
    }
}
