//! Prometheus metrics for the Leadline event platform.
//!
//! All metrics follow the naming convention: `leadline_<area>_<metric>_<unit>`
//!
//! ## Metric Types
//!
//! - **Counter**: Monotonically increasing value (e.g., bus_events_published_total)
//! - **Gauge**: Value that can go up or down (e.g., dlq_depth)
//! - **Histogram**: Distribution of values (e.g., retry_pass_duration_seconds)

use lazy_static::lazy_static;
use prometheus::{
    exponential_buckets, Encoder, Histogram, HistogramOpts, HistogramVec, IntCounterVec,
    IntGaugeVec, Opts, Registry, TextEncoder,
};
use std::time::Instant;

use crate::TelemetryError;

lazy_static! {
    /// Registry holding every Leadline metric
    pub static ref REGISTRY: Registry = Registry::new();

    // =========================================================================
    // EVENT BUS METRICS
    // =========================================================================

    /// Events accepted for dispatch
    pub static ref EVENTS_PUBLISHED: IntCounterVec = IntCounterVec::new(
        Opts::new("leadline_bus_events_published_total", "Events accepted for dispatch"),
        &["topic"]
    ).expect("metric creation failed");

    /// Subscriber failures captured during delivery
    pub static ref HANDLER_FAILURES: IntCounterVec = IntCounterVec::new(
        Opts::new("leadline_bus_handler_failures_total", "Subscriber failures routed to the dead-letter store"),
        &["topic", "kind"]  // kind: sink_unavailable/rejected/panicked/other
    ).expect("metric creation failed");

    // =========================================================================
    // DEAD-LETTER METRICS
    // =========================================================================

    /// Entries currently waiting for retry
    pub static ref DEAD_LETTER_DEPTH: IntGaugeVec = IntGaugeVec::new(
        Opts::new("leadline_dlq_depth", "Dead-letter entries waiting for retry"),
        &["topic"]
    ).expect("metric creation failed");

    /// Entries delivered by a retry
    pub static ref RETRY_REDELIVERED: IntCounterVec = IntCounterVec::new(
        Opts::new("leadline_retry_redelivered_total", "Dead-letter entries delivered on retry"),
        &["topic"]
    ).expect("metric creation failed");

    /// Entries that failed again and were put back
    pub static ref RETRY_REQUEUED: IntCounterVec = IntCounterVec::new(
        Opts::new("leadline_retry_requeued_total", "Dead-letter entries requeued after a failed retry"),
        &["topic"]
    ).expect("metric creation failed");

    /// Entries dropped after spending their retry budget
    pub static ref RETRY_EXHAUSTED: IntCounterVec = IntCounterVec::new(
        Opts::new("leadline_retry_exhausted_total", "Dead-letter entries dropped after exhausting retries"),
        &["topic"]
    ).expect("metric creation failed");

    /// Duration of one retry pass over one topic
    pub static ref RETRY_PASS_DURATION: HistogramVec = HistogramVec::new(
        HistogramOpts::new(
            "leadline_retry_pass_duration_seconds",
            "Time spent in one retry pass over a topic"
        ).buckets(exponential_buckets(0.0001, 2.0, 15).expect("valid buckets")),
        &["topic"]
    ).expect("metric creation failed");

    /// Duration of one scheduler tick over every retry target
    pub static ref SCHEDULER_TICK_DURATION: Histogram = Histogram::with_opts(
        HistogramOpts::new(
            "leadline_retry_scheduler_tick_duration_seconds",
            "Time spent retrying every registered topic in one tick"
        ).buckets(exponential_buckets(0.0001, 2.0, 15).expect("valid buckets"))
    ).expect("metric creation failed");

    // =========================================================================
    // SINK METRICS
    // =========================================================================

    /// Writes against the audit/analytics sink
    pub static ref SINK_WRITES: IntCounterVec = IntCounterVec::new(
        Opts::new("leadline_sink_writes_total", "Audit and analytics sink writes"),
        &["table", "outcome"]  // outcome: ok/error
    ).expect("metric creation failed");
}

/// Handle returned once the metrics are registered.
#[derive(Debug, Clone, Copy)]
pub struct MetricsHandle {
    registered: usize,
}

impl MetricsHandle {
    /// Number of metric families in the registry.
    #[must_use]
    pub fn registered(&self) -> usize {
        self.registered
    }
}

/// Register all metrics with the Leadline registry.
///
/// Safe to call more than once; metrics already present are skipped.
pub fn register_metrics() -> Result<MetricsHandle, TelemetryError> {
    let metrics: Vec<Box<dyn prometheus::core::Collector>> = vec![
        // Event bus
        Box::new(EVENTS_PUBLISHED.clone()),
        Box::new(HANDLER_FAILURES.clone()),
        // Dead letters
        Box::new(DEAD_LETTER_DEPTH.clone()),
        Box::new(RETRY_REDELIVERED.clone()),
        Box::new(RETRY_REQUEUED.clone()),
        Box::new(RETRY_EXHAUSTED.clone()),
        Box::new(RETRY_PASS_DURATION.clone()),
        Box::new(SCHEDULER_TICK_DURATION.clone()),
        // Sink
        Box::new(SINK_WRITES.clone()),
    ];
    let registered = metrics.len();

    for metric in metrics {
        match REGISTRY.register(metric) {
            Ok(()) | Err(prometheus::Error::AlreadyReg) => {}
            Err(e) => return Err(TelemetryError::MetricsInit(e.to_string())),
        }
    }

    Ok(MetricsHandle { registered })
}

/// Encode all metrics as Prometheus text format.
pub fn encode_metrics() -> Result<String, TelemetryError> {
    let encoder = TextEncoder::new();
    let metric_families = REGISTRY.gather();
    let mut buffer = Vec::new();
    encoder
        .encode(&metric_families, &mut buffer)
        .map_err(|e| TelemetryError::MetricsInit(e.to_string()))?;
    String::from_utf8(buffer).map_err(|e| TelemetryError::MetricsInit(e.to_string()))
}

/// Timer guard for automatic histogram observation.
pub struct HistogramTimer {
    histogram: Histogram,
    start: Instant,
}

impl HistogramTimer {
    /// Start a new timer for the given histogram.
    pub fn new(histogram: &Histogram) -> Self {
        Self {
            histogram: histogram.clone(),
            start: Instant::now(),
        }
    }
}

impl Drop for HistogramTimer {
    fn drop(&mut self) {
        let duration = self.start.elapsed().as_secs_f64();
        self.histogram.observe(duration);
    }
}

/// Start timing for a histogram. Observation happens on drop.
#[macro_export]
macro_rules! time_histogram {
    ($histogram:expr) => {
        $crate::HistogramTimer::new(&$histogram)
    };
}
