//! # Platform Flow Tests
//!
//! The wired platform (`leadline-runtime`) against the in-memory sink.
//!
//! ## Flows Tested:
//!
//! 1. **Happy path**: every topic reaches its sink table
//! 2. **Sink outage**: failed writes park events, the scheduler redelivers
//!    them once the sink is back
//! 3. **Persistent outage**: entries are dropped after the configured budget

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use leadline_runtime::adapters::{InMemoryAuditSink, AUDIT_LOG_TABLE, EVENTS_TABLE};
    use leadline_runtime::{EventPlatform, RetryConfig, RetryScheduler};
    use serde_json::json;
    use shared_bus::{ConversionStatus, Dispatch, NoopObserver, RetryReport, Topic};
    use tokio::sync::watch;
    use tokio::time::timeout;

    // =============================================================================
    // TEST FIXTURES
    // =============================================================================

    struct Harness {
        sink: Arc<InMemoryAuditSink>,
        platform: Arc<EventPlatform>,
        shutdown_tx: watch::Sender<bool>,
    }

    impl Harness {
        fn new() -> Self {
            let sink = Arc::new(InMemoryAuditSink::new());
            let platform = Arc::new(
                EventPlatform::with_observer(sink.clone(), Arc::new(NoopObserver)).unwrap(),
            );
            let (shutdown_tx, _) = watch::channel(false);
            Self {
                sink,
                platform,
                shutdown_tx,
            }
        }

        fn scheduler(&self, config: RetryConfig) -> RetryScheduler {
            RetryScheduler::new(
                Arc::clone(&self.platform),
                config,
                self.shutdown_tx.subscribe(),
            )
        }

        fn pending(&self) -> usize {
            self.platform.bus().dead_letters().total_len()
        }
    }

    async fn settle(dispatch: Dispatch) {
        timeout(Duration::from_secs(2), dispatch.completed())
            .await
            .expect("dispatch timed out")
            .expect("dispatch aborted");
    }

    /// Emit one event on every platform topic.
    async fn emit_all(harness: &Harness) {
        let producer = harness.platform.producer();
        settle(producer.lead_created("1", "A", "a@x.com").unwrap()).await;
        settle(
            producer
                .insight_created("ws-1", json!({"summary": "Churn risk"}))
                .unwrap(),
        )
        .await;
        let (quote_id, dispatch) = producer.quote_sent("ws-1", 500.0).unwrap();
        settle(dispatch).await;
        settle(
            producer
                .quote_converted(quote_id, "ws-1", ConversionStatus::Rejected)
                .unwrap(),
        )
        .await;
    }

    // =============================================================================
    // HAPPY PATH
    // =============================================================================

    #[tokio::test]
    async fn test_every_topic_reaches_its_table() {
        let harness = Harness::new();
        emit_all(&harness).await;

        let tables: Vec<&str> = harness.sink.records().iter().map(|r| r.table()).collect();
        assert_eq!(tables, vec![AUDIT_LOG_TABLE, EVENTS_TABLE, EVENTS_TABLE]);

        let audit = &harness.sink.audit_records()[0];
        assert_eq!(audit.action, "Insight Created");
        assert_eq!(audit.workspace_id, "ws-1");

        let events: Vec<String> = harness
            .sink
            .analytics_records()
            .into_iter()
            .map(|e| e.event_type)
            .collect();
        assert_eq!(events, vec!["quote.sent", "quote.conversion"]);
        assert_eq!(harness.pending(), 0);
    }

    // =============================================================================
    // SINK OUTAGE AND RECOVERY
    // =============================================================================

    #[tokio::test]
    async fn test_outage_then_recovery_via_scheduler() {
        let harness = Harness::new();
        harness.sink.set_available(false);
        emit_all(&harness).await;

        // Lead logging never touches the sink; the other three are parked.
        assert_eq!(harness.pending(), 3);
        assert!(harness.sink.is_empty());

        harness.sink.set_available(true);
        let reports = harness.scheduler(RetryConfig::default()).run_once().await;

        let redelivered: usize = reports.iter().map(|r| r.redelivered).sum();
        assert_eq!(redelivered, 3);
        assert_eq!(harness.pending(), 0);
        assert_eq!(harness.sink.len(), 3);
    }

    #[tokio::test]
    async fn test_transient_failure_recovers_on_next_tick() {
        let harness = Harness::new();
        harness.sink.fail_next(2);

        let dispatch = harness
            .platform
            .producer()
            .insight_created("ws-2", json!({}))
            .unwrap();
        settle(dispatch).await;
        assert_eq!(harness.pending(), 1);

        let scheduler = harness.scheduler(RetryConfig::default());
        scheduler.run_once().await;
        let insight = Topic::new("Insight.New").unwrap();
        assert_eq!(
            harness.platform.bus().dead_letters().peek(&insight)[0].retry_count,
            1
        );

        scheduler.run_once().await;
        assert_eq!(harness.pending(), 0);
        assert_eq!(harness.sink.audit_records().len(), 1);
        assert_eq!(harness.sink.attempts(), 3);
    }

    #[tokio::test]
    async fn test_persistent_outage_drops_after_budget() {
        let harness = Harness::new();
        harness.sink.set_available(false);
        settle(
            harness
                .platform
                .producer()
                .insight_created("ws-3", json!({}))
                .unwrap(),
        )
        .await;

        let scheduler = harness.scheduler(RetryConfig::default());
        let mut exhausted = 0;
        for _ in 0..3 {
            exhausted += scheduler
                .run_once()
                .await
                .iter()
                .map(|r| r.exhausted.len())
                .sum::<usize>();
        }

        assert_eq!(exhausted, 1);
        assert_eq!(harness.pending(), 0);
        assert!(scheduler.run_once().await.iter().all(RetryReport::is_noop));
        // One publish attempt plus three retries.
        assert_eq!(harness.sink.attempts(), 4);
    }

    // =============================================================================
    // BACKGROUND SCHEDULER
    // =============================================================================

    #[tokio::test(start_paused = true)]
    async fn test_background_scheduler_drains_and_stops() {
        let harness = Harness::new();
        harness.sink.set_available(false);
        settle(
            harness
                .platform
                .producer()
                .insight_created("ws-4", json!({}))
                .unwrap(),
        )
        .await;
        harness.sink.set_available(true);

        let config = RetryConfig {
            interval: Duration::from_secs(5),
            ..RetryConfig::default()
        };
        let handle = tokio::spawn(harness.scheduler(config).run());

        tokio::time::sleep(Duration::from_secs(6)).await;
        assert_eq!(harness.pending(), 0);
        assert_eq!(harness.sink.audit_records().len(), 1);

        harness.shutdown_tx.send(true).unwrap();
        timeout(Duration::from_secs(1), handle)
            .await
            .expect("scheduler did not stop")
            .unwrap();
    }
}
