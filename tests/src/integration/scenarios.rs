//! # Delivery and Retry Scenarios
//!
//! End-to-end behaviour of the bus, the dead-letter store and the retry
//! coordinator, driven through the public `shared-bus` API.
//!
//! ## Scenarios Tested:
//!
//! 1. **Failure isolation**: a failing subscriber parks the payload and its
//!    siblings still run
//! 2. **Retry budget**: an always-failing handler is retried until the
//!    budget is spent, then the entry is dropped and reported
//! 3. **Concurrent publishes**: every failure lands in the store exactly once
//! 4. **Concurrent retries**: passes racing on one topic never share an entry

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    use async_trait::async_trait;
    use parking_lot::Mutex;
    use serde_json::{json, Value};
    use shared_bus::{
        BusObserver, DeadLetterEntry, DeliveryReport, Dispatch, EventBus, FnSubscriber,
        HandlerError, Subscriber, Topic, DEFAULT_MAX_RETRIES,
    };
    use tokio::time::timeout;

    // =============================================================================
    // TEST FIXTURES
    // =============================================================================

    fn topic(name: &str) -> Topic {
        Topic::new(name).unwrap()
    }

    fn lead_payload() -> Value {
        json!({"id": "1", "name": "A", "email": "a@x.com"})
    }

    async fn completed(dispatch: Dispatch) -> DeliveryReport {
        timeout(Duration::from_secs(2), dispatch.completed())
            .await
            .expect("dispatch timed out")
            .expect("dispatch aborted")
    }

    /// Counts invocations and either succeeds or fails.
    fn counting(
        calls: &Arc<AtomicUsize>,
        fail: bool,
    ) -> impl Fn(Value) -> futures::future::Ready<Result<(), HandlerError>> + Send + Sync + 'static
    {
        let calls = Arc::clone(calls);
        move |_payload: Value| {
            calls.fetch_add(1, Ordering::SeqCst);
            futures::future::ready(if fail {
                Err(HandlerError::SinkUnavailable("store offline".into()))
            } else {
                Ok(())
            })
        }
    }

    /// Collects exhausted entries.
    #[derive(Default)]
    struct ExhaustedLog(Mutex<Vec<(String, u32)>>);

    impl BusObserver<Value> for ExhaustedLog {
        fn on_retry_exhausted(&self, topic: &Topic, entry: &DeadLetterEntry<Value>) {
            self.0.lock().push((topic.to_string(), entry.retry_count));
        }
    }

    /// Retry handler that records every payload it sees.
    #[derive(Default)]
    struct RecordingHandler {
        seen: Mutex<Vec<Value>>,
    }

    #[async_trait]
    impl Subscriber<Value> for RecordingHandler {
        async fn handle(&self, payload: Value) -> Result<(), HandlerError> {
            tokio::task::yield_now().await;
            self.seen.lock().push(payload);
            Ok(())
        }

        fn name(&self) -> &str {
            "recording"
        }
    }

    // =============================================================================
    // FAILURE ISOLATION
    // =============================================================================

    #[tokio::test]
    async fn test_failing_subscriber_is_parked_and_sibling_runs() {
        let bus = EventBus::new();
        let h1_calls = Arc::new(AtomicUsize::new(0));
        let h2_calls = Arc::new(AtomicUsize::new(0));
        bus.subscribe_fn("lead.new", "H1", counting(&h1_calls, false))
            .unwrap();
        bus.subscribe_fn("lead.new", "H2", counting(&h2_calls, true))
            .unwrap();

        let report = completed(bus.publish("lead.new", lead_payload()).unwrap()).await;

        assert_eq!(h1_calls.load(Ordering::SeqCst), 1);
        assert_eq!(h2_calls.load(Ordering::SeqCst), 1);
        assert_eq!(report.delivered, 1);
        assert_eq!(report.failed, 1);

        let entries = bus.dead_letters().peek(&topic("lead.new"));
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].payload, lead_payload());
        assert_eq!(entries[0].retry_count, 0);
    }

    #[tokio::test]
    async fn test_failure_in_middle_does_not_skip_later_subscribers() {
        let bus = EventBus::new();
        let calls: Vec<Arc<AtomicUsize>> = (0..5).map(|_| Arc::new(AtomicUsize::new(0))).collect();
        for (i, counter) in calls.iter().enumerate() {
            bus.subscribe_fn("lead.new", format!("S{i}"), counting(counter, i % 2 == 1))
                .unwrap();
        }

        let report = completed(bus.publish("lead.new", lead_payload()).unwrap()).await;

        assert!(calls.iter().all(|c| c.load(Ordering::SeqCst) == 1));
        assert_eq!(report.failed, 2);
        assert_eq!(bus.dead_letters().len(&topic("lead.new")), 2);
    }

    #[tokio::test]
    async fn test_drain_returns_snapshot_then_empty() {
        let bus = EventBus::new();
        let calls = Arc::new(AtomicUsize::new(0));
        bus.subscribe_fn("lead.new", "H2", counting(&calls, true))
            .unwrap();
        completed(bus.publish("lead.new", json!(1)).unwrap()).await;
        completed(bus.publish("lead.new", json!(2)).unwrap()).await;

        let first: Vec<Value> = bus
            .dead_letters()
            .drain_entries(&topic("lead.new"))
            .into_iter()
            .map(|e| e.payload)
            .collect();
        assert_eq!(first, vec![json!(1), json!(2)]);
        assert!(bus.dead_letters().drain_entries(&topic("lead.new")).is_empty());
    }

    // =============================================================================
    // RETRY BUDGET
    // =============================================================================

    #[tokio::test]
    async fn test_retry_budget_exhausted_after_third_pass() {
        let observer = Arc::new(ExhaustedLog::default());
        let bus = EventBus::<Value>::with_observer(observer.clone());
        let publish_calls = Arc::new(AtomicUsize::new(0));
        bus.subscribe_fn("lead.new", "H2", counting(&publish_calls, true))
            .unwrap();
        completed(bus.publish("lead.new", lead_payload()).unwrap()).await;

        let retry_calls = Arc::new(AtomicUsize::new(0));
        let h2 = FnSubscriber::new("H2", counting(&retry_calls, true));

        let first = bus.retry("lead.new", &h2, DEFAULT_MAX_RETRIES).await.unwrap();
        assert_eq!(first.requeued, 1);
        assert_eq!(bus.dead_letters().peek(&topic("lead.new"))[0].retry_count, 1);

        let second = bus.retry("lead.new", &h2, DEFAULT_MAX_RETRIES).await.unwrap();
        assert_eq!(second.requeued, 1);
        assert_eq!(bus.dead_letters().peek(&topic("lead.new"))[0].retry_count, 2);

        let third = bus.retry("lead.new", &h2, DEFAULT_MAX_RETRIES).await.unwrap();
        assert_eq!(third.exhausted.len(), 1);
        assert_eq!(third.exhausted[0].retry_count, 3);
        assert!(bus.dead_letters().is_empty());
        assert_eq!(*observer.0.lock(), vec![("lead.new".to_string(), 3)]);

        let fourth = bus.retry("lead.new", &h2, DEFAULT_MAX_RETRIES).await.unwrap();
        assert!(fourth.is_noop());
        assert_eq!(retry_calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_retry_recovers_once_handler_succeeds() {
        let bus = EventBus::new();
        let calls = Arc::new(AtomicUsize::new(0));
        bus.subscribe_fn("Insight.New", "audit", counting(&calls, true))
            .unwrap();
        completed(bus.publish("Insight.New", json!({"workspaceId": "ws-1"})).unwrap()).await;

        let failing = FnSubscriber::new("audit", counting(&calls, true));
        bus.retry("Insight.New", &failing, 3).await.unwrap();

        let healthy_calls = Arc::new(AtomicUsize::new(0));
        let healthy = FnSubscriber::new("audit", counting(&healthy_calls, false));
        let report = bus.retry("Insight.New", &healthy, 3).await.unwrap();

        assert_eq!(report.redelivered, 1);
        assert_eq!(healthy_calls.load(Ordering::SeqCst), 1);
        assert!(bus.dead_letters().is_empty());
    }

    #[tokio::test]
    async fn test_entry_at_budget_dropped_without_invocation() {
        let observer = Arc::new(ExhaustedLog::default());
        let bus = EventBus::<Value>::with_observer(observer.clone());
        let t = topic("lead.new");
        bus.dead_letters().requeue(
            &t,
            DeadLetterEntry {
                retry_count: 2,
                ..DeadLetterEntry::new(lead_payload())
            },
        );

        let calls = Arc::new(AtomicUsize::new(0));
        let handler = FnSubscriber::new("H", counting(&calls, false));
        let report = bus.retry("lead.new", &handler, 2).await.unwrap();

        assert_eq!(calls.load(Ordering::SeqCst), 0);
        assert_eq!(report.exhausted.len(), 1);
        assert_eq!(observer.0.lock().len(), 1);
        assert!(bus.dead_letters().is_empty());
    }

    #[tokio::test]
    async fn test_retry_on_unknown_topic_is_noop() {
        let bus = EventBus::<Value>::new();
        let calls = Arc::new(AtomicUsize::new(0));
        let handler = FnSubscriber::new("H", counting(&calls, false));

        let report = bus.retry("nobody.here", &handler, 3).await.unwrap();

        assert!(report.is_noop());
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    // =============================================================================
    // CONCURRENT PUBLISHES
    // =============================================================================

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_publishes_record_every_failure() {
        let bus = Arc::new(EventBus::new());
        let calls = Arc::new(AtomicUsize::new(0));
        bus.subscribe_fn("t", "shared", counting(&calls, true)).unwrap();

        let (a, b) = tokio::join!(
            {
                let bus = Arc::clone(&bus);
                tokio::spawn(async move { completed(bus.publish("t", json!("p1")).unwrap()).await })
            },
            {
                let bus = Arc::clone(&bus);
                tokio::spawn(async move { completed(bus.publish("t", json!("p2")).unwrap()).await })
            }
        );
        a.unwrap();
        b.unwrap();

        let mut payloads: Vec<String> = bus
            .dead_letters()
            .peek(&topic("t"))
            .into_iter()
            .map(|e| e.payload.as_str().unwrap().to_string())
            .collect();
        payloads.sort();
        assert_eq!(payloads, vec!["p1", "p2"]);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_many_concurrent_publishes() {
        let bus = Arc::new(EventBus::new());
        let calls = Arc::new(AtomicUsize::new(0));
        bus.subscribe_fn("t", "shared", counting(&calls, true)).unwrap();

        let tasks: Vec<_> = (0..200)
            .map(|i| {
                let bus = Arc::clone(&bus);
                tokio::spawn(async move { completed(bus.publish("t", json!(i)).unwrap()).await })
            })
            .collect();
        for task in futures::future::join_all(tasks).await {
            assert_eq!(task.unwrap().failed, 1);
        }

        assert_eq!(bus.dead_letters().len(&topic("t")), 200);
        assert_eq!(bus.handler_failures(), 200);
        assert_eq!(bus.events_published(), 200);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_failures_during_retry_pass_wait_for_next_pass() {
        let bus = Arc::new(EventBus::new());
        let calls = Arc::new(AtomicUsize::new(0));
        bus.subscribe_fn("t", "shared", counting(&calls, true)).unwrap();
        completed(bus.publish("t", json!("old")).unwrap()).await;

        // The retry handler publishes a fresh failing event while the pass runs.
        let inner_bus = Arc::clone(&bus);
        let handler = FnSubscriber::new("republish", move |_payload: Value| {
            let bus = Arc::clone(&inner_bus);
            async move {
                completed(bus.publish("t", json!("new")).unwrap()).await;
                Ok::<(), HandlerError>(())
            }
        });

        let report = bus.retry("t", &handler, 3).await.unwrap();
        assert_eq!(report.redelivered, 1);

        let remaining = bus.dead_letters().peek(&topic("t"));
        assert_eq!(remaining.len(), 1);
        assert_eq!(remaining[0].payload, json!("new"));
        assert_eq!(remaining[0].retry_count, 0);
    }

    // =============================================================================
    // CONCURRENT RETRIES
    // =============================================================================

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_retries_on_one_topic_share_no_entry() {
        let bus = Arc::new(EventBus::<Value>::new());
        let t = topic("t");
        for i in 0..500 {
            bus.dead_letters().add_entry(&t, json!(i));
        }
        let handler = Arc::new(RecordingHandler::default());

        let passes: Vec<_> = (0..4)
            .map(|_| {
                let bus = Arc::clone(&bus);
                let handler = Arc::clone(&handler);
                tokio::spawn(async move { bus.retry("t", handler.as_ref(), 3).await.unwrap() })
            })
            .collect();

        let mut redelivered = 0;
        for pass in futures::future::join_all(passes).await {
            redelivered += pass.unwrap().redelivered;
        }

        assert_eq!(redelivered, 500);
        assert!(bus.dead_letters().is_empty());

        let mut seen: Vec<i64> = handler
            .seen
            .lock()
            .iter()
            .map(|v| v.as_i64().unwrap())
            .collect();
        seen.sort_unstable();
        assert_eq!(seen, (0..500).collect::<Vec<i64>>());
    }
}
