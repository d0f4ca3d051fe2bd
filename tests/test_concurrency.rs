//! Concurrent dispatch through a shared registry

mod test_helpers;

use futures::future::join_all;
use hr_dispatch::task::TaskKind;
use hr_dispatch::testing::{KindRoutingOracle, StaticRoutingOracle, StubHandler};
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use test_helpers::{registry_with, task};

const CONCURRENT_TASKS: usize = 64;

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_tasks_are_each_counted_once() {
    let registry = Arc::new(registry_with(
        Arc::new(StaticRoutingOracle::new("slow")),
        vec![Arc::new(
            StubHandler::universal("slow").with_delay(Duration::from_millis(5)),
        )],
    ));

    let handles: Vec<_> = (0..CONCURRENT_TASKS)
        .map(|i| {
            let registry = Arc::clone(&registry);
            tokio::spawn(async move {
                let task = task(TaskKind::AttendanceTracking, json!({"employee": i}));
                registry.execute_task(&task, None).await
            })
        })
        .collect();

    for response in join_all(handles).await {
        assert!(response.unwrap().succeeded);
    }

    let delegate = registry.get_handler("slow").unwrap();
    assert_eq!(delegate.metrics().total_requests, CONCURRENT_TASKS as u64);
    assert_eq!(delegate.metrics().success_count, CONCURRENT_TASKS as u64);
    assert_eq!(delegate.status().in_flight, 0);

    let coordinator = registry.coordinator();
    assert_eq!(coordinator.metrics().total_requests, CONCURRENT_TASKS as u64);
    assert_eq!(coordinator.status().in_flight, 0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_mixed_outcomes_under_concurrency() {
    let oracle = KindRoutingOracle::new()
        .route(TaskKind::BenefitsInquiry, "good")
        .otherwise("bad");
    let registry = Arc::new(registry_with(
        Arc::new(oracle),
        vec![
            Arc::new(StubHandler::universal("good").with_delay(Duration::from_millis(2))),
            Arc::new(StubHandler::universal("bad").panicking("boom")),
        ],
    ));

    let handles: Vec<_> = (0..CONCURRENT_TASKS)
        .map(|i| {
            let registry = Arc::clone(&registry);
            let kind = if i % 2 == 0 {
                TaskKind::BenefitsInquiry
            } else {
                TaskKind::PolicyInquiry
            };
            tokio::spawn(async move { registry.execute_task(&task(kind, json!({})), None).await })
        })
        .collect();

    let responses: Vec<_> = join_all(handles)
        .await
        .into_iter()
        .map(|r| r.unwrap())
        .collect();
    let succeeded = responses.iter().filter(|r| r.succeeded).count();
    assert_eq!(succeeded, CONCURRENT_TASKS / 2);

    let good = registry.get_handler("good").unwrap().metrics();
    let bad = registry.get_handler("bad").unwrap().metrics();
    assert_eq!(good.success_count, (CONCURRENT_TASKS / 2) as u64);
    assert_eq!(bad.error_count, (CONCURRENT_TASKS / 2) as u64);

    let coordinator = registry.coordinator().metrics();
    assert_eq!(coordinator.total_requests, CONCURRENT_TASKS as u64);
    assert_eq!(
        coordinator.success_count + coordinator.error_count,
        CONCURRENT_TASKS as u64
    );
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_registration_while_dispatching() {
    let registry = Arc::new(registry_with(
        Arc::new(StaticRoutingOracle::new("stable")),
        vec![Arc::new(
            StubHandler::universal("stable").with_delay(Duration::from_millis(1)),
        )],
    ));

    let dispatcher = {
        let registry = Arc::clone(&registry);
        tokio::spawn(async move {
            for _ in 0..20 {
                let response = registry
                    .execute_task(&task(TaskKind::GeneralInquiry, json!({})), None)
                    .await;
                assert!(response.succeeded);
            }
        })
    };

    for i in 0..20 {
        let id = format!("transient-{i}");
        registry.register_handler(Arc::new(StubHandler::universal(id.as_str())));
        assert!(registry.unregister_handler(&id));
    }

    dispatcher.await.unwrap();
    assert_eq!(
        registry.get_handler("stable").unwrap().metrics().total_requests,
        20
    );
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_health_reads_stay_consistent_under_load() {
    let registry = Arc::new(registry_with(
        Arc::new(StaticRoutingOracle::new("mixed")),
        vec![Arc::new(
            StubHandler::universal("mixed").with_delay(Duration::from_millis(2)),
        )],
    ));

    let dispatcher = {
        let registry = Arc::clone(&registry);
        tokio::spawn(async move {
            let tasks = (0..CONCURRENT_TASKS).map(|i| {
                let registry = Arc::clone(&registry);
                async move {
                    let task = task(TaskKind::LeaveManagement, json!({"request": i}));
                    registry.execute_task(&task, None).await
                }
            });
            join_all(tasks).await
        })
    };

    let mut last_total = 0;
    while !dispatcher.is_finished() {
        let health = registry.get_system_health();
        assert!(health.active_handlers <= health.total_handlers);
        assert!((0.0..=1.0).contains(&health.success_rate));
        assert!(health.total_requests >= last_total);
        last_total = health.total_requests;

        // Every counted request is either in flight or finished
        for snapshot in registry.handler_snapshots() {
            let (status, metrics) = (snapshot.status, snapshot.metrics);
            assert_eq!(
                status.in_flight + metrics.success_count + metrics.error_count,
                metrics.total_requests,
                "{}",
                snapshot.handler_id
            );
        }
        tokio::task::yield_now().await;
    }

    assert!(dispatcher.await.unwrap().iter().all(|r| r.succeeded));
    let health = registry.get_system_health();
    assert_eq!(health.total_requests, 2 * CONCURRENT_TASKS as u64);
    assert_eq!(health.success_rate, 1.0);
}
