//! Handler base: uniform lifecycle around every handler invocation
//!
//! [`ManagedHandler`] owns the status and metrics of exactly one handler. Every
//! call goes through [`ManagedHandler::execute`], which
//!
//! 1. bumps the in-flight and total-request counters,
//! 2. records a `task_started` activity entry,
//! 3. rejects tasks the handler cannot accept,
//! 4. runs `process_task`, timing it and folding the elapsed time into the
//!    running average on success,
//! 5. converts any error or panic into a `succeeded: false` response.
//!
//! Nothing a handler does can make `execute` return an error or unwind past it.

use chrono::{DateTime, Utc};
use futures::FutureExt;
use serde::Serialize;
use serde_json::{json, Value};
use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Instant;
use tracing::{debug, warn, Instrument};

use super::activity::{ActivityAction, ActivityEntry, ActivityLogger};
use super::{Capability, TaskHandler};
use crate::error::DispatchError;
use crate::task::{ExecutionContext, HandlerResponse, Task};

const UNSPECIFIED_FAILURE: &str = "handler reported failure without a message";

/// Liveness view of a handler
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HandlerStatus {
    pub active: bool,
    pub healthy: bool,
    pub last_heartbeat: DateTime<Utc>,
    /// Number of tasks currently inside `execute`
    pub in_flight: u64,
}

/// Cumulative execution statistics of a handler
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct HandlerMetrics {
    pub total_requests: u64,
    pub success_count: u64,
    pub error_count: u64,
    pub average_response_time_ms: f64,
}

impl HandlerMetrics {
    /// `(total - errors) / total`, or 1.0 before the first request
    pub fn success_rate(&self) -> f64 {
        if self.total_requests == 0 {
            1.0
        } else {
            self.total_requests.saturating_sub(self.error_count) as f64
                / self.total_requests as f64
        }
    }
}

/// Point-in-time copy of everything known about a handler
#[derive(Debug, Clone, Serialize)]
pub struct HandlerSnapshot {
    pub handler_id: String,
    pub description: String,
    pub capabilities: Vec<Capability>,
    pub status: HandlerStatus,
    pub metrics: HandlerMetrics,
    pub success_rate: f64,
}

#[derive(Debug)]
struct HandlerState {
    status: HandlerStatus,
    metrics: HandlerMetrics,
}

/// A handler together with its exclusively-owned status and metrics
pub struct ManagedHandler {
    handler: Arc<dyn TaskHandler>,
    state: Mutex<HandlerState>,
    activity: ActivityLogger,
}

impl std::fmt::Debug for ManagedHandler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ManagedHandler")
            .field("id", &self.handler.id())
            .finish_non_exhaustive()
    }
}

impl ManagedHandler {
    pub fn new(handler: Arc<dyn TaskHandler>, activity: ActivityLogger) -> Self {
        Self {
            handler,
            state: Mutex::new(HandlerState {
                status: HandlerStatus {
                    active: true,
                    healthy: true,
                    last_heartbeat: Utc::now(),
                    in_flight: 0,
                },
                metrics: HandlerMetrics::default(),
            }),
            activity,
        }
    }

    pub fn id(&self) -> &str {
        self.handler.id()
    }

    pub fn handler(&self) -> Arc<dyn TaskHandler> {
        Arc::clone(&self.handler)
    }

    pub fn can_handle(&self, task: &Task) -> bool {
        self.handler.can_handle(task)
    }

    /// Copy of the current status
    pub fn status(&self) -> HandlerStatus {
        self.lock_state().status.clone()
    }

    /// Copy of the current metrics
    pub fn metrics(&self) -> HandlerMetrics {
        self.lock_state().metrics.clone()
    }

    /// Status and metrics read under one lock
    pub fn status_and_metrics(&self) -> (HandlerStatus, HandlerMetrics) {
        let state = self.lock_state();
        (state.status.clone(), state.metrics.clone())
    }

    pub fn snapshot(&self) -> HandlerSnapshot {
        let (status, metrics) = self.status_and_metrics();

        HandlerSnapshot {
            handler_id: self.id().to_string(),
            description: self.handler.description().to_string(),
            capabilities: self.handler.capabilities(),
            success_rate: metrics.success_rate(),
            status,
            metrics,
        }
    }

    pub fn set_active(&self, active: bool) {
        self.lock_state().status.active = active;
    }

    /// Refresh the heartbeat and report health
    ///
    /// Unhealthy only when the state lock has been poisoned.
    pub fn health_check(&self) -> bool {
        let poisoned = self.state.is_poisoned();
        let mut state = self.lock_state();
        state.status.last_heartbeat = Utc::now();
        state.status.healthy = !poisoned;
        state.status.healthy
    }

    /// Run the task through the handler with full bookkeeping
    pub async fn execute(&self, task: &Task, context: Option<&ExecutionContext>) -> HandlerResponse {
        let handler_id = self.id().to_string();
        let span = crate::handler_span!(
            handler_id = %handler_id,
            task_id = %task.id,
            kind = %task.kind
        );

        async move {
            let started = Instant::now();
            self.begin_request();
            self.activity.log(ActivityEntry::new(
                &handler_id,
                ActivityAction::TaskStarted,
                &task.id,
                Value::Object(task.input.clone()),
                json!({}),
            ));

            let outcome = if self.handler.can_handle(task) {
                match AssertUnwindSafe(self.handler.process_task(task, context))
                    .catch_unwind()
                    .await
                {
                    Ok(result) => result,
                    Err(payload) => Err(DispatchError::execution_failed(panic_message(
                        payload.as_ref(),
                    ))),
                }
            } else {
                Err(DispatchError::capability_mismatch(&handler_id, task.kind))
            };

            let elapsed_ms = started.elapsed().as_millis() as u64;

            match outcome {
                Ok(mut response) if response.succeeded => {
                    self.record_success(elapsed_ms);
                    response.processing_time_ms = elapsed_ms;
                    debug!(elapsed_ms, "Task completed");
                    self.activity.log(ActivityEntry::new(
                        &handler_id,
                        ActivityAction::TaskCompleted,
                        &task.id,
                        Value::Object(task.input.clone()),
                        response.output.clone(),
                    ));
                    response
                }
                Ok(mut response) => {
                    self.record_failure();
                    response.processing_time_ms = elapsed_ms;
                    response.confidence = Some(0.0);
                    let message = response
                        .error_message
                        .get_or_insert_with(|| UNSPECIFIED_FAILURE.to_string())
                        .clone();
                    warn!(elapsed_ms, error = %message, "Task reported failure");
                    self.activity.log(ActivityEntry::new(
                        &handler_id,
                        ActivityAction::TaskErrored,
                        &task.id,
                        Value::Object(task.input.clone()),
                        json!({ "error": message }),
                    ));
                    response
                }
                Err(e) => {
                    self.record_failure();
                    let message = e.public_message();
                    warn!(
                        elapsed_ms,
                        category = e.category(),
                        error = %message,
                        "Task failed"
                    );
                    self.activity.log(ActivityEntry::new(
                        &handler_id,
                        ActivityAction::TaskErrored,
                        &task.id,
                        Value::Object(task.input.clone()),
                        json!({ "error": message, "category": e.category() }),
                    ));
                    HandlerResponse::failure(&task.id, &handler_id, message)
                        .with_processing_time(elapsed_ms)
                }
            }
        }
        .instrument(span)
        .await
    }

    fn begin_request(&self) {
        let mut state = self.lock_state();
        state.status.in_flight += 1;
        state.metrics.total_requests += 1;
    }

    fn record_success(&self, elapsed_ms: u64) {
        let mut state = self.lock_state();
        state.status.in_flight = state.status.in_flight.saturating_sub(1);
        state.metrics.success_count += 1;

        let n = state.metrics.total_requests.max(1) as f64;
        let previous = state.metrics.average_response_time_ms;
        state.metrics.average_response_time_ms = (previous * (n - 1.0) + elapsed_ms as f64) / n;
    }

    fn record_failure(&self) {
        let mut state = self.lock_state();
        state.status.in_flight = state.status.in_flight.saturating_sub(1);
        state.metrics.error_count += 1;
    }

    fn lock_state(&self) -> MutexGuard<'_, HandlerState> {
        self.state
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        format!("handler panicked: {message}")
    } else if let Some(message) = payload.downcast_ref::<String>() {
        format!("handler panicked: {message}")
    } else {
        "handler panicked".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::task::{create_task, TaskKind, TaskOptions};
    use crate::testing::mocks::{RecordingActivitySink, StubHandler};
    use serde_json::Map;
    use std::time::Duration;

    fn task(kind: TaskKind) -> Task {
        create_task(kind, Map::new(), TaskOptions::default())
    }

    fn managed(handler: StubHandler) -> ManagedHandler {
        ManagedHandler::new(Arc::new(handler), ActivityLogger::disabled())
    }

    #[tokio::test]
    async fn test_successful_execution_updates_metrics() {
        let handler = managed(StubHandler::new("leave", vec![TaskKind::LeaveManagement]));

        let response = handler.execute(&task(TaskKind::LeaveManagement), None).await;

        assert!(response.succeeded);
        assert_eq!(response.handler_id, "leave");
        let metrics = handler.metrics();
        assert_eq!(metrics.total_requests, 1);
        assert_eq!(metrics.success_count, 1);
        assert_eq!(metrics.error_count, 0);
        assert_eq!(handler.status().in_flight, 0);
    }

    #[tokio::test]
    async fn test_processing_time_is_measured() {
        let handler = managed(
            StubHandler::new("slow", vec![TaskKind::Recruitment])
                .with_delay(Duration::from_millis(20)),
        );

        let response = handler.execute(&task(TaskKind::Recruitment), None).await;

        assert!(response.processing_time_ms >= 20);
        assert!(handler.metrics().average_response_time_ms >= 20.0);
    }

    #[tokio::test]
    async fn test_capability_mismatch_is_error_response() {
        let handler = managed(StubHandler::new("leave", vec![TaskKind::LeaveManagement]));

        let response = handler.execute(&task(TaskKind::Recruitment), None).await;

        assert!(!response.succeeded);
        assert_eq!(
            response.error_message.as_deref(),
            Some("handler cannot process task kind recruitment")
        );
        assert_eq!(handler.metrics().error_count, 1);
        assert_eq!(handler.status().in_flight, 0);
    }

    #[tokio::test]
    async fn test_error_increments_error_count_exactly_once() {
        let handler = managed(
            StubHandler::new("broken", vec![TaskKind::GeneralInquiry]).failing("database offline"),
        );
        let before = handler.status().in_flight;

        let response = handler.execute(&task(TaskKind::GeneralInquiry), None).await;

        assert!(!response.succeeded);
        assert!(response
            .error_message
            .as_deref()
            .unwrap()
            .contains("database offline"));
        assert_eq!(response.confidence, Some(0.0));
        assert_eq!(handler.metrics().error_count, 1);
        assert_eq!(handler.metrics().success_count, 0);
        assert_eq!(handler.status().in_flight, before);
    }

    #[tokio::test]
    async fn test_panic_is_contained() {
        let handler = managed(
            StubHandler::new("explosive", vec![TaskKind::GeneralInquiry]).panicking("boom"),
        );

        let response = handler.execute(&task(TaskKind::GeneralInquiry), None).await;

        assert!(!response.succeeded);
        assert!(response.error_message.unwrap().contains("boom"));
        assert_eq!(handler.metrics().error_count, 1);
        assert_eq!(handler.status().in_flight, 0);
        assert!(handler.health_check());
    }

    #[tokio::test]
    async fn test_reported_failure_counts_as_error() {
        let handler = managed(
            StubHandler::new("declines", vec![TaskKind::GeneralInquiry])
                .reporting_failure("missing employee id"),
        );

        let response = handler.execute(&task(TaskKind::GeneralInquiry), None).await;

        assert!(!response.succeeded);
        assert_eq!(response.error_message.as_deref(), Some("missing employee id"));
        assert_eq!(handler.metrics().error_count, 1);
    }

    #[tokio::test]
    async fn test_running_average_folds_by_request_count() {
        let handler = managed(StubHandler::new("avg", vec![TaskKind::GeneralInquiry]));

        handler.record_success(10);
        handler.begin_request();
        handler.begin_request();
        handler.record_success(40);

        // First fold uses n=1 (total still 0, clamped), second uses n=2
        let metrics = handler.metrics();
        assert_eq!(metrics.total_requests, 2);
        assert!((metrics.average_response_time_ms - 25.0).abs() < f64::EPSILON);
    }

    #[tokio::test]
    async fn test_activity_entries_recorded() {
        let sink = Arc::new(RecordingActivitySink::new());
        let (logger, _writer) = ActivityLogger::spawn(sink.clone(), 16);
        let handler = ManagedHandler::new(
            Arc::new(StubHandler::new("audited", vec![TaskKind::PolicyInquiry])),
            logger,
        );

        handler.execute(&task(TaskKind::PolicyInquiry), None).await;
        handler.execute(&task(TaskKind::Recruitment), None).await;

        let entries = sink.wait_for(4, Duration::from_secs(1)).await;
        let actions: Vec<_> = entries.iter().map(|e| e.action).collect();
        assert_eq!(
            actions,
            vec![
                ActivityAction::TaskStarted,
                ActivityAction::TaskCompleted,
                ActivityAction::TaskStarted,
                ActivityAction::TaskErrored,
            ]
        );
        assert!(entries.iter().all(|e| e.handler_id == "audited"));
    }

    #[tokio::test]
    async fn test_snapshot_is_a_copy() {
        let handler = managed(StubHandler::new("snap", vec![TaskKind::GeneralInquiry]));
        let snapshot = handler.snapshot();

        handler.execute(&task(TaskKind::GeneralInquiry), None).await;

        assert_eq!(snapshot.metrics.total_requests, 0);
        assert_eq!(snapshot.success_rate, 1.0);
        assert_eq!(handler.snapshot().metrics.total_requests, 1);
    }

    #[test]
    fn test_health_check_refreshes_heartbeat() {
        let handler = managed(StubHandler::new("hb", vec![TaskKind::GeneralInquiry]));
        let before = handler.status().last_heartbeat;

        std::thread::sleep(Duration::from_millis(5));
        assert!(handler.health_check());

        assert!(handler.status().last_heartbeat > before);
        assert!(handler.status().healthy);
    }

    #[test]
    fn test_set_active() {
        let handler = managed(StubHandler::new("toggle", vec![TaskKind::GeneralInquiry]));
        handler.set_active(false);
        assert!(!handler.status().active);
    }

    #[test]
    fn test_success_rate() {
        let metrics = HandlerMetrics {
            total_requests: 4,
            success_count: 3,
            error_count: 1,
            average_response_time_ms: 0.0,
        };
        assert_eq!(metrics.success_rate(), 0.75);
        assert_eq!(HandlerMetrics::default().success_rate(), 1.0);
    }
}
