//! Coordinator: the universal-entry handler
//!
//! Holds no business logic. For every task it asks the routing oracle which
//! registered handler should take it, then delegates through that handler's
//! [`ManagedHandler::execute`] so the delegate's own metrics and activity log
//! are updated. A selection that does not name a registered handler is a
//! routing failure; there is no fallback.

use async_trait::async_trait;
use serde_json::json;
use std::sync::Arc;
use tracing::{debug, info, Instrument};

use crate::error::{DispatchError, DispatchResult};
use crate::handler::{Capability, ManagedHandler, TaskHandler};
use crate::registry::HandlerTable;
use crate::routing::RoutingOracle;
use crate::task::{ExecutionContext, HandlerResponse, Task};

pub const COORDINATOR_ID: &str = "coordinator";

pub struct Coordinator {
    table: HandlerTable,
    oracle: Arc<dyn RoutingOracle>,
}

impl Coordinator {
    pub fn new(table: HandlerTable, oracle: Arc<dyn RoutingOracle>) -> Self {
        Self { table, oracle }
    }

    /// Add or replace a handler, returning the one it replaced
    pub fn register(&self, handler: Arc<ManagedHandler>) -> Option<Arc<ManagedHandler>> {
        self.table.insert(handler)
    }

    pub fn unregister(&self, name: &str) -> bool {
        self.table.remove(name).is_some()
    }

    pub fn table(&self) -> &HandlerTable {
        &self.table
    }
}

#[async_trait]
impl TaskHandler for Coordinator {
    fn id(&self) -> &str {
        COORDINATOR_ID
    }

    fn description(&self) -> &str {
        "Routes every task to the registered handler selected by the routing oracle"
    }

    fn capabilities(&self) -> Vec<Capability> {
        vec![Capability::new(
            "task_routing",
            "Select a handler for any task kind and delegate to it",
        )
        .with_output_schema(json!({
            "routing_decision": {
                "selected_handler": "string",
                "confidence": "number",
                "reasoning": "string"
            },
            "delegated_response": "HandlerResponse"
        }))]
    }

    fn can_handle(&self, _task: &Task) -> bool {
        true
    }

    async fn process_task(
        &self,
        task: &Task,
        context: Option<&ExecutionContext>,
    ) -> DispatchResult<HandlerResponse> {
        if self.table.is_empty() {
            return Err(DispatchError::EmptyRegistry);
        }

        let candidates = self.table.candidates();
        debug!(candidates = candidates.len(), "Asking routing oracle");
        let decision = self
            .oracle
            .decide(task, context, &candidates)
            .instrument(crate::routing_span!(task_id = %task.id, candidates = candidates.len()))
            .await?;

        let delegate = self
            .table
            .get(&decision.selected_handler)
            .ok_or_else(|| DispatchError::handler_not_found(&decision.selected_handler))?;

        info!(
            task_id = %task.id,
            selected_handler = %decision.selected_handler,
            confidence = decision.confidence,
            "Delegating task"
        );
        let delegated = delegate.execute(task, context).await;

        let response = HandlerResponse {
            task_id: task.id.clone(),
            handler_id: COORDINATOR_ID.to_string(),
            succeeded: delegated.succeeded,
            error_message: delegated.error_message.clone(),
            output: json!({
                "routing_decision": decision,
                "delegated_response": delegated,
            }),
            confidence: None,
            processing_time_ms: 0,
            completed_at: chrono::Utc::now(),
        };
        Ok(response.with_confidence(decision.confidence))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handler::ActivityLogger;
    use crate::task::{create_task, TaskKind, TaskOptions};
    use crate::testing::mocks::{FailingRoutingOracle, StaticRoutingOracle, StubHandler};
    use serde_json::Map;

    fn managed(handler: StubHandler) -> Arc<ManagedHandler> {
        Arc::new(ManagedHandler::new(
            Arc::new(handler),
            ActivityLogger::disabled(),
        ))
    }

    fn task() -> Task {
        create_task(TaskKind::LeaveManagement, Map::new(), TaskOptions::default())
    }

    #[tokio::test]
    async fn test_empty_table_is_error() {
        let coordinator = Coordinator::new(
            HandlerTable::new(),
            Arc::new(StaticRoutingOracle::new("leave")),
        );

        let error = coordinator.process_task(&task(), None).await.unwrap_err();
        assert!(matches!(error, DispatchError::EmptyRegistry));
        assert_eq!(error.to_string(), "Routing failed: no handlers registered");
    }

    #[tokio::test]
    async fn test_delegates_to_selected_handler() {
        let oracle = Arc::new(StaticRoutingOracle::new("leave").with_confidence(0.75));
        let coordinator = Coordinator::new(HandlerTable::new(), oracle.clone());
        let leave = managed(StubHandler::new("leave", vec![TaskKind::LeaveManagement]));
        coordinator.register(leave.clone());
        coordinator.register(managed(StubHandler::universal("other")));

        let response = coordinator.process_task(&task(), None).await.unwrap();

        assert!(response.succeeded);
        assert_eq!(response.handler_id, COORDINATOR_ID);
        assert_eq!(response.confidence, Some(0.75));
        assert_eq!(response.output["routing_decision"]["selected_handler"], "leave");
        assert_eq!(response.output["delegated_response"]["handler_id"], "leave");
        assert_eq!(leave.metrics().total_requests, 1);
        assert_eq!(oracle.last_candidates(), vec!["leave", "other"]);
    }

    #[tokio::test]
    async fn test_unknown_selection_leaves_handlers_untouched() {
        let coordinator = Coordinator::new(
            HandlerTable::new(),
            Arc::new(StaticRoutingOracle::new("ghost")),
        );
        let leave = managed(StubHandler::new("leave", vec![TaskKind::LeaveManagement]));
        coordinator.register(leave.clone());

        let error = coordinator.process_task(&task(), None).await.unwrap_err();

        assert_eq!(
            error.to_string(),
            "Routing failed: selected handler 'ghost' not found"
        );
        assert_eq!(leave.metrics().total_requests, 0);
    }

    #[tokio::test]
    async fn test_oracle_failure_propagates() {
        let coordinator = Coordinator::new(
            HandlerTable::new(),
            Arc::new(FailingRoutingOracle::new("model unavailable")),
        );
        coordinator.register(managed(StubHandler::universal("any")));

        let error = coordinator.process_task(&task(), None).await.unwrap_err();
        assert_eq!(error.category(), "routing_failure");
    }

    #[tokio::test]
    async fn test_delegated_failure_is_mirrored() {
        let coordinator = Coordinator::new(
            HandlerTable::new(),
            Arc::new(StaticRoutingOracle::new("broken")),
        );
        coordinator.register(managed(
            StubHandler::universal("broken").failing("ledger locked"),
        ));

        let response = coordinator.process_task(&task(), None).await.unwrap();

        assert!(!response.succeeded);
        assert!(response.error_message.unwrap().contains("ledger locked"));
        assert_eq!(response.output["delegated_response"]["succeeded"], false);
    }

    #[test]
    fn test_unregister() {
        let coordinator = Coordinator::new(
            HandlerTable::new(),
            Arc::new(StaticRoutingOracle::new("x")),
        );
        coordinator.register(managed(StubHandler::universal("x")));

        assert!(coordinator.unregister("x"));
        assert!(!coordinator.unregister("x"));
        assert!(coordinator.table().is_empty());
        assert!(coordinator.can_handle(&task()));
    }
}
