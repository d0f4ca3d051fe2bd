//! Mock implementations for testing
//!
//! Deterministic stand-ins for the LLM provider, the routing oracle, the
//! activity sink and task handlers, so the dispatch path can be exercised
//! without network access.

use crate::error::{DispatchError, DispatchResult};
use crate::handler::{ActivityEntry, ActivityError, ActivitySink, Capability, TaskHandler};
use crate::llm::provider::{
    CompletionRequest, CompletionResponse, FinishReason, LlmError, LlmProvider, TokenUsage,
};
use crate::routing::{RoutingCandidate, RoutingDecision, RoutingOracle};
use crate::task::{ExecutionContext, HandlerResponse, Task, TaskKind};
use async_trait::async_trait;
use serde_json::json;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;

/// Mock LLM provider for testing
///
/// Cycles through `responses` and records every request it receives.
#[derive(Debug, Default)]
pub struct MockLlmProvider {
    pub responses: Vec<String>,
    pub current_response: Arc<Mutex<usize>>,
    pub failure: Option<String>,
    requests: Arc<Mutex<Vec<CompletionRequest>>>,
    calls: AtomicUsize,
}

impl MockLlmProvider {
    pub fn new(responses: Vec<String>) -> Self {
        Self {
            responses,
            ..Default::default()
        }
    }

    pub fn single_response(response: impl Into<String>) -> Self {
        Self::new(vec![response.into()])
    }

    pub fn failing(message: impl Into<String>) -> Self {
        Self {
            failure: Some(message.into()),
            ..Default::default()
        }
    }

    pub fn with_failure() -> Self {
        Self::failing("Mock LLM failure")
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub async fn requests(&self) -> Vec<CompletionRequest> {
        self.requests.lock().await.clone()
    }

    pub async fn last_request(&self) -> Option<CompletionRequest> {
        self.requests.lock().await.last().cloned()
    }
}

#[async_trait]
impl LlmProvider for MockLlmProvider {
    fn name(&self) -> &str {
        "mock"
    }

    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse, LlmError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.requests.lock().await.push(request);

        if let Some(message) = &self.failure {
            return Err(LlmError::RequestFailed(message.clone()));
        }

        let mut current = self.current_response.lock().await;
        let response_idx = *current % self.responses.len().max(1);
        *current += 1;

        let content = if self.responses.is_empty() {
            "Mock response".to_string()
        } else {
            self.responses[response_idx].clone()
        };

        Ok(CompletionResponse {
            content: Some(content),
            model: "mock-model".to_string(),
            usage: TokenUsage {
                prompt_tokens: 10,
                completion_tokens: 5,
                total_tokens: 15,
            },
            finish_reason: FinishReason::Stop,
            metadata: HashMap::new(),
        })
    }

    async fn health_check(&self) -> Result<(), LlmError> {
        match &self.failure {
            Some(message) => Err(LlmError::RequestFailed(message.clone())),
            None => Ok(()),
        }
    }
}

/// Oracle that always selects the same handler
#[derive(Debug)]
pub struct StaticRoutingOracle {
    selection: String,
    confidence: f64,
    calls: AtomicUsize,
    last_candidates: std::sync::Mutex<Vec<String>>,
}

impl StaticRoutingOracle {
    pub fn new(selection: impl Into<String>) -> Self {
        Self {
            selection: selection.into(),
            confidence: 0.9,
            calls: AtomicUsize::new(0),
            last_candidates: std::sync::Mutex::new(Vec::new()),
        }
    }

    pub fn with_confidence(mut self, confidence: f64) -> Self {
        self.confidence = confidence;
        self
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Candidate names seen on the most recent call
    pub fn last_candidates(&self) -> Vec<String> {
        self.last_candidates
            .lock()
            .map(|names| names.clone())
            .unwrap_or_default()
    }
}

#[async_trait]
impl RoutingOracle for StaticRoutingOracle {
    async fn decide(
        &self,
        _task: &Task,
        _context: Option<&ExecutionContext>,
        candidates: &[RoutingCandidate],
    ) -> DispatchResult<RoutingDecision> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Ok(mut names) = self.last_candidates.lock() {
            *names = candidates.iter().map(|c| c.name.clone()).collect();
        }

        Ok(RoutingDecision {
            selected_handler: self.selection.clone(),
            confidence: self.confidence,
            reasoning: format!("static selection of {}", self.selection),
        })
    }
}

/// Oracle that routes by task kind, for multi-handler scenarios
#[derive(Debug, Default)]
pub struct KindRoutingOracle {
    routes: HashMap<TaskKind, String>,
    fallback: Option<String>,
}

impl KindRoutingOracle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn route(mut self, kind: TaskKind, handler: impl Into<String>) -> Self {
        self.routes.insert(kind, handler.into());
        self
    }

    pub fn otherwise(mut self, handler: impl Into<String>) -> Self {
        self.fallback = Some(handler.into());
        self
    }
}

#[async_trait]
impl RoutingOracle for KindRoutingOracle {
    async fn decide(
        &self,
        task: &Task,
        _context: Option<&ExecutionContext>,
        _candidates: &[RoutingCandidate],
    ) -> DispatchResult<RoutingDecision> {
        let selected = self
            .routes
            .get(&task.kind)
            .or(self.fallback.as_ref())
            .ok_or_else(|| DispatchError::routing_failed(format!("no route for {}", task.kind)))?;

        Ok(RoutingDecision {
            selected_handler: selected.clone(),
            confidence: 1.0,
            reasoning: format!("{} is routed to {selected}", task.kind),
        })
    }
}

/// Oracle that always fails
#[derive(Debug)]
pub struct FailingRoutingOracle {
    message: String,
}

impl FailingRoutingOracle {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

impl Default for FailingRoutingOracle {
    fn default() -> Self {
        Self::new("Mock oracle failure")
    }
}

#[async_trait]
impl RoutingOracle for FailingRoutingOracle {
    async fn decide(
        &self,
        _task: &Task,
        _context: Option<&ExecutionContext>,
        _candidates: &[RoutingCandidate],
    ) -> DispatchResult<RoutingDecision> {
        Err(DispatchError::routing_failed(self.message.clone()))
    }
}

/// Activity sink keeping every entry in memory
#[derive(Debug, Default)]
pub struct RecordingActivitySink {
    entries: Mutex<Vec<ActivityEntry>>,
}

impl RecordingActivitySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn entries(&self) -> Vec<ActivityEntry> {
        self.entries.lock().await.clone()
    }

    /// Wait until at least `count` entries arrived or `timeout` elapsed
    pub async fn wait_for(&self, count: usize, timeout: Duration) -> Vec<ActivityEntry> {
        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            let entries = self.entries().await;
            if entries.len() >= count || tokio::time::Instant::now() >= deadline {
                return entries;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    }
}

#[async_trait]
impl ActivitySink for RecordingActivitySink {
    async fn record(&self, entry: &ActivityEntry) -> Result<(), ActivityError> {
        self.entries.lock().await.push(entry.clone());
        Ok(())
    }
}

/// Activity sink rejecting every entry
#[derive(Debug, Default)]
pub struct FailingActivitySink;

#[async_trait]
impl ActivitySink for FailingActivitySink {
    async fn record(&self, _entry: &ActivityEntry) -> Result<(), ActivityError> {
        Err(ActivityError::Rejected("Mock sink failure".to_string()))
    }
}

#[derive(Debug, Clone)]
enum StubBehavior {
    Succeed,
    Fail(String),
    ReportFailure(String),
    Panic(String),
}

/// Configurable handler for exercising the dispatch path
///
/// By default it succeeds with `{"handled_by", "kind", "input"}`.
#[derive(Debug)]
pub struct StubHandler {
    id: String,
    kinds: Vec<TaskKind>,
    behavior: StubBehavior,
    delay: Option<Duration>,
    calls: AtomicUsize,
}

impl StubHandler {
    pub fn new(id: impl Into<String>, kinds: Vec<TaskKind>) -> Self {
        Self {
            id: id.into(),
            kinds,
            behavior: StubBehavior::Succeed,
            delay: None,
            calls: AtomicUsize::new(0),
        }
    }

    /// Handler accepting every task kind
    pub fn universal(id: impl Into<String>) -> Self {
        Self::new(id, TaskKind::ALL.to_vec())
    }

    /// Return `Err(ExecutionFailed)` from `process_task`
    pub fn failing(mut self, message: impl Into<String>) -> Self {
        self.behavior = StubBehavior::Fail(message.into());
        self
    }

    /// Return `Ok` with a `succeeded: false` response
    pub fn reporting_failure(mut self, message: impl Into<String>) -> Self {
        self.behavior = StubBehavior::ReportFailure(message.into());
        self
    }

    pub fn panicking(mut self, message: impl Into<String>) -> Self {
        self.behavior = StubBehavior::Panic(message.into());
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl TaskHandler for StubHandler {
    fn id(&self) -> &str {
        &self.id
    }

    fn description(&self) -> &str {
        "Stub handler for tests"
    }

    fn capabilities(&self) -> Vec<Capability> {
        self.kinds
            .iter()
            .map(|kind| Capability::new(kind.as_str(), "stubbed"))
            .collect()
    }

    fn can_handle(&self, task: &Task) -> bool {
        self.kinds.contains(&task.kind)
    }

    async fn process_task(
        &self,
        task: &Task,
        _context: Option<&ExecutionContext>,
    ) -> DispatchResult<HandlerResponse> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        match &self.behavior {
            StubBehavior::Succeed => Ok(HandlerResponse::success(
                &task.id,
                &self.id,
                json!({
                    "handled_by": self.id,
                    "kind": task.kind,
                    "input": task.input,
                }),
            )
            .with_confidence(1.0)),
            StubBehavior::Fail(message) => Err(DispatchError::execution_failed(message.clone())),
            StubBehavior::ReportFailure(message) => {
                Ok(HandlerResponse::failure(&task.id, &self.id, message.clone()))
            }
            StubBehavior::Panic(message) => panic!("{message}"),
        }
    }
}
