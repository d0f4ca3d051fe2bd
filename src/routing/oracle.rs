//! Routing oracle interface
//!
//! The coordinator never decides on its own which handler gets a task; it asks a
//! [`RoutingOracle`]. The production oracle is LLM-backed
//! ([`super::llm_oracle::LlmRoutingOracle`]); tests inject deterministic ones.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::DispatchResult;
use crate::task::{ExecutionContext, Task};

/// A handler the oracle may pick
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoutingCandidate {
    pub name: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub description: String,
}

impl RoutingCandidate {
    pub fn new(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
        }
    }
}

/// Which handler should process a task, and how sure the oracle is
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoutingDecision {
    pub selected_handler: String,
    pub confidence: f64,
    pub reasoning: String,
}

#[async_trait]
pub trait RoutingOracle: Send + Sync {
    /// Pick one of `candidates` for `task`
    ///
    /// The returned name is not guaranteed to be among the candidates; the
    /// coordinator checks it against the live handler table.
    async fn decide(
        &self,
        task: &Task,
        context: Option<&ExecutionContext>,
        candidates: &[RoutingCandidate],
    ) -> DispatchResult<RoutingDecision>;
}
