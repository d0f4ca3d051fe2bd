//! LLM-backed routing oracle
//!
//! Sends the task, its context and the candidate catalog to a text-generation
//! model together with a strict JSON schema, then validates the answer against
//! that same schema. Anything the model returns that is not a valid decision is
//! a routing failure; there is no fallback selection.

use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, info, warn};

use super::oracle::{RoutingCandidate, RoutingDecision, RoutingOracle};
use super::schema::RoutingDecisionOutput;
use crate::error::{DispatchError, DispatchResult};
use crate::llm::provider::{
    CompletionRequest, JsonSchemaDefinition, LlmProvider, Message, ResponseFormat,
};
use crate::task::{ExecutionContext, Task};

pub const DEFAULT_ROUTING_PROMPT: &str = "You are the dispatcher of an HR administration system. \
Pick the single handler best suited to process the task. Answer only with the requested JSON.";

const MAX_PRIOR_MESSAGES: usize = 5;

pub struct LlmRoutingOracle {
    provider: Arc<dyn LlmProvider>,
    model: String,
    temperature: f32,
    max_tokens: u32,
    system_prompt: String,
}

impl LlmRoutingOracle {
    pub fn new(provider: Arc<dyn LlmProvider>, model: impl Into<String>) -> Self {
        Self {
            provider,
            model: model.into(),
            // Low temperature for consistent routing
            temperature: 0.1,
            max_tokens: 500,
            system_prompt: DEFAULT_ROUTING_PROMPT.to_string(),
        }
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    pub fn with_system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.system_prompt = prompt.into();
        self
    }

    fn build_request(
        &self,
        task: &Task,
        context: Option<&ExecutionContext>,
        candidates: &[RoutingCandidate],
        schema: Value,
    ) -> CompletionRequest {
        let mut request = CompletionRequest {
            model: self.model.clone(),
            messages: vec![
                Message::system(&self.system_prompt),
                Message::user(Self::build_prompt(task, context, candidates)),
            ],
            temperature: Some(self.temperature),
            max_tokens: Some(self.max_tokens),
            response_format: Some(ResponseFormat::JsonSchema {
                json_schema: JsonSchemaDefinition {
                    name: "routing_decision".to_string(),
                    strict: Some(true),
                    schema,
                },
            }),
            ..Default::default()
        };
        request
            .metadata
            .insert("task_id".to_string(), task.id.clone());
        request
    }

    fn format_candidates(candidates: &[RoutingCandidate]) -> String {
        let mut output = String::from("AVAILABLE HANDLERS:\n");
        for candidate in candidates {
            if candidate.description.is_empty() {
                output.push_str(&format!("- {}\n", candidate.name));
            } else {
                output.push_str(&format!("- {}: {}\n", candidate.name, candidate.description));
            }
        }
        output
    }

    fn format_context(context: Option<&ExecutionContext>) -> String {
        let Some(context) = context else {
            return "No request context.".to_string();
        };

        let mut output = String::from("REQUEST CONTEXT:\n");
        if let Some(role) = &context.role {
            output.push_str(&format!("- requester role: {role}\n"));
        }
        if let Some(tenant) = &context.tenant_id {
            output.push_str(&format!("- tenant: {tenant}\n"));
        }
        if !context.prior_task_ids.is_empty() {
            output.push_str(&format!(
                "- prior tasks in session: {}\n",
                context.prior_task_ids.len()
            ));
        }

        let skip = context
            .prior_messages
            .len()
            .saturating_sub(MAX_PRIOR_MESSAGES);
        if context.prior_messages.len() > skip {
            output.push_str("RECENT CONVERSATION:\n");
            for message in &context.prior_messages[skip..] {
                output.push_str(&format!("{}: {}\n", message.role, message.content));
            }
        }
        output
    }

    fn build_prompt(
        task: &Task,
        context: Option<&ExecutionContext>,
        candidates: &[RoutingCandidate],
    ) -> String {
        let input = serde_json::to_string_pretty(&task.input)
            .unwrap_or_else(|_| "Invalid JSON".to_string());

        format!(
            r#"TASK:
- id: {}
- kind: {}
- priority: {}

TASK INPUT:
{}

{}

{}
Choose exactly one handler from the list above. Report your confidence between 0 and 1."#,
            task.id,
            task.kind,
            task.priority,
            input,
            Self::format_context(context),
            Self::format_candidates(candidates),
        )
    }

    /// Strip a Markdown code fence some models wrap JSON in
    fn strip_code_fence(content: &str) -> &str {
        let trimmed = content.trim();
        let Some(rest) = trimmed.strip_prefix("```") else {
            return trimmed;
        };
        let rest = rest.strip_prefix("json").unwrap_or(rest);
        rest.strip_suffix("```").unwrap_or(rest).trim()
    }

    fn parse_decision(content: &str, schema: &Value) -> DispatchResult<RoutingDecision> {
        let value: Value = serde_json::from_str(Self::strip_code_fence(content)).map_err(|e| {
            warn!(error = %e, response = %content, "Failed to parse routing decision");
            DispatchError::routing_failed(format!("unparseable routing decision: {e}"))
        })?;

        let validator = jsonschema::validator_for(schema).map_err(|e| {
            DispatchError::internal(format!("routing schema compilation error: {e}"))
        })?;
        validator.validate(&value).map_err(|errors| {
            let messages: Vec<String> = errors
                .map(|e| format!("At '{}': {}", e.instance_path, e))
                .collect();
            DispatchError::routing_failed(format!(
                "invalid routing decision: {}",
                messages.join("; ")
            ))
        })?;

        let output: RoutingDecisionOutput = serde_json::from_value(value).map_err(|e| {
            DispatchError::routing_failed(format!("invalid routing decision: {e}"))
        })?;
        Ok(output.into())
    }
}

#[async_trait]
impl RoutingOracle for LlmRoutingOracle {
    async fn decide(
        &self,
        task: &Task,
        context: Option<&ExecutionContext>,
        candidates: &[RoutingCandidate],
    ) -> DispatchResult<RoutingDecision> {
        if candidates.is_empty() {
            return Err(DispatchError::routing_failed("no candidate handlers"));
        }

        let names: Vec<String> = candidates.iter().map(|c| c.name.clone()).collect();
        let schema = RoutingDecisionOutput::json_schema(&names)
            .map_err(|e| DispatchError::internal(format!("routing schema error: {e}")))?;

        let request = self.build_request(task, context, candidates, schema.clone());
        debug!(
            "Routing prompt:\n{}",
            request
                .messages
                .last()
                .map(|m| m.content.as_str())
                .unwrap_or_default()
        );

        let response = self.provider.complete(request).await.map_err(|e| {
            warn!(provider = self.provider.name(), error = %e, "Routing request failed");
            DispatchError::routing_failed(format!("oracle request failed: {e}"))
        })?;

        let content = response
            .content
            .ok_or_else(|| DispatchError::routing_failed("no content in oracle response"))?;

        let decision = Self::parse_decision(&content, &schema)?;
        info!(
            selected_handler = %decision.selected_handler,
            confidence = decision.confidence,
            reasoning = %decision.reasoning,
            "Routing decision received"
        );
        Ok(decision)
    }
}
