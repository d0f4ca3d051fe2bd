//! LLM-backed assistant for conversational HR task kinds

use async_trait::async_trait;
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::debug;

use crate::error::{DispatchError, DispatchResult};
use crate::handler::{Capability, TaskHandler};
use crate::llm::provider::{CompletionRequest, LlmProvider, Message};
use crate::task::{ExecutionContext, HandlerResponse, Task, TaskKind};

pub const ASSISTANT_HANDLER_ID: &str = "hr-assistant";

pub const DEFAULT_ASSISTANT_PROMPT: &str = "You are an HR assistant for a Malaysian company. \
Answer accurately and concisely. When a question needs data you do not have, say what is missing.";

/// Kinds served when none are configured
pub fn default_assistant_kinds() -> Vec<TaskKind> {
    TaskKind::ALL
        .into_iter()
        .filter(|kind| {
            !matches!(
                kind,
                TaskKind::PayrollCalculation | TaskKind::PayrollCompliance
            )
        })
        .collect()
}

/// Input keys read, in order, as the user's question
const QUESTION_KEYS: [&str; 3] = ["query", "question", "message"];

pub struct AssistantHandler {
    provider: Arc<dyn LlmProvider>,
    model: String,
    system_prompt: String,
    temperature: Option<f32>,
    max_tokens: Option<u32>,
    kinds: Vec<TaskKind>,
}

impl AssistantHandler {
    pub fn new(provider: Arc<dyn LlmProvider>, model: impl Into<String>) -> Self {
        Self {
            provider,
            model: model.into(),
            system_prompt: DEFAULT_ASSISTANT_PROMPT.to_string(),
            temperature: None,
            max_tokens: None,
            kinds: default_assistant_kinds(),
        }
    }

    pub fn with_system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.system_prompt = prompt.into();
        self
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }

    pub fn with_kinds(mut self, kinds: Vec<TaskKind>) -> Self {
        self.kinds = kinds;
        self
    }

    pub fn kinds(&self) -> &[TaskKind] {
        &self.kinds
    }

    fn user_message(task: &Task) -> String {
        let question = QUESTION_KEYS
            .iter()
            .find_map(|key| task.input_field(key).and_then(Value::as_str));

        let mut details = task.input.clone();
        for key in QUESTION_KEYS {
            details.remove(key);
        }

        let mut message = format!("Task kind: {}\n", task.kind);
        if let Some(question) = question {
            message.push_str(&format!("Request: {question}\n"));
        }
        if !details.is_empty() {
            let details = serde_json::to_string_pretty(&details)
                .unwrap_or_else(|_| "Invalid JSON".to_string());
            message.push_str(&format!("Details:\n{details}\n"));
        }
        message
    }

    fn build_messages(&self, task: &Task, context: Option<&ExecutionContext>) -> Vec<Message> {
        let mut messages = vec![Message::system(&self.system_prompt)];

        if let Some(context) = context {
            for prior in &context.prior_messages {
                match prior.role.as_str() {
                    "assistant" => messages.push(Message::assistant(&prior.content)),
                    "user" => messages.push(Message::user(&prior.content)),
                    _ => {}
                }
            }
        }

        messages.push(Message::user(Self::user_message(task)));
        messages
    }
}

#[async_trait]
impl TaskHandler for AssistantHandler {
    fn id(&self) -> &str {
        ASSISTANT_HANDLER_ID
    }

    fn description(&self) -> &str {
        "Conversational HR assistant: leave, recruitment, onboarding, reviews, attendance, benefits, policy and general questions"
    }

    fn capabilities(&self) -> Vec<Capability> {
        self.kinds
            .iter()
            .map(|kind| {
                Capability::new(kind.as_str(), "Answer using the HR assistant model")
                    .with_input_schema(json!({"query": "string"}))
                    .with_output_schema(json!({"answer": "string", "model": "string"}))
            })
            .collect()
    }

    fn can_handle(&self, task: &Task) -> bool {
        self.kinds.contains(&task.kind)
    }

    async fn process_task(
        &self,
        task: &Task,
        context: Option<&ExecutionContext>,
    ) -> DispatchResult<HandlerResponse> {
        let mut request = CompletionRequest {
            model: self.model.clone(),
            messages: self.build_messages(task, context),
            temperature: self.temperature,
            max_tokens: self.max_tokens,
            ..Default::default()
        };
        request
            .metadata
            .insert("task_id".to_string(), task.id.clone());

        let response = self.provider.complete(request).await?;
        let answer = response
            .content
            .filter(|content| !content.trim().is_empty())
            .ok_or_else(|| DispatchError::execution_failed("assistant returned an empty answer"))?;

        debug!(
            task_id = %task.id,
            total_tokens = response.usage.total_tokens,
            "Assistant answered"
        );

        Ok(HandlerResponse::success(
            &task.id,
            ASSISTANT_HANDLER_ID,
            json!({
                "answer": answer,
                "model": response.model,
                "usage": response.usage,
            }),
        ))
    }
}
