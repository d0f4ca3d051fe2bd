//! Handler contract
//!
//! Every specialized processor implements [`TaskHandler`]: a pure capability
//! predicate over the task kind plus an async processing operation. Handlers are
//! never invoked directly by callers; they are wrapped in a
//! [`base::ManagedHandler`] which owns their status and metrics.

pub mod activity;
pub mod base;

pub use activity::{
    ActivityAction, ActivityEntry, ActivityError, ActivityLogger, ActivitySink,
    JsonLinesActivitySink, TracingActivitySink,
};
pub use base::{HandlerMetrics, HandlerSnapshot, HandlerStatus, ManagedHandler};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::DispatchResult;
use crate::task::{ExecutionContext, HandlerResponse, Task};

/// Capability descriptor, for introspection and documentation only
///
/// Descriptors are never enforced at runtime; `can_handle` is the only gate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Capability {
    pub name: String,
    pub description: String,
    /// JSON shape of the expected `input`
    pub input_schema: Value,
    /// JSON shape of the produced `output`
    pub output_schema: Value,
}

impl Capability {
    pub fn new(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            input_schema: Value::Object(Default::default()),
            output_schema: Value::Object(Default::default()),
        }
    }

    pub fn with_input_schema(mut self, schema: Value) -> Self {
        self.input_schema = schema;
        self
    }

    pub fn with_output_schema(mut self, schema: Value) -> Self {
        self.output_schema = schema;
        self
    }
}

/// Contract implemented by every task handler
#[async_trait]
pub trait TaskHandler: Send + Sync {
    /// Unique handler name, used as the registry key and routing candidate
    fn id(&self) -> &str;

    /// Short human-readable description
    fn description(&self) -> &str {
        ""
    }

    /// Static capability list for introspection
    fn capabilities(&self) -> Vec<Capability> {
        Vec::new()
    }

    /// Whether this handler accepts the task
    ///
    /// Must be deterministic and free of side effects.
    fn can_handle(&self, task: &Task) -> bool;

    /// Process the task
    ///
    /// May perform I/O. Errors are converted into failed responses by the
    /// handler base and never reach the caller as `Err`.
    async fn process_task(
        &self,
        task: &Task,
        context: Option<&ExecutionContext>,
    ) -> DispatchResult<HandlerResponse>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_capability_builder() {
        let capability = Capability::new("payroll_calculation", "Compute statutory deductions")
            .with_input_schema(json!({"basic_salary": "decimal"}))
            .with_output_schema(json!({"net_salary": "decimal"}));

        assert_eq!(capability.name, "payroll_calculation");
        assert_eq!(capability.input_schema["basic_salary"], json!("decimal"));
        assert_eq!(capability.output_schema["net_salary"], json!("decimal"));
    }

    #[test]
    fn test_capability_defaults_to_empty_shapes() {
        let capability = Capability::new("noop", "Does nothing");
        assert_eq!(capability.input_schema, json!({}));
        assert_eq!(capability.output_schema, json!({}));
    }
}
