//! Structured output schema for routing decisions
//!
//! The static shape comes from `schemars`; [`RoutingDecisionOutput::json_schema`]
//! then narrows `selected_handler` to the live candidate names and bounds
//! `confidence` so the same document can be sent to the model and used to
//! validate its answer.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use super::oracle::RoutingDecision;

/// Structured output the routing model must return
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct RoutingDecisionOutput {
    /// Name of the handler that should process the task
    pub selected_handler: String,

    /// Confidence in the selection, between 0 and 1
    pub confidence: f64,

    /// Short justification, kept for observability
    pub reasoning: String,
}

impl RoutingDecisionOutput {
    /// Schema restricted to the given candidate names
    pub fn json_schema(candidates: &[String]) -> Result<Value, serde_json::Error> {
        let mut schema = serde_json::to_value(schemars::schema_for!(RoutingDecisionOutput))?;

        if let Some(object) = schema.as_object_mut() {
            object.remove("$schema");
            object.insert("additionalProperties".to_string(), json!(false));
        }
        if let Some(properties) = schema
            .get_mut("properties")
            .and_then(Value::as_object_mut)
        {
            properties.insert(
                "selected_handler".to_string(),
                json!({
                    "description": "Name of the handler that should process the task",
                    "type": "string",
                    "enum": candidates,
                }),
            );
            properties.insert(
                "confidence".to_string(),
                json!({
                    "description": "Confidence in the selection, between 0 and 1",
                    "type": "number",
                    "minimum": 0.0,
                    "maximum": 1.0,
                }),
            );
        }

        Ok(schema)
    }
}

impl From<RoutingDecisionOutput> for RoutingDecision {
    fn from(output: RoutingDecisionOutput) -> Self {
        Self {
            selected_handler: output.selected_handler,
            confidence: output.confidence,
            reasoning: output.reasoning,
        }
    }
}
