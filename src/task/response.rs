//! Uniform response returned by every handler

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Outcome of executing a task
///
/// A failed response always carries an `error_message` and zero confidence. A
/// successful response always carries an `output` object, possibly empty.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HandlerResponse {
    pub task_id: String,
    pub handler_id: String,
    pub succeeded: bool,
    pub output: Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub confidence: Option<f64>,
    pub processing_time_ms: u64,
    pub completed_at: DateTime<Utc>,
}

impl HandlerResponse {
    /// Successful response; non-object outputs are wrapped as `{"result": ...}`
    pub fn success(task_id: impl Into<String>, handler_id: impl Into<String>, output: Value) -> Self {
        let output = match output {
            Value::Object(_) => output,
            Value::Null => Value::Object(Map::new()),
            other => {
                let mut wrapped = Map::new();
                wrapped.insert("result".to_string(), other);
                Value::Object(wrapped)
            }
        };

        Self {
            task_id: task_id.into(),
            handler_id: handler_id.into(),
            succeeded: true,
            output,
            error_message: None,
            confidence: None,
            processing_time_ms: 0,
            completed_at: Utc::now(),
        }
    }

    /// Failed response with an empty output
    pub fn failure(
        task_id: impl Into<String>,
        handler_id: impl Into<String>,
        error_message: impl Into<String>,
    ) -> Self {
        Self {
            task_id: task_id.into(),
            handler_id: handler_id.into(),
            succeeded: false,
            output: Value::Object(Map::new()),
            error_message: Some(error_message.into()),
            confidence: Some(0.0),
            processing_time_ms: 0,
            completed_at: Utc::now(),
        }
    }

    /// Attach a confidence score, clamped into `[0, 1]`
    pub fn with_confidence(mut self, confidence: f64) -> Self {
        let confidence = if confidence.is_nan() {
            0.0
        } else {
            confidence.clamp(0.0, 1.0)
        };
        self.confidence = Some(confidence);
        self
    }

    pub fn with_processing_time(mut self, processing_time_ms: u64) -> Self {
        self.processing_time_ms = processing_time_ms;
        self
    }
}
