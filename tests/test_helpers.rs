//! Test helpers and utilities for integration tests

#![allow(dead_code)]

use hr_dispatch::handler::ActivityLogger;
use hr_dispatch::routing::RoutingOracle;
use hr_dispatch::task::{create_task, Task, TaskKind, TaskOptions};
use hr_dispatch::{HandlerRegistry, TaskHandler};
use rust_decimal::Decimal;
use serde_json::Value;
use std::str::FromStr;
use std::sync::Arc;

/// Smallest configuration that passes validation
pub const MINIMAL_CONFIG: &str = r#"
[service]
id = "hr-dispatch-test"

[llm]
provider = "openai"
model = "gpt-4o-mini"
api_key_env = "OPENAI_API_KEY"
"#;

/// Build a task from a JSON object literal
pub fn task(kind: TaskKind, input: Value) -> Task {
    create_task(
        kind,
        input.as_object().cloned().unwrap_or_default(),
        TaskOptions::default(),
    )
}

/// Registry with the given oracle and handlers, activity logging disabled
pub fn registry_with(
    oracle: Arc<dyn RoutingOracle>,
    handlers: Vec<Arc<dyn TaskHandler>>,
) -> HandlerRegistry {
    let registry = HandlerRegistry::new(oracle, ActivityLogger::disabled());
    for handler in handlers {
        registry.register_handler(handler);
    }
    registry
}

/// Read a decimal that was serialized as a string or a number
pub fn decimal(value: &Value) -> Decimal {
    match value {
        Value::String(text) => Decimal::from_str(text).expect("decimal string"),
        Value::Number(number) => Decimal::from_str(&number.to_string()).expect("decimal number"),
        other => panic!("expected a decimal, got {other}"),
    }
}
