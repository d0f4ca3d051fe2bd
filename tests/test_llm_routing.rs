//! LLM-routed dispatch against a mock chat completions endpoint
//!
//! The routing request is recognised by its `json_schema` response format;
//! every other completion is answered as the assistant.

mod test_helpers;

use hr_dispatch::handler::ActivityLogger;
use hr_dispatch::handlers::{AssistantHandler, PayrollHandler};
use hr_dispatch::llm::provider::LlmProvider;
use hr_dispatch::llm::providers::openai::{OpenAiConfig, OpenAiProvider};
use hr_dispatch::routing::LlmRoutingOracle;
use hr_dispatch::task::{create_context, ContextOverrides, TaskKind};
use hr_dispatch::HandlerRegistry;
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use test_helpers::task;
use wiremock::matchers::{body_partial_json, method, path};
use wiremock::{Mock, MockServer, Request, ResponseTemplate};

fn completion(content: &str) -> Value {
    json!({
        "model": "gpt-4o-mini",
        "choices": [{
            "message": {"role": "assistant", "content": content},
            "finish_reason": "stop"
        }],
        "usage": {"prompt_tokens": 50, "completion_tokens": 20, "total_tokens": 70}
    })
}

async fn mount_routing(server: &MockServer, decision: Value) {
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .and(body_partial_json(json!({"response_format": {"type": "json_schema"}})))
        .respond_with(ResponseTemplate::new(200).set_body_json(completion(&decision.to_string())))
        .with_priority(1)
        .mount(server)
        .await;
}

async fn mount_assistant(server: &MockServer, answer: &str) {
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(completion(answer)))
        .mount(server)
        .await;
}

fn registry(server: &MockServer) -> HandlerRegistry {
    let provider: Arc<dyn LlmProvider> = Arc::new(
        OpenAiProvider::new(OpenAiConfig {
            api_key: "test-api-key".to_string(),
            base_url: server.uri(),
            timeout: Duration::from_secs(5),
        })
        .unwrap(),
    );

    let oracle = LlmRoutingOracle::new(provider.clone(), "gpt-4o-mini");
    let registry = HandlerRegistry::new(Arc::new(oracle), ActivityLogger::disabled());
    registry.register_handler(Arc::new(PayrollHandler::default()));
    registry.register_handler(Arc::new(AssistantHandler::new(provider, "gpt-4o-mini")));
    registry
}

fn routing_request(requests: &[Request]) -> Value {
    requests
        .iter()
        .map(|r| serde_json::from_slice::<Value>(&r.body).unwrap())
        .find(|body| body.get("response_format").is_some())
        .expect("routing request")
}

#[tokio::test]
async fn test_llm_selects_payroll_handler() {
    let server = MockServer::start().await;
    mount_routing(
        &server,
        json!({
            "selected_handler": "payroll",
            "confidence": 0.92,
            "reasoning": "The task asks for a payslip computation"
        }),
    )
    .await;

    let response = registry(&server)
        .execute_task(
            &task(TaskKind::PayrollCalculation, json!({"basic_salary": 4200})),
            None,
        )
        .await;

    assert!(response.succeeded, "{:?}", response.error_message);
    assert_eq!(response.confidence, Some(0.92));
    assert_eq!(
        response.output["routing_decision"]["reasoning"],
        "The task asks for a payslip computation"
    );

    // Candidate names constrain the schema the model must answer with
    let requests = server.received_requests().await.unwrap();
    let body = routing_request(&requests);
    assert_eq!(
        body["response_format"]["json_schema"]["schema"]["properties"]["selected_handler"]["enum"],
        json!(["hr-assistant", "payroll"])
    );
    let prompt = body["messages"][1]["content"].as_str().unwrap();
    assert!(prompt.contains("kind: payroll_calculation"));
    assert!(prompt.contains("- payroll: "));
}

#[tokio::test]
async fn test_llm_selects_assistant_which_answers() {
    let server = MockServer::start().await;
    mount_routing(
        &server,
        json!({
            "selected_handler": "hr-assistant",
            "confidence": 0.75,
            "reasoning": "Policy question"
        }),
    )
    .await;
    mount_assistant(&server, "Remote work is allowed two days a week.").await;

    let context = create_context(
        Some("u-9".to_string()),
        Some("acme".to_string()),
        Some(ContextOverrides {
            role: Some("manager".to_string()),
            ..Default::default()
        }),
    );
    let response = registry(&server)
        .execute_task(
            &task(
                TaskKind::PolicyInquiry,
                json!({"query": "What is the remote work policy?"}),
            ),
            Some(&context),
        )
        .await;

    assert!(response.succeeded, "{:?}", response.error_message);
    assert_eq!(
        response.output["delegated_response"]["output"]["answer"],
        "Remote work is allowed two days a week."
    );

    let requests = server.received_requests().await.unwrap();
    assert_eq!(requests.len(), 2);
    let prompt = routing_request(&requests)["messages"][1]["content"]
        .as_str()
        .unwrap()
        .to_string();
    assert!(prompt.contains("requester role: manager"));
    assert!(prompt.contains("tenant: acme"));
}

#[tokio::test]
async fn test_selection_outside_candidates_is_routing_failure() {
    let server = MockServer::start().await;
    mount_routing(
        &server,
        json!({"selected_handler": "finance", "confidence": 0.9, "reasoning": "guess"}),
    )
    .await;

    let registry = registry(&server);
    let response = registry
        .execute_task(&task(TaskKind::BenefitsInquiry, json!({})), None)
        .await;

    assert!(!response.succeeded);
    let message = response.error_message.unwrap();
    assert!(
        message.starts_with("Routing failed: invalid routing decision"),
        "{message}"
    );
    for name in registry.handler_names() {
        assert_eq!(registry.get_handler(&name).unwrap().metrics().total_requests, 0);
    }
}

#[tokio::test]
async fn test_out_of_range_confidence_is_routing_failure() {
    let server = MockServer::start().await;
    mount_routing(
        &server,
        json!({"selected_handler": "payroll", "confidence": 1.5, "reasoning": "sure"}),
    )
    .await;

    let response = registry(&server)
        .execute_task(
            &task(TaskKind::PayrollCalculation, json!({"basic_salary": 3000})),
            None,
        )
        .await;

    assert!(!response.succeeded);
    assert!(response
        .error_message
        .unwrap()
        .contains("invalid routing decision"));
}

#[tokio::test]
async fn test_provider_outage_is_routing_failure() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(500).set_body_string("upstream down"))
        .mount(&server)
        .await;

    let response = registry(&server)
        .execute_task(&task(TaskKind::Recruitment, json!({})), None)
        .await;

    assert!(!response.succeeded);
    assert!(response
        .error_message
        .unwrap()
        .starts_with("Routing failed: oracle request failed"));
}
