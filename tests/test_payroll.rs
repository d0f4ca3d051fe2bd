//! Payroll tasks end to end: routed through the coordinator to the payroll
//! handler, checked against known statutory figures

mod test_helpers;

use hr_dispatch::handlers::{PayrollHandler, PAYROLL_HANDLER_ID};
use hr_dispatch::payroll::{PayrollCalculator, StatutoryRates};
use hr_dispatch::task::TaskKind;
use hr_dispatch::testing::{KindRoutingOracle, StubHandler};
use hr_dispatch::HandlerRegistry;
use rust_decimal_macros::dec;
use serde_json::{json, Value};
use std::sync::Arc;
use test_helpers::{decimal, registry_with, task};

fn payroll_registry(handler: PayrollHandler) -> HandlerRegistry {
    let oracle = KindRoutingOracle::new()
        .route(TaskKind::PayrollCalculation, PAYROLL_HANDLER_ID)
        .route(TaskKind::PayrollCompliance, PAYROLL_HANDLER_ID)
        .otherwise("assistant");
    registry_with(
        Arc::new(oracle),
        vec![
            Arc::new(handler),
            Arc::new(StubHandler::new("assistant", vec![TaskKind::GeneralInquiry])),
        ],
    )
}

fn delegated_output(response: &hr_dispatch::HandlerResponse) -> &Value {
    &response.output["delegated_response"]["output"]
}

#[tokio::test]
async fn test_reference_payslip_through_registry() {
    let registry = payroll_registry(PayrollHandler::default());

    let response = registry
        .execute_task(
            &task(
                TaskKind::PayrollCalculation,
                json!({
                    "employee_id": "E-1001",
                    "basic_salary": 3000,
                    "allowances": "500.00",
                    "deductions": 100
                }),
            ),
            None,
        )
        .await;

    assert!(response.succeeded, "{:?}", response.error_message);
    let output = delegated_output(&response);
    assert_eq!(output["employee_id"], "E-1001");

    let payroll = &output["payroll"];
    assert_eq!(decimal(&payroll["gross_salary"]), dec!(3500.00));
    assert_eq!(decimal(&payroll["epf_employee"]), dec!(385.00));
    assert_eq!(decimal(&payroll["epf_employer"]), dec!(455.00));
    assert_eq!(decimal(&payroll["socso_employee"]), dec!(17.50));
    assert_eq!(decimal(&payroll["socso_employer"]), dec!(61.25));
    assert_eq!(decimal(&payroll["eis_amount"]), dec!(7.00));
    assert_eq!(decimal(&payroll["tax_amount"]), dec!(54.43));
    assert_eq!(decimal(&payroll["zakat_amount"]), dec!(87.50));
    assert_eq!(decimal(&payroll["net_salary"]), dec!(2848.57));

    assert_eq!(output["compliance"]["compliant"], true);
}

#[tokio::test]
async fn test_below_minimum_wage_is_flagged() {
    let registry = payroll_registry(PayrollHandler::default());

    let response = registry
        .execute_task(
            &task(TaskKind::PayrollCompliance, json!({"basic_salary": 1200})),
            None,
        )
        .await;

    assert!(response.succeeded);
    let compliance = &delegated_output(&response)["compliance"];
    assert_eq!(compliance["compliant"], false);
    let codes: Vec<&str> = compliance["violations"]
        .as_array()
        .unwrap()
        .iter()
        .map(|v| v["code"].as_str().unwrap())
        .collect();
    assert!(codes.contains(&"below_minimum_wage"), "{codes:?}");
}

#[tokio::test]
async fn test_supplied_payroll_with_short_contributions_is_flagged() {
    let registry = payroll_registry(PayrollHandler::default());

    let response = registry
        .execute_task(
            &task(
                TaskKind::PayrollCompliance,
                json!({
                    "basic_salary": 3000,
                    "payroll": {
                        "gross_salary": "3000.00",
                        "epf_employee": "100.00",
                        "epf_employer": "390.00",
                        "socso_employee": "15.00",
                        "socso_employer": "52.50",
                        "eis_amount": "6.00",
                        "tabung_haji_amount": "0",
                        "taxable_income": "2570.00",
                        "tax_amount": "30.00",
                        "zakat_amount": "75.00",
                        "net_salary": "2774.00"
                    }
                }),
            ),
            None,
        )
        .await;

    assert!(response.succeeded, "{:?}", response.error_message);
    let violations = delegated_output(&response)["compliance"]["violations"]
        .as_array()
        .unwrap()
        .clone();
    let epf = violations
        .iter()
        .find(|v| v["code"] == "epf_employee_below_floor")
        .expect("epf violation");
    assert_eq!(epf["severity"], "error");
}

#[tokio::test]
async fn test_invalid_payroll_input_is_reported() {
    let registry = payroll_registry(PayrollHandler::default());

    for input in [
        json!({}),
        json!({"basic_salary": -10}),
        json!({"basic_salary": "lots"}),
        json!({"basic_salary": 3000, "tabung_haji_opt_in": "yes"}),
    ] {
        let response = registry
            .execute_task(&task(TaskKind::PayrollCalculation, input.clone()), None)
            .await;

        assert!(!response.succeeded, "accepted {input}");
        let message = response.error_message.unwrap();
        assert!(message.starts_with("Invalid input"), "{message}");
    }

    let metrics = registry.get_handler(PAYROLL_HANDLER_ID).unwrap().metrics();
    assert_eq!(metrics.error_count, 4);
}

#[tokio::test]
async fn test_configured_rates_flow_through_handler() {
    let mut rates = StatutoryRates::default();
    rates.zakat_region_rates.insert("kedah".to_string(), dec!(0.02));
    let registry = payroll_registry(PayrollHandler::new(PayrollCalculator::new(rates)));

    let response = registry
        .execute_task(
            &task(
                TaskKind::PayrollCalculation,
                json!({"basic_salary": 5000, "region": "Kedah", "tabung_haji_opt_in": true}),
            ),
            None,
        )
        .await;

    let payroll = &delegated_output(&response)["payroll"];
    assert_eq!(decimal(&payroll["zakat_amount"]), dec!(100.00));
    assert!(decimal(&payroll["tabung_haji_amount"]) > dec!(0));
}

#[tokio::test]
async fn test_non_payroll_kind_goes_elsewhere() {
    let registry = payroll_registry(PayrollHandler::default());

    let response = registry
        .execute_task(&task(TaskKind::GeneralInquiry, json!({})), None)
        .await;

    assert!(response.succeeded);
    assert_eq!(
        response.output["routing_decision"]["selected_handler"],
        "assistant"
    );
    let payroll = registry.get_handler(PAYROLL_HANDLER_ID).unwrap();
    assert_eq!(payroll.metrics().total_requests, 0);
}
