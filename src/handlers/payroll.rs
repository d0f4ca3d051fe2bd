//! Payroll handler wrapping the statutory calculation engine
//!
//! Accepts `payroll_calculation` and `payroll_compliance` tasks. Input fields:
//!
//! | field | type | required |
//! |---|---|---|
//! | `basic_salary` | number or decimal string, `0..=MAX_MONTHLY_AMOUNT` | yes |
//! | `allowances` | number or decimal string, `0..=MAX_MONTHLY_AMOUNT` | no |
//! | `deductions` | number or decimal string, `0..=MAX_MONTHLY_AMOUNT` | no |
//! | `tabung_haji_opt_in` | bool | no |
//! | `region` | string | no |
//! | `employee_id` | string | no, echoed back |
//! | `payroll` | computed payroll object | no, compliance only |
//!
//! A compliance task carrying a `payroll` object validates that payroll instead
//! of recomputing it.

use async_trait::async_trait;
use rust_decimal::Decimal;
use serde_json::{json, Value};
use std::str::FromStr;
use tracing::debug;

use crate::error::{DispatchError, DispatchResult};
use crate::handler::{Capability, TaskHandler};
use crate::payroll::{
    validate_payroll, PayrollCalculator, PayrollInput, PayrollResult, MAX_MONTHLY_AMOUNT,
};
use crate::task::{ExecutionContext, HandlerResponse, Task, TaskKind};

pub const PAYROLL_HANDLER_ID: &str = "payroll";

#[derive(Debug, Clone, Default)]
pub struct PayrollHandler {
    calculator: PayrollCalculator,
}

impl PayrollHandler {
    pub fn new(calculator: PayrollCalculator) -> Self {
        Self { calculator }
    }

    fn parse_input(task: &Task) -> DispatchResult<PayrollInput> {
        let basic_salary = decimal_field(task, "basic_salary")?
            .ok_or_else(|| DispatchError::invalid_input("basic_salary is required"))?;
        let allowances = decimal_field(task, "allowances")?.unwrap_or_default();
        let deductions = decimal_field(task, "deductions")?.unwrap_or_default();

        let tabung_haji_opt_in = match task.input_field("tabung_haji_opt_in") {
            None | Some(Value::Null) => false,
            Some(Value::Bool(flag)) => *flag,
            Some(other) => {
                return Err(DispatchError::invalid_input(format!(
                    "tabung_haji_opt_in must be a boolean, got {other}"
                )))
            }
        };

        let region = match task.input_field("region") {
            None | Some(Value::Null) => None,
            Some(Value::String(region)) => Some(region.clone()),
            Some(other) => {
                return Err(DispatchError::invalid_input(format!(
                    "region must be a string, got {other}"
                )))
            }
        };

        Ok(PayrollInput {
            basic_salary,
            allowances,
            deductions,
            tabung_haji_opt_in,
            region,
        })
    }

    fn supplied_payroll(task: &Task) -> DispatchResult<Option<PayrollResult>> {
        match task.input_field("payroll") {
            None | Some(Value::Null) => Ok(None),
            Some(value) => serde_json::from_value(value.clone())
                .map(Some)
                .map_err(|e| DispatchError::invalid_input(format!("invalid payroll object: {e}"))),
        }
    }
}

/// Bounded non-negative decimal from a JSON number or decimal string
fn decimal_field(task: &Task, name: &str) -> DispatchResult<Option<Decimal>> {
    let value = match task.input_field(name) {
        None | Some(Value::Null) => return Ok(None),
        Some(value) => value,
    };

    let text = match value {
        Value::Number(number) => number.to_string(),
        Value::String(text) => text.trim().to_string(),
        other => {
            return Err(DispatchError::invalid_input(format!(
                "{name} must be a number, got {other}"
            )))
        }
    };

    let amount = Decimal::from_str(&text)
        .or_else(|_| Decimal::from_scientific(&text))
        .map_err(|_| DispatchError::invalid_input(format!("{name} is not a valid amount: {text}")))?;

    if amount.is_sign_negative() && !amount.is_zero() {
        return Err(DispatchError::invalid_input(format!(
            "{name} must not be negative"
        )));
    }
    if amount > MAX_MONTHLY_AMOUNT {
        return Err(DispatchError::invalid_input(format!(
            "{name} exceeds the maximum of {MAX_MONTHLY_AMOUNT}"
        )));
    }
    Ok(Some(amount))
}

#[async_trait]
impl TaskHandler for PayrollHandler {
    fn id(&self) -> &str {
        PAYROLL_HANDLER_ID
    }

    fn description(&self) -> &str {
        "Malaysian statutory payroll: EPF, SOCSO, EIS, Tabung Haji, zakat, income tax and compliance checks"
    }

    fn capabilities(&self) -> Vec<Capability> {
        let input = json!({
            "basic_salary": "decimal",
            "allowances": "decimal?",
            "deductions": "decimal?",
            "tabung_haji_opt_in": "bool?",
            "region": "string?",
        });
        vec![
            Capability::new(
                TaskKind::PayrollCalculation.as_str(),
                "Compute monthly statutory deductions and net salary",
            )
            .with_input_schema(input.clone())
            .with_output_schema(json!({"payroll": "PayrollResult", "compliance": "ComplianceReport"})),
            Capability::new(
                TaskKind::PayrollCompliance.as_str(),
                "Validate a payroll against statutory minimums",
            )
            .with_input_schema(input)
            .with_output_schema(json!({"compliance": "ComplianceReport", "payroll": "PayrollResult"})),
        ]
    }

    fn can_handle(&self, task: &Task) -> bool {
        matches!(
            task.kind,
            TaskKind::PayrollCalculation | TaskKind::PayrollCompliance
        )
    }

    async fn process_task(
        &self,
        task: &Task,
        _context: Option<&ExecutionContext>,
    ) -> DispatchResult<HandlerResponse> {
        let input = Self::parse_input(task)?;

        let payroll = match (task.kind, Self::supplied_payroll(task)?) {
            (TaskKind::PayrollCompliance, Some(supplied)) => supplied,
            _ => self.calculator.calculate(&input),
        };
        let compliance = validate_payroll(&input, &payroll, self.calculator.rates());

        debug!(
            task_id = %task.id,
            net_salary = %payroll.net_salary,
            compliant = compliance.compliant,
            violations = compliance.violations.len(),
            "Payroll processed"
        );

        let mut output = json!({
            "payroll": payroll,
            "compliance": compliance,
        });
        if let Some(employee_id) = task.input_field("employee_id") {
            output["employee_id"] = employee_id.clone();
        }

        Ok(HandlerResponse::success(&task.id, PAYROLL_HANDLER_ID, output).with_confidence(1.0))
    }
}
