//! Statutory compliance checks over a computed (or externally supplied) payroll

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

use super::calculator::{contribution, PayrollInput, PayrollResult};
use super::rates::StatutoryRates;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Error,
    Warning,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ViolationCode {
    BelowMinimumWage,
    EpfEmployeeBelowFloor,
    EpfEmployerBelowFloor,
    SocsoBelowFloor,
    EisBelowFloor,
    NegativeNetSalary,
    ZeroTaxOnHighIncome,
}

impl ViolationCode {
    pub fn severity(&self) -> Severity {
        match self {
            ViolationCode::NegativeNetSalary | ViolationCode::ZeroTaxOnHighIncome => {
                Severity::Warning
            }
            _ => Severity::Error,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ViolationCode::BelowMinimumWage => "below_minimum_wage",
            ViolationCode::EpfEmployeeBelowFloor => "epf_employee_below_floor",
            ViolationCode::EpfEmployerBelowFloor => "epf_employer_below_floor",
            ViolationCode::SocsoBelowFloor => "socso_below_floor",
            ViolationCode::EisBelowFloor => "eis_below_floor",
            ViolationCode::NegativeNetSalary => "negative_net_salary",
            ViolationCode::ZeroTaxOnHighIncome => "zero_tax_on_high_income",
        }
    }
}

impl fmt::Display for ViolationCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComplianceViolation {
    pub code: ViolationCode,
    pub severity: Severity,
    pub message: String,
}

impl ComplianceViolation {
    fn new(code: ViolationCode, message: impl Into<String>) -> Self {
        Self {
            code,
            severity: code.severity(),
            message: message.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComplianceReport {
    pub compliant: bool,
    pub violations: Vec<ComplianceViolation>,
}

impl ComplianceReport {
    pub fn errors(&self) -> impl Iterator<Item = &ComplianceViolation> {
        self.violations
            .iter()
            .filter(|v| v.severity == Severity::Error)
    }

    pub fn warnings(&self) -> impl Iterator<Item = &ComplianceViolation> {
        self.violations
            .iter()
            .filter(|v| v.severity == Severity::Warning)
    }

    pub fn has(&self, code: ViolationCode) -> bool {
        self.violations.iter().any(|v| v.code == code)
    }
}

/// Check a payroll against the statutory minimums in `rates`
///
/// Floors are recomputed from the result's gross salary, so a result produced
/// by the calculator with the same table only ever raises warnings.
pub fn validate_payroll(
    input: &PayrollInput,
    result: &PayrollResult,
    rates: &StatutoryRates,
) -> ComplianceReport {
    let mut violations = Vec::new();
    let base = result.gross_salary.max(Decimal::ZERO);
    let insured_base = base.min(rates.socso_wage_ceiling);

    if input.basic_salary < rates.minimum_wage {
        violations.push(ComplianceViolation::new(
            ViolationCode::BelowMinimumWage,
            format!(
                "Basic salary RM {} is below the minimum wage of RM {}",
                input.basic_salary, rates.minimum_wage
            ),
        ));
    }

    let floors = [
        (
            ViolationCode::EpfEmployeeBelowFloor,
            "EPF employee contribution",
            result.epf_employee,
            contribution(rates.epf_employee_rate, base).min(rates.epf_employee_cap),
        ),
        (
            ViolationCode::EpfEmployerBelowFloor,
            "EPF employer contribution",
            result.epf_employer,
            contribution(rates.epf_employer_rate, base).min(rates.epf_employer_cap),
        ),
        (
            ViolationCode::SocsoBelowFloor,
            "SOCSO employee contribution",
            result.socso_employee,
            contribution(rates.socso_employee_rate, insured_base),
        ),
        (
            ViolationCode::SocsoBelowFloor,
            "SOCSO employer contribution",
            result.socso_employer,
            contribution(rates.socso_employer_rate, insured_base),
        ),
        (
            ViolationCode::EisBelowFloor,
            "EIS contribution",
            result.eis_amount,
            contribution(rates.eis_rate, insured_base),
        ),
    ];

    for (code, label, actual, floor) in floors {
        if actual < floor {
            violations.push(ComplianceViolation::new(
                code,
                format!("{label} RM {actual} is below the statutory RM {floor}"),
            ));
        }
    }

    if result.net_salary < Decimal::ZERO {
        violations.push(ComplianceViolation::new(
            ViolationCode::NegativeNetSalary,
            format!("Net salary is negative (RM {})", result.net_salary),
        ));
    }

    let annual_taxable = result.taxable_income.saturating_mul(Decimal::from(12));
    if result.tax_amount.is_zero() && annual_taxable > rates.tax_free_band() {
        violations.push(ComplianceViolation::new(
            ViolationCode::ZeroTaxOnHighIncome,
            format!(
                "No income tax withheld on annual chargeable income of RM {annual_taxable}"
            ),
        ));
    }

    let compliant = !violations.iter().any(|v| v.severity == Severity::Error);
    ComplianceReport {
        compliant,
        violations,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::payroll::calculator::PayrollCalculator;
    use rust_decimal_macros::dec;

    fn calculate(input: &PayrollInput) -> PayrollResult {
        PayrollCalculator::default().calculate(input)
    }

    #[test]
    fn test_computed_payroll_is_compliant() {
        let input = PayrollInput::new(dec!(3000))
            .with_allowances(dec!(500))
            .with_deductions(dec!(100));
        let report = validate_payroll(&input, &calculate(&input), &StatutoryRates::default());

        assert!(report.compliant);
        assert!(report.violations.is_empty());
    }

    #[test]
    fn test_below_minimum_wage_is_error() {
        let input = PayrollInput::new(dec!(1200));
        let report = validate_payroll(&input, &calculate(&input), &StatutoryRates::default());

        assert!(!report.compliant);
        assert!(report.has(ViolationCode::BelowMinimumWage));
        assert_eq!(report.errors().count(), 1);
    }

    #[test]
    fn test_underpaid_contributions_are_errors() {
        let input = PayrollInput::new(dec!(4000));
        let mut result = calculate(&input);
        result.epf_employee = dec!(100.00);
        result.epf_employer = dec!(0);
        result.socso_employer = dec!(1.00);
        result.eis_amount = dec!(0);

        let report = validate_payroll(&input, &result, &StatutoryRates::default());

        assert!(!report.compliant);
        assert!(report.has(ViolationCode::EpfEmployeeBelowFloor));
        assert!(report.has(ViolationCode::EpfEmployerBelowFloor));
        assert!(report.has(ViolationCode::SocsoBelowFloor));
        assert!(report.has(ViolationCode::EisBelowFloor));
    }

    #[test]
    fn test_negative_net_is_only_a_warning() {
        let input = PayrollInput::new(dec!(2000)).with_deductions(dec!(5000));
        let report = validate_payroll(&input, &calculate(&input), &StatutoryRates::default());

        assert!(report.compliant);
        assert!(report.has(ViolationCode::NegativeNetSalary));
        assert_eq!(report.warnings().count(), 1);
    }

    #[test]
    fn test_zero_tax_on_high_income_warns() {
        let input = PayrollInput::new(dec!(10000));
        let mut result = calculate(&input);
        result.tax_amount = Decimal::ZERO;

        let report = validate_payroll(&input, &result, &StatutoryRates::default());

        assert!(report.compliant);
        assert!(report.has(ViolationCode::ZeroTaxOnHighIncome));
    }

    #[test]
    fn test_extreme_supplied_payroll_is_checked_without_overflow() {
        let input = PayrollInput::new(Decimal::MAX);
        let mut result = calculate(&PayrollInput::new(dec!(5000)));
        result.gross_salary = Decimal::MAX;
        result.taxable_income = Decimal::MAX;
        result.tax_amount = Decimal::ZERO;

        let report = validate_payroll(&input, &result, &StatutoryRates::default());

        assert!(report.has(ViolationCode::ZeroTaxOnHighIncome));
        assert!(report.has(ViolationCode::EpfEmployeeBelowFloor));
    }

    #[test]
    fn test_violation_serialization() {
        let violation = ComplianceViolation::new(ViolationCode::EisBelowFloor, "short");
        let json = serde_json::to_value(&violation).unwrap();

        assert_eq!(json["code"], "eis_below_floor");
        assert_eq!(json["severity"], "error");
    }
}
