//! Malaysian statutory payroll engine
//!
//! [`calculator`] computes EPF, SOCSO, EIS, Tabung Haji, zakat and PCB-style
//! progressive income tax for one month using exact decimal arithmetic.
//! [`compliance`] judges a payroll against the statutory minimums. Both read
//! their constants from a [`rates::StatutoryRates`] table that configuration can
//! override.

pub mod calculator;
pub mod compliance;
pub mod rates;

pub use calculator::{
    compute_payroll, round_currency, PayrollCalculator, PayrollInput, PayrollResult,
    MAX_MONTHLY_AMOUNT,
};
pub use compliance::{
    validate_payroll, ComplianceReport, ComplianceViolation, Severity, ViolationCode,
};
pub use rates::{default_tax_brackets, RatesError, StatutoryRates, TaxBracket};
