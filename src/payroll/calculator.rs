//! Monthly payroll computation
//!
//! Pure and infallible: any finite input produces a result. Contribution bases
//! are floored at zero, so a zero or negative gross yields zero contributions and
//! a net salary equal to the (possibly negative) residual.
//!
//! Arithmetic saturates at the `Decimal` range instead of overflowing. Results
//! are only meaningful for amounts up to [`MAX_MONTHLY_AMOUNT`], which callers
//! taking untrusted input enforce before computing.

use rust_decimal::{Decimal, RoundingStrategy};
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

use super::rates::StatutoryRates;

/// Largest monthly amount accepted from callers (RM 1 trillion)
pub const MAX_MONTHLY_AMOUNT: Decimal = dec!(1000000000000);

const MONTHS: Decimal = dec!(12);

/// Salary inputs for one employee and one month
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PayrollInput {
    pub basic_salary: Decimal,
    #[serde(default)]
    pub allowances: Decimal,
    #[serde(default)]
    pub deductions: Decimal,
    #[serde(default)]
    pub tabung_haji_opt_in: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub region: Option<String>,
}

impl PayrollInput {
    pub fn new(basic_salary: Decimal) -> Self {
        Self {
            basic_salary,
            allowances: Decimal::ZERO,
            deductions: Decimal::ZERO,
            tabung_haji_opt_in: false,
            region: None,
        }
    }

    pub fn with_allowances(mut self, allowances: Decimal) -> Self {
        self.allowances = allowances;
        self
    }

    pub fn with_deductions(mut self, deductions: Decimal) -> Self {
        self.deductions = deductions;
        self
    }

    pub fn with_tabung_haji(mut self, opt_in: bool) -> Self {
        self.tabung_haji_opt_in = opt_in;
        self
    }

    pub fn with_region(mut self, region: impl Into<String>) -> Self {
        self.region = Some(region.into());
        self
    }
}

/// Computed monthly payroll, every amount rounded to two places
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PayrollResult {
    pub gross_salary: Decimal,
    pub epf_employee: Decimal,
    pub epf_employer: Decimal,
    pub socso_employee: Decimal,
    pub socso_employer: Decimal,
    pub eis_amount: Decimal,
    pub tabung_haji_amount: Decimal,
    /// Ad-hoc deductions as applied, rounded to sen
    #[serde(default)]
    pub deductions: Decimal,
    /// Monthly chargeable income the tax was computed on, floored at zero
    pub taxable_income: Decimal,
    pub tax_amount: Decimal,
    pub zakat_amount: Decimal,
    pub net_salary: Decimal,
}

impl PayrollResult {
    /// Everything withheld from the employee, excluding ad-hoc deductions
    pub fn employee_contributions(&self) -> Decimal {
        [
            self.socso_employee,
            self.eis_amount,
            self.tabung_haji_amount,
            self.tax_amount,
            self.zakat_amount,
        ]
        .into_iter()
        .fold(self.epf_employee, Decimal::saturating_add)
    }

    pub fn employer_contributions(&self) -> Decimal {
        self.epf_employer.saturating_add(self.socso_employer)
    }
}

#[derive(Debug, Clone, Default)]
pub struct PayrollCalculator {
    rates: StatutoryRates,
}

impl PayrollCalculator {
    pub fn new(rates: StatutoryRates) -> Self {
        Self { rates }
    }

    pub fn rates(&self) -> &StatutoryRates {
        &self.rates
    }

    pub fn calculate(&self, input: &PayrollInput) -> PayrollResult {
        let rates = &self.rates;
        let gross = round_currency(input.basic_salary.saturating_add(input.allowances));
        let deductions = round_currency(input.deductions);
        let base = gross.max(Decimal::ZERO);
        let insured_base = base.min(rates.socso_wage_ceiling);

        let epf_employee = contribution(rates.epf_employee_rate, base).min(rates.epf_employee_cap);
        let epf_employer = contribution(rates.epf_employer_rate, base).min(rates.epf_employer_cap);
        let socso_employee = contribution(rates.socso_employee_rate, insured_base);
        let socso_employer = contribution(rates.socso_employer_rate, insured_base);
        let eis_amount = contribution(rates.eis_rate, insured_base);

        let tabung_haji_amount = if input.tabung_haji_opt_in {
            contribution(rates.tabung_haji_rate, base)
        } else {
            Decimal::ZERO
        };

        let annual_gross = base.saturating_mul(MONTHS);
        let zakat_amount = if annual_gross < rates.zakat_annual_threshold {
            Decimal::ZERO
        } else {
            round_currency(
                annual_gross.saturating_mul(rates.zakat_rate(input.region.as_deref())) / MONTHS,
            )
        };

        let taxable_income = [epf_employee, socso_employee, eis_amount, deductions]
            .into_iter()
            .fold(gross, Decimal::saturating_sub)
            .max(Decimal::ZERO);
        let tax_amount =
            round_currency(rates.annual_tax(taxable_income.saturating_mul(MONTHS)) / MONTHS);

        let net_salary = [
            epf_employee,
            socso_employee,
            eis_amount,
            tabung_haji_amount,
            tax_amount,
            zakat_amount,
            deductions,
        ]
        .into_iter()
        .fold(gross, Decimal::saturating_sub);

        PayrollResult {
            gross_salary: gross,
            epf_employee,
            epf_employer,
            socso_employee,
            socso_employer,
            eis_amount,
            tabung_haji_amount,
            deductions,
            taxable_income: round_currency(taxable_income),
            tax_amount,
            zakat_amount,
            net_salary,
        }
    }
}

/// `rate * base` rounded to sen
pub(crate) fn contribution(rate: Decimal, base: Decimal) -> Decimal {
    round_currency(rate.saturating_mul(base))
}

/// Compute a payroll with the default statutory table
pub fn compute_payroll(
    basic_salary: Decimal,
    allowances: Decimal,
    deductions: Decimal,
    tabung_haji_opt_in: bool,
    region: Option<&str>,
) -> PayrollResult {
    let input = PayrollInput {
        basic_salary,
        allowances,
        deductions,
        tabung_haji_opt_in,
        region: region.map(str::to_string),
    };
    PayrollCalculator::default().calculate(&input)
}

/// Round to sen, half away from zero
pub fn round_currency(amount: Decimal) -> Decimal {
    amount.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
}
