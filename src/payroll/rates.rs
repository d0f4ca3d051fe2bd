//! Statutory rate table
//!
//! All rates are fractions (`0.11` is 11%) and all amounts are monthly MYR
//! unless the field name says `annual`. The table deserializes from TOML with
//! every field optional, so a config file only needs to name what it overrides.

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RatesError {
    #[error("Rate '{name}' must be between 0 and 1, got {value}")]
    RateOutOfRange { name: &'static str, value: Decimal },
    #[error("Amount '{name}' must not be negative, got {value}")]
    NegativeAmount { name: &'static str, value: Decimal },
    #[error("Invalid tax brackets: {0}")]
    InvalidBrackets(String),
}

/// One marginal band of the annual income tax schedule
///
/// `upper == None` marks the unbounded top band.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaxBracket {
    pub lower: Decimal,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub upper: Option<Decimal>,
    pub rate: Decimal,
}

impl TaxBracket {
    pub fn new(lower: Decimal, upper: Option<Decimal>, rate: Decimal) -> Self {
        Self { lower, upper, rate }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StatutoryRates {
    pub epf_employee_rate: Decimal,
    pub epf_employee_cap: Decimal,
    pub epf_employer_rate: Decimal,
    pub epf_employer_cap: Decimal,
    pub socso_wage_ceiling: Decimal,
    pub socso_employee_rate: Decimal,
    pub socso_employer_rate: Decimal,
    pub eis_rate: Decimal,
    pub tabung_haji_rate: Decimal,
    pub zakat_annual_threshold: Decimal,
    pub zakat_default_rate: Decimal,
    /// Region-specific zakat rates, keyed by lowercase region name
    pub zakat_region_rates: BTreeMap<String, Decimal>,
    pub minimum_wage: Decimal,
    pub tax_brackets: Vec<TaxBracket>,
}

impl Default for StatutoryRates {
    fn default() -> Self {
        Self {
            epf_employee_rate: dec!(0.11),
            epf_employee_cap: dec!(2200.00),
            epf_employer_rate: dec!(0.13),
            epf_employer_cap: dec!(2600.00),
            socso_wage_ceiling: dec!(5000.00),
            socso_employee_rate: dec!(0.005),
            socso_employer_rate: dec!(0.0175),
            eis_rate: dec!(0.002),
            tabung_haji_rate: dec!(0.02),
            zakat_annual_threshold: dec!(24000.00),
            zakat_default_rate: dec!(0.025),
            zakat_region_rates: BTreeMap::new(),
            minimum_wage: dec!(1700.00),
            tax_brackets: default_tax_brackets(),
        }
    }
}

/// Resident individual schedule, annual chargeable income
pub fn default_tax_brackets() -> Vec<TaxBracket> {
    vec![
        TaxBracket::new(dec!(0), Some(dec!(5000)), dec!(0)),
        TaxBracket::new(dec!(5000), Some(dec!(20000)), dec!(0.01)),
        TaxBracket::new(dec!(20000), Some(dec!(35000)), dec!(0.03)),
        TaxBracket::new(dec!(35000), Some(dec!(50000)), dec!(0.06)),
        TaxBracket::new(dec!(50000), Some(dec!(70000)), dec!(0.11)),
        TaxBracket::new(dec!(70000), Some(dec!(100000)), dec!(0.19)),
        TaxBracket::new(dec!(100000), Some(dec!(400000)), dec!(0.25)),
        TaxBracket::new(dec!(400000), Some(dec!(600000)), dec!(0.26)),
        TaxBracket::new(dec!(600000), Some(dec!(2000000)), dec!(0.28)),
        TaxBracket::new(dec!(2000000), None, dec!(0.30)),
    ]
}

impl StatutoryRates {
    /// Zakat rate for a region, falling back to the default rate
    pub fn zakat_rate(&self, region: Option<&str>) -> Decimal {
        region
            .map(|r| r.trim().to_lowercase())
            .and_then(|r| self.zakat_region_rates.get(&r).copied())
            .unwrap_or(self.zakat_default_rate)
    }

    /// Progressive tax on an annual chargeable income
    ///
    /// Income sitting exactly on a band edge is taxed wholly in the lower band.
    pub fn annual_tax(&self, annual_income: Decimal) -> Decimal {
        self.tax_brackets
            .iter()
            .filter(|bracket| annual_income > bracket.lower)
            .map(|bracket| {
                let top = match bracket.upper {
                    Some(upper) => annual_income.min(upper),
                    None => annual_income,
                };
                top.saturating_sub(bracket.lower).saturating_mul(bracket.rate)
            })
            .fold(Decimal::ZERO, Decimal::saturating_add)
    }

    /// Upper edge of the leading zero-rate bands
    pub fn tax_free_band(&self) -> Decimal {
        let mut band = Decimal::ZERO;
        for bracket in &self.tax_brackets {
            if !bracket.rate.is_zero() {
                break;
            }
            match bracket.upper {
                Some(upper) => band = upper,
                None => return Decimal::MAX,
            }
        }
        band
    }

    pub fn validate(&self) -> Result<(), RatesError> {
        let rates = [
            ("epf_employee_rate", self.epf_employee_rate),
            ("epf_employer_rate", self.epf_employer_rate),
            ("socso_employee_rate", self.socso_employee_rate),
            ("socso_employer_rate", self.socso_employer_rate),
            ("eis_rate", self.eis_rate),
            ("tabung_haji_rate", self.tabung_haji_rate),
            ("zakat_default_rate", self.zakat_default_rate),
        ];
        for (name, value) in rates {
            check_rate(name, value)?;
        }
        for value in self.zakat_region_rates.values() {
            check_rate("zakat_region_rates", *value)?;
        }

        let amounts = [
            ("epf_employee_cap", self.epf_employee_cap),
            ("epf_employer_cap", self.epf_employer_cap),
            ("socso_wage_ceiling", self.socso_wage_ceiling),
            ("zakat_annual_threshold", self.zakat_annual_threshold),
            ("minimum_wage", self.minimum_wage),
        ];
        for (name, value) in amounts {
            if value.is_sign_negative() && !value.is_zero() {
                return Err(RatesError::NegativeAmount { name, value });
            }
        }

        self.validate_brackets()
    }

    fn validate_brackets(&self) -> Result<(), RatesError> {
        let Some(first) = self.tax_brackets.first() else {
            return Err(RatesError::InvalidBrackets(
                "at least one bracket is required".to_string(),
            ));
        };
        if !first.lower.is_zero() {
            return Err(RatesError::InvalidBrackets(format!(
                "first bracket must start at 0, starts at {}",
                first.lower
            )));
        }

        for (index, bracket) in self.tax_brackets.iter().enumerate() {
            check_rate("tax_brackets.rate", bracket.rate)?;
            let is_last = index + 1 == self.tax_brackets.len();

            match (bracket.upper, is_last) {
                (None, true) => {}
                (None, false) => {
                    return Err(RatesError::InvalidBrackets(format!(
                        "only the last bracket may be unbounded (bracket {index})"
                    )))
                }
                (Some(_), true) => {
                    return Err(RatesError::InvalidBrackets(
                        "last bracket must be unbounded".to_string(),
                    ))
                }
                (Some(upper), false) => {
                    if upper <= bracket.lower {
                        return Err(RatesError::InvalidBrackets(format!(
                            "bracket {index} upper edge {upper} is not above lower edge {}",
                            bracket.lower
                        )));
                    }
                    let next = &self.tax_brackets[index + 1];
                    if next.lower != upper {
                        return Err(RatesError::InvalidBrackets(format!(
                            "gap between bracket {index} and {}: {upper} != {}",
                            index + 1,
                            next.lower
                        )));
                    }
                }
            }
        }
        Ok(())
    }
}

fn check_rate(name: &'static str, value: Decimal) -> Result<(), RatesError> {
    if value < Decimal::ZERO || value > Decimal::ONE {
        return Err(RatesError::RateOutOfRange { name, value });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_table_is_valid() {
        assert_eq!(StatutoryRates::default().validate(), Ok(()));
    }

    #[test]
    fn test_annual_tax_at_band_edges() {
        let rates = StatutoryRates::default();

        assert_eq!(rates.annual_tax(dec!(5000)), dec!(0));
        assert_eq!(rates.annual_tax(dec!(20000)), dec!(150));
        assert_eq!(rates.annual_tax(dec!(35000)), dec!(600));
        assert_eq!(rates.annual_tax(dec!(50000)), dec!(1500));
        // Just past an edge picks up the next rate
        assert_eq!(rates.annual_tax(dec!(5001)), dec!(0.01));
    }

    #[test]
    fn test_annual_tax_top_band_unbounded() {
        let rates = StatutoryRates::default();
        let at_edge = rates.annual_tax(dec!(2000000));
        assert_eq!(rates.annual_tax(dec!(2000100)) - at_edge, dec!(30));
    }

    #[test]
    fn test_annual_tax_non_positive_income() {
        let rates = StatutoryRates::default();
        assert_eq!(rates.annual_tax(dec!(0)), dec!(0));
        assert_eq!(rates.annual_tax(dec!(-1000)), dec!(0));
    }

    #[test]
    fn test_zakat_region_lookup() {
        let mut rates = StatutoryRates::default();
        rates
            .zakat_region_rates
            .insert("selangor".to_string(), dec!(0.03));

        assert_eq!(rates.zakat_rate(Some("Selangor")), dec!(0.03));
        assert_eq!(rates.zakat_rate(Some("johor")), dec!(0.025));
        assert_eq!(rates.zakat_rate(None), dec!(0.025));
    }

    #[test]
    fn test_tax_free_band() {
        assert_eq!(StatutoryRates::default().tax_free_band(), dec!(5000));
    }

    #[test]
    fn test_validate_rejects_out_of_range_rate() {
        let rates = StatutoryRates {
            eis_rate: dec!(1.5),
            ..Default::default()
        };
        assert!(matches!(
            rates.validate(),
            Err(RatesError::RateOutOfRange { name: "eis_rate", .. })
        ));
    }

    #[test]
    fn test_validate_rejects_bracket_gap() {
        let mut rates = StatutoryRates::default();
        rates.tax_brackets[2].lower = dec!(21000);
        assert!(matches!(
            rates.validate(),
            Err(RatesError::InvalidBrackets(_))
        ));
    }

    #[test]
    fn test_validate_rejects_bounded_top_bracket() {
        let rates = StatutoryRates {
            tax_brackets: vec![TaxBracket::new(dec!(0), Some(dec!(100)), dec!(0))],
            ..Default::default()
        };
        assert!(rates.validate().is_err());
    }

    #[test]
    fn test_partial_toml_override() {
        let rates: StatutoryRates = toml::from_str(
            r#"
            epf_employee_rate = "0.09"
            minimum_wage = "1500.00"

            [zakat_region_rates]
            kedah = "0.03"
            "#,
        )
        .unwrap();

        assert_eq!(rates.epf_employee_rate, dec!(0.09));
        assert_eq!(rates.minimum_wage, dec!(1500.00));
        assert_eq!(rates.epf_employer_rate, dec!(0.13));
        assert_eq!(rates.zakat_rate(Some("kedah")), dec!(0.03));
        assert_eq!(rates.tax_brackets.len(), 10);
    }
}
