//! Expense entities: facilities, software subscriptions, and depreciable equipment.

use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};

use super::EntityBase;
use crate::error::{CashflowError, Result};

fn same_month(a: NaiveDate, b: NaiveDate) -> bool {
    a.year() == b.year() && a.month() == b.month()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Certification {
    pub renewal_date: NaiveDate,
    pub cost: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Facility {
    #[serde(flatten)]
    pub base: EntityBase,
    pub monthly_cost: f64,
    #[serde(default)]
    pub location: Option<String>,
    #[serde(default)]
    pub utilities_monthly: f64,
    #[serde(default)]
    pub internet_monthly: f64,
    #[serde(default)]
    pub security_monthly: f64,
    #[serde(default)]
    pub cleaning_monthly: f64,
    #[serde(default)]
    pub insurance_annual: f64,
    #[serde(default)]
    pub property_tax_annual: f64,
    #[serde(default)]
    pub maintenance_monthly: f64,
    #[serde(default)]
    pub maintenance_quarterly: f64,
    #[serde(default)]
    pub maintenance_annual: f64,
    #[serde(default)]
    pub certifications: Vec<Certification>,
}

impl Facility {
    pub fn validate(&self) -> Result<()> {
        self.base.validate("facility")?;
        if self.monthly_cost <= 0.0 {
            return Err(CashflowError::InvalidField {
                entity: self.base.name.clone(),
                field: "monthly_cost".to_string(),
                reason: "must be positive".to_string(),
            });
        }
        Ok(())
    }

    /// Recurring facility cost: the monthly base plus the monthly share of
    /// every annualized/quarterly sub-component.
    pub fn recurring_cost(&self, as_of_date: NaiveDate) -> f64 {
        if !self.base.is_active(as_of_date) {
            return 0.0;
        }
        self.monthly_cost
            + self.utilities_monthly
            + self.internet_monthly
            + self.security_monthly
            + self.cleaning_monthly
            + self.maintenance_monthly
            + (self.insurance_annual + self.property_tax_annual + self.maintenance_annual) / 12.0
            + self.maintenance_quarterly / 3.0
    }

    /// Certification/permit lump sums landing in their exact renewal month.
    pub fn certification_costs(&self, as_of_date: NaiveDate) -> f64 {
        if !self.base.is_active(as_of_date) {
            return 0.0;
        }
        self.certifications
            .iter()
            .filter(|c| same_month(c.renewal_date, as_of_date))
            .map(|c| c.cost)
            .sum()
    }

    pub fn total_monthly_cost(&self, as_of_date: NaiveDate) -> f64 {
        self.recurring_cost(as_of_date) + self.certification_costs(as_of_date)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Software {
    #[serde(flatten)]
    pub base: EntityBase,
    pub monthly_cost: f64,
    #[serde(default)]
    pub vendor: Option<String>,
    #[serde(default)]
    pub annual_cost: Option<f64>,
    #[serde(default)]
    pub per_user_cost: Option<f64>,
    #[serde(default)]
    pub license_count: Option<u32>,
    #[serde(default)]
    pub contract_end_date: Option<NaiveDate>,
    #[serde(default = "default_true")]
    pub auto_renewal: bool,
}

fn default_true() -> bool {
    true
}

impl Software {
    pub fn validate(&self) -> Result<()> {
        self.base.validate("software")?;
        if self.monthly_cost <= 0.0 {
            return Err(CashflowError::InvalidField {
                entity: self.base.name.clone(),
                field: "monthly_cost".to_string(),
                reason: "must be positive".to_string(),
            });
        }
        Ok(())
    }

    /// Precedence: annual contract > per-seat license > flat monthly fee.
    pub fn monthly_cost(&self, as_of_date: NaiveDate) -> f64 {
        if !self.base.is_active(as_of_date) {
            return 0.0;
        }
        if let Some(annual) = self.annual_cost {
            return annual / 12.0;
        }
        if let (Some(per_user), Some(count)) = (self.per_user_cost, self.license_count) {
            return per_user * count as f64;
        }
        self.monthly_cost
    }

    pub fn renewal_alert(&self, as_of_date: NaiveDate, alert_days: i64) -> Option<i64> {
        let end = self.contract_end_date?;
        let days = (end - as_of_date).num_days();
        (days <= alert_days).then_some(days)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Equipment {
    #[serde(flatten)]
    pub base: EntityBase,
    pub cost: f64,
    pub purchase_date: NaiveDate,
    #[serde(default)]
    pub depreciation_years: Option<u32>,
    #[serde(default)]
    pub residual_value: f64,
    #[serde(default)]
    pub maintenance_annual: f64,
    #[serde(default)]
    pub support_contract_annual: f64,
}

impl Equipment {
    pub fn validate(&self) -> Result<()> {
        self.base.validate("equipment")?;
        if self.cost <= 0.0 {
            return Err(CashflowError::InvalidField {
                entity: self.base.name.clone(),
                field: "cost".to_string(),
                reason: "must be positive".to_string(),
            });
        }
        Ok(())
    }

    fn depreciation_end(&self) -> Option<NaiveDate> {
        let years = self.depreciation_years?;
        self.purchase_date
            .with_year(self.purchase_date.year() + years as i32)
    }

    pub fn monthly_depreciation(&self, as_of_date: NaiveDate) -> f64 {
        let Some(years) = self.depreciation_years else { return 0.0 };
        if years == 0 {
            return 0.0;
        }
        if let Some(end) = self.depreciation_end() {
            if as_of_date > end {
                return 0.0;
            }
        }
        let depreciable = self.cost - self.residual_value;
        depreciable / (years as f64 * 12.0)
    }

    pub fn monthly_maintenance(&self, _as_of_date: NaiveDate) -> f64 {
        self.maintenance_annual / 12.0
    }

    pub fn monthly_support(&self, _as_of_date: NaiveDate) -> f64 {
        self.support_contract_annual / 12.0
    }

    /// Full purchase cost, landing only in the purchase month.
    pub fn one_time_cost(&self, as_of_date: NaiveDate) -> f64 {
        if same_month(self.purchase_date, as_of_date) {
            self.cost
        } else {
            0.0
        }
    }

    pub fn book_value(&self, as_of_date: NaiveDate) -> f64 {
        let Some(years) = self.depreciation_years else { return self.cost };
        let months_elapsed =
            ((as_of_date.year() - self.purchase_date.year()) * 12
                + as_of_date.month() as i32
                - self.purchase_date.month() as i32) as f64;
        let total_months = years as f64 * 12.0;
        if months_elapsed >= total_months {
            return self.residual_value;
        }
        let depreciated = self.monthly_depreciation(as_of_date) * months_elapsed;
        (self.cost - depreciated).max(self.residual_value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    fn date(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    #[test]
    fn facility_recurring_cost_includes_annualized_components() {
        let f = Facility {
            base: EntityBase::new("HQ", date("2024-01-01")),
            monthly_cost: 5_000.0,
            location: None,
            utilities_monthly: 200.0,
            internet_monthly: 0.0,
            security_monthly: 0.0,
            cleaning_monthly: 0.0,
            insurance_annual: 1_200.0,
            property_tax_annual: 0.0,
            maintenance_monthly: 0.0,
            maintenance_quarterly: 300.0,
            maintenance_annual: 0.0,
            certifications: vec![],
        };
        let expected = 5_000.0 + 200.0 + 1_200.0 / 12.0 + 300.0 / 3.0;
        assert_abs_diff_eq!(f.recurring_cost(date("2024-03-01")), expected, epsilon = 1e-6);
    }

    #[test]
    fn equipment_depreciation_is_bounded_by_residual() {
        let e = Equipment {
            base: EntityBase::new("Laser cutter", date("2022-01-01")),
            cost: 24_000.0,
            purchase_date: date("2022-01-01"),
            depreciation_years: Some(2),
            residual_value: 2_000.0,
            maintenance_annual: 0.0,
            support_contract_annual: 0.0,
        };
        assert!(e.monthly_depreciation(date("2023-06-01")) > 0.0);
        assert_eq!(e.monthly_depreciation(date("2024-06-01")), 0.0);
        assert_eq!(e.book_value(date("2024-06-01")), 2_000.0);
    }
}
