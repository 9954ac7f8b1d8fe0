//! Employee entity: salary, overhead, allowances, bonuses, and equity vesting.

use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};

use super::EntityBase;
use crate::error::{CashflowError, Result};

/// Equity grant terms for an employee, tracked independently of cash compensation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct EmployeeEquity {
    #[serde(default)]
    pub shares: f64,
    pub start_date: Option<NaiveDate>,
    #[serde(default)]
    pub cliff_months: u32,
    #[serde(default)]
    pub vest_years: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Employee {
    #[serde(flatten)]
    pub base: EntityBase,

    pub salary: f64,
    #[serde(default = "default_overhead_multiplier")]
    pub overhead_multiplier: f64,
    #[serde(default)]
    pub benefits_annual: f64,

    #[serde(default)]
    pub home_office_stipend: f64,
    #[serde(default)]
    pub allowances_annual: f64,

    #[serde(default)]
    pub signing_bonus: f64,
    #[serde(default)]
    pub relocation_assistance: f64,

    #[serde(default)]
    pub bonus_performance_max: f64,
    #[serde(default)]
    pub bonus_milestone_max: f64,

    #[serde(default)]
    pub equity: Option<EmployeeEquity>,
}

fn default_overhead_multiplier() -> f64 {
    1.3
}

impl Employee {
    pub fn validate(&self) -> Result<()> {
        self.base.validate("employee")?;
        if self.salary <= 0.0 {
            return Err(CashflowError::InvalidField {
                entity: self.base.name.clone(),
                field: "salary".to_string(),
                reason: "must be positive".to_string(),
            });
        }
        if !(1.0..=3.0).contains(&self.overhead_multiplier) {
            return Err(CashflowError::InvalidField {
                entity: self.base.name.clone(),
                field: "overhead_multiplier".to_string(),
                reason: "must be within [1, 3]".to_string(),
            });
        }
        Ok(())
    }

    pub fn monthly_base_cost(&self) -> f64 {
        self.salary / 12.0
    }

    pub fn overhead_cost(&self) -> f64 {
        self.monthly_base_cost() * (self.overhead_multiplier - 1.0) + self.benefits_annual / 12.0
    }

    pub fn allowances(&self) -> f64 {
        self.home_office_stipend + self.allowances_annual / 12.0
    }

    /// One-time costs, only present in the exact month the employee starts.
    pub fn one_time_costs(&self, as_of_date: NaiveDate) -> f64 {
        if same_month(self.base.start_date, as_of_date) {
            self.signing_bonus + self.relocation_assistance
        } else {
            0.0
        }
    }

    pub fn bonus_potential(&self) -> f64 {
        (self.salary * self.bonus_performance_max + self.salary * self.bonus_milestone_max) / 12.0
    }

    /// Total compensation cost for the month, zero when the employee is not active.
    pub fn total_cost(&self, as_of_date: NaiveDate) -> f64 {
        if !self.base.is_active(as_of_date) {
            return 0.0;
        }
        self.monthly_base_cost()
            + self.overhead_cost()
            + self.allowances()
            + self.one_time_costs(as_of_date)
            + self.bonus_potential()
    }

    pub fn is_equity_vested(&self, as_of_date: NaiveDate) -> bool {
        let Some(eq) = &self.equity else { return false };
        let start = eq.start_date.unwrap_or(self.base.start_date);
        months_between(start, as_of_date) >= eq.cliff_months as i64
    }

    /// Cliff + linear vesting percentage over `vest_years`.
    pub fn equity_vested_percentage(&self, as_of_date: NaiveDate) -> f64 {
        let Some(eq) = &self.equity else { return 0.0 };
        if eq.vest_years <= 0.0 {
            return 0.0;
        }
        if !self.is_equity_vested(as_of_date) {
            return 0.0;
        }
        let start = eq.start_date.unwrap_or(self.base.start_date);
        let months_elapsed = months_between(start, as_of_date) as f64;
        let total_months = eq.vest_years * 12.0;
        (months_elapsed / total_months).min(1.0)
    }

    pub fn equity_vested_shares(&self, as_of_date: NaiveDate) -> f64 {
        let Some(eq) = &self.equity else { return 0.0 };
        eq.shares * self.equity_vested_percentage(as_of_date)
    }
}

fn same_month(a: NaiveDate, b: NaiveDate) -> bool {
    a.year() == b.year() && a.month() == b.month()
}

fn months_between(start: NaiveDate, as_of: NaiveDate) -> i64 {
    (as_of.year() as i64 - start.year() as i64) * 12 + as_of.month() as i64 - start.month() as i64
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    fn date(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    fn test_employee() -> Employee {
        Employee {
            base: EntityBase::new("Alice", date("2024-01-01")),
            salary: 120_000.0,
            overhead_multiplier: 1.3,
            benefits_annual: 0.0,
            home_office_stipend: 0.0,
            allowances_annual: 0.0,
            signing_bonus: 0.0,
            relocation_assistance: 0.0,
            bonus_performance_max: 0.0,
            bonus_milestone_max: 0.0,
            equity: None,
        }
    }

    #[test]
    fn total_cost_matches_baseline_scenario() {
        let e = test_employee();
        assert_abs_diff_eq!(e.total_cost(date("2024-06-01")), 13_000.0, epsilon = 1e-6);
    }

    #[test]
    fn inactive_employee_costs_nothing() {
        let e = test_employee();
        assert_eq!(e.total_cost(date("2023-12-01")), 0.0);
    }

    #[test]
    fn equity_vesting_respects_cliff() {
        let mut e = test_employee();
        e.equity = Some(EmployeeEquity {
            shares: 10_000.0,
            start_date: None,
            cliff_months: 12,
            vest_years: 4.0,
        });
        assert!(!e.is_equity_vested(date("2024-06-01")));
        assert!(e.is_equity_vested(date("2025-01-01")));
        assert!(e.equity_vested_percentage(date("2025-01-01")) > 0.0);
    }
}
