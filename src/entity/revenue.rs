//! Revenue entities: grants, investments, sales, and service contracts.

use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};

use super::EntityBase;
use crate::error::{CashflowError, Result};

/// A single dated payment, used by grant/investment/sale schedules.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScheduledPayment {
    pub date: NaiveDate,
    pub amount: f64,
}

fn same_month(a: NaiveDate, b: NaiveDate) -> bool {
    a.year() == b.year() && a.month() == b.month()
}

fn month_span(start: NaiveDate, end: NaiveDate) -> i64 {
    ((end.year() - start.year()) * 12 + end.month() as i32 - start.month() as i32) as i64
}

fn scheduled_amount_for_month(schedule: &[ScheduledPayment], as_of_date: NaiveDate) -> f64 {
    schedule
        .iter()
        .filter(|p| same_month(p.date, as_of_date))
        .map(|p| p.amount)
        .sum()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Grant {
    #[serde(flatten)]
    pub base: EntityBase,
    pub amount: f64,
    #[serde(default)]
    pub agency: Option<String>,
    #[serde(default)]
    pub indirect_cost_rate: f64,
    #[serde(default)]
    pub payment_schedule: Vec<ScheduledPayment>,
}

impl Grant {
    pub fn validate(&self) -> Result<()> {
        self.base.validate("grant")?;
        if self.amount <= 0.0 {
            return Err(CashflowError::InvalidField {
                entity: self.base.name.clone(),
                field: "amount".to_string(),
                reason: "must be positive".to_string(),
            });
        }
        if !(0.0..=1.0).contains(&self.indirect_cost_rate) {
            return Err(CashflowError::InvalidField {
                entity: self.base.name.clone(),
                field: "indirect_cost_rate".to_string(),
                reason: "must be within [0, 1]".to_string(),
            });
        }
        Ok(())
    }

    pub fn monthly_disbursement(&self, as_of_date: NaiveDate) -> f64 {
        if !self.base.is_active(as_of_date) {
            return 0.0;
        }
        if !self.payment_schedule.is_empty() {
            return scheduled_amount_for_month(&self.payment_schedule, as_of_date);
        }
        let months = self
            .base
            .end_date
            .map(|end| month_span(self.base.start_date, end))
            .filter(|&m| m > 0)
            .unwrap_or(24);
        self.amount / months as f64
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Investment {
    #[serde(flatten)]
    pub base: EntityBase,
    pub amount: f64,
    #[serde(default)]
    pub investor: Option<String>,
    #[serde(default)]
    pub round_type: Option<String>,
    #[serde(default)]
    pub pre_money_valuation: Option<f64>,
    #[serde(default)]
    pub post_money_valuation: Option<f64>,
    #[serde(default)]
    pub disbursement_schedule: Vec<ScheduledPayment>,
}

impl Investment {
    pub fn validate(&self) -> Result<()> {
        self.base.validate("investment")?;
        if self.amount <= 0.0 {
            return Err(CashflowError::InvalidField {
                entity: self.base.name.clone(),
                field: "amount".to_string(),
                reason: "must be positive".to_string(),
            });
        }
        Ok(())
    }

    pub fn monthly_disbursement(&self, as_of_date: NaiveDate) -> f64 {
        if !self.base.is_active(as_of_date) {
            return 0.0;
        }
        if !self.disbursement_schedule.is_empty() {
            return scheduled_amount_for_month(&self.disbursement_schedule, as_of_date);
        }
        if same_month(self.base.start_date, as_of_date) {
            self.amount
        } else {
            0.0
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Sale {
    #[serde(flatten)]
    pub base: EntityBase,
    pub amount: f64,
    #[serde(default)]
    pub customer: Option<String>,
    #[serde(default)]
    pub delivery_date: Option<NaiveDate>,
    #[serde(default)]
    pub payment_schedule: Vec<ScheduledPayment>,
}

impl Sale {
    pub fn validate(&self) -> Result<()> {
        self.base.validate("sale")?;
        if self.amount <= 0.0 {
            return Err(CashflowError::InvalidField {
                entity: self.base.name.clone(),
                field: "amount".to_string(),
                reason: "must be positive".to_string(),
            });
        }
        Ok(())
    }

    pub fn monthly_revenue(&self, as_of_date: NaiveDate) -> f64 {
        if !self.base.is_active(as_of_date) {
            return 0.0;
        }
        if !self.payment_schedule.is_empty() {
            return scheduled_amount_for_month(&self.payment_schedule, as_of_date);
        }
        let revenue_date = self.delivery_date.unwrap_or(self.base.start_date);
        if same_month(revenue_date, as_of_date) {
            self.amount
        } else {
            0.0
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Service {
    #[serde(flatten)]
    pub base: EntityBase,
    pub monthly_amount: f64,
    #[serde(default)]
    pub customer: Option<String>,
    #[serde(default)]
    pub hourly_rate: Option<f64>,
    #[serde(default)]
    pub minimum_commitment_months: Option<u32>,
}

impl Service {
    pub fn validate(&self) -> Result<()> {
        self.base.validate("service")?;
        if self.monthly_amount <= 0.0 {
            return Err(CashflowError::InvalidField {
                entity: self.base.name.clone(),
                field: "monthly_amount".to_string(),
                reason: "must be positive".to_string(),
            });
        }
        Ok(())
    }

    pub fn monthly_revenue(&self, as_of_date: NaiveDate) -> f64 {
        if !self.base.is_active(as_of_date) {
            return 0.0;
        }
        self.monthly_amount
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    #[test]
    fn grant_schedule_lands_in_exact_months() {
        let grant = Grant {
            base: EntityBase::new("NSF Grant", date("2024-01-01")),
            amount: 300_000.0,
            agency: None,
            indirect_cost_rate: 0.0,
            payment_schedule: vec![
                ScheduledPayment { date: date("2024-02-01"), amount: 100_000.0 },
                ScheduledPayment { date: date("2024-05-01"), amount: 100_000.0 },
                ScheduledPayment { date: date("2024-09-01"), amount: 100_000.0 },
            ],
        };
        assert_eq!(grant.monthly_disbursement(date("2024-02-01")), 100_000.0);
        assert_eq!(grant.monthly_disbursement(date("2024-03-01")), 0.0);
        assert_eq!(grant.monthly_disbursement(date("2024-09-01")), 100_000.0);
    }
}
