//! Cap-table entities: shareholders, share classes, and funding rounds.
//!
//! These are the inputs to the cap-table calculator (`crate::captable`); unlike
//! the other entity variants they are not projected onto the monthly cash-flow
//! grid, they feed a separate ownership/dilution/waterfall computation.

use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};

use super::EntityBase;
use crate::error::{CashflowError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ShareholderType {
    Founder,
    Employee,
    Investor,
    Advisor,
    Consultant,
    Other,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AntiDilution {
    None,
    WeightedAverage,
    FullRatchet,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RoundType {
    PreSeed,
    Seed,
    SeriesA,
    SeriesB,
    SeriesC,
    SeriesD,
    Bridge,
    Convertible,
    Other,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Shareholder {
    #[serde(flatten)]
    pub base: EntityBase,
    pub total_shares: f64,
    pub shareholder_type: ShareholderType,
    pub share_class: String,
    #[serde(default)]
    pub cliff_months: u32,
    #[serde(default)]
    pub vesting_months: u32,
    #[serde(default)]
    pub board_seats: u32,
}

impl Shareholder {
    pub fn validate(&self) -> Result<()> {
        self.base.validate("shareholder")?;
        if self.total_shares <= 0.0 {
            return Err(CashflowError::InvalidField {
                entity: self.base.name.clone(),
                field: "total_shares".to_string(),
                reason: "must be positive".to_string(),
            });
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ShareClass {
    #[serde(flatten)]
    pub base: EntityBase,
    pub class_name: String,
    pub shares_authorized: f64,
    #[serde(default)]
    pub shares_outstanding: f64,
    #[serde(default)]
    pub par_value: f64,
    #[serde(default)]
    pub liquidation_preference: f64,
    #[serde(default)]
    pub participating: bool,
    #[serde(default)]
    pub voting_rights_per_share: f64,
    #[serde(default)]
    pub anti_dilution: Option<AntiDilution>,
    /// Explicit seniority rank (higher = paid first in a waterfall). Absent in
    /// the source data model; when unset, C10 derives a deterministic rank
    /// from `start_date` (later-issued classes rank senior). See DESIGN.md.
    #[serde(default)]
    pub liquidation_seniority: Option<i32>,
}

impl ShareClass {
    pub fn validate(&self) -> Result<()> {
        self.base.validate("share_class")?;
        if self.shares_authorized <= 0.0 {
            return Err(CashflowError::InvalidField {
                entity: self.base.name.clone(),
                field: "shares_authorized".to_string(),
                reason: "must be positive".to_string(),
            });
        }
        if self.shares_outstanding > self.shares_authorized {
            return Err(CashflowError::InvalidField {
                entity: self.base.name.clone(),
                field: "shares_outstanding".to_string(),
                reason: "must not exceed shares_authorized".to_string(),
            });
        }
        if !(0.0..=10.0).contains(&self.liquidation_preference) {
            return Err(CashflowError::InvalidField {
                entity: self.base.name.clone(),
                field: "liquidation_preference".to_string(),
                reason: "must be within [0, 10]".to_string(),
            });
        }
        if !(0.0..=100.0).contains(&self.voting_rights_per_share) {
            return Err(CashflowError::InvalidField {
                entity: self.base.name.clone(),
                field: "voting_rights_per_share".to_string(),
                reason: "must be within [0, 100]".to_string(),
            });
        }
        Ok(())
    }

    /// Deterministic rank used when `liquidation_seniority` is absent:
    /// later-issued classes (by `start_date`) are senior to earlier ones.
    /// Explicit ranks always outrank inferred ones, regardless of their
    /// numeric value; the leading tag encodes that precedence.
    pub fn effective_seniority(&self) -> (u8, i64) {
        match self.liquidation_seniority {
            Some(s) => (1, s as i64),
            None => (0, self.base.start_date.num_days_from_ce() as i64),
        }
    }

    /// The minimum payout this class's preference guarantees its holders
    /// before any participation or conversion, bounded by what's left.
    pub fn liquidation_preference_amount(&self, remaining: f64) -> f64 {
        (self.shares_outstanding * self.par_value * self.liquidation_preference.max(0.0))
            .min(remaining.max(0.0))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FundingRound {
    #[serde(flatten)]
    pub base: EntityBase,
    pub round_type: RoundType,
    pub amount_raised: f64,
    #[serde(default)]
    pub pre_money: Option<f64>,
    #[serde(default)]
    pub post_money: Option<f64>,
    #[serde(default)]
    pub shares_issued: Option<f64>,
    #[serde(default)]
    pub price_per_share: Option<f64>,
    #[serde(default)]
    pub share_class: Option<String>,
}

impl FundingRound {
    pub fn validate(&self) -> Result<()> {
        self.base.validate("funding_round")?;
        if self.amount_raised <= 0.0 {
            return Err(CashflowError::InvalidField {
                entity: self.base.name.clone(),
                field: "amount_raised".to_string(),
                reason: "must be positive".to_string(),
            });
        }
        if self.pre_money.is_none() && self.post_money.is_none() {
            return Err(CashflowError::InvalidField {
                entity: self.base.name.clone(),
                field: "pre_money/post_money".to_string(),
                reason: "at least one must be set".to_string(),
            });
        }
        Ok(())
    }

    /// New shares issued by the round, derived from `amount_raised` and the
    /// pre-money share price when `shares_issued` is not given directly.
    pub fn new_shares(&self, pre_shares: f64) -> Option<f64> {
        if let Some(issued) = self.shares_issued {
            return Some(issued);
        }
        let pre_money = self.pre_money?;
        if pre_shares <= 0.0 || pre_money <= 0.0 {
            return None;
        }
        let price = pre_money / pre_shares;
        Some(self.amount_raised / price)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn round_new_shares_derived_from_pre_money() {
        let round = FundingRound {
            base: EntityBase::new("Series A", NaiveDate::from_ymd_opt(2024, 3, 1).unwrap()),
            round_type: RoundType::SeriesA,
            amount_raised: 5_000_000.0,
            pre_money: Some(20_000_000.0),
            post_money: None,
            shares_issued: None,
            price_per_share: None,
            share_class: Some("preferred".to_string()),
        };
        let shares = round.new_shares(10_000_000.0).unwrap();
        assert_abs_diff_eq!(shares, 2_500_000.0, epsilon = 1.0);
    }
}
