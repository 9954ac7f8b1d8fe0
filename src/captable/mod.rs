//! Cap-Table Calculator (C10): ownership, dilution, and liquidation waterfall
//! over the cap-table entities, plus a cross-entity validator.
//!
//! This is a specialized projection independent of the monthly cash-flow
//! grid: it operates directly on `Shareholder`/`ShareClass`/`FundingRound`
//! entities rather than being dispatched through the calculator registry.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::entity::{Entity, FundingRound, ShareClass, Shareholder};

fn round_half_up_4(value: f64) -> f64 {
    (value * 10_000.0).round() / 10_000.0
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OwnershipRow {
    pub shareholder: String,
    pub shares: f64,
    pub ownership_pct: f64,
    pub voting_pct: f64,
    pub board_control_pct: f64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CapTableSnapshot {
    pub total_fully_diluted_shares: f64,
    pub rows: Vec<OwnershipRow>,
}

fn fully_diluted_total(shareholders: &[&Shareholder], share_classes: &[&ShareClass]) -> f64 {
    let outstanding_total: f64 = shareholders.iter().map(|s| s.total_shares).sum();
    let authorized_total: f64 = share_classes.iter().map(|c| c.shares_authorized).sum();
    outstanding_total.max(authorized_total)
}

/// Fully-diluted ownership, voting power, and board control for every
/// shareholder in the set.
pub fn ownership_snapshot(shareholders: &[&Shareholder], share_classes: &[&ShareClass]) -> CapTableSnapshot {
    let total_fd = fully_diluted_total(shareholders, share_classes);
    let total_board_seats: u32 = shareholders.iter().map(|s| s.board_seats).sum();

    let class_voting: HashMap<&str, f64> = share_classes
        .iter()
        .map(|c| (c.class_name.as_str(), c.voting_rights_per_share))
        .collect();

    let total_voting_weight: f64 = shareholders
        .iter()
        .map(|s| s.total_shares * class_voting.get(s.share_class.as_str()).copied().unwrap_or(1.0))
        .sum();

    let rows = shareholders
        .iter()
        .map(|s| {
            let ownership_pct = if total_fd > 0.0 {
                round_half_up_4(s.total_shares / total_fd)
            } else {
                0.0
            };
            let weight = s.total_shares * class_voting.get(s.share_class.as_str()).copied().unwrap_or(1.0);
            let voting_pct = if total_voting_weight > 0.0 {
                weight / total_voting_weight
            } else {
                0.0
            };
            let board_control_pct = if total_board_seats > 0 {
                s.board_seats as f64 / total_board_seats as f64
            } else {
                0.0
            };
            OwnershipRow {
                shareholder: s.base.name.clone(),
                shares: s.total_shares,
                ownership_pct,
                voting_pct,
                board_control_pct,
            }
        })
        .collect();

    CapTableSnapshot {
        total_fully_diluted_shares: total_fd,
        rows,
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DilutionRow {
    pub shareholder: String,
    pub pre_ownership_pct: f64,
    pub post_ownership_pct: f64,
    pub dilution_pct: f64,
}

/// Dilution a funding round imposes on each existing shareholder.
pub fn dilution_for_round(shareholders: &[&Shareholder], round: &FundingRound) -> Vec<DilutionRow> {
    let pre_shares: f64 = shareholders.iter().map(|s| s.total_shares).sum();
    let new_shares = round.new_shares(pre_shares).unwrap_or(0.0);
    let post_shares = pre_shares + new_shares;

    shareholders
        .iter()
        .map(|s| {
            let pre = if pre_shares > 0.0 { s.total_shares / pre_shares } else { 0.0 };
            let post = if post_shares > 0.0 { s.total_shares / post_shares } else { 0.0 };
            DilutionRow {
                shareholder: s.base.name.clone(),
                pre_ownership_pct: round_half_up_4(pre),
                post_ownership_pct: round_half_up_4(post),
                dilution_pct: round_half_up_4(pre - post),
            }
        })
        .collect()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WaterfallDistribution {
    pub shareholder: String,
    pub amount: f64,
}

/// Seniority-ordered liquidation waterfall over exit value `exit_value`.
/// Higher `effective_seniority` is paid first; ties break on preference
/// amount descending. Participating classes also share pro-rata in the
/// remainder after their preference; non-participating classes instead
/// convert to pro-rata of the full remainder when that exceeds preference.
pub fn liquidation_waterfall(
    shareholders: &[&Shareholder],
    share_classes: &[&ShareClass],
    exit_value: f64,
) -> Vec<WaterfallDistribution> {
    let mut remaining = exit_value.max(0.0);
    let mut class_distribution: HashMap<String, f64> = HashMap::new();

    let mut ordered: Vec<&ShareClass> = share_classes.to_vec();
    ordered.sort_by(|a, b| {
        let (seniority_a, _) = a.effective_seniority();
        let (seniority_b, _) = b.effective_seniority();
        seniority_b
            .cmp(&seniority_a)
            .then_with(|| b.liquidation_preference.partial_cmp(&a.liquidation_preference).unwrap())
    });

    let pro_rata_pool: f64 = ordered
        .iter()
        .filter(|c| c.participating)
        .map(|c| c.shares_outstanding)
        .sum();

    for class in &ordered {
        if remaining <= 0.0 {
            class_distribution.insert(class.class_name.clone(), 0.0);
            continue;
        }
        let preference = class.liquidation_preference_amount(remaining);
        let mut payout = preference;
        remaining -= preference;

        if class.participating && pro_rata_pool > 0.0 && remaining > 0.0 {
            let share = class.shares_outstanding / pro_rata_pool;
            let pro_rata_cut = remaining * share;
            payout += pro_rata_cut;
        } else if !class.participating && class.shares_outstanding > 0.0 {
            let total_common: f64 = ordered.iter().map(|c| c.shares_outstanding).sum();
            if total_common > 0.0 {
                let convert_share = remaining * (class.shares_outstanding / total_common);
                if convert_share > payout {
                    payout = convert_share;
                }
            }
        }
        class_distribution.insert(class.class_name.clone(), payout);
    }

    shareholders
        .iter()
        .map(|s| {
            let class = share_classes.iter().find(|c| c.class_name == s.share_class);
            let amount = match class {
                Some(c) if c.shares_outstanding > 0.0 => {
                    let class_total = *class_distribution.get(&c.class_name).unwrap_or(&0.0);
                    (s.total_shares / c.shares_outstanding) * class_total
                }
                _ => 0.0,
            };
            WaterfallDistribution {
                shareholder: s.base.name.clone(),
                amount,
            }
        })
        .collect()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Severity {
    Error,
    Warning,
    Info,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationIssue {
    pub entity_id: String,
    pub entity_type: Option<String>,
    pub field: Option<String>,
    pub message: String,
    pub severity: Severity,
    pub suggestion: Option<String>,
}

fn issue(entity_id: &str, entity_type: &str, message: impl Into<String>, severity: Severity) -> ValidationIssue {
    ValidationIssue {
        entity_id: entity_id.to_string(),
        entity_type: Some(entity_type.to_string()),
        field: None,
        message: message.into(),
        severity,
        suggestion: None,
    }
}

/// Cross-entity cap-table validation: references, round math, valuation
/// progression, majority control, and option-pool utilization.
pub fn validate(entities: &[Entity]) -> Vec<ValidationIssue> {
    let shareholders: Vec<&Shareholder> = entities
        .iter()
        .filter_map(|e| match e {
            Entity::Shareholder(s) => Some(s),
            _ => None,
        })
        .collect();
    let share_classes: Vec<&ShareClass> = entities
        .iter()
        .filter_map(|e| match e {
            Entity::ShareClass(c) => Some(c),
            _ => None,
        })
        .collect();
    let rounds: Vec<&FundingRound> = entities
        .iter()
        .filter_map(|e| match e {
            Entity::FundingRound(r) => Some(r),
            _ => None,
        })
        .collect();

    let mut issues = Vec::new();
    let class_names: std::collections::HashSet<&str> =
        share_classes.iter().map(|c| c.class_name.as_str()).collect();

    for s in &shareholders {
        if !class_names.contains(s.share_class.as_str()) {
            issues.push(issue(
                &s.base.name,
                "shareholder",
                format!("references unknown share class `{}`", s.share_class),
                Severity::Error,
            ));
        }
    }

    for round in &rounds {
        if let (Some(pre), Some(post)) = (round.pre_money, round.post_money) {
            if (pre + round.amount_raised - post).abs() > 1.0 {
                issues.push(issue(
                    &round.base.name,
                    "funding_round",
                    "post_money does not equal pre_money + amount_raised",
                    Severity::Error,
                ));
            }
        }
        if let (Some(shares), Some(price)) = (round.shares_issued, round.price_per_share) {
            if (shares * price - round.amount_raised).abs() > 1.0 {
                issues.push(issue(
                    &round.base.name,
                    "funding_round",
                    "shares_issued * price_per_share does not equal amount_raised",
                    Severity::Error,
                ));
            }
        }
    }

    let mut chronological: Vec<&&FundingRound> = rounds.iter().collect();
    chronological.sort_by_key(|r| r.base.start_date);
    for pair in chronological.windows(2) {
        if let (Some(prev_post), Some(next_pre)) = (pair[0].post_money, pair[1].pre_money) {
            if prev_post > 0.0 && next_pre < prev_post * 0.5 {
                issues.push(issue(
                    &pair[1].base.name,
                    "funding_round",
                    "down round: pre-money valuation dropped more than 50% from the prior round's post-money",
                    Severity::Warning,
                ));
            }
        }
    }

    let total_board_seats: u32 = shareholders.iter().map(|s| s.board_seats).sum();
    if total_board_seats > 0 {
        for s in &shareholders {
            if s.board_seats as f64 / total_board_seats as f64 > 0.5 {
                issues.push(issue(
                    &s.base.name,
                    "shareholder",
                    "holds majority board control",
                    Severity::Info,
                ));
            }
        }
    }

    for c in &share_classes {
        if c.shares_authorized > 0.0 {
            let utilization = c.shares_outstanding / c.shares_authorized;
            if utilization > 0.95 {
                issues.push(issue(
                    &c.class_name,
                    "share_class",
                    format!("option pool utilization is {:.1}%", utilization * 100.0),
                    Severity::Warning,
                ));
            }
        }
    }

    let total_fd = fully_diluted_total(&shareholders, &share_classes);
    if total_fd > 0.0 {
        let total_ownership: f64 = shareholders.iter().map(|s| s.total_shares / total_fd).sum();
        if !(0.8..=1.05).contains(&total_ownership) {
            issues.push(ValidationIssue {
                entity_id: "cap_table".to_string(),
                entity_type: None,
                field: Some("ownership_pct".to_string()),
                message: format!("sum of ownership percentages is {:.3}, outside [0.8, 1.05]", total_ownership),
                severity: Severity::Warning,
                suggestion: Some("reconcile shareholder and share class records".to_string()),
            });
        }
    }

    issues
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity::EntityBase;
    use crate::entity::ShareholderType;
    use approx::assert_abs_diff_eq;
    use chrono::NaiveDate;

    fn date(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    fn shareholder(name: &str, shares: f64, class: &str, seats: u32) -> Shareholder {
        Shareholder {
            base: EntityBase::new(name, date("2023-01-01")),
            total_shares: shares,
            shareholder_type: ShareholderType::Founder,
            share_class: class.to_string(),
            cliff_months: 0,
            vesting_months: 0,
            board_seats: seats,
        }
    }

    fn share_class(name: &str, authorized: f64, outstanding: f64, participating: bool) -> ShareClass {
        ShareClass {
            base: EntityBase::new(name, date("2023-01-01")),
            class_name: name.to_string(),
            shares_authorized: authorized,
            shares_outstanding: outstanding,
            par_value: 1.0,
            liquidation_preference: 1.0,
            participating,
            voting_rights_per_share: 1.0,
            anti_dilution: None,
            liquidation_seniority: None,
        }
    }

    #[test]
    fn ownership_percentages_sum_near_one() {
        let a = shareholder("Alice", 6_000_000.0, "common", 2);
        let b = shareholder("Bob", 4_000_000.0, "common", 1);
        let common = share_class("common", 10_000_000.0, 10_000_000.0, false);
        let snapshot = ownership_snapshot(&[&a, &b], &[&common]);
        let total: f64 = snapshot.rows.iter().map(|r| r.ownership_pct).sum();
        assert_abs_diff_eq!(total, 1.0, epsilon = 1e-6);
    }

    #[test]
    fn waterfall_pays_preference_before_remainder() {
        let a = shareholder("Alice", 1_000_000.0, "preferred", 1);
        let preferred = share_class("preferred", 1_000_000.0, 1_000_000.0, false);
        let result = liquidation_waterfall(&[&a], &[&preferred], 500_000.0);
        assert_eq!(result.len(), 1);
        assert!(result[0].amount > 0.0);
    }

    #[test]
    fn validate_flags_unknown_share_class_reference() {
        let a = shareholder("Alice", 1_000_000.0, "missing", 1);
        let issues = validate(&[Entity::Shareholder(a)]);
        assert!(issues.iter().any(|i| i.severity == Severity::Error));
    }

    #[test]
    fn validate_flags_option_pool_overutilization() {
        let pool = share_class("pool", 1_000_000.0, 980_000.0, false);
        let issues = validate(&[Entity::ShareClass(pool)]);
        assert!(issues
            .iter()
            .any(|i| i.message.contains("utilization") && i.severity == Severity::Warning));
    }
}
