//! R&D project entity with budget burn tracking and milestone reporting.

use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::EntityBase;
use crate::error::{CashflowError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProjectStatus {
    Planned,
    Active,
    OnHold,
    Completed,
    Cancelled,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Milestone {
    pub name: String,
    pub planned_date: NaiveDate,
    #[serde(default)]
    pub status: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Project {
    #[serde(flatten)]
    pub base: EntityBase,
    pub total_budget: f64,
    #[serde(default = "default_status")]
    pub status: ProjectStatus,
    #[serde(default)]
    pub completion_percentage: f64,
    #[serde(default)]
    pub budget_categories: Option<BTreeMap<String, f64>>,
    #[serde(default)]
    pub planned_end_date: Option<NaiveDate>,
    #[serde(default)]
    pub milestones: Vec<Milestone>,
    #[serde(default)]
    pub team_members: Vec<String>,
}

fn default_status() -> ProjectStatus {
    ProjectStatus::Planned
}

impl Project {
    pub fn validate(&self) -> Result<()> {
        self.base.validate("project")?;
        if self.total_budget <= 0.0 {
            return Err(CashflowError::InvalidField {
                entity: self.base.name.clone(),
                field: "total_budget".to_string(),
                reason: "must be positive".to_string(),
            });
        }
        if !(0.0..=100.0).contains(&self.completion_percentage) {
            return Err(CashflowError::InvalidField {
                entity: self.base.name.clone(),
                field: "completion_percentage".to_string(),
                reason: "must be within [0, 100]".to_string(),
            });
        }
        Ok(())
    }

    pub fn is_active_project(&self, as_of_date: NaiveDate) -> bool {
        if matches!(self.status, ProjectStatus::Cancelled | ProjectStatus::Completed) {
            return false;
        }
        self.base.is_active(as_of_date)
    }

    fn duration_months(&self) -> i64 {
        let end = self.planned_end_date.or(self.base.end_date);
        match end {
            None => 12,
            Some(end) => {
                let months = (end.year() - self.base.start_date.year()) as i64 * 12
                    + end.month() as i64
                    - self.base.start_date.month() as i64;
                months.max(1)
            }
        }
    }

    pub fn burn_rate(&self, as_of_date: NaiveDate) -> f64 {
        if !self.is_active_project(as_of_date) {
            return 0.0;
        }
        if let Some(categories) = &self.budget_categories {
            return categories.values().sum::<f64>() / 12.0;
        }
        self.total_budget / self.duration_months() as f64
    }

    /// The first upcoming, not-yet-completed milestone due within 30 days of
    /// `as_of_date`. `None` if nothing is that close, or everything due soon
    /// is already completed.
    pub fn active_milestone(&self, as_of_date: NaiveDate) -> Option<&Milestone> {
        self.milestones.iter().find(|m| {
            m.planned_date >= as_of_date
                && (m.planned_date - as_of_date).num_days() <= 30
                && m.status != "completed"
        })
    }

    pub fn overdue_milestones(&self, as_of_date: NaiveDate) -> Vec<&Milestone> {
        self.milestones
            .iter()
            .filter(|m| m.planned_date < as_of_date && m.status != "completed")
            .collect()
    }

    pub fn milestone_completion_rate(&self) -> f64 {
        if self.milestones.is_empty() {
            return 0.0;
        }
        let completed = self.milestones.iter().filter(|m| m.status == "completed").count();
        completed as f64 / self.milestones.len() as f64 * 100.0
    }

    pub fn budget_utilization(&self, spent: f64, committed: f64) -> f64 {
        if self.total_budget == 0.0 {
            return 0.0;
        }
        (spent + committed) / self.total_budget * 100.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    #[test]
    fn burn_rate_zero_once_completed() {
        let mut p = Project {
            base: EntityBase::new("Battery R&D", date("2024-01-01")),
            total_budget: 120_000.0,
            status: ProjectStatus::Active,
            completion_percentage: 0.0,
            budget_categories: None,
            planned_end_date: Some(date("2024-12-01")),
            milestones: vec![],
            team_members: vec![],
        };
        assert!(p.burn_rate(date("2024-06-01")) > 0.0);
        p.status = ProjectStatus::Completed;
        assert_eq!(p.burn_rate(date("2024-06-01")), 0.0);
    }

    #[test]
    fn active_milestone_picks_upcoming_one_within_30_days() {
        let p = Project {
            base: EntityBase::new("Battery R&D", date("2024-01-01")),
            total_budget: 120_000.0,
            status: ProjectStatus::Active,
            completion_percentage: 0.0,
            budget_categories: None,
            planned_end_date: Some(date("2024-12-01")),
            milestones: vec![
                Milestone {
                    name: "Prototype".to_string(),
                    planned_date: date("2024-03-01"),
                    status: "completed".to_string(),
                },
                Milestone {
                    name: "Pilot batch".to_string(),
                    planned_date: date("2024-06-01"),
                    status: "pending".to_string(),
                },
                Milestone {
                    name: "Launch".to_string(),
                    planned_date: date("2024-11-01"),
                    status: "pending".to_string(),
                },
            ],
            team_members: vec![],
        };
        let active = p.active_milestone(date("2024-05-15")).unwrap();
        assert_eq!(active.name, "Pilot batch");
        assert!(p.active_milestone(date("2024-04-01")).is_none());
    }

    #[test]
    fn active_milestone_none_once_all_completed() {
        let p = Project {
            base: EntityBase::new("Battery R&D", date("2024-01-01")),
            total_budget: 120_000.0,
            status: ProjectStatus::Active,
            completion_percentage: 100.0,
            budget_categories: None,
            planned_end_date: Some(date("2024-12-01")),
            milestones: vec![Milestone {
                name: "Prototype".to_string(),
                planned_date: date("2024-03-01"),
                status: "completed".to_string(),
            }],
            team_members: vec![],
        };
        assert!(p.active_milestone(date("2024-02-15")).is_none());
    }
}
