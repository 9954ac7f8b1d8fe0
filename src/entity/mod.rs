//! Entity model (C1): typed, validated descriptors with a uniform activity predicate.
//!
//! Every entity is a tagged variant carrying the common [`EntityBase`] fields plus
//! its own required/optional fields. Unknown keys present in the source document
//! are preserved in `EntityBase::extra` and round-trip through persistence even
//! though no built-in calculator reads them.

mod captable;
mod employee;
mod expense;
mod loader;
mod project;
mod revenue;

pub use captable::{FundingRound, Shareholder, ShareholderType, ShareClass, AntiDilution, RoundType};
pub use employee::{Employee, EmployeeEquity};
pub use expense::{Equipment, Facility, Software};
pub use loader::{create_entity, EntityLoader};
pub use project::{Project, ProjectStatus};
pub use revenue::{Grant, Investment, Sale, Service, ScheduledPayment};

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::error::{CashflowError, Result};

/// Fields common to every entity, matching the open-schema base record of the spec.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntityBase {
    pub name: String,
    pub start_date: NaiveDate,
    #[serde(default)]
    pub end_date: Option<NaiveDate>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub notes: Option<String>,
    /// Unrecognized keys from the source document, preserved verbatim.
    #[serde(flatten)]
    pub extra: BTreeMap<String, serde_json::Value>,
}

impl EntityBase {
    pub fn new(name: impl Into<String>, start_date: NaiveDate) -> Self {
        Self {
            name: name.into(),
            start_date,
            end_date: None,
            tags: Vec::new(),
            notes: None,
            extra: BTreeMap::new(),
        }
    }

    pub fn validate(&self, entity_label: &str) -> Result<()> {
        if self.name.trim().is_empty() {
            return Err(CashflowError::InvalidField {
                entity: entity_label.to_string(),
                field: "name".to_string(),
                reason: "must not be empty".to_string(),
            });
        }
        if let Some(end) = self.end_date {
            if end < self.start_date {
                return Err(CashflowError::InvalidField {
                    entity: entity_label.to_string(),
                    field: "end_date".to_string(),
                    reason: "must be >= start_date".to_string(),
                });
            }
        }
        Ok(())
    }

    pub fn is_active(&self, as_of_date: NaiveDate) -> bool {
        if self.start_date > as_of_date {
            return false;
        }
        match self.end_date {
            None => true,
            Some(end) => end >= as_of_date,
        }
    }
}

/// The closed set of entity variants the engine understands.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
#[serde(rename_all = "snake_case")]
pub enum Entity {
    Employee(Employee),
    Grant(Grant),
    Investment(Investment),
    Sale(Sale),
    Service(Service),
    Facility(Facility),
    Software(Software),
    Equipment(Equipment),
    Project(Project),
    Shareholder(Shareholder),
    ShareClass(ShareClass),
    FundingRound(FundingRound),
}

impl Entity {
    pub fn base(&self) -> &EntityBase {
        match self {
            Entity::Employee(e) => &e.base,
            Entity::Grant(e) => &e.base,
            Entity::Investment(e) => &e.base,
            Entity::Sale(e) => &e.base,
            Entity::Service(e) => &e.base,
            Entity::Facility(e) => &e.base,
            Entity::Software(e) => &e.base,
            Entity::Equipment(e) => &e.base,
            Entity::Project(e) => &e.base,
            Entity::Shareholder(e) => &e.base,
            Entity::ShareClass(e) => &e.base,
            Entity::FundingRound(e) => &e.base,
        }
    }

    pub fn base_mut(&mut self) -> &mut EntityBase {
        match self {
            Entity::Employee(e) => &mut e.base,
            Entity::Grant(e) => &mut e.base,
            Entity::Investment(e) => &mut e.base,
            Entity::Sale(e) => &mut e.base,
            Entity::Service(e) => &mut e.base,
            Entity::Facility(e) => &mut e.base,
            Entity::Software(e) => &mut e.base,
            Entity::Equipment(e) => &mut e.base,
            Entity::Project(e) => &mut e.base,
            Entity::Shareholder(e) => &mut e.base,
            Entity::ShareClass(e) => &mut e.base,
            Entity::FundingRound(e) => &mut e.base,
        }
    }

    pub fn name(&self) -> &str {
        &self.base().name
    }

    pub fn type_tag(&self) -> &'static str {
        match self {
            Entity::Employee(_) => "employee",
            Entity::Grant(_) => "grant",
            Entity::Investment(_) => "investment",
            Entity::Sale(_) => "sale",
            Entity::Service(_) => "service",
            Entity::Facility(_) => "facility",
            Entity::Software(_) => "software",
            Entity::Equipment(_) => "equipment",
            Entity::Project(_) => "project",
            Entity::Shareholder(_) => "shareholder",
            Entity::ShareClass(_) => "share_class",
            Entity::FundingRound(_) => "funding_round",
        }
    }

    pub fn is_active(&self, as_of_date: NaiveDate) -> bool {
        self.base().is_active(as_of_date)
    }

    pub fn tags(&self) -> &[String] {
        &self.base().tags
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    #[test]
    fn is_active_bounds() {
        let mut base = EntityBase::new("x", date("2024-01-01"));
        assert!(base.is_active(date("2024-01-01")));
        assert!(!base.is_active(date("2023-12-31")));
        base.end_date = Some(date("2024-06-01"));
        assert!(base.is_active(date("2024-06-01")));
        assert!(!base.is_active(date("2024-06-02")));
    }

    #[test]
    fn end_before_start_is_invalid() {
        let mut base = EntityBase::new("x", date("2024-06-01"));
        base.end_date = Some(date("2024-01-01"));
        assert!(base.validate("x").is_err());
    }
}
