//! Scenario System (C6): declarative overrides and filters applied to an
//! entity set before the cash-flow engine evaluates it.

use std::collections::HashMap;

use regex::RegexBuilder;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::entity::Entity;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum OverrideAction {
    Set { field: String, value: Value },
    Multiply { field: String, multiplier: f64 },
    Changes { changes: HashMap<String, Value> },
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Override {
    pub name: Option<String>,
    pub entity_type: Option<String>,
    pub name_pattern: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    pub action: Option<OverrideAction>,
}

impl Override {
    fn matches(&self, entity: &Entity) -> bool {
        if let Some(n) = &self.name {
            if entity.name() == n {
                return true;
            }
        }
        if let Some(t) = &self.entity_type {
            if entity.type_tag() == t {
                return true;
            }
        }
        if let Some(pat) = &self.name_pattern {
            if let Ok(re) = RegexBuilder::new(pat).case_insensitive(true).build() {
                if re.is_match(entity.name()) {
                    return true;
                }
            }
        }
        if !self.tags.is_empty() {
            let entity_tags: std::collections::HashSet<&str> =
                entity.tags().iter().map(|s| s.as_str()).collect();
            if self.tags.iter().any(|t| entity_tags.contains(t.as_str())) {
                return true;
            }
        }
        false
    }

    fn apply(&self, fields: &mut serde_json::Map<String, Value>) {
        match &self.action {
            Some(OverrideAction::Set { field, value }) => {
                fields.insert(field.clone(), value.clone());
            }
            Some(OverrideAction::Multiply { field, multiplier }) => {
                let current = fields.get(field).and_then(|v| v.as_f64()).unwrap_or(0.0);
                fields.insert(field.clone(), Value::from(current * multiplier));
            }
            Some(OverrideAction::Changes { changes }) => {
                for (field, value) in changes {
                    fields.insert(field.clone(), value.clone());
                }
            }
            None => {}
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Filters {
    #[serde(default)]
    pub include_types: Vec<String>,
    #[serde(default)]
    pub exclude_types: Vec<String>,
    #[serde(default)]
    pub include_patterns: Vec<String>,
    #[serde(default)]
    pub exclude_patterns: Vec<String>,
    #[serde(default)]
    pub require_tags: Vec<String>,
    #[serde(default)]
    pub exclude_tags: Vec<String>,
}

impl Filters {
    /// Exclude rules are evaluated first and win outright over include rules.
    pub fn should_include(&self, entity: &Entity) -> bool {
        if !self.exclude_types.is_empty() && self.exclude_types.iter().any(|t| t == entity.type_tag()) {
            return false;
        }
        if !self.exclude_patterns.is_empty() && matches_any_pattern(&self.exclude_patterns, entity.name()) {
            return false;
        }
        if !self.exclude_tags.is_empty() {
            let entity_tags: std::collections::HashSet<&str> =
                entity.tags().iter().map(|s| s.as_str()).collect();
            if self.exclude_tags.iter().any(|t| entity_tags.contains(t.as_str())) {
                return false;
            }
        }
        if !self.include_types.is_empty() && !self.include_types.iter().any(|t| t == entity.type_tag()) {
            return false;
        }
        if !self.include_patterns.is_empty() && !matches_any_pattern(&self.include_patterns, entity.name()) {
            return false;
        }
        if !self.require_tags.is_empty() {
            let entity_tags: std::collections::HashSet<&str> =
                entity.tags().iter().map(|s| s.as_str()).collect();
            if !self.require_tags.iter().any(|t| entity_tags.contains(t.as_str())) {
                return false;
            }
        }
        true
    }
}

fn matches_any_pattern(patterns: &[String], name: &str) -> bool {
    patterns.iter().any(|pat| {
        RegexBuilder::new(pat)
            .case_insensitive(true)
            .build()
            .map(|re| re.is_match(name))
            .unwrap_or(false)
    })
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Scenario {
    pub name: String,
    pub description: String,
    #[serde(default)]
    pub assumptions: HashMap<String, Value>,
    #[serde(default)]
    pub entity_overrides: Vec<Override>,
    #[serde(default)]
    pub entity_filters: Filters,
}

impl Scenario {
    pub fn revenue_growth_rate(&self) -> Option<f64> {
        self.assumptions.get("revenue_growth_rate").and_then(|v| v.as_f64())
    }

    pub fn overhead_multiplier(&self) -> Option<f64> {
        self.assumptions.get("overhead_multiplier").and_then(|v| v.as_f64())
    }

    pub fn hiring_delay_months(&self) -> i64 {
        self.assumptions
            .get("hiring_delay_months")
            .and_then(|v| v.as_i64())
            .unwrap_or(0)
    }

    /// Apply matching overrides (in registration order) then global
    /// assumptions to a copy of `entity`. Entities the scenario leaves
    /// unmatched are returned unchanged (scenario idempotence).
    pub fn apply_to(&self, entity: &Entity) -> Entity {
        let mut value = serde_json::to_value(entity).expect("entity always serializes");
        if let Some(fields) = value.as_object_mut() {
            for ov in &self.entity_overrides {
                if ov.matches(entity) {
                    ov.apply(fields);
                }
            }

            if entity.type_tag() == "employee" {
                if let Some(mult) = self.overhead_multiplier() {
                    fields.insert("overhead_multiplier".to_string(), Value::from(mult));
                }
                let delay = self.hiring_delay_months();
                if delay != 0 {
                    if let Some(start) = fields.get("start_date").and_then(|v| v.as_str()) {
                        if let Ok(date) = chrono::NaiveDate::parse_from_str(start, "%Y-%m-%d") {
                            let shifted = date + chrono::Duration::days(delay * 30);
                            fields.insert(
                                "start_date".to_string(),
                                Value::from(shifted.format("%Y-%m-%d").to_string()),
                            );
                        }
                    }
                }
            }
        }
        serde_json::from_value(value).unwrap_or_else(|_| entity.clone())
    }

    /// Filter then transform: entities the filters exclude never reach `apply_to`.
    pub fn apply_to_set(&self, entities: &[Entity]) -> Vec<Entity> {
        entities
            .iter()
            .filter(|e| self.entity_filters.should_include(e))
            .map(|e| self.apply_to(e))
            .collect()
    }
}

pub struct ScenarioRegistry {
    scenarios: HashMap<String, Scenario>,
}

impl ScenarioRegistry {
    pub fn new() -> Self {
        let mut registry = Self {
            scenarios: HashMap::new(),
        };
        for scenario in predefined_scenarios() {
            registry.add(scenario);
        }
        registry
    }

    pub fn add(&mut self, scenario: Scenario) {
        self.scenarios.insert(scenario.name.clone(), scenario);
    }

    pub fn get(&self, name: &str) -> Option<&Scenario> {
        self.scenarios.get(name)
    }

    pub fn names(&self) -> Vec<&str> {
        self.scenarios.keys().map(|s| s.as_str()).collect()
    }
}

impl Default for ScenarioRegistry {
    fn default() -> Self {
        Self::new()
    }
}

fn multiply_override(entity_type: &str, multiplier: f64, field: &str) -> Override {
    Override {
        entity_type: Some(entity_type.to_string()),
        action: Some(OverrideAction::Multiply {
            field: field.to_string(),
            multiplier,
        }),
        ..Default::default()
    }
}

fn global_assumptions(rate: Option<f64>, overhead: f64, delay: i64) -> HashMap<String, Value> {
    let mut map = HashMap::from([
        ("overhead_multiplier".to_string(), Value::from(overhead)),
        ("hiring_delay_months".to_string(), Value::from(delay)),
    ]);
    if let Some(rate) = rate {
        map.insert("revenue_growth_rate".to_string(), Value::from(rate));
    }
    map
}

fn predefined_scenarios() -> Vec<Scenario> {
    vec![
        Scenario {
            name: "baseline".to_string(),
            description: "Current assumptions with no overrides".to_string(),
            assumptions: global_assumptions(Some(0.10), 1.3, 0),
            entity_overrides: vec![],
            entity_filters: Filters::default(),
        },
        Scenario {
            name: "optimistic".to_string(),
            description: "Faster growth, leaner overhead, accelerated hiring".to_string(),
            assumptions: global_assumptions(Some(0.25), 1.2, -1),
            entity_overrides: vec![
                multiply_override("sale", 1.5, "amount"),
                multiply_override("service", 1.2, "monthly_amount"),
            ],
            entity_filters: Filters::default(),
        },
        Scenario {
            name: "conservative".to_string(),
            description: "Slower growth, heavier overhead, delayed hiring".to_string(),
            assumptions: global_assumptions(Some(0.05), 1.4, 2),
            entity_overrides: vec![
                multiply_override("sale", 0.8, "amount"),
                multiply_override("grant", 0.9, "amount"),
            ],
            entity_filters: Filters::default(),
        },
        Scenario {
            name: "cash_preservation".to_string(),
            description: "Defer discretionary spend and non-essential entities".to_string(),
            assumptions: global_assumptions(None, 1.1, 6),
            entity_overrides: vec![
                Override {
                    name_pattern: Some(".*bonus.*".to_string()),
                    action: Some(OverrideAction::Set {
                        field: "bonus_performance_max".to_string(),
                        value: Value::from(0.0),
                    }),
                    ..Default::default()
                },
                multiply_override("facility", 0.9, "monthly_cost"),
            ],
            entity_filters: Filters {
                exclude_tags: vec!["non_essential".to_string()],
                exclude_patterns: vec!["bonus".to_string(), "stipend".to_string()],
                ..Default::default()
            },
        },
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity::{EntityBase, Sale};
    use approx::assert_abs_diff_eq;
    use chrono::NaiveDate;

    fn date(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    fn sale(amount: f64) -> Entity {
        Entity::Sale(Sale {
            base: EntityBase::new("Q1 Sale", date("2024-03-01")),
            amount,
            delivery_date: None,
            payment_schedule: vec![],
        })
    }

    #[test]
    fn optimistic_multiplies_sale_amount() {
        let registry = ScenarioRegistry::new();
        let scenario = registry.get("optimistic").unwrap();
        let transformed = scenario.apply_to(&sale(50_000.0));
        let Entity::Sale(s) = transformed else { panic!("expected sale") };
        assert_abs_diff_eq!(s.amount, 75_000.0, epsilon = 1e-6);
    }

    #[test]
    fn conservative_multiplies_sale_amount_down() {
        let registry = ScenarioRegistry::new();
        let scenario = registry.get("conservative").unwrap();
        let transformed = scenario.apply_to(&sale(50_000.0));
        let Entity::Sale(s) = transformed else { panic!("expected sale") };
        assert_abs_diff_eq!(s.amount, 40_000.0, epsilon = 1e-6);
    }

    #[test]
    fn baseline_leaves_unmatched_entity_unchanged() {
        let registry = ScenarioRegistry::new();
        let scenario = registry.get("baseline").unwrap();
        let transformed = scenario.apply_to(&sale(50_000.0));
        let Entity::Sale(s) = transformed else { panic!("expected sale") };
        assert_eq!(s.amount, 50_000.0);
    }

    #[test]
    fn cash_preservation_filters_out_non_essential_tag() {
        let registry = ScenarioRegistry::new();
        let scenario = registry.get("cash_preservation").unwrap();
        let mut tagged = sale(10_000.0);
        tagged.base_mut().tags.push("non_essential".to_string());
        let result = scenario.apply_to_set(&[tagged, sale(10_000.0)]);
        assert_eq!(result.len(), 1);
    }
}
