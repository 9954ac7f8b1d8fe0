//! Calculator Registry (C2): a process-wide `(entity_type, calculator_name) -> fn`
//! dispatch table, populated once at process start and read-only thereafter.

mod builtin;

pub use builtin::register_builtin_calculators;

use std::collections::HashMap;
use std::sync::OnceLock;

use chrono::NaiveDate;
use log::warn;

use crate::entity::Entity;

/// Everything a calculator needs, threaded in by the engine for each
/// `(entity, month)` pair it evaluates.
#[derive(Debug, Clone)]
pub struct CalculationContext {
    pub as_of_date: NaiveDate,
    pub scenario_name: String,
    pub include_projections: bool,
}

impl CalculationContext {
    pub fn new(as_of_date: NaiveDate, scenario_name: impl Into<String>) -> Self {
        Self {
            as_of_date,
            scenario_name: scenario_name.into(),
            include_projections: true,
        }
    }
}

type CalculatorFn = fn(&Entity, &CalculationContext) -> f64;

#[derive(Debug, Clone)]
pub struct CalculatorMeta {
    pub description: &'static str,
    pub dependencies: &'static [&'static str],
}

#[derive(Default)]
pub struct CalculatorRegistry {
    calculators: HashMap<(&'static str, &'static str), CalculatorFn>,
    metadata: HashMap<(&'static str, &'static str), CalculatorMeta>,
}

impl CalculatorRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Idempotent by `(entity_type, name)`; the last registration wins.
    pub fn register(
        &mut self,
        entity_type: &'static str,
        name: &'static str,
        f: CalculatorFn,
        meta: CalculatorMeta,
    ) {
        self.calculators.insert((entity_type, name), f);
        self.metadata.insert((entity_type, name), meta);
    }

    pub fn get(&self, entity_type: &str, name: &str) -> Option<CalculatorFn> {
        self.calculators
            .iter()
            .find(|((t, n), _)| *t == entity_type && *n == name)
            .map(|(_, f)| *f)
    }

    pub fn calculators_for(&self, entity_type: &str) -> Vec<(&'static str, CalculatorFn)> {
        self.calculators
            .iter()
            .filter(|((t, _), _)| *t == entity_type)
            .map(|((_, n), f)| (*n, *f))
            .collect()
    }

    pub fn calculate(
        &self,
        entity: &Entity,
        name: &str,
        ctx: &CalculationContext,
    ) -> Option<f64> {
        self.get(entity.type_tag(), name).map(|f| f(entity, ctx))
    }

    /// Run every calculator registered for `entity.type_tag()`. A calculator
    /// panicking is not caught here (Rust calculators are not expected to
    /// panic on well-formed entities); a calculator returning `NaN` or
    /// infinite is logged and treated as a zero contribution, matching the
    /// spec's per-calculator error isolation.
    pub fn calculate_all(
        &self,
        entity: &Entity,
        ctx: &CalculationContext,
    ) -> HashMap<&'static str, f64> {
        let mut results = HashMap::new();
        for (name, f) in self.calculators_for(entity.type_tag()) {
            let value = f(entity, ctx);
            if value.is_finite() {
                results.insert(name, value);
            } else {
                warn!(
                    "calculator {}/{} produced a non-finite result for entity {}; treating as 0",
                    entity.type_tag(),
                    name,
                    entity.name()
                );
                results.insert(name, 0.0);
            }
        }
        results
    }

    pub fn validate_dependencies(&self, entity_type: &str, name: &str) -> Vec<&'static str> {
        let Some((_, meta)) = self
            .metadata
            .iter()
            .find(|((t, n), _)| *t == entity_type && *n == name)
        else {
            return Vec::new();
        };
        meta.dependencies
            .iter()
            .filter(|dep| self.get(entity_type, dep).is_none())
            .copied()
            .collect()
    }
}

static REGISTRY: OnceLock<CalculatorRegistry> = OnceLock::new();

/// The global, process-wide calculator registry. Built exactly once.
pub fn global_registry() -> &'static CalculatorRegistry {
    REGISTRY.get_or_init(|| {
        let mut registry = CalculatorRegistry::new();
        register_builtin_calculators(&mut registry);
        registry
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity::{Employee, EntityBase};
    use approx::assert_abs_diff_eq;

    fn date(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    #[test]
    fn global_registry_dispatches_employee_calculators() {
        let entity = Entity::Employee(Employee {
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
        });
        let ctx = CalculationContext::new(date("2024-06-01"), "baseline");
        let results = global_registry().calculate_all(&entity, &ctx);
        assert_abs_diff_eq!(results["total_cost_calc"], 13_000.0, epsilon = 1e-6);
    }
}
