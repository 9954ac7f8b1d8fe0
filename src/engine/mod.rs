//! Cash-Flow Engine (C5): the orchestrator tying the entity store, scenario
//! system, calculator registry, and result cache together.

mod cache;
mod frame;

pub use cache::{CacheKey, FrameCache};
pub use frame::{category_for, safe_divide, Category, MonthlyFrame, MonthlyRow};

use chrono::{Datelike, NaiveDate};
use rayon::prelude::*;

use crate::calculators::{global_registry, CalculationContext};
use crate::entity::Entity;
use crate::error::{CashflowError, Result};
use crate::scenario::{Scenario, ScenarioRegistry};
use crate::store::EntityStore;

#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Worker pool size for per-month parallel evaluation; `None` defers to
    /// `min(cpu_count, 4)`.
    pub worker_pool_size: Option<usize>,
    pub cache_capacity: usize,
    pub starting_cash: f64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            worker_pool_size: None,
            cache_capacity: 32,
            starting_cash: 0.0,
        }
    }
}

pub struct CashFlowEngine {
    config: EngineConfig,
    cache: FrameCache,
    pool: rayon::ThreadPool,
}

impl CashFlowEngine {
    pub fn new(config: EngineConfig) -> Self {
        let workers = config.worker_pool_size.unwrap_or_else(|| num_cpus().min(4));
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(workers.max(1))
            .build()
            .expect("thread pool builds with a positive thread count");
        Self {
            cache: FrameCache::new(config.cache_capacity),
            config,
            pool,
        }
    }

    pub fn clear_cache(&self) {
        self.cache.clear();
    }

    /// Compute the monthly grid for `[start, end]` under `scenario_name`,
    /// consulting (and populating) the result cache.
    pub fn calculate(
        &self,
        store: &EntityStore,
        scenarios: &ScenarioRegistry,
        start: NaiveDate,
        end: NaiveDate,
        scenario_name: &str,
    ) -> Result<MonthlyFrame> {
        if end < start {
            return Err(CashflowError::BadRange {
                start: start.to_string(),
                end: end.to_string(),
            });
        }

        let key: CacheKey = (start, end, scenario_name.to_string());
        if let Some(frame) = self.cache.get(&key) {
            return Ok(frame);
        }

        let scenario = scenarios.get(scenario_name).ok_or_else(|| CashflowError::NotFound {
            kind: "scenario",
            name: scenario_name.to_string(),
        })?;

        let entities = store.all();
        let transformed = scenario.apply_to_set(&entities);

        let months = month_starts(start, end);
        let registry = global_registry();

        let pool_ref = &self.pool;
        let rows: Vec<MonthlyRow> = pool_ref.install(|| {
            months
                .par_iter()
                .map(|&month| evaluate_month(&transformed, registry, month, scenario))
                .collect()
        });

        let mut frame = MonthlyFrame { rows };
        frame.finalize(self.config.starting_cash);

        self.cache.insert(key, frame.clone());
        Ok(frame)
    }
}

fn num_cpus() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1)
}

fn month_starts(start: NaiveDate, end: NaiveDate) -> Vec<NaiveDate> {
    let mut months = Vec::new();
    let mut cursor = NaiveDate::from_ymd_opt(start.year(), start.month(), 1).expect("valid date");
    while cursor <= end {
        months.push(cursor);
        cursor = next_month(cursor);
    }
    months
}

fn next_month(date: NaiveDate) -> NaiveDate {
    if date.month() == 12 {
        NaiveDate::from_ymd_opt(date.year() + 1, 1, 1).expect("valid date")
    } else {
        NaiveDate::from_ymd_opt(date.year(), date.month() + 1, 1).expect("valid date")
    }
}

/// Evaluate a single month: dispatch every active entity through its
/// registered calculators and route results into category buckets.
///
/// The scenario's `revenue_growth_rate` assumption is not applied here — it
/// is a reporting-facing figure (see `Scenario::revenue_growth_rate`, used by
/// callers that want a projected view) and must not perturb the entities'
/// own scheduled/lump-sum amounts, which land in the grid exactly as each
/// entity computes them for the month.
fn evaluate_month(
    entities: &[Entity],
    registry: &crate::calculators::CalculatorRegistry,
    month: NaiveDate,
    scenario: &Scenario,
) -> MonthlyRow {
    let mut row = MonthlyRow::new(month);
    let ctx = CalculationContext::new(month, scenario.name.clone());

    for entity in entities {
        if !entity.is_active(month) {
            continue;
        }
        let results = registry.calculate_all(entity, &ctx);
        for (calculator_name, value) in results {
            if let Some(category) = category_for(entity.type_tag(), calculator_name) {
                row.add(category, value);
            }
        }
        if entity.type_tag() == "employee" {
            row.active_employees += 1;
        }
        if entity.type_tag() == "project" {
            row.active_projects += 1;
        }
    }

    row
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity::{Employee, EntityBase, Grant, ScheduledPayment};

    fn date(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    fn employee(name: &str, start: &str, salary: f64) -> Entity {
        Entity::Employee(Employee {
            base: EntityBase::new(name, date(start)),
            salary,
            overhead_multiplier: 1.3,
            benefits_annual: 0.0,
            home_office_stipend: 0.0,
            allowances_annual: 0.0,
            signing_bonus: 0.0,
            relocation_assistance: 0.0,
            bonus_performance_max: 0.0,
            bonus_milestone_max: 0.0,
            equity: None,
        })
    }

    #[test]
    fn calculate_produces_one_row_per_month_and_caches() {
        let store = EntityStore::new();
        store.add(employee("Alice", "2024-01-01", 120_000.0));
        let scenarios = ScenarioRegistry::new();
        let engine = CashFlowEngine::new(EngineConfig::default());

        let frame = engine
            .calculate(&store, &scenarios, date("2024-01-01"), date("2024-03-01"), "baseline")
            .unwrap();
        assert_eq!(frame.rows.len(), 3);
        assert!(frame.rows[0].employee_costs > 0.0);

        let cached = engine
            .calculate(&store, &scenarios, date("2024-01-01"), date("2024-03-01"), "baseline")
            .unwrap();
        assert_eq!(frame, cached);
    }

    #[test]
    fn grant_schedule_lands_unperturbed_under_growth_scenario() {
        let store = EntityStore::new();
        store.add(Entity::Grant(Grant {
            base: EntityBase::new("NSF Grant", date("2024-01-01")),
            amount: 300_000.0,
            agency: None,
            indirect_cost_rate: 0.0,
            payment_schedule: vec![
                ScheduledPayment { date: date("2024-02-01"), amount: 100_000.0 },
                ScheduledPayment { date: date("2024-05-01"), amount: 100_000.0 },
                ScheduledPayment { date: date("2024-09-01"), amount: 100_000.0 },
            ],
        }));
        let scenarios = ScenarioRegistry::new();
        let engine = CashFlowEngine::new(EngineConfig::default());

        let frame = engine
            .calculate(&store, &scenarios, date("2024-01-01"), date("2024-12-01"), "baseline")
            .unwrap();
        assert_eq!(frame.rows[1].grant_revenue, 100_000.0);
        assert_eq!(frame.rows[4].grant_revenue, 100_000.0);
        assert_eq!(frame.rows[8].grant_revenue, 100_000.0);
        assert_eq!(frame.rows[0].grant_revenue, 0.0);
    }

    #[test]
    fn unknown_scenario_is_not_found() {
        let store = EntityStore::new();
        let scenarios = ScenarioRegistry::new();
        let engine = CashFlowEngine::new(EngineConfig::default());
        let result = engine.calculate(&store, &scenarios, date("2024-01-01"), date("2024-02-01"), "nope");
        assert!(result.is_err());
    }

    #[test]
    fn bad_range_is_rejected() {
        let store = EntityStore::new();
        let scenarios = ScenarioRegistry::new();
        let engine = CashFlowEngine::new(EngineConfig::default());
        let result = engine.calculate(&store, &scenarios, date("2024-03-01"), date("2024-01-01"), "baseline");
        assert!(matches!(result, Err(CashflowError::BadRange { .. })));
    }
}
