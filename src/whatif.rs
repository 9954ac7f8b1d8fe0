//! What-If Driver (C9): sensitivity sweeps, multi-parameter exploration, and
//! breakeven search layered on top of the cash-flow engine.

use std::collections::HashMap;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::engine::{CashFlowEngine, MonthlyFrame};
use crate::error::Result;
use crate::kpi::{self, Kpis};
use crate::scenario::{Override, OverrideAction, Scenario, ScenarioRegistry};
use crate::store::EntityStore;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Parameter {
    pub entity_name: String,
    pub entity_type: String,
    pub field: String,
    pub base_value: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Metric {
    FinalCashBalance,
    TotalRevenue,
    TotalExpenses,
    NetCashFlow,
    RunwayMonths,
    BurnRate,
}

fn extract_metric(frame: &MonthlyFrame, kpis: &Kpis, metric: Metric) -> f64 {
    match metric {
        Metric::FinalCashBalance => frame.rows.last().map(|r| r.cash_balance).unwrap_or(0.0),
        Metric::TotalRevenue => frame.rows.iter().map(|r| r.total_revenue).sum(),
        Metric::TotalExpenses => frame.rows.iter().map(|r| r.total_expenses).sum(),
        Metric::NetCashFlow => frame.rows.iter().map(|r| r.net_cash_flow).sum(),
        Metric::RunwayMonths => kpis.financial.runway_months,
        Metric::BurnRate => kpis.financial.burn_rate,
    }
}

/// Build a one-off scenario that sets `param.field` to `value` on the single
/// entity `param.entity_name`, inheriting everything else from `base`.
fn parameter_scenario(base: &Scenario, param: &Parameter, value: f64) -> Scenario {
    let mut scenario = base.clone();
    scenario.name = format!("{}__whatif", base.name);
    scenario.entity_overrides.push(Override {
        name: Some(param.entity_name.clone()),
        action: Some(OverrideAction::Set {
            field: param.field.clone(),
            value: serde_json::Value::from(value),
        }),
        ..Default::default()
    });
    scenario
}

fn run_with_value(
    engine: &CashFlowEngine,
    store: &EntityStore,
    scenarios: &ScenarioRegistry,
    base_scenario_name: &str,
    start: NaiveDate,
    end: NaiveDate,
    param: &Parameter,
    value: f64,
) -> Result<(MonthlyFrame, Kpis)> {
    let base = scenarios
        .get(base_scenario_name)
        .cloned()
        .unwrap_or_else(|| Scenario {
            name: base_scenario_name.to_string(),
            ..Default::default()
        });
    let scenario = parameter_scenario(&base, param, value);
    let mut temp_registry = ScenarioRegistry::new();
    temp_registry.add(scenario.clone());
    let frame = engine.calculate(store, &temp_registry, start, end, &scenario.name)?;
    let kpis = kpi::compute_all(&frame, None);
    Ok((frame, kpis))
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SensitivityPoint {
    pub value: f64,
    pub metrics: HashMap<String, f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SensitivityResult {
    pub points: Vec<SensitivityPoint>,
    pub correlation: HashMap<String, f64>,
    pub elasticity: HashMap<String, f64>,
}

fn pearson_correlation(xs: &[f64], ys: &[f64]) -> f64 {
    let n = xs.len() as f64;
    if xs.len() < 2 {
        return 0.0;
    }
    let x_mean = xs.iter().sum::<f64>() / n;
    let y_mean = ys.iter().sum::<f64>() / n;
    let cov: f64 = xs.iter().zip(ys).map(|(x, y)| (x - x_mean) * (y - y_mean)).sum();
    let x_var: f64 = xs.iter().map(|x| (x - x_mean).powi(2)).sum();
    let y_var: f64 = ys.iter().map(|y| (y - y_mean).powi(2)).sum();
    if x_var == 0.0 || y_var == 0.0 {
        0.0
    } else {
        cov / (x_var.sqrt() * y_var.sqrt())
    }
}

const SENSITIVITY_METRICS: [(&str, Metric); 4] = [
    ("final_cash_balance", Metric::FinalCashBalance),
    ("total_revenue", Metric::TotalRevenue),
    ("net_cash_flow", Metric::NetCashFlow),
    ("runway_months", Metric::RunwayMonths),
];

pub struct WhatIfDriver;

impl WhatIfDriver {
    /// Sweep `values` for a single parameter, returning per-value metrics
    /// plus parameter/metric correlation and elasticity.
    #[allow(clippy::too_many_arguments)]
    pub fn sensitivity(
        &self,
        engine: &CashFlowEngine,
        store: &EntityStore,
        scenarios: &ScenarioRegistry,
        base_scenario_name: &str,
        start: NaiveDate,
        end: NaiveDate,
        param: &Parameter,
        values: &[f64],
    ) -> Result<SensitivityResult> {
        let mut points = Vec::with_capacity(values.len());
        let mut metric_series: HashMap<&str, Vec<f64>> =
            SENSITIVITY_METRICS.iter().map(|(k, _)| (*k, Vec::new())).collect();

        for &value in values {
            let (frame, kpis) =
                run_with_value(engine, store, scenarios, base_scenario_name, start, end, param, value)?;
            let mut metrics = HashMap::new();
            for (key, metric) in SENSITIVITY_METRICS {
                let v = extract_metric(&frame, &kpis, metric);
                metrics.insert(key.to_string(), v);
                metric_series.get_mut(key).unwrap().push(v);
            }
            points.push(SensitivityPoint { value, metrics });
        }

        let mut correlation = HashMap::new();
        let mut elasticity = HashMap::new();
        for (key, series) in &metric_series {
            correlation.insert(key.to_string(), pearson_correlation(values, series));
            elasticity.insert(
                key.to_string(),
                self.elasticity(param.base_value, values, series),
            );
        }

        Ok(SensitivityResult {
            points,
            correlation,
            elasticity,
        })
    }

    fn elasticity(&self, base_value: f64, values: &[f64], series: &[f64]) -> f64 {
        if values.len() < 2 || base_value == 0.0 {
            return 0.0;
        }
        let base_metric = series[0];
        let last_value = *values.last().unwrap();
        let last_metric = *series.last().unwrap();
        if base_metric == 0.0 || base_value == last_value {
            return 0.0;
        }
        let pct_metric = (last_metric - base_metric) / base_metric.abs();
        let pct_param = (last_value - base_value) / base_value.abs();
        if pct_param == 0.0 {
            0.0
        } else {
            pct_metric / pct_param
        }
    }

    /// Cartesian product of `params`, capped at `max_combinations` by even
    /// subsampling, run independently; reports per-metric summaries plus the
    /// best/worst combination by final cash balance.
    #[allow(clippy::too_many_arguments)]
    pub fn multi_parameter(
        &self,
        engine: &CashFlowEngine,
        store: &EntityStore,
        scenarios: &ScenarioRegistry,
        base_scenario_name: &str,
        start: NaiveDate,
        end: NaiveDate,
        params: &[Parameter],
        value_sets: &[Vec<f64>],
        max_combinations: usize,
    ) -> Result<MultiParameterResult> {
        let mut combinations = cartesian_product(value_sets);
        let dropped = combinations.len().saturating_sub(max_combinations);
        if dropped > 0 {
            log::warn!(
                "multi-parameter sweep truncated from {} to {} combinations",
                combinations.len(),
                max_combinations
            );
            combinations = even_subsample(combinations, max_combinations);
        }

        let base = scenarios
            .get(base_scenario_name)
            .cloned()
            .unwrap_or_else(|| Scenario {
                name: base_scenario_name.to_string(),
                ..Default::default()
            });

        let mut runs = Vec::with_capacity(combinations.len());
        for (combo_index, combo) in combinations.iter().enumerate() {
            let mut scenario = base.clone();
            scenario.name = format!("{}__whatif_{combo_index}", base.name);
            for (param, &value) in params.iter().zip(combo) {
                scenario.entity_overrides.push(Override {
                    name: Some(param.entity_name.clone()),
                    action: Some(OverrideAction::Set {
                        field: param.field.clone(),
                        value: serde_json::Value::from(value),
                    }),
                    ..Default::default()
                });
            }
            let mut temp_registry = ScenarioRegistry::new();
            temp_registry.add(scenario.clone());
            let frame = engine.calculate(store, &temp_registry, start, end, &scenario.name)?;
            let kpis = kpi::compute_all(&frame, None);
            let final_balance = extract_metric(&frame, &kpis, Metric::FinalCashBalance);
            runs.push(MultiParameterRun {
                values: combo.clone(),
                final_cash_balance: final_balance,
            });
        }

        let best = runs
            .iter()
            .max_by(|a, b| a.final_cash_balance.partial_cmp(&b.final_cash_balance).unwrap())
            .cloned();
        let worst = runs
            .iter()
            .min_by(|a, b| a.final_cash_balance.partial_cmp(&b.final_cash_balance).unwrap())
            .cloned();

        Ok(MultiParameterResult { runs, best, worst, dropped })
    }

    /// Binary search for a parameter value driving `metric` to `target`
    /// within `tolerance`, bounded to `[0.1*base, 3*base]` unless overridden.
    #[allow(clippy::too_many_arguments)]
    pub fn breakeven(
        &self,
        engine: &CashFlowEngine,
        store: &EntityStore,
        scenarios: &ScenarioRegistry,
        base_scenario_name: &str,
        start: NaiveDate,
        end: NaiveDate,
        param: &Parameter,
        metric: Metric,
        target: f64,
        tolerance: f64,
        bounds: Option<(f64, f64)>,
    ) -> Result<BreakevenResult> {
        let (mut lo, mut hi) = bounds.unwrap_or((0.1 * param.base_value, 3.0 * param.base_value));
        let mut history = Vec::new();
        let mut converged = false;
        let mut best_value = param.base_value;

        for _ in 0..50 {
            let mid = (lo + hi) / 2.0;
            let (frame, kpis) =
                run_with_value(engine, store, scenarios, base_scenario_name, start, end, param, mid)?;
            let observed = extract_metric(&frame, &kpis, metric);
            history.push((mid, observed));
            best_value = mid;

            if (observed - target).abs() <= tolerance {
                converged = true;
                break;
            }
            if observed < target {
                lo = mid;
            } else {
                hi = mid;
            }
        }

        Ok(BreakevenResult {
            value: best_value,
            converged,
            history,
        })
    }

    pub fn compare_scenarios(
        &self,
        engine: &CashFlowEngine,
        store: &EntityStore,
        scenarios: &ScenarioRegistry,
        names: &[String],
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<ScenarioSummary>> {
        let mut out = Vec::with_capacity(names.len());
        for name in names {
            let frame = engine.calculate(store, scenarios, start, end, name)?;
            let kpis = kpi::compute_all(&frame, None);
            out.push(ScenarioSummary {
                scenario: name.clone(),
                final_cash_balance: frame.rows.last().map(|r| r.cash_balance).unwrap_or(0.0),
                total_revenue: frame.rows.iter().map(|r| r.total_revenue).sum(),
                total_expenses: frame.rows.iter().map(|r| r.total_expenses).sum(),
                runway_months: kpis.financial.runway_months,
            });
        }
        Ok(out)
    }
}

fn cartesian_product(value_sets: &[Vec<f64>]) -> Vec<Vec<f64>> {
    value_sets.iter().fold(vec![vec![]], |acc, values| {
        acc.into_iter()
            .flat_map(|prefix| {
                values.iter().map(move |&v| {
                    let mut next = prefix.clone();
                    next.push(v);
                    next
                })
            })
            .collect()
    })
}

fn even_subsample<T>(items: Vec<T>, cap: usize) -> Vec<T> {
    if items.len() <= cap || cap == 0 {
        return items;
    }
    let step = items.len() as f64 / cap as f64;
    (0..cap)
        .map(|i| ((i as f64) * step) as usize)
        .filter_map(|idx| items.get(idx).cloned())
        .collect()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MultiParameterRun {
    pub values: Vec<f64>,
    pub final_cash_balance: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MultiParameterResult {
    pub runs: Vec<MultiParameterRun>,
    pub best: Option<MultiParameterRun>,
    pub worst: Option<MultiParameterRun>,
    pub dropped: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BreakevenResult {
    pub value: f64,
    pub converged: bool,
    pub history: Vec<(f64, f64)>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScenarioSummary {
    pub scenario: String,
    pub final_cash_balance: f64,
    pub total_revenue: f64,
    pub total_expenses: f64,
    pub runway_months: f64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn cartesian_product_enumerates_all_combinations() {
        let combos = cartesian_product(&[vec![1.0, 2.0], vec![10.0, 20.0]]);
        assert_eq!(combos.len(), 4);
        assert!(combos.contains(&vec![1.0, 10.0]));
        assert!(combos.contains(&vec![2.0, 20.0]));
    }

    #[test]
    fn even_subsample_respects_cap() {
        let items: Vec<usize> = (0..100).collect();
        let sampled = even_subsample(items, 10);
        assert_eq!(sampled.len(), 10);
    }

    #[test]
    fn pearson_correlation_is_one_for_perfectly_linear_series() {
        let xs = [1.0, 2.0, 3.0, 4.0];
        let ys = [2.0, 4.0, 6.0, 8.0];
        assert_abs_diff_eq!(pearson_correlation(&xs, &ys), 1.0, epsilon = 1e-9);
    }
}
