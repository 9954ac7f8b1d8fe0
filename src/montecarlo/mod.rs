//! Monte-Carlo Driver (C8): ensemble execution over a perturbed entity set.

use std::collections::HashMap;

use chrono::NaiveDate;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use rand_distr::{Beta, Distribution, LogNormal, Normal, Triangular, Uniform};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::engine::{CashFlowEngine, EngineConfig};
use crate::entity::Entity;
use crate::error::{CashflowError, Result};
use crate::kpi;
use crate::scenario::ScenarioRegistry;
use crate::store::EntityStore;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind")]
pub enum DistributionSpec {
    Normal { mean: f64, std: f64 },
    Uniform { low: f64, high: f64 },
    Triangular { left: f64, mode: f64, right: f64 },
    Lognormal { mean: f64, sigma: f64 },
    Beta { a: f64, b: f64 },
}

impl DistributionSpec {
    fn sample(&self, rng: &mut ChaCha8Rng) -> f64 {
        match *self {
            DistributionSpec::Normal { mean, std } => {
                Normal::new(mean, std.max(1e-9)).unwrap().sample(rng)
            }
            DistributionSpec::Uniform { low, high } => {
                let (lo, hi) = if low <= high { (low, high) } else { (high, low) };
                Uniform::new_inclusive(lo, hi).sample(rng)
            }
            DistributionSpec::Triangular { left, mode, right } => {
                Triangular::new(left, right, mode).unwrap().sample(rng)
            }
            DistributionSpec::Lognormal { mean, sigma } => {
                LogNormal::new(mean, sigma.max(1e-9)).unwrap().sample(rng)
            }
            DistributionSpec::Beta { a, b } => Beta::new(a.max(1e-9), b.max(1e-9)).unwrap().sample(rng),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UncertaintyModel {
    pub entity_name_pattern: Option<String>,
    pub entity_type: Option<String>,
    pub field: String,
    pub distribution: DistributionSpec,
    pub correlation_group: Option<String>,
}

/// A positive-definite correlation matrix supplied for a named group of
/// uncertainties. Decision (documented limitation, matching the source
/// exactly): the Cholesky factor is validated and computed, but the
/// generated correlated normal draws are not currently mapped back through
/// each uncertainty's inverse CDF — independent samples are used instead.
#[derive(Debug, Clone)]
pub struct CorrelationMatrix {
    pub group: String,
    pub matrix: Vec<Vec<f64>>,
}

impl CorrelationMatrix {
    /// Cholesky decomposition of a symmetric positive-definite matrix.
    /// Returns `None` if the matrix is not positive-definite.
    pub fn cholesky(&self) -> Option<Vec<Vec<f64>>> {
        let n = self.matrix.len();
        if n == 0 || self.matrix.iter().any(|row| row.len() != n) {
            return None;
        }
        let mut l = vec![vec![0.0; n]; n];
        for i in 0..n {
            for j in 0..=i {
                let mut sum = self.matrix[i][j];
                for k in 0..j {
                    sum -= l[i][k] * l[j][k];
                }
                if i == j {
                    if sum <= 0.0 {
                        return None;
                    }
                    l[i][j] = sum.sqrt();
                } else {
                    l[i][j] = sum / l[j][j];
                }
            }
        }
        Some(l)
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct IterationResult {
    pub final_cash_balance: f64,
    pub total_revenue: f64,
    pub total_expenses: f64,
    pub net_cash_flow: f64,
    pub runway_months: f64,
    pub burn_rate: f64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MetricSummary {
    pub mean: f64,
    pub stdev: f64,
    pub min: f64,
    pub max: f64,
    pub percentiles: HashMap<String, f64>,
}

fn summarize(values: &mut [f64], percentiles: &[f64]) -> MetricSummary {
    if values.is_empty() {
        return MetricSummary::default();
    }
    values.sort_by(|a, b| a.partial_cmp(b).unwrap());
    let n = values.len();
    let mean = values.iter().sum::<f64>() / n as f64;
    let variance = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n as f64;
    let mut map = HashMap::new();
    for &p in percentiles {
        let idx = ((p / 100.0) * (n as f64 - 1.0)).round() as usize;
        map.insert(format!("p{}", p as i32), values[idx.min(n - 1)]);
    }
    MetricSummary {
        mean,
        stdev: variance.sqrt(),
        min: values[0],
        max: values[n - 1],
        percentiles: map,
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RiskSummary {
    pub probability_of_loss: f64,
    pub probability_runway_lt_6m: f64,
    pub probability_runway_lt_12m: f64,
    pub expected_loss_given_negative: f64,
    pub worst_case_5pct: f64,
    pub best_case_95pct: f64,
    pub volatility: f64,
    pub sharpe: f64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MonteCarloSummary {
    pub final_cash_balance: MetricSummary,
    pub total_revenue: MetricSummary,
    pub net_cash_flow: MetricSummary,
    pub risk: RiskSummary,
}

pub struct MonteCarloDriver {
    uncertainties: Vec<UncertaintyModel>,
    correlations: Vec<CorrelationMatrix>,
}

impl MonteCarloDriver {
    pub fn new() -> Self {
        Self {
            uncertainties: Vec::new(),
            correlations: Vec::new(),
        }
    }

    pub fn add_uncertainty(&mut self, model: UncertaintyModel) {
        self.uncertainties.push(model);
    }

    pub fn set_correlation(&mut self, correlation: CorrelationMatrix) {
        self.correlations.push(correlation);
    }

    /// Run `iterations` perturbed evaluations of `[start, end]` under
    /// `scenario_name`, partitioned across rayon's global pool; each
    /// iteration runs against an isolated scratch store.
    pub fn run(
        &self,
        base_entities: &[Entity],
        scenarios: &ScenarioRegistry,
        start: NaiveDate,
        end: NaiveDate,
        scenario_name: &str,
        iterations: usize,
        confidence_levels: &[f64],
        master_seed: u64,
    ) -> Result<MonteCarloSummary> {
        if iterations == 0 {
            return Err(CashflowError::BadState {
                detail: "iterations must be > 0".to_string(),
            });
        }

        let results: Vec<IterationResult> = (0..iterations)
            .into_par_iter()
            .map(|i| self.run_iteration(base_entities, scenarios, start, end, scenario_name, master_seed, i))
            .collect::<Result<Vec<_>>>()?;

        Ok(self.aggregate(results, confidence_levels))
    }

    fn run_iteration(
        &self,
        base_entities: &[Entity],
        scenarios: &ScenarioRegistry,
        start: NaiveDate,
        end: NaiveDate,
        scenario_name: &str,
        master_seed: u64,
        iteration: usize,
    ) -> Result<IterationResult> {
        let mut rng = ChaCha8Rng::seed_from_u64(master_seed.wrapping_add(iteration as u64));

        // Validate any declared correlation groups up front; per the §9
        // decision the resulting factor is computed but not applied to the
        // independent samples drawn below.
        for correlation in &self.correlations {
            let _ = correlation.cholesky();
        }

        let perturbed: Vec<Entity> = base_entities
            .iter()
            .map(|entity| self.perturb(entity, &mut rng))
            .collect();

        let scratch_store = EntityStore::new();
        for entity in perturbed {
            scratch_store.add(entity);
        }

        let engine = CashFlowEngine::new(EngineConfig {
            cache_capacity: 1,
            ..EngineConfig::default()
        });
        let frame = engine.calculate(&scratch_store, scenarios, start, end, scenario_name)?;
        let kpis = kpi::compute_all(&frame, Some(0.0));

        let last = frame.rows.last();
        Ok(IterationResult {
            final_cash_balance: last.map(|r| r.cash_balance).unwrap_or(0.0),
            total_revenue: frame.rows.iter().map(|r| r.total_revenue).sum(),
            total_expenses: frame.rows.iter().map(|r| r.total_expenses).sum(),
            net_cash_flow: frame.rows.iter().map(|r| r.net_cash_flow).sum(),
            runway_months: kpis.financial.runway_months,
            burn_rate: kpis.financial.burn_rate,
        })
    }

    fn perturb(&self, entity: &Entity, rng: &mut ChaCha8Rng) -> Entity {
        let mut value = match serde_json::to_value(entity) {
            Ok(v) => v,
            Err(_) => return entity.clone(),
        };
        let Some(fields) = value.as_object_mut() else {
            return entity.clone();
        };

        for model in &self.uncertainties {
            let type_matches = model
                .entity_type
                .as_deref()
                .map(|t| t == entity.type_tag())
                .unwrap_or(true);
            let name_matches = model
                .entity_name_pattern
                .as_ref()
                .map(|pat| {
                    regex::RegexBuilder::new(pat)
                        .case_insensitive(true)
                        .build()
                        .map(|re| re.is_match(entity.name()))
                        .unwrap_or(false)
                })
                .unwrap_or(true);
            if !type_matches || !name_matches {
                continue;
            }
            let sample = model.distribution.sample(rng);
            if let Some((leaf_obj, leaf_key)) = navigate_dot_path(fields, &model.field) {
                leaf_obj.insert(leaf_key, serde_json::Value::from(sample));
            }
        }

        serde_json::from_value(value).unwrap_or_else(|_| entity.clone())
    }

    fn aggregate(&self, results: Vec<IterationResult>, confidence_levels: &[f64]) -> MonteCarloSummary {
        let percentiles = if confidence_levels.is_empty() {
            vec![5.0, 25.0, 50.0, 75.0, 95.0]
        } else {
            confidence_levels.to_vec()
        };

        let mut final_balances: Vec<f64> = results.iter().map(|r| r.final_cash_balance).collect();
        let mut revenues: Vec<f64> = results.iter().map(|r| r.total_revenue).collect();
        let mut net_flows: Vec<f64> = results.iter().map(|r| r.net_cash_flow).collect();
        let runways: Vec<f64> = results.iter().map(|r| r.runway_months).collect();

        let n = results.len().max(1) as f64;
        let losses: Vec<f64> = final_balances.iter().copied().filter(|b| *b < 0.0).collect();
        let mean_balance = final_balances.iter().sum::<f64>() / n;
        let variance = final_balances.iter().map(|b| (b - mean_balance).powi(2)).sum::<f64>() / n;
        let volatility = variance.sqrt();

        let mut sorted_balances = final_balances.clone();
        sorted_balances.sort_by(|a, b| a.partial_cmp(b).unwrap());
        let p5_idx = ((0.05 * (sorted_balances.len() as f64 - 1.0)).round() as usize).min(sorted_balances.len() - 1);
        let p95_idx = ((0.95 * (sorted_balances.len() as f64 - 1.0)).round() as usize).min(sorted_balances.len() - 1);

        let risk = RiskSummary {
            probability_of_loss: losses.len() as f64 / n,
            probability_runway_lt_6m: runways.iter().filter(|r| **r < 6.0).count() as f64 / n,
            probability_runway_lt_12m: runways.iter().filter(|r| **r < 12.0).count() as f64 / n,
            expected_loss_given_negative: if losses.is_empty() {
                0.0
            } else {
                losses.iter().sum::<f64>() / losses.len() as f64
            },
            worst_case_5pct: sorted_balances[p5_idx],
            best_case_95pct: sorted_balances[p95_idx],
            volatility,
            sharpe: if volatility == 0.0 { 0.0 } else { mean_balance / volatility },
        };

        MonteCarloSummary {
            final_cash_balance: summarize(&mut final_balances, &percentiles),
            total_revenue: summarize(&mut revenues, &percentiles),
            net_cash_flow: summarize(&mut net_flows, &percentiles),
            risk,
        }
    }
}

impl Default for MonteCarloDriver {
    fn default() -> Self {
        Self::new()
    }
}

/// Resolve a dot-path (`"a.b.c"`) within a JSON object, returning the parent
/// object and the final key so the caller can insert a sampled value. Only
/// traverses through existing nested objects; missing intermediate objects
/// are created as needed.
fn navigate_dot_path<'a>(
    root: &'a mut serde_json::Map<String, serde_json::Value>,
    path: &str,
) -> Option<(&'a mut serde_json::Map<String, serde_json::Value>, String)> {
    let mut parts = path.split('.').map(|s| s.to_string()).collect::<Vec<_>>();
    if parts.is_empty() {
        return None;
    }
    let leaf = parts.pop().unwrap();
    let mut current = root;
    for part in parts {
        let entry = current
            .entry(part)
            .or_insert_with(|| serde_json::Value::Object(serde_json::Map::new()));
        if !entry.is_object() {
            *entry = serde_json::Value::Object(serde_json::Map::new());
        }
        current = entry.as_object_mut().unwrap();
    }
    Some((current, leaf))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cholesky_rejects_non_positive_definite_matrix() {
        let matrix = CorrelationMatrix {
            group: "g".to_string(),
            matrix: vec![vec![1.0, 2.0], vec![2.0, 1.0]],
        };
        assert!(matrix.cholesky().is_none());
    }

    #[test]
    fn cholesky_accepts_identity_matrix() {
        let matrix = CorrelationMatrix {
            group: "g".to_string(),
            matrix: vec![vec![1.0, 0.0], vec![0.0, 1.0]],
        };
        assert!(matrix.cholesky().is_some());
    }

    #[test]
    fn dot_path_creates_nested_object() {
        let mut root = serde_json::Map::new();
        let (obj, key) = navigate_dot_path(&mut root, "equity.shares").unwrap();
        obj.insert(key, serde_json::Value::from(42));
        assert_eq!(root["equity"]["shares"], 42);
    }
}
