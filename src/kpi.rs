//! KPI & Alert Layer (C7): derived metrics, trend analysis, and deterministic
//! alert thresholds computed over a [`MonthlyFrame`].

use serde::{Deserialize, Serialize};

use crate::engine::MonthlyFrame;

fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        0.0
    } else {
        values.iter().sum::<f64>() / values.len() as f64
    }
}

fn stdev(values: &[f64]) -> f64 {
    if values.len() < 2 {
        return 0.0;
    }
    let m = mean(values);
    let variance = values.iter().map(|v| (v - m).powi(2)).sum::<f64>() / values.len() as f64;
    variance.sqrt()
}

fn safe_ratio(numerator: f64, denominator: f64) -> f64 {
    if denominator == 0.0 {
        if numerator == 0.0 {
            0.0
        } else {
            f64::INFINITY
        }
    } else {
        numerator / denominator
    }
}

/// Least-squares slope of `y` against its index `0..n`.
fn linear_trend(values: &[f64]) -> f64 {
    let n = values.len();
    if n < 2 {
        return 0.0;
    }
    let xs: Vec<f64> = (0..n).map(|i| i as f64).collect();
    let x_mean = mean(&xs);
    let y_mean = mean(values);
    let numerator: f64 = xs
        .iter()
        .zip(values)
        .map(|(x, y)| (x - x_mean) * (y - y_mean))
        .sum();
    let denominator: f64 = xs.iter().map(|x| (x - x_mean).powi(2)).sum();
    if denominator == 0.0 {
        0.0
    } else {
        numerator / denominator
    }
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct FinancialKpis {
    pub runway_months: f64,
    pub burn_rate: f64,
    pub current_burn_rate: f64,
    pub cash_efficiency: f64,
    /// First month where `cumulative_cash_flow >= 0`, 1-indexed against the
    /// frame's first row. `None` when the frame never breaks even and a
    /// linear extrapolation could not produce a finite estimate.
    pub months_to_breakeven: Option<f64>,
    pub cash_flow_volatility: f64,
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct GrowthKpis {
    pub compounded_growth_rate: f64,
    pub revenue_trend_slope: f64,
    pub revenue_diversification: f64,
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct OperationalKpis {
    pub mean_active_employees: f64,
    pub peak_active_employees: u32,
    pub mean_active_projects: f64,
    pub peak_active_projects: u32,
    pub rd_percentage: f64,
    pub facility_cost_percentage: f64,
    pub technology_cost_percentage: f64,
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct EfficiencyKpis {
    pub mean_revenue_per_employee: f64,
    pub mean_cost_per_employee: f64,
    pub employee_cost_efficiency: f64,
    pub operating_leverage: f64,
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct RiskKpis {
    pub cash_flow_risk: f64,
    pub revenue_concentration_risk: f64,
    pub cost_flexibility: f64,
    pub funding_dependency: f64,
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct Kpis {
    pub financial: FinancialKpis,
    pub growth: GrowthKpis,
    pub operational: OperationalKpis,
    pub efficiency: EfficiencyKpis,
    pub risk: RiskKpis,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AlertLevel {
    Info,
    Warning,
    Critical,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Alert {
    pub level: AlertLevel,
    pub metric: &'static str,
    pub message: String,
    pub recommendation: String,
}

pub fn compute_all(frame: &MonthlyFrame, starting_cash: Option<f64>) -> Kpis {
    Kpis {
        financial: financial_kpis(frame, starting_cash),
        growth: growth_kpis(frame),
        operational: operational_kpis(frame),
        efficiency: efficiency_kpis(frame),
        risk: risk_kpis(frame),
    }
}

fn financial_kpis(frame: &MonthlyFrame, starting_cash: Option<f64>) -> FinancialKpis {
    let rows = &frame.rows;
    if rows.is_empty() {
        return FinancialKpis::default();
    }

    let net_flows: Vec<f64> = rows.iter().map(|r| r.net_cash_flow).collect();

    let runway_months = runway(starting_cash.unwrap_or(0.0), rows);

    let negative_flows: Vec<f64> = net_flows.iter().copied().filter(|v| *v < 0.0).collect();
    let burn_rate = mean(&negative_flows).abs();
    let current_burn_rate = rows.last().map(|r| r.net_cash_flow.min(0.0).abs()).unwrap_or(0.0);

    let total_revenue: f64 = rows.iter().map(|r| r.total_revenue).sum();
    let total_consumed: f64 = net_flows.iter().filter(|v| **v < 0.0).map(|v| v.abs()).sum();
    let cash_efficiency = if total_consumed == 0.0 {
        f64::INFINITY
    } else {
        total_revenue / total_consumed
    };

    let months_to_breakeven = breakeven_month(rows);

    FinancialKpis {
        runway_months,
        burn_rate,
        current_burn_rate,
        cash_efficiency,
        months_to_breakeven,
        cash_flow_volatility: stdev(&net_flows),
    }
}

/// Months elapsed before the balance crosses zero, plus the fractional month
/// of the crossing itself: `elapsed_months + fraction`. When the frame never
/// crosses zero, falls back to `final_cash / average_monthly_burn`.
fn runway(starting_cash: f64, rows: &[crate::engine::MonthlyRow]) -> f64 {
    let mut prev_balance = starting_cash;
    for (index, row) in rows.iter().enumerate() {
        if row.cash_balance <= 0.0 {
            if row.net_cash_flow == 0.0 {
                return 0.0;
            }
            let fraction = (prev_balance / row.net_cash_flow.abs()).max(0.0);
            return index as f64 + fraction;
        }
        prev_balance = row.cash_balance;
    }
    let negative_flows: Vec<f64> = rows.iter().map(|r| r.net_cash_flow).filter(|v| *v < 0.0).collect();
    if negative_flows.is_empty() {
        return f64::INFINITY;
    }
    let avg_burn = mean(&negative_flows).abs();
    if avg_burn == 0.0 {
        return f64::INFINITY;
    }
    let final_cash = rows.last().map(|r| r.cash_balance).unwrap_or(starting_cash);
    final_cash / avg_burn
}

/// 1-indexed: the first row of the frame is month 1.
fn breakeven_month(rows: &[crate::engine::MonthlyRow]) -> Option<f64> {
    for (index, row) in rows.iter().enumerate() {
        if row.cumulative_cash_flow >= 0.0 {
            return Some((index + 1) as f64);
        }
    }
    let cumulative: Vec<f64> = rows.iter().map(|r| r.cumulative_cash_flow).collect();
    let slope = linear_trend(&cumulative);
    if slope <= 0.0 || cumulative.is_empty() {
        return None;
    }
    let last = *cumulative.last().unwrap();
    let months_needed = -last / slope;
    if months_needed.is_finite() {
        Some(rows.len() as f64 + months_needed)
    } else {
        None
    }
}

fn growth_kpis(frame: &MonthlyFrame) -> GrowthKpis {
    let revenue: Vec<f64> = frame.rows.iter().map(|r| r.total_revenue).collect();
    if revenue.is_empty() {
        return GrowthKpis::default();
    }

    let window = revenue.len().min(3).max(1);
    let leading = mean(&revenue[..window]);
    let trailing = mean(&revenue[revenue.len() - window..]);
    let compounded_growth_rate = if leading == 0.0 {
        0.0
    } else {
        (trailing / leading) - 1.0
    };

    let mut shares_sq_sum = 0.0;
    let total: f64 = revenue.iter().sum();
    if total > 0.0 {
        for category_total in [
            frame.rows.iter().map(|r| r.grant_revenue).sum::<f64>(),
            frame.rows.iter().map(|r| r.investment_revenue).sum::<f64>(),
            frame.rows.iter().map(|r| r.sales_revenue).sum::<f64>(),
            frame.rows.iter().map(|r| r.service_revenue).sum::<f64>(),
        ] {
            let share = category_total / total;
            shares_sq_sum += share * share;
        }
    }

    GrowthKpis {
        compounded_growth_rate,
        revenue_trend_slope: linear_trend(&revenue),
        revenue_diversification: 1.0 - shares_sq_sum,
    }
}

fn operational_kpis(frame: &MonthlyFrame) -> OperationalKpis {
    let rows = &frame.rows;
    let employees: Vec<f64> = rows.iter().map(|r| r.active_employees as f64).collect();
    let projects: Vec<f64> = rows.iter().map(|r| r.active_projects as f64).collect();
    let total_expenses: f64 = rows.iter().map(|r| r.total_expenses).sum();
    let project_costs: f64 = rows.iter().map(|r| r.project_costs).sum();
    let facility_costs: f64 = rows.iter().map(|r| r.facility_costs).sum();
    let software_costs: f64 = rows.iter().map(|r| r.software_costs).sum();

    OperationalKpis {
        mean_active_employees: mean(&employees),
        peak_active_employees: rows.iter().map(|r| r.active_employees).max().unwrap_or(0),
        mean_active_projects: mean(&projects),
        peak_active_projects: rows.iter().map(|r| r.active_projects).max().unwrap_or(0),
        rd_percentage: safe_ratio(project_costs, total_expenses) * 100.0,
        facility_cost_percentage: safe_ratio(facility_costs, total_expenses) * 100.0,
        technology_cost_percentage: safe_ratio(software_costs, total_expenses) * 100.0,
    }
}

fn efficiency_kpis(frame: &MonthlyFrame) -> EfficiencyKpis {
    let rows = &frame.rows;
    let revenue_per_employee: Vec<f64> = rows.iter().map(|r| r.revenue_per_employee).collect();
    let expense_per_employee: Vec<f64> = rows.iter().map(|r| r.expense_per_employee).collect();
    let revenue_growth: Vec<f64> = rows.iter().map(|r| r.revenue_growth_pct).collect();
    let expense_growth: Vec<f64> = rows.iter().map(|r| r.expense_growth_pct).collect();

    let mean_rev_growth = mean(&revenue_growth);
    let mean_exp_growth = mean(&expense_growth);

    EfficiencyKpis {
        mean_revenue_per_employee: mean(&revenue_per_employee),
        mean_cost_per_employee: mean(&expense_per_employee),
        employee_cost_efficiency: safe_ratio(mean(&revenue_per_employee), mean(&expense_per_employee)),
        operating_leverage: safe_ratio(mean_rev_growth, mean_exp_growth),
    }
}

fn risk_kpis(frame: &MonthlyFrame) -> RiskKpis {
    let rows = &frame.rows;
    let net_flows: Vec<f64> = rows.iter().map(|r| r.net_cash_flow).collect();
    let m = mean(&net_flows);
    let total_revenue: f64 = rows.iter().map(|r| r.total_revenue).sum();
    let total_expenses: f64 = rows.iter().map(|r| r.total_expenses).sum();

    let category_totals = [
        rows.iter().map(|r| r.grant_revenue).sum::<f64>(),
        rows.iter().map(|r| r.investment_revenue).sum::<f64>(),
        rows.iter().map(|r| r.sales_revenue).sum::<f64>(),
        rows.iter().map(|r| r.service_revenue).sum::<f64>(),
    ];
    let max_source = category_totals.iter().cloned().fold(0.0, f64::max);

    let fixed_costs: f64 = rows.iter().map(|r| r.facility_costs + r.software_costs).sum();
    let grants_and_investments: f64 = rows
        .iter()
        .map(|r| r.grant_revenue + r.investment_revenue)
        .sum();

    RiskKpis {
        cash_flow_risk: safe_ratio(stdev(&net_flows), m.abs()),
        revenue_concentration_risk: safe_ratio(max_source, total_revenue),
        cost_flexibility: 1.0 - safe_ratio(fixed_costs, total_expenses),
        funding_dependency: safe_ratio(grants_and_investments, total_revenue),
    }
}

pub fn alerts(kpis: &Kpis) -> Vec<Alert> {
    let mut alerts = Vec::new();

    if kpis.financial.runway_months < 3.0 {
        alerts.push(Alert {
            level: AlertLevel::Critical,
            metric: "runway_months",
            message: format!("runway is {:.1} months", kpis.financial.runway_months),
            recommendation: "raise capital or cut burn immediately".to_string(),
        });
    } else if kpis.financial.runway_months < 6.0 {
        alerts.push(Alert {
            level: AlertLevel::Warning,
            metric: "runway_months",
            message: format!("runway is {:.1} months", kpis.financial.runway_months),
            recommendation: "begin fundraising or cost reduction planning".to_string(),
        });
    }

    if kpis.financial.burn_rate > 100_000.0 {
        alerts.push(Alert {
            level: AlertLevel::Warning,
            metric: "burn_rate",
            message: format!("average burn rate is {:.0}", kpis.financial.burn_rate),
            recommendation: "review discretionary spend categories".to_string(),
        });
    }

    if kpis.risk.revenue_concentration_risk > 0.8 {
        alerts.push(Alert {
            level: AlertLevel::Warning,
            metric: "revenue_concentration_risk",
            message: "revenue is concentrated in a single source".to_string(),
            recommendation: "diversify revenue streams".to_string(),
        });
    }

    if kpis.risk.cash_flow_risk > 2.0 {
        alerts.push(Alert {
            level: AlertLevel::Info,
            metric: "cash_flow_risk",
            message: "month-to-month cash flow is highly volatile".to_string(),
            recommendation: "smooth payment schedules where possible".to_string(),
        });
    }

    alerts
}

/// Rolling trend of `total_revenue`/`net_cash_flow` over a trailing window,
/// used by dashboards that want a per-month moving view rather than a single
/// scalar.
pub fn trends(frame: &MonthlyFrame, window: usize) -> Vec<(f64, f64)> {
    let window = window.max(1);
    frame
        .rows
        .iter()
        .enumerate()
        .map(|(i, _)| {
            let lo = i.saturating_sub(window - 1);
            let slice_revenue: Vec<f64> = frame.rows[lo..=i].iter().map(|r| r.total_revenue).collect();
            let slice_flow: Vec<f64> = frame.rows[lo..=i].iter().map(|r| r.net_cash_flow).collect();
            (mean(&slice_revenue), mean(&slice_flow))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::MonthlyRow;
    use chrono::NaiveDate;

    fn date(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    fn frame_with_flows(flows: &[f64]) -> MonthlyFrame {
        let mut frame = MonthlyFrame::default();
        let mut cumulative = 0.0;
        for (i, &flow) in flows.iter().enumerate() {
            let mut row = MonthlyRow::new(date("2024-01-01") + chrono::Months::new(i as u32));
            if flow >= 0.0 {
                row.sales_revenue = flow;
            } else {
                row.employee_costs = -flow;
            }
            row.total_revenue = row.sales_revenue;
            row.total_expenses = row.employee_costs;
            row.net_cash_flow = flow;
            cumulative += flow;
            row.cumulative_cash_flow = cumulative;
            row.cash_balance = cumulative;
            frame.rows.push(row);
        }
        frame
    }

    #[test]
    fn months_to_breakeven_is_one_indexed() {
        let frame = frame_with_flows(&[-1000.0, -500.0, 2000.0]);
        let kpis = compute_all(&frame, Some(0.0));
        assert_eq!(kpis.financial.months_to_breakeven, Some(3.0));
    }

    #[test]
    fn runway_is_infinite_when_profitable() {
        let frame = frame_with_flows(&[1000.0, 1000.0]);
        let kpis = compute_all(&frame, Some(0.0));
        assert!(kpis.financial.runway_months.is_infinite());
    }

    #[test]
    fn runway_counts_elapsed_months_plus_crossing_fraction() {
        let frame = frame_with_flows(&[-13_000.0; 12]);
        let kpis = compute_all(&frame, Some(78_000.0));
        assert_eq!(kpis.financial.runway_months, 6.0);
    }

    #[test]
    fn runway_falls_back_to_average_burn_when_never_exhausted() {
        let frame = frame_with_flows(&[-1_000.0, -1_000.0]);
        let kpis = compute_all(&frame, Some(10_000.0));
        assert_eq!(kpis.financial.runway_months, 8.0);
    }

    #[test]
    fn critical_alert_fires_under_three_month_runway() {
        let frame = frame_with_flows(&[-5000.0]);
        let kpis = compute_all(&frame, Some(1000.0));
        let found = alerts(&kpis);
        assert!(found.iter().any(|a| a.level == AlertLevel::Critical));
    }
}
