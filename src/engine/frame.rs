//! Monthly frame: the engine's output grid, one row per first-of-month date.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// The fixed category a calculator's output is routed into, keyed by
/// `(entity_type, calculator_name)` per §4.3/§4.5 of the spec.
pub fn category_for(entity_type: &str, calculator_name: &str) -> Option<Category> {
    use Category::*;
    Some(match (entity_type, calculator_name) {
        ("employee", "total_cost_calc") => EmployeeCosts,
        ("facility", "recurring_calc") | ("facility", "certification_calc") => FacilityCosts,
        ("software", "recurring_calc") => SoftwareCosts,
        ("equipment", "depreciation_calc")
        | ("equipment", "maintenance_calc")
        | ("equipment", "support_calc")
        | ("equipment", "one_time_calc") => EquipmentCosts,
        ("project", "burn_calc") => ProjectCosts,
        ("grant", "disbursement_calc") => GrantRevenue,
        ("investment", "disbursement_calc") => InvestmentRevenue,
        ("sale", "revenue_calc") => SalesRevenue,
        ("service", "recurring_calc") => ServiceRevenue,
        _ => return None,
    })
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Category {
    GrantRevenue,
    InvestmentRevenue,
    SalesRevenue,
    ServiceRevenue,
    EmployeeCosts,
    FacilityCosts,
    SoftwareCosts,
    EquipmentCosts,
    ProjectCosts,
}

impl Category {
    pub fn is_revenue(self) -> bool {
        matches!(
            self,
            Category::GrantRevenue
                | Category::InvestmentRevenue
                | Category::SalesRevenue
                | Category::ServiceRevenue
        )
    }
}

/// Safe divide: denominator clamped to >= 1 when it would otherwise be zero,
/// matching the spec's "per-employee ratios ... safe divide" rule.
pub fn safe_divide(numerator: f64, denominator: f64) -> f64 {
    if denominator == 0.0 {
        numerator / 1.0
    } else {
        numerator / denominator
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MonthlyRow {
    pub period: Option<NaiveDate>,

    pub grant_revenue: f64,
    pub investment_revenue: f64,
    pub sales_revenue: f64,
    pub service_revenue: f64,

    pub employee_costs: f64,
    pub facility_costs: f64,
    pub software_costs: f64,
    pub equipment_costs: f64,
    pub project_costs: f64,

    pub active_employees: u32,
    pub active_projects: u32,

    pub total_revenue: f64,
    pub total_expenses: f64,
    pub net_cash_flow: f64,
    pub cumulative_cash_flow: f64,
    pub cash_balance: f64,

    pub revenue_growth_pct: f64,
    pub expense_growth_pct: f64,

    pub revenue_per_employee: f64,
    pub expense_per_employee: f64,
}

impl MonthlyRow {
    pub fn new(period: NaiveDate) -> Self {
        Self {
            period: Some(period),
            ..Default::default()
        }
    }

    pub fn add(&mut self, category: Category, value: f64) {
        match category {
            Category::GrantRevenue => self.grant_revenue += value,
            Category::InvestmentRevenue => self.investment_revenue += value,
            Category::SalesRevenue => self.sales_revenue += value,
            Category::ServiceRevenue => self.service_revenue += value,
            Category::EmployeeCosts => self.employee_costs += value,
            Category::FacilityCosts => self.facility_costs += value,
            Category::SoftwareCosts => self.software_costs += value,
            Category::EquipmentCosts => self.equipment_costs += value,
            Category::ProjectCosts => self.project_costs += value,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MonthlyFrame {
    pub rows: Vec<MonthlyRow>,
}

impl MonthlyFrame {
    /// Compute every derived column once the category totals and active
    /// counts are filled in. `starting_cash` seeds `cash_balance`.
    pub fn finalize(&mut self, starting_cash: f64) {
        self.rows.sort_by_key(|r| r.period);

        let mut cumulative = 0.0;
        let mut prev_revenue: Option<f64> = None;
        let mut prev_expenses: Option<f64> = None;

        for row in &mut self.rows {
            row.total_revenue =
                row.grant_revenue + row.investment_revenue + row.sales_revenue + row.service_revenue;
            row.total_expenses = row.employee_costs
                + row.facility_costs
                + row.software_costs
                + row.equipment_costs
                + row.project_costs;
            row.net_cash_flow = row.total_revenue - row.total_expenses;
            cumulative += row.net_cash_flow;
            row.cumulative_cash_flow = cumulative;
            row.cash_balance = cumulative + starting_cash;

            row.revenue_growth_pct = match prev_revenue {
                Some(prev) if prev != 0.0 => (row.total_revenue - prev) / prev * 100.0,
                _ => 0.0,
            };
            row.expense_growth_pct = match prev_expenses {
                Some(prev) if prev != 0.0 => (row.total_expenses - prev) / prev * 100.0,
                _ => 0.0,
            };
            prev_revenue = Some(row.total_revenue);
            prev_expenses = Some(row.total_expenses);

            row.revenue_per_employee = safe_divide(row.total_revenue, row.active_employees as f64);
            row.expense_per_employee = safe_divide(row.total_expenses, row.active_employees as f64);
        }
    }

    pub fn periods(&self) -> impl Iterator<Item = NaiveDate> + '_ {
        self.rows.iter().filter_map(|r| r.period)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    #[test]
    fn finalize_computes_cumulative_and_totals() {
        let mut frame = MonthlyFrame::default();
        let mut jan = MonthlyRow::new(date("2024-01-01"));
        jan.employee_costs = 13_000.0;
        let mut feb = MonthlyRow::new(date("2024-02-01"));
        feb.employee_costs = 13_000.0;
        frame.rows = vec![feb, jan];
        frame.finalize(0.0);

        assert_eq!(frame.rows[0].period, Some(date("2024-01-01")));
        assert_eq!(frame.rows[1].cumulative_cash_flow, -26_000.0);
        assert_eq!(frame.rows[1].total_expenses, 13_000.0);
    }
}
