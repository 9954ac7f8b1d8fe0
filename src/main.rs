//! Demo binary: builds a small in-memory entity set, runs the cash-flow
//! engine over a fixed window under a named scenario, and prints a monthly
//! summary plus a KPI snapshot. Takes no arguments; not a stable interface.

use chrono::NaiveDate;

use cashflow_engine::engine::{CashFlowEngine, EngineConfig};
use cashflow_engine::entity::{Employee, EntityBase, Facility, Grant, Sale};
use cashflow_engine::kpi;
use cashflow_engine::scenario::ScenarioRegistry;
use cashflow_engine::store::EntityStore;
use cashflow_engine::Entity;

fn date(s: &str) -> NaiveDate {
    NaiveDate::parse_from_str(s, "%Y-%m-%d").expect("valid demo date")
}

fn demo_entities() -> Vec<Entity> {
    vec![
        Entity::Employee(Employee {
            base: EntityBase::new("Alice Chen", date("2024-01-01")),
            salary: 145_000.0,
            overhead_multiplier: 1.3,
            benefits_annual: 18_000.0,
            home_office_stipend: 0.0,
            allowances_annual: 0.0,
            signing_bonus: 0.0,
            relocation_assistance: 0.0,
            bonus_performance_max: 15_000.0,
            bonus_milestone_max: 0.0,
            equity: None,
        }),
        Entity::Employee(Employee {
            base: EntityBase::new("Raj Patel", date("2024-03-01")),
            salary: 128_000.0,
            overhead_multiplier: 1.3,
            benefits_annual: 16_000.0,
            home_office_stipend: 1_200.0,
            allowances_annual: 0.0,
            signing_bonus: 5_000.0,
            relocation_assistance: 0.0,
            bonus_performance_max: 10_000.0,
            bonus_milestone_max: 0.0,
            equity: None,
        }),
        Entity::Facility(Facility {
            base: EntityBase::new("HQ Office", date("2024-01-01")),
            monthly_cost: 9_500.0,
            location: Some("Austin, TX".to_string()),
            utilities_monthly: 600.0,
            internet_monthly: 250.0,
            security_monthly: 0.0,
            cleaning_monthly: 0.0,
            insurance_annual: 4_800.0,
            property_tax_annual: 0.0,
            maintenance_monthly: 0.0,
            maintenance_quarterly: 0.0,
            maintenance_annual: 1_200.0,
            certifications: vec![],
        }),
        Entity::Grant(Grant {
            base: EntityBase::new("NSF SBIR Phase I", date("2024-01-01")),
            amount: 300_000.0,
            agency: Some("National Science Foundation".to_string()),
            indirect_cost_rate: 0.15,
            payment_schedule: vec![],
        }),
        Entity::Sale(Sale {
            base: EntityBase::new("Acme Corp Pilot", date("2024-04-01")),
            amount: 85_000.0,
            customer: Some("Acme Corp".to_string()),
            delivery_date: None,
            payment_schedule: vec![],
        }),
    ]
}

fn main() {
    env_logger::init();

    let store = EntityStore::new();
    for entity in demo_entities() {
        store.add(entity);
    }

    let scenarios = ScenarioRegistry::new();
    let engine = CashFlowEngine::new(EngineConfig::default());

    let start = date("2024-01-01");
    let end = date("2024-12-01");
    let scenario_name = "baseline";

    let frame = engine
        .calculate(&store, &scenarios, start, end, scenario_name)
        .expect("demo window is well-formed");

    println!("Monthly summary ({scenario_name}):");
    println!(
        "{:>10} {:>12} {:>12} {:>12} {:>14}",
        "Month", "Revenue", "Expenses", "Net", "Cash"
    );
    for row in &frame.rows {
        println!(
            "{:>10} {:>12.2} {:>12.2} {:>12.2} {:>14.2}",
            row.period.unwrap().format("%Y-%m"),
            row.total_revenue,
            row.total_expenses,
            row.net_cash_flow,
            row.cash_balance,
        );
    }

    let kpis = kpi::compute_all(&frame, Some(250_000.0));
    println!("\nKPI snapshot:");
    println!("  runway_months:        {:.1}", kpis.financial.runway_months);
    println!("  burn_rate:            {:.2}", kpis.financial.burn_rate);
    println!(
        "  months_to_breakeven:  {}",
        kpis.financial
            .months_to_breakeven
            .map(|m| m.to_string())
            .unwrap_or_else(|| "never".to_string())
    );
    println!("  cash_efficiency:      {:.3}", kpis.financial.cash_efficiency);

    for alert in kpi::alerts(&kpis) {
        println!("  [{:?}] {}: {}", alert.level, alert.metric, alert.message);
    }
}
