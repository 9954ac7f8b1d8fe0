//! Built-in Calculators (C3): one pure function per `(entity_type, calculator_name)`.
//!
//! Each calculator returns the value contributed to the enclosing month; the
//! cash-flow engine routes the name into a fixed category bucket (see
//! `crate::engine::category_for`).

use crate::calculators::{CalculationContext, CalculatorMeta, CalculatorRegistry};
use crate::entity::Entity;

fn employee_total_cost(entity: &Entity, ctx: &CalculationContext) -> f64 {
    let Entity::Employee(e) = entity else { return 0.0 };
    e.total_cost(ctx.as_of_date)
}

fn facility_recurring(entity: &Entity, ctx: &CalculationContext) -> f64 {
    let Entity::Facility(f) = entity else { return 0.0 };
    f.recurring_cost(ctx.as_of_date)
}

fn facility_certification(entity: &Entity, ctx: &CalculationContext) -> f64 {
    let Entity::Facility(f) = entity else { return 0.0 };
    f.certification_costs(ctx.as_of_date)
}

fn software_recurring(entity: &Entity, ctx: &CalculationContext) -> f64 {
    let Entity::Software(s) = entity else { return 0.0 };
    s.monthly_cost(ctx.as_of_date)
}

fn service_recurring(entity: &Entity, ctx: &CalculationContext) -> f64 {
    let Entity::Service(s) = entity else { return 0.0 };
    s.monthly_revenue(ctx.as_of_date)
}

fn equipment_depreciation(entity: &Entity, ctx: &CalculationContext) -> f64 {
    let Entity::Equipment(e) = entity else { return 0.0 };
    if !e.base.is_active(ctx.as_of_date) {
        return 0.0;
    }
    e.monthly_depreciation(ctx.as_of_date)
}

fn equipment_maintenance(entity: &Entity, ctx: &CalculationContext) -> f64 {
    let Entity::Equipment(e) = entity else { return 0.0 };
    if !e.base.is_active(ctx.as_of_date) {
        return 0.0;
    }
    e.monthly_maintenance(ctx.as_of_date)
}

fn equipment_support(entity: &Entity, ctx: &CalculationContext) -> f64 {
    let Entity::Equipment(e) = entity else { return 0.0 };
    if !e.base.is_active(ctx.as_of_date) {
        return 0.0;
    }
    e.monthly_support(ctx.as_of_date)
}

fn equipment_one_time(entity: &Entity, ctx: &CalculationContext) -> f64 {
    let Entity::Equipment(e) = entity else { return 0.0 };
    if !e.base.is_active(ctx.as_of_date) {
        return 0.0;
    }
    e.one_time_cost(ctx.as_of_date)
}

fn grant_disbursement(entity: &Entity, ctx: &CalculationContext) -> f64 {
    let Entity::Grant(g) = entity else { return 0.0 };
    g.monthly_disbursement(ctx.as_of_date)
}

fn investment_disbursement(entity: &Entity, ctx: &CalculationContext) -> f64 {
    let Entity::Investment(i) = entity else { return 0.0 };
    i.monthly_disbursement(ctx.as_of_date)
}

fn sale_revenue(entity: &Entity, ctx: &CalculationContext) -> f64 {
    let Entity::Sale(s) = entity else { return 0.0 };
    s.monthly_revenue(ctx.as_of_date)
}

fn project_burn(entity: &Entity, ctx: &CalculationContext) -> f64 {
    let Entity::Project(p) = entity else { return 0.0 };
    p.burn_rate(ctx.as_of_date)
}

/// Register every built-in calculator. Called exactly once by
/// `crate::calculators::global_registry`.
pub fn register_builtin_calculators(registry: &mut CalculatorRegistry) {
    registry.register(
        "employee",
        "total_cost_calc",
        employee_total_cost,
        CalculatorMeta {
            description: "base + overhead + allowances + one-time + bonus potential",
            dependencies: &[],
        },
    );

    registry.register(
        "facility",
        "recurring_calc",
        facility_recurring,
        CalculatorMeta {
            description: "monthly base plus amortized annual/quarterly sub-components",
            dependencies: &[],
        },
    );
    registry.register(
        "facility",
        "certification_calc",
        facility_certification,
        CalculatorMeta {
            description: "certification/permit lump sums in their renewal month",
            dependencies: &[],
        },
    );

    registry.register(
        "software",
        "recurring_calc",
        software_recurring,
        CalculatorMeta {
            description: "annual, per-seat, or flat monthly licensing cost",
            dependencies: &[],
        },
    );

    registry.register(
        "service",
        "recurring_calc",
        service_recurring,
        CalculatorMeta {
            description: "monthly service contract revenue",
            dependencies: &[],
        },
    );

    registry.register(
        "equipment",
        "depreciation_calc",
        equipment_depreciation,
        CalculatorMeta {
            description: "straight-line depreciation bounded by residual value",
            dependencies: &[],
        },
    );
    registry.register(
        "equipment",
        "maintenance_calc",
        equipment_maintenance,
        CalculatorMeta {
            description: "annual maintenance contract amortized monthly",
            dependencies: &[],
        },
    );
    registry.register(
        "equipment",
        "support_calc",
        equipment_support,
        CalculatorMeta {
            description: "annual support contract amortized monthly",
            dependencies: &[],
        },
    );
    registry.register(
        "equipment",
        "one_time_calc",
        equipment_one_time,
        CalculatorMeta {
            description: "full purchase cost in the purchase month only",
            dependencies: &[],
        },
    );

    registry.register(
        "grant",
        "disbursement_calc",
        grant_disbursement,
        CalculatorMeta {
            description: "scheduled, even, or lump-sum grant disbursement",
            dependencies: &[],
        },
    );
    registry.register(
        "investment",
        "disbursement_calc",
        investment_disbursement,
        CalculatorMeta {
            description: "scheduled or lump-sum investment disbursement",
            dependencies: &[],
        },
    );
    registry.register(
        "sale",
        "revenue_calc",
        sale_revenue,
        CalculatorMeta {
            description: "scheduled or delivery-month sale revenue",
            dependencies: &[],
        },
    );
    registry.register(
        "project",
        "burn_calc",
        project_burn,
        CalculatorMeta {
            description: "monthly budget burn from categories or duration",
            dependencies: &[],
        },
    );
}
