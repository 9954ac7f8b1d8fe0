//! Cash-flow and cap-table modeling engine for capital-intensive businesses.
//!
//! This library provides:
//! - A typed, open-schema entity model (employees, revenue, expenses, projects, cap table)
//! - A process-wide calculator registry dispatching entity + month onto pure cost/revenue functions
//! - A parallel cash-flow engine producing a monthly grid, with a result cache
//! - A scenario system of declarative overrides and filters
//! - A KPI and alert layer over the resulting grid
//! - Monte-Carlo and what-if drivers built on top of the engine
//! - A cap-table calculator for ownership, dilution, and liquidation waterfalls

pub mod calculators;
pub mod captable;
pub mod engine;
pub mod entity;
pub mod error;
pub mod kpi;
pub mod montecarlo;
pub mod scenario;
pub mod store;
pub mod whatif;

pub use engine::{CashFlowEngine, EngineConfig, MonthlyFrame, MonthlyRow};
pub use entity::Entity;
pub use error::{CashflowError, Result};
pub use kpi::Kpis;
pub use montecarlo::MonteCarloDriver;
pub use scenario::{Scenario, ScenarioRegistry};
pub use store::EntityStore;
pub use whatif::WhatIfDriver;
