//! Error types for the cash-flow and cap-table modeling engine.

use thiserror::Error;

/// The library's single error currency. Every fallible public API returns
/// `Result<T, CashflowError>`.
#[derive(Debug, Error)]
pub enum CashflowError {
    /// A required field was missing or failed validation at entity construction.
    #[error("invalid field `{field}` on entity `{entity}`: {reason}")]
    InvalidField {
        entity: String,
        field: String,
        reason: String,
    },

    /// A projection window had `end` before `start`.
    #[error("bad date range: start {start} is after end {end}")]
    BadRange { start: String, end: String },

    /// A named entity, scenario, or calculator could not be found.
    #[error("{kind} not found: {name}")]
    NotFound { kind: &'static str, name: String },

    /// Cap-table (or other) validation produced at least one error-severity issue.
    #[error("validation failed with {} error-level issue(s)", .report.len())]
    ValidationFailed {
        report: Vec<crate::captable::ValidationIssue>,
    },

    /// An invariant was violated mid-computation (e.g. a non positive-definite
    /// correlation matrix passed to Monte Carlo).
    #[error("bad state: {detail}")]
    BadState { detail: String },

    /// A cooperative cancellation token fired.
    #[error("computation cancelled")]
    Cancelled,

    /// Anything unexpected; never intentionally constructed outside adapters.
    #[error("internal error: {detail}")]
    Internal { detail: String },
}

impl From<chrono::ParseError> for CashflowError {
    fn from(err: chrono::ParseError) -> Self {
        CashflowError::InvalidField {
            entity: String::new(),
            field: "date".to_string(),
            reason: err.to_string(),
        }
    }
}

impl From<serde_yaml::Error> for CashflowError {
    fn from(err: serde_yaml::Error) -> Self {
        CashflowError::Internal {
            detail: format!("yaml: {err}"),
        }
    }
}

impl From<csv::Error> for CashflowError {
    fn from(err: csv::Error) -> Self {
        CashflowError::Internal {
            detail: format!("csv: {err}"),
        }
    }
}

impl From<serde_json::Error> for CashflowError {
    fn from(err: serde_json::Error) -> Self {
        CashflowError::InvalidField {
            entity: String::new(),
            field: "<document>".to_string(),
            reason: err.to_string(),
        }
    }
}

impl From<std::io::Error> for CashflowError {
    fn from(err: std::io::Error) -> Self {
        CashflowError::Internal {
            detail: format!("io: {err}"),
        }
    }
}

pub type Result<T> = std::result::Result<T, CashflowError>;
