//! Error types shared by the normalizer, the projection model and the CSV
//! loaders.
use crate::prelude::{Measure, Real};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Result type for covid-pane operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that abort a recomputation.
#[derive(Error, Debug)]
pub enum Error {
    /// A required location, date or measure column is absent from a report.
    #[error("column '{column}' is missing from report '{report}'")]
    MissingColumn { column: String, report: String },

    /// A parameter was rejected before any computation started.
    #[error("invalid parameter {name}: {reason}")]
    InvalidParameter { name: &'static str, reason: String },

    /// A date cell could not be parsed as YYYY-MM-DD.
    #[error("invalid date '{0}'")]
    InvalidDate(String),

    /// A measure cell could not be parsed as a number.
    #[error("invalid number '{value}' in column '{column}'")]
    InvalidNumber { column: String, value: String },

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("configuration error: {0}")]
    Config(#[from] toml::de::Error),
}

impl Error {
    pub(crate) fn missing_column(column: impl Into<String>, report: impl Into<String>) -> Self {
        Error::MissingColumn {
            column: column.into(),
            report: report.into(),
        }
    }

    pub(crate) fn invalid(name: &'static str, reason: impl Into<String>) -> Self {
        Error::InvalidParameter {
            name,
            reason: reason.into(),
        }
    }
}

/// A location that never reaches the report threshold.
///
/// This is not fatal: the location keeps its raw rows but contributes an
/// empty aligned series.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmptyResultWarning {
    pub location: String,
    pub measure: Measure,
    pub threshold: Real,
}
