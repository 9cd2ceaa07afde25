use chrono::NaiveDate;

pub use crate::config::DashboardConfig;
pub use crate::dashboard::{recompute, Recomputation, Snapshot};
pub use crate::data::{derive_incremental, normalize_location, Measure, RawReport, RawRow, WideTable};
pub use crate::error::{EmptyResultWarning, Error, Result};
pub use crate::model::{growth_factor, project, ModelParams, Projection, ProjectionIter, ProjectionRow};
pub use crate::normalizer::{Normalizer, ObservationRow, ObservationTable};

/// Base Real type used by this crate. Uses an alias to easily change precision
/// if necessary.
pub type Real = f64;

/// Offsets are measured in whole days.
pub type Day = i64;

/// Total world population used as the hard ceiling of projected curves.
pub const WORLD_POPULATION: Real = 7_794_798_739.0;

/// Largest accepted infection probability.
pub const MAX_INFECTION_PROBABILITY: Real = 1.0;

/// Names used by the public datasets for the synthetic world-wide total.
pub const AGGREGATE_LOCATIONS: [&str; 2] = ["World", "Worldwide"];

/// First day of the public time series, used as the default anchor of the
/// model curve.
pub fn default_start_date() -> NaiveDate {
    NaiveDate::from_ymd_opt(2020, 1, 21).unwrap_or_default()
}
