//! Entry point used by presentation layers.
//!
//! A dashboard loads its reports once into a Snapshot and calls recompute()
//! with the current configuration every time a widget changes. Nothing here
//! holds mutable state, so calls may happen at any rate and from any thread.
use crate::{
    config::DashboardConfig,
    data::RawReport,
    model::{project, Projection},
    normalizer::ObservationTable,
    prelude::Result,
};
use log::*;
use serde::{Deserialize, Serialize};
use std::{ops::Deref, sync::Arc};

/// Immutable collection of raw reports shared by all recomputations.
#[derive(Debug, Clone, Default)]
pub struct Snapshot {
    reports: Arc<Vec<RawReport>>,
}

impl Snapshot {
    pub fn new(reports: Vec<RawReport>) -> Self {
        for report in &reports {
            info!(
                "snapshot source {}: {} rows, {} locations",
                report.name(),
                report.len(),
                report.locations().len()
            );
        }
        Snapshot {
            reports: Arc::new(reports),
        }
    }

    pub fn reports(&self) -> &[RawReport] {
        &self.reports
    }
}

impl From<Vec<RawReport>> for Snapshot {
    fn from(reports: Vec<RawReport>) -> Self {
        Snapshot::new(reports)
    }
}

impl Deref for Snapshot {
    type Target = [RawReport];

    fn deref(&self) -> &[RawReport] {
        &self.reports
    }
}

/// Tables handed to the presentation layer after a configuration change.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Recomputation {
    /// Per-country observations, restricted to the selected locations.
    pub observations: ObservationTable,
    /// The aggregate location, if it is shown.
    pub aggregate: Option<ObservationTable>,
    /// Every location available for selection, aggregate excluded.
    pub available_locations: Vec<String>,
    pub projection: Projection,
}

/// Normalize observations and project the model curve for a configuration.
///
/// Fails fast if any option is invalid or if a report lacks a requested
/// measure.
pub fn recompute(snapshot: &Snapshot, config: &DashboardConfig) -> Result<Recomputation> {
    config.validate()?;
    let table = config.normalizer().normalize(snapshot.reports())?;
    let (countries, aggregate) = table.split_aggregate(&config.aggregate_location);

    let observations = if config.locations.is_empty() {
        countries.clone()
    } else {
        countries.filter_locations(&config.locations)
    };
    let projection = project(
        &config.model_params(),
        config.duration_days,
        config.start_date,
        config.population_bound,
    )?;

    debug!(
        "recomputed {} observations for {} locations, {} model days",
        observations.len(),
        observations.locations().len(),
        projection.len()
    );
    Ok(Recomputation {
        available_locations: countries.locations(),
        observations,
        aggregate: (config.show_aggregate && !aggregate.is_empty()).then(|| aggregate),
        projection,
    })
}
