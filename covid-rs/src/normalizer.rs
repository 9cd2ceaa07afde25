//! The observation normalizer turns raw reports from one or more sources into
//! a single per-location, per-day table aligned on "days since the selected
//! measure first reached the report threshold".
use crate::{
    data::{derive_incremental, normalize_location, Measure, RawReport},
    error::{EmptyResultWarning, Error, Result},
    prelude::{default_start_date, Day, Real, AGGREGATE_LOCATIONS},
};
use chrono::NaiveDate;
use getset::{CopyGetters, Getters};
use log::*;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// A normalized observation for one location and one day.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ObservationRow {
    pub location: String,
    pub date: NaiveDate,
    /// Calendar days from the configured start date (negative before it).
    pub days_since_start: Day,
    /// Position in the location's sequence of qualifying days, None for rows
    /// below the threshold.
    pub days_since_threshold: Option<u32>,
    pub values: BTreeMap<Measure, Real>,
}

impl ObservationRow {
    pub fn value(&self, measure: Measure) -> Option<Real> {
        self.values.get(&measure).copied()
    }

    pub fn is_aligned(&self) -> bool {
        self.days_since_threshold.is_some()
    }
}

/// Output of the normalizer.
///
/// Rows are sorted by location and then by date. The raw view contains every
/// row, the aligned view only rows with a days_since_threshold index.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Getters, CopyGetters)]
pub struct ObservationTable {
    #[getset(get_copy = "pub")]
    measure: Measure,
    #[getset(get_copy = "pub")]
    threshold: Real,
    #[getset(get = "pub")]
    measures: Vec<Measure>,
    #[getset(get = "pub")]
    rows: Vec<ObservationRow>,
    #[getset(get = "pub")]
    warnings: Vec<EmptyResultWarning>,
}

impl ObservationTable {
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Rows that belong to the days-since-threshold alignment.
    pub fn aligned(&self) -> impl Iterator<Item = &ObservationRow> + '_ {
        self.rows.iter().filter(|r| r.is_aligned())
    }

    /// Aligned (days_since_threshold, date, value) triples of a location.
    ///
    /// The location name is normalized before matching. Locations that never
    /// reach the threshold yield an empty series.
    pub fn series(&self, location: &str, measure: Measure) -> Vec<(u32, NaiveDate, Real)> {
        let location = normalize_location(location);
        self.aligned()
            .filter(|r| r.location == location)
            .filter_map(|r| Some((r.days_since_threshold?, r.date, r.value(measure)?)))
            .collect()
    }

    /// Sorted list of distinct locations in the raw view.
    pub fn locations(&self) -> Vec<String> {
        let set: BTreeSet<&str> = self.rows.iter().map(|r| r.location.as_str()).collect();
        set.into_iter().map(String::from).collect()
    }

    /// Keep only the given locations. Names are matched after normalization.
    pub fn filter_locations<S: AsRef<str>>(&self, locations: &[S]) -> Self {
        let wanted: BTreeSet<String> = locations
            .iter()
            .map(|l| normalize_location(l.as_ref()))
            .collect();
        self.retain(|location| wanted.contains(location))
    }

    /// Separate per-country rows from the synthetic aggregate location.
    ///
    /// Returns (countries, aggregate). Both the configured name and the
    /// names in AGGREGATE_LOCATIONS count as aggregate.
    pub fn split_aggregate(&self, aggregate: &str) -> (Self, Self) {
        let aggregate = normalize_location(aggregate);
        let is_aggregate =
            |location: &str| location == aggregate || AGGREGATE_LOCATIONS.contains(&location);
        (
            self.retain(|location| !is_aggregate(location)),
            self.retain(|location| is_aggregate(location)),
        )
    }

    fn retain(&self, pred: impl Fn(&str) -> bool) -> Self {
        ObservationTable {
            measure: self.measure,
            threshold: self.threshold,
            measures: self.measures.clone(),
            rows: self
                .rows
                .iter()
                .filter(|r| pred(&r.location))
                .cloned()
                .collect(),
            warnings: self
                .warnings
                .iter()
                .filter(|w| pred(&w.location))
                .cloned()
                .collect(),
        }
    }
}

/// Normalizes raw reports and aligns them on the report threshold of the
/// selected measure.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Getters, CopyGetters)]
pub struct Normalizer {
    #[getset(get_copy = "pub")]
    measure: Measure,
    #[getset(get_copy = "pub")]
    threshold: Real,
    #[getset(get = "pub")]
    measures: Vec<Measure>,
    #[getset(get_copy = "pub")]
    start_date: NaiveDate,
}

impl Normalizer {
    /// Align on `measure` reaching `threshold`. Only the selected measure is
    /// carried to the output unless more are requested with with_measures().
    pub fn new(measure: Measure, threshold: Real) -> Self {
        Normalizer {
            measure,
            threshold,
            measures: vec![measure],
            start_date: default_start_date(),
        }
    }

    /// Request additional measure columns in the output table.
    pub fn with_measures(mut self, measures: &[Measure]) -> Self {
        for m in measures {
            if !self.measures.contains(m) {
                self.measures.push(*m);
            }
        }
        return self;
    }

    /// Anchor date of the days_since_start column.
    pub fn with_start_date(mut self, date: NaiveDate) -> Self {
        self.start_date = date;
        return self;
    }

    pub fn validate(&self) -> Result<()> {
        if !self.threshold.is_finite() || self.threshold < 0.0 {
            return Err(Error::invalid(
                "report_threshold",
                format!("must be a finite non-negative number, got {}", self.threshold),
            ));
        }
        Ok(())
    }

    /// Build the observation table from raw reports.
    ///
    /// Fails if the threshold is invalid or if a source lacks one of the
    /// requested measures (and cannot derive it from a cumulative column).
    pub fn normalize(&self, sources: &[RawReport]) -> Result<ObservationTable> {
        self.validate()?;
        for source in sources {
            for m in &self.measures {
                if !source.provides(*m) {
                    return Err(Error::missing_column(m.as_str(), source.name().as_str()));
                }
            }
        }

        let prepared: Vec<RawReport> = sources
            .iter()
            .map(|s| derive_incremental(&s.with_normalized_locations()))
            .collect();
        self.warn_collisions(&prepared);

        let mut groups: BTreeMap<String, Vec<ObservationRow>> = BTreeMap::new();
        for report in &prepared {
            let columns = self
                .measures
                .iter()
                .map(|m| report.require(*m).map(|col| (*m, col)))
                .collect::<Result<Vec<_>>>()?;

            for row in report.rows() {
                let values = columns
                    .iter()
                    .map(|&(m, col)| (m, row.values.get(col).copied().unwrap_or(0.0)))
                    .collect();
                groups
                    .entry(row.location.clone())
                    .or_default()
                    .push(ObservationRow {
                        location: row.location.clone(),
                        date: row.date,
                        days_since_start: (row.date - self.start_date).num_days(),
                        days_since_threshold: None,
                        values,
                    });
            }
        }

        let groups: Vec<(String, Vec<ObservationRow>)> = groups.into_iter().collect();
        let aligned: Vec<(Vec<ObservationRow>, Option<EmptyResultWarning>)> = groups
            .into_par_iter()
            .map(|(location, rows)| self.align_location(location, rows))
            .collect();

        let mut rows = Vec::new();
        let mut warnings = Vec::new();
        for (group, warning) in aligned {
            rows.extend(group);
            if let Some(w) = warning {
                warn!(
                    "{} never reaches {} {}, no aligned series",
                    w.location, w.threshold, w.measure
                );
                warnings.push(w);
            }
        }
        debug!(
            "normalized {} sources into {} rows ({} locations without aligned series)",
            sources.len(),
            rows.len(),
            warnings.len()
        );

        Ok(ObservationTable {
            measure: self.measure,
            threshold: self.threshold,
            measures: self.measures.clone(),
            rows,
            warnings,
        })
    }

    /// Sort rows of a single location by date and number the days at or
    /// above the threshold starting from zero.
    fn align_location(
        &self,
        location: String,
        mut rows: Vec<ObservationRow>,
    ) -> (Vec<ObservationRow>, Option<EmptyResultWarning>) {
        rows.sort_by_key(|r| r.date);
        let mut count: u32 = 0;
        for row in rows.iter_mut() {
            let value = row.value(self.measure).unwrap_or(0.0);
            if value >= self.threshold {
                row.days_since_threshold = Some(count);
                count += 1;
            }
        }

        let warning = (count == 0).then(|| EmptyResultWarning {
            location,
            measure: self.measure,
            threshold: self.threshold,
        });
        (rows, warning)
    }

    fn warn_collisions(&self, reports: &[RawReport]) {
        let mut seen: BTreeMap<&str, &str> = BTreeMap::new();
        for report in reports {
            for location in report.locations() {
                match seen.get(location).copied() {
                    Some(first) => warn!(
                        "location {} appears in both {} and {}, rows are concatenated",
                        location,
                        first,
                        report.name()
                    ),
                    None => {
                        seen.insert(location, report.name().as_str());
                    }
                }
            }
        }
    }
}
