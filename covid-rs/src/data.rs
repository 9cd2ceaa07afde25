//! Raw report tables as they come out of the public snapshots, before any
//! alignment is done.
//!
//! Reports are long tables with one row per (location, date) and one value
//! per measure column. Wide tables (one column per location, one measure per
//! file) are melted into that layout before use.
use crate::prelude::{Error, Real, Result};
use chrono::NaiveDate;
use getset::{CopyGetters, Getters};
use serde::{Deserialize, Serialize};
use std::{
    collections::{BTreeMap, BTreeSet},
    convert::TryFrom,
    fmt,
    str::FromStr,
};

/// Quote characters that break string matching in location filters.
const AMBIGUOUS_QUOTES: [char; 3] = ['\'', '\u{2018}', '\u{2019}'];

/// Replace ambiguous quotes in a location name with a backtick.
///
/// Every lookup by location name must go through this function so that
/// "Côte d'Ivoire" given by a user matches "Côte d`Ivoire" stored in tables.
pub fn normalize_location(name: &str) -> String {
    name.trim()
        .chars()
        .map(|c| if AMBIGUOUS_QUOTES.contains(&c) { '`' } else { c })
        .collect()
}

/// Case and death measures reported by the public datasets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Measure {
    TotalCases,
    TotalDeaths,
    NewCases,
    NewDeaths,
}

impl Measure {
    pub const ALL: [Measure; 4] = [
        Measure::TotalCases,
        Measure::TotalDeaths,
        Measure::NewCases,
        Measure::NewDeaths,
    ];

    /// Column name used in CSV files.
    pub fn as_str(&self) -> &'static str {
        match self {
            Measure::TotalCases => "total_cases",
            Measure::TotalDeaths => "total_deaths",
            Measure::NewCases => "new_cases",
            Measure::NewDeaths => "new_deaths",
        }
    }

    /// Recognize a column name. Returns None for unrelated columns.
    pub fn from_name(name: &str) -> Option<Measure> {
        let name = name.trim();
        Measure::ALL.iter().copied().find(|m| m.as_str() == name)
    }

    /// Cumulative measure an incremental measure can be derived from.
    pub fn cumulative_source(&self) -> Option<Measure> {
        match self {
            Measure::NewCases => Some(Measure::TotalCases),
            Measure::NewDeaths => Some(Measure::TotalDeaths),
            _ => None,
        }
    }

    pub fn is_incremental(&self) -> bool {
        self.cumulative_source().is_some()
    }
}

impl fmt::Display for Measure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Measure {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Measure::from_name(s).ok_or_else(|| {
            Error::invalid(
                "selected_measure",
                format!("unknown measure '{}', expected one of total_cases, total_deaths, new_cases, new_deaths", s),
            )
        })
    }
}

/// A single (location, date) row. Values are aligned with the measures of
/// the report that owns the row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawRow {
    pub location: String,
    pub date: NaiveDate,
    pub values: Vec<Real>,
}

/// A long table of case/death reports coming from one data source.
///
/// Reports are immutable once built: the normalizer only reads them and
/// produces new tables.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Getters)]
#[serde(try_from = "RawReportData")]
#[getset(get = "pub")]
pub struct RawReport {
    name: String,
    measures: Vec<Measure>,
    rows: Vec<RawRow>,
}

/// Unchecked serde form of RawReport.
#[derive(Deserialize)]
struct RawReportData {
    name: String,
    measures: Vec<Measure>,
    rows: Vec<RawRow>,
}

impl TryFrom<RawReportData> for RawReport {
    type Error = Error;

    fn try_from(data: RawReportData) -> Result<Self> {
        let mut report = RawReport::new(data.name, data.measures)?;
        for row in data.rows.iter() {
            report.check_arity(row.date, row.values.len())?;
        }
        report.rows = data.rows;
        Ok(report)
    }
}

impl RawReport {
    /// Create an empty report with the given measure columns.
    pub fn new(name: impl Into<String>, measures: Vec<Measure>) -> Result<Self> {
        let name = name.into();
        let unique: BTreeSet<_> = measures.iter().collect();
        if unique.len() != measures.len() {
            return Err(Error::invalid(
                "measures",
                format!("report '{}' declares a measure column twice", name),
            ));
        }
        Ok(RawReport {
            name,
            measures,
            rows: vec![],
        })
    }

    fn check_arity(&self, date: NaiveDate, n: usize) -> Result<()> {
        if n != self.measures.len() {
            return Err(Error::invalid(
                "values",
                format!(
                    "report '{}' expects {} values per row, got {} on {}",
                    self.name,
                    self.measures.len(),
                    n,
                    date
                ),
            ));
        }
        Ok(())
    }

    /// Append a row. Missing values are stored as zeros.
    pub fn push(&mut self, location: &str, date: NaiveDate, values: &[Option<Real>]) -> Result<()> {
        self.check_arity(date, values.len())?;
        self.rows.push(RawRow {
            location: location.to_string(),
            date,
            values: values.iter().map(|v| v.unwrap_or(0.0)).collect(),
        });
        Ok(())
    }

    /// Merge wide tables of the same source into a single long report.
    ///
    /// Each table contributes one measure column. Cells missing from a table
    /// (location or date not present there) are zero.
    pub fn from_wide(name: impl Into<String>, tables: &[WideTable]) -> Result<Self> {
        let measures: Vec<Measure> = tables.iter().map(|t| t.measure).collect();
        let mut report = RawReport::new(name, measures)?;
        let ncols = tables.len();
        let mut merged: BTreeMap<(String, NaiveDate), Vec<Real>> = BTreeMap::new();

        for (j, table) in tables.iter().enumerate() {
            for (location, date, value) in table.melt() {
                merged
                    .entry((location.to_string(), date))
                    .or_insert_with(|| vec![0.0; ncols])[j] = value;
            }
        }

        report.rows = merged
            .into_iter()
            .map(|((location, date), values)| RawRow {
                location,
                date,
                values,
            })
            .collect();
        Ok(report)
    }

    /// Position of the measure column, if present.
    pub fn column(&self, measure: Measure) -> Option<usize> {
        self.measures.iter().position(|m| *m == measure)
    }

    pub fn has_measure(&self, measure: Measure) -> bool {
        self.column(measure).is_some()
    }

    /// True if the measure is present or can be derived from a cumulative
    /// column of this report.
    pub fn provides(&self, measure: Measure) -> bool {
        self.has_measure(measure)
            || measure
                .cumulative_source()
                .map_or(false, |source| self.has_measure(source))
    }

    /// Position of the measure column or a MissingColumn error.
    pub fn require(&self, measure: Measure) -> Result<usize> {
        self.column(measure)
            .ok_or_else(|| Error::missing_column(measure.as_str(), self.name.as_str()))
    }

    /// Set of locations present in this report.
    pub fn locations(&self) -> BTreeSet<&str> {
        self.rows.iter().map(|r| r.location.as_str()).collect()
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Return a copy with every location name passed through
    /// normalize_location().
    pub fn with_normalized_locations(&self) -> Self {
        RawReport {
            name: self.name.clone(),
            measures: self.measures.clone(),
            rows: self
                .rows
                .iter()
                .map(|r| RawRow {
                    location: normalize_location(&r.location),
                    date: r.date,
                    values: r.values.clone(),
                })
                .collect(),
        }
    }
}

/// Add incremental measures that a report lacks but can derive from its
/// cumulative columns.
///
/// Rows are visited sorted by date inside each location; the first day of a
/// location has an increment of zero. Decreasing cumulative series produce
/// negative increments, which are kept.
pub fn derive_incremental(report: &RawReport) -> RawReport {
    let derived: Vec<(Measure, usize)> = [Measure::NewCases, Measure::NewDeaths]
        .iter()
        .filter(|m| !report.has_measure(**m))
        .filter_map(|m| {
            m.cumulative_source()
                .and_then(|source| report.column(source))
                .map(|col| (*m, col))
        })
        .collect();

    let mut out = report.clone();
    if derived.is_empty() {
        return out;
    }

    let mut order: Vec<usize> = (0..report.rows.len()).collect();
    order.sort_by(|&i, &j| {
        let (a, b) = (&report.rows[i], &report.rows[j]);
        (a.location.as_str(), a.date).cmp(&(b.location.as_str(), b.date))
    });

    for (measure, col) in derived {
        let mut increments = vec![0.0; report.rows.len()];
        let mut prev: Option<(&str, Real)> = None;
        for &i in &order {
            let row = &report.rows[i];
            let value = row.values.get(col).copied().unwrap_or(0.0);
            increments[i] = match prev {
                Some((location, last)) if location == row.location => value - last,
                _ => 0.0,
            };
            prev = Some((row.location.as_str(), value));
        }
        for (row, inc) in out.rows.iter_mut().zip(increments) {
            row.values.push(inc);
        }
        out.measures.push(measure);
    }
    return out;
}

/// A wide table with a date column and one column per location, all holding
/// the same measure.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Getters, CopyGetters)]
#[serde(try_from = "WideTableData")]
pub struct WideTable {
    #[getset(get_copy = "pub")]
    measure: Measure,
    #[getset(get = "pub")]
    locations: Vec<String>,
    #[getset(get = "pub")]
    dates: Vec<NaiveDate>,
    cells: Vec<Vec<Option<Real>>>,
}

/// Unchecked serde form of WideTable.
#[derive(Deserialize)]
struct WideTableData {
    measure: Measure,
    locations: Vec<String>,
    dates: Vec<NaiveDate>,
    cells: Vec<Vec<Option<Real>>>,
}

impl TryFrom<WideTableData> for WideTable {
    type Error = Error;

    fn try_from(data: WideTableData) -> Result<Self> {
        if data.dates.len() != data.cells.len() {
            return Err(Error::invalid(
                "cells",
                format!(
                    "wide table for {} has {} dates and {} rows",
                    data.measure,
                    data.dates.len(),
                    data.cells.len()
                ),
            ));
        }
        let mut table = WideTable::new(data.measure, data.locations)?;
        for (date, cells) in data.dates.into_iter().zip(data.cells) {
            table.push_date(date, cells)?;
        }
        Ok(table)
    }
}

impl WideTable {
    /// Create an empty table. Location headers must be distinct.
    pub fn new(measure: Measure, locations: Vec<String>) -> Result<Self> {
        let mut seen = BTreeSet::new();
        for location in &locations {
            if !seen.insert(location.as_str()) {
                return Err(Error::invalid(
                    "locations",
                    format!("wide table for {} repeats location '{}'", measure, location),
                ));
            }
        }
        Ok(WideTable {
            measure,
            locations,
            dates: vec![],
            cells: vec![],
        })
    }

    /// Append the row for a date. There must be one cell per location.
    pub fn push_date(&mut self, date: NaiveDate, cells: Vec<Option<Real>>) -> Result<()> {
        if cells.len() != self.locations.len() {
            return Err(Error::invalid(
                "cells",
                format!(
                    "wide table for {} has {} locations, row for {} has {} cells",
                    self.measure,
                    self.locations.len(),
                    date,
                    cells.len()
                ),
            ));
        }
        self.dates.push(date);
        self.cells.push(cells);
        Ok(())
    }

    /// Iterate over (location, date, value) triples, treating empty cells as
    /// zero.
    pub fn melt(&self) -> impl Iterator<Item = (&str, NaiveDate, Real)> + '_ {
        self.dates
            .iter()
            .zip(self.cells.iter())
            .flat_map(move |(date, row)| {
                self.locations
                    .iter()
                    .zip(row.iter())
                    .map(move |(loc, v)| (loc.as_str(), *date, v.unwrap_or(0.0)))
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2020, 3, d).unwrap()
    }

    fn cumulative(values: &[(&str, u32, Real)]) -> RawReport {
        let mut report = RawReport::new("owid", vec![Measure::TotalCases]).unwrap();
        for (loc, d, v) in values {
            report.push(loc, day(*d), &[Some(*v)]).unwrap();
        }
        report
    }

    fn column(report: &RawReport, measure: Measure, location: &str) -> Vec<Real> {
        let col = report.column(measure).unwrap();
        let mut rows: Vec<_> = report.rows().iter().filter(|r| r.location == location).collect();
        rows.sort_by_key(|r| r.date);
        rows.iter().map(|r| r.values[col]).collect()
    }

    #[test]
    fn quotes_are_replaced_by_backticks() {
        assert_eq!(normalize_location("Côte d'Ivoire"), "Côte d`Ivoire");
        assert_eq!(normalize_location("Côte d\u{2019}Ivoire"), "Côte d`Ivoire");
        assert_eq!(normalize_location("Italy"), "Italy");
    }

    #[test]
    fn measure_names() {
        assert_eq!(Measure::from_name("new_deaths"), Some(Measure::NewDeaths));
        assert_eq!(Measure::from_name("population"), None);
        assert!("total_cases".parse::<Measure>().is_ok());
        assert!("cases".parse::<Measure>().is_err());
        assert_eq!(Measure::NewCases.cumulative_source(), Some(Measure::TotalCases));
        assert_eq!(Measure::TotalDeaths.cumulative_source(), None);
    }

    #[test]
    fn push_rejects_wrong_arity() {
        let mut report = RawReport::new("owid", vec![Measure::TotalCases]).unwrap();
        assert!(report.push("Italy", day(1), &[Some(1.0), None]).is_err());
        report.push("Italy", day(1), &[None]).unwrap();
        assert_eq!(report.rows()[0].values, vec![0.0]);
    }

    #[test]
    fn duplicated_measure_columns_are_rejected() {
        assert!(RawReport::new("owid", vec![Measure::TotalCases, Measure::TotalCases]).is_err());
    }

    #[test]
    fn increments_from_cumulative_series() {
        let report = cumulative(&[("Italy", 1, 5.0), ("Italy", 2, 5.0), ("Italy", 3, 7.0)]);
        let derived = derive_incremental(&report);
        assert_eq!(derived.measures(), &vec![Measure::TotalCases, Measure::NewCases]);
        assert_eq!(column(&derived, Measure::NewCases, "Italy"), vec![0.0, 0.0, 2.0]);
    }

    #[test]
    fn increments_sort_by_date_inside_each_location() {
        let report = cumulative(&[
            ("Italy", 3, 7.0),
            ("Spain", 2, 4.0),
            ("Italy", 1, 5.0),
            ("Spain", 1, 1.0),
            ("Italy", 2, 6.0),
        ]);
        let derived = derive_incremental(&report);
        assert_eq!(column(&derived, Measure::NewCases, "Italy"), vec![0.0, 1.0, 1.0]);
        assert_eq!(column(&derived, Measure::NewCases, "Spain"), vec![0.0, 3.0]);

        // Row order of the input is preserved.
        assert_eq!(derived.rows()[0].location, "Italy");
        assert_eq!(derived.rows()[0].values, vec![7.0, 1.0]);
    }

    #[test]
    fn revisions_produce_negative_increments() {
        let report = cumulative(&[("Italy", 1, 10.0), ("Italy", 2, 8.0)]);
        let derived = derive_incremental(&report);
        assert_eq!(column(&derived, Measure::NewCases, "Italy"), vec![0.0, -2.0]);
    }

    #[test]
    fn existing_increments_are_kept() {
        let mut report = RawReport::new("owid", vec![Measure::TotalCases, Measure::NewCases]).unwrap();
        report.push("Italy", day(1), &[Some(5.0), Some(3.0)]).unwrap();
        let derived = derive_incremental(&report);
        assert_eq!(derived, report);
        assert!(!report.provides(Measure::NewDeaths));
        assert!(report.provides(Measure::NewCases));
    }

    #[test]
    fn wide_tables_merge_by_location_and_date() {
        let locations = vec!["Italy".to_string(), "Spain".to_string()];
        let mut cases = WideTable::new(Measure::TotalCases, locations.clone()).unwrap();
        cases.push_date(day(1), vec![Some(1.0), None]).unwrap();
        cases.push_date(day(2), vec![Some(3.0), Some(2.0)]).unwrap();
        let mut deaths = WideTable::new(Measure::TotalDeaths, vec!["Italy".to_string()]).unwrap();
        deaths.push_date(day(2), vec![Some(1.0)]).unwrap();
        assert!(deaths.push_date(day(3), vec![]).is_err());

        let report = RawReport::from_wide("ecdc", &[cases, deaths]).unwrap();
        assert_eq!(report.measures(), &vec![Measure::TotalCases, Measure::TotalDeaths]);
        assert_eq!(report.len(), 4);
        assert_eq!(column(&report, Measure::TotalCases, "Spain"), vec![0.0, 2.0]);
        assert_eq!(column(&report, Measure::TotalDeaths, "Italy"), vec![0.0, 1.0]);
        assert!(matches!(
            report.require(Measure::NewCases),
            Err(Error::MissingColumn { .. })
        ));
    }

    #[test]
    fn deserialized_reports_are_checked() {
        let ragged: std::result::Result<RawReport, _> = toml::from_str(
            r#"
            name = "owid"
            measures = ["total_cases"]

            [[rows]]
            location = "Italy"
            date = "2020-03-01"
            values = []
            "#,
        );
        assert!(ragged.is_err());

        let twice: std::result::Result<RawReport, _> = toml::from_str(
            r#"
            name = "owid"
            measures = ["total_cases", "total_cases"]
            rows = []
            "#,
        );
        assert!(twice.is_err());

        let report: RawReport = toml::from_str(
            r#"
            name = "owid"
            measures = ["total_cases"]

            [[rows]]
            location = "Italy"
            date = "2020-03-01"
            values = [4.0]
            "#,
        )
        .unwrap();
        assert_eq!(column(&report, Measure::TotalCases, "Italy"), vec![4.0]);
    }

    #[test]
    fn repeated_wide_locations_are_rejected() {
        let locations = vec!["Italy".to_string(), "Spain".to_string(), "Italy".to_string()];
        assert!(matches!(
            WideTable::new(Measure::TotalCases, locations),
            Err(Error::InvalidParameter { name: "locations", .. })
        ));

        let ragged: std::result::Result<WideTable, _> = toml::from_str(
            r#"
            measure = "total_cases"
            locations = ["Italy"]
            dates = ["2020-03-01"]
            cells = [[1.0, 2.0]]
            "#,
        );
        assert!(ragged.is_err());
    }
}
