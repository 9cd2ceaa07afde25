//! CSV ingestion of local snapshot files and CSV rendering of output tables.
//!
//! Fetching snapshots over the network is left to the caller; these readers
//! only parse what was already downloaded.
use crate::{
    config::{SourceConfig, SourceFormat},
    data::{Measure, RawReport, WideTable},
    model::Projection,
    normalizer::ObservationTable,
    prelude::{Error, Real, Result},
};
use chrono::NaiveDate;
use csv::StringRecord;
use log::*;
use std::{collections::BTreeMap, fs::File, io};

const DATE_FORMAT: &str = "%Y-%m-%d";

fn parse_date(value: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(value.trim(), DATE_FORMAT)
        .map_err(|_| Error::InvalidDate(value.to_string()))
}

/// Empty cells and "NaN" are missing values.
fn parse_cell(column: &str, value: &str) -> Result<Option<Real>> {
    let value = value.trim();
    if value.is_empty() || value.eq_ignore_ascii_case("nan") {
        return Ok(None);
    }
    value
        .parse::<Real>()
        .map(Some)
        .map_err(|_| Error::InvalidNumber {
            column: column.to_string(),
            value: value.to_string(),
        })
}

fn find_column(headers: &StringRecord, name: &str, report: &str) -> Result<usize> {
    headers
        .iter()
        .position(|h| h.trim() == name)
        .ok_or_else(|| Error::missing_column(name, report))
}

/// Read a long table with `location` and `date` columns. Every column named
/// after a measure is loaded, other columns are ignored.
pub fn read_long_csv<R: io::Read>(reader: R, name: &str) -> Result<RawReport> {
    let mut rdr = csv::Reader::from_reader(reader);
    let headers = rdr.headers()?.clone();
    let loc_col = find_column(&headers, "location", name)?;
    let date_col = find_column(&headers, "date", name)?;
    let columns: Vec<(usize, Measure)> = headers
        .iter()
        .enumerate()
        .filter_map(|(i, h)| Measure::from_name(h).map(|m| (i, m)))
        .collect();

    let mut report = RawReport::new(name, columns.iter().map(|c| c.1).collect())?;
    let mut values = Vec::with_capacity(columns.len());
    for record in rdr.records() {
        let record = record?;
        values.clear();
        for &(i, m) in &columns {
            values.push(parse_cell(m.as_str(), record.get(i).unwrap_or(""))?);
        }
        let date = parse_date(record.get(date_col).unwrap_or(""))?;
        report.push(record.get(loc_col).unwrap_or(""), date, &values)?;
    }
    debug!("read {} rows from long report {}", report.len(), name);
    Ok(report)
}

/// Read a wide table: a `date` column and one column per location, all
/// holding `measure`. `name` is the source the file belongs to.
pub fn read_wide_csv<R: io::Read>(reader: R, name: &str, measure: Measure) -> Result<WideTable> {
    let mut rdr = csv::Reader::from_reader(reader);
    let headers = rdr.headers()?.clone();
    let date_col = find_column(&headers, "date", name)?;
    let locations: Vec<(usize, String)> = headers
        .iter()
        .enumerate()
        .filter(|&(i, _)| i != date_col)
        .map(|(i, h)| (i, h.trim().to_string()))
        .collect();

    let mut table = WideTable::new(measure, locations.iter().map(|l| l.1.clone()).collect())?;
    for record in rdr.records() {
        let record = record?;
        let date = parse_date(record.get(date_col).unwrap_or(""))?;
        let cells = locations
            .iter()
            .map(|(i, loc)| parse_cell(loc, record.get(*i).unwrap_or("")))
            .collect::<Result<Vec<_>>>()?;
        table.push_date(date, cells)?;
    }
    Ok(table)
}

/// Load every configured source. Wide files sharing a name are merged into
/// one report; reports keep the order in which names first appear.
pub fn load_sources(sources: &[SourceConfig]) -> Result<Vec<RawReport>> {
    let mut order: Vec<&str> = vec![];
    let mut long: BTreeMap<&str, RawReport> = BTreeMap::new();
    let mut wide: BTreeMap<&str, Vec<WideTable>> = BTreeMap::new();

    for src in sources {
        let name = src.name.as_str();
        if !order.contains(&name) {
            order.push(name);
        }
        let file = File::open(&src.path)?;
        match (src.format, src.measure) {
            (SourceFormat::Long, _) => {
                if long.insert(name, read_long_csv(file, name)?).is_some() {
                    return Err(Error::invalid(
                        "sources",
                        format!("long source '{}' is listed twice", name),
                    ));
                }
            }
            (SourceFormat::Wide, Some(measure)) => {
                wide.entry(name).or_default().push(read_wide_csv(file, name, measure)?);
            }
            (SourceFormat::Wide, None) => {
                return Err(Error::invalid(
                    "sources",
                    format!("wide source '{}' needs a measure", name),
                ));
            }
        }
        info!("loaded {} from {}", name, src.path.display());
    }

    let mut reports = Vec::with_capacity(order.len());
    for name in order {
        match (long.remove(name), wide.remove(name)) {
            (Some(_), Some(_)) => {
                return Err(Error::invalid(
                    "sources",
                    format!("source '{}' mixes long and wide files", name),
                ))
            }
            (Some(report), None) => reports.push(report),
            (None, Some(tables)) => reports.push(RawReport::from_wide(name, &tables)?),
            (None, None) => {}
        }
    }
    Ok(reports)
}

/// Write observations as CSV: one row per (location, date) with the
/// alignment columns followed by one column per measure.
pub fn write_observations_csv<W: io::Write>(table: &ObservationTable, writer: W) -> Result<()> {
    let mut wtr = csv::Writer::from_writer(writer);
    let mut header = vec!["location", "date", "days_since_start", "days_since_threshold"];
    header.extend(table.measures().iter().map(|m| m.as_str()));
    wtr.write_record(&header)?;

    for row in table.rows() {
        let mut record = vec![
            row.location.clone(),
            row.date.format(DATE_FORMAT).to_string(),
            row.days_since_start.to_string(),
            row.days_since_threshold.map(|d| d.to_string()).unwrap_or_default(),
        ];
        record.extend(
            table
                .measures()
                .iter()
                .map(|m| row.value(*m).map(|v| v.to_string()).unwrap_or_default()),
        );
        wtr.write_record(&record)?;
    }
    wtr.flush()?;
    Ok(())
}

/// Write the model curve as CSV with day_offset, date and projected_value.
pub fn write_projection_csv<W: io::Write>(projection: &Projection, writer: W) -> Result<()> {
    let mut wtr = csv::Writer::from_writer(writer);
    for row in projection.rows() {
        wtr.serialize(row)?;
    }
    wtr.flush()?;
    Ok(())
}
