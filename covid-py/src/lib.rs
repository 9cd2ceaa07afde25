use pyo3::{prelude::*, wrap_pyfunction};

extern crate pyo3;
use covid_pane::prelude as rs;
use covid_pane::{io, prelude::Real};
use paste::paste;
use pyo3::exceptions::*;
use pyo3::types::PyDict;
use pythonize::{depythonize, pythonize};
use std::fs::File;

/// Map core errors to Python exceptions.
fn py_err(err: rs::Error) -> PyErr {
    match err {
        rs::Error::MissingColumn { .. } => PyKeyError::new_err(err.to_string()),
        rs::Error::Io(_) => PyIOError::new_err(err.to_string()),
        _ => PyValueError::new_err(err.to_string()),
    }
}

macro_rules! py_config_props {
    ($name:ident { $($x:ident : $t:ty),* }) => {
        paste! {
            #[pymethods]
            impl $name {
                $(
                    #[getter]
                    pub fn [<get_ $x>](&self) -> PyResult<$t> {
                        Ok(self.config.$x.clone())
                    }

                    #[setter]
                    pub fn [<set_ $x>](&mut self, value: $t) -> PyResult<()> {
                        self.config.$x = value;
                        Ok(())
                    }
                )*
            }
        }
    };
}

/// Holds the immutable report snapshot and the current widget values.
///
/// Widgets update the properties, the plotting layer calls recompute().
#[pyclass]
#[derive(Debug)]
pub struct Dashboard {
    snapshot: rs::Snapshot,
    config: rs::DashboardConfig,
}

impl Dashboard {
    fn push_report(&mut self, report: rs::RawReport) {
        let mut reports = self.snapshot.reports().to_vec();
        reports.push(report);
        self.snapshot = rs::Snapshot::new(reports);
    }
}

#[pymethods]
impl Dashboard {
    #[new]
    #[args(config = "None")]
    fn new(config: Option<&PyDict>) -> PyResult<Self> {
        let config = match config {
            Some(dic) => depythonize(dic.as_ref())?,
            None => rs::DashboardConfig::default(),
        };
        Ok(Dashboard {
            snapshot: rs::Snapshot::default(),
            config,
        })
    }

    /// Add a long CSV report with location, date and measure columns.
    fn read_long_csv(&mut self, path: &str, name: &str) -> PyResult<()> {
        let file = File::open(path)?;
        let report = io::read_long_csv(file, name).map_err(py_err)?;
        self.push_report(report);
        Ok(())
    }

    /// Add a report made of wide CSV files given as {measure: path}.
    fn read_wide_csv(&mut self, name: &str, paths: &PyDict) -> PyResult<()> {
        let mut tables = vec![];
        for (measure, path) in paths.iter() {
            let measure: rs::Measure = measure.extract::<&str>()?.parse().map_err(py_err)?;
            let file = File::open(path.extract::<&str>()?)?;
            tables.push(io::read_wide_csv(file, name, measure).map_err(py_err)?);
        }
        let report = rs::RawReport::from_wide(name, &tables).map_err(py_err)?;
        self.push_report(report);
        Ok(())
    }

    /// Locations available for selection, aggregate excluded.
    fn available_locations(&self) -> PyResult<Vec<String>> {
        let table = self
            .config
            .normalizer()
            .normalize(&self.snapshot)
            .map_err(py_err)?;
        Ok(table.split_aggregate(&self.config.aggregate_location).0.locations())
    }

    /// Recompute observation and model tables for the current configuration.
    fn recompute(&self, py: Python) -> PyResult<PyObject> {
        let out = rs::recompute(&self.snapshot, &self.config).map_err(py_err)?;
        Ok(pythonize(py, &out)?)
    }

    #[getter]
    fn get_selected_measure(&self) -> PyResult<String> {
        Ok(self.config.selected_measure.to_string())
    }

    #[setter]
    fn set_selected_measure(&mut self, value: &str) -> PyResult<()> {
        self.config.selected_measure = value.parse().map_err(py_err)?;
        Ok(())
    }

    fn __repr__(&self) -> PyResult<String> {
        Ok(format!(
            "Dashboard(sources={}, measure={})",
            self.snapshot.reports().len(),
            self.config.selected_measure
        ))
    }
}

py_config_props!(Dashboard {
    report_threshold: Real,
    locations: Vec<String>,
    contact_rate: Real,
    infection_probability: Real,
    duration_days: i64,
    initial_case_count: Real,
    population_bound: Real,
    show_aggregate: bool
});

/// Projects the exponential model and returns a list of row dicts.
#[pyfunction(population_bound = "rs::WORLD_POPULATION")]
fn project(
    py: Python,
    params: &PyDict,
    day_count: i64,
    start_date: &str,
    population_bound: Real,
) -> PyResult<PyObject> {
    let params: rs::ModelParams = depythonize(params.as_ref())?;
    let start = start_date
        .parse()
        .map_err(|_| PyValueError::new_err(format!("invalid date '{}'", start_date)))?;
    let curve = rs::project(&params, day_count, start, population_bound).map_err(py_err)?;
    Ok(pythonize(py, &curve.rows().to_vec())?)
}

/// Location name as stored in observation tables.
#[pyfunction]
fn normalize_location(name: &str) -> String {
    rs::normalize_location(name)
}

#[pymodule]
fn epipane(_py: Python, m: &PyModule) -> PyResult<()> {
    m.add_class::<Dashboard>()?;
    m.add_function(wrap_pyfunction!(project, m)?)?;
    m.add_function(wrap_pyfunction!(normalize_location, m)?)?;

    Ok(())
}
