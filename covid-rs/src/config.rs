//! Configuration surface of the dashboard core.
//!
//! Every field has a default taken from the public COVID-19 dashboard this
//! crate was built for, so a config file only needs to list what differs.
use crate::{
    model::ModelParams,
    normalizer::Normalizer,
    prelude::{default_start_date, Day, Error, Measure, Real, Result, WORLD_POPULATION},
};
use chrono::NaiveDate;
use paste::paste;
use serde::{Deserialize, Serialize};
use std::{fs, path::Path, path::PathBuf};

/// Layout of a CSV snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceFormat {
    /// location and date columns plus one column per measure.
    Long,
    /// A date column plus one column per location, for a single measure.
    Wide,
}

impl Default for SourceFormat {
    fn default() -> Self {
        SourceFormat::Long
    }
}

/// A CSV file to load as (part of) a raw report. Wide files with the same
/// name are merged into a single report.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SourceConfig {
    pub name: String,
    pub path: PathBuf,
    #[serde(default)]
    pub format: SourceFormat,
    #[serde(default)]
    pub measure: Option<Measure>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DashboardConfig {
    pub report_threshold: Real,
    pub selected_measure: Measure,
    /// Locations shown next to the model. Empty means all of them.
    pub locations: Vec<String>,
    pub contact_rate: Real,
    pub infection_probability: Real,
    pub duration_days: Day,
    pub initial_case_count: Real,
    pub population_bound: Real,
    pub start_date: NaiveDate,
    pub aggregate_location: String,
    pub show_aggregate: bool,
    /// Measures carried in the output besides the selected one.
    pub extra_measures: Vec<Measure>,
    pub sources: Vec<SourceConfig>,
}

impl Default for DashboardConfig {
    fn default() -> Self {
        let params = ModelParams::default();
        DashboardConfig {
            report_threshold: params.report_threshold(),
            selected_measure: Measure::TotalCases,
            locations: ["United States", "South Korea", "China", "Italy", "Singapore"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
            contact_rate: params.contact_rate(),
            infection_probability: params.infection_probability(),
            duration_days: params.duration_days(),
            initial_case_count: params.initial_case_count(),
            population_bound: WORLD_POPULATION,
            start_date: default_start_date(),
            aggregate_location: "World".to_string(),
            show_aggregate: true,
            extra_measures: vec![],
            sources: vec![],
        }
    }
}

macro_rules! config_setters {
    ($($field:ident: $ty:ty),* $(,)?) => {
        paste! {
            impl DashboardConfig {
                $(
                    pub fn [<with_ $field>](mut self, value: $ty) -> Self {
                        self.$field = value;
                        self
                    }
                )*
            }
        }
    };
}

config_setters!(
    report_threshold: Real,
    selected_measure: Measure,
    locations: Vec<String>,
    contact_rate: Real,
    infection_probability: Real,
    duration_days: Day,
    initial_case_count: Real,
    population_bound: Real,
    start_date: NaiveDate,
    aggregate_location: String,
    show_aggregate: bool,
    extra_measures: Vec<Measure>,
);

impl DashboardConfig {
    pub fn from_toml_str(data: &str) -> Result<Self> {
        Ok(toml::from_str(data)?)
    }

    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let data = fs::read_to_string(path)?;
        Self::from_toml_str(&data)
    }

    /// Model parameters as seen by the projection.
    pub fn model_params(&self) -> ModelParams {
        ModelParams::new(
            self.contact_rate,
            self.infection_probability,
            self.duration_days,
            self.initial_case_count,
            self.report_threshold,
        )
    }

    /// Normalizer for the selected measure and threshold.
    pub fn normalizer(&self) -> Normalizer {
        Normalizer::new(self.selected_measure, self.report_threshold)
            .with_measures(&self.extra_measures)
            .with_start_date(self.start_date)
    }

    /// Reject out-of-range options before any computation begins.
    pub fn validate(&self) -> Result<()> {
        self.model_params().validate()?;
        self.normalizer().validate()?;
        if self.population_bound.is_nan() || self.population_bound < 0.0 {
            return Err(Error::invalid(
                "population_bound",
                format!("must be non-negative, got {}", self.population_bound),
            ));
        }
        for source in &self.sources {
            if source.format == SourceFormat::Wide && source.measure.is_none() {
                return Err(Error::invalid(
                    "sources",
                    format!("wide source '{}' needs a measure", source.name),
                ));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_public_dashboard() {
        let cfg = DashboardConfig::default();
        assert_eq!(cfg.population_bound, 7_794_798_739.0);
        assert_eq!(cfg.start_date, NaiveDate::from_ymd_opt(2020, 1, 21).unwrap());
        assert_eq!(cfg.locations.len(), 5);
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn read_from_toml() {
        let cfg = DashboardConfig::from_toml_str(
            r#"
            report_threshold = 10.0
            selected_measure = "new_deaths"
            locations = ["Italy"]
            start_date = "2020-03-01"

            [[sources]]
            name = "ecdc"
            path = "total_cases.csv"
            format = "wide"
            measure = "total_cases"
            "#,
        )
        .unwrap();

        assert_eq!(cfg.selected_measure, Measure::NewDeaths);
        assert_eq!(cfg.locations, vec!["Italy"]);
        assert_eq!(cfg.contact_rate, 5.0);
        assert_eq!(cfg.sources[0].format, SourceFormat::Wide);
        assert_eq!(cfg.normalizer().threshold(), 10.0);
        assert_eq!(cfg.model_params().report_threshold(), 10.0);
    }

    #[test]
    fn unknown_keys_are_rejected() {
        let res = DashboardConfig::from_toml_str("contact_rates = 3.0");
        assert!(matches!(res, Err(Error::Config(_))));
    }

    #[test]
    fn invalid_values_fail_validation() {
        let cfg = DashboardConfig::default();
        assert!(cfg.clone().with_report_threshold(-1.0).validate().is_err());
        assert!(cfg.clone().with_infection_probability(2.0).validate().is_err());
        assert!(cfg.clone().with_duration_days(-5).validate().is_err());
        assert!(cfg.with_population_bound(-1.0).validate().is_err());

        let wide = DashboardConfig::from_toml_str(
            r#"
            [[sources]]
            name = "ecdc"
            path = "x.csv"
            format = "wide"
            "#,
        )
        .unwrap();
        assert!(wide.validate().is_err());
    }
}
