//! Discrete-time exponential growth used as a comparison baseline.
//!
//! Each day multiplies the number of cases by the same growth factor
//! `1 + contact_rate * infection_probability`. There is no removal
//! compartment, so the curve only stops growing when it hits the population
//! bound.
use crate::prelude::{Day, Error, Real, Result, MAX_INFECTION_PROBABILITY};
use chrono::{Duration, NaiveDate};
use getset::{CopyGetters, Setters};
use log::*;
use serde::{Deserialize, Serialize};

/// Parameters of the projection model.
#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize, CopyGetters, Setters)]
#[serde(default)]
#[getset(get_copy = "pub", set = "pub")]
pub struct ModelParams {
    /// Average number of people an infected person is exposed to each day.
    contact_rate: Real,
    /// Probability that an exposure results in an infection.
    infection_probability: Real,
    /// Number of projected days.
    duration_days: Day,
    /// Number of cases at day zero.
    initial_case_count: Real,
    report_threshold: Real,
}

impl Default for ModelParams {
    fn default() -> Self {
        ModelParams {
            contact_rate: 5.0,
            infection_probability: 0.03,
            duration_days: 90,
            initial_case_count: 1.0,
            report_threshold: 100.0,
        }
    }
}

impl ModelParams {
    pub fn new(
        contact_rate: Real,
        infection_probability: Real,
        duration_days: Day,
        initial_case_count: Real,
        report_threshold: Real,
    ) -> Self {
        ModelParams {
            contact_rate,
            infection_probability,
            duration_days,
            initial_case_count,
            report_threshold,
        }
    }

    /// Check ranges of all parameters.
    pub fn validate(&self) -> Result<()> {
        non_negative("contact_rate", self.contact_rate)?;
        non_negative("infection_probability", self.infection_probability)?;
        if self.infection_probability > MAX_INFECTION_PROBABILITY {
            return Err(Error::invalid(
                "infection_probability",
                format!(
                    "must be at most {}, got {}",
                    MAX_INFECTION_PROBABILITY, self.infection_probability
                ),
            ));
        }
        if self.duration_days < 0 {
            return Err(Error::invalid(
                "duration_days",
                format!("must be non-negative, got {}", self.duration_days),
            ));
        }
        non_negative("initial_case_count", self.initial_case_count)?;
        non_negative("report_threshold", self.report_threshold)?;
        Ok(())
    }

    pub fn growth_factor(&self) -> Real {
        growth_factor(self)
    }
}

fn non_negative(name: &'static str, value: Real) -> Result<()> {
    if !value.is_finite() || value < 0.0 {
        return Err(Error::invalid(
            name,
            format!("must be a finite non-negative number, got {}", value),
        ));
    }
    Ok(())
}

/// Per-day multiplier of the model. Values below one produce a decaying
/// curve and exactly one a flat line.
pub fn growth_factor(params: &ModelParams) -> Real {
    1.0 + params.contact_rate * params.infection_probability
}

/// A single projected day.
#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ProjectionRow {
    pub day_offset: Day,
    pub date: NaiveDate,
    pub projected_value: Real,
}

/// Lazy iterator over projected days. Creating a new iterator with the same
/// inputs restarts the sequence.
#[derive(Clone, Debug)]
pub struct ProjectionIter {
    initial: Real,
    factor: Real,
    bound: Real,
    start_date: NaiveDate,
    day: Day,
    day_count: Day,
}

impl ProjectionIter {
    /// Validate inputs and create the iterator.
    pub fn new(
        params: &ModelParams,
        day_count: Day,
        start_date: NaiveDate,
        population_bound: Real,
    ) -> Result<Self> {
        if day_count < 0 {
            return Err(Error::invalid(
                "day_count",
                format!("must be non-negative, got {}", day_count),
            ));
        }
        if population_bound.is_nan() || population_bound < 0.0 {
            return Err(Error::invalid(
                "population_bound",
                format!("must be non-negative, got {}", population_bound),
            ));
        }
        params.validate()?;
        if day_count > 0 {
            let last = Duration::try_days(day_count - 1)
                .and_then(|d| start_date.checked_add_signed(d));
            if last.is_none() {
                return Err(Error::invalid(
                    "day_count",
                    format!("{} days from {} leave the calendar range", day_count, start_date),
                ));
            }
        }

        Ok(ProjectionIter {
            initial: params.initial_case_count,
            factor: growth_factor(params),
            bound: population_bound,
            start_date,
            day: 0,
            day_count,
        })
    }
}

impl Iterator for ProjectionIter {
    type Item = ProjectionRow;

    fn next(&mut self) -> Option<ProjectionRow> {
        if self.day >= self.day_count {
            return None;
        }
        let d = self.day;
        self.day += 1;

        let value = self.initial * self.factor.powf(d as Real);
        let date = self.start_date.checked_add_signed(Duration::try_days(d)?)?;
        Some(ProjectionRow {
            day_offset: d,
            date,
            projected_value: value.min(self.bound).max(0.0),
        })
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let n = (self.day_count - self.day).max(0) as usize;
        (n, Some(n))
    }
}

/// A complete projected curve.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Projection {
    rows: Vec<ProjectionRow>,
}

impl Projection {
    pub fn rows(&self) -> &[ProjectionRow] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Projected values in day order.
    pub fn values(&self) -> Vec<Real> {
        self.rows.iter().map(|r| r.projected_value).collect()
    }
}

/// Project `day_count` days of exponential growth starting at `start_date`.
///
/// Values are clamped to `population_bound`. Fails before computing anything
/// if the day count is negative or a parameter is out of range.
pub fn project(
    params: &ModelParams,
    day_count: Day,
    start_date: NaiveDate,
    population_bound: Real,
) -> Result<Projection> {
    let rows: Vec<ProjectionRow> =
        ProjectionIter::new(params, day_count, start_date, population_bound)?.collect();
    debug!(
        "projected {} days with growth factor {}",
        rows.len(),
        growth_factor(params)
    );
    Ok(Projection { rows })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::prelude::WORLD_POPULATION;
    use assert_approx_eq::assert_approx_eq;

    fn start() -> NaiveDate {
        NaiveDate::from_ymd_opt(2020, 1, 21).unwrap()
    }

    fn params(contact_rate: Real, prob: Real, cases: Real) -> ModelParams {
        ModelParams::new(contact_rate, prob, 0, cases, 0.0)
    }

    #[test]
    fn geometric_growth() {
        let p = params(10.0, 0.03, 1.0);
        assert_approx_eq!(p.growth_factor(), 1.3, 1e-12);

        let curve = project(&p, 3, start(), WORLD_POPULATION).unwrap();
        let values = curve.values();
        assert_eq!(values.len(), 3);
        assert_eq!(values[0], 1.0);
        assert_approx_eq!(values[1], 1.3, 1e-9);
        assert_approx_eq!(values[2], 1.69, 1e-9);
    }

    #[test]
    fn dates_follow_start_date() {
        let curve = project(&params(5.0, 0.03, 2.0), 4, start(), WORLD_POPULATION).unwrap();
        for (i, row) in curve.rows().iter().enumerate() {
            assert_eq!(row.day_offset, i as Day);
            assert_eq!(row.date, start() + Duration::days(i as i64));
        }
        assert_eq!(curve.rows()[0].projected_value, 2.0);
    }

    #[test]
    fn values_are_clamped_to_population_bound() {
        let curve = project(&params(1000.0, 0.1, 1e5), 60, start(), WORLD_POPULATION).unwrap();
        assert!(curve.values().iter().all(|&v| v <= WORLD_POPULATION));
        assert_eq!(*curve.values().last().unwrap(), WORLD_POPULATION);

        let curve = project(&params(1.0, 0.5, 10.0), 3, start(), 12.0).unwrap();
        assert_eq!(curve.values(), vec![10.0, 12.0, 12.0]);
    }

    #[test]
    fn decay_and_flat_curves_are_allowed() {
        let flat = project(&params(0.0, 0.5, 7.0), 5, start(), WORLD_POPULATION).unwrap();
        assert!(flat.values().iter().all(|&v| v == 7.0));

        let mut p = params(2.0, 0.0, 8.0);
        assert_approx_eq!(p.growth_factor(), 1.0, 1e-12);

        // Decay is only reachable through the raw formula, validation keeps
        // contact rates non-negative.
        p.set_contact_rate(-2.0).set_infection_probability(0.25);
        assert_approx_eq!(growth_factor(&p), 0.5, 1e-12);
    }

    #[test]
    fn empty_and_negative_day_counts() {
        let p = params(5.0, 0.03, 1.0);
        assert!(project(&p, 0, start(), WORLD_POPULATION).unwrap().is_empty());
        assert!(matches!(
            project(&p, -1, start(), WORLD_POPULATION),
            Err(Error::InvalidParameter { name: "day_count", .. })
        ));
    }

    #[test]
    fn parameters_are_validated() {
        let bad = [
            params(-1.0, 0.03, 1.0),
            params(5.0, 1.5, 1.0),
            params(5.0, -0.1, 1.0),
            params(5.0, 0.03, -1.0),
            params(Real::NAN, 0.03, 1.0),
            ModelParams::new(5.0, 0.03, -3, 1.0, 0.0),
            ModelParams::new(5.0, 0.03, 3, 1.0, -5.0),
        ];
        for p in bad.iter() {
            assert!(project(p, 3, start(), WORLD_POPULATION).is_err(), "{:?}", p);
        }
        assert!(project(&params(5.0, 0.03, 1.0), 3, start(), -1.0).is_err());
    }

    #[test]
    fn projection_is_repeatable() {
        let p = ModelParams::default();
        let a = project(&p, 120, start(), WORLD_POPULATION).unwrap();
        let b = project(&p, 120, start(), WORLD_POPULATION).unwrap();
        assert_eq!(a, b);

        let iter = ProjectionIter::new(&p, 120, start(), WORLD_POPULATION).unwrap();
        assert_eq!(iter.size_hint(), (120, Some(120)));
        assert_eq!(iter.collect::<Vec<_>>(), a.rows().to_vec());
    }
}
