//! Core of an interactive COVID-19 dashboard: normalization of public case and
//! death reports into a per-location table aligned on "days since the report
//! threshold", and an exponential growth curve to compare them against.
//!
//! Rendering, widgets and data download live outside this crate; they call
//! [`dashboard::recompute`] with a [`dashboard::Snapshot`] of the reports and
//! the current [`config::DashboardConfig`].
pub mod config;
pub mod dashboard;
pub mod data;
pub mod error;
pub mod io;
pub mod model;
pub mod normalizer;
pub mod prelude;
pub mod utils;
