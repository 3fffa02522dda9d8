//! Weather telemetry simulator and analytics.
//!
//! A [`simulation::WeatherSimulator`] emits readings for a set of stations,
//! [`sink::TelemetrySink`] batches them into a [`store::TimeSeriesStore`], and
//! [`analytics::WeatherAnalytics`] derives downsampled views, heat index,
//! trends, correlations, alerts and rollups from what was stored.

pub mod analytics;
pub mod config;
pub mod controller;
pub mod domain;
pub mod presentation;
pub mod query;
pub mod simulation;
pub mod sink;
pub mod store;
pub mod telemetry;
