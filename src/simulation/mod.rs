//! # Weather Station Simulation
//!
//! Synthetic multi-station weather telemetry built from a bounded random walk.
//!
//! ## Components
//!
//! - **State**: per-station fixed metadata plus the drifting baseline
//! - **Generator**: jitters each baseline into an emitted reading, then drifts it
//!
//! ## Usage
//!
//! ```rust
//! use weather_telemetry::config::SimulationConfig;
//! use weather_telemetry::domain::Station;
//! use weather_telemetry::simulation::WeatherSimulator;
//!
//! let config = SimulationConfig::default().with_seed(42);
//! let mut sim = WeatherSimulator::new(config, Station::defaults()).unwrap();
//!
//! let readings = sim.tick();
//! assert_eq!(readings.len(), 3);
//! ```

pub mod generator;
pub mod state;

pub use generator::WeatherSimulator;
pub use state::{StationState, StationStateStore};
