//! # Sample Generator
//!
//! Emits one reading per station per tick. Each emitted value is the station's
//! baseline plus an independent jitter; afterwards the baseline takes a small
//! random-walk step so consecutive ticks stay coherent.

use chrono::{DateTime, Utc};
use rand::{rngs::StdRng, Rng, SeedableRng};

use super::state::StationStateStore;
use crate::config::{check_stations, ConfigError, SimulationConfig};
use crate::domain::{Reading, Station};

const WIND_DIRECTION_MAX: f64 = 360.0;

/// Multi-station weather simulator
///
/// Owns the station state and its random source. Independent instances never
/// share state, so several can run side by side.
pub struct WeatherSimulator {
    config: SimulationConfig,
    states: StationStateStore,
    rng: StdRng,
    ticks: u64,
}

impl WeatherSimulator {
    /// Create a new simulator, drawing initial baselines for every station.
    ///
    /// Fails when the configuration is out of range; a simulator is never
    /// built from parameters it can't honour.
    pub fn new(config: SimulationConfig, stations: Vec<Station>) -> Result<Self, ConfigError> {
        config.check()?;
        check_stations(&stations)?;

        let mut rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        let states = StationStateStore::initialize(stations, &config.initial, &mut rng);

        Ok(Self {
            config,
            states,
            rng,
            ticks: 0,
        })
    }

    pub fn states(&self) -> &StationStateStore {
        &self.states
    }

    pub fn station_count(&self) -> usize {
        self.states.len()
    }

    /// Number of ticks emitted so far
    pub fn ticks(&self) -> u64 {
        self.ticks
    }

    /// Advance one step stamped with the current wall-clock time
    pub fn tick(&mut self) -> Vec<Reading> {
        self.tick_at(Utc::now())
    }

    /// Advance one step, stamping every reading with `timestamp`
    pub fn tick_at(&mut self, timestamp: DateTime<Utc>) -> Vec<Reading> {
        let Self {
            config,
            states,
            rng,
            ticks,
        } = self;

        let mut readings = Vec::with_capacity(states.len());

        for state in states.iter_mut() {
            let base = state.baseline;
            let mut reading = Reading::for_station(&state.station, timestamp);

            reading.temperature = base.temperature + symmetric(rng, config.jitter.temperature);
            reading.humidity =
                (base.humidity + symmetric(rng, config.jitter.humidity)).clamp(0.0, 100.0);
            reading.pressure = base.pressure + symmetric(rng, config.jitter.pressure);
            reading.wind_speed = half_open(rng, config.wind_speed_max);
            reading.wind_direction = half_open(rng, WIND_DIRECTION_MAX);
            reading.precipitation = if rng.gen_bool(config.precipitation_probability) {
                rng.gen_range(0..config.precipitation_max)
            } else {
                0
            };

            readings.push(reading);

            // Drift after emission; baselines are never clamped
            state.baseline.temperature += symmetric(rng, config.drift.temperature);
            state.baseline.humidity += symmetric(rng, config.drift.humidity);
            state.baseline.pressure += symmetric(rng, config.drift.pressure);
        }

        *ticks += 1;
        readings
    }
}

/// Uniform draw in [-magnitude, +magnitude]
fn symmetric<R: Rng + ?Sized>(rng: &mut R, magnitude: f64) -> f64 {
    if magnitude == 0.0 {
        return 0.0;
    }
    rng.gen_range(-magnitude..=magnitude)
}

/// Uniform draw in [0, max)
fn half_open<R: Rng + ?Sized>(rng: &mut R, max: f64) -> f64 {
    if max <= 0.0 {
        return 0.0;
    }
    rng.gen_range(0.0..max)
}
