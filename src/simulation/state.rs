//! # Station State Store
//!
//! Holds every station's fixed metadata together with its current baseline.
//! The store is owned by exactly one simulator, so baselines are mutated
//! without any locking.

use rand::Rng;

use crate::config::{InitialRanges, ValueRange};
use crate::domain::{Baseline, Station};

/// A station and the baseline it currently drifts around
#[derive(Debug, Clone, PartialEq)]
pub struct StationState {
    pub station: Station,
    pub baseline: Baseline,
}

#[derive(Debug, Clone, Default)]
pub struct StationStateStore {
    states: Vec<StationState>,
}

impl StationStateStore {
    /// Draw an initial baseline for every station.
    ///
    /// Draw order is all temperatures, then all humidities, then all
    /// pressures, so a given seed yields the same baselines regardless of how
    /// the caller later iterates.
    pub fn initialize<R: Rng + ?Sized>(
        stations: Vec<Station>,
        ranges: &InitialRanges,
        rng: &mut R,
    ) -> Self {
        let temperatures = draw_all(rng, stations.len(), ranges.temperature);
        let humidities = draw_all(rng, stations.len(), ranges.humidity);
        let pressures = draw_all(rng, stations.len(), ranges.pressure);

        let states = stations
            .into_iter()
            .enumerate()
            .map(|(i, station)| StationState {
                station,
                baseline: Baseline {
                    temperature: temperatures[i],
                    humidity: humidities[i],
                    pressure: pressures[i],
                },
            })
            .collect();

        Self { states }
    }

    pub fn len(&self) -> usize {
        self.states.len()
    }

    pub fn is_empty(&self) -> bool {
        self.states.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &StationState> {
        self.states.iter()
    }

    pub(crate) fn iter_mut(&mut self) -> impl Iterator<Item = &mut StationState> {
        self.states.iter_mut()
    }

    pub fn get(&self, station_id: &str) -> Option<&StationState> {
        self.states.iter().find(|s| s.station.id == station_id)
    }

    pub fn baseline(&self, station_id: &str) -> Option<Baseline> {
        self.get(station_id).map(|s| s.baseline)
    }
}

fn draw_all<R: Rng + ?Sized>(rng: &mut R, n: usize, range: ValueRange) -> Vec<f64> {
    (0..n).map(|_| rng.gen_range(range.min..=range.max)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SimulationConfig;
    use rand::{rngs::StdRng, SeedableRng};

    #[test]
    fn test_initial_baselines_within_ranges() {
        let ranges = SimulationConfig::default().initial;
        let mut rng = StdRng::seed_from_u64(7);
        let store = StationStateStore::initialize(Station::defaults(), &ranges, &mut rng);

        assert_eq!(store.len(), 3);
        for state in store.iter() {
            assert!((15.0..=25.0).contains(&state.baseline.temperature));
            assert!((40.0..=60.0).contains(&state.baseline.humidity));
            assert!((1010.0..=1020.0).contains(&state.baseline.pressure));
        }
    }

    #[test]
    fn test_same_seed_same_baselines() {
        let ranges = SimulationConfig::default().initial;
        let a = StationStateStore::initialize(
            Station::defaults(),
            &ranges,
            &mut StdRng::seed_from_u64(99),
        );
        let b = StationStateStore::initialize(
            Station::defaults(),
            &ranges,
            &mut StdRng::seed_from_u64(99),
        );

        for (x, y) in a.iter().zip(b.iter()) {
            assert_eq!(x, y);
        }
    }

    #[test]
    fn test_degenerate_range_is_exact() {
        let mut ranges = SimulationConfig::default().initial;
        ranges.pressure = ValueRange::new(1013.25, 1013.25);
        let store = StationStateStore::initialize(
            Station::defaults(),
            &ranges,
            &mut StdRng::seed_from_u64(1),
        );

        assert!(store.iter().all(|s| s.baseline.pressure == 1013.25));
    }

    #[test]
    fn test_lookup_by_id() {
        let store = StationStateStore::initialize(
            Station::defaults(),
            &SimulationConfig::default().initial,
            &mut StdRng::seed_from_u64(1),
        );

        assert_eq!(store.get("station_2").unwrap().station.location, "Los Angeles");
        assert!(store.baseline("station_42").is_none());
    }
}
