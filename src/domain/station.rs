use serde::{Deserialize, Serialize};
use validator::Validate;

/// Fixed description of a weather station.
///
/// Metadata never changes during a run; every reading carries a copy of the
/// coordinates and elevation exactly as configured here.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
pub struct Station {
    #[validate(length(min = 1, message = "station id must not be empty"))]
    pub id: String,
    /// Human readable location name, written as the `location` tag
    pub location: String,
    #[validate(range(min = -90.0, max = 90.0))]
    pub latitude: f64,
    #[validate(range(min = -180.0, max = 180.0))]
    pub longitude: f64,
    /// Elevation above sea level in meters
    pub elevation: f64,
}

impl Station {
    pub fn new(
        id: impl Into<String>,
        location: impl Into<String>,
        latitude: f64,
        longitude: f64,
        elevation: f64,
    ) -> Self {
        Self {
            id: id.into(),
            location: location.into(),
            latitude,
            longitude,
            elevation,
        }
    }

    /// The three stations the simulator ships with
    pub fn defaults() -> Vec<Station> {
        vec![
            Station::new("station_1", "New York", 40.7128, -74.0060, 10.0),
            Station::new("station_2", "Los Angeles", 34.0522, -118.2437, 71.0),
            Station::new("station_3", "Chicago", 41.8781, -87.6298, 182.0),
        ]
    }
}

/// Hidden "true" values a station drifts around.
///
/// Only the emitted reading is ever clamped; the baseline itself is free to
/// wander outside physical bounds.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Baseline {
    pub temperature: f64,
    pub humidity: f64,
    pub pressure: f64,
}
