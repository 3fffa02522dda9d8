use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use strum::{AsRefStr, Display, EnumIter, EnumString, IntoEnumIterator};

use super::Station;

/// Measurement name every reading is written under
pub const MEASUREMENT: &str = "weather_metrics";
/// Value of the `sensor_type` tag
pub const SENSOR_TYPE: &str = "weather_station";

pub const TAG_STATION_ID: &str = "station_id";
pub const TAG_LOCATION: &str = "location";
pub const TAG_SENSOR_TYPE: &str = "sensor_type";

/// Every field a reading carries, in write order
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    EnumIter,
    AsRefStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum Field {
    Temperature,
    Humidity,
    Pressure,
    WindSpeed,
    WindDirection,
    Precipitation,
    Latitude,
    Longitude,
    Elevation,
}

impl Field {
    pub fn all() -> Vec<Field> {
        Field::iter().collect()
    }
}

/// Typed field value as accepted by the store
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldValue {
    Float(f64),
    Integer(i64),
}

impl FieldValue {
    pub fn as_f64(&self) -> f64 {
        match self {
            FieldValue::Float(v) => *v,
            FieldValue::Integer(v) => *v as f64,
        }
    }
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldValue::Float(v) => write!(f, "{}", v),
            FieldValue::Integer(v) => write!(f, "{}i", v),
        }
    }
}

/// One station's observation at one instant
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Reading {
    pub station_id: String,
    pub location: String,
    pub timestamp: DateTime<Utc>,
    /// Temperature as stored (the simulator works in °C)
    pub temperature: f64,
    /// Relative humidity in percent, always within [0, 100]
    pub humidity: f64,
    /// Pressure in hPa
    pub pressure: f64,
    /// Wind speed in m/s
    pub wind_speed: f64,
    /// Wind direction in degrees, [0, 360)
    pub wind_direction: f64,
    /// Precipitation amount in whole millimetres
    pub precipitation: u32,
    pub latitude: f64,
    pub longitude: f64,
    pub elevation: f64,
}

impl Reading {
    /// Start a reading stamped with a station's fixed metadata
    pub fn for_station(station: &Station, timestamp: DateTime<Utc>) -> Self {
        Self {
            station_id: station.id.clone(),
            location: station.location.clone(),
            timestamp,
            temperature: 0.0,
            humidity: 0.0,
            pressure: 0.0,
            wind_speed: 0.0,
            wind_direction: 0.0,
            precipitation: 0,
            latitude: station.latitude,
            longitude: station.longitude,
            elevation: station.elevation,
        }
    }

    pub fn value(&self, field: Field) -> FieldValue {
        match field {
            Field::Temperature => FieldValue::Float(self.temperature),
            Field::Humidity => FieldValue::Float(self.humidity),
            Field::Pressure => FieldValue::Float(self.pressure),
            Field::WindSpeed => FieldValue::Float(self.wind_speed),
            Field::WindDirection => FieldValue::Float(self.wind_direction),
            Field::Precipitation => FieldValue::Integer(i64::from(self.precipitation)),
            Field::Latitude => FieldValue::Float(self.latitude),
            Field::Longitude => FieldValue::Float(self.longitude),
            Field::Elevation => FieldValue::Float(self.elevation),
        }
    }

    /// Tags written alongside the fields
    pub fn tags(&self) -> [(&'static str, &str); 3] {
        [
            (TAG_STATION_ID, self.station_id.as_str()),
            (TAG_LOCATION, self.location.as_str()),
            (TAG_SENSOR_TYPE, SENSOR_TYPE),
        ]
    }

    /// Check the physical invariants every emitted reading must satisfy
    pub fn is_within_bounds(&self) -> bool {
        (0.0..=100.0).contains(&self.humidity)
            && Field::all()
                .into_iter()
                .all(|field| self.value(field).as_f64().is_finite())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn test_field_names() {
        assert_eq!(Field::WindSpeed.to_string(), "wind_speed");
        assert_eq!(Field::from_str("wind_direction").unwrap(), Field::WindDirection);
        assert_eq!(Field::Precipitation.as_ref(), "precipitation");
        assert!(Field::from_str("dew_point").is_err());
        assert_eq!(Field::all().len(), 9);
    }

    #[test]
    fn test_reading_copies_station_metadata() {
        let station = Station::new("station_9", "Oslo", 59.9139, 10.7522, 23.0);
        let reading = Reading::for_station(&station, Utc::now());

        assert_eq!(reading.station_id, "station_9");
        assert_eq!(reading.latitude, 59.9139);
        assert_eq!(reading.longitude, 10.7522);
        assert_eq!(reading.elevation, 23.0);
        assert_eq!(reading.tags()[2], ("sensor_type", "weather_station"));
    }

    #[test]
    fn test_precipitation_is_integer_field() {
        let station = Station::new("s", "x", 0.0, 0.0, 0.0);
        let mut reading = Reading::for_station(&station, Utc::now());
        reading.precipitation = 3;

        assert_eq!(reading.value(Field::Precipitation), FieldValue::Integer(3));
        assert_eq!(reading.value(Field::Precipitation).to_string(), "3i");
    }

    #[test]
    fn test_bounds_check() {
        let station = Station::new("s", "x", 0.0, 0.0, 0.0);
        let mut reading = Reading::for_station(&station, Utc::now());
        reading.humidity = 55.0;
        assert!(reading.is_within_bounds());

        reading.humidity = 100.5;
        assert!(!reading.is_within_bounds());

        reading.humidity = 50.0;
        reading.pressure = f64::NAN;
        assert!(!reading.is_within_bounds());
    }
}
