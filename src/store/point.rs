use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::domain::{Field, FieldValue, Reading};

/// A single tagged, fielded point as written to the store
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DataPoint {
    pub measurement: String,
    pub tags: BTreeMap<String, String>,
    pub fields: BTreeMap<String, FieldValue>,
    pub timestamp: DateTime<Utc>,
}

impl DataPoint {
    pub fn new(measurement: impl Into<String>, timestamp: DateTime<Utc>) -> Self {
        Self {
            measurement: measurement.into(),
            tags: BTreeMap::new(),
            fields: BTreeMap::new(),
            timestamp,
        }
    }

    pub fn tag(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.tags.insert(key.into(), value.into());
        self
    }

    pub fn field(mut self, key: impl Into<String>, value: FieldValue) -> Self {
        self.fields.insert(key.into(), value);
        self
    }

    /// Convert a reading into a point carrying all of its tags and fields
    pub fn from_reading(reading: &Reading, measurement: &str) -> Self {
        let point = reading
            .tags()
            .into_iter()
            .fold(DataPoint::new(measurement, reading.timestamp), |p, (k, v)| {
                p.tag(k, v)
            });

        Field::all()
            .into_iter()
            .fold(point, |p, field| p.field(field.as_ref(), reading.value(field)))
    }

    pub fn tag_value(&self, key: &str) -> Option<&str> {
        self.tags.get(key).map(String::as_str)
    }

    pub fn field_value(&self, key: &str) -> Option<f64> {
        self.fields.get(key).map(FieldValue::as_f64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Station, MEASUREMENT};

    #[test]
    fn test_point_from_reading() {
        let station = Station::new("station_1", "New York", 40.7128, -74.0060, 10.0);
        let mut reading = Reading::for_station(&station, Utc::now());
        reading.temperature = 21.5;
        reading.precipitation = 2;

        let point = DataPoint::from_reading(&reading, MEASUREMENT);

        assert_eq!(point.measurement, "weather_metrics");
        assert_eq!(point.tag_value("station_id"), Some("station_1"));
        assert_eq!(point.tag_value("location"), Some("New York"));
        assert_eq!(point.tag_value("sensor_type"), Some("weather_station"));
        assert_eq!(point.fields.len(), 9);
        assert_eq!(point.field_value("temperature"), Some(21.5));
        assert_eq!(point.fields["precipitation"], FieldValue::Integer(2));
        assert_eq!(point.field_value("latitude"), Some(40.7128));
        assert_eq!(point.timestamp, reading.timestamp);
    }
}
