use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use strum::{Display, EnumString};

use super::DerivedSample;
use crate::store::Frame;

const MILLIS_PER_HOUR: f64 = 3_600_000.0;

/// Sign of the hourly rate of change
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Trend {
    Rising,
    Falling,
    Stable,
}

impl Trend {
    pub fn from_rate(rate: f64) -> Self {
        if rate > 0.0 {
            Trend::Rising
        } else if rate < 0.0 {
            Trend::Falling
        } else {
            Trend::Stable
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TrendPoint {
    pub value: f64,
    /// Change since the previous point, per hour
    pub rate_per_hour: f64,
    pub trend: Trend,
}

/// Classify each point of every station's `column` series against its
/// predecessor.
///
/// The first point of a station has no predecessor and is excluded. Null
/// cells are skipped and never serve as a predecessor. A point sharing its
/// predecessor's timestamp has no defined rate and is dropped.
pub fn classify_trends(frame: &Frame, column: &str) -> Vec<DerivedSample<TrendPoint>> {
    let mut previous: HashMap<&str, (DateTime<Utc>, f64)> = HashMap::new();
    let mut out = Vec::new();

    for row in &frame.rows {
        let Some(value) = row.get(column) else {
            continue;
        };

        if let Some((prev_ts, prev_value)) =
            previous.insert(row.key.as_str(), (row.timestamp, value))
        {
            let hours = (row.timestamp - prev_ts).num_milliseconds() as f64 / MILLIS_PER_HOUR;
            if hours <= 0.0 {
                continue;
            }
            let rate_per_hour = (value - prev_value) / hours;
            out.push(DerivedSample::new(
                row.timestamp,
                row.key.clone(),
                TrendPoint {
                    value,
                    rate_per_hour,
                    trend: Trend::from_rate(rate_per_hour),
                },
            ));
        }
    }

    out
}
