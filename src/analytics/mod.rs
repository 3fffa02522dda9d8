//! Derived metrics over query frames.
//!
//! Every calculation here is a pure function of a [`Frame`](crate::store::Frame):
//! rows with missing cells are skipped, and an empty or malformed frame
//! yields an empty result. [`WeatherAnalytics`] wires them to the store.

pub mod alerts;
pub mod correlation;
pub mod engine;
pub mod heat_index;
pub mod trend;

pub use alerts::{detect_alerts, Alert, AlertKind, AlertThresholds};
pub use correlation::{correlation_matrix, Correlation, CorrelationMatrix, CORRELATION_FIELDS};
pub use engine::{AnalyticsReport, SectionFailure, WeatherAnalytics};
pub use heat_index::{heat_index, heat_index_frame, TemperatureScale};
pub use trend::{classify_trends, Trend, TrendPoint};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A computed value attached to the (timestamp, station) it was derived from
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DerivedSample<T> {
    pub timestamp: DateTime<Utc>,
    pub key: String,
    pub value: T,
}

impl<T> DerivedSample<T> {
    pub fn new(timestamp: DateTime<Utc>, key: impl Into<String>, value: T) -> Self {
        Self {
            timestamp,
            key: key.into(),
            value,
        }
    }
}
