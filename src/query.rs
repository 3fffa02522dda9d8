//! Aggregation query builder.
//!
//! Builds the read requests the analytics pipeline issues: filtered,
//! optionally downsampled and pivoted frames, and two-field inner joins.
//! [`QueryExecutor`] runs them against the store with a timeout.

use chrono::Duration;
use std::sync::Arc;
use tracing::debug;

use crate::domain::{Field, MEASUREMENT, TAG_STATION_ID};
use crate::store::{
    Frame, QueryRequest, SeriesSelect, StoreError, TimeRange, TimeSeriesStore, Window,
};

/// Pivoted read over a set of fields
#[derive(Debug, Clone)]
pub struct AggregationQuery {
    bucket: String,
    measurement: String,
    range: TimeRange,
    fields: Vec<String>,
    window: Option<Window>,
    key_tag: String,
}

impl AggregationQuery {
    pub fn new(bucket: impl Into<String>, range: TimeRange) -> Self {
        Self {
            bucket: bucket.into(),
            measurement: MEASUREMENT.to_string(),
            range,
            fields: Vec::new(),
            window: None,
            key_tag: TAG_STATION_ID.to_string(),
        }
    }

    pub fn measurement(mut self, measurement: impl Into<String>) -> Self {
        self.measurement = measurement.into();
        self
    }

    pub fn field(mut self, field: Field) -> Self {
        self.fields.push(field.to_string());
        self
    }

    pub fn fields(mut self, fields: impl IntoIterator<Item = Field>) -> Self {
        self.fields
            .extend(fields.into_iter().map(|f| f.to_string()));
        self
    }

    /// Average within fixed windows, omitting windows with no samples
    pub fn downsample(self, every: Duration) -> Self {
        self.window(Window::every(every))
    }

    pub fn window(mut self, window: Window) -> Self {
        self.window = Some(window);
        self
    }

    pub fn build(self) -> QueryRequest {
        QueryRequest::Pivot {
            bucket: self.bucket,
            measurement: self.measurement,
            range: self.range,
            fields: self.fields,
            window: self.window,
            key_tag: self.key_tag,
        }
    }
}

/// Inner join of two independently filtered and renamed fields
#[derive(Debug, Clone)]
pub struct JoinQuery {
    bucket: String,
    measurement: String,
    range: TimeRange,
    key_tag: String,
    left: SeriesSelect,
    right: SeriesSelect,
}

impl JoinQuery {
    pub fn new(
        bucket: impl Into<String>,
        range: TimeRange,
        left: SeriesSelect,
        right: SeriesSelect,
    ) -> Self {
        Self {
            bucket: bucket.into(),
            measurement: MEASUREMENT.to_string(),
            range,
            key_tag: TAG_STATION_ID.to_string(),
            left,
            right,
        }
    }

    pub fn measurement(mut self, measurement: impl Into<String>) -> Self {
        self.measurement = measurement.into();
        self
    }

    pub fn build(self) -> QueryRequest {
        QueryRequest::Join {
            bucket: self.bucket,
            measurement: self.measurement,
            range: self.range,
            key_tag: self.key_tag,
            left: self.left,
            right: self.right,
        }
    }
}

/// Runs read requests against the store
#[derive(Clone)]
pub struct QueryExecutor {
    store: Arc<dyn TimeSeriesStore>,
    timeout: std::time::Duration,
}

impl QueryExecutor {
    pub fn new(store: Arc<dyn TimeSeriesStore>, timeout: std::time::Duration) -> Self {
        Self { store, timeout }
    }

    pub fn store(&self) -> &Arc<dyn TimeSeriesStore> {
        &self.store
    }

    /// Fetch a frame; a timeout is reported like any other store failure
    pub async fn fetch(&self, request: &QueryRequest) -> Result<Frame, StoreError> {
        let frame = tokio::time::timeout(self.timeout, self.store.query(request))
            .await
            .unwrap_or(Err(StoreError::Timeout(self.timeout)))?;
        debug!(
            bucket = request.bucket(),
            rows = frame.len(),
            "query returned"
        );
        Ok(frame)
    }
}
