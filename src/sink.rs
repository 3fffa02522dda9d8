//! Telemetry sink: turns one tick's readings into one store write.
//!
//! Delivery is best-effort and at-most-once per tick. A failed or timed-out
//! batch is reported to the caller and dropped; nothing is retried or carried
//! over to the next tick.

use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::debug;

use crate::config::StoreConfig;
use crate::domain::Reading;
use crate::store::{DataPoint, StoreError, TimeSeriesStore};

#[derive(Debug, Error)]
pub enum SinkError {
    #[error("batch of {points} points to '{bucket}' lost: {source}")]
    BatchLost {
        bucket: String,
        points: usize,
        #[source]
        source: StoreError,
    },
}

pub struct TelemetrySink {
    store: Arc<dyn TimeSeriesStore>,
    bucket: String,
    measurement: String,
    timeout: Duration,
}

impl TelemetrySink {
    pub fn new(
        store: Arc<dyn TimeSeriesStore>,
        bucket: impl Into<String>,
        measurement: impl Into<String>,
        timeout: Duration,
    ) -> Self {
        Self {
            store,
            bucket: bucket.into(),
            measurement: measurement.into(),
            timeout,
        }
    }

    pub fn from_config(store: Arc<dyn TimeSeriesStore>, cfg: &StoreConfig) -> Self {
        Self::new(store, &cfg.bucket, &cfg.measurement, cfg.write_timeout())
    }

    pub fn bucket(&self) -> &str {
        &self.bucket
    }

    /// Write all readings of one tick as a single batch.
    ///
    /// Returns the number of points written. On error the delivery state of
    /// the batch is unknown.
    pub async fn submit(&self, readings: &[Reading]) -> Result<usize, SinkError> {
        if readings.is_empty() {
            return Ok(0);
        }

        let points: Vec<DataPoint> = readings
            .iter()
            .map(|r| DataPoint::from_reading(r, &self.measurement))
            .collect();

        let outcome = tokio::time::timeout(self.timeout, self.store.write(&self.bucket, &points))
            .await
            .unwrap_or(Err(StoreError::Timeout(self.timeout)));

        match outcome {
            Ok(()) => {
                debug!(bucket = %self.bucket, points = points.len(), "batch written");
                Ok(points.len())
            }
            Err(source) => Err(SinkError::BatchLost {
                bucket: self.bucket.clone(),
                points: points.len(),
                source,
            }),
        }
    }
}
