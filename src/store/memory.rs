//! # In-Memory Store
//!
//! A process-local implementation of [`TimeSeriesStore`] with the same read
//! semantics the analytics pipeline relies on: half-open range filtering,
//! epoch-aligned mean windows that omit empty buckets unless asked not to,
//! pivoting by field and inner joins on (timestamp, key).

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use itertools::Itertools;
use parking_lot::RwLock;
use std::collections::{BTreeMap, HashMap};
use tracing::debug;

use super::{
    DataPoint, Frame, FrameRow, QueryRequest, SeriesSelect, StoreError, TimeRange,
    TimeSeriesStore, Window, WindowLabel,
};

/// Upper bound on windows materialised for a single series
const MAX_WINDOWS_PER_SERIES: i64 = 1_000_000;

/// Samples of one field, grouped by key tag value
type KeyedSamples = BTreeMap<String, Vec<(DateTime<Utc>, f64)>>;

#[derive(Debug, Default)]
pub struct InMemoryStore {
    buckets: RwLock<HashMap<String, Vec<DataPoint>>>,
    /// Points older than this, relative to the newest point of a write, are
    /// evicted on that write. `None` keeps everything.
    retention: Option<Duration>,
}

impl InMemoryStore {
    /// Create an empty store; buckets are created on first write
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_buckets<I, S>(buckets: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let store = Self::new();
        for bucket in buckets {
            store.create_bucket(bucket);
        }
        store
    }

    pub fn with_retention(mut self, retention: Duration) -> Self {
        self.retention = Some(retention);
        self
    }

    pub fn create_bucket(&self, bucket: impl Into<String>) {
        self.buckets.write().entry(bucket.into()).or_default();
    }

    pub fn point_count(&self, bucket: &str) -> usize {
        self.buckets.read().get(bucket).map_or(0, Vec::len)
    }

    /// Snapshot of every point in `bucket`, in write order
    pub fn points(&self, bucket: &str) -> Vec<DataPoint> {
        self.buckets.read().get(bucket).cloned().unwrap_or_default()
    }

    fn select(
        &self,
        bucket: &str,
        measurement: &str,
        range: &TimeRange,
    ) -> Result<Vec<DataPoint>, StoreError> {
        let buckets = self.buckets.read();
        let points = buckets
            .get(bucket)
            .ok_or_else(|| StoreError::UnknownBucket(bucket.to_string()))?;

        Ok(points
            .iter()
            .filter(|p| p.measurement == measurement && range.contains(p.timestamp))
            .cloned()
            .collect())
    }
}

#[async_trait]
impl TimeSeriesStore for InMemoryStore {
    async fn write(&self, bucket: &str, points: &[DataPoint]) -> Result<(), StoreError> {
        let mut buckets = self.buckets.write();
        let stored = buckets.entry(bucket.to_string()).or_default();
        stored.extend_from_slice(points);

        let horizon = self
            .retention
            .zip(points.iter().map(|p| p.timestamp).max())
            .map(|(retention, newest)| newest - retention);
        let evicted = match horizon {
            Some(horizon) => {
                let before = stored.len();
                stored.retain(|p| p.timestamp >= horizon);
                before - stored.len()
            }
            None => 0,
        };

        debug!(bucket, points = points.len(), evicted, "points stored");
        Ok(())
    }

    async fn query(&self, request: &QueryRequest) -> Result<Frame, StoreError> {
        let range = request.range();
        if range.start > range.stop {
            return Err(StoreError::InvalidQuery(format!(
                "range start {} is after stop {}",
                range.start, range.stop
            )));
        }

        match request {
            QueryRequest::Pivot {
                bucket,
                measurement,
                fields,
                window,
                key_tag,
                ..
            } => {
                let points = self.select(bucket, measurement, &range)?;
                pivot(&points, fields, window.as_ref(), key_tag, &range)
            }
            QueryRequest::Join {
                bucket,
                measurement,
                key_tag,
                left,
                right,
                ..
            } => {
                let points = self.select(bucket, measurement, &range)?;
                join(&points, left, right, key_tag, &range)
            }
        }
    }
}

/// Long-format samples of `field`, grouped by key; points without the key tag
/// or the field are skipped
fn extract(points: &[DataPoint], field: &str, key_tag: &str) -> KeyedSamples {
    points
        .iter()
        .filter_map(|p| {
            let key = p.tag_value(key_tag)?;
            let value = p.field_value(field)?;
            Some((key.to_string(), (p.timestamp, value)))
        })
        .into_group_map()
        .into_iter()
        .map(|(key, mut samples)| {
            samples.sort_by_key(|(t, _)| *t);
            (key, samples)
        })
        .collect()
}

/// Mean of each epoch-aligned window.
///
/// Windows without samples are omitted unless `create_empty` is set, in which
/// case every window overlapping the range is emitted with a `None` value.
fn aggregate(
    samples: &[(DateTime<Utc>, f64)],
    window: &Window,
    range: &TimeRange,
) -> Result<Vec<(DateTime<Utc>, Option<f64>)>, StoreError> {
    let every_ms = window.every.num_milliseconds();
    if every_ms <= 0 {
        return Err(StoreError::InvalidQuery(format!(
            "window must be positive, got {}",
            window.every
        )));
    }

    let mut buckets: BTreeMap<i64, (f64, usize)> = BTreeMap::new();
    for (t, v) in samples {
        let slot = buckets
            .entry(t.timestamp_millis().div_euclid(every_ms))
            .or_insert((0.0, 0));
        slot.0 += v;
        slot.1 += 1;
    }

    let range_start_ms = range.start.timestamp_millis();
    let range_stop_ms = range.stop.timestamp_millis();

    if window.create_empty && range_stop_ms > range_start_ms {
        let first = range_start_ms.div_euclid(every_ms);
        let last = (range_stop_ms - 1).div_euclid(every_ms);
        if last - first >= MAX_WINDOWS_PER_SERIES {
            return Err(StoreError::InvalidQuery(format!(
                "window of {} over {} yields too many buckets",
                window.every,
                range.stop - range.start
            )));
        }
        for index in first..=last {
            buckets.entry(index).or_insert((0.0, 0));
        }
    }

    Ok(buckets
        .into_iter()
        .filter_map(|(index, (sum, count))| {
            let start_ms = index * every_ms;
            let label_ms = match window.label {
                WindowLabel::Start => start_ms.max(range_start_ms),
                WindowLabel::Stop => (start_ms + every_ms).min(range_stop_ms),
            };
            let label = DateTime::from_timestamp_millis(label_ms)?;
            let mean = (count > 0).then(|| sum / count as f64);
            Some((label, mean))
        })
        .collect())
}

fn windowed(
    samples: &[(DateTime<Utc>, f64)],
    window: Option<&Window>,
    range: &TimeRange,
) -> Result<Vec<(DateTime<Utc>, Option<f64>)>, StoreError> {
    match window {
        Some(w) => aggregate(samples, w, range),
        None => Ok(samples.iter().map(|(t, v)| (*t, Some(*v))).collect()),
    }
}

fn pivot(
    points: &[DataPoint],
    fields: &[String],
    window: Option<&Window>,
    key_tag: &str,
    range: &TimeRange,
) -> Result<Frame, StoreError> {
    let mut rows: BTreeMap<(DateTime<Utc>, String), FrameRow> = BTreeMap::new();

    for field in fields {
        for (key, samples) in extract(points, field, key_tag) {
            for (t, value) in windowed(&samples, window, range)? {
                rows.entry((t, key.clone()))
                    .or_insert_with(|| FrameRow::new(t, key.clone()))
                    .set(field.clone(), value);
            }
        }
    }

    // Fields with no sample in a row surface as explicit nulls
    let rows = rows
        .into_values()
        .map(|mut row| {
            for field in fields {
                row.values.entry(field.clone()).or_insert(None);
            }
            row
        })
        .collect();

    Ok(Frame::new(key_tag, fields.to_vec()).with_rows(rows))
}

fn join(
    points: &[DataPoint],
    left: &SeriesSelect,
    right: &SeriesSelect,
    key_tag: &str,
    range: &TimeRange,
) -> Result<Frame, StoreError> {
    let side = |select: &SeriesSelect| -> Result<BTreeMap<(DateTime<Utc>, String), Option<f64>>, StoreError> {
        let mut cells = BTreeMap::new();
        for (key, samples) in extract(points, &select.field, key_tag) {
            for (t, value) in windowed(&samples, select.window.as_ref(), range)? {
                cells.insert((t, key.clone()), value);
            }
        }
        Ok(cells)
    };

    let left_cells = side(left)?;
    let right_cells = side(right)?;

    let rows = left_cells
        .into_iter()
        .filter_map(|((t, key), l)| {
            let r = right_cells.get(&(t, key.clone()))?;
            Some(
                FrameRow::new(t, key)
                    .with(left.alias.clone(), l)
                    .with(right.alias.clone(), *r),
            )
        })
        .collect();

    Ok(Frame::new(key_tag, vec![left.alias.clone(), right.alias.clone()]).with_rows(rows))
}
