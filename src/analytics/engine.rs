use chrono::{DateTime, Duration, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, warn};

use super::heat_index::{HUM_ALIAS, TEMP_ALIAS};
use super::{
    classify_trends, correlation_matrix, detect_alerts, heat_index_frame, Alert,
    CorrelationMatrix, DerivedSample, TrendPoint, CORRELATION_FIELDS,
};
use crate::config::{AnalyticsConfig, Config};
use crate::domain::{
    Field, FieldValue, Station, SENSOR_TYPE, TAG_LOCATION, TAG_SENSOR_TYPE, TAG_STATION_ID,
};
use crate::query::{AggregationQuery, JoinQuery, QueryExecutor};
use crate::store::{
    DataPoint, Frame, SeriesSelect, StoreError, TimeRange, TimeSeriesStore, Window,
};

/// Tag marking points written by the rollup job
pub const TAG_DOWNSAMPLED: &str = "downsampled";
/// Tag carrying the alert kind on recorded alerts
pub const TAG_ALERT: &str = "alert";

/// A section of an analytics pass that failed; the others still ran
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SectionFailure {
    pub section: String,
    pub error: String,
}

/// Everything one analytics pass produced
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalyticsReport {
    pub generated_at: DateTime<Utc>,
    pub downsampled: Frame,
    pub heat_index: Vec<DerivedSample<f64>>,
    pub trends: Vec<DerivedSample<TrendPoint>>,
    pub correlations: CorrelationMatrix,
    pub alerts: Vec<DerivedSample<Alert>>,
    /// Points written to the rollup bucket this pass
    pub rolled_up: usize,
    /// Alerts written to the alert bucket this pass
    pub alerts_recorded: usize,
    pub failures: Vec<SectionFailure>,
}

/// Runs the derived-metric queries against one raw bucket
pub struct WeatherAnalytics {
    executor: QueryExecutor,
    bucket: String,
    measurement: String,
    cfg: AnalyticsConfig,
    /// Station id to location, restoring tags the pivot drops
    locations: HashMap<String, String>,
}

impl WeatherAnalytics {
    pub fn new(
        executor: QueryExecutor,
        bucket: impl Into<String>,
        measurement: impl Into<String>,
        cfg: AnalyticsConfig,
    ) -> Self {
        Self {
            executor,
            bucket: bucket.into(),
            measurement: measurement.into(),
            cfg,
            locations: HashMap::new(),
        }
    }

    /// Tag written points with the location of these stations
    pub fn with_stations(mut self, stations: &[Station]) -> Self {
        self.locations = stations
            .iter()
            .map(|s| (s.id.clone(), s.location.clone()))
            .collect();
        self
    }

    pub fn from_config(store: Arc<dyn TimeSeriesStore>, cfg: &Config) -> Self {
        Self::new(
            QueryExecutor::new(store, cfg.store.query_timeout()),
            &cfg.store.bucket,
            &cfg.store.measurement,
            cfg.analytics.clone(),
        )
        .with_stations(&cfg.stations)
    }

    pub fn config(&self) -> &AnalyticsConfig {
        &self.cfg
    }

    fn lookback(&self, now: DateTime<Utc>) -> TimeRange {
        TimeRange::last(Duration::minutes(self.cfg.lookback_minutes), now)
    }

    /// A point carrying the same tags the station's raw readings do
    fn station_point(&self, timestamp: DateTime<Utc>, station_id: &str) -> DataPoint {
        let point = DataPoint::new(&self.measurement, timestamp)
            .tag(TAG_STATION_ID, station_id)
            .tag(TAG_SENSOR_TYPE, SENSOR_TYPE);
        match self.locations.get(station_id) {
            Some(location) => point.tag(TAG_LOCATION, location.as_str()),
            None => point,
        }
    }

    fn query(&self, range: TimeRange) -> AggregationQuery {
        AggregationQuery::new(&self.bucket, range).measurement(&self.measurement)
    }

    /// Temperature and humidity means per downsample window, empty windows omitted
    pub async fn downsampled(&self, now: DateTime<Utc>) -> Result<Frame, StoreError> {
        let request = self
            .query(self.lookback(now))
            .fields([Field::Temperature, Field::Humidity])
            .downsample(Duration::seconds(self.cfg.downsample_window_seconds))
            .build();
        self.executor.fetch(&request).await
    }

    /// Heat index for every (timestamp, station) carrying both inputs
    pub async fn heat_index(
        &self,
        now: DateTime<Utc>,
    ) -> Result<Vec<DerivedSample<f64>>, StoreError> {
        let range = TimeRange::last(Duration::minutes(self.cfg.heat_index_lookback_minutes), now);
        let request = JoinQuery::new(
            &self.bucket,
            range,
            SeriesSelect::new(Field::Temperature.as_ref(), TEMP_ALIAS),
            SeriesSelect::new(Field::Humidity.as_ref(), HUM_ALIAS),
        )
        .measurement(&self.measurement)
        .build();

        let frame = self.executor.fetch(&request).await?;
        Ok(heat_index_frame(&frame, self.cfg.heat_index_scale))
    }

    /// Hourly temperature trend per station
    pub async fn trends(
        &self,
        now: DateTime<Utc>,
    ) -> Result<Vec<DerivedSample<TrendPoint>>, StoreError> {
        let request = self
            .query(self.lookback(now))
            .field(Field::Temperature)
            .downsample(Duration::seconds(self.cfg.trend_window_seconds))
            .build();

        let frame = self.executor.fetch(&request).await?;
        Ok(classify_trends(&frame, Field::Temperature.as_ref()))
    }

    pub async fn correlations(&self, now: DateTime<Utc>) -> Result<CorrelationMatrix, StoreError> {
        let request = self
            .query(self.lookback(now))
            .fields(CORRELATION_FIELDS)
            .build();

        let frame = self.executor.fetch(&request).await?;
        let columns: Vec<&str> = CORRELATION_FIELDS.iter().map(|f| f.as_ref()).collect();
        Ok(correlation_matrix(&frame, &columns))
    }

    /// Extreme temperatures since the previous pass
    pub async fn alerts(
        &self,
        now: DateTime<Utc>,
    ) -> Result<Vec<DerivedSample<Alert>>, StoreError> {
        let span = Duration::seconds(self.cfg.every_seconds as i64);
        let request = self
            .query(TimeRange::last(span, now))
            .field(Field::Temperature)
            .build();

        let frame = self.executor.fetch(&request).await?;
        Ok(detect_alerts(
            &frame,
            Field::Temperature.as_ref(),
            self.cfg.thresholds(),
        ))
    }

    /// Write per-station means of the last complete rollup window to the
    /// rollup bucket. Returns the number of points written.
    pub async fn rollup(&self, now: DateTime<Utc>) -> Result<usize, StoreError> {
        let Some(target) = self.cfg.rollup_bucket.as_deref() else {
            return Ok(0);
        };
        let range = last_complete_window(now, self.cfg.rollup_window_seconds)?;
        let label = duration_label(self.cfg.rollup_window_seconds);

        let request = self
            .query(range)
            .fields(Field::all())
            .window(Window::every(range.stop - range.start))
            .build();
        let frame = self.executor.fetch(&request).await?;

        let points: Vec<DataPoint> = frame
            .rows
            .iter()
            .map(|row| {
                row.values.iter().fold(
                    self.station_point(row.timestamp, &row.key)
                        .tag(TAG_DOWNSAMPLED, label.as_str()),
                    |point, (field, value)| match value {
                        Some(v) => point.field(field.as_str(), FieldValue::Float(*v)),
                        None => point,
                    },
                )
            })
            .filter(|point| !point.fields.is_empty())
            .collect();

        if points.is_empty() {
            return Ok(0);
        }
        self.executor.store().write(target, &points).await?;
        debug!(bucket = target, points = points.len(), window = %label, "rollup written");
        Ok(points.len())
    }

    /// Write each alert to the alert bucket, tagged like its raw reading plus
    /// the alert kind. Returns the number of points written.
    pub async fn record_alerts(
        &self,
        alerts: &[DerivedSample<Alert>],
    ) -> Result<usize, StoreError> {
        let Some(target) = self.cfg.alert_bucket.as_deref() else {
            return Ok(0);
        };
        if alerts.is_empty() {
            return Ok(0);
        }

        let points: Vec<DataPoint> = alerts
            .iter()
            .map(|alert| {
                self.station_point(alert.timestamp, &alert.key)
                    .tag(TAG_ALERT, alert.value.kind.to_string())
                    .field(Field::Temperature.as_ref(), FieldValue::Float(alert.value.value))
                    .field("threshold", FieldValue::Float(alert.value.threshold))
            })
            .collect();

        self.executor.store().write(target, &points).await?;
        debug!(bucket = target, points = points.len(), "alerts recorded");
        Ok(points.len())
    }

    /// One full analytics pass. A failing section is logged and reported in
    /// `failures`; its result is left empty and the other sections still run.
    pub async fn run_once(&self, now: DateTime<Utc>) -> AnalyticsReport {
        let mut failures = Vec::new();

        let rolled_up = settle("rollup", self.rollup(now).await, &mut failures).unwrap_or(0);
        let downsampled =
            settle("downsampled", self.downsampled(now).await, &mut failures).unwrap_or_default();
        let heat_index =
            settle("heat_index", self.heat_index(now).await, &mut failures).unwrap_or_default();
        let trends = settle("trends", self.trends(now).await, &mut failures).unwrap_or_default();
        let correlations = settle("correlations", self.correlations(now).await, &mut failures)
            .unwrap_or_else(|| {
                let columns: Vec<&str> = CORRELATION_FIELDS.iter().map(|f| f.as_ref()).collect();
                correlation_matrix(&Frame::default(), &columns)
            });
        let alerts = settle("alerts", self.alerts(now).await, &mut failures).unwrap_or_default();
        let alerts_recorded =
            settle("alert_record", self.record_alerts(&alerts).await, &mut failures).unwrap_or(0);

        AnalyticsReport {
            generated_at: now,
            downsampled,
            heat_index,
            trends,
            correlations,
            alerts,
            rolled_up,
            alerts_recorded,
            failures,
        }
    }
}

fn settle<T>(
    section: &str,
    result: Result<T, StoreError>,
    failures: &mut Vec<SectionFailure>,
) -> Option<T> {
    match result {
        Ok(value) => Some(value),
        Err(e) => {
            warn!(section, error=%e, "analytics section failed");
            failures.push(SectionFailure {
                section: section.to_string(),
                error: e.to_string(),
            });
            None
        }
    }
}

/// The epoch-aligned window of `seconds` that ended most recently before `now`
fn last_complete_window(now: DateTime<Utc>, seconds: i64) -> Result<TimeRange, StoreError> {
    let stop = now.timestamp().div_euclid(seconds) * seconds;
    match (
        Utc.timestamp_opt(stop - seconds, 0).single(),
        Utc.timestamp_opt(stop, 0).single(),
    ) {
        (Some(start), Some(stop)) => Ok(TimeRange::new(start, stop)),
        _ => Err(StoreError::InvalidQuery(format!(
            "rollup window of {}s out of range at {}",
            seconds, now
        ))),
    }
}

/// Compact label for a window width: `90s`, `1m`, `1h`, `1d`
fn duration_label(seconds: i64) -> String {
    const UNITS: [(i64, &str); 3] = [(86_400, "d"), (3_600, "h"), (60, "m")];
    UNITS
        .iter()
        .find(|(size, _)| seconds % size == 0)
        .map(|(size, unit)| format!("{}{}", seconds / size, unit))
        .unwrap_or_else(|| format!("{}s", seconds))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analytics::{AlertKind, Correlation, Trend};
    use crate::domain::{Reading, Station, MEASUREMENT};
    use crate::store::{InMemoryStore, MockTimeSeriesStore, QueryRequest};
    use async_trait::async_trait;
    use rstest::rstest;

    const BUCKET: &str = "weather_metrics";
    const ROLLUP: &str = "weather_metrics_downsampled";
    const ALERTS: &str = "weather_alerts";

    fn ts(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(secs, 0).unwrap()
    }

    // 2023-11-14T22:00:00Z, on an hour boundary
    const HOUR0: i64 = 1_699_999_200;

    fn reading(station: &Station, secs: i64, temperature: f64, humidity: f64) -> Reading {
        let mut reading = Reading::for_station(station, ts(secs));
        reading.temperature = temperature;
        reading.humidity = humidity;
        reading.pressure = 1013.0 + temperature / 10.0;
        reading.wind_speed = humidity / 10.0;
        reading
    }

    async fn fill(store: &InMemoryStore, readings: &[Reading]) {
        let points: Vec<DataPoint> = readings
            .iter()
            .map(|r| DataPoint::from_reading(r, MEASUREMENT))
            .collect();
        store.write(BUCKET, &points).await.unwrap();
    }

    async fn seeded_store(readings: &[Reading]) -> Arc<InMemoryStore> {
        let store = Arc::new(InMemoryStore::with_buckets([BUCKET, ROLLUP]));
        fill(&store, readings).await;
        store
    }

    /// Serves queries from an in-memory store but rejects every write
    struct ReadOnlyStore(InMemoryStore);

    #[async_trait]
    impl TimeSeriesStore for ReadOnlyStore {
        async fn write(&self, _bucket: &str, _points: &[DataPoint]) -> Result<(), StoreError> {
            Err(StoreError::Transport("write rejected".to_string()))
        }

        async fn query(&self, request: &QueryRequest) -> Result<Frame, StoreError> {
            self.0.query(request).await
        }
    }

    fn analytics(store: Arc<dyn TimeSeriesStore>) -> WeatherAnalytics {
        WeatherAnalytics::from_config(store, &Config::default())
    }

    /// Two stations, one reading every 15 minutes for four hours
    fn four_hours() -> Vec<Reading> {
        let stations = Station::defaults();
        (0..16)
            .flat_map(|i| {
                let secs = HOUR0 + i * 900;
                let hour = (i / 4) as f64;
                vec![
                    reading(&stations[0], secs, 20.0 + hour, 50.0 + i as f64),
                    reading(&stations[1], secs, 35.0 - hour * 5.0, 40.0),
                ]
            })
            .collect()
    }

    #[tokio::test]
    async fn test_downsampled_view() {
        let store = seeded_store(&four_hours()).await;
        let frame = analytics(store).downsampled(ts(HOUR0 + 4 * 3600)).await.unwrap();

        // 4 hourly windows x 2 stations, labelled by window stop
        assert_eq!(frame.len(), 8);
        assert_eq!(frame.rows[0].timestamp, ts(HOUR0 + 3600));
        assert_eq!(frame.rows[0].key, "station_1");
        assert_eq!(frame.rows[0].get("temperature"), Some(20.0));
        assert_eq!(frame.rows[0].get("humidity"), Some(51.5));
    }

    #[tokio::test]
    async fn test_trends_over_hourly_means() {
        let store = seeded_store(&four_hours()).await;
        let trends = analytics(store).trends(ts(HOUR0 + 4 * 3600)).await.unwrap();

        assert_eq!(trends.len(), 6);
        for sample in &trends {
            let expected = if sample.key == "station_1" {
                Trend::Rising
            } else {
                Trend::Falling
            };
            assert_eq!(sample.value.trend, expected);
        }
    }

    #[tokio::test]
    async fn test_heat_index_uses_last_hour_only() {
        let store = seeded_store(&four_hours()).await;
        let now = ts(HOUR0 + 4 * 3600);
        let samples = analytics(store).heat_index(now).await.unwrap();

        // the last hour holds 4 readings per station
        assert_eq!(samples.len(), 8);
        let first = &samples[0];
        assert_eq!(first.key, "station_1");
        assert_eq!(first.value, crate::analytics::heat_index(23.0, 62.0));
    }

    #[tokio::test]
    async fn test_correlations_and_alerts() {
        let store = seeded_store(&four_hours()).await;
        let engine = analytics(store);
        let now = ts(HOUR0 + 4 * 3600);

        let matrix = engine.correlations(now).await.unwrap();
        assert_eq!(matrix.samples, 32);
        assert!(matches!(
            matrix.get("temperature", "pressure"),
            Some(Correlation::Defined(r)) if (r - 1.0).abs() < 1e-9
        ));

        // the first minute holds one reading per station
        let alerts = engine.alerts(ts(HOUR0 + 60)).await.unwrap();
        assert_eq!(alerts.len(), 1);
        assert_eq!(alerts[0].key, "station_2");
        assert_eq!(alerts[0].value.kind, AlertKind::High);
    }

    #[tokio::test]
    async fn test_rollup_writes_tagged_means() {
        let stations = Station::defaults();
        let store = seeded_store(&[
            reading(&stations[0], HOUR0 + 5, 20.0, 50.0),
            reading(&stations[0], HOUR0 + 35, 22.0, 54.0),
            reading(&stations[1], HOUR0 + 10, 30.0, 40.0),
            // next window, not complete yet
            reading(&stations[0], HOUR0 + 61, 99.0, 99.0),
        ])
        .await;

        let written = analytics(store.clone())
            .rollup(ts(HOUR0 + 90))
            .await
            .unwrap();
        assert_eq!(written, 2);

        let points = store.points(ROLLUP);
        assert_eq!(points.len(), 2);
        let first = points
            .iter()
            .find(|p| p.tag_value("station_id") == Some("station_1"))
            .unwrap();
        assert_eq!(first.tag_value("downsampled"), Some("1m"));
        assert_eq!(first.tag_value("location"), Some("New York"));
        assert_eq!(first.tag_value("sensor_type"), Some("weather_station"));
        assert_eq!(first.timestamp, ts(HOUR0 + 60));
        assert_eq!(first.field_value("temperature"), Some(21.0));
        assert_eq!(first.field_value("humidity"), Some(52.0));
        assert_eq!(first.field_value("latitude"), Some(40.7128));
    }

    #[tokio::test]
    async fn test_rollup_disabled() {
        let store = seeded_store(&four_hours()).await;
        let mut cfg = Config::default();
        cfg.analytics.rollup_bucket = None;
        let engine = WeatherAnalytics::from_config(store.clone(), &cfg);

        assert_eq!(engine.rollup(ts(HOUR0 + 120)).await.unwrap(), 0);
        assert_eq!(store.point_count(ROLLUP), 0);
    }

    #[tokio::test]
    async fn test_alerts_are_recorded() {
        let store = seeded_store(&four_hours()).await;
        let engine = analytics(store.clone());

        let alerts = engine.alerts(ts(HOUR0 + 60)).await.unwrap();
        assert_eq!(engine.record_alerts(&alerts).await.unwrap(), 1);

        let points = store.points(ALERTS);
        assert_eq!(points.len(), 1);
        let alert = &points[0];
        assert_eq!(alert.timestamp, ts(HOUR0));
        assert_eq!(alert.tag_value("station_id"), Some("station_2"));
        assert_eq!(alert.tag_value("location"), Some("Los Angeles"));
        assert_eq!(alert.tag_value("sensor_type"), Some("weather_station"));
        assert_eq!(alert.tag_value("alert"), Some("high"));
        assert_eq!(alert.field_value("temperature"), Some(35.0));
        assert_eq!(alert.field_value("threshold"), Some(30.0));
    }

    #[tokio::test]
    async fn test_alert_recording_disabled() {
        let store = seeded_store(&four_hours()).await;
        let mut cfg = Config::default();
        cfg.analytics.alert_bucket = None;
        let engine = WeatherAnalytics::from_config(store.clone(), &cfg);

        let alerts = engine.alerts(ts(HOUR0 + 60)).await.unwrap();
        assert_eq!(alerts.len(), 1);
        assert_eq!(engine.record_alerts(&alerts).await.unwrap(), 0);
        assert_eq!(store.point_count(ALERTS), 0);
    }

    #[tokio::test]
    async fn test_run_once_reports_each_failed_section() {
        let mut store = MockTimeSeriesStore::new();
        store
            .expect_query()
            .returning(|_| Err(StoreError::Transport("down".to_string())));
        store.expect_write().times(0);

        let report = analytics(Arc::new(store)).run_once(ts(HOUR0)).await;

        let sections: Vec<&str> = report.failures.iter().map(|f| f.section.as_str()).collect();
        assert_eq!(
            sections,
            vec!["rollup", "downsampled", "heat_index", "trends", "correlations", "alerts"]
        );
        assert!(report.failures[0].error.contains("down"));
        assert_eq!(report.correlations.len(), 4);
        assert_eq!(report.correlations.samples, 0);
    }

    #[tokio::test]
    async fn test_write_failure_keeps_query_results() {
        let inner = InMemoryStore::with_buckets([BUCKET]);
        fill(&inner, &four_hours()).await;
        let engine = analytics(Arc::new(ReadOnlyStore(inner)));

        let report = engine.run_once(ts(HOUR0 + 60)).await;

        let sections: Vec<&str> = report.failures.iter().map(|f| f.section.as_str()).collect();
        assert_eq!(sections, vec!["rollup", "alert_record"]);
        assert_eq!(report.rolled_up, 0);
        assert_eq!(report.alerts_recorded, 0);
        // only the readings at HOUR0 precede `now`
        assert_eq!(report.downsampled.len(), 2);
        assert_eq!(report.heat_index.len(), 2);
        assert_eq!(report.alerts.len(), 1);
    }

    #[tokio::test]
    async fn test_run_once_on_empty_store() {
        let store = Arc::new(InMemoryStore::with_buckets([BUCKET, ROLLUP]));
        let report = analytics(store).run_once(ts(HOUR0)).await;

        assert!(report.failures.is_empty());
        assert_eq!(report.alerts_recorded, 0);
        assert!(report.downsampled.is_empty());
        assert!(report.heat_index.is_empty());
        assert!(report.trends.is_empty());
        assert!(report.alerts.is_empty());
        assert_eq!(report.correlations.samples, 0);
        assert_eq!(report.rolled_up, 0);
    }

    #[rstest]
    #[case(30, "30s")]
    #[case(60, "1m")]
    #[case(90, "90s")]
    #[case(300, "5m")]
    #[case(3600, "1h")]
    #[case(86_400, "1d")]
    fn test_duration_label(#[case] seconds: i64, #[case] expected: &str) {
        assert_eq!(duration_label(seconds), expected);
    }

    #[test]
    fn test_last_complete_window() {
        let range = last_complete_window(ts(HOUR0 + 90), 60).unwrap();
        assert_eq!(range.start, ts(HOUR0));
        assert_eq!(range.stop, ts(HOUR0 + 60));
    }
}
