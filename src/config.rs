use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::time::Duration;
use thiserror::Error;
use validator::Validate;

use crate::analytics::{AlertThresholds, TemperatureScale};
use crate::domain::Station;
use crate::presentation::OutputFormat;

const DEFAULT_CONFIG_PATH: &str = "config/default.toml";
const ENV_PREFIX: &str = "WXSIM__";

/// Configuration errors are fatal: the simulation loop never starts with one.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to load configuration: {0}")]
    Load(#[from] figment::Error),

    #[error("invalid configuration: {0}")]
    Invalid(#[from] validator::ValidationErrors),

    #[error("inconsistent configuration: {0}")]
    Inconsistent(String),
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct Config {
    #[validate(nested)]
    pub simulation: SimulationConfig,
    #[validate(length(min = 1, message = "at least one station is required"), nested)]
    pub stations: Vec<Station>,
    #[validate(nested)]
    pub store: StoreConfig,
    #[validate(nested)]
    pub analytics: AnalyticsConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            simulation: SimulationConfig::default(),
            stations: Station::defaults(),
            store: StoreConfig::default(),
            analytics: AnalyticsConfig::default(),
        }
    }
}

/// Per-field magnitudes, used for both jitter and drift
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, Validate)]
pub struct Magnitudes {
    #[validate(range(min = 0.0, max = 50.0))]
    pub temperature: f64,
    #[validate(range(min = 0.0, max = 50.0))]
    pub humidity: f64,
    #[validate(range(min = 0.0, max = 50.0))]
    pub pressure: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ValueRange {
    pub min: f64,
    pub max: f64,
}

impl ValueRange {
    pub const fn new(min: f64, max: f64) -> Self {
        Self { min, max }
    }

    fn is_well_formed(&self) -> bool {
        self.min.is_finite() && self.max.is_finite() && self.min <= self.max
    }
}

/// Ranges the initial baselines are drawn from
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct InitialRanges {
    pub temperature: ValueRange,
    pub humidity: ValueRange,
    pub pressure: ValueRange,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct SimulationConfig {
    #[validate(range(min = 1, max = 86400))]
    pub tick_seconds: u64,
    /// Fixed seed for reproducible runs (None = OS entropy)
    pub seed: Option<u64>,
    #[validate(nested)]
    pub jitter: Magnitudes,
    #[validate(nested)]
    pub drift: Magnitudes,
    pub initial: InitialRanges,
    #[validate(range(min = 0.0, max = 100.0))]
    pub wind_speed_max: f64,
    #[validate(range(min = 0.0, max = 1.0))]
    pub precipitation_probability: f64,
    /// Exclusive upper bound of a precipitation draw
    #[validate(range(min = 1, max = 1000))]
    pub precipitation_max: u32,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            tick_seconds: 1,
            seed: None,
            jitter: Magnitudes {
                temperature: 2.0,
                humidity: 5.0,
                pressure: 1.0,
            },
            drift: Magnitudes {
                temperature: 0.1,
                humidity: 0.2,
                pressure: 0.1,
            },
            initial: InitialRanges {
                temperature: ValueRange::new(15.0, 25.0),
                humidity: ValueRange::new(40.0, 60.0),
                pressure: ValueRange::new(1010.0, 1020.0),
            },
            wind_speed_max: 20.0,
            precipitation_probability: 0.3,
            precipitation_max: 5,
        }
    }
}

impl SimulationConfig {
    pub fn tick_interval(&self) -> Duration {
        Duration::from_secs(self.tick_seconds)
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    /// Validate this section on its own, as the simulator does on construction
    pub fn check(&self) -> Result<(), ConfigError> {
        self.validate()?;

        // NaN slips past the range rules above; it would panic in the first tick
        for (name, value) in [
            ("jitter.temperature", self.jitter.temperature),
            ("jitter.humidity", self.jitter.humidity),
            ("jitter.pressure", self.jitter.pressure),
            ("drift.temperature", self.drift.temperature),
            ("drift.humidity", self.drift.humidity),
            ("drift.pressure", self.drift.pressure),
            ("wind_speed_max", self.wind_speed_max),
            ("precipitation_probability", self.precipitation_probability),
        ] {
            if !value.is_finite() {
                return Err(ConfigError::Inconsistent(format!(
                    "simulation.{} must be a finite number (got {})",
                    name, value
                )));
            }
        }

        for (name, range) in [
            ("temperature", self.initial.temperature),
            ("humidity", self.initial.humidity),
            ("pressure", self.initial.pressure),
        ] {
            if !range.is_well_formed() {
                return Err(ConfigError::Inconsistent(format!(
                    "initial {} range must be finite with min <= max (got {}..{})",
                    name, range.min, range.max
                )));
            }
        }
        Ok(())
    }
}

/// Stations must be non-empty, individually valid and uniquely named
pub fn check_stations(stations: &[Station]) -> Result<(), ConfigError> {
    if stations.is_empty() {
        return Err(ConfigError::Inconsistent(
            "at least one station is required".to_string(),
        ));
    }

    let mut seen = HashSet::new();
    for station in stations {
        station.validate()?;
        if !seen.insert(station.id.as_str()) {
            return Err(ConfigError::Inconsistent(format!(
                "duplicate station id: {}",
                station.id
            )));
        }
    }
    Ok(())
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct StoreConfig {
    #[validate(length(min = 1))]
    pub bucket: String,
    #[validate(length(min = 1))]
    pub measurement: String,
    #[validate(range(min = 1, max = 600000))]
    pub write_timeout_ms: u64,
    #[validate(range(min = 1, max = 600000))]
    pub query_timeout_ms: u64,
    /// How long raw and derived points are kept; must cover every analytics lookback
    #[validate(range(min = 1))]
    pub retention_minutes: i64,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            bucket: "weather_metrics".to_string(),
            measurement: crate::domain::MEASUREMENT.to_string(),
            write_timeout_ms: 5_000,
            query_timeout_ms: 30_000,
            retention_minutes: 24 * 60,
        }
    }
}

impl StoreConfig {
    pub fn write_timeout(&self) -> Duration {
        Duration::from_millis(self.write_timeout_ms)
    }

    pub fn query_timeout(&self) -> Duration {
        Duration::from_millis(self.query_timeout_ms)
    }

    pub fn retention(&self) -> chrono::Duration {
        chrono::Duration::minutes(self.retention_minutes)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct AnalyticsConfig {
    pub enabled: bool,
    #[validate(range(min = 1))]
    pub every_seconds: u64,
    /// How far back the downsample, trend and correlation queries look
    #[validate(range(min = 1))]
    pub lookback_minutes: i64,
    /// How far back the heat index query looks
    #[validate(range(min = 1))]
    pub heat_index_lookback_minutes: i64,
    #[validate(range(min = 1))]
    pub downsample_window_seconds: i64,
    #[validate(range(min = 1))]
    pub trend_window_seconds: i64,
    pub heat_index_scale: TemperatureScale,
    pub alert_low: f64,
    pub alert_high: f64,
    /// Target bucket for rollups (None disables the rollup job)
    pub rollup_bucket: Option<String>,
    #[validate(range(min = 1))]
    pub rollup_window_seconds: i64,
    /// Target bucket for alerts (None disables recording)
    pub alert_bucket: Option<String>,
    pub output: OutputFormat,
    #[validate(range(min = 1, max = 1000))]
    pub preview_rows: usize,
}

impl Default for AnalyticsConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            every_seconds: 60,
            lookback_minutes: 24 * 60,
            heat_index_lookback_minutes: 60,
            downsample_window_seconds: 3600,
            trend_window_seconds: 3600,
            heat_index_scale: TemperatureScale::Fahrenheit,
            alert_low: 0.0,
            alert_high: 30.0,
            rollup_bucket: Some("weather_metrics_downsampled".to_string()),
            rollup_window_seconds: 60,
            alert_bucket: Some("weather_alerts".to_string()),
            output: OutputFormat::Table,
            preview_rows: 5,
        }
    }
}

impl AnalyticsConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.every_seconds)
    }

    pub fn thresholds(&self) -> AlertThresholds {
        AlertThresholds {
            low: self.alert_low,
            high: self.alert_high,
        }
    }
}

impl Config {
    /// Load `config/default.toml` and `WXSIM__` environment overrides on top of
    /// the built-in defaults, then validate.
    pub fn load() -> Result<Self, ConfigError> {
        let figment = Figment::from(Serialized::defaults(Config::default()))
            .merge(Toml::file(DEFAULT_CONFIG_PATH))
            .merge(Env::prefixed(ENV_PREFIX).split("__"));
        Self::from_figment(figment)
    }

    pub fn from_figment(figment: Figment) -> Result<Self, ConfigError> {
        let cfg: Config = figment.extract()?;
        cfg.validate_all()?;
        Ok(cfg)
    }

    /// Field-level rules plus the cross-field checks derive can't express
    pub fn validate_all(&self) -> Result<(), ConfigError> {
        self.validate()?;
        self.simulation.check()?;
        check_stations(&self.stations)?;

        if !(self.analytics.alert_low < self.analytics.alert_high) {
            return Err(ConfigError::Inconsistent(format!(
                "alert_low ({}) must be below alert_high ({})",
                self.analytics.alert_low, self.analytics.alert_high
            )));
        }

        let lookback = self
            .analytics
            .lookback_minutes
            .max(self.analytics.heat_index_lookback_minutes);
        if self.store.retention_minutes < lookback {
            return Err(ConfigError::Inconsistent(format!(
                "store.retention_minutes ({}) must cover the analytics lookback ({})",
                self.store.retention_minutes, lookback
            )));
        }

        if matches!(&self.analytics.rollup_bucket, Some(b) if b == &self.store.bucket) {
            return Err(ConfigError::Inconsistent(
                "rollup_bucket must differ from the raw bucket".to_string(),
            ));
        }

        if let Some(alerts) = &self.analytics.alert_bucket {
            if alerts == &self.store.bucket || Some(alerts) == self.analytics.rollup_bucket.as_ref() {
                return Err(ConfigError::Inconsistent(
                    "alert_bucket must differ from the raw and rollup buckets".to_string(),
                ));
            }
        }

        Ok(())
    }
}
