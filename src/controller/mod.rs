use anyhow::Result;
use chrono::Utc;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::analytics::{AnalyticsReport, WeatherAnalytics};
use crate::config::Config;
use crate::presentation::render_report;
use crate::simulation::WeatherSimulator;
use crate::sink::{SinkError, TelemetrySink};
use crate::store::InMemoryStore;

#[derive(Clone)]
pub struct AppState {
    pub cfg: Config,
    pub store: Arc<InMemoryStore>,
    pub sink: Arc<TelemetrySink>,
    pub analytics: Arc<WeatherAnalytics>,
}

impl AppState {
    pub fn new(cfg: Config) -> Self {
        let store = Arc::new(
            InMemoryStore::with_buckets(
                std::iter::once(cfg.store.bucket.clone())
                    .chain(cfg.analytics.rollup_bucket.clone())
                    .chain(cfg.analytics.alert_bucket.clone()),
            )
            .with_retention(cfg.store.retention()),
        );
        let sink = Arc::new(TelemetrySink::from_config(store.clone(), &cfg.store));
        let analytics = Arc::new(WeatherAnalytics::from_config(store.clone(), &cfg));
        Self {
            cfg,
            store,
            sink,
            analytics,
        }
    }

    /// A fresh simulator for the configured stations. Fails on configuration
    /// the simulator rejects.
    pub fn simulator(&self) -> Result<WeatherSimulator> {
        Ok(WeatherSimulator::new(
            self.cfg.simulation.clone(),
            self.cfg.stations.clone(),
        )?)
    }
}

/// Spawn the simulation loop, which takes ownership of `simulator`, and the
/// analytics loop when enabled. Both stop once `cancel` fires.
pub fn spawn_controller_tasks(
    state: AppState,
    simulator: WeatherSimulator,
    cancel: CancellationToken,
) -> Vec<JoinHandle<()>> {
    let mut handles = Vec::with_capacity(2);

    let simulation = SimulationLoop::new(simulator, state.sink.clone());
    let tick = state.cfg.simulation.tick_interval();
    let token = cancel.clone();
    handles.push(tokio::spawn(async move {
        let ticks = simulation.run(tick, token).await;
        info!(ticks, "simulation loop stopped");
    }));

    if state.cfg.analytics.enabled {
        let analytics = AnalyticsLoop::new(state.analytics.clone());
        let every = state.cfg.analytics.interval();
        handles.push(tokio::spawn(async move {
            analytics.run(every, cancel).await;
            info!("analytics loop stopped");
        }));
    }

    handles
}

/// Sole owner of the simulator state: tick, submit, wait
pub struct SimulationLoop {
    simulator: WeatherSimulator,
    sink: Arc<TelemetrySink>,
}

impl SimulationLoop {
    pub fn new(simulator: WeatherSimulator, sink: Arc<TelemetrySink>) -> Self {
        Self { simulator, sink }
    }

    /// Generate one tick and hand it to the sink
    pub async fn tick_once(&mut self) -> Result<usize, SinkError> {
        let readings = self.simulator.tick();
        self.sink.submit(&readings).await
    }

    /// Tick until cancelled; cancellation is only observed between ticks.
    /// A failed batch is logged and dropped. Returns the number of ticks run.
    pub async fn run(mut self, tick: std::time::Duration, cancel: CancellationToken) -> u64 {
        let mut interval = tokio::time::interval(tick);
        loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                _ = interval.tick() => {}
            }
            match self.tick_once().await {
                Ok(points) => debug!(points, bucket = self.sink.bucket(), "simulation tick"),
                Err(e) => warn!(error=%e, "simulation tick lost"),
            }
        }
        self.simulator.ticks()
    }
}

pub struct AnalyticsLoop {
    analytics: Arc<WeatherAnalytics>,
}

impl AnalyticsLoop {
    pub fn new(analytics: Arc<WeatherAnalytics>) -> Self {
        Self { analytics }
    }

    /// One pass at the current time; failed sections are already logged
    pub async fn analyze_once(&self) -> AnalyticsReport {
        let report = self.analytics.run_once(Utc::now()).await;
        info!(
            downsampled_rows = report.downsampled.len(),
            heat_index_samples = report.heat_index.len(),
            trend_points = report.trends.len(),
            correlation_samples = report.correlations.samples,
            alerts = report.alerts.len(),
            rolled_up = report.rolled_up,
            alerts_recorded = report.alerts_recorded,
            failures = report.failures.len(),
            "analytics pass"
        );
        for alert in &report.alerts {
            warn!(
                station_id = %alert.key,
                kind = %alert.value.kind,
                temperature = alert.value.value,
                threshold = alert.value.threshold,
                "extreme temperature"
            );
        }
        report
    }

    /// Run an analytics pass every `every` until cancelled
    pub async fn run(&self, every: std::time::Duration, cancel: CancellationToken) {
        let mut interval = tokio::time::interval(every);
        // the first tick fires immediately, before anything is written
        interval.tick().await;
        loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                _ = interval.tick() => {}
            }
            let report = self.analyze_once().await;
            let cfg = self.analytics.config();
            match render_report(&report, cfg.output, cfg.preview_rows) {
                Ok(text) => info!(report = %text, "analytics report"),
                Err(e) => warn!(error=%e, "report rendering failed"),
            }
        }
    }
}
