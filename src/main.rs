use anyhow::{Context, Result};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use weather_telemetry::{config, controller, telemetry};

use config::Config;
use telemetry::init_tracing;

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    init_tracing();

    let cfg = Config::load().context("invalid configuration")?;
    let app_state = controller::AppState::new(cfg.clone());
    let simulator = app_state.simulator()?;

    info!(
        stations = cfg.stations.len(),
        tick_seconds = cfg.simulation.tick_seconds,
        bucket = %cfg.store.bucket,
        analytics = cfg.analytics.enabled,
        "starting weather telemetry simulator"
    );

    let cancel = CancellationToken::new();
    let handles = controller::spawn_controller_tasks(app_state, simulator, cancel.clone());

    telemetry::shutdown_signal().await;
    cancel.cancel();
    for handle in handles {
        if let Err(e) = handle.await {
            warn!(error=%e, "task ended abnormally");
        }
    }

    warn!("shutdown complete");
    Ok(())
}
