use std::sync::Arc;
use std::time::Duration;

use tierserve::config::Config;
use tierserve::server::{listener, state::AppState};
use tracing_subscriber::EnvFilter;

const METRICS_REFRESH: Duration = Duration::from_secs(1);

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_target(false)
        .with_level(true)
        .init();

    let cfg = Config::load()?;
    let state = Arc::new(AppState::from_config(cfg)?);

    let metrics = Arc::clone(&state.metrics);
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(METRICS_REFRESH);
        loop {
            ticker.tick().await;
            metrics.refresh_system_metrics();
        }
    });

    tokio::select! {
        res = listener::run(Arc::clone(&state)) => {
            res?;
        }

        _ = tokio::signal::ctrl_c() => {
            tracing::info!("Shutdown signal received");
        }
    }

    Ok(())
}
