use anyhow::Result;
use peak_demand_forecaster::{api, config, controller, telemetry};
use config::Config;
use telemetry::init_tracing;
use tracing::{info, warn};

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();

    let cfg = Config::load()?;
    let state = controller::AppState::new(cfg.clone())?;

    // Warm the default session so configuration problems surface at startup
    match state.context(controller::DEFAULT_SESSION).await {
        Ok(ctx) => info!(
            rows = ctx.observations().len(),
            quality = ?ctx.models_report().quality,
            "default session ready"
        ),
        Err(e) => warn!(error = %e, "default session could not be loaded, will retry on request"),
    }

    let app = api::router(state, &cfg);
    let addr = cfg.server.socket_addr()?;

    if cfg.server.host == "0.0.0.0" {
        warn!("binding to 0.0.0.0, the API is reachable from the network");
    }

    info!(%addr, "starting peak demand forecaster");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(telemetry::shutdown_signal())
        .await?;

    warn!("shutdown complete");
    Ok(())
}
