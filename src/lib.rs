pub mod api;
pub mod config;
pub mod db;
pub mod entities;
pub mod services;
pub mod state;

use anyhow::Context;
use tokio::signal;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

pub use config::Config;

pub async fn run() -> anyhow::Result<()> {
    let config = Config::load()?;
    config.validate()?;

    let prometheus_handle = if config.observability.metrics_enabled {
        use metrics_exporter_prometheus::PrometheusBuilder;
        let builder = PrometheusBuilder::new();
        let handle = builder
            .install_recorder()
            .context("Failed to install Prometheus recorder")?;
        info!("Prometheus metrics recorder initialized");
        Some(handle)
    } else {
        None
    };

    use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.general.log_level));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer())
        .init();

    let port = config.server.port;

    let state = api::create_app_state_from_config(config, prometheus_handle).await?;
    let app = api::router(state).await;

    let addr = format!("0.0.0.0:{}", port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    info!("🌐 Server running at http://{}", addr);

    let server_handle = tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, app).await {
            error!("Web server error: {}", e);
        }
    });

    match signal::ctrl_c().await {
        Ok(()) => {
            info!("Shutdown signal received");
        }
        Err(e) => {
            error!("Error listening for shutdown: {}", e);
        }
    }

    server_handle.abort();
    info!("Server stopped");

    Ok(())
}
