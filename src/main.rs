//! thermo-gateway - Thermostat dashboard backend
//!
//! Serves the web dashboard for a remote thermostat controller: a
//! background poller keeps a cached snapshot of the device state fresh,
//! and a thin HTTP layer exposes the snapshot and forwards button
//! presses to the device.

mod api;
mod config;
mod device;
mod error;
mod models;

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use tower::ServiceBuilder;
use tower_http::{cors::CorsLayer, services::ServeDir, trace::TraceLayer};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::api::AppState;
use crate::device::{DeviceSync, HttpDeviceClient};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "thermo_gateway=info,tower_http=debug".into()),
        )
        .init();

    tracing::info!("Starting thermo-gateway...");

    // Load configuration
    let config = config::Config::load()?;
    tracing::info!("Configuration loaded (device at {})", config.device.api_base);

    // Fail fast: refuse to come up without a reachable device
    let client = Arc::new(HttpDeviceClient::new(
        config.device.api_base.clone(),
        Duration::from_millis(config.device.probe_timeout_ms),
    ));
    let sync = DeviceSync::connect(
        client,
        Duration::from_millis(config.device.refresh_interval_ms),
    )
    .await
    .with_context(|| format!("device at {} is unreachable", config.device.api_base))?;
    tracing::info!("Device probe succeeded");

    // Start the background refresh loop
    sync.start();

    // Build application router
    let state = AppState {
        sync: Arc::clone(&sync),
    };
    let cors = CorsLayer::permissive();

    let app = api::routes().with_state(state).layer(
        ServiceBuilder::new()
            .layer(TraceLayer::new_for_http())
            .layer(cors),
    );

    // Serve the static dashboard on unmatched paths when configured
    let app = match &config.server.static_dir {
        Some(dir) => {
            tracing::info!("Serving static dashboard from {}", dir);
            app.fallback_service(ServeDir::new(dir))
        }
        None => app,
    };

    // Start server
    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port)
        .parse()
        .with_context(|| "invalid server host/port")?;
    tracing::info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    // Cooperative shutdown: the refresh loop exits at its next iteration
    sync.stop();
    tracing::info!("Shutdown complete");

    Ok(())
}

/// Resolves on SIGINT or SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install SIGINT handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("Termination signal received");
}
