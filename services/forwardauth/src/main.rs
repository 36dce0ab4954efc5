//! Forward-Auth Service - Main Entry Point
//!
//! Serves the access check and trace-id endpoints with structured logging
//! and graceful shutdown.

use std::future::IntoFuture;

use forwardauth::app::{AppState, SERVICE_NAME, router};
use forwardauth::config::Config;
use forwardauth::shutdown::{run_with_drain_timeout, wait_for_signal};
use rust_common::{TracingConfig, init_tracing};
use tokio::net::TcpListener;
use tokio::sync::watch;
use tracing::{info, warn};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load configuration
    let config = Config::from_env()?;

    init_tracing(
        &TracingConfig::default()
            .with_service_name(SERVICE_NAME)
            .with_log_level(&config.log_level)
            .with_json_output(config.log_json),
    )?;

    info!(version = env!("CARGO_PKG_VERSION"), "Starting Forward-Auth Service");
    if config.uses_default_secret() {
        warn!("JWT_SECRET is not set, identity cookies are signed with the development default");
    }
    if config.github_oauth_authorize_url.is_none()
        || config.github_oauth_userinfo_endpoint.is_none()
    {
        warn!("OAuth endpoints are not configured, access checks will answer 500");
    }

    let bind_addr = config.bind_addr();
    let drain_timeout = config.shutdown_timeout();
    let state = AppState::from_config(config)?;

    let listener = TcpListener::bind(&bind_addr).await?;
    info!(addr = %listener.local_addr()?, "Forward-Auth Service listening");

    let (shutdown_tx, mut shutdown_rx) = watch::channel(false);
    let server = axum::serve(listener, router(state))
        .with_graceful_shutdown(async move {
            let _ = shutdown_rx.wait_for(|stopping| *stopping).await;
        })
        .into_future();
    let signal = async move {
        wait_for_signal().await;
        let _ = shutdown_tx.send(true);
    };

    run_with_drain_timeout(server, signal, drain_timeout).await;

    info!("Forward-Auth Service stopped");
    Ok(())
}
