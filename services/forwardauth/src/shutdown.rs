//! Graceful Shutdown Module
//!
//! Signal handling for the HTTP server's graceful drain.

use std::future::Future;
use std::time::Duration;

use tokio::signal;
use tracing::{error, info, warn};

/// Waits for SIGTERM or SIGINT
pub async fn wait_for_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            info!("Received Ctrl+C, initiating shutdown");
        }
        () = terminate => {
            info!("Received SIGTERM, initiating shutdown");
        }
    }
}

/// Runs a server future until it finishes, giving it at most `drain_timeout`
/// after `shutdown` resolves.
///
/// `server` is expected to begin draining when `shutdown` resolves (as
/// `axum::serve(..).with_graceful_shutdown(..)` does); requests still in flight
/// when the timeout expires are abandoned.
pub async fn run_with_drain_timeout<F, E, Sig>(server: F, shutdown: Sig, drain_timeout: Duration)
where
    F: Future<Output = Result<(), E>>,
    E: std::fmt::Display,
    Sig: Future<Output = ()>,
{
    tokio::pin!(server);
    tokio::pin!(shutdown);

    tokio::select! {
        result = &mut server => {
            log_server_exit(result);
            return;
        }
        () = &mut shutdown => {
            info!(timeout_secs = drain_timeout.as_secs(), "Draining in-flight requests");
        }
    }

    match tokio::time::timeout(drain_timeout, server).await {
        Ok(result) => log_server_exit(result),
        Err(_) => warn!("Shutdown timeout reached, abandoning remaining requests"),
    }
}

fn log_server_exit<E: std::fmt::Display>(result: Result<(), E>) {
    match result {
        Ok(()) => info!("Server stopped normally"),
        Err(e) => error!(error = %e, "Server error"),
    }
}
