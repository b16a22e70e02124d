//! HTTP listener with graceful shutdown.

use crate::db::ConnectionManager;
use crate::error::{AgentError, AgentResult};
use crate::http::{AppState, router};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::signal;
use tracing::{error, info, warn};

/// How long in-flight requests get after the first shutdown signal.
const GRACEFUL_TIMEOUT: Duration = Duration::from_secs(30);

/// Serve the agent until SIGINT/SIGTERM, then close the database pool.
pub async fn serve(
    state: AppState,
    connections: Arc<ConnectionManager>,
    bind_addr: &str,
) -> AgentResult<()> {
    let app = router(state);

    let listener = TcpListener::bind(bind_addr).await.map_err(|e| {
        AgentError::unknown(
            format!(
                "Failed to bind to {}: {}. Check that the port is available",
                bind_addr, e
            ),
            Some("BIND"),
        )
    })?;
    info!(addr = %bind_addr, "SQL agent listening");

    let shutdown_notify = Arc::new(tokio::sync::Notify::new());
    let shutdown_notify_clone = shutdown_notify.clone();
    let shutdown_signal = async move {
        wait_for_signal().await;
        shutdown_notify_clone.notify_one();
    };

    let server = axum::serve(listener, app).with_graceful_shutdown(shutdown_signal);

    tokio::select! {
        result = server => {
            match result {
                Ok(()) => info!("HTTP server stopped"),
                Err(e) => {
                    error!(error = %e, "HTTP server error");
                    return Err(AgentError::unknown(format!("HTTP server error: {}", e), None));
                }
            }
        }
        _ = async {
            shutdown_notify.notified().await;
            info!(
                timeout_secs = GRACEFUL_TIMEOUT.as_secs(),
                "Waiting for requests to finish (send signal again to force exit)..."
            );

            tokio::select! {
                _ = tokio::time::sleep(GRACEFUL_TIMEOUT) => {
                    warn!("Graceful shutdown timeout, forcing exit");
                }
                _ = wait_for_signal() => {
                    warn!("Received second signal, forcing immediate exit");
                }
            }
        } => {}
    }

    info!("Closing database connections");
    connections.close().await;
    Ok(())
}

/// Wait for SIGINT or SIGTERM.
async fn wait_for_signal() {
    let ctrl_c = signal::ctrl_c();

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received SIGINT"),
        _ = terminate => info!("Received SIGTERM"),
    }
}
