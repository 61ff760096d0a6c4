//! HTTP plumbing shared by the socket, event-stream, and upload servers.

use axum::Json;
use axum::Router;
use serde_json::{json, Value};
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::{AppError, Result};

/// Bind `host:port` for the transport named `label`.
///
/// # Errors
///
/// Returns `AppError::Transport` if the address cannot be bound.
pub async fn bind(host: &str, port: u16, label: &str) -> Result<TcpListener> {
    let addr = format!("{host}:{port}");
    TcpListener::bind(&addr)
        .await
        .map_err(|err| AppError::Transport(format!("failed to bind {label} on {addr}: {err}")))
}

/// Serve `router` on `listener` until `ct` fires.
///
/// # Errors
///
/// Returns `AppError::Transport` if the server fails.
pub async fn run(
    listener: TcpListener,
    router: Router,
    ct: CancellationToken,
    label: &str,
) -> Result<()> {
    let addr = listener
        .local_addr()
        .map_err(|err| AppError::Transport(format!("{label} listener has no address: {err}")))?;
    info!(%addr, transport = label, "listening");

    axum::serve(listener, router)
        .with_graceful_shutdown(async move { ct.cancelled().await })
        .await
        .map_err(|err| AppError::Transport(format!("{label} server error: {err}")))?;

    info!(transport = label, "shut down");
    Ok(())
}

/// `GET /health`: liveness probe.
pub async fn health() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}
