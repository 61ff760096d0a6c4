//! Stdio transport for a single local MCP client.

use std::sync::Arc;

use rmcp::service::ServiceExt;
use rmcp::transport::stdio;
use tokio_util::sync::CancellationToken;
use tracing::info;

use super::handler::WindbgServer;
use crate::context::AppState;
use crate::{AppError, Result};

/// Serve MCP over stdin/stdout until the client disconnects or the
/// cancellation token fires.
///
/// # Errors
///
/// Returns `AppError::Transport` if the transport fails to initialize.
pub async fn serve_stdio(state: Arc<AppState>, ct: CancellationToken) -> Result<()> {
    let server = WindbgServer::new(state);
    let transport = stdio();

    info!("starting stdio MCP transport");
    let service = server
        .serve_with_ct(transport, ct)
        .await
        .map_err(|err| AppError::Transport(format!("stdio transport failed: {err}")))?;

    service
        .waiting()
        .await
        .map_err(|err| AppError::Transport(format!("stdio service error: {err}")))?;

    info!("stdio MCP transport shut down");
    Ok(())
}
