//! WebSocket server: per-connection request loop and message dispatch.

use std::sync::Arc;

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::response::Response;
use axum::routing::get;
use axum::Router;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, info_span, warn, Instrument};

use crate::context::AppState;
use crate::gateway::{ToolDescriptor, ToolGateway};
use crate::{http, Result};

/// Inbound request frame.
#[derive(Debug, Deserialize)]
struct SocketRequest {
    /// Request kind: `list_tools` or `call_tool`.
    #[serde(rename = "type", default)]
    kind: Option<String>,
    /// Tool name (for `call_tool`).
    #[serde(default)]
    name: Option<String>,
    /// Tool arguments (for `call_tool`).
    #[serde(default)]
    arguments: Option<Map<String, Value>>,
}

/// One text block of a tool result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TextContent {
    /// Always `text`.
    #[serde(rename = "type")]
    pub kind: String,
    /// Block contents.
    pub text: String,
}

impl TextContent {
    /// Text block holding `text`.
    #[must_use]
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            kind: "text".to_owned(),
            text: text.into(),
        }
    }
}

/// Outbound response frame.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SocketResponse {
    /// Reply to `list_tools`.
    Tools {
        /// The tool catalog.
        tools: Vec<ToolDescriptor>,
    },
    /// Reply to `call_tool`.
    Result {
        /// Result content blocks.
        result: Vec<TextContent>,
    },
    /// Any rejected request.
    Error {
        /// Failure description.
        error: String,
    },
}

impl SocketResponse {
    fn error(message: impl Into<String>) -> Self {
        Self::Error {
            error: message.into(),
        }
    }
}

/// Router state: shared app state plus the server's shutdown token.
#[derive(Clone)]
struct SocketState {
    app: Arc<AppState>,
    ct: CancellationToken,
}

/// Handle one request frame and produce its single response.
pub async fn handle_message(gateway: &ToolGateway, text: &str) -> SocketResponse {
    let request = match serde_json::from_str::<SocketRequest>(text) {
        Ok(request) => request,
        Err(err) => return SocketResponse::error(format!("invalid request: {err}")),
    };

    match request.kind.as_deref() {
        Some("list_tools") => SocketResponse::Tools {
            tools: gateway.list_tools(),
        },
        Some("call_tool") => {
            let Some(name) = request.name else {
                return SocketResponse::error("missing required 'name' field");
            };
            match gateway.call_named(&name, request.arguments).await {
                Ok(result) => SocketResponse::Result {
                    result: vec![TextContent::text(result.text())],
                },
                Err(err) => SocketResponse::error(err.to_string()),
            }
        }
        other => SocketResponse::error(format!(
            "Unknown request type: {}",
            other.unwrap_or("<missing>")
        )),
    }
}

/// Build the WebSocket router (upgrade on `/`).
fn router(app: Arc<AppState>, ct: CancellationToken) -> Router {
    Router::new()
        .route("/", get(upgrade))
        .with_state(SocketState { app, ct })
}

async fn upgrade(ws: WebSocketUpgrade, State(state): State<SocketState>) -> Response {
    ws.on_upgrade(move |socket| handle_connection(socket, state))
}

/// Serve requests on one connection until the client leaves or the server
/// shuts down. Faults in one request are answered with an error frame and
/// never close the connection.
async fn handle_connection(mut socket: WebSocket, state: SocketState) {
    let span = info_span!("socket_conn", conn_id = %uuid::Uuid::new_v4());
    async move {
        info!("socket client connected");
        loop {
            let message = tokio::select! {
                () = state.ct.cancelled() => break,
                message = socket.recv() => message,
            };

            let response = match message {
                None => break,
                Some(Err(err)) => {
                    warn!(%err, "socket read error");
                    break;
                }
                Some(Ok(Message::Text(text))) => {
                    handle_message(&state.app.gateway, text.as_str()).await
                }
                Some(Ok(Message::Binary(_))) => {
                    SocketResponse::error("binary frames are not supported")
                }
                Some(Ok(Message::Close(_))) => break,
                Some(Ok(Message::Ping(_) | Message::Pong(_))) => continue,
            };

            let payload = serde_json::to_string(&response).unwrap_or_else(|_| {
                r#"{"type":"error","error":"serialization failed"}"#.to_owned()
            });
            debug!(bytes = payload.len(), "sending socket response");

            if let Err(err) = socket.send(Message::Text(payload.into())).await {
                warn!(%err, "failed to write socket response");
                break;
            }
        }
        info!("socket connection closed");
    }
    .instrument(span)
    .await;
}

/// Start the WebSocket transport on the configured host and socket port.
///
/// # Errors
///
/// Returns `AppError::Transport` if the listener cannot be bound.
pub async fn serve_socket(state: Arc<AppState>, ct: CancellationToken) -> Result<()> {
    let listener = http::bind(
        &state.config.server.host,
        state.config.server.socket_port,
        "websocket",
    )
    .await?;
    serve_socket_on(listener, state, ct).await
}

/// Serve the WebSocket transport on an already bound listener.
///
/// # Errors
///
/// Returns `AppError::Transport` if the server fails.
pub async fn serve_socket_on(
    listener: TcpListener,
    state: Arc<AppState>,
    ct: CancellationToken,
) -> Result<()> {
    let router = router(state, ct.clone());
    http::run(listener, router, ct, "websocket").await
}
