//! Event-stream HTTP server, request queue, and consumer.

use std::convert::Infallible;
use std::sync::Arc;
use std::time::Duration;

use axum::body::Bytes;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::sse::{Event, Sse};
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use futures_util::stream::{self, Stream};
use serde_json::{json, Map, Value};
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, info_span, warn, Instrument};

use super::broker::{Broker, Frame, Subscription};
use crate::context::AppState;
use crate::gateway::{ToolGateway, ToolName, ToolResult};
use crate::rpc::{RpcRequest, RpcResponse, INTERNAL_ERROR, INVALID_PARAMS, METHOD_NOT_FOUND};
use crate::{http, AppError, Result};

/// Methods accepted on `POST /request`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RpcMethod {
    /// Run a debugger command: `{dump_path, command}`.
    ExecuteCommand,
    /// Invoke a tool: `{name, arguments}`.
    CallTool,
    /// Return the tool catalog.
    ListTools,
    /// Return the (empty) resource list.
    ListResources,
}

impl RpcMethod {
    /// Parse a method name.
    #[must_use]
    pub fn parse(method: &str) -> Option<Self> {
        match method {
            "execute_command" => Some(Self::ExecuteCommand),
            "call_tool" => Some(Self::CallTool),
            "list_tools" => Some(Self::ListTools),
            "list_resources" => Some(Self::ListResources),
            _ => None,
        }
    }
}

/// Map a pre-execution gateway rejection onto a JSON-RPC error code.
fn error_code(err: &AppError) -> i64 {
    match err {
        AppError::UnknownTool(_) => METHOD_NOT_FOUND,
        AppError::Validation(_) => INVALID_PARAMS,
        _ => INTERNAL_ERROR,
    }
}

/// `CallToolResult`-shaped JSON for a tool result.
fn call_result(result: &ToolResult) -> Value {
    json!({
        "content": [{ "type": "text", "text": result.text() }],
        "isError": result.is_error(),
    })
}

fn params_object(params: &Value) -> Option<Option<Map<String, Value>>> {
    match params {
        Value::Null => Some(None),
        Value::Object(map) => Some(Some(map.clone())),
        _ => None,
    }
}

/// Execute one queued request and build its response envelope.
pub async fn dispatch(gateway: &ToolGateway, request: &RpcRequest) -> RpcResponse {
    let id = request.id.clone();
    let Some(method) = RpcMethod::parse(&request.method) else {
        return RpcResponse::failure(
            id,
            METHOD_NOT_FOUND,
            format!("Unknown method: {}", request.method),
        );
    };

    let Some(params) = params_object(&request.params) else {
        return RpcResponse::failure(id, INVALID_PARAMS, "params must be an object");
    };

    let outcome = match method {
        RpcMethod::ListTools => {
            return RpcResponse::success(id, json!({ "tools": gateway.list_tools() }));
        }
        RpcMethod::ListResources => {
            return RpcResponse::success(id, json!({ "resources": [] }));
        }
        RpcMethod::ExecuteCommand => {
            gateway
                .call_named(ToolName::RunCommand.as_str(), params)
                .await
        }
        RpcMethod::CallTool => {
            let params = params.unwrap_or_default();
            let Some(name) = params.get("name").and_then(Value::as_str) else {
                return RpcResponse::failure(
                    id,
                    INVALID_PARAMS,
                    "missing required 'name' parameter",
                );
            };
            let arguments = match params.get("arguments") {
                None | Some(Value::Null) => None,
                Some(Value::Object(map)) => Some(map.clone()),
                Some(_) => {
                    return RpcResponse::failure(
                        id,
                        INVALID_PARAMS,
                        "'arguments' must be an object",
                    );
                }
            };
            gateway.call_named(name, arguments).await
        }
    };

    match outcome {
        Ok(result) => RpcResponse::success(id, call_result(&result)),
        Err(err) => RpcResponse::failure(id, error_code(&err), err.to_string()),
    }
}

/// Drain the request queue in arrival order, broadcasting each response.
///
/// On cancellation the broker is shut down so every stream receives its
/// close frame.
pub fn spawn_consumer(
    gateway: Arc<ToolGateway>,
    broker: Arc<Broker>,
    mut requests: mpsc::UnboundedReceiver<RpcRequest>,
    ct: CancellationToken,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        info!("event-stream consumer started");
        loop {
            let request = tokio::select! {
                () = ct.cancelled() => break,
                request = requests.recv() => match request {
                    Some(request) => request,
                    None => break,
                },
            };

            let span = info_span!("rpc_request", method = %request.method, id = %request.id);
            let response = dispatch(&gateway, &request).instrument(span).await;
            match serde_json::to_value(&response) {
                Ok(payload) => {
                    let delivered = broker.broadcast(&payload);
                    debug!(delivered, "response broadcast");
                }
                Err(err) => warn!(%err, "failed to serialize response"),
            }
        }
        broker.shutdown();
        info!("event-stream consumer stopped");
    })
}

/// Router state.
#[derive(Clone)]
struct SseState {
    broker: Arc<Broker>,
    queue: mpsc::UnboundedSender<RpcRequest>,
    heartbeat: Duration,
}

fn bad_request(message: &str) -> axum::response::Response {
    (StatusCode::BAD_REQUEST, Json(json!({ "error": message }))).into_response()
}

/// `POST /request`: validate and enqueue. Never carries the result.
async fn enqueue(State(state): State<SseState>, body: Bytes) -> axum::response::Response {
    let Ok(value) = serde_json::from_slice::<Value>(&body) else {
        return bad_request("Invalid JSON");
    };
    let Some(request) = RpcRequest::from_value(value) else {
        return bad_request("Invalid JSON-RPC request");
    };

    debug!(method = %request.method, id = %request.id, "request queued");
    if state.queue.send(request).is_err() {
        return (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(json!({ "error": "server shutting down" })),
        )
            .into_response();
    }
    Json(json!({ "status": "request_accepted" })).into_response()
}

/// `GET /events`: subscribe and stream frames.
async fn events(State(state): State<SseState>) -> impl IntoResponse {
    let subscription = state.broker.subscribe();
    Sse::new(event_stream(subscription, state.heartbeat))
}

struct StreamState {
    subscription: Subscription,
    heartbeat: tokio::time::Interval,
    greeting: Option<Value>,
    finished: bool,
}

/// Connection frame, then broadcasts interleaved with heartbeats, until the
/// broker closes the subscription.
fn event_stream(
    subscription: Subscription,
    every: Duration,
) -> impl Stream<Item = std::result::Result<Event, Infallible>> {
    let mut heartbeat = tokio::time::interval_at(Instant::now() + every, every);
    heartbeat.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let greeting = json!({
        "type": "connection",
        "status": "connected",
        "client_id": subscription.id().to_string(),
    });

    let state = StreamState {
        subscription,
        heartbeat,
        greeting: Some(greeting),
        finished: false,
    };

    stream::unfold(state, |mut state| async move {
        if state.finished {
            return None;
        }
        if let Some(greeting) = state.greeting.take() {
            return Some((Ok(Event::default().data(greeting.to_string())), state));
        }

        let frame = tokio::select! {
            frame = state.subscription.recv() => frame,
            _ = state.heartbeat.tick() => {
                Some(Frame::Data(Arc::from(json!({ "type": "heartbeat" }).to_string())))
            }
        };

        match frame {
            Some(Frame::Data(data)) => Some((Ok(Event::default().data(&*data)), state)),
            Some(Frame::Close(data)) => {
                state.finished = true;
                Some((Ok(Event::default().event("close").data(&*data)), state))
            }
            None => None,
        }
    })
}

/// Start the event-stream transport on the configured host and SSE port.
///
/// # Errors
///
/// Returns `AppError::Transport` if the listener cannot be bound.
pub async fn serve_sse(
    state: Arc<AppState>,
    ct: CancellationToken,
) -> Result<()> {
    let listener = http::bind(
        &state.config.server.host,
        state.config.server.sse_port,
        "event-stream",
    )
    .await?;
    serve_sse_on(listener, state, ct).await
}

/// Serve the event-stream transport on an already bound listener.
///
/// # Errors
///
/// Returns `AppError::Transport` if the server fails.
pub async fn serve_sse_on(
    listener: TcpListener,
    state: Arc<AppState>,
    ct: CancellationToken,
) -> Result<()> {
    let broker = Arc::new(Broker::new());
    let (queue, requests) = mpsc::unbounded_channel();
    let consumer_ct = ct.child_token();
    let consumer = spawn_consumer(
        Arc::clone(&state.gateway),
        Arc::clone(&broker),
        requests,
        consumer_ct.clone(),
    );

    let router = Router::new()
        .route("/request", post(enqueue))
        .route("/events", get(events))
        .route("/health", get(http::health))
        .with_state(SseState {
            broker,
            queue,
            heartbeat: state.config.heartbeat_interval(),
        });

    let outcome = http::run(listener, router, ct, "event-stream").await;

    consumer_ct.cancel();
    if let Err(err) = consumer.await {
        warn!(%err, "event-stream consumer task failed");
    }
    outcome
}
