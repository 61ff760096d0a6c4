//! JSON-RPC 2.0 envelopes used by the event-stream transport.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Protocol version string carried by every envelope.
pub const JSONRPC_VERSION: &str = "2.0";

/// `Invalid params`.
pub const INVALID_PARAMS: i64 = -32602;
/// `Method not found`.
pub const METHOD_NOT_FOUND: i64 = -32601;
/// `Internal error`.
pub const INTERNAL_ERROR: i64 = -32603;

/// Inbound request envelope.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct RpcRequest {
    /// Always `"2.0"`.
    pub jsonrpc: String,
    /// Method name.
    #[serde(default)]
    pub method: String,
    /// Method parameters.
    #[serde(default)]
    pub params: Value,
    /// Correlation id echoed in the response.
    #[serde(default)]
    pub id: Value,
}

impl RpcRequest {
    /// Validate a raw JSON value as a JSON-RPC 2.0 request.
    ///
    /// Returns `None` unless `value` is an object whose `jsonrpc` member is
    /// exactly `"2.0"`.
    #[must_use]
    pub fn from_value(value: Value) -> Option<Self> {
        let is_v2 = value
            .as_object()
            .and_then(|obj| obj.get("jsonrpc"))
            .and_then(Value::as_str)
            == Some(JSONRPC_VERSION);
        if !is_v2 {
            return None;
        }
        serde_json::from_value(value).ok()
    }
}

/// Error member of a response envelope.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct RpcError {
    /// Numeric error code.
    pub code: i64,
    /// Human-readable message.
    pub message: String,
}

/// Outbound response envelope.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct RpcResponse {
    /// Always `"2.0"`.
    pub jsonrpc: String,
    /// Success payload.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    /// Failure payload.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<RpcError>,
    /// Correlation id from the request (`null` when unknown).
    pub id: Value,
}

impl RpcResponse {
    /// Success response for `id`.
    #[must_use]
    pub fn success(id: Value, result: Value) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION.to_owned(),
            result: Some(result),
            error: None,
            id,
        }
    }

    /// Error response for `id`.
    #[must_use]
    pub fn failure(id: Value, code: i64, message: impl Into<String>) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION.to_owned(),
            result: None,
            error: Some(RpcError {
                code,
                message: message.into(),
            }),
            id,
        }
    }
}
