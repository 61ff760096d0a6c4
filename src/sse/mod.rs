//! HTTP event-stream transport.
//!
//! Requests arrive as JSON-RPC 2.0 envelopes on `POST /request` and are only
//! acknowledged there (`{"status":"request_accepted"}`). A single consumer
//! drains the queue in arrival order and broadcasts each response envelope
//! to every client subscribed on `GET /events`. Clients correlate responses
//! by `id`.
//!
//! Stream frames:
//! ```text
//! data: {"type":"connection","status":"connected","client_id":"..."}
//! data: {"type":"heartbeat"}
//! data: {"jsonrpc":"2.0","result":{...},"id":1}
//! event: close
//! data: {"reason":"server_shutdown"}
//! ```

pub mod broker;
pub mod server;

pub use broker::{Broker, Frame, Subscription};
pub use server::{dispatch, serve_sse, serve_sse_on, spawn_consumer, RpcMethod};
