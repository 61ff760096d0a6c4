#![forbid(unsafe_code)]

//! Crash-dump analysis gateway: exposes `cdb` debugger sessions as MCP tools
//! over stdio, WebSocket, and HTTP event-stream transports.

pub mod config;
pub mod context;
pub mod debugger;
pub mod errors;
pub mod gateway;
pub mod http;
pub mod mcp;
pub mod rpc;
pub mod session;
pub mod socket;
pub mod sse;
pub mod upload;

pub use config::GlobalConfig;
pub use errors::{AppError, Result};
