//! WebSocket transport for concurrent remote clients.
//!
//! ## Protocol
//!
//! Request (one JSON object per text frame):
//! ```json
//! {"type": "list_tools"}
//! {"type": "call_tool", "name": "run_windbg_cmd", "arguments": {"dump_path": "...", "command": "kb"}}
//! ```
//!
//! Response (exactly one per request):
//! ```json
//! {"type": "tools", "tools": [ ... ]}
//! {"type": "result", "result": [{"type": "text", "text": "..."}]}
//! {"type": "error", "error": "..."}
//! ```

pub mod server;

pub use server::{handle_message, serve_socket, serve_socket_on, SocketResponse, TextContent};
