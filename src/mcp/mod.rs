//! Model Context Protocol server layer (stdio transport).

pub mod handler;
pub mod transport;
