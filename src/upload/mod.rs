//! Dump upload endpoint.
//!
//! `POST /upload` takes a multipart body whose first field is `file` and
//! stores it under the upload directory with a collision-free name. The
//! returned absolute `file_path` can be handed straight to
//! `open_windbg_dump`.

pub mod server;

pub use server::{router, serve_upload, serve_upload_on, stored_name, DEFAULT_EXTENSION};
