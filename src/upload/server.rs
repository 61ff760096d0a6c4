//! Upload HTTP server.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use axum::extract::multipart::Field;
use axum::extract::{DefaultBodyLimit, Multipart, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::json;
use tokio::fs::File;
use tokio::io::AsyncWriteExt;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use uuid::Uuid;

use crate::context::AppState;
use crate::{http, AppError, Result};

/// Extension given to uploads whose original name has none.
pub const DEFAULT_EXTENSION: &str = "dmp";

/// Generated storage name: a random UUID plus the original extension, or
/// [`DEFAULT_EXTENSION`] when there is none.
#[must_use]
pub fn stored_name(original: Option<&str>) -> String {
    let extension = original
        .and_then(|name| Path::new(name).extension())
        .and_then(|ext| ext.to_str())
        .filter(|ext| !ext.is_empty())
        .unwrap_or(DEFAULT_EXTENSION);
    format!("{}.{extension}", Uuid::new_v4())
}

#[derive(Clone)]
struct UploadState {
    upload_dir: Arc<PathBuf>,
}

/// Stored upload.
struct Saved {
    path: PathBuf,
    original_filename: Option<String>,
    saved_filename: String,
}

/// Build the upload router storing files in `upload_dir`.
pub fn router(upload_dir: PathBuf, max_upload_bytes: usize) -> Router {
    Router::new()
        .route("/upload", post(upload))
        .route("/health", get(http::health))
        .layer(DefaultBodyLimit::max(max_upload_bytes))
        .with_state(UploadState {
            upload_dir: Arc::new(upload_dir),
        })
}

fn failure(status: StatusCode, message: impl Into<String>) -> Response {
    (
        status,
        Json(json!({ "success": false, "error": message.into() })),
    )
        .into_response()
}

/// `POST /upload`.
async fn upload(State(state): State<UploadState>, mut multipart: Multipart) -> Response {
    let field = match multipart.next_field().await {
        Ok(Some(field)) if field.name() == Some("file") => field,
        Ok(_) => return failure(StatusCode::BAD_REQUEST, "Expected field 'file'"),
        Err(err) => {
            warn!(%err, "malformed multipart body");
            return failure(
                StatusCode::BAD_REQUEST,
                format!("malformed multipart body: {err}"),
            );
        }
    };

    match save_field(&state.upload_dir, field).await {
        Ok(saved) => {
            info!(
                path = %saved.path.display(),
                original = saved.original_filename.as_deref().unwrap_or("<none>"),
                "dump uploaded"
            );
            Json(json!({
                "success": true,
                "file_path": saved.path.display().to_string(),
                "original_filename": saved.original_filename,
                "saved_filename": saved.saved_filename,
            }))
            .into_response()
        }
        Err(err) => {
            warn!(%err, "upload failed");
            failure(StatusCode::INTERNAL_SERVER_ERROR, err.to_string())
        }
    }
}

/// Stream `field` to disk. The partial file is removed on any failure.
async fn save_field(upload_dir: &Path, mut field: Field<'_>) -> Result<Saved> {
    let original_filename = field.file_name().map(str::to_owned);
    let saved_filename = stored_name(original_filename.as_deref());
    let path = upload_dir.join(&saved_filename);

    let mut file = File::create(&path)
        .await
        .map_err(|err| AppError::Upload(format!("cannot create {}: {err}", path.display())))?;

    let written = async {
        let mut total: u64 = 0;
        while let Some(chunk) = field
            .chunk()
            .await
            .map_err(|err| AppError::Upload(format!("failed reading upload: {err}")))?
        {
            file.write_all(&chunk).await?;
            total += chunk.len() as u64;
        }
        file.flush().await?;
        Ok::<u64, AppError>(total)
    }
    .await;

    match written {
        Ok(bytes) => {
            info!(bytes, file = %saved_filename, "upload stored");
            Ok(Saved {
                path,
                original_filename,
                saved_filename,
            })
        }
        Err(err) => {
            drop(file);
            if let Err(remove_err) = tokio::fs::remove_file(&path).await {
                warn!(%remove_err, path = %path.display(), "failed to remove partial upload");
            }
            Err(err)
        }
    }
}

/// Start the upload server on the configured host and upload port.
///
/// # Errors
///
/// Returns `AppError::Transport` if the listener cannot be bound.
pub async fn serve_upload(state: Arc<AppState>, ct: CancellationToken) -> Result<()> {
    let listener = http::bind(
        &state.config.server.host,
        state.config.server.upload_port,
        "upload",
    )
    .await?;
    serve_upload_on(listener, state, ct).await
}

/// Serve uploads on an already bound listener.
///
/// # Errors
///
/// Returns `AppError::Transport` if the server fails.
pub async fn serve_upload_on(
    listener: TcpListener,
    state: Arc<AppState>,
    ct: CancellationToken,
) -> Result<()> {
    let router = router(
        state.config.server.upload_dir.clone(),
        state.config.server.max_upload_bytes,
    );
    http::run(listener, router, ct, "upload").await
}
