//! End-to-end tests for the upload ingestor.

use std::path::Path;

use serde_json::{json, Value};
use tokio_util::sync::CancellationToken;

use mcp_windbg::upload::serve_upload_on;

use super::test_helpers::{test_config, test_state, FakeLauncher};

const BOUNDARY: &str = "mcp-windbg-test-boundary";

async fn spawn_server(upload_dir: &Path) -> (String, CancellationToken) {
    let mut config = test_config(None);
    config.server.upload_dir = upload_dir.to_path_buf();
    config.server.max_upload_bytes = 64 * 1024;
    let state = test_state(config, FakeLauncher::new());

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind ephemeral");
    let addr = listener.local_addr().expect("local addr");
    let ct = CancellationToken::new();

    let server_ct = ct.clone();
    tokio::spawn(async move {
        let _ = serve_upload_on(listener, state, server_ct).await;
    });
    (format!("http://{addr}"), ct)
}

/// Single-part multipart body.
fn multipart(field: &str, filename: &str, contents: &[u8]) -> Vec<u8> {
    let mut body = format!(
        "--{BOUNDARY}\r\n\
         Content-Disposition: form-data; name=\"{field}\"; filename=\"{filename}\"\r\n\
         Content-Type: application/octet-stream\r\n\r\n"
    )
    .into_bytes();
    body.extend_from_slice(contents);
    body.extend_from_slice(format!("\r\n--{BOUNDARY}--\r\n").as_bytes());
    body
}

async fn upload(base_url: &str, body: Vec<u8>) -> reqwest::Response {
    reqwest::Client::new()
        .post(format!("{base_url}/upload"))
        .header(
            "content-type",
            format!("multipart/form-data; boundary={BOUNDARY}"),
        )
        .body(body)
        .send()
        .await
        .expect("POST /upload")
}

#[tokio::test]
async fn stores_file_under_generated_name() {
    let dir = tempfile::tempdir().unwrap();
    let (base_url, ct) = spawn_server(dir.path()).await;

    let response = upload(&base_url, multipart("file", "crash.mdmp", b"MDMP-bytes")).await;
    assert_eq!(response.status(), 200);
    let body: Value = response.json().await.unwrap();

    assert_eq!(body["success"], true);
    assert_eq!(body["original_filename"], "crash.mdmp");
    let saved = body["saved_filename"].as_str().unwrap();
    assert!(saved.ends_with(".mdmp"));
    assert_ne!(saved, "crash.mdmp");

    let stored = Path::new(body["file_path"].as_str().unwrap());
    assert!(stored.is_absolute());
    assert_eq!(stored, dir.path().join(saved));
    assert_eq!(std::fs::read(stored).unwrap(), b"MDMP-bytes");
    ct.cancel();
}

#[tokio::test]
async fn missing_extension_defaults_to_dmp() {
    let dir = tempfile::tempdir().unwrap();
    let (base_url, ct) = spawn_server(dir.path()).await;

    let body: Value = upload(&base_url, multipart("file", "crash", b"x"))
        .await
        .json()
        .await
        .unwrap();

    assert_eq!(body["success"], true);
    assert!(body["saved_filename"].as_str().unwrap().ends_with(".dmp"));
    ct.cancel();
}

#[tokio::test]
async fn same_name_uploads_do_not_collide() {
    let dir = tempfile::tempdir().unwrap();
    let (base_url, ct) = spawn_server(dir.path()).await;

    let first: Value = upload(&base_url, multipart("file", "a.dmp", b"one"))
        .await
        .json()
        .await
        .unwrap();
    let second: Value = upload(&base_url, multipart("file", "a.dmp", b"two"))
        .await
        .json()
        .await
        .unwrap();

    assert_ne!(first["file_path"], second["file_path"]);
    assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 2);
    ct.cancel();
}

#[tokio::test]
async fn wrong_field_name_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let (base_url, ct) = spawn_server(dir.path()).await;

    let response = upload(&base_url, multipart("dump", "a.dmp", b"x")).await;

    assert_eq!(response.status(), 400);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["success"], false);
    assert_eq!(body["error"], "Expected field 'file'");
    assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    ct.cancel();
}

#[tokio::test]
async fn oversized_upload_fails_and_leaves_no_partial_file() {
    let dir = tempfile::tempdir().unwrap();
    let (base_url, ct) = spawn_server(dir.path()).await;

    let body = multipart("file", "big.dmp", &vec![7u8; 128 * 1024]);
    let sent = reqwest::Client::new()
        .post(format!("{base_url}/upload"))
        .header(
            "content-type",
            format!("multipart/form-data; boundary={BOUNDARY}"),
        )
        .body(body)
        .send()
        .await;

    // The server may answer before the body is fully sent, which some
    // clients surface as a connection error instead of the response.
    if let Ok(response) = sent {
        assert!(!response.status().is_success());
    }
    tokio::time::sleep(std::time::Duration::from_millis(100)).await;
    assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    ct.cancel();
}

#[tokio::test]
async fn health_reports_ok() {
    let dir = tempfile::tempdir().unwrap();
    let (base_url, ct) = spawn_server(dir.path()).await;

    let body: Value = reqwest::get(format!("{base_url}/health"))
        .await
        .unwrap()
        .json()
        .await
        .unwrap();

    assert_eq!(body, json!({ "status": "ok" }));
    ct.cancel();
}
