use std::path::PathBuf;
use std::time::Duration;

use mcp_windbg::{config::GlobalConfig, AppError};

fn sample_toml(upload_dir: &str) -> String {
    format!(
        r#"
cdb_path = 'C:\Debuggers\cdb.exe'
symbols_path = "srv*C:\\symbols*https://msdl.microsoft.com/download/symbols"
dumps_dir = 'D:\dumps'

[session]
command_timeout_seconds = 45
load_timeout_seconds = 90
idle_timeout_seconds = 600
verbose = true

[server]
host = "127.0.0.1"
socket_port = 9000
upload_port = 9001
sse_port = 9002
upload_dir = '{upload_dir}'
heartbeat_seconds = 10
max_upload_bytes = 1048576
"#
    )
}

#[test]
fn parses_full_config() {
    let config = GlobalConfig::from_toml_str(&sample_toml("/srv/uploads")).expect("valid config");

    assert_eq!(config.cdb_path, Some(PathBuf::from(r"C:\Debuggers\cdb.exe")));
    assert_eq!(
        config.symbols_path.as_deref(),
        Some(r"srv*C:\symbols*https://msdl.microsoft.com/download/symbols")
    );
    assert_eq!(config.dumps_dir, Some(PathBuf::from(r"D:\dumps")));
    assert_eq!(config.command_timeout(), Duration::from_secs(45));
    assert_eq!(config.load_timeout(), Duration::from_secs(90));
    assert_eq!(config.idle_timeout(), Some(Duration::from_secs(600)));
    assert!(config.session.verbose);
    assert_eq!(config.server.host, "127.0.0.1");
    assert_eq!(config.server.socket_port, 9000);
    assert_eq!(config.server.upload_port, 9001);
    assert_eq!(config.server.sse_port, 9002);
    assert_eq!(config.server.upload_dir, PathBuf::from("/srv/uploads"));
    assert_eq!(config.heartbeat_interval(), Duration::from_secs(10));
    assert_eq!(config.server.max_upload_bytes, 1_048_576);
}

#[test]
fn empty_config_uses_defaults() {
    let config = GlobalConfig::from_toml_str("").expect("defaults are valid");

    assert_eq!(config, GlobalConfig::default());
    assert_eq!(config.command_timeout(), Duration::from_secs(30));
    assert_eq!(config.idle_timeout(), Some(Duration::from_secs(1800)));
    assert_eq!(config.server.host, "0.0.0.0");
    assert_eq!(config.server.socket_port, 8765);
    assert_eq!(config.server.upload_port, 8766);
    assert_eq!(config.server.sse_port, 8767);
    assert_eq!(config.server.upload_dir, PathBuf::from("./uploads"));
    assert_eq!(config.heartbeat_interval(), Duration::from_secs(30));
    assert!(config.cdb_path.is_none());
}

#[test]
fn zero_command_timeout_is_rejected() {
    let result = GlobalConfig::from_toml_str("[session]\ncommand_timeout_seconds = 0\n");
    assert!(matches!(result, Err(AppError::Config(ref msg)) if msg.contains("command_timeout_seconds")));
}

#[test]
fn zero_load_timeout_is_rejected() {
    let result = GlobalConfig::from_toml_str("[session]\nload_timeout_seconds = 0\n");
    assert!(matches!(result, Err(AppError::Config(_))));
}

#[test]
fn zero_heartbeat_is_rejected() {
    let result = GlobalConfig::from_toml_str("[server]\nheartbeat_seconds = 0\n");
    assert!(matches!(result, Err(AppError::Config(_))));
}

#[test]
fn malformed_toml_is_a_config_error() {
    let result = GlobalConfig::from_toml_str("[session\ncommand_timeout_seconds = 5");
    assert!(matches!(result, Err(AppError::Config(ref msg)) if msg.starts_with("invalid config")));
}

#[test]
fn wrong_value_type_is_a_config_error() {
    let result = GlobalConfig::from_toml_str("[server]\nsocket_port = \"eight\"\n");
    assert!(matches!(result, Err(AppError::Config(_))));
}

#[test]
fn load_from_missing_file_fails() {
    let result = GlobalConfig::load_from_path("/no/such/mcp-windbg/config.toml");
    assert!(matches!(result, Err(AppError::Config(ref msg)) if msg.starts_with("failed to read config")));
}

#[test]
fn load_from_file_round_trips() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("config.toml");
    std::fs::write(&path, sample_toml("/srv/uploads")).expect("write config");

    let config = GlobalConfig::load_from_path(&path).expect("load config");
    assert_eq!(config.server.socket_port, 9000);
}

#[test]
fn prepare_upload_dir_creates_absolute_directory() {
    let dir = tempfile::tempdir().expect("tempdir");
    let mut config = GlobalConfig::default();
    config.server.upload_dir = dir.path().join("nested").join("uploads");

    config.prepare_upload_dir().expect("create upload dir");

    assert!(config.server.upload_dir.is_absolute());
    assert!(config.server.upload_dir.is_dir());
}

#[test]
fn prepare_upload_dir_resolves_relative_spellings() {
    let dir = tempfile::tempdir().expect("tempdir");
    std::fs::create_dir(dir.path().join("a")).expect("mkdir");
    let mut config = GlobalConfig::default();
    config.server.upload_dir = dir.path().join("a").join("..").join("uploads");

    config.prepare_upload_dir().expect("create upload dir");

    let expected = dunce::canonicalize(dir.path().join("uploads")).expect("canonical");
    assert_eq!(config.server.upload_dir, expected);
    assert!(!config
        .server
        .upload_dir
        .to_string_lossy()
        .starts_with(r"\\?\"));
}

#[test]
fn configured_symbols_path_is_not_overridden() {
    let mut config = GlobalConfig {
        symbols_path: Some("srv*local".into()),
        ..GlobalConfig::default()
    };
    config.apply_environment();
    assert_eq!(config.symbols_path.as_deref(), Some("srv*local"));
}
