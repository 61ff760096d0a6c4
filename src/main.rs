#![forbid(unsafe_code)]

//! `mcp-windbg`: crash-dump analysis MCP server binary.
//!
//! Bootstraps configuration and starts either the local stdio transport or
//! the remote WebSocket, upload, and event-stream servers.

use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, ValueEnum};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};
use tracing_subscriber::{fmt, EnvFilter};

use mcp_windbg::config::GlobalConfig;
use mcp_windbg::context::AppState;
use mcp_windbg::debugger::cdb::CdbLauncher;
use mcp_windbg::mcp::transport;
use mcp_windbg::session::reaper;
use mcp_windbg::{socket, sse, upload};
use mcp_windbg::{AppError, Result};

#[derive(Debug, Copy, Clone, Eq, PartialEq, ValueEnum)]
enum LogFormat {
    Text,
    Json,
}

#[derive(Debug, Copy, Clone, Eq, PartialEq, ValueEnum)]
enum Mode {
    /// Single client over stdin/stdout.
    Local,
    /// WebSocket, upload, and optional event-stream servers.
    Remote,
}

#[derive(Debug, Parser)]
#[command(name = "mcp-windbg", about = "WinDBG crash-dump analysis MCP server", version, long_about = None)]
struct Cli {
    /// Path to an optional TOML configuration file.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Custom path to cdb.exe.
    #[arg(long)]
    cdb_path: Option<PathBuf>,

    /// Symbol search path (defaults to `_NT_SYMBOL_PATH`).
    #[arg(long)]
    symbols_path: Option<String>,

    /// Command timeout in seconds.
    #[arg(long)]
    timeout: Option<u64>,

    /// Log every debugger command at info level.
    #[arg(long)]
    verbose: bool,

    /// Server mode.
    #[arg(long, value_enum, default_value_t = Mode::Local)]
    mode: Mode,

    /// Also serve the HTTP event-stream transport in remote mode.
    #[arg(long)]
    use_sse: bool,

    /// Bind address for the remote servers.
    #[arg(long)]
    host: Option<String>,

    /// WebSocket port.
    #[arg(long)]
    port: Option<u16>,

    /// Upload server port.
    #[arg(long)]
    upload_port: Option<u16>,

    /// Event-stream server port.
    #[arg(long)]
    sse_port: Option<u16>,

    /// Directory where uploaded dumps are stored.
    #[arg(long)]
    upload_dir: Option<PathBuf>,

    /// Log output format (text or json).
    #[arg(long, value_enum, default_value_t = LogFormat::Text)]
    log_format: LogFormat,
}

impl Cli {
    /// Apply command-line overrides on top of the file configuration.
    fn apply(&self, config: &mut GlobalConfig) {
        if let Some(ref path) = self.cdb_path {
            config.cdb_path = Some(path.clone());
        }
        if let Some(ref symbols) = self.symbols_path {
            config.symbols_path = Some(symbols.clone());
        }
        if let Some(timeout) = self.timeout {
            config.session.command_timeout_seconds = timeout;
        }
        if self.verbose {
            config.session.verbose = true;
        }
        if let Some(ref host) = self.host {
            config.server.host.clone_from(host);
        }
        if let Some(port) = self.port {
            config.server.socket_port = port;
        }
        if let Some(port) = self.upload_port {
            config.server.upload_port = port;
        }
        if let Some(port) = self.sse_port {
            config.server.sse_port = port;
        }
        if let Some(ref dir) = self.upload_dir {
            config.server.upload_dir = dir.clone();
        }
    }
}

fn main() -> Result<()> {
    let args = Cli::parse();
    init_tracing(args.log_format, args.verbose)?;
    info!("mcp-windbg server bootstrap");

    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .map_err(|err| AppError::Config(format!("failed to build tokio runtime: {err}")))?
        .block_on(run(args))
}

async fn run(args: Cli) -> Result<()> {
    // ── Load configuration ──────────────────────────────
    let mut config = match args.config {
        Some(ref path) => GlobalConfig::load_from_path(path)?,
        None => GlobalConfig::default(),
    };
    args.apply(&mut config);
    config.apply_environment();
    config.validate()?;
    if args.mode == Mode::Remote {
        config.prepare_upload_dir()?;
    }

    let config = Arc::new(config);
    info!(
        cdb = %config.resolved_cdb_path().display(),
        timeout_s = config.session.command_timeout_seconds,
        "configuration loaded"
    );

    // ── Build shared application state ──────────────────
    let state = Arc::new(AppState::new(Arc::clone(&config), Arc::new(CdbLauncher)));
    let ct = CancellationToken::new();

    let mut handles: Vec<JoinHandle<()>> = Vec::new();
    if let Some(max_idle) = config.idle_timeout() {
        handles.push(reaper::spawn_idle_reaper(
            Arc::clone(&state.registry),
            max_idle,
            ct.clone(),
        ));
        info!(idle_s = max_idle.as_secs(), "idle session reaper started");
    }

    // ── Start transports ────────────────────────────────
    match args.mode {
        Mode::Local => {
            tokio::select! {
                outcome = transport::serve_stdio(Arc::clone(&state), ct.clone()) => {
                    if let Err(err) = outcome {
                        error!(%err, "stdio transport failed");
                    }
                }
                () = shutdown_signal() => info!("shutdown signal received"),
            }
        }
        Mode::Remote => {
            handles.push(spawn_transport("upload", {
                let (state, ct) = (Arc::clone(&state), ct.clone());
                async move { upload::serve_upload(state, ct).await }
            }));
            handles.push(spawn_transport("websocket", {
                let (state, ct) = (Arc::clone(&state), ct.clone());
                async move { socket::serve_socket(state, ct).await }
            }));
            if args.use_sse {
                handles.push(spawn_transport("event-stream", {
                    let (state, ct) = (Arc::clone(&state), ct.clone());
                    async move { sse::serve_sse(state, ct).await }
                }));
            }
            info!(
                host = %config.server.host,
                socket_port = config.server.socket_port,
                upload_port = config.server.upload_port,
                sse = args.use_sse,
                "remote servers ready"
            );

            shutdown_signal().await;
            info!("shutdown signal received");
        }
    }

    // ── Shutdown ────────────────────────────────────────
    ct.cancel();
    state.shutdown().await;

    for handle in handles {
        if let Err(err) = handle.await {
            error!(%err, "background task failed to join");
        }
    }
    info!("mcp-windbg shut down");

    Ok(())
}

fn spawn_transport<F>(name: &'static str, serve: F) -> JoinHandle<()>
where
    F: std::future::Future<Output = Result<()>> + Send + 'static,
{
    tokio::spawn(async move {
        if let Err(err) = serve.await {
            error!(%err, transport = name, "transport failed");
        }
    })
}

async fn shutdown_signal() {
    let ctrl_c = tokio::signal::ctrl_c();

    #[cfg(unix)]
    {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                tokio::select! {
                    _ = ctrl_c => {}
                    _ = sigterm.recv() => {}
                }
            }
            Err(err) => {
                tracing::warn!(%err, "failed to register SIGTERM handler, using ctrl-c only");
                let _ = ctrl_c.await;
            }
        }
    }

    #[cfg(not(unix))]
    {
        if let Err(err) = ctrl_c.await {
            tracing::error!(%err, "ctrl-c signal handler failed");
        }
    }
}

/// Logs go to stderr; stdout carries the stdio transport.
fn init_tracing(log_format: LogFormat, verbose: bool) -> Result<()> {
    let default_level = if verbose { "debug" } else { "info" };
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    let subscriber = fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr);

    match log_format {
        LogFormat::Text => subscriber
            .try_init()
            .map_err(|err| AppError::Config(format!("failed to init tracing: {err}")))?,
        LogFormat::Json => subscriber
            .json()
            .try_init()
            .map_err(|err| AppError::Config(format!("failed to init tracing: {err}")))?,
    }

    Ok(())
}
