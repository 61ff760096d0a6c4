//! Global configuration parsing, validation, and environment fallbacks.

use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;
use tracing::{debug, warn};

use crate::{AppError, Result};

/// Environment variable consulted when no symbols path is configured.
pub const SYMBOL_PATH_ENV: &str = "_NT_SYMBOL_PATH";

/// Well-known cdb install locations probed when `cdb_path` is unset.
const CDB_CANDIDATES: &[&str] = &[
    r"C:\Program Files (x86)\Windows Kits\10\Debuggers\x64\cdb.exe",
    r"C:\Program Files\Windows Kits\10\Debuggers\x64\cdb.exe",
    r"C:\Program Files (x86)\Windows Kits\10\Debuggers\x86\cdb.exe",
    r"C:\Program Files\Debugging Tools for Windows (x64)\cdb.exe",
];

/// Debugger session tuning.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub struct SessionConfig {
    /// Per-command completion timeout.
    #[serde(default = "default_command_timeout")]
    pub command_timeout_seconds: u64,
    /// Time allowed for the debugger to finish loading a dump.
    #[serde(default = "default_load_timeout")]
    pub load_timeout_seconds: u64,
    /// Idle sessions older than this are evicted; 0 disables eviction.
    #[serde(default = "default_idle_timeout")]
    pub idle_timeout_seconds: u64,
    /// Log every command and its output size.
    #[serde(default)]
    pub verbose: bool,
}

fn default_command_timeout() -> u64 {
    30
}

fn default_load_timeout() -> u64 {
    120
}

fn default_idle_timeout() -> u64 {
    1800
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            command_timeout_seconds: default_command_timeout(),
            load_timeout_seconds: default_load_timeout(),
            idle_timeout_seconds: default_idle_timeout(),
            verbose: false,
        }
    }
}

/// Network listener settings for the remote transports.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub struct ServerConfig {
    /// Interface all remote listeners bind to.
    #[serde(default = "default_host")]
    pub host: String,
    /// WebSocket transport port.
    #[serde(default = "default_socket_port")]
    pub socket_port: u16,
    /// Upload ingestor port.
    #[serde(default = "default_upload_port")]
    pub upload_port: u16,
    /// Event-stream transport port.
    #[serde(default = "default_sse_port")]
    pub sse_port: u16,
    /// Directory where uploaded dumps are stored.
    #[serde(default = "default_upload_dir")]
    pub upload_dir: PathBuf,
    /// Interval between event-stream heartbeats.
    #[serde(default = "default_heartbeat_seconds")]
    pub heartbeat_seconds: u64,
    /// Maximum accepted upload body size.
    #[serde(default = "default_max_upload_bytes")]
    pub max_upload_bytes: usize,
}

fn default_host() -> String {
    "0.0.0.0".into()
}

fn default_socket_port() -> u16 {
    8765
}

fn default_upload_port() -> u16 {
    8766
}

fn default_sse_port() -> u16 {
    8767
}

fn default_upload_dir() -> PathBuf {
    PathBuf::from("./uploads")
}

fn default_heartbeat_seconds() -> u64 {
    30
}

fn default_max_upload_bytes() -> usize {
    8 * 1024 * 1024 * 1024
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            socket_port: default_socket_port(),
            upload_port: default_upload_port(),
            sse_port: default_sse_port(),
            upload_dir: default_upload_dir(),
            heartbeat_seconds: default_heartbeat_seconds(),
            max_upload_bytes: default_max_upload_bytes(),
        }
    }
}

/// Global configuration parsed from `config.toml`.
#[derive(Debug, Clone, Default, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub struct GlobalConfig {
    /// Explicit path to `cdb.exe`.
    #[serde(default)]
    pub cdb_path: Option<PathBuf>,
    /// Symbol search path handed to the debugger with `-y`.
    #[serde(default)]
    pub symbols_path: Option<String>,
    /// Default directory searched for crash dumps.
    #[serde(default)]
    pub dumps_dir: Option<PathBuf>,
    /// Debugger session tuning.
    #[serde(default)]
    pub session: SessionConfig,
    /// Remote listener settings.
    #[serde(default)]
    pub server: ServerConfig,
}

impl GlobalConfig {
    /// Load and validate configuration from a TOML file path.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Config` if the file cannot be read or contains
    /// invalid TOML, or if validation fails.
    pub fn load_from_path(path: impl AsRef<Path>) -> Result<Self> {
        let raw = fs::read_to_string(path)
            .map_err(|err| AppError::Config(format!("failed to read config: {err}")))?;
        Self::from_toml_str(&raw)
    }

    /// Parse configuration from a TOML string.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Config` if parsing or validation fails.
    pub fn from_toml_str(raw: &str) -> Result<Self> {
        let config: Self = toml::from_str(raw)?;
        config.validate()?;
        Ok(config)
    }

    /// Fill unset optional values from the environment and well-known
    /// install locations.
    pub fn apply_environment(&mut self) {
        if self.symbols_path.is_none() {
            if let Ok(value) = env::var(SYMBOL_PATH_ENV) {
                if !value.is_empty() {
                    debug!("symbols path taken from {SYMBOL_PATH_ENV}");
                    self.symbols_path = Some(value);
                }
            }
        }

        if self.dumps_dir.is_none() {
            self.dumps_dir = local_dumps_dir();
        }
    }

    /// Create the upload directory and make its path absolute, without the
    /// Windows verbatim prefix so stored paths can be handed to cdb.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Config` if the directory cannot be created or
    /// resolved.
    pub fn prepare_upload_dir(&mut self) -> Result<()> {
        fs::create_dir_all(&self.server.upload_dir).map_err(|err| {
            AppError::Config(format!(
                "cannot create upload dir {}: {err}",
                self.server.upload_dir.display()
            ))
        })?;
        self.server.upload_dir = dunce::canonicalize(&self.server.upload_dir)
            .map_err(|err| AppError::Config(format!("upload dir invalid: {err}")))?;
        Ok(())
    }

    /// Debugger executable to launch: the configured path, a detected
    /// Windows Kits install, or `cdb` resolved through `PATH`.
    #[must_use]
    pub fn resolved_cdb_path(&self) -> PathBuf {
        if let Some(ref path) = self.cdb_path {
            return path.clone();
        }
        CDB_CANDIDATES
            .iter()
            .map(PathBuf::from)
            .find(|candidate| candidate.is_file())
            .unwrap_or_else(|| {
                warn!("no cdb install found in the usual locations, relying on PATH");
                PathBuf::from("cdb")
            })
    }

    /// Per-command timeout as a [`Duration`].
    #[must_use]
    pub fn command_timeout(&self) -> Duration {
        Duration::from_secs(self.session.command_timeout_seconds)
    }

    /// Dump load timeout as a [`Duration`].
    #[must_use]
    pub fn load_timeout(&self) -> Duration {
        Duration::from_secs(self.session.load_timeout_seconds)
    }

    /// Idle eviction threshold, or `None` when eviction is disabled.
    #[must_use]
    pub fn idle_timeout(&self) -> Option<Duration> {
        match self.session.idle_timeout_seconds {
            0 => None,
            secs => Some(Duration::from_secs(secs)),
        }
    }

    /// Event-stream heartbeat interval.
    #[must_use]
    pub fn heartbeat_interval(&self) -> Duration {
        Duration::from_secs(self.server.heartbeat_seconds)
    }

    /// Validate value ranges.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Config` when a timeout or interval is zero.
    pub fn validate(&self) -> Result<()> {
        if self.session.command_timeout_seconds == 0 {
            return Err(AppError::Config(
                "command_timeout_seconds must be greater than zero".into(),
            ));
        }

        if self.session.load_timeout_seconds == 0 {
            return Err(AppError::Config(
                "load_timeout_seconds must be greater than zero".into(),
            ));
        }

        if self.server.heartbeat_seconds == 0 {
            return Err(AppError::Config(
                "heartbeat_seconds must be greater than zero".into(),
            ));
        }

        Ok(())
    }
}

/// Windows Error Reporting's per-user dump folder, when present.
fn local_dumps_dir() -> Option<PathBuf> {
    let base = env::var_os("LOCALAPPDATA")?;
    let dir = PathBuf::from(base).join("CrashDumps");
    dir.is_dir().then_some(dir)
}
