//! Error types shared across the application.

use std::fmt::{Display, Formatter};

/// Shared application result type.
pub type Result<T> = std::result::Result<T, AppError>;

/// Application error enumeration covering all domain failure modes.
#[derive(Debug)]
pub enum AppError {
    /// Configuration parsing or validation failure.
    Config(String),
    /// Tool parameters failed schema validation.
    Validation(String),
    /// Requested tool or method does not exist.
    UnknownTool(String),
    /// The debugger process could not be started for a dump.
    SessionCreationFailed(String),
    /// The debugger did not signal completion within the command timeout.
    CommandTimeout(String),
    /// The debugger process exited while a command was in flight.
    ProcessDied(String),
    /// The session was closed and no longer accepts commands.
    SessionClosed(String),
    /// Listener bind or connection-level failure.
    Transport(String),
    /// Upload ingestion failure.
    Upload(String),
    /// File-system or I/O operation failure.
    Io(String),
}

impl AppError {
    /// Whether this error leaves the session backend in an unknown state.
    #[must_use]
    pub fn poisons_session(&self) -> bool {
        matches!(self, Self::CommandTimeout(_) | Self::ProcessDied(_))
    }
}

impl Display for AppError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Config(msg) => write!(f, "config: {msg}"),
            Self::Validation(msg) => write!(f, "invalid parameters: {msg}"),
            Self::UnknownTool(msg) => write!(f, "unknown tool: {msg}"),
            Self::SessionCreationFailed(msg) => write!(f, "session creation failed: {msg}"),
            Self::CommandTimeout(msg) => write!(f, "command timeout: {msg}"),
            Self::ProcessDied(msg) => write!(f, "debugger process died: {msg}"),
            Self::SessionClosed(msg) => write!(f, "session closed: {msg}"),
            Self::Transport(msg) => write!(f, "transport: {msg}"),
            Self::Upload(msg) => write!(f, "upload: {msg}"),
            Self::Io(msg) => write!(f, "io: {msg}"),
        }
    }
}

impl std::error::Error for AppError {}

impl From<toml::de::Error> for AppError {
    fn from(err: toml::de::Error) -> Self {
        Self::Config(format!("invalid config: {err}"))
    }
}

impl From<std::io::Error> for AppError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err.to_string())
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        Self::Validation(err.to_string())
    }
}
