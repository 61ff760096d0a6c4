//! Debugger engine abstraction.
//!
//! The [`DebuggerBackend`] trait is the narrow capability the session layer
//! needs from a debugger engine: submit one text command and get its output
//! back, or shut the engine down. [`BackendLauncher`] creates backends for a
//! dump file. Production code uses [`cdb::CdbLauncher`]; tests substitute
//! scripted fakes so session and registry logic can run without a debugger
//! binary.

pub mod cdb;
pub mod codec;

use std::future::Future;
use std::path::{Path, PathBuf};
use std::pin::Pin;
use std::time::Duration;

use crate::Result;

/// Boxed future returned by the backend traits.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Launch parameters for a debugger session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionOptions {
    /// Debugger executable.
    pub cdb_path: PathBuf,
    /// Symbol search path, if any.
    pub symbols_path: Option<String>,
    /// Per-command completion timeout.
    pub command_timeout: Duration,
    /// Time allowed for the dump to finish loading.
    pub load_timeout: Duration,
    /// Log commands and output sizes at `info`.
    pub verbose: bool,
}

/// A running debugger engine bound to one dump.
///
/// Implementations are driven by exactly one caller at a time; the session
/// layer serializes access.
pub trait DebuggerBackend: Send {
    /// Send `command` and collect its output lines until the engine signals
    /// completion.
    ///
    /// Callers bound this future with the command timeout; implementations
    /// may block indefinitely on a hung engine.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::ProcessDied`](crate::AppError::ProcessDied) if the
    /// engine exits before signalling completion.
    fn submit<'a>(&'a mut self, command: &'a str) -> BoxFuture<'a, Result<Vec<String>>>;

    /// Terminate the engine, gracefully if possible.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Io`](crate::AppError::Io) if the engine could not
    /// be terminated.
    fn close(&mut self) -> BoxFuture<'_, Result<()>>;
}

/// Factory for [`DebuggerBackend`]s.
pub trait BackendLauncher: Send + Sync {
    /// Start an engine for `dump_path` and wait until the dump is loaded.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::SessionCreationFailed`](crate::AppError::SessionCreationFailed)
    /// if the engine cannot be started or does not finish loading in time.
    fn launch<'a>(
        &'a self,
        dump_path: &'a Path,
        options: &'a SessionOptions,
    ) -> BoxFuture<'a, Result<Box<dyn DebuggerBackend>>>;
}
