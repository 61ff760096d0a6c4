//! A single debugger session bound to one dump file.
//!
//! The session owns at most one [`DebuggerBackend`] behind a `tokio` mutex.
//! The mutex is fair, so overlapping [`DebuggerSession::send_command`] calls
//! run strictly in arrival order and never interleave output.
//!
//! ## Backend states
//!
//! | State      | Entered when                                | Next command       |
//! |------------|---------------------------------------------|--------------------|
//! | `Idle`     | session created                             | launches backend   |
//! | `Ready`    | launch succeeded                            | runs on backend    |
//! | `Poisoned` | timeout or process death                    | relaunches backend |
//! | `Closed`   | [`DebuggerSession::close`] or failed launch | `SessionClosed`    |
//!
//! A poisoned backend is dropped immediately, which kills the process.

use std::sync::{Arc, Mutex as StdMutex, PoisonError};
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use super::DumpPath;
use crate::debugger::{BackendLauncher, DebuggerBackend, SessionOptions};
use crate::{AppError, Result};

enum BackendState {
    Idle,
    Ready(Box<dyn DebuggerBackend>),
    Poisoned(String),
    Closed,
}

/// Live binding between a dump path and a debugger engine.
pub struct DebuggerSession {
    dump_path: DumpPath,
    options: SessionOptions,
    launcher: Arc<dyn BackendLauncher>,
    created_at: DateTime<Utc>,
    last_used: StdMutex<Instant>,
    state: Mutex<BackendState>,
}

impl DebuggerSession {
    /// Create a session; the engine is launched lazily on first use.
    #[must_use]
    pub fn new(
        dump_path: DumpPath,
        options: SessionOptions,
        launcher: Arc<dyn BackendLauncher>,
    ) -> Self {
        Self {
            dump_path,
            options,
            launcher,
            created_at: Utc::now(),
            last_used: StdMutex::new(Instant::now()),
            state: Mutex::new(BackendState::Idle),
        }
    }

    /// Dump this session is bound to.
    #[must_use]
    pub fn dump_path(&self) -> &DumpPath {
        &self.dump_path
    }

    /// Options the session was created with.
    #[must_use]
    pub fn options(&self) -> &SessionOptions {
        &self.options
    }

    /// Creation timestamp.
    #[must_use]
    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// Time since the session last started or finished a command.
    #[must_use]
    pub fn idle_for(&self) -> Duration {
        self.last_used
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .elapsed()
    }

    /// Whether a command or lifecycle operation currently holds the session.
    #[must_use]
    pub fn is_busy(&self) -> bool {
        self.state.try_lock().is_err()
    }

    fn touch(&self) {
        *self.last_used.lock().unwrap_or_else(PoisonError::into_inner) = Instant::now();
    }

    /// Launch the engine if it is not running yet.
    ///
    /// A launch failure, here or on a relaunch inside
    /// [`DebuggerSession::send_command`], closes the session so that callers
    /// sharing it fall back to creating a fresh one.
    ///
    /// # Errors
    ///
    /// Returns `AppError::SessionCreationFailed` if the engine cannot start,
    /// or `AppError::SessionClosed` if the session was already closed.
    pub async fn ensure_started(&self) -> Result<()> {
        let mut state = self.state.lock().await;
        self.touch();
        self.ready_backend(&mut state).await.map(|_| ())
    }

    /// Run one command and return its output lines.
    ///
    /// Waits for earlier commands on this session to finish first. The
    /// command itself is bounded by the session's command timeout.
    ///
    /// # Errors
    ///
    /// - `AppError::CommandTimeout`: no completion signal in time; the
    ///   session is poisoned and relaunched on the next call.
    /// - `AppError::ProcessDied`: the engine exited mid-command; same recovery.
    /// - `AppError::SessionCreationFailed`: relaunching a poisoned session
    ///   failed; the session is closed.
    /// - `AppError::SessionClosed`: the session was closed.
    pub async fn send_command(&self, command: &str) -> Result<Vec<String>> {
        let mut state = self.state.lock().await;
        self.touch();

        let timeout = self.options.command_timeout;
        let backend = self.ready_backend(&mut state).await?;

        if self.options.verbose {
            info!(dump = %self.dump_path, command, "sending debugger command");
        } else {
            debug!(dump = %self.dump_path, command, "sending debugger command");
        }

        let result = match tokio::time::timeout(timeout, backend.submit(command)).await {
            Ok(result) => result,
            Err(_elapsed) => Err(AppError::CommandTimeout(format!(
                "`{command}` did not complete within {}s",
                timeout.as_secs_f64()
            ))),
        };

        match result {
            Ok(ref lines) if self.options.verbose => {
                info!(dump = %self.dump_path, command, lines = lines.len(), "command completed");
            }
            Err(ref err) if err.poisons_session() => {
                warn!(dump = %self.dump_path, %err, "session poisoned; backend discarded");
                *state = BackendState::Poisoned(err.to_string());
            }
            _ => {}
        }

        self.touch();
        result
    }

    /// Shut the engine down and reject further commands.
    ///
    /// Waits for an in-flight command to finish. Idempotent.
    ///
    /// # Errors
    ///
    /// Returns the backend's error if it could not be terminated; the session
    /// is closed regardless.
    pub async fn close(&self) -> Result<()> {
        let mut state = self.state.lock().await;
        let previous = std::mem::replace(&mut *state, BackendState::Closed);
        if let BackendState::Ready(mut backend) = previous {
            backend.close().await?;
            info!(dump = %self.dump_path, "debugger session closed");
        }
        Ok(())
    }

    async fn ready_backend<'s>(
        &self,
        state: &'s mut BackendState,
    ) -> Result<&'s mut Box<dyn DebuggerBackend>> {
        match state {
            BackendState::Closed => {
                return Err(AppError::SessionClosed(format!(
                    "session for {} was closed",
                    self.dump_path
                )));
            }
            BackendState::Poisoned(reason) => {
                warn!(dump = %self.dump_path, %reason, "resetting poisoned session");
                *state = BackendState::Idle;
            }
            BackendState::Idle | BackendState::Ready(_) => {}
        }

        if matches!(state, BackendState::Idle) {
            match self
                .launcher
                .launch(self.dump_path.as_path(), &self.options)
                .await
            {
                Ok(backend) => {
                    info!(dump = %self.dump_path, "debugger backend started");
                    *state = BackendState::Ready(backend);
                }
                Err(err) => {
                    warn!(dump = %self.dump_path, %err, "debugger launch failed; session closed");
                    *state = BackendState::Closed;
                    return Err(err);
                }
            }
        }

        match state {
            BackendState::Ready(backend) => Ok(backend),
            _ => Err(AppError::SessionClosed(format!(
                "session for {} has no backend",
                self.dump_path
            ))),
        }
    }
}
