//! `cdb` process backend.
//!
//! Spawns the console debugger against a dump with:
//! - `-z <dump>` to open the dump and `-y <symbols>` when a symbol path is set.
//! - `kill_on_drop(true)` so an abandoned session never leaks a process.
//! - A completion marker protocol: every command is followed by
//!   `.echo <marker>` and output is collected until the marker comes back.
//!   Markers embed a per-process token and a sequence number, so output left
//!   over from an earlier command can never satisfy a later one.

use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;

use futures_util::StreamExt;
use tokio::io::AsyncWriteExt;
use tokio::process::{Child, ChildStdin, ChildStdout, Command};
use tokio_util::codec::FramedRead;
use tracing::{debug, info, warn};

use super::codec::OutputCodec;
use super::{BackendLauncher, BoxFuture, DebuggerBackend, SessionOptions};
use crate::{AppError, Result};

/// Prefix of the sentinel echoed after every command.
pub const MARKER_PREFIX: &str = "MCP_WINDBG_DONE_";

/// How long `q` is given to end the process before it is killed.
const GRACEFUL_EXIT: Duration = Duration::from_secs(5);

/// Launches [`CdbProcess`] backends.
#[derive(Debug, Default, Clone, Copy)]
pub struct CdbLauncher;

impl BackendLauncher for CdbLauncher {
    fn launch<'a>(
        &'a self,
        dump_path: &'a Path,
        options: &'a SessionOptions,
    ) -> BoxFuture<'a, Result<Box<dyn DebuggerBackend>>> {
        Box::pin(async move {
            let process = CdbProcess::spawn(dump_path, options).await?;
            Ok(Box::new(process) as Box<dyn DebuggerBackend>)
        })
    }
}

/// A live `cdb` child process with piped stdio.
#[derive(Debug)]
pub struct CdbProcess {
    dump_path: PathBuf,
    child: Child,
    stdin: ChildStdin,
    stdout: FramedRead<ChildStdout, OutputCodec>,
    token: String,
    sequence: u64,
}

impl CdbProcess {
    /// Spawn the debugger for `dump_path` and wait for the dump to load.
    ///
    /// # Errors
    ///
    /// - `AppError::SessionCreationFailed("failed to spawn …")`: OS spawn failure.
    /// - `AppError::SessionCreationFailed("… did not load within …")`: load timeout.
    /// - `AppError::SessionCreationFailed("debugger failed while loading …")`:
    ///   the process exited during the load.
    pub async fn spawn(dump_path: &Path, options: &SessionOptions) -> Result<Self> {
        let mut cmd = Command::new(&options.cdb_path);
        cmd.arg("-z").arg(dump_path);
        if let Some(ref symbols) = options.symbols_path {
            cmd.arg("-y").arg(symbols);
        }

        cmd.stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .kill_on_drop(true);

        let mut child = cmd.spawn().map_err(|err| {
            AppError::SessionCreationFailed(format!(
                "failed to spawn {}: {err}",
                options.cdb_path.display()
            ))
        })?;

        let stdin = child.stdin.take().ok_or_else(|| {
            AppError::SessionCreationFailed("failed to capture debugger stdin".into())
        })?;
        let stdout = child.stdout.take().ok_or_else(|| {
            AppError::SessionCreationFailed("failed to capture debugger stdout".into())
        })?;

        let mut process = Self {
            dump_path: dump_path.to_path_buf(),
            child,
            stdin,
            stdout: FramedRead::new(stdout, OutputCodec::new()),
            token: uuid::Uuid::new_v4().simple().to_string(),
            sequence: 0,
        };

        match tokio::time::timeout(options.load_timeout, process.exchange(None)).await {
            Ok(Ok(banner)) => {
                info!(
                    dump = %dump_path.display(),
                    pid = process.child.id(),
                    banner_lines = banner.len(),
                    "debugger loaded dump"
                );
                Ok(process)
            }
            Ok(Err(err)) => {
                process.child.kill().await.ok();
                Err(AppError::SessionCreationFailed(format!(
                    "debugger failed while loading {}: {err}",
                    dump_path.display()
                )))
            }
            Err(_elapsed) => {
                process.child.kill().await.ok();
                Err(AppError::SessionCreationFailed(format!(
                    "{} did not load within {:?}",
                    dump_path.display(),
                    options.load_timeout
                )))
            }
        }
    }

    fn next_marker(&mut self) -> String {
        self.sequence += 1;
        format!("{MARKER_PREFIX}{}_{}", self.token, self.sequence)
    }

    /// Write `command` (if any) followed by a marker echo, then read output
    /// until the marker appears.
    async fn exchange(&mut self, command: Option<&str>) -> Result<Vec<String>> {
        let marker = self.next_marker();

        let mut payload = String::new();
        if let Some(command) = command {
            payload.push_str(command);
            payload.push('\n');
        }
        payload.push_str(".echo ");
        payload.push_str(&marker);
        payload.push('\n');

        self.stdin
            .write_all(payload.as_bytes())
            .await
            .map_err(|err| AppError::ProcessDied(format!("write to debugger failed: {err}")))?;
        self.stdin
            .flush()
            .await
            .map_err(|err| AppError::ProcessDied(format!("flush to debugger failed: {err}")))?;

        let mut lines = Vec::new();
        while let Some(line) = self.stdout.next().await {
            let line = line?;
            match line.find(&marker) {
                // An engine that echoes its input shows the `.echo` command
                // itself before the marker output.
                Some(pos) if line[..pos].trim_end().ends_with(".echo") => {}
                Some(_) => return Ok(lines),
                None => lines.push(line),
            }
        }

        Err(AppError::ProcessDied(format!(
            "debugger for {} closed its output before completing the command",
            self.dump_path.display()
        )))
    }
}

impl DebuggerBackend for CdbProcess {
    fn submit<'a>(&'a mut self, command: &'a str) -> BoxFuture<'a, Result<Vec<String>>> {
        Box::pin(self.exchange(Some(command)))
    }

    fn close(&mut self) -> BoxFuture<'_, Result<()>> {
        Box::pin(async move {
            // Ignore write errors: the process may already be gone.
            let _ = self.stdin.write_all(b"q\n").await;
            let _ = self.stdin.flush().await;

            match tokio::time::timeout(GRACEFUL_EXIT, self.child.wait()).await {
                Ok(Ok(status)) => {
                    debug!(dump = %self.dump_path.display(), %status, "debugger exited");
                    Ok(())
                }
                Ok(Err(err)) => Err(AppError::Io(format!("waiting for debugger failed: {err}"))),
                Err(_elapsed) => {
                    warn!(dump = %self.dump_path.display(), "debugger ignored quit; killing");
                    self.child
                        .kill()
                        .await
                        .map_err(|err| AppError::Io(format!("failed to kill debugger: {err}")))
                }
            }
        })
    }
}
