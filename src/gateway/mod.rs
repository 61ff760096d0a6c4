//! Transport-agnostic tool gateway.
//!
//! [`ToolGateway`] turns a validated [`ToolCall`] into session operations and
//! always produces exactly one [`ToolResult`]. Failures inside a call,
//! panics included, come back as a textual error result; only argument
//! validation (done by [`ToolCall::parse`]) fails before the gateway runs.

pub mod catalog;
pub mod dumps;
pub mod tools;

use std::panic::AssertUnwindSafe;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use futures_util::FutureExt;
use serde_json::{Map, Value};
use tracing::{info, info_span, warn, Instrument};

pub use catalog::{catalog, ToolDescriptor};
pub use tools::{ToolCall, ToolName};

use crate::debugger::SessionOptions;
use crate::session::{DumpPath, SessionRegistry};
use crate::{AppError, Result};
use tools::{CloseDumpParams, ListDumpsParams, OpenDumpParams, RunCommandParams};

/// Outcome of one tool call: ordered text sections plus an error flag.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolResult {
    sections: Vec<String>,
    is_error: bool,
}

impl ToolResult {
    /// Successful result made of `sections`.
    #[must_use]
    pub fn success(sections: Vec<String>) -> Self {
        Self {
            sections,
            is_error: false,
        }
    }

    /// Successful single-section result.
    #[must_use]
    pub fn message(text: impl Into<String>) -> Self {
        Self::success(vec![text.into()])
    }

    /// Error result describing `err`.
    #[must_use]
    pub fn error(err: &AppError) -> Self {
        Self {
            sections: vec![format!("Error: {err}")],
            is_error: true,
        }
    }

    /// Whether the call failed.
    #[must_use]
    pub fn is_error(&self) -> bool {
        self.is_error
    }

    /// Individual sections.
    #[must_use]
    pub fn sections(&self) -> &[String] {
        &self.sections
    }

    /// All sections concatenated.
    #[must_use]
    pub fn text(&self) -> String {
        self.sections.concat()
    }
}

/// Format command output as a titled markdown section.
#[must_use]
pub fn titled_section(title: &str, lines: &[String]) -> String {
    format!("### {title}\n```\n{}\n```\n\n", lines.join("\n"))
}

/// Executes tool calls against the session registry.
pub struct ToolGateway {
    registry: Arc<SessionRegistry>,
    options: SessionOptions,
    default_dumps_dir: Option<PathBuf>,
}

impl ToolGateway {
    /// Create a gateway creating sessions with `options`.
    #[must_use]
    pub fn new(
        registry: Arc<SessionRegistry>,
        options: SessionOptions,
        default_dumps_dir: Option<PathBuf>,
    ) -> Self {
        Self {
            registry,
            options,
            default_dumps_dir,
        }
    }

    /// Registry backing this gateway.
    #[must_use]
    pub fn registry(&self) -> &Arc<SessionRegistry> {
        &self.registry
    }

    /// The tool catalog; identical for every transport.
    #[must_use]
    pub fn list_tools(&self) -> Vec<ToolDescriptor> {
        catalog()
    }

    /// Validate and execute a call by name.
    ///
    /// # Errors
    ///
    /// Returns `AppError::UnknownTool` or `AppError::Validation` when the
    /// call is rejected before execution. Execution failures are reported
    /// inside the returned [`ToolResult`].
    pub async fn call_named(
        &self,
        name: &str,
        arguments: Option<Map<String, Value>>,
    ) -> Result<ToolResult> {
        let call = ToolCall::parse(name, arguments)?;
        Ok(self.call(call).await)
    }

    /// Execute a validated call. Never fails.
    pub async fn call(&self, call: ToolCall) -> ToolResult {
        let span = info_span!("tool_call", tool = call.name().as_str());
        async move {
            let outcome = AssertUnwindSafe(self.dispatch(call)).catch_unwind().await;
            match outcome {
                Ok(Ok(result)) => result,
                Ok(Err(err)) => {
                    warn!(%err, "tool call failed");
                    ToolResult::error(&err)
                }
                Err(panic) => {
                    let detail = panic
                        .downcast_ref::<&str>()
                        .map(|s| (*s).to_owned())
                        .or_else(|| panic.downcast_ref::<String>().cloned())
                        .unwrap_or_else(|| "unknown panic".to_owned());
                    warn!(%detail, "tool call panicked");
                    ToolResult::error(&AppError::Io(format!("internal fault: {detail}")))
                }
            }
        }
        .instrument(span)
        .await
    }

    async fn dispatch(&self, call: ToolCall) -> Result<ToolResult> {
        match call {
            ToolCall::OpenDump(params) => self.open_dump(params).await,
            ToolCall::RunCommand(params) => self.run_command(params).await,
            ToolCall::CloseDump(params) => Ok(self.close_dump(&params).await),
            ToolCall::ListDumps(params) => self.list_dumps(&params).await,
        }
    }

    async fn open_dump(&self, params: OpenDumpParams) -> Result<ToolResult> {
        let Some(raw_path) = params.requested_path() else {
            let dumps = match self.default_dumps_dir.clone() {
                Some(dir) => scan(dir).await?,
                None => Vec::new(),
            };
            return Ok(ToolResult::message(dumps::open_guidance(
                self.default_dumps_dir.as_deref(),
                &dumps,
            )));
        };

        let path = DumpPath::new(raw_path);
        let mut sections = Vec::new();
        for (title, command) in params.command_plan() {
            let lines = self.run_on_session(&path, command).await?;
            sections.push(titled_section(title, &lines));
        }
        info!(dump = %path, sections = sections.len(), "dump opened");
        Ok(ToolResult::success(sections))
    }

    async fn run_command(&self, params: RunCommandParams) -> Result<ToolResult> {
        let path = DumpPath::new(&params.dump_path);
        let lines = self.run_on_session(&path, &params.command).await?;
        Ok(ToolResult::message(format!(
            "### Command: {}\n```\n{}\n```",
            params.command,
            lines.join("\n")
        )))
    }

    async fn close_dump(&self, params: &CloseDumpParams) -> ToolResult {
        let path = DumpPath::new(&params.dump_path);
        let existed = self.registry.remove(&path).await;
        info!(dump = %path, existed, "close requested");
        ToolResult::message(format!("Crash dump {} has been unloaded.", params.dump_path))
    }

    async fn list_dumps(&self, params: &ListDumpsParams) -> Result<ToolResult> {
        let dir = params
            .requested_directory()
            .map(PathBuf::from)
            .or_else(|| self.default_dumps_dir.clone());

        let Some(dir) = dir else {
            return Ok(ToolResult::message(
                "No directory specified and no default dumps directory found.",
            ));
        };

        let dumps = scan(dir.clone()).await?;
        Ok(ToolResult::message(dumps::listing(&dir, &dumps)))
    }

    /// Run `command` on the session for `path`, re-resolving the session
    /// once if it was closed underneath us (idle eviction or a concurrent
    /// close).
    async fn run_on_session(&self, path: &DumpPath, command: &str) -> Result<Vec<String>> {
        match self.run_once(path, command).await {
            Err(AppError::SessionClosed(_)) => self.run_once(path, command).await,
            other => other,
        }
    }

    async fn run_once(&self, path: &DumpPath, command: &str) -> Result<Vec<String>> {
        let session = self.registry.get_or_create(path, &self.options).await?;
        let result = session.send_command(command).await;
        // A failed relaunch closed the session; do not keep it registered.
        if matches!(result, Err(AppError::SessionCreationFailed(_))) {
            self.registry.discard(path, &session).await;
        }
        result
    }
}

/// Glob a directory on the blocking pool.
async fn scan(dir: PathBuf) -> Result<Vec<dumps::DumpFile>> {
    tokio::task::spawn_blocking(move || dumps::find_dumps(Path::new(&dir)))
        .await
        .map_err(|err| AppError::Io(format!("dump scan task failed: {err}")))
}
