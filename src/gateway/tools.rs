//! Tool names and validated tool calls.
//!
//! Dispatch is a closed enum: a name that is not in [`ToolName`] is rejected
//! before any gateway logic runs, and adding a tool forces every `match` on
//! [`ToolCall`] to handle it.

use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{Map, Value};

use crate::{AppError, Result};

/// The four tools exposed on every transport.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ToolName {
    /// `open_windbg_dump`
    OpenDump,
    /// `run_windbg_cmd`
    RunCommand,
    /// `close_windbg_dump`
    CloseDump,
    /// `list_windbg_dumps`
    ListDumps,
}

impl ToolName {
    /// Every tool, in catalog order.
    pub const ALL: [Self; 4] = [
        Self::OpenDump,
        Self::RunCommand,
        Self::CloseDump,
        Self::ListDumps,
    ];

    /// Wire name of the tool.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::OpenDump => "open_windbg_dump",
            Self::RunCommand => "run_windbg_cmd",
            Self::CloseDump => "close_windbg_dump",
            Self::ListDumps => "list_windbg_dumps",
        }
    }

    /// Resolve a wire name.
    ///
    /// # Errors
    ///
    /// Returns `AppError::UnknownTool` for names outside the catalog.
    pub fn parse(name: &str) -> Result<Self> {
        Self::ALL
            .into_iter()
            .find(|tool| tool.as_str() == name)
            .ok_or_else(|| AppError::UnknownTool(name.to_owned()))
    }
}

/// Parameters of `open_windbg_dump`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct OpenDumpParams {
    /// Dump to analyze; absent or empty asks for guidance instead.
    #[serde(default)]
    pub dump_path: Option<String>,
    /// Append a `kb` stack trace.
    #[serde(default)]
    pub include_stack_trace: bool,
    /// Append the `lm` module list.
    #[serde(default)]
    pub include_modules: bool,
    /// Append the `~` thread list.
    #[serde(default)]
    pub include_threads: bool,
}

impl OpenDumpParams {
    /// Dump path if one was given.
    #[must_use]
    pub fn requested_path(&self) -> Option<&str> {
        self.dump_path
            .as_deref()
            .map(str::trim)
            .filter(|path| !path.is_empty())
    }

    /// Titled commands run when the dump is opened, in order.
    #[must_use]
    pub fn command_plan(&self) -> Vec<(&'static str, &'static str)> {
        let mut plan = vec![
            ("Crash Information", ".lastevent"),
            ("Crash Analysis", "!analyze -v"),
        ];
        if self.include_stack_trace {
            plan.push(("Stack Trace", "kb"));
        }
        if self.include_modules {
            plan.push(("Loaded Modules", "lm"));
        }
        if self.include_threads {
            plan.push(("Threads", "~"));
        }
        plan
    }
}

/// Parameters of `run_windbg_cmd`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct RunCommandParams {
    /// Dump the command runs against.
    pub dump_path: String,
    /// Debugger command text.
    pub command: String,
}

/// Parameters of `close_windbg_dump`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct CloseDumpParams {
    /// Dump whose session is closed.
    pub dump_path: String,
}

/// Parameters of `list_windbg_dumps`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct ListDumpsParams {
    /// Directory to search; falls back to the default dump directory.
    #[serde(default)]
    pub directory: Option<String>,
}

impl ListDumpsParams {
    /// Directory if one was given.
    #[must_use]
    pub fn requested_directory(&self) -> Option<&str> {
        self.directory
            .as_deref()
            .map(str::trim)
            .filter(|dir| !dir.is_empty())
    }
}

/// A validated tool invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ToolCall {
    /// Open and summarize a dump.
    OpenDump(OpenDumpParams),
    /// Run one debugger command.
    RunCommand(RunCommandParams),
    /// Close a dump's session.
    CloseDump(CloseDumpParams),
    /// List dump files in a directory.
    ListDumps(ListDumpsParams),
}

impl ToolCall {
    /// Validate `arguments` for the tool called `name`.
    ///
    /// # Errors
    ///
    /// - `AppError::UnknownTool`: `name` is not in the catalog.
    /// - `AppError::Validation`: arguments are missing, mistyped, or empty.
    pub fn parse(name: &str, arguments: Option<Map<String, Value>>) -> Result<Self> {
        let tool = ToolName::parse(name)?;
        let arguments = arguments.unwrap_or_default();

        match tool {
            ToolName::OpenDump => Ok(Self::OpenDump(decode(tool, arguments)?)),
            ToolName::RunCommand => {
                let params: RunCommandParams = decode(tool, arguments)?;
                require_non_empty(tool, "dump_path", &params.dump_path)?;
                require_non_empty(tool, "command", &params.command)?;
                if params.command.contains(['\n', '\r']) {
                    return Err(AppError::Validation(format!(
                        "{}: command must be a single line",
                        tool.as_str()
                    )));
                }
                Ok(Self::RunCommand(params))
            }
            ToolName::CloseDump => {
                let params: CloseDumpParams = decode(tool, arguments)?;
                require_non_empty(tool, "dump_path", &params.dump_path)?;
                Ok(Self::CloseDump(params))
            }
            ToolName::ListDumps => Ok(Self::ListDumps(decode(tool, arguments)?)),
        }
    }

    /// Tool this call targets.
    #[must_use]
    pub fn name(&self) -> ToolName {
        match self {
            Self::OpenDump(_) => ToolName::OpenDump,
            Self::RunCommand(_) => ToolName::RunCommand,
            Self::CloseDump(_) => ToolName::CloseDump,
            Self::ListDumps(_) => ToolName::ListDumps,
        }
    }
}

fn decode<T: DeserializeOwned>(tool: ToolName, arguments: Map<String, Value>) -> Result<T> {
    serde_json::from_value(Value::Object(arguments))
        .map_err(|err| AppError::Validation(format!("{}: {err}", tool.as_str())))
}

fn require_non_empty(tool: ToolName, field: &str, value: &str) -> Result<()> {
    if value.trim().is_empty() {
        return Err(AppError::Validation(format!(
            "{}: '{field}' must not be empty",
            tool.as_str()
        )));
    }
    Ok(())
}
