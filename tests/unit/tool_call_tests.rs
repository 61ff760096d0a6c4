//! Unit tests for tool call validation and result formatting.

use serde_json::{json, Map, Value};

use mcp_windbg::gateway::{titled_section, ToolCall, ToolName, ToolResult};
use mcp_windbg::AppError;

fn args(value: Value) -> Option<Map<String, Value>> {
    match value {
        Value::Object(map) => Some(map),
        _ => None,
    }
}

#[test]
fn open_defaults_run_two_triage_commands() {
    let call = ToolCall::parse("open_windbg_dump", args(json!({ "dump_path": "a.dmp" })))
        .expect("valid call");
    let ToolCall::OpenDump(params) = call else {
        panic!("expected open call");
    };

    assert_eq!(params.requested_path(), Some("a.dmp"));
    assert_eq!(
        params.command_plan(),
        vec![
            ("Crash Information", ".lastevent"),
            ("Crash Analysis", "!analyze -v")
        ]
    );
}

#[test]
fn open_all_flags_append_in_fixed_order() {
    let call = ToolCall::parse(
        "open_windbg_dump",
        args(json!({
            "dump_path": "a.dmp",
            "include_threads": true,
            "include_stack_trace": true,
            "include_modules": true
        })),
    )
    .expect("valid call");
    let ToolCall::OpenDump(params) = call else {
        panic!("expected open call");
    };

    let commands: Vec<_> = params.command_plan().into_iter().map(|(_, c)| c).collect();
    assert_eq!(commands, vec![".lastevent", "!analyze -v", "kb", "lm", "~"]);
}

#[test]
fn blank_open_path_asks_for_guidance() {
    let call = ToolCall::parse("open_windbg_dump", args(json!({ "dump_path": "   " })))
        .expect("valid call");
    assert!(matches!(call, ToolCall::OpenDump(ref p) if p.requested_path().is_none()));
}

#[test]
fn mistyped_flag_is_rejected() {
    let result = ToolCall::parse(
        "open_windbg_dump",
        args(json!({ "dump_path": "a.dmp", "include_modules": "yes" })),
    );
    assert!(matches!(result, Err(AppError::Validation(ref msg)) if msg.starts_with("open_windbg_dump")));
}

#[test]
fn run_and_close_require_dump_path() {
    assert!(matches!(
        ToolCall::parse("run_windbg_cmd", args(json!({ "command": "k" }))),
        Err(AppError::Validation(_))
    ));
    assert!(matches!(
        ToolCall::parse("close_windbg_dump", None),
        Err(AppError::Validation(_))
    ));
    assert!(matches!(
        ToolCall::parse("close_windbg_dump", args(json!({ "dump_path": "" }))),
        Err(AppError::Validation(_))
    ));
}

#[test]
fn list_accepts_missing_directory() {
    let call = ToolCall::parse("list_windbg_dumps", None).expect("valid call");
    assert_eq!(call.name(), ToolName::ListDumps);
    assert!(matches!(call, ToolCall::ListDumps(ref p) if p.requested_directory().is_none()));
}

#[test]
fn tool_names_are_case_sensitive() {
    assert!(matches!(
        ToolName::parse("Run_WinDbg_Cmd"),
        Err(AppError::UnknownTool(_))
    ));
}

#[test]
fn error_results_are_prefixed() {
    let result = ToolResult::error(&AppError::SessionClosed("a.dmp".into()));
    assert!(result.is_error());
    assert_eq!(result.text(), "Error: session closed: a.dmp");
}

#[test]
fn sections_concatenate_in_order() {
    let first = titled_section("Crash Information", &["line one".to_owned()]);
    let second = titled_section("Crash Analysis", &["a".to_owned(), "b".to_owned()]);
    let result = ToolResult::success(vec![first, second]);

    assert!(!result.is_error());
    assert_eq!(
        result.text(),
        "### Crash Information\n```\nline one\n```\n\n### Crash Analysis\n```\na\nb\n```\n\n"
    );
}
