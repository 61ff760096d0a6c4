//! Static tool catalog shared by every transport.

use serde::Serialize;
use serde_json::{json, Value};

use super::tools::ToolName;

/// Name, description, and input schema of one tool.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolDescriptor {
    /// Wire name.
    pub name: &'static str,
    /// Human-readable description.
    pub description: &'static str,
    /// JSON Schema of the tool's arguments.
    pub input_schema: Value,
}

impl ToolDescriptor {
    /// Input schema as a JSON object map.
    #[must_use]
    pub fn schema_object(&self) -> serde_json::Map<String, Value> {
        match &self.input_schema {
            Value::Object(map) => map.clone(),
            _ => serde_json::Map::default(),
        }
    }
}

/// The full catalog, in a fixed order.
#[must_use]
pub fn catalog() -> Vec<ToolDescriptor> {
    ToolName::ALL.into_iter().map(descriptor).collect()
}

fn descriptor(tool: ToolName) -> ToolDescriptor {
    match tool {
        ToolName::OpenDump => ToolDescriptor {
            name: tool.as_str(),
            description: "Analyze a Windows crash dump file using WinDBG/CDB. \
                          Runs the standard triage commands against the dump and returns the results.",
            input_schema: json!({
                "type": "object",
                "title": "OpenWindbgDump",
                "properties": {
                    "dump_path": { "type": "string", "description": "Path to the Windows crash dump file" },
                    "include_stack_trace": { "type": "boolean", "default": false, "description": "Whether to include stack traces in the analysis" },
                    "include_modules": { "type": "boolean", "default": false, "description": "Whether to include loaded module information" },
                    "include_threads": { "type": "boolean", "default": false, "description": "Whether to include thread information" }
                }
            }),
        },
        ToolName::RunCommand => ToolDescriptor {
            name: tool.as_str(),
            description: "Execute a specific WinDBG command on a loaded crash dump and return its output.",
            input_schema: json!({
                "type": "object",
                "title": "RunWindbgCmdParams",
                "properties": {
                    "dump_path": { "type": "string", "description": "Path to the Windows crash dump file" },
                    "command": { "type": "string", "description": "WinDBG command to execute" }
                },
                "required": ["dump_path", "command"]
            }),
        },
        ToolName::CloseDump => ToolDescriptor {
            name: tool.as_str(),
            description: "Unload a crash dump and release resources. \
                          Use this when you are done analyzing a crash dump.",
            input_schema: json!({
                "type": "object",
                "title": "CloseWindbgDumpParams",
                "properties": {
                    "dump_path": { "type": "string", "description": "Path to the Windows crash dump file to unload" }
                },
                "required": ["dump_path"]
            }),
        },
        ToolName::ListDumps => ToolDescriptor {
            name: tool.as_str(),
            description: "List Windows crash dump files in the specified directory, \
                          or in the default dump directory when none is given.",
            input_schema: json!({
                "type": "object",
                "title": "ListWindbgDumpsParams",
                "properties": {
                    "directory": { "type": "string", "description": "Directory to search for dump files" }
                }
            }),
        },
    }
}
