//! MCP server handler bridging rmcp to the tool gateway.

use std::sync::Arc;

use rmcp::model::{
    CallToolRequestParam, CallToolResult, Content, ErrorCode, ListToolsResult,
    PaginatedRequestParam, ServerCapabilities, ServerInfo, Tool,
};
use rmcp::service::{RequestContext, RoleServer};
use rmcp::{ErrorData as McpError, ServerHandler};

use crate::context::AppState;
use crate::gateway::{ToolDescriptor, ToolResult};
use crate::AppError;

/// MCP server exposing the four WinDBG tools.
#[derive(Clone)]
pub struct WindbgServer {
    state: Arc<AppState>,
}

impl WindbgServer {
    /// Create a new MCP server bound to shared application state.
    #[must_use]
    pub fn new(state: Arc<AppState>) -> Self {
        Self { state }
    }

    /// Access the shared application state.
    #[must_use]
    pub fn state(&self) -> &Arc<AppState> {
        &self.state
    }

    fn instructions() -> String {
        "Windows crash dump analysis with WinDBG/CDB.\n\n\
         1. list_windbg_dumps: discover dump files\n\
         2. open_windbg_dump: load a dump and run the standard triage commands\n\
         3. run_windbg_cmd: run any debugger command against a loaded dump\n\
         4. close_windbg_dump: release the debugger when done"
            .to_owned()
    }
}

/// Convert a catalog entry into an rmcp tool definition.
#[must_use]
pub fn to_mcp_tool(descriptor: &ToolDescriptor) -> Tool {
    Tool::new(
        descriptor.name,
        descriptor.description,
        Arc::new(descriptor.schema_object()),
    )
}

/// Convert a gateway result into an rmcp call result.
#[must_use]
pub fn to_call_result(result: &ToolResult) -> CallToolResult {
    let content = vec![Content::text(result.text())];
    if result.is_error() {
        CallToolResult::error(content)
    } else {
        CallToolResult::success(content)
    }
}

/// Map a pre-dispatch rejection onto an MCP protocol error.
#[must_use]
pub fn to_mcp_error(err: &AppError) -> McpError {
    match err {
        AppError::UnknownTool(name) => McpError::new(
            ErrorCode::METHOD_NOT_FOUND,
            format!("unknown tool: {name}"),
            None,
        ),
        AppError::Validation(msg) => McpError::invalid_params(msg.clone(), None),
        other => McpError::internal_error(other.to_string(), None),
    }
}

impl ServerHandler for WindbgServer {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            instructions: Some(Self::instructions()),
            ..Default::default()
        }
    }

    async fn list_tools(
        &self,
        _request: Option<PaginatedRequestParam>,
        _context: RequestContext<RoleServer>,
    ) -> Result<ListToolsResult, McpError> {
        let tools = self.state.gateway.list_tools().iter().map(to_mcp_tool).collect();
        Ok(ListToolsResult::with_all_items(tools))
    }

    async fn call_tool(
        &self,
        request: CallToolRequestParam,
        _context: RequestContext<RoleServer>,
    ) -> Result<CallToolResult, McpError> {
        let result = self
            .state
            .gateway
            .call_named(&request.name, request.arguments)
            .await
            .map_err(|err| to_mcp_error(&err))?;
        Ok(to_call_result(&result))
    }
}
