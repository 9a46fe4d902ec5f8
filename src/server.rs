//! MCP adapter: exposes the tool registry over the Model Context Protocol.

use std::sync::Arc;

use rmcp::ServerHandler;
use rmcp::ServiceExt;
use rmcp::model::{
    CallToolRequestParams, CallToolResult, Content, ErrorData, Implementation, ListToolsResult,
    PaginatedRequestParams, ServerCapabilities, ServerInfo, Tool,
};
use rmcp::service::{RequestContext, RoleServer};
use serde_json::Value;

use crate::config::ServerConfig;
use crate::error::{Error, Result};
use crate::jobs::JobOrchestrator;
use crate::store::{NotepadStore, StateStore};
use crate::tools::{ToolDefinition, ToolError, ToolOutput, ToolRegistry};

const SERVER_NAME: &str = "omx";

/// MCP server backed by a [`ToolRegistry`].
#[derive(Clone)]
pub struct OmxServer {
    tools: Arc<ToolRegistry>,
}

impl OmxServer {
    pub fn new(tools: Arc<ToolRegistry>) -> Self {
        Self { tools }
    }

    /// Wire stores, orchestrator and the built-in tools for `config`.
    ///
    /// Fails when the state directory cannot be created. The orchestrator is
    /// returned so the caller can inspect jobs after serving ends.
    pub async fn from_config(config: &ServerConfig) -> Result<(Self, JobOrchestrator)> {
        let state = Arc::new(StateStore::new(config.state_dir()));
        state.ensure_dir().await?;
        let notepad = Arc::new(NotepadStore::new(config.notepad_path()));

        let jobs = JobOrchestrator::new(config.orchestrator.clone());
        let tools = Arc::new(ToolRegistry::with_builtins(&jobs, state, notepad));
        tracing::info!(tools = tools.count(), "Tools registered");
        Ok((Self::new(tools), jobs))
    }

    pub fn tools(&self) -> &ToolRegistry {
        &self.tools
    }

    /// Serve over stdin/stdout until the client disconnects.
    pub async fn serve_stdio(self) -> Result<()> {
        let service = self
            .serve(rmcp::transport::stdio())
            .await
            .map_err(|e| Error::Mcp(format!("failed to start: {e}")))?;
        tracing::info!("omx MCP server running");

        let reason = service
            .waiting()
            .await
            .map_err(|e| Error::Mcp(format!("server task failed: {e}")))?;
        tracing::info!(?reason, "omx MCP server stopped");
        Ok(())
    }
}

fn to_mcp_tool(def: ToolDefinition) -> Tool {
    let input_schema = match def.parameters {
        Value::Object(map) => map,
        _ => serde_json::Map::new(),
    };
    Tool {
        name: def.name.into(),
        title: None,
        description: Some(def.description.into()),
        input_schema: Arc::new(input_schema),
        output_schema: None,
        annotations: None,
        execution: None,
        icons: None,
        meta: None,
    }
}

/// Tool failures are reported in-band: the caller sees `Error: <message>`
/// with the error flag set, never a protocol error.
fn to_call_result(result: std::result::Result<ToolOutput, ToolError>) -> CallToolResult {
    match result {
        Ok(output) => CallToolResult::success(vec![Content::text(output.render())]),
        Err(e) => CallToolResult::error(vec![Content::text(format!("Error: {e}"))]),
    }
}

impl ServerHandler for OmxServer {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            server_info: Implementation {
                name: SERVER_NAME.into(),
                version: env!("CARGO_PKG_VERSION").into(),
                ..Default::default()
            },
            instructions: Some(
                "Delegate coding work to Claude Code with claude_code, then poll \
                 claude_code_status until the job finishes. The omx_state_*, omx_note_* \
                 and omx_memory_* tools persist workflow state, session notes and \
                 project memory."
                    .into(),
            ),
            ..Default::default()
        }
    }

    fn list_tools(
        &self,
        _request: Option<PaginatedRequestParams>,
        _context: RequestContext<RoleServer>,
    ) -> impl std::future::Future<Output = std::result::Result<ListToolsResult, ErrorData>> + Send + '_
    {
        async move {
            let tools = self
                .tools
                .tool_definitions()
                .await
                .into_iter()
                .map(to_mcp_tool)
                .collect();
            Ok(ListToolsResult::with_all_items(tools))
        }
    }

    fn call_tool(
        &self,
        request: CallToolRequestParams,
        _context: RequestContext<RoleServer>,
    ) -> impl std::future::Future<Output = std::result::Result<CallToolResult, ErrorData>> + Send + '_
    {
        async move {
            let params = Value::Object(request.arguments.unwrap_or_default());
            let result = self.tools.execute(&request.name, params).await;
            if let Err(e) = &result {
                tracing::debug!(tool = %request.name, error = %e, "Tool call returned an error");
            }
            Ok(to_call_result(result))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::time::Duration;

    fn text_of(result: &CallToolResult) -> String {
        result.content[0]
            .as_text()
            .map(|t| t.text.clone())
            .unwrap_or_default()
    }

    #[test]
    fn errors_are_reported_in_band() {
        let result = to_call_result(Err(ToolError::NotFound("Unknown tool: x".into())));
        assert_eq!(result.is_error, Some(true));
        assert_eq!(text_of(&result), "Error: Unknown tool: x");
    }

    #[test]
    fn success_renders_output() {
        let result = to_call_result(Ok(ToolOutput::success(
            json!({"jobId": "abcd1234"}),
            Duration::ZERO,
        )));
        assert_ne!(result.is_error, Some(true));
        assert_eq!(text_of(&result), "{\n  \"jobId\": \"abcd1234\"\n}");
    }

    #[test]
    fn definitions_become_mcp_tools() {
        let tool = to_mcp_tool(ToolDefinition {
            name: "omx_state_list".into(),
            description: "List modes.".into(),
            parameters: json!({"type": "object", "properties": {}}),
        });
        assert_eq!(tool.name, "omx_state_list");
        assert_eq!(tool.input_schema.get("type"), Some(&json!("object")));
    }

    fn server_config(omx_dir: std::path::PathBuf) -> ServerConfig {
        ServerConfig {
            omx_dir,
            debug: false,
            log_file: None,
            orchestrator: crate::config::OrchestratorConfig::default(),
        }
    }

    #[tokio::test]
    async fn from_config_prepares_state_dir_and_tools() {
        let dir = tempfile::TempDir::new().unwrap();
        let config = server_config(dir.path().join(".omx"));

        let (server, jobs) = OmxServer::from_config(&config).await.unwrap();
        assert!(config.state_dir().is_dir());
        assert_eq!(server.tools().count(), 12);
        assert_eq!(jobs.job_count().await, 0);
    }

    #[tokio::test]
    async fn unusable_state_dir_is_a_store_error() {
        let dir = tempfile::TempDir::new().unwrap();
        let blocker = dir.path().join(".omx");
        std::fs::write(&blocker, "not a directory").unwrap();

        let err = OmxServer::from_config(&server_config(blocker))
            .await
            .err()
            .unwrap();
        assert!(matches!(err, Error::Store(crate::error::StoreError::Io { .. })));
        assert!(err.to_string().starts_with("Store error: Failed to access"));
    }

    #[test]
    fn server_identifies_itself() {
        let server = OmxServer::new(Arc::new(ToolRegistry::new()));
        let info = server.get_info();
        assert_eq!(info.server_info.name, SERVER_NAME);
        assert!(info.capabilities.tools.is_some());
    }
}
