//! `ServerHandler` wiring for the memory MCP server.

use crate::prompts::{memory_summary_wire, prompt_list_wire};
use crate::resources::{render_resource, resource_list};
use log::{error, info, warn};
use openmemory_rs_memory::MemoryService;
use openmemory_rs_protocol::{MEMORY_SUMMARY_PROMPT, MemorySummaryArgs, ToolError, parse_args};
use openmemory_rs_tools::{ToolRegistry, memory_tool_registry};
use rmcp::{
    ErrorData as McpError, ServerHandler, ServiceExt,
    model::{
        CallToolRequestParams, CallToolResult, Content, GetPromptRequestParams, GetPromptResult,
        Implementation, JsonObject, ListPromptsResult, ListResourcesResult, ListToolsResult,
        PaginatedRequestParams, Prompt, ReadResourceRequestParams, ReadResourceResult,
        ServerCapabilities, ServerInfo, Tool,
    },
    service::{RequestContext, RoleServer},
};
use serde_json::{Value, json};
use std::sync::Arc;
use tokio::io::{stdin, stdout};

/// Name reported during MCP initialization.
pub const SERVER_NAME: &str = "mcp-openmemory";

const INSTRUCTIONS: &str = "Persistent conversation memory. Call recall_memory_abstract at the \
start of a conversation, save_memory for each significant message, and get_recent_memories \
plus update_memory_abstract to maintain the running summary.";

/// MCP server backed by a [`MemoryService`].
#[derive(Debug, Clone)]
pub struct MemoryMcpServer {
    service: Arc<MemoryService>,
    tools: ToolRegistry,
}

impl MemoryMcpServer {
    /// Create a server exposing the standard memory tools.
    pub fn new(service: Arc<MemoryService>) -> Self {
        let tools = memory_tool_registry(service.clone());
        Self { service, tools }
    }

    /// Create a server with a custom tool registry.
    pub fn with_tools(service: Arc<MemoryService>, tools: ToolRegistry) -> Self {
        Self { service, tools }
    }

    /// Run the MCP server over stdio until the client disconnects, or until
    /// Ctrl-C or SIGTERM arrives.
    pub async fn run(self) -> anyhow::Result<()> {
        info!("starting memory MCP server on stdio");
        let running = self.serve(stdio()).await?;
        let cancel = running.cancellation_token();
        tokio::spawn(async move {
            shutdown_signal().await;
            cancel.cancel();
        });
        let reason = running.waiting().await?;
        info!("MCP server stopped (reason={reason:?})");
        Ok(())
    }

    /// Tool definitions as advertised to clients.
    pub fn tool_definitions(&self) -> Vec<Tool> {
        self.tools
            .specs()
            .into_iter()
            .map(|spec| {
                let schema = match spec.args_schema {
                    Value::Object(map) => map,
                    _ => JsonObject::new(),
                };
                Tool::new(spec.name, spec.description, schema)
            })
            .collect()
    }

    /// Run a tool and wrap its JSON result as pretty-printed text.
    ///
    /// Unknown tools and bad arguments are protocol errors; execution
    /// failures are reported as an error result carrying `{"error": ...}`.
    pub async fn dispatch_tool(
        &self,
        name: &str,
        arguments: Option<JsonObject>,
    ) -> Result<CallToolResult, McpError> {
        let args = Value::Object(arguments.unwrap_or_default());
        match self.tools.call(name, args).await {
            Ok(value) => Ok(CallToolResult::success(vec![Content::text(pretty(&value))])),
            Err(err @ (ToolError::ToolNotFound(_) | ToolError::InvalidArguments(_))) => {
                warn!("rejected tool call (name={name}): {err}");
                Err(McpError::invalid_params(err.to_string(), None))
            }
            Err(err) => {
                error!("tool execution failed (name={name}): {err}");
                Ok(CallToolResult::error(vec![Content::text(pretty(
                    &err.to_payload(),
                ))]))
            }
        }
    }

    /// Read a `memory://` resource.
    pub async fn read(&self, uri: &str) -> Result<ReadResourceResult, McpError> {
        let text = match render_resource(&self.service, uri).await {
            Some(rendered) => {
                rendered.map_err(|err| McpError::internal_error(err.to_string(), None))?
            }
            None => {
                return Err(McpError::resource_not_found(
                    format!("Unknown resource: {uri}"),
                    None,
                ));
            }
        };
        from_wire(json!({
            "contents": [{ "uri": uri, "mimeType": openmemory_rs_protocol::JSON_MIME, "text": text }]
        }))
    }

    /// Prompt definitions as advertised to clients.
    pub fn prompt_definitions(&self) -> Result<Vec<Prompt>, McpError> {
        from_wire(prompt_list_wire())
    }

    /// Render a prompt by name.
    pub async fn prompt(
        &self,
        name: &str,
        arguments: Option<JsonObject>,
    ) -> Result<GetPromptResult, McpError> {
        if name != MEMORY_SUMMARY_PROMPT {
            return Err(McpError::invalid_params(format!("Unknown prompt: {name}"), None));
        }
        let args: MemorySummaryArgs = parse_args(Value::Object(arguments.unwrap_or_default()))
            .map_err(|err| McpError::invalid_params(err.to_string(), None))?;
        if args.agent_name.trim().is_empty() {
            return Err(McpError::invalid_params("agent_name is required", None));
        }
        info!(
            "rendering memory summary prompt (agent={}, days_back={})",
            args.agent_name,
            args.days()
        );
        from_wire(memory_summary_wire(&self.service, &args).await)
    }
}

impl ServerHandler for MemoryMcpServer {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            capabilities: ServerCapabilities::builder()
                .enable_tools()
                .enable_resources()
                .enable_prompts()
                .build(),
            server_info: Implementation {
                name: SERVER_NAME.to_string(),
                version: env!("CARGO_PKG_VERSION").to_string(),
                ..Implementation::from_build_env()
            },
            instructions: Some(INSTRUCTIONS.to_string()),
            ..Default::default()
        }
    }

    async fn list_tools(
        &self,
        _request: Option<PaginatedRequestParams>,
        _context: RequestContext<RoleServer>,
    ) -> Result<ListToolsResult, McpError> {
        Ok(ListToolsResult {
            meta: None,
            tools: self.tool_definitions(),
            next_cursor: None,
        })
    }

    async fn call_tool(
        &self,
        request: CallToolRequestParams,
        _context: RequestContext<RoleServer>,
    ) -> Result<CallToolResult, McpError> {
        self.dispatch_tool(&request.name, request.arguments)
            .await
    }

    async fn list_resources(
        &self,
        _request: Option<PaginatedRequestParams>,
        _context: RequestContext<RoleServer>,
    ) -> Result<ListResourcesResult, McpError> {
        Ok(ListResourcesResult {
            meta: None,
            resources: resource_list(),
            next_cursor: None,
        })
    }

    async fn read_resource(
        &self,
        request: ReadResourceRequestParams,
        _context: RequestContext<RoleServer>,
    ) -> Result<ReadResourceResult, McpError> {
        self.read(&request.uri).await
    }

    async fn list_prompts(
        &self,
        _request: Option<PaginatedRequestParams>,
        _context: RequestContext<RoleServer>,
    ) -> Result<ListPromptsResult, McpError> {
        Ok(ListPromptsResult {
            meta: None,
            prompts: self.prompt_definitions()?,
            next_cursor: None,
        })
    }

    async fn get_prompt(
        &self,
        request: GetPromptRequestParams,
        _context: RequestContext<RoleServer>,
    ) -> Result<GetPromptResult, McpError> {
        self.prompt(&request.name, request.arguments).await
    }
}

/// Resolve once the process is asked to stop.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            warn!("failed to listen for Ctrl-C: {err}");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{SignalKind, signal};
        match signal(SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(err) => {
                warn!("failed to listen for SIGTERM: {err}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("interrupt received; shutting down MCP server"),
        _ = terminate => info!("SIGTERM received; shutting down MCP server"),
    }
}

/// Create stdio transport for MCP communication.
fn stdio() -> (tokio::io::Stdin, tokio::io::Stdout) {
    (stdin(), stdout())
}

fn pretty(value: &Value) -> String {
    serde_json::to_string_pretty(value).unwrap_or_else(|_| value.to_string())
}

/// Build an rmcp model type from its MCP wire form.
fn from_wire<T: serde::de::DeserializeOwned>(value: Value) -> Result<T, McpError> {
    serde_json::from_value(value).map_err(|err| McpError::internal_error(err.to_string(), None))
}
