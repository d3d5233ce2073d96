//! MCP server: JSON-RPC 2.0 over stdio.
//!
//! Newline-delimited JSON, one request per line, responses on stdout.
//! Logging goes to stderr/file only; stdout belongs to the protocol.

use std::path::PathBuf;

use ecliptic_fault::Result;
use ecliptic_service::{AppState, EclipticConfig};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tracing::{debug, info, warn};

use crate::protocol::{
    methods, ErrorCode, InitializeResult, JsonRpcError, JsonRpcRequest, JsonRpcResponse,
    ServerCapabilities, ServerInfo, ToolCallParams, ToolCallResult, ToolsCapability,
    ToolsListResult, JSONRPC_VERSION, MCP_PROTOCOL_VERSION,
};
use crate::tools::{ToolContext, ToolRegistry};

/// Server configuration.
#[derive(Debug, Clone)]
pub struct McpServerConfig {
    pub server_name: String,
    pub server_version: String,
    /// Directory holding the catalog and datastore files.
    pub data_dir: PathBuf,
    /// MCP key token presented by the agent.
    pub key_token: String,
}

impl McpServerConfig {
    pub fn new(data_dir: impl Into<PathBuf>, key_token: impl Into<String>) -> Self {
        Self {
            server_name: "ecliptic-mcp".to_string(),
            server_version: env!("CARGO_PKG_VERSION").to_string(),
            data_dir: data_dir.into(),
            key_token: key_token.into(),
        }
    }
}

/// The resolved caller: one key inside one organization.
#[derive(Debug, Clone)]
pub struct KeyContext {
    pub organization_id: String,
    pub key_id: String,
}

/// MCP server bound to one key.
pub struct McpServer {
    config: McpServerConfig,
    state: AppState,
    caller: KeyContext,
    tools: ToolRegistry,
    initialized: bool,
}

impl McpServer {
    /// Open the catalog and resolve the presented key. Fails fast on an
    /// unknown or revoked token.
    pub async fn connect(config: McpServerConfig) -> Result<Self> {
        let state = AppState::init(EclipticConfig::new(&config.data_dir)).await?;
        let key = state.catalog.resolve_mcp_key(&config.key_token).await?;
        info!(key = %key.id, organization = %key.organization_id, "mcp key resolved");

        Ok(Self {
            config,
            state,
            caller: KeyContext {
                organization_id: key.organization_id,
                key_id: key.id,
            },
            tools: ToolRegistry::new(),
            initialized: false,
        })
    }

    pub fn caller(&self) -> &KeyContext {
        &self.caller
    }

    pub fn state(&self) -> &AppState {
        &self.state
    }

    /// Serve requests from stdin until EOF.
    pub async fn run(&mut self) -> anyhow::Result<()> {
        let stdin = BufReader::new(tokio::io::stdin());
        let mut lines = stdin.lines();
        let mut stdout = tokio::io::stdout();

        info!(name = %self.config.server_name, "mcp server ready");
        while let Some(line) = lines.next_line().await? {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }

            let response = match serde_json::from_str::<JsonRpcRequest>(line) {
                Ok(request) => self.handle_request(request).await,
                Err(err) => Some(JsonRpcResponse::error(
                    None,
                    JsonRpcError::new(ErrorCode::ParseError, format!("invalid JSON: {err}")),
                )),
            };

            if let Some(response) = response {
                let payload = serde_json::to_string(&response)?;
                stdout.write_all(payload.as_bytes()).await?;
                stdout.write_all(b"\n").await?;
                stdout.flush().await?;
            }
        }

        info!("stdin closed, shutting down");
        self.state.shutdown().await;
        Ok(())
    }

    /// Dispatch one request. Notifications return no response.
    pub async fn handle_request(&mut self, request: JsonRpcRequest) -> Option<JsonRpcResponse> {
        let id = request.id.clone();
        match request.method.as_str() {
            methods::INITIALIZE => {
                let result = InitializeResult {
                    protocol_version: MCP_PROTOCOL_VERSION.to_string(),
                    capabilities: ServerCapabilities {
                        tools: Some(ToolsCapability {
                            list_changed: false,
                        }),
                    },
                    server_info: ServerInfo {
                        name: self.config.server_name.clone(),
                        version: self.config.server_version.clone(),
                    },
                };
                Some(JsonRpcResponse::success(
                    id,
                    serde_json::to_value(result).expect("initialize result serializes"),
                ))
            }
            methods::INITIALIZED => {
                self.initialized = true;
                debug!("client initialized");
                None
            }
            methods::PING => Some(JsonRpcResponse::success(id, serde_json::json!({}))),
            methods::TOOLS_LIST => {
                let result = ToolsListResult {
                    tools: self.tools.list_tools(),
                };
                Some(JsonRpcResponse::success(
                    id,
                    serde_json::to_value(result).expect("tool list serializes"),
                ))
            }
            methods::TOOLS_CALL => Some(self.handle_tool_call(id, request.params).await),
            _ => {
                if id.is_none() {
                    // Unknown notification: ignore.
                    return None;
                }
                Some(JsonRpcResponse::error(
                    id,
                    JsonRpcError::new(
                        ErrorCode::MethodNotFound,
                        format!("unknown method: {}", request.method),
                    ),
                ))
            }
        }
    }

    async fn handle_tool_call(
        &self,
        id: Option<crate::protocol::RequestId>,
        params: Option<serde_json::Value>,
    ) -> JsonRpcResponse {
        let params: ToolCallParams = match params.and_then(|p| serde_json::from_value(p).ok()) {
            Some(params) => params,
            None => {
                return JsonRpcResponse::error(
                    id,
                    JsonRpcError::new(ErrorCode::InvalidParams, "missing tool call params"),
                )
            }
        };

        let tcx = ToolContext {
            state: &self.state,
            caller: &self.caller,
        };

        let result = match self
            .tools
            .call_tool(&params.name, params.arguments, &tcx)
            .await
        {
            Ok(value) => ToolCallResult::ok(&value),
            Err(entry) => {
                // Failures surface as error-shaped tool results, not
                // JSON-RPC errors; the transport call itself succeeded.
                if entry.should_log {
                    self.state
                        .catalog
                        .log_error(Some(&self.caller.organization_id), &entry);
                }
                warn!(tool = %params.name, code = %entry.code, "tool call failed");
                ToolCallResult::err(entry.external_message(ecliptic_fault::DEFAULT_LOCALE))
            }
        };

        JsonRpcResponse::success(
            id,
            serde_json::to_value(result).expect("tool result serializes"),
        )
    }
}
