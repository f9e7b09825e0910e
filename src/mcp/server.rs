use super::protocol::Protocol;
use super::types::*;
use crate::embedding::ollama::OllamaEmbedding;
use crate::embedding::openai::OpenAiEmbedding;
use crate::embedding::EmbeddingProvider;
use crate::engine::{EngineConfig, RetrievalEngine};
use crate::handlers::tool_handlers::ToolHandlers;
use crate::index::Index;
use anyhow::Result;
use serde_json::json;
use std::path::PathBuf;
use std::sync::Arc;

const PROTOCOL_VERSION: &str = "2024-11-05";
const SERVER_NAME: &str = "code-retrieval-mcp";
const SERVER_VERSION: &str = "0.1.0";

/// Main MCP Server
pub struct McpServer {
    protocol: Protocol,
    tool_handlers: ToolHandlers,
}

impl McpServer {
    pub async fn new() -> Result<Self> {
        // Embedding provider from environment. Its availability is a
        // startup precondition; requests fail individually if it is down.
        let embedding = build_embedding_provider();

        let state_path = std::env::var("INDEX_STATE_PATH")
            .map(PathBuf::from)
            .unwrap_or_else(|_| {
                let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".to_string());
                PathBuf::from(home).join(".code-retrieval-mcp/state.json")
            });

        let index = Index::with_state_path(state_path).await?;
        let engine = Arc::new(RetrievalEngine::new(embedding, EngineConfig::default(), index));

        Ok(Self {
            protocol: Protocol::new(),
            tool_handlers: ToolHandlers::new(engine),
        })
    }

    pub async fn start(mut self) -> Result<()> {
        tracing::info!("MCP server started, waiting for requests...");

        loop {
            match self.protocol.read_request().await {
                Ok(Some(request)) => {
                    let response = self.handle_request(request).await;
                    if let Err(e) = self.protocol.send_response(response).await {
                        tracing::error!("Failed to send response: {}", e);
                    }
                }
                Ok(None) => {
                    tracing::info!("Client disconnected");
                    break;
                }
                Err(e) => {
                    tracing::error!("Failed to read request: {}", e);
                    let error_response = self
                        .protocol
                        .error_response(json!(null), JsonRpcError::parse_error());
                    let _ = self.protocol.send_response(error_response).await;
                }
            }
        }

        Ok(())
    }

    async fn handle_request(&self, request: JsonRpcRequest) -> JsonRpcResponse {
        tracing::debug!("Received request: method={}, id={:?}", request.method, request.id);

        match request.method.as_str() {
            "initialize" => self.handle_initialize(request.id, request.params),
            "notifications/initialized" => JsonRpcResponse {
                jsonrpc: "2.0".to_string(),
                id: request.id,
                result: Some(json!({})),
                error: None,
            },
            "tools/list" => self.handle_tools_list(request.id),
            "tools/call" => self.handle_tools_call(request.id, request.params).await,
            _ => self
                .protocol
                .error_response(request.id, JsonRpcError::method_not_found()),
        }
    }

    fn handle_initialize(&self, id: serde_json::Value, params: serde_json::Value) -> JsonRpcResponse {
        match serde_json::from_value::<InitializeRequest>(params) {
            Ok(req) => {
                tracing::info!("Client connected: {} v{}", req.client_info.name, req.client_info.version);
            }
            Err(e) => {
                tracing::warn!("Could not parse initialize params: {}", e);
            }
        }

        let response = InitializeResponse {
            protocol_version: PROTOCOL_VERSION.to_string(),
            capabilities: ServerCapabilities {
                tools: ToolsCapability {
                    list_changed: Some(true),
                },
            },
            server_info: ServerInfo {
                name: SERVER_NAME.to_string(),
                version: SERVER_VERSION.to_string(),
            },
        };

        self.protocol.success_response(id, json!(response))
    }

    fn handle_tools_list(&self, id: serde_json::Value) -> JsonRpcResponse {
        let tools = vec![
            Tool {
                name: "index_codebase".to_string(),
                description: "Index a directory tree for semantic code search. \
                              Incremental: unchanged files are skipped unless force_reindex is set."
                    .to_string(),
                input_schema: json!({
                    "type": "object",
                    "properties": {
                        "path": {
                            "type": "string",
                            "description": "Absolute path to the directory to index."
                        },
                        "force_reindex": {
                            "type": "boolean",
                            "description": "Re-index files even if their content is unchanged",
                            "default": false
                        }
                    },
                    "required": ["path"]
                }),
            },
            Tool {
                name: "search_code".to_string(),
                description: "Search indexed code by semantic similarity, optionally filtered \
                              by language and chunk kind. Returns structured JSON results."
                    .to_string(),
                input_schema: json!({
                    "type": "object",
                    "properties": {
                        "query": {
                            "type": "string",
                            "description": "Natural language query to search for"
                        },
                        "limit": {
                            "type": "number",
                            "description": "Maximum number of results to return",
                            "default": 10
                        },
                        "similarity_threshold": {
                            "type": "number",
                            "description": "Minimum similarity score",
                            "default": 0.3
                        },
                        "filter_language": {
                            "type": "string",
                            "description": "Restrict results to one language (e.g. python, rust)"
                        },
                        "filter_kind": {
                            "type": "string",
                            "description": "Restrict results to one chunk kind (module, import, function, class, method, variable)"
                        }
                    },
                    "required": ["query"]
                }),
            },
            Tool {
                name: "get_context".to_string(),
                description: "Look up a function or class by name and return it with sibling \
                              chunks from the same file."
                    .to_string(),
                input_schema: json!({
                    "type": "object",
                    "properties": {
                        "identifier": {
                            "type": "string",
                            "description": "Function or class name to look up"
                        },
                        "include_related": {
                            "type": "boolean",
                            "description": "Include sibling chunks from the same file",
                            "default": true
                        }
                    },
                    "required": ["identifier"]
                }),
            },
            Tool {
                name: "get_index_status".to_string(),
                description: "Get chunk and file counts for the current index, grouped by \
                              language and kind."
                    .to_string(),
                input_schema: json!({
                    "type": "object",
                    "properties": {},
                    "required": []
                }),
            },
            Tool {
                name: "clear_index".to_string(),
                description: "Clear the search index.".to_string(),
                input_schema: json!({
                    "type": "object",
                    "properties": {
                        "confirm": {
                            "type": "boolean",
                            "description": "Confirm deletion of the index",
                            "default": false
                        }
                    },
                    "required": []
                }),
            },
        ];

        let response = ListToolsResponse { tools };
        self.protocol.success_response(id, json!(response))
    }

    async fn handle_tools_call(&self, id: serde_json::Value, params: serde_json::Value) -> JsonRpcResponse {
        let call_request: CallToolRequest = match serde_json::from_value(params) {
            Ok(req) => req,
            Err(e) => {
                return self
                    .protocol
                    .error_response(id, JsonRpcError::internal_error(format!("Invalid params: {}", e)));
            }
        };

        let handlers = &self.tool_handlers;
        let result = match call_request.name.as_str() {
            "index_codebase" => handlers.handle_index_codebase(&call_request.arguments).await,
            "search_code" => handlers.handle_search_code(&call_request.arguments).await,
            "get_context" => handlers.handle_get_context(&call_request.arguments).await,
            "get_index_status" => handlers.handle_get_index_status(&call_request.arguments).await,
            "clear_index" => handlers.handle_clear_index(&call_request.arguments).await,
            _ => {
                return self.protocol.error_response(
                    id,
                    JsonRpcError::internal_error(format!("Unknown tool: {}", call_request.name)),
                );
            }
        };

        match result {
            Ok(content) => {
                let response = CallToolResponse {
                    content,
                    is_error: None,
                };
                self.protocol.success_response(id, json!(response))
            }
            Err(e) => {
                let response = CallToolResponse {
                    content: vec![Content::Text {
                        text: format!("Error: {}", e),
                    }],
                    is_error: Some(true),
                };
                self.protocol.success_response(id, json!(response))
            }
        }
    }
}

fn build_embedding_provider() -> Arc<dyn EmbeddingProvider> {
    let provider = std::env::var("EMBEDDING_PROVIDER").unwrap_or_else(|_| "ollama".to_string());

    match provider.as_str() {
        "openai" => {
            let base_url = std::env::var("OPENAI_BASE_URL")
                .unwrap_or_else(|_| "https://api.openai.com".to_string());
            let api_key = std::env::var("OPENAI_API_KEY").unwrap_or_default();
            let model = std::env::var("EMBEDDING_MODEL")
                .unwrap_or_else(|_| "text-embedding-3-small".to_string());
            Arc::new(OpenAiEmbedding::new(&base_url, &api_key, &model))
        }
        _ => {
            let host = std::env::var("OLLAMA_HOST")
                .unwrap_or_else(|_| "http://127.0.0.1:11434".to_string());
            let model = std::env::var("EMBEDDING_MODEL")
                .unwrap_or_else(|_| "nomic-embed-text".to_string());
            Arc::new(OllamaEmbedding::new(&host, &model))
        }
    }
}
