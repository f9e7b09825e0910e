//! MCP tool handlers: argument parsing and JSON result shaping around the
//! engine's four operations. Results are serialized response structs — the
//! chat layer upstream does any natural-language framing.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use serde_json::{json, Value};

use crate::engine::indexer::IndexOptions;
use crate::engine::retrieval::SearchOptions;
use crate::engine::RetrievalEngine;
use crate::mcp::types::Content;

/// Tool handlers for the MCP server.
pub struct ToolHandlers {
    engine: Arc<RetrievalEngine>,
}

impl ToolHandlers {
    pub fn new(engine: Arc<RetrievalEngine>) -> Self {
        Self { engine }
    }

    /// Handle index_codebase tool
    pub async fn handle_index_codebase(&self, args: &Value) -> Result<Vec<Content>> {
        let path = args
            .get("path")
            .and_then(|v| v.as_str())
            .context("Missing 'path' argument")?;

        let force = args
            .get("force_reindex")
            .and_then(|v| v.as_bool())
            .unwrap_or(false);

        let path = PathBuf::from(path);
        if !path.is_dir() {
            anyhow::bail!("Path is not a directory: {}", path.display());
        }

        let report = self
            .engine
            .index_directory(
                &path,
                IndexOptions {
                    force_reindex: force,
                    ..IndexOptions::default()
                },
            )
            .await?;

        Ok(vec![Content::Text {
            text: serde_json::to_string_pretty(&report)?,
        }])
    }

    /// Handle search_code tool
    pub async fn handle_search_code(&self, args: &Value) -> Result<Vec<Content>> {
        let query = args
            .get("query")
            .and_then(|v| v.as_str())
            .context("Missing 'query' argument")?;

        let mut options = SearchOptions::default();
        if let Some(limit) = args.get("limit").and_then(|v| v.as_u64()) {
            options.limit = limit as usize;
        }
        if let Some(threshold) = args.get("similarity_threshold").and_then(|v| v.as_f64()) {
            options.threshold = threshold as f32;
        }
        options.language = args
            .get("filter_language")
            .and_then(|v| v.as_str())
            .map(String::from);
        options.kind = args
            .get("filter_kind")
            .and_then(|v| v.as_str())
            .map(String::from);

        let response = self.engine.search(query, options).await?;

        Ok(vec![Content::Text {
            text: serde_json::to_string_pretty(&response)?,
        }])
    }

    /// Handle get_context tool
    pub async fn handle_get_context(&self, args: &Value) -> Result<Vec<Content>> {
        let identifier = args
            .get("identifier")
            .and_then(|v| v.as_str())
            .context("Missing 'identifier' argument")?;

        let include_related = args
            .get("include_related")
            .and_then(|v| v.as_bool())
            .unwrap_or(true);

        let response = self.engine.get_context(identifier, include_related).await?;

        Ok(vec![Content::Text {
            text: serde_json::to_string_pretty(&response)?,
        }])
    }

    /// Handle get_index_status tool
    pub async fn handle_get_index_status(&self, _args: &Value) -> Result<Vec<Content>> {
        let status = self.engine.status().await;

        Ok(vec![Content::Text {
            text: serde_json::to_string_pretty(&status)?,
        }])
    }

    /// Handle clear_index tool
    pub async fn handle_clear_index(&self, args: &Value) -> Result<Vec<Content>> {
        let confirm = args.get("confirm").and_then(|v| v.as_bool()).unwrap_or(false);

        if !confirm {
            return Ok(vec![Content::Text {
                text: serde_json::to_string_pretty(&json!({
                    "cleared": false,
                    "hint": "Pass confirm=true to clear the index."
                }))?,
            }]);
        }

        self.engine.clear().await?;

        Ok(vec![Content::Text {
            text: serde_json::to_string_pretty(&json!({ "cleared": true }))?,
        }])
    }
}
