//! The retrieval engine: ties the scanner, parsers, extractor, embedding
//! provider, and index together behind the four transport-agnostic
//! operations (`index_directory`, `search`, `get_context`, `status`).

pub mod indexer;
pub mod retrieval;

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;

use crate::embedding::EmbeddingProvider;
use crate::error::Result;
use crate::index::Index;
use crate::parser::extractor::{ChunkExtractor, ExtractorConfig};
use crate::parser::fallback::HeuristicParser;
use crate::parser::syntax::ParserRegistry;
use crate::scanner::ScanOptions;

/// Engine tunables. Defaults follow the shipped configuration; the MCP
/// server overrides individual fields from the environment.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    pub scan: ScanOptions,
    pub max_chunk_lines: usize,
    /// Sibling chunks returned by the context expander.
    pub related_limit: usize,
    /// Embedding retry policy for transient provider failures.
    pub embed_attempts: u32,
    pub embed_backoff: Duration,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            scan: ScanOptions::default(),
            max_chunk_lines: ExtractorConfig::default().max_chunk_lines,
            related_limit: 3,
            embed_attempts: 3,
            embed_backoff: Duration::from_millis(250),
        }
    }
}

/// Aggregate index status, serialized verbatim for callers.
#[derive(Debug, Clone, Serialize)]
pub struct StatusReport {
    pub chunk_count: usize,
    pub file_count: usize,
    pub by_language: BTreeMap<String, usize>,
    pub by_kind: BTreeMap<String, usize>,
    pub last_indexed_at: Option<u64>,
}

/// One engine instance per workspace. Cloneable handles are not needed:
/// callers share it behind an `Arc`.
pub struct RetrievalEngine {
    config: EngineConfig,
    parsers: ParserRegistry,
    fallback: HeuristicParser,
    extractor: ChunkExtractor,
    embedding: Arc<dyn EmbeddingProvider>,
    index: Index,
}

impl RetrievalEngine {
    pub fn new(embedding: Arc<dyn EmbeddingProvider>, config: EngineConfig, index: Index) -> Self {
        let extractor = ChunkExtractor::new(ExtractorConfig {
            max_chunk_lines: config.max_chunk_lines,
        });

        Self {
            config,
            parsers: ParserRegistry::new(),
            fallback: HeuristicParser::new(),
            extractor,
            embedding,
            index,
        }
    }

    pub fn index(&self) -> &Index {
        &self.index
    }

    pub(crate) fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub(crate) fn parsers(&self) -> &ParserRegistry {
        &self.parsers
    }

    pub(crate) fn fallback(&self) -> &HeuristicParser {
        &self.fallback
    }

    pub(crate) fn extractor(&self) -> &ChunkExtractor {
        &self.extractor
    }

    pub(crate) fn embedding(&self) -> &Arc<dyn EmbeddingProvider> {
        &self.embedding
    }

    /// Current index statistics.
    pub async fn status(&self) -> StatusReport {
        let stats = self.index.store().stats().await;
        StatusReport {
            chunk_count: stats.chunk_count,
            file_count: self.index.file_count().await,
            by_language: stats.by_language,
            by_kind: stats.by_kind,
            last_indexed_at: self.index.last_indexed_at().await,
        }
    }

    /// Drop every chunk and file record, persisting the empty state.
    pub async fn clear(&self) -> Result<()> {
        let _permit = self.index.writer_permit().await;
        self.index.clear().await;
        self.index.save().await
    }
}
