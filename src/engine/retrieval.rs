//! The read path: query embedding, filtered similarity search with result
//! quality classification, and identifier-based context expansion.

use serde::Serialize;

use super::RetrievalEngine;
use crate::error::{EngineError, Result};
use crate::parser::{Chunk, ChunkKind, Language};
use crate::store::SearchFilter;

pub const DEFAULT_SEARCH_LIMIT: usize = 10;
pub const DEFAULT_SIMILARITY_THRESHOLD: f32 = 0.3;

/// Per-call search parameters. Filter values arrive as caller-supplied
/// strings and are validated before the query runs.
#[derive(Debug, Clone)]
pub struct SearchOptions {
    pub limit: usize,
    pub threshold: f32,
    pub language: Option<String>,
    pub kind: Option<String>,
}

impl Default for SearchOptions {
    fn default() -> Self {
        Self {
            limit: DEFAULT_SEARCH_LIMIT,
            threshold: DEFAULT_SIMILARITY_THRESHOLD,
            language: None,
            kind: None,
        }
    }
}

/// Classification of an aggregate result set by mean similarity. The
/// boundaries are part of the caller contract and must stay stable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum QualityClass {
    Excellent,
    Good,
    Moderate,
    Broad,
    None,
}

impl QualityClass {
    pub fn from_mean_score(mean: Option<f32>) -> Self {
        match mean {
            Option::None => QualityClass::None,
            Some(m) if m >= 0.40 => QualityClass::Excellent,
            Some(m) if m >= 0.25 => QualityClass::Good,
            Some(m) if m >= 0.15 => QualityClass::Moderate,
            Some(_) => QualityClass::Broad,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            QualityClass::Excellent => "excellent",
            QualityClass::Good => "good",
            QualityClass::Moderate => "moderate",
            QualityClass::Broad => "broad",
            QualityClass::None => "none",
        }
    }
}

/// One search result row.
#[derive(Debug, Clone, Serialize)]
pub struct SearchResultItem {
    pub file_path: String,
    pub language: &'static str,
    pub kind: &'static str,
    pub name: Option<String>,
    pub start_line: usize,
    pub end_line: usize,
    pub content: String,
    pub score: f32,
}

/// Structured search response; the calling layer does any prose framing.
#[derive(Debug, Clone, Serialize)]
pub struct SearchResponse {
    pub results: Vec<SearchResultItem>,
    pub quality_class: QualityClass,
    pub result_count: usize,
    pub avg_similarity: f32,
}

/// A chunk as returned by the context expander.
#[derive(Debug, Clone, Serialize)]
pub struct ChunkView {
    pub file_path: String,
    pub language: &'static str,
    pub kind: &'static str,
    pub name: Option<String>,
    pub start_line: usize,
    pub end_line: usize,
    pub content: String,
    pub docstring: Option<String>,
}

impl From<Chunk> for ChunkView {
    fn from(chunk: Chunk) -> Self {
        Self {
            file_path: chunk.file_path,
            language: chunk.language.as_str(),
            kind: chunk.kind.as_str(),
            name: chunk.name,
            start_line: chunk.start_line,
            end_line: chunk.end_line,
            content: chunk.content,
            docstring: chunk.docstring,
        }
    }
}

/// Context for an identifier: the matching chunks plus siblings from the
/// same file.
#[derive(Debug, Clone, Serialize)]
pub struct ContextResponse {
    pub identifier: String,
    pub primary_chunks: Vec<ChunkView>,
    pub related_chunks: Vec<ChunkView>,
}

impl RetrievalEngine {
    /// Embed the query and run a filtered similarity search. The query text
    /// is embedded raw — the synthetic header convention applies only to
    /// chunks on the write path.
    pub async fn search(&self, query: &str, options: SearchOptions) -> Result<SearchResponse> {
        let filter = SearchFilter {
            language: parse_language_filter(options.language.as_deref())?,
            kind: parse_kind_filter(options.kind.as_deref())?,
        };

        let embedding = self
            .embedding()
            .embed(query)
            .await
            .map_err(|e| EngineError::Embedding(e.to_string()))?;

        let hits = self
            .index()
            .store()
            .similarity_search(&embedding.values, options.limit, options.threshold, &filter)
            .await;

        let result_count = hits.len();
        let avg_similarity = if result_count == 0 {
            0.0
        } else {
            hits.iter().map(|h| h.score).sum::<f32>() / result_count as f32
        };
        let mean = if result_count == 0 {
            None
        } else {
            Some(avg_similarity)
        };

        let results = hits
            .into_iter()
            .map(|hit| SearchResultItem {
                file_path: hit.chunk.file_path,
                language: hit.chunk.language.as_str(),
                kind: hit.chunk.kind.as_str(),
                name: hit.chunk.name,
                start_line: hit.chunk.start_line,
                end_line: hit.chunk.end_line,
                content: hit.chunk.content,
                score: hit.score,
            })
            .collect();

        Ok(SearchResponse {
            results,
            quality_class: QualityClass::from_mean_score(mean),
            result_count,
            avg_similarity,
        })
    }

    /// Look up chunks by identifier. With `include_related`, sibling chunks
    /// from the same file are attached (up to the configured cap) to give
    /// surrounding context without a full file dump.
    pub async fn get_context(
        &self,
        identifier: &str,
        include_related: bool,
    ) -> Result<ContextResponse> {
        let matches = self.index().store().find_by_name(identifier).await;
        if matches.is_empty() {
            return Err(EngineError::NotFound(identifier.to_string()));
        }

        let mut related = Vec::new();
        if include_related {
            let primary_file = matches[0].file_path.clone();
            let primary_ids: std::collections::HashSet<&str> =
                matches.iter().map(|c| c.id.as_str()).collect();

            related = self
                .index()
                .store()
                .chunks_for_file(&primary_file)
                .await
                .into_iter()
                .filter(|c| !primary_ids.contains(c.id.as_str()))
                .take(self.config().related_limit)
                .map(ChunkView::from)
                .collect();
        }

        Ok(ContextResponse {
            identifier: identifier.to_string(),
            primary_chunks: matches.into_iter().map(ChunkView::from).collect(),
            related_chunks: related,
        })
    }
}

fn parse_language_filter(value: Option<&str>) -> Result<Option<Language>> {
    match value {
        None => Ok(None),
        Some(v) => Language::parse_filter(v)
            .map(Some)
            .ok_or_else(|| EngineError::InvalidFilter {
                field: "language",
                value: v.to_string(),
            }),
    }
}

fn parse_kind_filter(value: Option<&str>) -> Result<Option<ChunkKind>> {
    match value {
        None => Ok(None),
        Some(v) => ChunkKind::parse_filter(v)
            .map(Some)
            .ok_or_else(|| EngineError::InvalidFilter {
                field: "kind",
                value: v.to_string(),
            }),
    }
}
