//! In-memory vector store over chunk records: upsert, delete-by-file,
//! filtered cosine similarity search, and name lookup. Readers and the
//! single writer coordinate through one `RwLock`; a file's chunks are
//! replaced under a single write guard so readers never observe a
//! half-deleted file.

use std::collections::{BTreeMap, HashMap};

use serde::Serialize;
use tokio::sync::RwLock;

use crate::parser::{Chunk, ChunkKind, Language};

/// Conjunction of optional metadata predicates, applied before scoring so
/// `limit` counts only among matching chunks.
#[derive(Debug, Clone, Copy, Default)]
pub struct SearchFilter {
    pub language: Option<Language>,
    pub kind: Option<ChunkKind>,
}

impl SearchFilter {
    fn matches(&self, chunk: &Chunk) -> bool {
        if let Some(language) = self.language {
            if chunk.language != language {
                return false;
            }
        }
        if let Some(kind) = self.kind {
            if chunk.kind != kind {
                return false;
            }
        }
        true
    }
}

/// One scored search result.
#[derive(Debug, Clone)]
pub struct SearchHit {
    pub chunk: Chunk,
    pub score: f32,
}

/// Aggregate store statistics.
#[derive(Debug, Clone, Serialize)]
pub struct StoreStats {
    pub chunk_count: usize,
    pub file_count: usize,
    pub by_language: BTreeMap<String, usize>,
    pub by_kind: BTreeMap<String, usize>,
}

/// Chunk + vector storage for one workspace index.
#[derive(Default)]
pub struct VectorStore {
    chunks: RwLock<HashMap<String, Chunk>>,
}

impl VectorStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace a chunk by id (last write wins).
    pub async fn upsert(&self, chunk: Chunk) {
        self.chunks.write().await.insert(chunk.id.clone(), chunk);
    }

    /// Atomically swap a file's chunks: everything previously owned by
    /// `file_path` is removed and `chunks` inserted under one write guard.
    pub async fn replace_file(&self, file_path: &str, chunks: Vec<Chunk>) {
        let mut guard = self.chunks.write().await;
        guard.retain(|_, c| c.file_path != file_path);
        for chunk in chunks {
            guard.insert(chunk.id.clone(), chunk);
        }
    }

    /// Remove all chunks owned by a file; returns how many were removed.
    pub async fn delete_file(&self, file_path: &str) -> usize {
        let mut guard = self.chunks.write().await;
        let before = guard.len();
        guard.retain(|_, c| c.file_path != file_path);
        before - guard.len()
    }

    /// Ranked cosine similarity search. Filters are applied as a pre-filter;
    /// only chunks scoring at or above `threshold` are returned, descending,
    /// capped at `limit`. An empty store yields an empty list.
    pub async fn similarity_search(
        &self,
        query: &[f32],
        limit: usize,
        threshold: f32,
        filter: &SearchFilter,
    ) -> Vec<SearchHit> {
        let guard = self.chunks.read().await;

        let mut scored: Vec<SearchHit> = guard
            .values()
            .filter(|c| filter.matches(c))
            .map(|c| SearchHit {
                score: cosine_similarity(query, &c.embedding),
                chunk: c.clone(),
            })
            .filter(|hit| hit.score >= threshold)
            .collect();

        // Tie-break on id so identical inputs yield identical rankings.
        scored.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.chunk.id.cmp(&b.chunk.id))
        });
        scored.truncate(limit);
        scored
    }

    /// Exact name match, falling back to case-insensitive substring match.
    /// Results are sorted by `(file_path, start_line)`.
    pub async fn find_by_name(&self, identifier: &str) -> Vec<Chunk> {
        let guard = self.chunks.read().await;

        let mut matches: Vec<Chunk> = guard
            .values()
            .filter(|c| c.name.as_deref() == Some(identifier))
            .cloned()
            .collect();

        if matches.is_empty() {
            let needle = identifier.to_lowercase();
            matches = guard
                .values()
                .filter(|c| {
                    c.name
                        .as_ref()
                        .map_or(false, |n| n.to_lowercase().contains(&needle))
                })
                .cloned()
                .collect();
        }

        matches.sort_by(|a, b| {
            a.file_path
                .cmp(&b.file_path)
                .then_with(|| a.start_line.cmp(&b.start_line))
        });
        matches
    }

    /// All chunks owned by a file, sorted by start line.
    pub async fn chunks_for_file(&self, file_path: &str) -> Vec<Chunk> {
        let guard = self.chunks.read().await;
        let mut chunks: Vec<Chunk> = guard
            .values()
            .filter(|c| c.file_path == file_path)
            .cloned()
            .collect();
        chunks.sort_by_key(|c| c.start_line);
        chunks
    }

    pub async fn stats(&self) -> StoreStats {
        let guard = self.chunks.read().await;

        let mut by_language: BTreeMap<String, usize> = BTreeMap::new();
        let mut by_kind: BTreeMap<String, usize> = BTreeMap::new();
        let mut files: std::collections::HashSet<&str> = std::collections::HashSet::new();

        for chunk in guard.values() {
            *by_language.entry(chunk.language.as_str().to_string()).or_insert(0) += 1;
            *by_kind.entry(chunk.kind.as_str().to_string()).or_insert(0) += 1;
            files.insert(chunk.file_path.as_str());
        }

        StoreStats {
            chunk_count: guard.len(),
            file_count: files.len(),
            by_language,
            by_kind,
        }
    }

    /// Snapshot of every chunk, for state persistence.
    pub async fn export(&self) -> Vec<Chunk> {
        let mut chunks: Vec<Chunk> = self.chunks.read().await.values().cloned().collect();
        chunks.sort_by(|a, b| a.id.cmp(&b.id));
        chunks
    }

    /// Bulk-load chunks, replacing current contents. Used when restoring
    /// persisted state.
    pub async fn import(&self, chunks: Vec<Chunk>) {
        let mut guard = self.chunks.write().await;
        guard.clear();
        for chunk in chunks {
            guard.insert(chunk.id.clone(), chunk);
        }
    }

    pub async fn clear(&self) {
        self.chunks.write().await.clear();
    }
}

fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let mut dot = 0.0f32;
    let mut norm_a = 0.0f32;
    let mut norm_b = 0.0f32;

    for i in 0..a.len() {
        dot += a[i] * b[i];
        norm_a += a[i] * a[i];
        norm_b += b[i] * b[i];
    }

    let denom = norm_a.sqrt() * norm_b.sqrt();
    if denom == 0.0 {
        0.0
    } else {
        dot / denom
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chunk(id: &str, file: &str, kind: ChunkKind, name: Option<&str>, embedding: Vec<f32>) -> Chunk {
        Chunk {
            id: id.to_string(),
            file_path: file.to_string(),
            language: Language::Python,
            kind,
            name: name.map(String::from),
            start_line: 1,
            end_line: 2,
            content: "body".to_string(),
            docstring: None,
            content_hash: "h".to_string(),
            embedding,
        }
    }

    #[tokio::test]
    async fn test_upsert_replaces_by_id() {
        let store = VectorStore::new();
        store.upsert(chunk("a", "f.py", ChunkKind::Function, Some("one"), vec![1.0, 0.0])).await;
        store.upsert(chunk("a", "f.py", ChunkKind::Function, Some("two"), vec![0.0, 1.0])).await;

        let stats = store.stats().await;
        assert_eq!(stats.chunk_count, 1);
        let found = store.find_by_name("two").await;
        assert_eq!(found.len(), 1);
    }

    #[tokio::test]
    async fn test_search_empty_store_returns_empty() {
        let store = VectorStore::new();
        let hits = store
            .similarity_search(&[1.0, 0.0], 10, 0.0, &SearchFilter::default())
            .await;
        assert!(hits.is_empty());
    }

    #[tokio::test]
    async fn test_search_threshold_and_order() {
        let store = VectorStore::new();
        store.upsert(chunk("a", "f.py", ChunkKind::Function, Some("close"), vec![1.0, 0.0])).await;
        store.upsert(chunk("b", "f.py", ChunkKind::Function, Some("mid"), vec![1.0, 1.0])).await;
        store.upsert(chunk("c", "f.py", ChunkKind::Function, Some("far"), vec![-1.0, 0.0])).await;

        let hits = store
            .similarity_search(&[1.0, 0.0], 10, 0.5, &SearchFilter::default())
            .await;
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].chunk.id, "a");
        assert!(hits[0].score >= hits[1].score);
    }

    #[tokio::test]
    async fn test_filter_is_applied_before_limit() {
        let store = VectorStore::new();
        // Two high-scoring functions and one lower-scoring class.
        store.upsert(chunk("a", "f.py", ChunkKind::Function, None, vec![1.0, 0.0])).await;
        store.upsert(chunk("b", "f.py", ChunkKind::Function, None, vec![1.0, 0.1])).await;
        store.upsert(chunk("c", "f.py", ChunkKind::Class, Some("C"), vec![1.0, 1.0])).await;

        let filter = SearchFilter {
            kind: Some(ChunkKind::Class),
            ..SearchFilter::default()
        };
        let hits = store.similarity_search(&[1.0, 0.0], 1, 0.0, &filter).await;
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].chunk.id, "c");
    }

    #[tokio::test]
    async fn test_delete_file_removes_only_that_file() {
        let store = VectorStore::new();
        store.upsert(chunk("a", "f.py", ChunkKind::Function, None, vec![1.0])).await;
        store.upsert(chunk("b", "g.py", ChunkKind::Function, None, vec![1.0])).await;

        let removed = store.delete_file("f.py").await;
        assert_eq!(removed, 1);
        assert_eq!(store.stats().await.chunk_count, 1);
    }

    #[tokio::test]
    async fn test_find_by_name_substring_fallback() {
        let store = VectorStore::new();
        store.upsert(chunk("a", "b.py", ChunkKind::Function, Some("load_config"), vec![1.0])).await;
        store.upsert(chunk("b", "a.py", ChunkKind::Function, Some("config"), vec![1.0])).await;

        // Exact match wins outright.
        let exact = store.find_by_name("config").await;
        assert_eq!(exact.len(), 1);
        assert_eq!(exact[0].file_path, "a.py");

        // Substring fallback, sorted by file path.
        let fuzzy = store.find_by_name("Config").await;
        assert_eq!(fuzzy.len(), 2);
        assert_eq!(fuzzy[0].file_path, "a.py");
    }
}
