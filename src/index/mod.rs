//! Per-workspace index: file-record bookkeeping, the vector store, the
//! single-writer permit, and JSON state persistence.

use std::collections::HashMap;
use std::path::PathBuf;
use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};
use tokio::sync::{Mutex, MutexGuard, RwLock};

use crate::error::Result;
use crate::parser::{Chunk, Language};
use crate::store::VectorStore;

/// Bookkeeping for one indexed file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileRecord {
    pub file_path: String,
    /// Whole-file content hash; an unchanged hash skips re-indexing.
    pub content_hash: String,
    pub language: Language,
    /// Ids of the chunks this file owns, in source order.
    pub chunk_ids: Vec<String>,
}

/// Shape persisted to the state file.
#[derive(Debug, Default, Serialize, Deserialize)]
struct PersistedState {
    files: HashMap<String, FileRecord>,
    chunks: Vec<Chunk>,
    last_indexed_at: Option<u64>,
}

/// The aggregate of all file records and chunks for one workspace.
///
/// Writes go through [`Index::writer_permit`] — one indexing pass at a time —
/// while reads hit the store's last-committed state unblocked. Each file
/// commits atomically from a reader's perspective.
pub struct Index {
    files: RwLock<HashMap<String, FileRecord>>,
    store: VectorStore,
    writer: Mutex<()>,
    state_path: Option<PathBuf>,
    last_indexed_at: RwLock<Option<u64>>,
}

impl Index {
    pub fn new() -> Self {
        Self {
            files: RwLock::new(HashMap::new()),
            store: VectorStore::new(),
            writer: Mutex::new(()),
            state_path: None,
            last_indexed_at: RwLock::new(None),
        }
    }

    /// Create an index persisting to `state_path`, restoring any existing
    /// state from it.
    pub async fn with_state_path(state_path: PathBuf) -> Result<Self> {
        let mut index = Self::new();
        index.state_path = Some(state_path.clone());

        if state_path.exists() {
            let data = tokio::fs::read_to_string(&state_path).await?;
            let state: PersistedState = serde_json::from_str(&data)?;
            index.store.import(state.chunks).await;
            *index.files.write().await = state.files;
            *index.last_indexed_at.write().await = state.last_indexed_at;
        }

        Ok(index)
    }

    pub fn store(&self) -> &VectorStore {
        &self.store
    }

    /// Acquire the single-writer permit. Concurrent indexing passes for the
    /// same workspace serialize here; readers are never blocked by it.
    pub async fn writer_permit(&self) -> MutexGuard<'_, ()> {
        self.writer.lock().await
    }

    pub async fn file_hash(&self, file_path: &str) -> Option<String> {
        self.files
            .read()
            .await
            .get(file_path)
            .map(|r| r.content_hash.clone())
    }

    pub async fn tracked_files(&self) -> Vec<String> {
        self.files.read().await.keys().cloned().collect()
    }

    pub async fn file_count(&self) -> usize {
        self.files.read().await.len()
    }

    /// Commit a file: its old chunks are deleted and the new set inserted
    /// under one store write guard, then the file record is updated.
    pub async fn commit_file(&self, record: FileRecord, chunks: Vec<Chunk>) {
        let file_path = record.file_path.clone();
        self.store.replace_file(&file_path, chunks).await;
        self.files.write().await.insert(file_path, record);
    }

    /// Drop a file's record and all chunks it owns; returns the number of
    /// chunks removed.
    pub async fn remove_file(&self, file_path: &str) -> usize {
        let removed = self.store.delete_file(file_path).await;
        self.files.write().await.remove(file_path);
        removed
    }

    pub async fn clear(&self) {
        self.store.clear().await;
        self.files.write().await.clear();
        *self.last_indexed_at.write().await = None;
    }

    /// Stamp the completion time of an indexing pass.
    pub async fn mark_indexed(&self) {
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or_default();
        *self.last_indexed_at.write().await = Some(now);
    }

    pub async fn last_indexed_at(&self) -> Option<u64> {
        *self.last_indexed_at.read().await
    }

    /// Persist the current state if a state path is configured.
    pub async fn save(&self) -> Result<()> {
        let Some(path) = &self.state_path else {
            return Ok(());
        };

        let state = PersistedState {
            files: self.files.read().await.clone(),
            chunks: self.store.export().await,
            last_indexed_at: self.last_indexed_at().await,
        };

        let data = serde_json::to_string_pretty(&state)?;
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(path, data).await?;
        Ok(())
    }
}

impl Default for Index {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::ChunkKind;

    fn chunk(id: &str, file: &str) -> Chunk {
        Chunk {
            id: id.to_string(),
            file_path: file.to_string(),
            language: Language::Python,
            kind: ChunkKind::Function,
            name: Some(id.to_string()),
            start_line: 1,
            end_line: 2,
            content: "def f(): pass".to_string(),
            docstring: None,
            content_hash: "h".to_string(),
            embedding: vec![1.0, 0.0],
        }
    }

    fn record(file: &str, hash: &str, chunk_ids: Vec<String>) -> FileRecord {
        FileRecord {
            file_path: file.to_string(),
            content_hash: hash.to_string(),
            language: Language::Python,
            chunk_ids,
        }
    }

    #[tokio::test]
    async fn test_commit_replaces_previous_chunks() {
        let index = Index::new();
        index
            .commit_file(record("f.py", "h1", vec!["a".into()]), vec![chunk("a", "f.py")])
            .await;
        index
            .commit_file(record("f.py", "h2", vec!["b".into()]), vec![chunk("b", "f.py")])
            .await;

        let stats = index.store().stats().await;
        assert_eq!(stats.chunk_count, 1);
        assert_eq!(index.file_hash("f.py").await.as_deref(), Some("h2"));
    }

    #[tokio::test]
    async fn test_remove_file_drops_record_and_chunks() {
        let index = Index::new();
        index
            .commit_file(record("f.py", "h1", vec!["a".into()]), vec![chunk("a", "f.py")])
            .await;

        let removed = index.remove_file("f.py").await;
        assert_eq!(removed, 1);
        assert_eq!(index.file_count().await, 0);
        assert_eq!(index.store().stats().await.chunk_count, 0);
    }

    #[tokio::test]
    async fn test_state_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state.json");

        let index = Index::with_state_path(path.clone()).await.unwrap();
        index
            .commit_file(record("f.py", "h1", vec!["a".into()]), vec![chunk("a", "f.py")])
            .await;
        index.mark_indexed().await;
        index.save().await.unwrap();

        let restored = Index::with_state_path(path).await.unwrap();
        assert_eq!(restored.file_count().await, 1);
        assert_eq!(restored.store().stats().await.chunk_count, 1);
        assert!(restored.last_indexed_at().await.is_some());
    }
}
