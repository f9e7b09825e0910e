//! Integration tests for the indexing and retrieval pipeline.
//!
//! These exercise the full flow — scan, parse, extract, embed, store,
//! search — with a deterministic bag-of-tokens embedding, so no model
//! server is required.

use std::path::Path;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;

use code_retrieval_mcp::embedding::{Embedding, EmbeddingProvider};
use code_retrieval_mcp::engine::indexer::{IndexOptions, IndexProgress};
use code_retrieval_mcp::engine::retrieval::{QualityClass, SearchOptions};
use code_retrieval_mcp::engine::{EngineConfig, RetrievalEngine};
use code_retrieval_mcp::index::Index;
use code_retrieval_mcp::{ChunkKind, EngineError};

const DIM: usize = 128;

/// Deterministic test embedding: tokens hashed into a fixed-size
/// bag-of-words vector, L2-normalized. Texts sharing tokens score high
/// under cosine similarity, which is all these tests need.
struct HashedEmbedding;

fn fnv1a(token: &str) -> u64 {
    let mut hash: u64 = 0xcbf2_9ce4_8422_2325;
    for byte in token.bytes() {
        hash ^= u64::from(byte);
        hash = hash.wrapping_mul(0x0000_0100_0000_01b3);
    }
    hash
}

fn embed_text(text: &str) -> Vec<f32> {
    let mut values = vec![0f32; DIM];
    for token in text
        .split(|c: char| !c.is_alphanumeric() && c != '_')
        .filter(|t| !t.is_empty())
    {
        let bucket = (fnv1a(&token.to_lowercase()) % DIM as u64) as usize;
        values[bucket] += 1.0;
    }
    let norm = values.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm > 0.0 {
        for x in &mut values {
            *x /= norm;
        }
    }
    values
}

#[async_trait::async_trait]
impl EmbeddingProvider for HashedEmbedding {
    async fn embed(&self, text: &str) -> anyhow::Result<Embedding> {
        Ok(Embedding {
            values: embed_text(text),
        })
    }

    async fn embed_batch(&self, texts: &[&str]) -> anyhow::Result<Vec<Embedding>> {
        Ok(texts
            .iter()
            .map(|t| Embedding {
                values: embed_text(t),
            })
            .collect())
    }

    fn dimension(&self) -> usize {
        DIM
    }
}

fn engine() -> RetrievalEngine {
    RetrievalEngine::new(Arc::new(HashedEmbedding), EngineConfig::default(), Index::new())
}

const SAMPLE_MODULE: &str = "\
def foo():
    return 42

class Bar:
    \"\"\"Class definition used by the tests.\"\"\"

    def baz(self):
        return 1

    def qux(self):
        return 2
";

fn write(root: &Path, rel: &str, content: &str) {
    let path = root.join(rel);
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).unwrap();
    }
    std::fs::write(path, content).unwrap();
}

async fn index(engine: &RetrievalEngine, root: &Path) -> code_retrieval_mcp::engine::indexer::IndexReport {
    engine
        .index_directory(root, IndexOptions::default())
        .await
        .unwrap()
}

#[tokio::test]
async fn test_single_module_yields_expected_chunks() {
    let dir = tempfile::tempdir().unwrap();
    write(dir.path(), "sample.py", SAMPLE_MODULE);

    let engine = engine();
    let report = index(&engine, dir.path()).await;

    assert_eq!(report.indexed_files, 1);
    assert_eq!(report.chunk_count, 4);
    assert!(report.errors.is_empty());

    let chunks = engine.index().store().chunks_for_file("sample.py").await;
    assert_eq!(chunks.len(), 4);

    let named = |n: &str| chunks.iter().find(|c| c.name.as_deref() == Some(n)).unwrap();
    assert_eq!(named("foo").kind, ChunkKind::Function);
    assert_eq!(named("Bar").kind, ChunkKind::Class);
    assert_eq!(named("baz").kind, ChunkKind::Method);
    assert_eq!(named("qux").kind, ChunkKind::Method);

    // The class chunk spans both method chunks.
    let bar = named("Bar");
    for method in ["baz", "qux"] {
        let m = named(method);
        assert!(bar.start_line <= m.start_line && m.end_line <= bar.end_line);
    }
}

#[tokio::test]
async fn test_kind_filtered_search_returns_class_only() {
    let dir = tempfile::tempdir().unwrap();
    write(dir.path(), "sample.py", SAMPLE_MODULE);

    let engine = engine();
    index(&engine, dir.path()).await;

    let response = engine
        .search(
            "class definition",
            SearchOptions {
                threshold: 0.3,
                kind: Some("class".to_string()),
                ..SearchOptions::default()
            },
        )
        .await
        .unwrap();

    assert_eq!(response.result_count, 1);
    assert_eq!(response.results[0].name.as_deref(), Some("Bar"));
    assert!(response.results[0].score >= 0.3);
    for excluded in ["foo", "baz", "qux"] {
        assert!(response.results.iter().all(|r| r.name.as_deref() != Some(excluded)));
    }
}

#[tokio::test]
async fn test_get_context_returns_primary_and_siblings() {
    let dir = tempfile::tempdir().unwrap();
    write(dir.path(), "sample.py", SAMPLE_MODULE);

    let engine = engine();
    index(&engine, dir.path()).await;

    let context = engine.get_context("foo", true).await.unwrap();
    assert_eq!(context.primary_chunks.len(), 1);
    assert_eq!(context.primary_chunks[0].name.as_deref(), Some("foo"));

    let related: Vec<_> = context
        .related_chunks
        .iter()
        .map(|c| c.name.as_deref().unwrap())
        .collect();
    assert_eq!(related, vec!["Bar", "baz", "qux"]);
}

#[tokio::test]
async fn test_get_context_unknown_identifier_is_not_found() {
    let engine = engine();
    let result = engine.get_context("does_not_exist", true).await;
    assert!(matches!(result, Err(EngineError::NotFound(_))));
}

#[tokio::test]
async fn test_unparseable_file_falls_back_with_parse_error() {
    let dir = tempfile::tempdir().unwrap();
    write(dir.path(), "broken.py", "def broken(:\n    pass\n");

    let engine = engine();
    let report = index(&engine, dir.path()).await;

    assert_eq!(report.errors.len(), 1);
    assert_eq!(report.errors[0].error_kind, "parse");
    assert_eq!(report.errors[0].file_path, "broken.py");

    let chunks = engine.index().store().chunks_for_file("broken.py").await;
    assert!(!chunks.is_empty());
    assert!(chunks.iter().all(|c| c.kind == ChunkKind::Module));
}

#[tokio::test]
async fn test_search_on_empty_index() {
    let engine = engine();
    let response = engine
        .search("anything at all", SearchOptions::default())
        .await
        .unwrap();

    assert_eq!(response.result_count, 0);
    assert_eq!(response.quality_class, QualityClass::None);
    assert_eq!(response.avg_similarity, 0.0);
}

#[tokio::test]
async fn test_reindexing_unchanged_file_is_idempotent() {
    let dir = tempfile::tempdir().unwrap();
    write(dir.path(), "sample.py", SAMPLE_MODULE);

    let engine = engine();
    index(&engine, dir.path()).await;
    let ids_before: Vec<String> = engine
        .index()
        .store()
        .export()
        .await
        .into_iter()
        .map(|c| c.id)
        .collect();

    let second = index(&engine, dir.path()).await;
    assert_eq!(second.indexed_files, 0);
    assert_eq!(second.skipped_files, 1);
    assert_eq!(second.chunk_count, 0);

    let ids_after: Vec<String> = engine
        .index()
        .store()
        .export()
        .await
        .into_iter()
        .map(|c| c.id)
        .collect();
    assert_eq!(ids_before, ids_after);
}

#[tokio::test]
async fn test_force_reindex_processes_unchanged_files() {
    let dir = tempfile::tempdir().unwrap();
    write(dir.path(), "sample.py", SAMPLE_MODULE);

    let engine = engine();
    index(&engine, dir.path()).await;

    let forced = engine
        .index_directory(
            dir.path(),
            IndexOptions {
                force_reindex: true,
                ..IndexOptions::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(forced.indexed_files, 1);
    assert_eq!(forced.chunk_count, 4);
}

#[tokio::test]
async fn test_search_is_deterministic() {
    let dir = tempfile::tempdir().unwrap();
    write(dir.path(), "sample.py", SAMPLE_MODULE);

    let engine = engine();
    index(&engine, dir.path()).await;

    let options = SearchOptions {
        threshold: 0.0,
        ..SearchOptions::default()
    };
    let first = engine.search("return value", options.clone()).await.unwrap();
    let second = engine.search("return value", options).await.unwrap();

    let shape = |r: &code_retrieval_mcp::engine::retrieval::SearchResponse| {
        r.results
            .iter()
            .map(|i| (i.file_path.clone(), i.start_line, i.score))
            .collect::<Vec<_>>()
    };
    assert_eq!(shape(&first), shape(&second));
}

#[tokio::test]
async fn test_lower_threshold_yields_superset() {
    let dir = tempfile::tempdir().unwrap();
    write(dir.path(), "sample.py", SAMPLE_MODULE);
    write(
        dir.path(),
        "other.py",
        "def unrelated_helper():\n    return 'zzz'\n",
    );

    let engine = engine();
    index(&engine, dir.path()).await;

    let search = |threshold: f32| {
        let engine = &engine;
        async move {
            engine
                .search(
                    "class definition",
                    SearchOptions {
                        limit: 50,
                        threshold,
                        ..SearchOptions::default()
                    },
                )
                .await
                .unwrap()
        }
    };

    let loose = search(0.0).await;
    let strict = search(0.3).await;

    let keys = |r: &code_retrieval_mcp::engine::retrieval::SearchResponse| {
        r.results
            .iter()
            .map(|i| (i.file_path.clone(), i.start_line))
            .collect::<Vec<_>>()
    };
    let loose_keys = keys(&loose);
    for key in keys(&strict) {
        assert!(loose_keys.contains(&key));
    }
    assert!(loose.result_count >= strict.result_count);
}

#[tokio::test]
async fn test_deleted_file_chunks_are_swept() {
    let dir = tempfile::tempdir().unwrap();
    write(dir.path(), "sample.py", SAMPLE_MODULE);
    write(dir.path(), "gone.py", "def vanishing():\n    return 0\n");

    let engine = engine();
    index(&engine, dir.path()).await;

    let before = engine.index().store().stats().await;
    let gone_chunks = engine.index().store().chunks_for_file("gone.py").await.len();
    assert!(gone_chunks > 0);

    std::fs::remove_file(dir.path().join("gone.py")).unwrap();
    let report = index(&engine, dir.path()).await;
    assert_eq!(report.deleted_files, 1);

    let after = engine.index().store().stats().await;
    assert_eq!(after.chunk_count, before.chunk_count - gone_chunks);
    assert!(engine.index().store().chunks_for_file("gone.py").await.is_empty());
}

#[tokio::test]
async fn test_chunk_content_matches_source_span() {
    let dir = tempfile::tempdir().unwrap();
    write(dir.path(), "sample.py", SAMPLE_MODULE);

    let engine = engine();
    index(&engine, dir.path()).await;

    let lines: Vec<&str> = SAMPLE_MODULE.lines().collect();
    for chunk in engine.index().store().export().await {
        let expected = lines[chunk.start_line - 1..chunk.end_line].join("\n");
        assert_eq!(chunk.content, expected, "span mismatch for {:?}", chunk.name);
    }
}

#[tokio::test]
async fn test_unknown_language_file_gets_module_chunks() {
    let dir = tempfile::tempdir().unwrap();
    write(
        dir.path(),
        "notes.txt",
        "installation instructions\nrun the setup script\n\nthen start the server\n",
    );

    let engine = engine();
    let report = index(&engine, dir.path()).await;
    assert!(report.errors.is_empty());

    let chunks = engine.index().store().chunks_for_file("notes.txt").await;
    assert!(!chunks.is_empty());
    assert!(chunks.iter().all(|c| c.kind == ChunkKind::Module));

    let response = engine
        .search(
            "installation instructions",
            SearchOptions {
                threshold: 0.0,
                language: Some("unknown".to_string()),
                ..SearchOptions::default()
            },
        )
        .await
        .unwrap();
    assert!(response.result_count > 0);
}

#[tokio::test]
async fn test_invalid_filter_is_rejected() {
    let engine = engine();
    let result = engine
        .search(
            "anything",
            SearchOptions {
                kind: Some("widget".to_string()),
                ..SearchOptions::default()
            },
        )
        .await;
    assert!(matches!(
        result,
        Err(EngineError::InvalidFilter { field: "kind", .. })
    ));
}

#[tokio::test]
async fn test_cancellation_stops_before_processing() {
    let dir = tempfile::tempdir().unwrap();
    write(dir.path(), "sample.py", SAMPLE_MODULE);

    let cancel = Arc::new(AtomicBool::new(true));
    let engine = engine();
    let report = engine
        .index_directory(
            dir.path(),
            IndexOptions {
                cancel: Some(cancel),
                ..IndexOptions::default()
            },
        )
        .await
        .unwrap();

    assert!(report.cancelled);
    assert_eq!(report.indexed_files, 0);
}

#[tokio::test]
async fn test_progress_counters_track_the_run() {
    let dir = tempfile::tempdir().unwrap();
    write(dir.path(), "sample.py", SAMPLE_MODULE);
    write(dir.path(), "other.py", "def helper():\n    return 1\n");

    let progress = Arc::new(IndexProgress::default());
    let engine = engine();
    engine
        .index_directory(
            dir.path(),
            IndexOptions {
                progress: Some(progress.clone()),
                ..IndexOptions::default()
            },
        )
        .await
        .unwrap();

    let (processed, total, chunks) = progress.snapshot();
    assert_eq!(processed, 2);
    assert_eq!(total, 2);
    assert_eq!(chunks, 5);
}

#[tokio::test]
async fn test_status_reports_counts_and_groupings() {
    let dir = tempfile::tempdir().unwrap();
    write(dir.path(), "sample.py", SAMPLE_MODULE);

    let engine = engine();
    index(&engine, dir.path()).await;

    let status = engine.status().await;
    assert_eq!(status.chunk_count, 4);
    assert_eq!(status.file_count, 1);
    assert_eq!(status.by_language.get("python"), Some(&4));
    assert_eq!(status.by_kind.get("method"), Some(&2));
    assert!(status.last_indexed_at.is_some());
}

#[tokio::test]
async fn test_clear_empties_the_index() {
    let dir = tempfile::tempdir().unwrap();
    write(dir.path(), "sample.py", SAMPLE_MODULE);

    let engine = engine();
    index(&engine, dir.path()).await;
    engine.clear().await.unwrap();

    let status = engine.status().await;
    assert_eq!(status.chunk_count, 0);
    assert_eq!(status.file_count, 0);
}

#[tokio::test]
async fn test_changed_file_is_reindexed_with_new_content() {
    let dir = tempfile::tempdir().unwrap();
    write(dir.path(), "sample.py", "def original():\n    return 1\n");

    let engine = engine();
    index(&engine, dir.path()).await;

    write(dir.path(), "sample.py", "def replacement():\n    return 2\n");
    let report = index(&engine, dir.path()).await;
    assert_eq!(report.indexed_files, 1);

    let chunks = engine.index().store().chunks_for_file("sample.py").await;
    assert_eq!(chunks.len(), 1);
    assert_eq!(chunks[0].name.as_deref(), Some("replacement"));
}
