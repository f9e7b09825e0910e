//! The write path: scan, parse, extract, embed, commit — one file at a
//! time, isolated failures, per-file atomic commits.

use std::collections::HashSet;
use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use serde::Serialize;

use super::RetrievalEngine;
use crate::embedding::{chunk_embedding_text, Embedding};
use crate::error::{EngineError, Result};
use crate::index::FileRecord;
use crate::parser::syntax::{LanguageParser, NodeType, SyntaxNode};
use crate::parser::{hash_content, Chunk};
use crate::scanner::{scan, ScannedFile};

/// Options for one indexing pass.
#[derive(Default)]
pub struct IndexOptions {
    /// Re-parse and re-embed files even when their content hash is unchanged.
    pub force_reindex: bool,
    /// Cooperative cancellation, checked between files (never mid-file).
    pub cancel: Option<Arc<AtomicBool>>,
    /// Live progress counters, shared with the caller.
    pub progress: Option<Arc<IndexProgress>>,
}

/// Progress of an in-flight pass.
#[derive(Debug, Default)]
pub struct IndexProgress {
    files_processed: AtomicUsize,
    files_total: AtomicUsize,
    chunks_emitted: AtomicUsize,
}

impl IndexProgress {
    pub fn snapshot(&self) -> (usize, usize, usize) {
        (
            self.files_processed.load(Ordering::Relaxed),
            self.files_total.load(Ordering::Relaxed),
            self.chunks_emitted.load(Ordering::Relaxed),
        )
    }
}

/// A per-file failure recorded on the run report.
#[derive(Debug, Clone, Serialize)]
pub struct IndexErrorEntry {
    pub file_path: String,
    /// `parse` or `embedding`.
    pub error_kind: String,
    pub message: String,
}

/// Result of an indexing pass. The run always completes and reports;
/// failures are isolated to their file.
#[derive(Debug, Clone, Default, Serialize)]
pub struct IndexReport {
    pub indexed_files: usize,
    pub skipped_files: usize,
    pub deleted_files: usize,
    pub chunk_count: usize,
    pub errors: Vec<IndexErrorEntry>,
    pub cancelled: bool,
}

impl RetrievalEngine {
    /// Index a directory tree incrementally. Unchanged files (by content
    /// hash) are skipped unless `force_reindex` is set; changed files are
    /// re-chunked and swapped in atomically; files gone from the workspace
    /// have their chunks deleted.
    pub async fn index_directory(&self, root: &Path, options: IndexOptions) -> Result<IndexReport> {
        let _permit = self.index().writer_permit().await;

        tracing::info!("Indexing directory: {}", root.display());

        let files: Vec<ScannedFile> = scan(root, &self.config().scan).collect();
        let seen: HashSet<String> = files.iter().map(|f| f.relative_path.clone()).collect();

        if let Some(progress) = &options.progress {
            progress.files_total.store(files.len(), Ordering::Relaxed);
        }

        let mut report = IndexReport::default();

        for file in &files {
            if let Some(cancel) = &options.cancel {
                if cancel.load(Ordering::Relaxed) {
                    tracing::info!("Indexing cancelled after {} files", report.indexed_files);
                    report.cancelled = true;
                    break;
                }
            }

            self.index_one_file(file, options.force_reindex, &mut report)
                .await;

            if let Some(progress) = &options.progress {
                progress.files_processed.fetch_add(1, Ordering::Relaxed);
                progress
                    .chunks_emitted
                    .store(report.chunk_count, Ordering::Relaxed);
            }
        }

        // Sweep files that vanished from the workspace. Skipped when the
        // pass was cancelled: the scan may not have been acted on fully.
        if !report.cancelled {
            for tracked in self.index().tracked_files().await {
                if !seen.contains(&tracked) {
                    let removed = self.index().remove_file(&tracked).await;
                    tracing::debug!("Removed {} chunks for deleted file {}", removed, tracked);
                    report.deleted_files += 1;
                }
            }
        }

        self.index().mark_indexed().await;
        self.index().save().await?;

        tracing::info!(
            "Indexing complete: {} indexed, {} skipped, {} deleted, {} chunks, {} errors",
            report.indexed_files,
            report.skipped_files,
            report.deleted_files,
            report.chunk_count,
            report.errors.len()
        );

        Ok(report)
    }

    async fn index_one_file(&self, file: &ScannedFile, force: bool, report: &mut IndexReport) {
        if file.oversized {
            tracing::warn!(
                "Skipping {} ({} bytes over size cutoff)",
                file.relative_path,
                file.size
            );
            report.skipped_files += 1;
            return;
        }

        let source = match tokio::fs::read_to_string(&file.absolute_path).await {
            Ok(s) => s,
            Err(e) => {
                // Unreadable or non-UTF-8 content; not an indexing failure.
                tracing::debug!("Skipping {}: {}", file.relative_path, e);
                report.skipped_files += 1;
                return;
            }
        };

        let file_hash = hash_content(&source);
        if !force
            && self.index().file_hash(&file.relative_path).await.as_deref()
                == Some(file_hash.as_str())
        {
            report.skipped_files += 1;
            return;
        }

        let mut chunks = self.extract_chunks(file, &source, report);

        if !chunks.is_empty() {
            let texts: Vec<String> = chunks.iter().map(chunk_embedding_text).collect();
            let text_refs: Vec<&str> = texts.iter().map(|s| s.as_str()).collect();

            let embeddings = match self.embed_with_retry(&text_refs).await {
                Ok(e) if e.len() == chunks.len() => e,
                Ok(e) => {
                    report.errors.push(IndexErrorEntry {
                        file_path: file.relative_path.clone(),
                        error_kind: "embedding".to_string(),
                        message: format!("provider returned {} vectors for {} chunks", e.len(), chunks.len()),
                    });
                    report.skipped_files += 1;
                    return;
                }
                Err(e) => {
                    tracing::warn!("Failed to embed {}: {}", file.relative_path, e);
                    report.errors.push(IndexErrorEntry {
                        file_path: file.relative_path.clone(),
                        error_kind: "embedding".to_string(),
                        message: e.to_string(),
                    });
                    report.skipped_files += 1;
                    return;
                }
            };

            for (chunk, embedding) in chunks.iter_mut().zip(embeddings) {
                chunk.embedding = embedding.values;
            }
        }

        let record = FileRecord {
            file_path: file.relative_path.clone(),
            content_hash: file_hash,
            language: file.language,
            chunk_ids: chunks.iter().map(|c| c.id.clone()).collect(),
        };

        report.chunk_count += chunks.len();
        report.indexed_files += 1;
        self.index().commit_file(record, chunks).await;
    }

    /// Parse with the language's grammar, falling back to the heuristic
    /// splitter on failure (recorded as a parse error) or when no grammar
    /// exists for the language.
    fn extract_chunks(
        &self,
        file: &ScannedFile,
        source: &str,
        report: &mut IndexReport,
    ) -> Vec<Chunk> {
        let tree = match self.parsers().get(file.language) {
            Some(parser) => match parser.parse(source) {
                Ok(tree) => tree,
                Err(e) => {
                    tracing::warn!("Parse failed for {}: {}", file.relative_path, e);
                    report.errors.push(IndexErrorEntry {
                        file_path: file.relative_path.clone(),
                        error_kind: "parse".to_string(),
                        message: e.to_string(),
                    });
                    self.heuristic_tree(source)
                }
            },
            None => self.heuristic_tree(source),
        };

        self.extractor()
            .extract(&file.relative_path, file.language, source, &tree)
    }

    fn heuristic_tree(&self, source: &str) -> SyntaxNode {
        // The heuristic parser cannot fail; its Result is part of the
        // LanguageParser contract.
        self.fallback().parse(source).unwrap_or_else(|_| SyntaxNode {
            node_type: NodeType::Module,
            name: None,
            start_line: 1,
            end_line: source.lines().count().max(1),
            docstring: None,
            children: Vec::new(),
        })
    }

    /// Embed a batch with bounded backoff on transient provider failures.
    async fn embed_with_retry(&self, texts: &[&str]) -> Result<Vec<Embedding>> {
        let attempts = self.config().embed_attempts.max(1);
        let mut delay = self.config().embed_backoff;
        let mut last_error = String::new();

        for attempt in 1..=attempts {
            match self.embedding().embed_batch(texts).await {
                Ok(embeddings) => return Ok(embeddings),
                Err(e) => {
                    last_error = e.to_string();
                    if attempt < attempts {
                        tracing::warn!(
                            "Embedding attempt {}/{} failed: {}; retrying in {:?}",
                            attempt,
                            attempts,
                            last_error,
                            delay
                        );
                        tokio::time::sleep(delay).await;
                        delay *= 2;
                    }
                }
            }
        }

        Err(EngineError::Embedding(last_error))
    }
}
