pub mod ollama;
pub mod openai;

use anyhow::Result;
use serde::Deserialize;

use crate::parser::Chunk;

/// Embedding vector result
#[derive(Debug, Clone, Deserialize)]
pub struct Embedding {
    pub values: Vec<f32>,
}

/// Embedding provider trait. Implementations must be deterministic:
/// identical input text yields the same vector.
#[async_trait::async_trait]
pub trait EmbeddingProvider: Send + Sync {
    async fn embed(&self, text: &str) -> Result<Embedding>;
    async fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Embedding>>;
    fn dimension(&self) -> usize;
}

/// Compose the text embedded for a chunk: a short synthetic header naming
/// the chunk's kind, name, and file biases retrieval toward structural
/// intent, followed by the verbatim content and any docstring. Queries are
/// embedded raw — they carry no structural metadata.
pub fn chunk_embedding_text(chunk: &Chunk) -> String {
    let mut text = String::new();

    text.push_str(chunk.kind.as_str());
    if let Some(name) = &chunk.name {
        text.push(' ');
        text.push_str(name);
    }
    text.push_str(" in ");
    text.push_str(&chunk.file_path);
    text.push('\n');

    text.push_str(&chunk.content);

    if let Some(docstring) = &chunk.docstring {
        text.push('\n');
        text.push_str(docstring);
    }

    text
}
