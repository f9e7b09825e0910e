use super::{Embedding, EmbeddingProvider};
use anyhow::{Context, Result};
use reqwest::Client;
use serde::{Deserialize, Serialize};

/// Maximum characters sent per text. Embedding models have a bounded
/// context; dense code can tokenize at >2 tokens/char, so this stays well
/// under an 8k-token window. Ollama's own `truncate` flag still 400s on
/// some oversized inputs, hence the client-side cut.
const MAX_EMBED_CHARS: usize = 3_000;

const BATCH_SIZE: usize = 32;

/// Ollama embedding provider
pub struct OllamaEmbedding {
    client: Client,
    host: String,
    model: String,
    dimension: usize,
}

#[derive(Debug, Serialize)]
struct EmbedRequest {
    model: String,
    input: Vec<String>,
    truncate: bool,
}

#[derive(Debug, Deserialize)]
struct EmbedResponse {
    embeddings: Vec<Vec<f32>>,
}

impl OllamaEmbedding {
    pub fn new(host: &str, model: &str) -> Self {
        // Dimension depends on model - nomic-embed-text is 768
        let dimension = if model.contains("nomic") {
            768
        } else if model.contains("mxbai") {
            1024
        } else if model.contains("all-minilm") {
            384
        } else {
            768
        };

        Self {
            client: Client::new(),
            host: host.trim_end_matches('/').to_string(),
            model: model.to_string(),
            dimension,
        }
    }

    async fn embed_texts(&self, texts: &[&str]) -> Result<Vec<Embedding>> {
        let url = format!("{}/api/embed", self.host);
        let mut all = Vec::with_capacity(texts.len());

        for batch in texts.chunks(BATCH_SIZE) {
            let request = EmbedRequest {
                model: self.model.clone(),
                input: batch.iter().map(|t| truncate_input(t).to_string()).collect(),
                truncate: true,
            };

            let response = self
                .client
                .post(&url)
                .json(&request)
                .send()
                .await
                .context("Failed to send request to Ollama")?;

            if !response.status().is_success() {
                let status = response.status();
                let body = response.text().await.unwrap_or_default();
                anyhow::bail!("Ollama API error ({}): {}", status, body);
            }

            let embed_response: EmbedResponse = response
                .json()
                .await
                .context("Failed to parse Ollama response")?;

            all.extend(embed_response.embeddings.into_iter().map(|values| Embedding { values }));
        }

        Ok(all)
    }
}

/// Truncate to `MAX_EMBED_CHARS` on a UTF-8 char boundary.
fn truncate_input(text: &str) -> &str {
    if text.len() <= MAX_EMBED_CHARS {
        return text;
    }
    let mut end = MAX_EMBED_CHARS;
    while !text.is_char_boundary(end) {
        end -= 1;
    }
    &text[..end]
}

#[async_trait::async_trait]
impl EmbeddingProvider for OllamaEmbedding {
    async fn embed(&self, text: &str) -> Result<Embedding> {
        self.embed_texts(&[text])
            .await?
            .into_iter()
            .next()
            .context("No embedding returned")
    }

    async fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Embedding>> {
        self.embed_texts(texts).await
    }

    fn dimension(&self) -> usize {
        self.dimension
    }
}
