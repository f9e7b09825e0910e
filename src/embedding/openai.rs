//! OpenAI-compatible embedding provider, selected via `EMBEDDING_PROVIDER`.

use super::{Embedding, EmbeddingProvider};
use anyhow::{Context, Result};
use reqwest::Client;
use serde::{Deserialize, Serialize};

const BATCH_SIZE: usize = 64;

/// OpenAI embedding provider
pub struct OpenAiEmbedding {
    client: Client,
    base_url: String,
    api_key: String,
    model: String,
    dimension: usize,
}

#[derive(Debug, Serialize)]
struct EmbedRequest {
    model: String,
    input: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct EmbedResponse {
    data: Vec<EmbedData>,
}

#[derive(Debug, Deserialize)]
struct EmbedData {
    index: usize,
    embedding: Vec<f32>,
}

impl OpenAiEmbedding {
    pub fn new(base_url: &str, api_key: &str, model: &str) -> Self {
        let dimension = match model {
            "text-embedding-3-small" => 1536,
            "text-embedding-3-large" => 3072,
            "text-embedding-ada-002" => 1536,
            _ => 1536,
        };

        Self {
            client: Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
            model: model.to_string(),
            dimension,
        }
    }
}

#[async_trait::async_trait]
impl EmbeddingProvider for OpenAiEmbedding {
    async fn embed(&self, text: &str) -> Result<Embedding> {
        self.embed_batch(&[text])
            .await?
            .into_iter()
            .next()
            .context("No embedding returned")
    }

    async fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Embedding>> {
        let url = format!("{}/v1/embeddings", self.base_url);
        let mut all = Vec::with_capacity(texts.len());

        for batch in texts.chunks(BATCH_SIZE) {
            let request = EmbedRequest {
                model: self.model.clone(),
                input: batch.iter().map(|s| s.to_string()).collect(),
            };

            let response = self
                .client
                .post(&url)
                .header("Authorization", format!("Bearer {}", self.api_key))
                .json(&request)
                .send()
                .await
                .context("Failed to send request to OpenAI")?;

            if !response.status().is_success() {
                let status = response.status();
                let body = response.text().await.unwrap_or_default();
                anyhow::bail!("OpenAI API error ({}): {}", status, body);
            }

            let embed_response: EmbedResponse = response
                .json()
                .await
                .context("Failed to parse OpenAI response")?;

            // Responses may arrive out of order; restore input order.
            let mut data = embed_response.data;
            data.sort_by_key(|d| d.index);
            all.extend(data.into_iter().map(|d| Embedding { values: d.embedding }));
        }

        Ok(all)
    }

    fn dimension(&self) -> usize {
        self.dimension
    }
}
