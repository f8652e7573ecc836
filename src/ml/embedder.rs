use async_trait::async_trait;
use ndarray::Array2;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

use crate::config::EmbeddingConfig;
use crate::error::{AdvisorError, Result};

/// Converts text into fixed-dimension vectors. One vector per input text,
/// order-preserving. Implementations are external providers; a failure here
/// fails the whole request — retrying is the caller's decision.
#[async_trait]
pub trait TextEmbedder: Send + Sync {
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>>;

    fn dimension(&self) -> usize;
}

const DEFAULT_CONNECTION_TIMEOUT_SECONDS: u64 = 15;

/// Client for an OpenAI-style `/v1/embeddings` endpoint.
pub struct HttpEmbedder {
    client: Client,
    api_key: String,
    endpoint: String,
    model: String,
    dimension: usize,
}

#[derive(Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    input: &'a [String],
}

#[derive(Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Deserialize)]
struct EmbeddingData {
    embedding: Vec<f32>,
    index: usize,
}

impl HttpEmbedder {
    pub fn new(config: &EmbeddingConfig, dimension: usize) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .connect_timeout(Duration::from_secs(DEFAULT_CONNECTION_TIMEOUT_SECONDS))
            .tcp_keepalive(Some(Duration::from_secs(60)))
            .build()
            .map_err(|e| AdvisorError::EmbeddingFailed(format!("failed to build client: {e}")))?;

        Ok(Self {
            client,
            api_key: config.api_key.clone(),
            endpoint: format!("{}/v1/embeddings", config.base_url.trim_end_matches('/')),
            model: config.model.clone(),
            dimension,
        })
    }
}

#[async_trait]
impl TextEmbedder for HttpEmbedder {
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        debug!(batch = texts.len(), model = %self.model, "requesting embeddings");

        let request = EmbeddingRequest {
            model: &self.model,
            input: texts,
        };

        let response = self
            .client
            .post(&self.endpoint)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .json(&request)
            .send()
            .await
            .map_err(|e| AdvisorError::EmbeddingFailed(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(AdvisorError::EmbeddingFailed(format!(
                "embedding endpoint returned {status}: {body}"
            )));
        }

        let parsed: EmbeddingResponse = response
            .json()
            .await
            .map_err(|e| AdvisorError::EmbeddingFailed(format!("malformed response: {e}")))?;

        if parsed.data.len() != texts.len() {
            return Err(AdvisorError::EmbeddingFailed(format!(
                "expected {} embeddings, got {}",
                texts.len(),
                parsed.data.len()
            )));
        }

        // The provider tags each vector with its input position; re-order so
        // the output lines up with the input batch.
        let mut data = parsed.data;
        data.sort_by_key(|d| d.index);

        let mut embeddings = Vec::with_capacity(data.len());
        for entry in data {
            if entry.embedding.len() != self.dimension {
                return Err(AdvisorError::EmbeddingFailed(format!(
                    "provider returned a {}-dimensional vector, expected {}",
                    entry.embedding.len(),
                    self.dimension
                )));
            }
            embeddings.push(entry.embedding);
        }

        Ok(embeddings)
    }

    fn dimension(&self) -> usize {
        self.dimension
    }
}

/// Stack per-text embeddings into one `(batch, dimension)` matrix.
pub fn embeddings_to_matrix(embeddings: &[Vec<f32>], dimension: usize) -> Result<Array2<f32>> {
    let mut flat = Vec::with_capacity(embeddings.len() * dimension);
    for embedding in embeddings {
        if embedding.len() != dimension {
            return Err(AdvisorError::DimensionMismatch {
                expected: dimension,
                got: embedding.len(),
            });
        }
        flat.extend_from_slice(embedding);
    }
    Ok(Array2::from_shape_vec((embeddings.len(), dimension), flat)?)
}
