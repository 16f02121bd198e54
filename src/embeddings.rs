//! Embedding capability: trait, HTTP provider, and a deterministic mock.

use async_trait::async_trait;
use serde::Deserialize;
use sha2::{Digest, Sha256};

use crate::types::CourseError;

/// Capability trait for turning text into fixed-dimension vectors.
///
/// Batched by design; a provider either embeds the whole batch or fails it,
/// so callers never see partially embedded input.
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, CourseError>;
}

/// HTTP provider for an OpenAI-style `/embeddings` endpoint.
#[derive(Clone, Debug)]
pub struct HttpEmbeddingProvider {
    client: reqwest::Client,
    endpoint: String,
    model: String,
    api_key: String,
}

impl HttpEmbeddingProvider {
    pub fn new(
        base_url: &str,
        model: impl Into<String>,
        api_key: impl Into<String>,
    ) -> Result<Self, CourseError> {
        let client = reqwest::Client::builder()
            .use_rustls_tls()
            .build()
            .map_err(|err| CourseError::Embedding(err.to_string()))?;
        Ok(Self {
            client,
            endpoint: format!("{}/embeddings", base_url.trim_end_matches('/')),
            model: model.into(),
            api_key: api_key.into(),
        })
    }

    /// Reads `COURSESMITH_EMBEDDINGS_URL`, `COURSESMITH_EMBEDDINGS_MODEL`,
    /// and `COURSESMITH_EMBEDDINGS_API_KEY` (a `.env` file is honored).
    pub fn from_env() -> Result<Self, CourseError> {
        dotenvy::dotenv().ok();
        let base = env_var("COURSESMITH_EMBEDDINGS_URL")?;
        let model = env_var("COURSESMITH_EMBEDDINGS_MODEL")?;
        let key = env_var("COURSESMITH_EMBEDDINGS_API_KEY")?;
        Self::new(&base, model, key)
    }
}

fn env_var(key: &str) -> Result<String, CourseError> {
    std::env::var(key).map_err(|_| CourseError::Validation(format!("{key} is not set")))
}

#[derive(Deserialize)]
struct EmbeddingsResponse {
    data: Vec<EmbeddingEntry>,
}

#[derive(Deserialize)]
struct EmbeddingEntry {
    embedding: Vec<f32>,
}

#[async_trait]
impl EmbeddingProvider for HttpEmbeddingProvider {
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, CourseError> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }
        let body = serde_json::json!({
            "model": self.model,
            "input": texts,
        });
        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|err| CourseError::Embedding(err.to_string()))?
            .error_for_status()
            .map_err(|err| CourseError::Embedding(err.to_string()))?;
        let payload: EmbeddingsResponse = response
            .json()
            .await
            .map_err(|err| CourseError::Embedding(err.to_string()))?;
        if payload.data.len() != texts.len() {
            return Err(CourseError::Embedding(format!(
                "expected {} embeddings, got {}",
                texts.len(),
                payload.data.len()
            )));
        }
        Ok(payload.data.into_iter().map(|e| e.embedding).collect())
    }
}

/// Deterministic content-hash embeddings for tests and offline runs.
///
/// Identical text always maps to the identical vector; distinct text maps
/// to a distinct vector with overwhelming probability. Not semantically
/// meaningful.
#[derive(Clone, Debug)]
pub struct MockEmbeddingProvider {
    dimension: usize,
}

impl MockEmbeddingProvider {
    pub fn new() -> Self {
        Self { dimension: 32 }
    }

    pub fn with_dimension(dimension: usize) -> Self {
        Self {
            dimension: dimension.max(1),
        }
    }

    fn embed_one(&self, text: &str) -> Vec<f32> {
        let digest = Sha256::digest(text.as_bytes());
        digest
            .iter()
            .cycle()
            .take(self.dimension)
            .enumerate()
            .map(|(i, &byte)| {
                let mixed = byte.wrapping_add((i % 251) as u8);
                f32::from(mixed) / 127.5 - 1.0
            })
            .collect()
    }
}

impl Default for MockEmbeddingProvider {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl EmbeddingProvider for MockEmbeddingProvider {
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, CourseError> {
        Ok(texts.iter().map(|t| self.embed_one(t)).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn mock_embeddings_are_deterministic() {
        let provider = MockEmbeddingProvider::new();
        let inputs = vec![
            "Hello world".to_string(),
            "Goodbye world".to_string(),
            "Hello world".to_string(),
        ];

        let first = provider.embed_batch(&inputs).await.unwrap();
        let second = provider.embed_batch(&inputs).await.unwrap();

        assert_eq!(first, second);
        assert_eq!(first[0], first[2]);
        assert_ne!(first[0], first[1]);
    }

    #[tokio::test]
    async fn mock_respects_dimension() {
        let provider = MockEmbeddingProvider::with_dimension(8);
        let out = provider.embed_batch(&["abc".to_string()]).await.unwrap();
        assert_eq!(out[0].len(), 8);
        assert!(out[0].iter().all(|v| (-1.0..=1.0).contains(v)));
    }

    #[tokio::test]
    async fn empty_batch_is_empty() {
        let provider = MockEmbeddingProvider::new();
        assert!(provider.embed_batch(&[]).await.unwrap().is_empty());
    }
}
