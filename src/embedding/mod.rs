//! Embedding provider client and degradation policy (§4.4)

use async_trait::async_trait;
use serde::Deserialize;
use std::time::Duration;

use crate::config::EmbedderConfig;
use crate::error::{MemoryError, Result};

const EMBED_TIMEOUT: Duration = Duration::from_secs(300);

/// Embedding provider interface so the Memory Service can be tested against a fake.
#[async_trait]
pub trait Embedder: Send + Sync {
    async fn embed(&self, text: &str) -> Result<Vec<f32>>;
    fn dims(&self) -> usize;
}

#[derive(Debug, Deserialize)]
struct OllamaEmbedResponse {
    embedding: Vec<f32>,
}

/// Ollama-backed embedding client (§4.4, §6).
pub struct OllamaEmbedder {
    client: reqwest::Client,
    config: EmbedderConfig,
}

impl OllamaEmbedder {
    pub fn new(config: EmbedderConfig) -> Self {
        let client = reqwest::Client::builder()
            .timeout(EMBED_TIMEOUT)
            .build()
            .expect("failed to build HTTP client");
        Self { client, config }
    }
}

#[async_trait]
impl Embedder for OllamaEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let response = self
            .client
            .post(format!("{}/api/embeddings", self.config.base_url))
            .json(&serde_json::json!({
                "model": self.config.model,
                "prompt": text,
            }))
            .send()
            .await?;

        let body: OllamaEmbedResponse = response.json().await?;

        if body.embedding.len() != self.config.dims {
            return Err(MemoryError::ProviderDegraded(format!(
                "embedding provider returned {} dims, expected {}",
                body.embedding.len(),
                self.config.dims
            )));
        }

        Ok(body.embedding)
    }

    fn dims(&self) -> usize {
        self.config.dims
    }
}

/// Cosine similarity between two equal-length vectors; 0.0 for mismatched
/// lengths or zero-norm inputs rather than panicking (§4.5 scoring input).
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();

    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }

    dot / (norm_a * norm_b)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identical_vectors_have_similarity_one() {
        let v = vec![1.0, 2.0, 3.0];
        assert!((cosine_similarity(&v, &v) - 1.0).abs() < 1e-6);
    }

    #[test]
    fn orthogonal_vectors_have_similarity_zero() {
        let a = vec![1.0, 0.0];
        let b = vec![0.0, 1.0];
        assert!(cosine_similarity(&a, &b).abs() < 1e-6);
    }

    #[test]
    fn mismatched_lengths_return_zero() {
        let a = vec![1.0, 2.0];
        let b = vec![1.0];
        assert_eq!(cosine_similarity(&a, &b), 0.0);
    }

    #[test]
    fn zero_vector_returns_zero() {
        let a = vec![0.0, 0.0];
        let b = vec![1.0, 1.0];
        assert_eq!(cosine_similarity(&a, &b), 0.0);
    }
}
