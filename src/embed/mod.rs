//! Embedding generation
//!
//! This module provides:
//! - The `Embedder` trait over embedding backends (HTTP by default)
//! - `EmbeddingGateway`, which batches requests, bounds them with a timeout
//!   and degrades failures instead of surfacing them to the pipeline

mod http_backend;

pub use http_backend::*;

use crate::config::EmbeddingConfig;
use crate::error::{Error, Result};
use async_trait::async_trait;
use indicatif::ProgressBar;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// Whether text is embedded as a search query or as a stored document
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EmbedMode {
    Query,
    Document,
}

impl EmbedMode {
    /// Task label sent to backends that use asymmetric embeddings
    pub fn task(self) -> &'static str {
        match self {
            EmbedMode::Query => "search_query",
            EmbedMode::Document => "search_document",
        }
    }
}

/// Cosine distance (`1 - cos`). A zero-norm operand yields 1.0.
pub fn cosine_distance(a: &[f32], b: &[f32]) -> f32 {
    let mut dot = 0.0f32;
    let mut norm_a = 0.0f32;
    let mut norm_b = 0.0f32;
    for (x, y) in a.iter().zip(b.iter()) {
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }
    if norm_a == 0.0 || norm_b == 0.0 {
        return 1.0;
    }
    1.0 - dot / (norm_a.sqrt() * norm_b.sqrt())
}

/// Trait for embedding providers
#[async_trait]
pub trait Embedder: Send + Sync {
    /// Embed a batch of texts
    async fn embed(&self, texts: Vec<String>, mode: EmbedMode) -> Result<Vec<Vec<f32>>>;

    /// Get the embedding dimension
    fn dimension(&self) -> usize;

    /// Get the model name
    fn model_name(&self) -> &str;
}

/// Create an embedder based on configuration
pub fn create_embedder(config: &EmbeddingConfig) -> Result<Arc<dyn Embedder>> {
    let embedder = HttpEmbedder::new(config)?;
    Ok(Arc::new(embedder))
}

/// Batching, timeout and fallback policy around an `Embedder`
#[derive(Clone)]
pub struct EmbeddingGateway {
    embedder: Arc<dyn Embedder>,
    dimension: usize,
    batch_size: usize,
    timeout: Duration,
}

impl EmbeddingGateway {
    pub fn new(embedder: Arc<dyn Embedder>, config: &EmbeddingConfig) -> Self {
        Self {
            embedder,
            dimension: config.dimension,
            batch_size: config.batch_size.max(1),
            timeout: config.timeout(),
        }
    }

    pub fn dimension(&self) -> usize {
        self.dimension
    }

    pub fn model_name(&self) -> &str {
        self.embedder.model_name()
    }

    /// Embed document chunks. Always returns one vector per input; a batch
    /// that fails for any reason contributes zero vectors.
    pub async fn embed_documents(
        &self,
        texts: &[String],
        progress: Option<&ProgressBar>,
    ) -> Vec<Vec<f32>> {
        let mut all_embeddings = Vec::with_capacity(texts.len());

        for (i, batch) in texts.chunks(self.batch_size).enumerate() {
            match self.embed_batch(batch.to_vec(), EmbedMode::Document).await {
                Ok(embeddings) => all_embeddings.extend(embeddings),
                Err(e) => {
                    warn!(
                        "Embedding batch {} ({} texts) failed, storing zero vectors: {}",
                        i,
                        batch.len(),
                        e
                    );
                    all_embeddings
                        .extend(std::iter::repeat_with(|| vec![0.0; self.dimension]).take(batch.len()));
                }
            }

            if let Some(pb) = progress {
                pb.inc(batch.len() as u64);
            }
        }

        all_embeddings
    }

    /// Embed a search query; `None` when no usable vector could be produced
    pub async fn embed_query(&self, query: &str) -> Option<Vec<f32>> {
        if query.trim().is_empty() {
            return None;
        }

        match self.embed_batch(vec![query.to_string()], EmbedMode::Query).await {
            Ok(mut embeddings) => embeddings.pop(),
            Err(e) => {
                warn!("Query embedding failed: {}", e);
                None
            }
        }
    }

    async fn embed_batch(&self, texts: Vec<String>, mode: EmbedMode) -> Result<Vec<Vec<f32>>> {
        let expected = texts.len();
        let embeddings = tokio::time::timeout(self.timeout, self.embedder.embed(texts, mode))
            .await
            .map_err(|_| Error::Timeout(self.timeout.as_secs()))??;

        if embeddings.len() != expected {
            return Err(Error::Embedding(format!(
                "Expected {} embeddings, got {}",
                expected,
                embeddings.len()
            )));
        }

        if let Some(bad) = embeddings.iter().find(|v| v.len() != self.dimension) {
            return Err(Error::Embedding(format!(
                "Embedding dimension mismatch: expected {}, got {}",
                self.dimension,
                bad.len()
            )));
        }

        debug!("Embedded {} texts ({:?})", expected, mode);
        Ok(embeddings)
    }
}


#[cfg(test)]
mod tests {
    use super::testing::LetterEmbedder;
    use super::*;

    fn gateway(embedder: LetterEmbedder, dimension: usize, batch_size: usize) -> EmbeddingGateway {
        let config = EmbeddingConfig {
            dimension,
            batch_size,
            ..EmbeddingConfig::default()
        };
        EmbeddingGateway::new(Arc::new(embedder), &config)
    }

    struct SlowEmbedder;

    #[async_trait]
    impl Embedder for SlowEmbedder {
        async fn embed(&self, texts: Vec<String>, _mode: EmbedMode) -> Result<Vec<Vec<f32>>> {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok(texts.iter().map(|_| vec![1.0; 4]).collect())
        }

        fn dimension(&self) -> usize {
            4
        }

        fn model_name(&self) -> &str {
            "slow"
        }
    }

    #[tokio::test]
    async fn test_timeout_degrades_to_zero_vectors_and_no_query() {
        let config = EmbeddingConfig {
            dimension: 4,
            batch_size: 8,
            timeout_secs: 1,
            ..EmbeddingConfig::default()
        };
        let gw = EmbeddingGateway::new(Arc::new(SlowEmbedder), &config);

        let texts = vec!["one".to_string(), "two".to_string()];
        let vectors = gw.embed_documents(&texts, None).await;
        assert_eq!(vectors, vec![vec![0.0; 4], vec![0.0; 4]]);

        assert!(gw.embed_query("one").await.is_none());
    }

    #[test]
    fn test_cosine_distance() {
        assert!(cosine_distance(&[1.0, 0.0], &[1.0, 0.0]).abs() < 1e-6);
        assert!((cosine_distance(&[1.0, 0.0], &[0.0, 1.0]) - 1.0).abs() < 1e-6);
        assert!((cosine_distance(&[1.0, 0.0], &[-1.0, 0.0]) - 2.0).abs() < 1e-6);
        assert_eq!(cosine_distance(&[0.0, 0.0], &[1.0, 0.0]), 1.0);
    }

    #[tokio::test]
    async fn test_failed_batch_degrades_to_zero_vectors() {
        let mut embedder = LetterEmbedder::new(26);
        embedder.fail_calls = vec![1];
        let gw = gateway(embedder, 26, 2);

        let texts: Vec<String> = ["alpha", "beta", "gamma", "delta", "omega"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        let vectors = gw.embed_documents(&texts, None).await;

        assert_eq!(vectors.len(), 5);
        assert!(vectors.iter().all(|v| v.len() == 26));
        assert!(vectors[2].iter().all(|x| *x == 0.0));
        assert!(vectors[3].iter().all(|x| *x == 0.0));
        assert!(vectors[0].iter().any(|x| *x > 0.0));
        assert!(vectors[4].iter().any(|x| *x > 0.0));
    }

    #[tokio::test]
    async fn test_dimension_mismatch_degrades() {
        let gw = gateway(LetterEmbedder::new(8), 16, 4);
        let texts = vec!["abc".to_string()];

        let vectors = gw.embed_documents(&texts, None).await;
        assert_eq!(vectors, vec![vec![0.0; 16]]);
        assert!(gw.embed_query("abc").await.is_none());
    }

    #[tokio::test]
    async fn test_query_embedding() {
        let gw = gateway(LetterEmbedder::new(26), 26, 4);
        let v = gw.embed_query("ab").await.unwrap();
        assert_eq!(v[0], 1.0);
        assert_eq!(v[1], 1.0);
        assert!(gw.embed_query("   ").await.is_none());
    }
}
