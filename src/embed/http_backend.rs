use super::{EmbedMode, Embedder};
use crate::backend::{BackendClient, BackendKind};
use crate::config::EmbeddingConfig;
use crate::error::{Error, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize)]
struct EmbedTextRequest<'a> {
    model: &'a str,
    inputs: Vec<String>,
    task: &'static str,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
enum EmbeddingResponse {
    Embeddings { embeddings: Vec<Vec<f32>> },
    Vectors { vectors: Vec<Vec<f32>> },
    Data { data: Vec<EmbeddingData> },
}

#[derive(Debug, Clone, Deserialize)]
struct EmbeddingData {
    embedding: Vec<f32>,
}

impl EmbeddingResponse {
    fn into_embeddings(self) -> Vec<Vec<f32>> {
        match self {
            EmbeddingResponse::Embeddings { embeddings } => embeddings,
            EmbeddingResponse::Vectors { vectors } => vectors,
            EmbeddingResponse::Data { data } => data.into_iter().map(|d| d.embedding).collect(),
        }
    }
}

/// Embedder backed by an HTTP sidecar (`POST /v1/embed/text`)
pub struct HttpEmbedder {
    client: BackendClient,
    model_id: String,
    dimension: usize,
}

impl HttpEmbedder {
    pub fn new(config: &EmbeddingConfig) -> Result<Self> {
        let client = BackendClient::new(
            BackendKind::Embedding,
            &config.backend_url,
            config.timeout(),
        )?;
        Ok(Self {
            client,
            model_id: config.model.clone(),
            dimension: config.dimension,
        })
    }

    fn validate_dimensions(&self, embeddings: &[Vec<f32>]) -> Result<()> {
        if let Some(mismatch) = embeddings.iter().find(|vec| vec.len() != self.dimension) {
            return Err(Error::Embedding(format!(
                "Embedding dimension mismatch for model '{}': expected {}, got {}",
                self.model_id,
                self.dimension,
                mismatch.len()
            )));
        }
        Ok(())
    }
}

#[async_trait]
impl Embedder for HttpEmbedder {
    async fn embed(&self, texts: Vec<String>, mode: EmbedMode) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let request = EmbedTextRequest {
            model: &self.model_id,
            inputs: texts,
            task: mode.task(),
        };
        let parsed: EmbeddingResponse = self.client.post_json("/v1/embed/text", &request).await?;
        let embeddings = parsed.into_embeddings();
        self.validate_dimensions(&embeddings)?;
        Ok(embeddings)
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    fn model_name(&self) -> &str {
        &self.model_id
    }
}
