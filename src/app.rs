//! Composition root
//!
//! Builds the model clients once and wires them into the services the CLI
//! commands use.

use crate::cite::{CitationReconciler, TagReconciler};
use crate::config::Config;
use crate::embed::{create_embedder, Embedder, EmbeddingGateway};
use crate::error::{Error, Result};
use crate::generate::{create_generator, GenerationGateway, Generator};
use crate::meta::MetaDb;
use crate::rag::{ChatService, GenerationService, HitSummarizer};
use crate::retrieve::RetrievalService;
use crate::store::{MemoryIndex, VectorIndex};
use std::sync::Arc;
use tracing::info;

pub struct App {
    pub config: Config,
    pub db: MetaDb,
    pub index: Arc<dyn VectorIndex>,
    pub embedder: EmbeddingGateway,
    pub retrieval: Arc<RetrievalService>,
    pub generation: GenerationService,
    pub chat: ChatService,
    pub summarizer: HitSummarizer,
}

impl App {
    /// Build the application with HTTP model clients from `config`
    pub async fn build(config: Config) -> Result<Self> {
        let embedder = create_embedder(&config.embedding)?;
        let generator = create_generator(&config.generation)?;
        Self::with_clients(config, embedder, generator).await
    }

    /// Build the application around the given model clients
    pub async fn with_clients(
        config: Config,
        embedder: Arc<dyn Embedder>,
        generator: Arc<dyn Generator>,
    ) -> Result<Self> {
        if !config.paths.db_file.exists() {
            return Err(Error::NotInitialized);
        }

        if embedder.dimension() != config.embedding.dimension {
            return Err(Error::Config(format!(
                "Embedder '{}' produces {}-dimensional vectors but embedding.dimension is {}",
                embedder.model_name(),
                embedder.dimension(),
                config.embedding.dimension
            )));
        }

        let db = MetaDb::connect(&config).await?;
        if !db.is_initialized().await? {
            return Err(Error::NotInitialized);
        }

        let chunks = db.load_embedded_chunks().await?;
        let index = MemoryIndex::from_chunks(config.embedding.dimension, chunks).await?;
        info!("Vector index ready with {} entries", index.stats().await.entries);
        let index: Arc<dyn VectorIndex> = Arc::new(index);

        let embedding = EmbeddingGateway::new(embedder, &config.embedding);
        let generation = GenerationGateway::new(generator, &config.generation);
        let reconciler: Arc<dyn CitationReconciler> = Arc::new(TagReconciler);

        let retrieval = Arc::new(RetrievalService::new(
            embedding.clone(),
            index.clone(),
            db.clone(),
            &config.retrieval,
        ));

        Ok(Self {
            generation: GenerationService::new(
                retrieval.clone(),
                generation.clone(),
                reconciler.clone(),
                config.retrieval.num_sources,
            ),
            chat: ChatService::new(
                retrieval.clone(),
                generation.clone(),
                reconciler,
                db.clone(),
                config.retrieval.history_limit,
            ),
            summarizer: HitSummarizer::new(generation),
            embedder: embedding,
            retrieval,
            index,
            db,
            config,
        })
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use crate::commands::{cmd_init, InitOptions};
    use crate::embed::testing::LetterEmbedder;
    use crate::generate::testing::ScriptedGenerator;
    use tempfile::TempDir;

    pub const DIM: usize = 26;

    /// Initialize a fresh workspace in a temp dir and build an app on it
    /// with letter-count embeddings and a scripted generator
    pub async fn test_app(generator: Arc<ScriptedGenerator>) -> (App, TempDir) {
        let tmp = TempDir::new().unwrap();
        let mut config = cmd_init(InitOptions::new(tmp.path().to_path_buf(), false))
            .await
            .unwrap();
        config.embedding.dimension = DIM;
        config.chunk.max_chars = 200;

        let app = App::with_clients(config, Arc::new(LetterEmbedder::new(DIM)), generator)
            .await
            .unwrap();
        (app, tmp)
    }
}
