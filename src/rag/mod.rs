//! Retrieval-augmented answering
//!
//! - `GenerationService`: one-shot answers grounded in retrieved sources
//! - `ChatService`: multi-turn chat with persisted history
//! - `HitSummarizer`: concurrent per-hit summaries

mod chat;
mod summarize;

pub use chat::*;
pub use summarize::*;

use crate::cite::{CitationReconciler, CitationSet};
use crate::context::{assemble_context, generation_prompt, source_details, SourceDetail, NO_INFORMATION_ANSWER};
use crate::generate::{GenerationGateway, GenerationOutcome};
use crate::retrieve::RetrievalService;
use crate::store::SearchFilter;
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, info};

/// A generated answer with the sources it was offered and those it cites
#[derive(Debug, Clone, Serialize)]
pub struct GeneratedAnswer {
    pub text: String,
    /// `text` is a failure sentinel rather than a model reply
    pub failed: bool,
    pub sources: Vec<SourceDetail>,
    pub cited: CitationSet,
}

/// Chunk IDs of the offered sources, in offer order
fn offered_ids(sources: &[SourceDetail]) -> Vec<String> {
    sources.iter().map(|s| s.chunk_id.clone()).collect()
}

/// Reconcile citations, except for failed generations which cite nothing
fn reconcile_reply(
    reconciler: &dyn CitationReconciler,
    outcome: &GenerationOutcome,
    sources: &[SourceDetail],
) -> CitationSet {
    match outcome {
        GenerationOutcome::Reply(text) => reconciler.reconcile(text, &offered_ids(sources)),
        GenerationOutcome::Failed(_) => CitationSet::default(),
    }
}

pub struct GenerationService {
    retrieval: Arc<RetrievalService>,
    generator: GenerationGateway,
    reconciler: Arc<dyn CitationReconciler>,
    num_sources: usize,
}

impl GenerationService {
    pub fn new(
        retrieval: Arc<RetrievalService>,
        generator: GenerationGateway,
        reconciler: Arc<dyn CitationReconciler>,
        num_sources: usize,
    ) -> Self {
        Self {
            retrieval,
            generator,
            reconciler,
            num_sources,
        }
    }

    /// Answer `query` from the most relevant sources
    pub async fn generate(
        &self,
        query: &str,
        num_sources: Option<usize>,
        filter: Option<&SearchFilter>,
    ) -> GeneratedAnswer {
        let limit = num_sources.unwrap_or(self.num_sources);
        info!("Generating answer from up to {} sources", limit);

        let hits = self.retrieval.find_relevant(query, limit, filter).await;
        if hits.is_empty() {
            info!("No relevant sources found");
            return GeneratedAnswer {
                text: NO_INFORMATION_ANSWER.to_string(),
                failed: false,
                sources: Vec::new(),
                cited: CitationSet::default(),
            };
        }

        let context = assemble_context(&hits);
        let sources = source_details(&hits);
        let prompt = generation_prompt(&context, query);
        debug!("Generation prompt is {} chars", prompt.chars().count());

        let outcome = self.generator.generate_prompt(&prompt).await;
        let cited = reconcile_reply(self.reconciler.as_ref(), &outcome, &sources);

        GeneratedAnswer {
            failed: outcome.is_failed(),
            text: outcome.into_text(),
            sources,
            cited,
        }
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use crate::config::{Config, EmbeddingConfig};
    use crate::embed::testing::LetterEmbedder;
    use crate::embed::EmbeddingGateway;
    use crate::meta::{Chunk, Document, MetaDb};
    use crate::chunk::ChunkRecord;
    use crate::retrieve::RetrievalService;
    use crate::store::{IndexEntry, MemoryIndex, VectorIndex};
    use std::sync::Arc;
    use tempfile::TempDir;

    pub const DIM: usize = 26;

    /// A retrieval stack over a temp database holding one document whose
    /// chunks have the given contents
    pub async fn retrieval_fixture(contents: &[&str]) -> (Arc<RetrievalService>, MetaDb, Vec<String>, TempDir) {
        let tmp = TempDir::new().unwrap();
        let db = MetaDb::open(&tmp.path().join("meta.db")).await.unwrap();
        let doc = Document::new("paper.pdf".to_string(), "hash".to_string());

        let letters = LetterEmbedder::new(DIM);
        let chunks: Vec<Chunk> = contents
            .iter()
            .enumerate()
            .map(|(i, text)| {
                let record = ChunkRecord {
                    content: text.to_string(),
                    page_number: 1,
                    char_count: text.chars().count(),
                    char_start: 0,
                    char_end: text.len(),
                };
                Chunk::new(doc.id.clone(), i, &record).with_embedding(&letters.vector_for(text))
            })
            .collect();
        db.store_document(&doc, &chunks, DIM, None).await.unwrap();
        let ids = chunks.iter().map(|c| c.id.clone()).collect();

        let index = MemoryIndex::new(DIM);
        index
            .insert(chunks.into_iter().filter_map(IndexEntry::from_chunk).collect())
            .await
            .unwrap();

        let embedding_config = EmbeddingConfig {
            dimension: DIM,
            ..EmbeddingConfig::default()
        };
        let gateway = EmbeddingGateway::new(Arc::new(letters), &embedding_config);
        let retrieval = RetrievalService::new(
            gateway,
            Arc::new(index),
            db.clone(),
            &Config::default().retrieval,
        );
        (Arc::new(retrieval), db, ids, tmp)
    }
}

#[cfg(test)]
mod tests {
    use super::testing::retrieval_fixture;
    use super::*;
    use crate::cite::TagReconciler;
    use crate::config::GenerationConfig;
    use crate::generate::testing::ScriptedGenerator;

    fn service(
        retrieval: Arc<RetrievalService>,
        generator: Arc<ScriptedGenerator>,
    ) -> GenerationService {
        let gateway = GenerationGateway::new(generator, &GenerationConfig::default());
        GenerationService::new(retrieval, gateway, Arc::new(TagReconciler), 3)
    }

    #[tokio::test]
    async fn test_no_hits_returns_canned_answer() {
        let (retrieval, _db, _ids, _tmp) = retrieval_fixture(&[]).await;
        let generator = Arc::new(ScriptedGenerator::replying("unused"));
        let answer = service(retrieval, generator.clone())
            .generate("anything", None, None)
            .await;

        assert_eq!(answer.text, NO_INFORMATION_ANSWER);
        assert!(answer.sources.is_empty());
        assert!(generator.seen.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_answer_cites_offered_sources() {
        let (retrieval, _db, ids, _tmp) = retrieval_fixture(&["abc", "abd", "xyz"]).await;
        let reply = format!("Attention helps [ID:{}]. Also [ID:made-up].", ids[1]);
        let generator = Arc::new(ScriptedGenerator::replying(&reply));
        let answer = service(retrieval, generator.clone())
            .generate("abc", Some(2), None)
            .await;

        assert_eq!(answer.sources.len(), 2);
        assert_eq!(answer.sources[0].chunk_id, ids[0]);
        assert_eq!(answer.cited.ids, vec![ids[1].clone()]);
        assert!(!answer.cited.fallback);

        let prompt = &generator.last_messages()[0].content;
        assert!(prompt.contains(&format!("[ID:{}]", ids[0])));
        assert!(prompt.contains("USER REQUEST:\nabc"));
    }

    #[tokio::test]
    async fn test_generation_failure_cites_nothing() {
        let (retrieval, _db, _ids, _tmp) = retrieval_fixture(&["abc"]).await;
        let generator = Arc::new(ScriptedGenerator::failing("down"));
        let answer = service(retrieval, generator).generate("abc", None, None).await;

        assert!(answer.failed);
        assert!(answer.text.starts_with("Error:"));
        assert_eq!(answer.sources.len(), 1);
        assert!(answer.cited.is_empty());
    }

    #[tokio::test]
    async fn test_reply_starting_with_error_is_reconciled() {
        let (retrieval, _db, ids, _tmp) = retrieval_fixture(&["abc"]).await;
        let reply = format!("Error: bars show one standard deviation [ID:{}].", ids[0]);
        let generator = Arc::new(ScriptedGenerator::replying(&reply));
        let answer = service(retrieval, generator).generate("abc", None, None).await;

        assert!(!answer.failed);
        assert_eq!(answer.cited.ids, vec![ids[0].clone()]);
        assert!(!answer.cited.fallback);
    }
}
