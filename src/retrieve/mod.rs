//! Semantic retrieval
//!
//! Embeds a query, asks the vector index for the nearest chunks and joins
//! each hit with its document's display metadata.

use crate::config::RetrievalConfig;
use crate::embed::EmbeddingGateway;
use crate::meta::MetaDb;
use crate::store::{SearchFilter, VectorIndex};
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// A retrieved chunk with its document's display metadata
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RetrievedHit {
    pub chunk_id: String,
    pub document_id: String,
    pub chunk_index: i64,
    pub content: String,
    pub page_number: Option<i64>,
    pub original_filename: String,
    pub title: Option<String>,
    pub author: Option<String>,
    pub publication_year: Option<i64>,
    /// Cosine distance, lower is closer
    pub distance: f32,
}

pub struct RetrievalService {
    embedder: EmbeddingGateway,
    index: Arc<dyn VectorIndex>,
    db: MetaDb,
    max_limit: usize,
}

impl RetrievalService {
    pub fn new(
        embedder: EmbeddingGateway,
        index: Arc<dyn VectorIndex>,
        db: MetaDb,
        config: &RetrievalConfig,
    ) -> Self {
        Self {
            embedder,
            index,
            db,
            max_limit: config.max_limit,
        }
    }

    /// Find the chunks closest to `query`, nearest first.
    ///
    /// Never fails: a query that cannot be embedded, an index error or a
    /// metadata lookup error all yield an empty list.
    pub async fn find_relevant(
        &self,
        query: &str,
        limit: usize,
        filter: Option<&SearchFilter>,
    ) -> Vec<RetrievedHit> {
        let limit = limit.min(self.max_limit);
        info!("Retrieving up to {} chunks for query: {}", limit, query);

        let Some(query_vector) = self.embedder.embed_query(query).await else {
            warn!("No query embedding available; returning no results");
            return Vec::new();
        };

        let results = match self.index.nearest(&query_vector, limit, filter).await {
            Ok(results) => results,
            Err(e) => {
                error!("Vector search failed: {}", e);
                return Vec::new();
            }
        };

        if results.is_empty() {
            return Vec::new();
        }

        let mut document_ids: Vec<String> = results.iter().map(|r| r.document_id.clone()).collect();
        document_ids.sort();
        document_ids.dedup();

        let documents = match self.db.get_documents(&document_ids).await {
            Ok(documents) => documents,
            Err(e) => {
                error!("Failed to load document metadata: {}", e);
                return Vec::new();
            }
        };

        let hits: Vec<RetrievedHit> = results
            .into_iter()
            .filter_map(|r| {
                let Some(doc) = documents.get(&r.document_id) else {
                    warn!(
                        "Dropping hit {}: document {} no longer exists",
                        r.chunk_id, r.document_id
                    );
                    return None;
                };
                Some(RetrievedHit {
                    chunk_id: r.chunk_id,
                    document_id: r.document_id,
                    chunk_index: r.chunk_index,
                    content: r.content,
                    page_number: r.page_number,
                    original_filename: doc.original_filename.clone(),
                    title: doc.title.clone(),
                    author: doc.author.clone(),
                    publication_year: doc.publication_year,
                    distance: r.distance,
                })
            })
            .collect();

        debug!("Retrieved {} hits", hits.len());
        hits
    }
}
