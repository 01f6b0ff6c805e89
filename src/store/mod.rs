//! Vector index
//!
//! This module provides:
//! - The `VectorIndex` trait: append-only inserts, removal by document and
//!   k-nearest search by cosine distance
//! - `MemoryIndex`, an exact in-process index rebuilt from SQLite at startup

use crate::embed::cosine_distance;
use crate::error::Result;
use crate::meta::Chunk;
use async_trait::async_trait;
use std::collections::HashSet;
use tokio::sync::RwLock;
use tracing::{debug, warn};

/// A chunk vector and the chunk fields needed to answer a search
#[derive(Debug, Clone, PartialEq)]
pub struct IndexEntry {
    pub chunk_id: String,
    pub document_id: String,
    pub chunk_index: i64,
    pub content: String,
    pub page_number: Option<i64>,
    pub vector: Vec<f32>,
}

impl IndexEntry {
    /// Build an entry from a stored chunk; `None` when it has no usable embedding
    pub fn from_chunk(chunk: Chunk) -> Option<Self> {
        let vector = chunk.embedding_vector()?;
        Some(Self {
            chunk_id: chunk.id,
            document_id: chunk.document_id,
            chunk_index: chunk.chunk_index,
            content: chunk.content,
            page_number: chunk.page_number,
            vector,
        })
    }
}

/// Search result
#[derive(Debug, Clone, PartialEq)]
pub struct SearchResult {
    pub chunk_id: String,
    pub document_id: String,
    pub chunk_index: i64,
    pub content: String,
    pub page_number: Option<i64>,
    /// Cosine distance, `1 - cos`
    pub distance: f32,
}

/// Search filter options
#[derive(Debug, Clone, Default)]
pub struct SearchFilter {
    pub document_ids: Option<Vec<String>>,
}

impl SearchFilter {
    pub fn documents(ids: Vec<String>) -> Self {
        Self {
            document_ids: Some(ids),
        }
    }

    fn to_matcher(&self) -> Option<HashSet<&str>> {
        self.document_ids
            .as_ref()
            .map(|ids| ids.iter().map(String::as_str).collect())
    }
}

/// Index statistics
#[derive(Debug, Clone)]
pub struct IndexStats {
    pub entries: usize,
    pub documents: usize,
    pub dimension: usize,
}

#[async_trait]
pub trait VectorIndex: Send + Sync {
    /// Append entries; returns how many were accepted
    async fn insert(&self, entries: Vec<IndexEntry>) -> Result<usize>;

    /// Remove every entry of a document; returns how many were removed
    async fn remove_document(&self, document_id: &str) -> Result<usize>;

    /// Up to `limit` entries ascending by cosine distance, ties in insertion order.
    /// A query of the wrong dimension yields no results.
    async fn nearest(
        &self,
        query: &[f32],
        limit: usize,
        filter: Option<&SearchFilter>,
    ) -> Result<Vec<SearchResult>>;

    async fn stats(&self) -> IndexStats;
}

/// Exact, brute-force cosine index held in memory
pub struct MemoryIndex {
    dimension: usize,
    entries: RwLock<Vec<IndexEntry>>,
}

impl MemoryIndex {
    pub fn new(dimension: usize) -> Self {
        Self {
            dimension,
            entries: RwLock::new(Vec::new()),
        }
    }

    pub fn dimension(&self) -> usize {
        self.dimension
    }

    /// Build an index from stored chunks, skipping those whose embedding
    /// does not match the dimension
    pub async fn from_chunks(dimension: usize, chunks: Vec<Chunk>) -> Result<Self> {
        let index = Self::new(dimension);
        let entries: Vec<IndexEntry> = chunks.into_iter().filter_map(IndexEntry::from_chunk).collect();
        let accepted = index.insert(entries).await?;
        debug!("Loaded {} vectors into the index", accepted);
        Ok(index)
    }
}

#[async_trait]
impl VectorIndex for MemoryIndex {
    async fn insert(&self, entries: Vec<IndexEntry>) -> Result<usize> {
        let total = entries.len();
        let accepted: Vec<IndexEntry> = entries
            .into_iter()
            .filter(|e| e.vector.len() == self.dimension)
            .collect();

        if accepted.len() < total {
            warn!(
                "Skipped {} index entries with dimension other than {}",
                total - accepted.len(),
                self.dimension
            );
        }

        let count = accepted.len();
        self.entries.write().await.extend(accepted);
        Ok(count)
    }

    async fn remove_document(&self, document_id: &str) -> Result<usize> {
        let mut entries = self.entries.write().await;
        let before = entries.len();
        entries.retain(|e| e.document_id != document_id);
        Ok(before - entries.len())
    }

    async fn nearest(
        &self,
        query: &[f32],
        limit: usize,
        filter: Option<&SearchFilter>,
    ) -> Result<Vec<SearchResult>> {
        if query.len() != self.dimension {
            warn!(
                "Query vector has dimension {}, index expects {}; returning no results",
                query.len(),
                self.dimension
            );
            return Ok(Vec::new());
        }
        if limit == 0 {
            return Ok(Vec::new());
        }

        let matcher = filter.and_then(SearchFilter::to_matcher);
        let entries = self.entries.read().await;

        let mut scored: Vec<(usize, f32)> = entries
            .iter()
            .enumerate()
            .filter(|(_, e)| {
                matcher
                    .as_ref()
                    .map_or(true, |ids| ids.contains(e.document_id.as_str()))
            })
            .map(|(i, e)| (i, cosine_distance(query, &e.vector)))
            .collect();

        // Stable: equal distances keep insertion order
        scored.sort_by(|a, b| a.1.total_cmp(&b.1));
        scored.truncate(limit);

        let results: Vec<SearchResult> = scored
            .into_iter()
            .map(|(i, distance)| {
                let e = &entries[i];
                SearchResult {
                    chunk_id: e.chunk_id.clone(),
                    document_id: e.document_id.clone(),
                    chunk_index: e.chunk_index,
                    content: e.content.clone(),
                    page_number: e.page_number,
                    distance,
                }
            })
            .collect();

        debug!("Index search returned {} results", results.len());
        Ok(results)
    }

    async fn stats(&self) -> IndexStats {
        let entries = self.entries.read().await;
        let documents: HashSet<&str> = entries.iter().map(|e| e.document_id.as_str()).collect();
        IndexStats {
            entries: entries.len(),
            documents: documents.len(),
            dimension: self.dimension,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(id: &str, doc: &str, vector: Vec<f32>) -> IndexEntry {
        IndexEntry {
            chunk_id: id.to_string(),
            document_id: doc.to_string(),
            chunk_index: 0,
            content: format!("content of {}", id),
            page_number: Some(1),
            vector,
        }
    }

    async fn index() -> MemoryIndex {
        let index = MemoryIndex::new(2);
        index
            .insert(vec![
                entry("a", "d1", vec![1.0, 0.0]),
                entry("b", "d1", vec![0.0, 1.0]),
                entry("c", "d2", vec![1.0, 1.0]),
                entry("d", "d2", vec![2.0, 0.0]),
                entry("z", "d2", vec![0.0, 0.0]),
            ])
            .await
            .unwrap();
        index
    }

    fn ids(results: &[SearchResult]) -> Vec<&str> {
        results.iter().map(|r| r.chunk_id.as_str()).collect()
    }

    #[tokio::test]
    async fn test_nearest_orders_by_distance_with_stable_ties() {
        let index = index().await;
        let results = index.nearest(&[1.0, 0.0], 10, None).await.unwrap();

        assert_eq!(ids(&results), vec!["a", "d", "c", "b", "z"]);
        assert!(results.windows(2).all(|w| w[0].distance <= w[1].distance));
        assert!(results[0].distance.abs() < 1e-6);
        assert_eq!(results[4].distance, 1.0);
    }

    #[tokio::test]
    async fn test_nearest_respects_limit_and_filter() {
        let index = index().await;

        let results = index.nearest(&[1.0, 0.0], 2, None).await.unwrap();
        assert_eq!(results.len(), 2);

        let filter = SearchFilter::documents(vec!["d2".to_string()]);
        let results = index.nearest(&[1.0, 0.0], 10, Some(&filter)).await.unwrap();
        assert!(results.iter().all(|r| r.document_id == "d2"));
        assert_eq!(results.len(), 3);
    }

    #[tokio::test]
    async fn test_wrong_dimension_query_is_empty() {
        let index = index().await;
        assert!(index.nearest(&[1.0, 0.0, 0.0], 5, None).await.unwrap().is_empty());
        assert!(index.nearest(&[1.0, 0.0], 0, None).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_insert_rejects_wrong_dimension_and_remove_by_document() {
        let index = index().await;
        let accepted = index
            .insert(vec![entry("x", "d3", vec![1.0, 2.0, 3.0])])
            .await
            .unwrap();
        assert_eq!(accepted, 0);

        assert_eq!(index.remove_document("d1").await.unwrap(), 2);
        let stats = index.stats().await;
        assert_eq!(stats.entries, 3);
        assert_eq!(stats.documents, 1);
    }
}
