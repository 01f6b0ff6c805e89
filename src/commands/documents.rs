//! Document management commands

use super::query::one_line_preview;
use crate::app::App;
use crate::error::{Error, Result};
use crate::meta::{Chunk, Document, DocumentListing};
use serde::Serialize;
use tracing::info;

/// List ingested documents with their chunk counts
pub async fn cmd_list_documents(app: &App) -> Result<Vec<DocumentListing>> {
    app.db.list_documents().await
}

#[derive(Debug, Clone, Serialize)]
pub struct DocumentDetail {
    pub document: Document,
    pub chunks: Vec<Chunk>,
}

/// A document with its chunks in order
pub async fn cmd_show_document(app: &App, document_id: &str) -> Result<DocumentDetail> {
    let document = app
        .db
        .get_document(document_id)
        .await?
        .ok_or_else(|| Error::DocumentNotFound(document_id.to_string()))?;
    let chunks = app.db.get_chunks(document_id).await?;
    Ok(DocumentDetail { document, chunks })
}

#[derive(Debug, Clone, Serialize)]
pub struct DeleteStats {
    pub document_id: String,
    pub vectors_removed: usize,
}

/// Remove a document, its chunks and its vectors
pub async fn cmd_delete_document(app: &App, document_id: &str) -> Result<DeleteStats> {
    if !app.db.delete_document(document_id).await? {
        return Err(Error::DocumentNotFound(document_id.to_string()));
    }
    let vectors_removed = app.index.remove_document(document_id).await?;
    info!(
        "Deleted document {} ({} vectors removed)",
        document_id, vectors_removed
    );

    Ok(DeleteStats {
        document_id: document_id.to_string(),
        vectors_removed,
    })
}

pub fn print_documents(documents: &[DocumentListing]) {
    println!("\n📚 Documents\n");

    if documents.is_empty() {
        println!("No documents ingested. Use 'paperpilot ingest' to add one.");
        return;
    }

    for listing in documents {
        let doc = &listing.document;
        println!(
            "• {}",
            doc.title.as_deref().unwrap_or(&doc.original_filename)
        );
        println!("  ID: {}", doc.id);
        println!("  File: {}", doc.original_filename);
        if let Some(author) = &doc.author {
            println!("  Author: {}", author);
        }
        if let Some(year) = doc.publication_year {
            println!("  Year: {}", year);
        }
        println!("  Chunks: {}", listing.chunk_count);
        println!("  Added: {}", doc.created_at);
        println!();
    }
}

pub fn print_document_detail(detail: &DocumentDetail) {
    let doc = &detail.document;
    println!("\n📄 {}\n", doc.title.as_deref().unwrap_or(&doc.original_filename));
    println!("ID: {}", doc.id);
    println!("Processed ID: {}", doc.processed_document_id);
    if let Some(source) = doc.metadata().get("source_path").and_then(|v| v.as_str()) {
        println!("Source: {}", source);
    }
    println!("Chunks: {}\n", detail.chunks.len());

    for chunk in &detail.chunks {
        let page = chunk
            .page_number
            .map_or_else(|| "?".to_string(), |p| p.to_string());
        let embedded = if chunk.embedding.is_some() { "" } else { " (no embedding)" };
        println!(
            "{:>4}  p.{:<4} [{}..{}]{}  {}",
            chunk.chunk_index,
            page,
            chunk.char_start,
            chunk.char_end,
            embedded,
            one_line_preview(&chunk.content, 80)
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::testing::test_app;
    use crate::commands::{cmd_ingest, IngestOptions};
    use crate::generate::testing::ScriptedGenerator;
    use std::sync::Arc;

    #[tokio::test]
    async fn test_list_show_delete() {
        let (app, tmp) = test_app(Arc::new(ScriptedGenerator::replying("ok"))).await;
        let path = tmp.path().join("paper.txt");
        std::fs::write(&path, "a short paper about attention.").unwrap();
        let stats = cmd_ingest(&app, &path, IngestOptions::default()).await.unwrap();

        let listed = cmd_list_documents(&app).await.unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].chunk_count, 1);

        let detail = cmd_show_document(&app, &stats.document_id).await.unwrap();
        assert_eq!(detail.chunks.len(), 1);
        assert_eq!(detail.chunks[0].page_number, Some(1));
        let metadata = detail.document.metadata();
        assert_eq!(metadata["source_path"], path.display().to_string());
        assert_eq!(metadata["toc_entries"], 0);

        let deleted = cmd_delete_document(&app, &stats.document_id).await.unwrap();
        assert_eq!(deleted.vectors_removed, 1);
        assert!(cmd_list_documents(&app).await.unwrap().is_empty());
        assert_eq!(app.index.stats().await.entries, 0);

        let again = cmd_delete_document(&app, &stats.document_id).await;
        assert!(matches!(again, Err(Error::DocumentNotFound(_))));
        let missing = cmd_show_document(&app, &stats.document_id).await;
        assert!(matches!(missing, Err(Error::DocumentNotFound(_))));
    }
}
