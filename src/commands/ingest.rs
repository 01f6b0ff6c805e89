//! Ingest command implementation
//!
//! Takes the flattened text of an extracted PDF plus an optional sidecar
//! JSON file from the extractor (table of contents and PDF metadata),
//! then chunks, embeds, stores and indexes it.

use crate::app::App;
use crate::chunk::{chunk_document, compute_content_hash, parse_toc, TocEntry};
use crate::error::{Error, Result};
use crate::meta::{infer_publication_year, parse_pdf_date_year, Chunk, Document};
use crate::progress::{finish_progress, start_progress_bar};
use crate::store::IndexEntry;
use serde::Serialize;
use serde_json::{json, Value};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Ingest options
#[derive(Debug, Clone, Default)]
pub struct IngestOptions {
    /// Extractor sidecar JSON (table of contents and PDF metadata)
    pub meta_path: Option<PathBuf>,
    /// Name recorded as the original filename (defaults to the text file's name)
    pub filename: Option<String>,
    pub title: Option<String>,
    pub author: Option<String>,
    pub year: Option<i64>,
    /// Re-ingest even when identical content is already stored
    pub force: bool,
}

/// Ingestion statistics
#[derive(Debug, Clone, Default, Serialize)]
pub struct IngestStats {
    pub document_id: String,
    pub processed_document_id: String,
    pub original_filename: String,
    pub publication_year: Option<i64>,
    pub toc_entries: usize,
    pub chunks_created: usize,
    pub chunks_indexed: usize,
    /// Chunks whose embedding failed and were stored with zero vectors
    pub zero_vectors: usize,
    pub pages_spanned: u32,
    /// Content was already ingested; nothing was written
    pub skipped: bool,
    pub replaced_document_id: Option<String>,
}

/// Display metadata read from the extractor sidecar
#[derive(Debug, Default)]
struct SidecarMeta {
    toc: Vec<TocEntry>,
    title: Option<String>,
    author: Option<String>,
    year: Option<i64>,
}

fn non_empty(value: Option<&Value>) -> Option<String> {
    value
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

fn read_sidecar(path: &Path) -> Result<SidecarMeta> {
    let content = std::fs::read_to_string(path)?;
    let value: Value = serde_json::from_str(&content)?;

    match &value {
        Value::Array(_) => Ok(SidecarMeta {
            toc: parse_toc(&value),
            ..SidecarMeta::default()
        }),
        Value::Object(map) => {
            let meta = map.get("metadata").unwrap_or(&value);
            let year = ["creationDate", "modDate"]
                .iter()
                .filter_map(|key| meta.get(*key).and_then(Value::as_str))
                .find_map(parse_pdf_date_year)
                .map(i64::from);

            Ok(SidecarMeta {
                toc: parse_toc(&value),
                title: non_empty(meta.get("title")),
                author: non_empty(meta.get("author")),
                year,
            })
        }
        _ => Err(Error::Toc(format!(
            "{} must hold a list of entries or an object",
            path.display()
        ))),
    }
}

fn original_filename(path: &Path, override_name: Option<&str>) -> Result<String> {
    if let Some(name) = override_name {
        return Ok(name.to_string());
    }
    path.file_name()
        .and_then(|n| n.to_str())
        .map(str::to_string)
        .ok_or_else(|| Error::InvalidPath(path.display().to_string()))
}

/// Ingest one extracted document
pub async fn cmd_ingest(app: &App, path: &Path, options: IngestOptions) -> Result<IngestStats> {
    info!("Ingesting {:?}", path);

    if !path.is_file() {
        return Err(Error::InvalidPath(format!("{} is not a file", path.display())));
    }

    let text = std::fs::read_to_string(path)?;
    if text.trim().is_empty() {
        return Err(Error::Other(format!("{} contains no text", path.display())));
    }

    let filename = original_filename(path, options.filename.as_deref())?;
    let content_hash = compute_content_hash(&text);

    let mut replaced_document_id = None;
    if let Some(existing) = app.db.find_document_by_hash(&content_hash).await? {
        if !options.force {
            info!(
                "Identical content already ingested as document {}; skipping",
                existing.id
            );
            return Ok(IngestStats {
                document_id: existing.id,
                processed_document_id: existing.processed_document_id,
                original_filename: existing.original_filename,
                publication_year: existing.publication_year,
                skipped: true,
                ..IngestStats::default()
            });
        }
        replaced_document_id = Some(existing.id);
    }

    let sidecar = match &options.meta_path {
        Some(meta_path) => read_sidecar(meta_path)?,
        None => SidecarMeta::default(),
    };
    debug!("Sidecar has {} TOC entries", sidecar.toc.len());

    let publication_year = options
        .year
        .or(sidecar.year)
        .or_else(|| infer_publication_year(&text).map(i64::from));

    let mut doc = Document::new(filename, content_hash);
    doc.title = options.title.or(sidecar.title);
    doc.author = options.author.or(sidecar.author);
    doc.publication_year = publication_year;
    doc.metadata_json = Some(
        json!({
            "source_path": path.display().to_string(),
            "toc_entries": sidecar.toc.len(),
            "char_count": text.chars().count(),
        })
        .to_string(),
    );

    let records = chunk_document(&text, &sidecar.toc, &app.config.chunk);
    let pages_spanned = records.iter().map(|r| r.page_number).max().unwrap_or(1);
    info!("Created {} chunks spanning {} pages", records.len(), pages_spanned);

    let texts: Vec<String> = records.iter().map(|r| r.content.clone()).collect();
    let progress = start_progress_bar(texts.len(), "Embedding chunks");
    let vectors = app.embedder.embed_documents(&texts, progress.as_ref()).await;
    finish_progress(progress, "Chunks embedded");

    let zero_vectors = vectors
        .iter()
        .filter(|v| v.iter().all(|x| *x == 0.0))
        .count();
    if zero_vectors > 0 {
        warn!(
            "{} of {} chunks have no usable embedding and will never be retrieved",
            zero_vectors,
            vectors.len()
        );
    }

    let chunks: Vec<Chunk> = records
        .iter()
        .zip(&vectors)
        .enumerate()
        .map(|(i, (record, vector))| Chunk::new(doc.id.clone(), i, record).with_embedding(vector))
        .collect();

    // The old document stays in place until the replacement commits
    let chunks_created = app
        .db
        .store_document(
            &doc,
            &chunks,
            app.embedder.dimension(),
            replaced_document_id.as_deref(),
        )
        .await?;

    if let Some(old_id) = &replaced_document_id {
        let removed = app.index.remove_document(old_id).await?;
        info!("Replaced document {} ({} vectors removed)", old_id, removed);
    }

    let entries: Vec<IndexEntry> = chunks.into_iter().filter_map(IndexEntry::from_chunk).collect();
    let chunks_indexed = app.index.insert(entries).await?;

    info!(
        "Ingested {} as {} ({} chunks, {} indexed)",
        doc.original_filename, doc.id, chunks_created, chunks_indexed
    );

    Ok(IngestStats {
        document_id: doc.id,
        processed_document_id: doc.processed_document_id,
        original_filename: doc.original_filename,
        publication_year,
        toc_entries: sidecar.toc.len(),
        chunks_created,
        chunks_indexed,
        zero_vectors,
        pages_spanned,
        skipped: false,
        replaced_document_id,
    })
}

pub fn print_ingest_stats(stats: &IngestStats) {
    if stats.skipped {
        println!(
            "• {} is already ingested as {} (use --force to re-ingest)",
            stats.original_filename, stats.document_id
        );
        return;
    }

    println!("\n✓ Ingestion complete");
    println!("  Document: {} ({})", stats.original_filename, stats.document_id);
    println!("  Processed ID: {}", stats.processed_document_id);
    if let Some(year) = stats.publication_year {
        println!("  Year: {}", year);
    }
    println!("  TOC entries: {}", stats.toc_entries);
    println!("  Chunks created: {}", stats.chunks_created);
    println!("  Chunks indexed: {}", stats.chunks_indexed);
    println!("  Pages spanned: {}", stats.pages_spanned);
    if stats.zero_vectors > 0 {
        println!("  ⚠ Chunks without embeddings: {}", stats.zero_vectors);
    }
    if let Some(old) = &stats.replaced_document_id {
        println!("  Replaced: {}", old);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::testing::test_app;
    use crate::generate::testing::ScriptedGenerator;
    use std::sync::Arc;
    use tempfile::TempDir;

    const PAPER: &str = "arXiv:1706.03762v5 [cs-CL] 6 Dec 2017\n\n\
        Introduction\n\nrecurrent models process sequences step by step.\n\n\
        Method\n\nattention relates all positions of a sequence directly.\n\n\
        Results\n\ntranslation quality improves while training gets cheaper.";

    fn write(dir: &TempDir, name: &str, content: &str) -> PathBuf {
        let path = dir.path().join(name);
        std::fs::write(&path, content).unwrap();
        path
    }

    async fn app() -> (App, TempDir) {
        test_app(Arc::new(ScriptedGenerator::replying("ok"))).await
    }

    #[tokio::test]
    async fn test_ingest_stores_and_indexes_chunks() {
        let (app, tmp) = app().await;
        let text_path = write(&tmp, "attention.md", PAPER);
        let meta_path = write(
            &tmp,
            "attention.json",
            r#"{"table_of_contents": [
                {"title": "Introduction", "page_id": 0},
                {"title": "Method", "page_id": 1},
                {"title": "Results", "page_id": 2}
            ],
            "metadata": {"title": "Attention Is All You Need", "author": "", "creationDate": "D:20170612000000Z"}}"#,
        );

        let stats = cmd_ingest(
            &app,
            &text_path,
            IngestOptions {
                meta_path: Some(meta_path),
                ..IngestOptions::default()
            },
        )
        .await
        .unwrap();

        assert!(!stats.skipped);
        assert_eq!(stats.toc_entries, 3);
        assert_eq!(stats.publication_year, Some(2017));
        assert!(stats.chunks_created > 1);
        assert_eq!(stats.chunks_indexed, stats.chunks_created);
        assert_eq!(stats.zero_vectors, 0);
        assert!(stats.pages_spanned >= 2);

        let doc = app.db.get_document(&stats.document_id).await.unwrap().unwrap();
        assert_eq!(doc.title.as_deref(), Some("Attention Is All You Need"));
        assert_eq!(doc.author, None);
        assert!(doc.processed_document_id.starts_with("attention_"));

        let chunks = app.db.get_chunks(&stats.document_id).await.unwrap();
        assert_eq!(chunks.len(), stats.chunks_created);
        let pages: Vec<i64> = chunks.iter().filter_map(|c| c.page_number).collect();
        assert!(pages.windows(2).all(|w| w[0] <= w[1]));
        assert_eq!(app.index.stats().await.entries, stats.chunks_indexed);
    }

    #[tokio::test]
    async fn test_year_falls_back_to_text_inference() {
        let (app, tmp) = app().await;
        let path = write(&tmp, "paper.txt", PAPER);

        let stats = cmd_ingest(&app, &path, IngestOptions::default()).await.unwrap();
        assert_eq!(stats.publication_year, Some(2017));
        assert_eq!(stats.pages_spanned, 1);
    }

    #[tokio::test]
    async fn test_identical_content_is_skipped_unless_forced() {
        let (app, tmp) = app().await;
        let path = write(&tmp, "paper.txt", PAPER);

        let first = cmd_ingest(&app, &path, IngestOptions::default()).await.unwrap();
        let second = cmd_ingest(&app, &path, IngestOptions::default()).await.unwrap();
        assert!(second.skipped);
        assert_eq!(second.document_id, first.document_id);

        let forced = cmd_ingest(
            &app,
            &path,
            IngestOptions {
                force: true,
                ..IngestOptions::default()
            },
        )
        .await
        .unwrap();
        assert!(!forced.skipped);
        assert_eq!(forced.replaced_document_id.as_deref(), Some(first.document_id.as_str()));
        assert!(app.db.get_document(&first.document_id).await.unwrap().is_none());

        let stats = app.index.stats().await;
        assert_eq!(stats.documents, 1);
        assert_eq!(stats.entries, forced.chunks_indexed);
    }

    #[tokio::test]
    async fn test_failed_forced_reingest_keeps_the_old_document() {
        let (app, tmp) = app().await;
        let path = write(&tmp, "paper.txt", PAPER);
        let first = cmd_ingest(&app, &path, IngestOptions::default()).await.unwrap();
        let entries_before = app.index.stats().await.entries;

        let bad_meta = write(&tmp, "paper.json", "42");
        let result = cmd_ingest(
            &app,
            &path,
            IngestOptions {
                meta_path: Some(bad_meta),
                force: true,
                ..IngestOptions::default()
            },
        )
        .await;
        assert!(matches!(result, Err(Error::Toc(_))));

        assert!(app.db.get_document(&first.document_id).await.unwrap().is_some());
        assert_eq!(
            app.db.get_chunks(&first.document_id).await.unwrap().len(),
            first.chunks_created
        );
        let stats = app.index.stats().await;
        assert_eq!(stats.entries, entries_before);
        assert_eq!(stats.documents, 1);
    }

    #[tokio::test]
    async fn test_blank_and_missing_input_is_rejected() {
        let (app, tmp) = app().await;
        let blank = write(&tmp, "blank.txt", "   \n\n ");

        let result = cmd_ingest(&app, &blank, IngestOptions::default()).await;
        assert!(matches!(result, Err(Error::Other(_))));

        let missing = cmd_ingest(&app, &tmp.path().join("nope.txt"), IngestOptions::default()).await;
        assert!(matches!(missing, Err(Error::InvalidPath(_))));
    }

    #[test]
    fn test_sidecar_accepts_bare_toc_list() {
        let tmp = TempDir::new().unwrap();
        let path = write(&tmp, "toc.json", r#"[{"title": "Intro", "page_id": 0}]"#);
        let sidecar = read_sidecar(&path).unwrap();
        assert_eq!(sidecar.toc.len(), 1);
        assert!(sidecar.title.is_none());

        let bad = write(&tmp, "bad.json", "42");
        assert!(matches!(read_sidecar(&bad), Err(Error::Toc(_))));
    }
}
