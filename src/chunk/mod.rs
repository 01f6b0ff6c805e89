//! Page-aligned document chunking
//!
//! This module turns the flattened markdown text of a PDF into chunks that:
//! - Stay within a character bound, with overlap between neighbours
//! - Carry the 1-based page number they start on
//! - Never drop content: every non-whitespace character lands in some chunk

mod pages;
mod splitter;

pub use pages::{index_pages, parse_toc, IndicatorKind, PageIndicator, TocEntry};
pub use splitter::{Segment, TextSplitter, SEPARATORS};

use crate::config::ChunkConfig;
use blake3::Hasher;
use serde::Serialize;
use tracing::{debug, warn};

/// A chunk of document text with its page alignment
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChunkRecord {
    /// Trimmed chunk text
    pub content: String,

    /// 1-based page the chunk starts on
    pub page_number: u32,

    /// Character count of `content`
    pub char_count: usize,

    /// Byte offset of the raw segment in the source text
    pub char_start: usize,

    /// Byte offset one past the raw segment end
    pub char_end: usize,
}

/// Compute a stable content hash for a document's text
pub fn compute_content_hash(text: &str) -> String {
    let mut hasher = Hasher::new();
    hasher.update(text.as_bytes());
    hasher.finalize().to_hex().to_string()
}

/// Label segments with 1-based pages from a sorted indicator sequence.
///
/// Segments must arrive in source order. Pages are looked up at a running
/// offset: the summed raw length of every segment consumed so far, overlap,
/// separators and whitespace-only segments included. Each segment takes the
/// page of the last indicator at or before that offset; segments ahead of the
/// first indicator inherit that indicator's page, and with no indicators every
/// segment lands on page 1. Whitespace-only segments are dropped.
///
/// Overlap makes the running offset advance faster than the source position,
/// so late chunks can pick up a page marker slightly before their source
/// span reaches it. `char_start`/`char_end` still report the true source span.
pub fn assign_pages(segments: &[Segment<'_>], indicators: &[PageIndicator]) -> Vec<ChunkRecord> {
    let mut page = indicators.first().map_or(1, |first| first.page + 1);
    let mut cursor = 0;
    let mut running_offset = 0;
    let mut records = Vec::with_capacity(segments.len());

    for segment in segments {
        while let Some(indicator) = indicators.get(cursor) {
            if indicator.offset > running_offset {
                break;
            }
            page = indicator.page + 1;
            cursor += 1;
        }
        running_offset += segment.text.len();

        let content = segment.text.trim();
        if content.is_empty() {
            continue;
        }

        records.push(ChunkRecord {
            content: content.to_string(),
            page_number: page,
            char_count: content.chars().count(),
            char_start: segment.start,
            char_end: segment.end(),
        });
    }

    records
}

/// Chunk a document and align every chunk to the page it starts on
pub fn chunk_document(text: &str, toc: &[TocEntry], config: &ChunkConfig) -> Vec<ChunkRecord> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return Vec::new();
    }

    let indicators = index_pages(text, toc);
    let splitter = TextSplitter::from_config(config);
    let segments = splitter.split(text);

    let mut records = assign_pages(&segments, &indicators);

    if records.is_empty() {
        warn!("Splitter produced no chunks; keeping the whole document as one chunk");
        let start = text.len() - text.trim_start().len();
        records.push(ChunkRecord {
            content: trimmed.to_string(),
            page_number: 1,
            char_count: trimmed.chars().count(),
            char_start: start,
            char_end: start + trimmed.len(),
        });
    }

    debug!(
        "Chunked {} chars into {} chunks across {} page indicators",
        text.chars().count(),
        records.len(),
        indicators.len()
    );

    records
}
