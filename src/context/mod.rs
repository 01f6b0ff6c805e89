//! Prompt context assembly
//!
//! Renders retrieved hits into delimited, `[ID:x]`-tagged source blocks and
//! the per-source details returned alongside generated answers.

mod prompt;

pub use prompt::*;

use crate::retrieve::RetrievedHit;
use serde::Serialize;

/// Context used when no sources were retrieved
pub const NO_SOURCES: &str = "No contextual sources available for this request.";

const PREVIEW_CHARS: usize = 200;

/// Display record for one offered source
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SourceDetail {
    pub chunk_id: String,
    pub filename: String,
    pub title: Option<String>,
    pub author: Option<String>,
    pub year: Option<i64>,
    pub page: Option<i64>,
    pub content_preview: String,
    pub distance: f32,
}

impl From<&RetrievedHit> for SourceDetail {
    fn from(hit: &RetrievedHit) -> Self {
        Self {
            chunk_id: hit.chunk_id.clone(),
            filename: hit.original_filename.clone(),
            title: hit.title.clone(),
            author: hit.author.clone(),
            year: hit.publication_year,
            page: hit.page_number,
            content_preview: preview(&hit.content),
            distance: hit.distance,
        }
    }
}

fn preview(content: &str) -> String {
    let mut out: String = content.chars().take(PREVIEW_CHARS).collect();
    out.push_str("...");
    out
}

fn or_na(value: Option<&str>) -> &str {
    value.unwrap_or("N/A")
}

fn render_section(hit: &RetrievedHit) -> String {
    let year = hit
        .publication_year
        .map_or_else(|| "N/A".to_string(), |y| y.to_string());
    let page = hit
        .page_number
        .map_or_else(|| "unknown".to_string(), |p| p.to_string());

    format!(
        "--- Source [ID:{id}] ---\n\
         Document: {filename}\n\
         Title: {title}\n\
         Author: {author}\n\
         Year: {year}\n\
         Page: {page}\n\
         Content:\n\
         {content}\n\
         --- End Source [ID:{id}] ---",
        id = hit.chunk_id,
        filename = hit.original_filename,
        title = or_na(hit.title.as_deref()),
        author = or_na(hit.author.as_deref()),
        year = year,
        page = page,
        content = hit.content,
    )
}

/// Render hits into one context block, in retrieval order.
/// An empty slice yields [`NO_SOURCES`], never an empty string.
pub fn assemble_context(hits: &[RetrievedHit]) -> String {
    if hits.is_empty() {
        return NO_SOURCES.to_string();
    }

    hits.iter()
        .map(render_section)
        .collect::<Vec<_>>()
        .join("\n\n")
}

/// Source details for the offered hits, in retrieval order
pub fn source_details(hits: &[RetrievedHit]) -> Vec<SourceDetail> {
    hits.iter().map(SourceDetail::from).collect()
}
