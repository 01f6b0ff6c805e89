//! Page indicator detection
//!
//! Builds a sparse, ordered map from byte offsets in the flattened document
//! text to 0-based page indices. Two signals feed it:
//! - inline markers left by the PDF extractor (page span anchors and
//!   image references whose filename embeds the page number)
//! - table-of-contents titles located in the text

use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::OnceLock;
use tracing::debug;

static PAGE_MARKER_RE: OnceLock<Regex> = OnceLock::new();

fn page_marker_re() -> &'static Regex {
    PAGE_MARKER_RE.get_or_init(|| {
        Regex::new(r#"(?i)(<span id="page-(\d+)-[^"]*"></span>)|(!\[.*?\]\([^_]*_page_(\d+)_.*?\))"#)
            .expect("page marker pattern is valid")
    })
}

/// Which signal produced an indicator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IndicatorKind {
    /// Inline page anchor or page-numbered image reference
    Tag,
    /// Table-of-contents title match
    Toc,
}

/// A page boundary hint at a byte offset of the flattened text
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageIndicator {
    pub offset: usize,
    /// 0-based page index
    pub page: u32,
    pub kind: IndicatorKind,
}

/// A table-of-contents entry: a section title and the 0-based page it starts on
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TocEntry {
    pub title: String,
    pub page_id: u32,
}

/// Parse a table of contents from extractor metadata.
///
/// Accepts either a bare list of entries or an object carrying a
/// `table_of_contents` list. Entries without a usable title or page are
/// skipped rather than rejected.
pub fn parse_toc(value: &Value) -> Vec<TocEntry> {
    let items = match value {
        Value::Array(items) => items,
        Value::Object(map) => match map.get("table_of_contents") {
            Some(Value::Array(items)) => items,
            _ => return Vec::new(),
        },
        _ => return Vec::new(),
    };

    items
        .iter()
        .filter_map(|item| {
            let title = item.get("title")?.as_str()?.trim();
            if title.is_empty() {
                debug!("Skipping TOC entry with empty title");
                return None;
            }
            let page_id = match item.get("page_id")? {
                Value::Number(n) => n.as_u64(),
                Value::String(s) => s.trim().parse::<u64>().ok(),
                _ => None,
            };
            let Some(page_id) = page_id.and_then(|p| u32::try_from(p).ok()) else {
                debug!("Skipping TOC entry '{}' without a valid page_id", title);
                return None;
            };
            Some(TocEntry {
                title: title.to_string(),
                page_id,
            })
        })
        .collect()
}

/// Collect inline page markers in document order
fn find_marker_indicators(text: &str) -> Vec<PageIndicator> {
    page_marker_re()
        .captures_iter(text)
        .filter_map(|caps| {
            let whole = caps.get(0)?;
            let page = caps.get(2).or_else(|| caps.get(4))?;
            let page = page.as_str().parse::<u32>().ok()?;
            Some(PageIndicator {
                offset: whole.start(),
                page,
                kind: IndicatorKind::Tag,
            })
        })
        .collect()
}

/// Locate each TOC title: the first occurrence of the bare title and, when
/// it differs, the first markdown heading line carrying the title
fn find_toc_indicators(text: &str, toc: &[TocEntry]) -> Vec<PageIndicator> {
    let mut indicators = Vec::new();

    for entry in toc {
        let escaped = regex::escape(entry.title.trim());
        let patterns = [
            format!("(?i){}", escaped),
            format!(r"(?mi)^#+\s*{}\s*$", escaped),
        ];

        for pattern in &patterns {
            let Ok(re) = Regex::new(pattern) else {
                continue;
            };
            if let Some(m) = re.find(text) {
                indicators.push(PageIndicator {
                    offset: m.start(),
                    page: entry.page_id,
                    kind: IndicatorKind::Toc,
                });
            }
        }
    }

    indicators
}

/// Reduce sorted candidates to a sequence usable for forward page lookup.
///
/// An indicator is kept when it lies strictly after the last seen offset and
/// names a different page than the last kept one. An indicator sharing the
/// last seen offset replaces the last kept indicator when it names a lower page.
fn collapse_indicators(candidates: Vec<PageIndicator>) -> Vec<PageIndicator> {
    let mut kept: Vec<PageIndicator> = Vec::new();
    let mut last_offset: Option<usize> = None;
    let mut last_page: Option<u32> = None;

    for indicator in candidates {
        let beyond_last = last_offset.map_or(true, |last| indicator.offset > last);
        if beyond_last {
            if last_page != Some(indicator.page) {
                kept.push(indicator);
                last_page = Some(indicator.page);
            }
            last_offset = Some(indicator.offset);
        } else if last_offset == Some(indicator.offset) {
            if let Some(last) = kept.last_mut() {
                if indicator.page < last.page {
                    *last = indicator;
                    last_page = Some(indicator.page);
                }
            }
        }
    }

    kept
}

/// Build the ordered, de-duplicated page indicator sequence for a document
pub fn index_pages(text: &str, toc: &[TocEntry]) -> Vec<PageIndicator> {
    let mut candidates = find_marker_indicators(text);
    candidates.extend(find_toc_indicators(text, toc));
    // Stable: markers stay ahead of TOC hits at the same offset
    candidates.sort_by_key(|i| i.offset);

    let indicators = collapse_indicators(candidates);
    debug!(
        "Found {} page indicators (first: {:?})",
        indicators.len(),
        indicators.iter().take(5).collect::<Vec<_>>()
    );
    indicators
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn tag(offset: usize, page: u32) -> PageIndicator {
        PageIndicator {
            offset,
            page,
            kind: IndicatorKind::Tag,
        }
    }

    #[test]
    fn test_span_and_image_markers() {
        let text = concat!(
            "<span id=\"page-0-0\"></span>Intro text\n",
            "![](_page_1_Picture_2.jpeg)\n",
            "<SPAN ID=\"page-2-1\"></SPAN> more"
        );
        let indicators = index_pages(text, &[]);
        let pages: Vec<u32> = indicators.iter().map(|i| i.page).collect();
        assert_eq!(pages, vec![0, 1, 2]);
        assert_eq!(indicators[0].offset, 0);
        assert!(indicators.iter().all(|i| i.kind == IndicatorKind::Tag));
        assert!(indicators.windows(2).all(|w| w[0].offset < w[1].offset));
    }

    #[test]
    fn test_no_indicators() {
        assert!(index_pages("plain text without any markers", &[]).is_empty());
    }

    #[test]
    fn test_toc_match_is_case_insensitive() {
        let text = "preamble\n# INTRODUCTION\nbody";
        let toc = vec![TocEntry {
            title: "Introduction".to_string(),
            page_id: 2,
        }];

        let offsets: Vec<usize> = find_toc_indicators(text, &toc)
            .iter()
            .map(|i| i.offset)
            .collect();
        assert_eq!(
            offsets,
            vec![text.find("INTRODUCTION").unwrap(), text.find("# INTRODUCTION").unwrap()]
        );

        // Both land on the same page, so only the earlier heading line survives
        let indicators = index_pages(text, &toc);
        assert_eq!(indicators.len(), 1);
        assert_eq!(indicators[0].offset, text.find("# INTRODUCTION").unwrap());
        assert_eq!(indicators[0].page, 2);
        assert_eq!(indicators[0].kind, IndicatorKind::Toc);
    }

    #[test]
    fn test_toc_records_prose_and_heading_occurrences() {
        let text = "Methods are described later.\n\n## Methods\nWe did things.";
        let toc = vec![TocEntry {
            title: "Methods".to_string(),
            page_id: 4,
        }];
        let heading_at = text.find("## Methods").unwrap();

        let offsets: Vec<usize> = find_toc_indicators(text, &toc)
            .iter()
            .map(|i| i.offset)
            .collect();
        assert_eq!(offsets, vec![0, heading_at]);
    }

    #[test]
    fn test_toc_heading_survives_between_markers() {
        let text = concat!(
            "<span id=\"page-0-0\"></span>See Results for details.\n\n",
            "<span id=\"page-1-0\"></span>More text.\n\n",
            "## Results\nNumbers.",
        );
        let toc = vec![TocEntry {
            title: "Results".to_string(),
            page_id: 2,
        }];
        let heading_at = text.find("## Results").unwrap();

        let indicators = index_pages(text, &toc);
        assert!(indicators
            .iter()
            .any(|i| i.offset == heading_at && i.page == 2 && i.kind == IndicatorKind::Toc));
    }

    #[test]
    fn test_collapse_drops_repeated_pages() {
        let collapsed = collapse_indicators(vec![tag(0, 0), tag(10, 0), tag(20, 1), tag(30, 1)]);
        assert_eq!(collapsed, vec![tag(0, 0), tag(20, 1)]);
    }

    #[test]
    fn test_collapse_same_offset_keeps_lower_page() {
        let collapsed = collapse_indicators(vec![tag(0, 0), tag(15, 3), tag(15, 2)]);
        assert_eq!(collapsed, vec![tag(0, 0), tag(15, 2)]);
    }

    #[test]
    fn test_parse_toc_shapes() {
        let list = json!([
            {"title": "Intro", "page_id": 0},
            {"title": "  Results ", "page_id": "3"},
            {"title": "", "page_id": 1},
            {"title": "Broken", "page_id": "x"},
            {"page_id": 2}
        ]);
        let entries = parse_toc(&list);
        assert_eq!(
            entries,
            vec![
                TocEntry { title: "Intro".to_string(), page_id: 0 },
                TocEntry { title: "Results".to_string(), page_id: 3 },
            ]
        );

        let wrapped = json!({"table_of_contents": [{"title": "Intro", "page_id": 1}]});
        assert_eq!(parse_toc(&wrapped).len(), 1);
        assert!(parse_toc(&json!("nonsense")).is_empty());
    }
}
