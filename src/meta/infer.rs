//! Document metadata inference from filenames and flattened text

use chrono::{Datelike, Utc};
use regex::Regex;
use std::path::Path;
use std::sync::OnceLock;
use uuid::Uuid;

static ARXIV_DATE_RE: OnceLock<Regex> = OnceLock::new();
static YEAR_RE: OnceLock<Regex> = OnceLock::new();

fn arxiv_date_re() -> &'static Regex {
    // e.g. "[hep-th] 12 Jun 2017" in an arXiv stamp
    ARXIV_DATE_RE.get_or_init(|| {
        Regex::new(r"\[\w+-\w+\.?\w*\]\s+\d{1,2}\s+\w+\s+(\d{4})")
            .expect("arXiv date pattern is valid")
    })
}

fn year_re() -> &'static Regex {
    YEAR_RE.get_or_init(|| Regex::new(r"\b(20\d{2}|19\d{2})\b").expect("year pattern is valid"))
}

fn prefix(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}

fn is_plausible_year(year: i32) -> bool {
    1900 < year && year <= Utc::now().year() + 5
}

/// Infer a publication year from the start of a document.
///
/// An arXiv date stamp in the first 2000 characters wins; otherwise the
/// first 19xx/20xx number in the first 1000 characters is used when it is
/// a plausible year.
pub fn infer_publication_year(text: &str) -> Option<i32> {
    if let Some(caps) = arxiv_date_re().captures(prefix(text, 2000)) {
        if let Ok(year) = caps[1].parse::<i32>() {
            return Some(year);
        }
    }

    let caps = year_re().captures(prefix(text, 1000))?;
    let year = caps[1].parse::<i32>().ok()?;
    is_plausible_year(year).then_some(year)
}

/// Parse the year out of a PDF date string such as `D:20190412093000Z`
pub fn parse_pdf_date_year(value: &str) -> Option<i32> {
    let digits = value.strip_prefix("D:")?;
    digits.get(..4)?.parse::<i32>().ok()
}

/// Build the processed document ID: the filename stem with every
/// non-alphanumeric character replaced by `_`, plus 6 random hex characters
pub fn processed_document_id(original_filename: &str) -> String {
    let stem = Path::new(original_filename)
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or(original_filename);
    let sanitized: String = stem
        .chars()
        .map(|c| if c.is_alphanumeric() { c } else { '_' })
        .collect();
    let suffix = Uuid::new_v4().simple().to_string();
    format!("{}_{}", sanitized, &suffix[..6])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_arxiv_stamp_wins() {
        let text = "Attention Is All You Need\n\narXiv:1706.03762v5 [hep-th] 6 Dec 2017\n\nPublished 1999";
        assert_eq!(infer_publication_year(text), Some(2017));
    }

    #[test]
    fn test_first_plausible_year() {
        let text = "Proceedings of the workshop, 2019. Revised 2021.";
        assert_eq!(infer_publication_year(text), Some(2019));
    }

    #[test]
    fn test_year_outside_window_is_ignored() {
        let text = format!("{} 2015", "x".repeat(1200));
        assert_eq!(infer_publication_year(&text), None);
        assert_eq!(infer_publication_year("Version 2099 of the draft"), None);
        assert_eq!(infer_publication_year("no years here"), None);
    }

    #[test]
    fn test_pdf_date_year() {
        assert_eq!(parse_pdf_date_year("D:20190412093000Z"), Some(2019));
        assert_eq!(parse_pdf_date_year("2019-04-12"), None);
        assert_eq!(parse_pdf_date_year("D:20"), None);
    }

    #[test]
    fn test_processed_document_id() {
        let id = processed_document_id("My Paper (v2).pdf");
        assert!(id.starts_with("My_Paper__v2__"));
        let suffix = id.rsplit('_').next().unwrap();
        assert_eq!(suffix.len(), 6);
        assert!(suffix.chars().all(|c| c.is_ascii_hexdigit()));
        assert_ne!(processed_document_id("a.pdf"), processed_document_id("a.pdf"));
    }
}
