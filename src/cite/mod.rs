//! Citation reconciliation
//!
//! Generated text cites sources with `[ID:<chunk id>]` tags. Reconciliation
//! keeps only tags that name an offered chunk, in the order the chunks were
//! offered.

use regex::Regex;
use serde::Serialize;
use std::collections::HashSet;
use std::sync::OnceLock;
use tracing::debug;

static CITATION_RE: OnceLock<Regex> = OnceLock::new();

fn citation_re() -> &'static Regex {
    CITATION_RE.get_or_init(|| Regex::new(r"\[ID:([^\]\s]+)\]").expect("citation pattern is valid"))
}

/// The offered chunk IDs a generated text relies on
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CitationSet {
    pub ids: Vec<String>,
    /// True when nothing valid was cited and every offered ID was assumed used
    pub fallback: bool,
}

impl CitationSet {
    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.ids.iter().any(|c| c == id)
    }
}

pub trait CitationReconciler: Send + Sync {
    fn reconcile(&self, text: &str, offered: &[String]) -> CitationSet;
}

/// Reconciler for inline `[ID:x]` tags
#[derive(Debug, Clone, Copy, Default)]
pub struct TagReconciler;

impl TagReconciler {
    /// Every tagged ID in the text, in order of appearance, duplicates included
    pub fn extract_ids(text: &str) -> Vec<&str> {
        citation_re()
            .captures_iter(text)
            .filter_map(|caps| caps.get(1).map(|m| m.as_str()))
            .collect()
    }
}

impl CitationReconciler for TagReconciler {
    fn reconcile(&self, text: &str, offered: &[String]) -> CitationSet {
        if offered.is_empty() {
            return CitationSet::default();
        }

        let cited: HashSet<&str> = Self::extract_ids(text).into_iter().collect();
        let offered_set: HashSet<&str> = offered.iter().map(String::as_str).collect();

        for unknown in cited.iter().filter(|id| !offered_set.contains(*id)) {
            debug!("Ignoring citation of unknown source {}", unknown);
        }

        let mut seen = HashSet::new();
        let ids: Vec<String> = offered
            .iter()
            .filter(|id| cited.contains(id.as_str()) && seen.insert(id.as_str()))
            .cloned()
            .collect();

        if ids.is_empty() {
            debug!("No valid citations found; treating all {} offered sources as used", offered.len());
            let mut seen = HashSet::new();
            return CitationSet {
                ids: offered
                    .iter()
                    .filter(|id| seen.insert(id.as_str()))
                    .cloned()
                    .collect(),
                fallback: true,
            };
        }

        CitationSet {
            ids,
            fallback: false,
        }
    }
}

/// Reconcile `[ID:x]` tags in `text` against the offered chunk IDs
pub fn reconcile_citations(text: &str, offered: &[String]) -> CitationSet {
    TagReconciler.reconcile(text, offered)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn offered(ids: &[&str]) -> Vec<String> {
        ids.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_extract_ids() {
        let ids = TagReconciler::extract_ids("a [ID:x1] b [ID:y-2][ID:x1] [id:z] [ID: w] [ID:]");
        assert_eq!(ids, vec!["x1", "y-2", "x1"]);
    }

    #[test]
    fn test_intersection_in_offered_order() {
        let set = reconcile_citations(
            "Second point [ID:c3]. First point [ID:c1]. Again [ID:c3].",
            &offered(&["c1", "c2", "c3"]),
        );
        assert_eq!(set.ids, vec!["c1", "c3"]);
        assert!(!set.fallback);
    }

    #[test]
    fn test_hallucinated_ids_are_dropped() {
        let set = reconcile_citations("See [ID:c9] and [ID:c2].", &offered(&["c1", "c2"]));
        assert_eq!(set.ids, vec!["c2"]);
        assert!(!set.contains("c9"));
    }

    #[test]
    fn test_fallback_when_nothing_valid_is_cited() {
        let set = reconcile_citations("No tags at all, or [ID:bogus].", &offered(&["c1", "c2"]));
        assert_eq!(set.ids, vec!["c1", "c2"]);
        assert!(set.fallback);
    }

    #[test]
    fn test_no_offered_ids() {
        let set = reconcile_citations("[ID:c1]", &[]);
        assert!(set.is_empty());
        assert!(!set.fallback);
    }

    #[test]
    fn test_result_is_subset_of_offered() {
        let offered = offered(&["a", "b", "c"]);
        let texts = ["[ID:a]", "[ID:d] [ID:b]", "", "[ID:c][ID:a][ID:zz]"];
        for text in texts {
            let set = reconcile_citations(text, &offered);
            assert!(set.ids.iter().all(|id| offered.contains(id)));
            assert!(!set.ids.is_empty());
        }
    }

    #[test]
    fn test_case_sensitive_ids() {
        let set = reconcile_citations("[ID:ABC]", &offered(&["abc"]));
        assert!(set.fallback);
    }
}
