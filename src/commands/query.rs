//! Query command implementation

use crate::app::App;
use crate::retrieve::RetrievedHit;
use crate::store::SearchFilter;
use serde::Serialize;
use tracing::info;

/// Query options
#[derive(Debug, Clone, Default)]
pub struct QueryOptions {
    /// Number of results to return (defaults to `retrieval.default_limit`)
    pub limit: Option<usize>,
    /// Restrict the search to these documents
    pub document_ids: Option<Vec<String>>,
}

impl QueryOptions {
    pub fn filter(&self) -> Option<SearchFilter> {
        self.document_ids.clone().map(SearchFilter::documents)
    }
}

/// Query result for CLI display
#[derive(Debug, Clone, Serialize)]
pub struct QueryResult {
    pub query: String,
    pub hits: Vec<RetrievedHit>,
}

/// Execute a semantic search
pub async fn cmd_query(app: &App, query: &str, options: QueryOptions) -> QueryResult {
    let limit = options.limit.unwrap_or(app.config.retrieval.default_limit);
    let filter = options.filter();

    let hits = app.retrieval.find_relevant(query, limit, filter.as_ref()).await;
    info!("Returning {} results", hits.len());

    QueryResult {
        query: query.to_string(),
        hits,
    }
}

/// One-line location label such as `paper.pdf, p. 4`
pub(crate) fn location(filename: &str, page: Option<i64>) -> String {
    match page {
        Some(page) => format!("{}, p. {}", filename, page),
        None => filename.to_string(),
    }
}

pub(crate) fn one_line_preview(text: &str, max_chars: usize) -> String {
    let flat = text.split_whitespace().collect::<Vec<_>>().join(" ");
    if flat.chars().count() > max_chars {
        let cut: String = flat.chars().take(max_chars).collect();
        format!("{}...", cut.trim_end())
    } else {
        flat
    }
}

/// Print query results to console
pub fn print_query_results(result: &QueryResult) {
    println!("\n🔍 Query: {}\n", result.query);

    if result.hits.is_empty() {
        println!("No relevant passages found.");
        return;
    }

    println!("Found {} results:\n", result.hits.len());

    for (i, hit) in result.hits.iter().enumerate() {
        println!(
            "{}. [distance: {:.3}] {}",
            i + 1,
            hit.distance,
            location(&hit.original_filename, hit.page_number)
        );
        if let Some(title) = &hit.title {
            println!("   Title: {}", title);
        }
        println!("   ID: {}", hit.chunk_id);
        println!("   {}\n", one_line_preview(&hit.content, 200));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::testing::test_app;
    use crate::commands::{cmd_ingest, IngestOptions};
    use crate::generate::testing::ScriptedGenerator;
    use std::sync::Arc;

    #[test]
    fn test_one_line_preview() {
        assert_eq!(one_line_preview("a\n\nb  c", 10), "a b c");
        assert_eq!(one_line_preview("abcdef ghij", 5), "abcde...");
    }

    #[test]
    fn test_location() {
        assert_eq!(location("p.pdf", Some(3)), "p.pdf, p. 3");
        assert_eq!(location("p.pdf", None), "p.pdf");
    }

    #[tokio::test]
    async fn test_query_uses_default_limit_and_filter() {
        let (app, tmp) = test_app(Arc::new(ScriptedGenerator::replying("ok"))).await;
        let path = tmp.path().join("notes.txt");
        let body: String = (0..12)
            .map(|i| format!("paragraph {} about attention and transformers.\n\n", i))
            .collect();
        std::fs::write(&path, body).unwrap();
        let stats = cmd_ingest(&app, &path, IngestOptions::default()).await.unwrap();
        assert!(stats.chunks_indexed > 1);

        let result = cmd_query(&app, "attention", QueryOptions::default()).await;
        assert!(!result.hits.is_empty());
        assert!(result.hits.len() <= app.config.retrieval.default_limit);

        let filtered = cmd_query(
            &app,
            "attention",
            QueryOptions {
                limit: Some(3),
                document_ids: Some(vec!["someone-else".to_string()]),
            },
        )
        .await;
        assert!(filtered.hits.is_empty());
    }
}
