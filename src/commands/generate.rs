//! Generate and summarize command implementations

use super::query::{location, one_line_preview, QueryOptions};
use crate::app::App;
use crate::rag::{GeneratedAnswer, HitSummary, SummaryOutcome};
use serde::Serialize;
use tracing::info;

/// Answer a question from the ingested documents
pub async fn cmd_generate(app: &App, query: &str, options: QueryOptions) -> GeneratedAnswer {
    let filter = options.filter();
    app.generation
        .generate(query, options.limit, filter.as_ref())
        .await
}

/// Print a generated answer with its sources
pub fn print_answer(answer: &GeneratedAnswer) {
    println!("\n{}\n", answer.text);

    if answer.sources.is_empty() {
        return;
    }

    if answer.failed {
        println!("Sources retrieved ({}), none cited:", answer.sources.len());
    } else if answer.cited.fallback {
        println!("Sources (no explicit citations, all treated as used):");
    } else {
        println!("Sources:");
    }

    for source in &answer.sources {
        let marker = if answer.cited.contains(&source.chunk_id) {
            "✓"
        } else {
            " "
        };
        println!(
            "  {} [ID:{}] {}",
            marker,
            source.chunk_id,
            location(&source.filename, source.page)
        );
        if let Some(title) = &source.title {
            println!("      {}", title);
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct SummarizeResult {
    pub query: String,
    pub summaries: Vec<HitSummary>,
}

/// Retrieve passages for `query` and summarize each one
pub async fn cmd_summarize(app: &App, query: &str, options: QueryOptions) -> SummarizeResult {
    let limit = options.limit.unwrap_or(app.config.retrieval.num_sources);
    let filter = options.filter();

    let hits = app.retrieval.find_relevant(query, limit, filter.as_ref()).await;
    let summaries = app.summarizer.summarize(&hits).await;
    info!(
        "Summarized {} of {} passages",
        summaries.iter().filter(|s| !s.outcome.is_failed()).count(),
        summaries.len()
    );

    SummarizeResult {
        query: query.to_string(),
        summaries,
    }
}

pub fn print_summaries(result: &SummarizeResult) {
    println!("\n📝 Summaries for: {}\n", result.query);

    if result.summaries.is_empty() {
        println!("No relevant passages found.");
        return;
    }

    for (i, summary) in result.summaries.iter().enumerate() {
        println!(
            "{}. {} [ID:{}]",
            i + 1,
            location(&summary.original_filename, summary.page_number),
            summary.chunk_id
        );
        match &summary.outcome {
            SummaryOutcome::Summary(text) => println!("   {}\n", one_line_preview(text, 600)),
            SummaryOutcome::Failed(reason) => println!("   ✗ {}\n", reason),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::testing::test_app;
    use crate::commands::{cmd_ingest, IngestOptions};
    use crate::context::NO_INFORMATION_ANSWER;
    use crate::generate::testing::ScriptedGenerator;
    use std::sync::Arc;

    #[tokio::test]
    async fn test_generate_on_empty_workspace() {
        let (app, _tmp) = test_app(Arc::new(ScriptedGenerator::replying("unused"))).await;
        let answer = cmd_generate(&app, "what is attention?", QueryOptions::default()).await;
        assert_eq!(answer.text, NO_INFORMATION_ANSWER);
        assert!(answer.sources.is_empty());
    }

    #[tokio::test]
    async fn test_summarize_ingested_passages() {
        let generator = Arc::new(ScriptedGenerator::replying("A short summary."));
        let (app, tmp) = test_app(generator).await;
        let path = tmp.path().join("paper.txt");
        std::fs::write(&path, "attention relates positions.\n\nthe decoder is autoregressive.").unwrap();
        cmd_ingest(&app, &path, IngestOptions::default()).await.unwrap();

        let result = cmd_summarize(
            &app,
            "attention",
            QueryOptions {
                limit: Some(5),
                document_ids: None,
            },
        )
        .await;

        assert!(!result.summaries.is_empty());
        assert!(result
            .summaries
            .iter()
            .all(|s| s.outcome == SummaryOutcome::Summary("A short summary.".to_string())));
    }
}
