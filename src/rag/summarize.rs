//! Concurrent summaries of retrieved passages
//!
//! Each hit is summarized independently; one failed summary is recorded as
//! such and never affects the others or their order.

use crate::generate::{GenerationGateway, GenerationOutcome};
use crate::retrieve::RetrievedHit;
use futures::future::join_all;
use serde::Serialize;
use tracing::{info, warn};

const SUMMARY_TEMPLATE: &str = "\
Summarize the following excerpt from a scientific document in two or three sentences. \
State only what the excerpt says.

EXCERPT:
{content}

SUMMARY:";

/// Result of summarizing one hit
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", content = "text", rename_all = "lowercase")]
pub enum SummaryOutcome {
    Summary(String),
    Failed(String),
}

impl SummaryOutcome {
    pub fn is_failed(&self) -> bool {
        matches!(self, SummaryOutcome::Failed(_))
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct HitSummary {
    pub chunk_id: String,
    pub original_filename: String,
    pub page_number: Option<i64>,
    pub outcome: SummaryOutcome,
}

/// Summarizes several hits concurrently
pub struct HitSummarizer {
    generator: GenerationGateway,
}

impl HitSummarizer {
    pub fn new(generator: GenerationGateway) -> Self {
        Self { generator }
    }

    /// One summary per hit, in input order. A failed summary never affects
    /// the others.
    pub async fn summarize(&self, hits: &[RetrievedHit]) -> Vec<HitSummary> {
        info!("Summarizing {} hits", hits.len());

        let outcomes = join_all(hits.iter().map(|hit| self.summarize_one(hit))).await;

        hits.iter()
            .zip(outcomes)
            .map(|(hit, outcome)| HitSummary {
                chunk_id: hit.chunk_id.clone(),
                original_filename: hit.original_filename.clone(),
                page_number: hit.page_number,
                outcome,
            })
            .collect()
    }

    async fn summarize_one(&self, hit: &RetrievedHit) -> SummaryOutcome {
        let prompt = SUMMARY_TEMPLATE.replace("{content}", &hit.content);
        match self.generator.generate_prompt(&prompt).await {
            GenerationOutcome::Reply(text) => SummaryOutcome::Summary(text.trim().to_string()),
            GenerationOutcome::Failed(text) => {
                warn!("Summary for chunk {} failed: {}", hit.chunk_id, text);
                SummaryOutcome::Failed(text)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::GenerationConfig;
    use crate::error::{Error, Result};
    use crate::generate::{ChatMessage, Generator};
    use async_trait::async_trait;
    use std::sync::Arc;
    use std::time::Duration;

    /// Fails on excerpts containing "broken"; slower for earlier excerpts so
    /// completion order differs from input order
    struct EchoGenerator;

    #[async_trait]
    impl Generator for EchoGenerator {
        async fn generate(&self, messages: Vec<ChatMessage>) -> Result<String> {
            let prompt = &messages[0].content;
            if prompt.contains("broken") {
                return Err(Error::Generation("refused".to_string()));
            }
            let delay = if prompt.contains("first") { 50 } else { 5 };
            tokio::time::sleep(Duration::from_millis(delay)).await;
            let excerpt = prompt
                .split("EXCERPT:\n")
                .nth(1)
                .and_then(|rest| rest.split("\n\nSUMMARY:").next())
                .unwrap_or_default();
            Ok(format!("summary of {}", excerpt))
        }

        fn model_name(&self) -> &str {
            "echo"
        }
    }

    fn hit(id: &str, content: &str) -> RetrievedHit {
        RetrievedHit {
            chunk_id: id.to_string(),
            document_id: "doc".to_string(),
            chunk_index: 0,
            content: content.to_string(),
            page_number: Some(1),
            original_filename: "paper.pdf".to_string(),
            title: None,
            author: None,
            publication_year: None,
            distance: 0.0,
        }
    }

    #[tokio::test]
    async fn test_outcomes_keep_input_order_and_isolate_failures() {
        let gateway = GenerationGateway::new(Arc::new(EchoGenerator), &GenerationConfig::default());
        let summarizer = HitSummarizer::new(gateway);

        let hits = vec![hit("a", "first"), hit("b", "broken"), hit("c", "third")];
        let summaries = summarizer.summarize(&hits).await;

        let ids: Vec<&str> = summaries.iter().map(|s| s.chunk_id.as_str()).collect();
        assert_eq!(ids, vec!["a", "b", "c"]);
        assert_eq!(
            summaries[0].outcome,
            SummaryOutcome::Summary("summary of first".to_string())
        );
        assert!(summaries[1].outcome.is_failed());
        assert_eq!(
            summaries[2].outcome,
            SummaryOutcome::Summary("summary of third".to_string())
        );
    }

    #[tokio::test]
    async fn test_empty_input() {
        let gateway = GenerationGateway::new(Arc::new(EchoGenerator), &GenerationConfig::default());
        assert!(HitSummarizer::new(gateway).summarize(&[]).await.is_empty());
    }
}
