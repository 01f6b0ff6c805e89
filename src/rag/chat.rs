use super::reconcile_reply;
use crate::cite::{CitationReconciler, CitationSet};
use crate::context::{assemble_context, chat_messages, source_details, SourceDetail};
use crate::error::Result;
use crate::generate::{ChatMessage, GenerationGateway};
use crate::meta::{MetaDb, Sender};
use crate::retrieve::RetrievalService;
use serde::Serialize;
use std::sync::Arc;
use tracing::{info, warn};

/// Options for one chat turn
#[derive(Debug, Clone)]
pub struct ChatOptions {
    /// Ground the reply in retrieved sources
    pub use_rag: bool,
    pub num_sources: usize,
}

/// The assistant's reply to one chat turn
#[derive(Debug, Clone, Serialize)]
pub struct ChatReply {
    pub session_id: String,
    pub message: String,
    /// `message` is a failure sentinel rather than a model reply
    pub failed: bool,
    pub sources: Vec<SourceDetail>,
    pub cited: CitationSet,
}

pub struct ChatService {
    retrieval: Arc<RetrievalService>,
    generator: GenerationGateway,
    reconciler: Arc<dyn CitationReconciler>,
    db: MetaDb,
    history_limit: usize,
}

impl ChatService {
    pub fn new(
        retrieval: Arc<RetrievalService>,
        generator: GenerationGateway,
        reconciler: Arc<dyn CitationReconciler>,
        db: MetaDb,
        history_limit: usize,
    ) -> Self {
        Self {
            retrieval,
            generator,
            reconciler,
            db,
            history_limit,
        }
    }

    /// Process one user message: replay recent history, optionally retrieve
    /// sources, generate and persist the reply
    pub async fn send(
        &self,
        session_id: &str,
        user_message: &str,
        options: &ChatOptions,
    ) -> Result<ChatReply> {
        info!("Chat turn in session {} (rag={})", session_id, options.use_rag);

        self.db.ensure_chat_session(session_id).await?;
        let history = self.load_history(session_id).await?;
        self.db
            .add_chat_message(session_id, Sender::User, user_message)
            .await?;

        let (context, sources) = if options.use_rag {
            let hits = self
                .retrieval
                .find_relevant(user_message, options.num_sources, None)
                .await;
            (Some(assemble_context(&hits)), source_details(&hits))
        } else {
            (None, Vec::new())
        };

        let messages = chat_messages(history, user_message, context.as_deref());
        let outcome = self.generator.generate(messages).await;

        self.db
            .add_chat_message(session_id, Sender::Ai, outcome.text())
            .await?;

        let cited = reconcile_reply(self.reconciler.as_ref(), &outcome, &sources);

        Ok(ChatReply {
            session_id: session_id.to_string(),
            failed: outcome.is_failed(),
            message: outcome.into_text(),
            sources,
            cited,
        })
    }

    async fn load_history(&self, session_id: &str) -> Result<Vec<ChatMessage>> {
        let records = self
            .db
            .get_chat_history(session_id, self.history_limit)
            .await?;

        Ok(records
            .into_iter()
            .filter_map(|record| match record.get_sender() {
                Ok(Sender::User) => Some(ChatMessage::user(record.content)),
                Ok(Sender::Ai) => Some(ChatMessage::assistant(record.content)),
                Err(e) => {
                    warn!("Skipping history message {}: {}", record.id, e);
                    None
                }
            })
            .collect())
    }
}
