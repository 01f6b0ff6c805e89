//! Prompt templates for source-grounded generation and chat

use crate::generate::ChatMessage;

/// Answer returned when retrieval finds nothing to ground a generation on
pub const NO_INFORMATION_ANSWER: &str =
    "I could not find specific information about your request in the available documents.";

const GENERATION_TEMPLATE: &str = "\
You are a highly qualified research assistant experienced in scientific writing. \
Write precise, coherent and well structured text based exclusively on the sources provided. \
Do not speculate or add information the sources do not state. If the sources do not \
answer the request, say so clearly.

PROVIDED SOURCES (each block is tagged with a unique chunk ID and carries document, author, year and page):
{context}

USER REQUEST:
{query}

INSTRUCTIONS:
1. Write a thorough, well-founded answer to the request.
2. Integrate the information from the sources naturally and logically.
3. CITATIONS: for every paragraph cite exactly one source, the chunk most of the paragraph relies on, in the form [ID:CHUNK_ID].
4. Avoid citing several IDs at once unless a direct comparison requires it.
5. Vary the cited sources across paragraphs instead of repeating the same one.
6. Use a clear academic style.

ANSWER:";

const CHAT_SYSTEM_PROMPT: &str = "\
You are PaperPilot, an assistant for working with scientific papers. \
Answer conversationally and ground factual statements in the provided sources. \
Cite a source with [ID:CHUNK_ID] whenever you use it.";

/// Build the single-shot, source-grounded generation prompt
pub fn generation_prompt(context: &str, query: &str) -> String {
    GENERATION_TEMPLATE
        .replace("{context}", context.trim())
        .replace("{query}", query)
}

/// Build the messages for one chat turn: system prompt, replayed history,
/// then the user message, prefixed with retrieved context when there is any
pub fn chat_messages(
    history: Vec<ChatMessage>,
    user_message: &str,
    context: Option<&str>,
) -> Vec<ChatMessage> {
    let mut messages = Vec::with_capacity(history.len() + 2);
    messages.push(ChatMessage::system(CHAT_SYSTEM_PROMPT));
    messages.extend(history);

    let content = match context {
        Some(context) => format!(
            "Based on the following sources:\n{}\n\nMy question: {}",
            context, user_message
        ),
        None => user_message.to_string(),
    };
    messages.push(ChatMessage::user(content));
    messages
}
