//! Text generation
//!
//! The `Generator` trait wraps a chat-completion model. `GenerationGateway`
//! bounds each call with a timeout and turns failures into a
//! `GenerationOutcome::Failed` carrying a sentinel reply, so callers always
//! get text back and never have to guess whether it came from the model.

mod http_backend;

pub use http_backend::*;

use crate::config::GenerationConfig;
use crate::error::{Error, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// Prefix of every reply produced in place of a model answer
pub const ERROR_PREFIX: &str = "Error:";

/// What the gateway produced for one request
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GenerationOutcome {
    /// The model's reply
    Reply(String),
    /// A sentinel starting with `Error:` describing why there is no reply
    Failed(String),
}

impl GenerationOutcome {
    pub fn text(&self) -> &str {
        match self {
            GenerationOutcome::Reply(text) | GenerationOutcome::Failed(text) => text,
        }
    }

    pub fn into_text(self) -> String {
        match self {
            GenerationOutcome::Reply(text) | GenerationOutcome::Failed(text) => text,
        }
    }

    pub fn is_failed(&self) -> bool {
        matches!(self, GenerationOutcome::Failed(_))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

/// Trait for text generation providers
#[async_trait]
pub trait Generator: Send + Sync {
    /// Produce a reply to a conversation
    async fn generate(&self, messages: Vec<ChatMessage>) -> Result<String>;

    /// Get the model name
    fn model_name(&self) -> &str;
}

/// Create a generator based on configuration
pub fn create_generator(config: &GenerationConfig) -> Result<Arc<dyn Generator>> {
    let generator = HttpGenerator::new(config)?;
    Ok(Arc::new(generator))
}

#[derive(Clone)]
pub struct GenerationGateway {
    generator: Arc<dyn Generator>,
    timeout: Duration,
}

impl GenerationGateway {
    pub fn new(generator: Arc<dyn Generator>, config: &GenerationConfig) -> Self {
        Self {
            generator,
            timeout: config.timeout(),
        }
    }

    pub fn model_name(&self) -> &str {
        self.generator.model_name()
    }

    /// Generate a reply; failures come back as `Failed` with text starting
    /// with `Error:`
    pub async fn generate(&self, messages: Vec<ChatMessage>) -> GenerationOutcome {
        match self.try_generate(messages).await {
            Ok(text) => GenerationOutcome::Reply(text),
            Err(e) => {
                warn!("Generation failed: {}", e);
                GenerationOutcome::Failed(format!(
                    "{} the language model could not produce an answer ({})",
                    ERROR_PREFIX, e
                ))
            }
        }
    }

    /// Generate from a single user prompt
    pub async fn generate_prompt(&self, prompt: &str) -> GenerationOutcome {
        self.generate(vec![ChatMessage::user(prompt)]).await
    }

    async fn try_generate(&self, messages: Vec<ChatMessage>) -> Result<String> {
        debug!(
            "Generating with {} ({} messages)",
            self.generator.model_name(),
            messages.len()
        );
        let text = tokio::time::timeout(self.timeout, self.generator.generate(messages))
            .await
            .map_err(|_| Error::Timeout(self.timeout.as_secs()))??;

        if text.trim().is_empty() {
            return Err(Error::Generation("empty response".to_string()));
        }
        Ok(text)
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use std::sync::Mutex;

    /// Generator returning a scripted reply and recording what it was sent
    pub struct ScriptedGenerator {
        pub reply: std::result::Result<String, String>,
        pub seen: Mutex<Vec<Vec<ChatMessage>>>,
    }

    impl ScriptedGenerator {
        pub fn replying(reply: &str) -> Self {
            Self {
                reply: Ok(reply.to_string()),
                seen: Mutex::new(Vec::new()),
            }
        }

        pub fn failing(message: &str) -> Self {
            Self {
                reply: Err(message.to_string()),
                seen: Mutex::new(Vec::new()),
            }
        }

        pub fn last_messages(&self) -> Vec<ChatMessage> {
            self.seen.lock().unwrap().last().cloned().unwrap_or_default()
        }
    }

    #[async_trait]
    impl Generator for ScriptedGenerator {
        async fn generate(&self, messages: Vec<ChatMessage>) -> Result<String> {
            self.seen.lock().unwrap().push(messages);
            self.reply.clone().map_err(Error::Generation)
        }

        fn model_name(&self) -> &str {
            "scripted"
        }
    }
}
