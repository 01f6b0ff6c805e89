use super::{ChatMessage, Generator};
use crate::backend::{BackendClient, BackendKind};
use crate::config::GenerationConfig;
use crate::error::{Error, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize)]
struct CompletionRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    temperature: f32,
    stream: bool,
}

#[derive(Debug, Clone, Deserialize)]
struct CompletionResponse {
    choices: Vec<CompletionChoice>,
}

#[derive(Debug, Clone, Deserialize)]
struct CompletionChoice {
    message: CompletionMessage,
}

#[derive(Debug, Clone, Deserialize)]
struct CompletionMessage {
    #[serde(default)]
    content: Option<String>,
}

/// Generator backed by an OpenAI-compatible `POST /v1/chat/completions`
pub struct HttpGenerator {
    client: BackendClient,
    model_id: String,
    temperature: f32,
}

impl HttpGenerator {
    pub fn new(config: &GenerationConfig) -> Result<Self> {
        let client = BackendClient::new(
            BackendKind::Generation,
            &config.backend_url,
            config.timeout(),
        )?
        .with_api_key(config.api_key());
        Ok(Self {
            client,
            model_id: config.model.clone(),
            temperature: config.temperature,
        })
    }
}

#[async_trait]
impl Generator for HttpGenerator {
    async fn generate(&self, messages: Vec<ChatMessage>) -> Result<String> {
        let request = CompletionRequest {
            model: &self.model_id,
            messages: &messages,
            temperature: self.temperature,
            stream: false,
        };
        let parsed: CompletionResponse = self
            .client
            .post_json("/v1/chat/completions", &request)
            .await?;

        parsed
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .ok_or_else(|| Error::Generation("Response contained no choices".to_string()))
    }

    fn model_name(&self) -> &str {
        &self.model_id
    }
}
