//! Shared HTTP plumbing for the model backends
//!
//! Both the embedding and the generation backends are plain JSON-over-HTTP
//! services. This client owns the base URL, request timeout and retry policy.

use crate::error::{Error, Result};
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::time::Duration;
use url::Url;

/// Which backend a client talks to; selects the error variant on failure
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendKind {
    Embedding,
    Generation,
}

impl BackendKind {
    fn error(self, message: String) -> Error {
        match self {
            BackendKind::Embedding => Error::Embedding(message),
            BackendKind::Generation => Error::Generation(message),
        }
    }

    fn label(self) -> &'static str {
        match self {
            BackendKind::Embedding => "embedding",
            BackendKind::Generation => "generation",
        }
    }
}

pub struct BackendClient {
    client: Client,
    base_url: Url,
    kind: BackendKind,
    api_key: Option<String>,
    retries: usize,
}

impl BackendClient {
    pub fn new(kind: BackendKind, base_url: &str, timeout: Duration) -> Result<Self> {
        let base_url = Url::parse(base_url)?;
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            base_url,
            kind,
            api_key: None,
            retries: 2,
        })
    }

    /// Send `Authorization: Bearer <key>` with every request
    pub fn with_api_key(mut self, api_key: Option<String>) -> Self {
        self.api_key = api_key;
        self
    }

    pub fn with_retries(mut self, retries: usize) -> Self {
        self.retries = retries;
        self
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    fn endpoint(&self, path: &str) -> Result<Url> {
        self.base_url.join(path).map_err(|e| {
            Error::Config(format!("Invalid {} backend URL: {}", self.kind.label(), e))
        })
    }

    /// POST a JSON body and decode the JSON response
    pub async fn post_json<B, T>(&self, path: &str, body: &B) -> Result<T>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let url = self.endpoint(path)?;
        let mut request = self.client.post(url).json(body);
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }
        self.send_with_retry(request).await
    }

    async fn send_with_retry<T: DeserializeOwned>(
        &self,
        request: reqwest::RequestBuilder,
    ) -> Result<T> {
        let mut last_err: Option<Error> = None;
        for attempt in 0..=self.retries {
            let req = request.try_clone().ok_or_else(|| {
                self.kind
                    .error(format!("Failed to clone {} request", self.kind.label()))
            })?;
            match req.send().await {
                Ok(response) => match response.error_for_status() {
                    Ok(ok) => {
                        return ok
                            .json::<T>()
                            .await
                            .map_err(|e| self.kind.error(format!("Malformed response: {}", e)))
                    }
                    Err(e) => last_err = Some(self.kind.error(e.to_string())),
                },
                Err(e) => last_err = Some(self.kind.error(e.to_string())),
            }

            if attempt < self.retries {
                tokio::time::sleep(Duration::from_millis(200 * (attempt + 1) as u64)).await;
            }
        }

        Err(last_err.unwrap_or_else(|| {
            self.kind
                .error(format!("{} backend request failed", self.kind.label()))
        }))
    }
}
