//! Custom error types for paperpilot

use thiserror::Error;

/// Main error type for paperpilot operations
#[derive(Error, Debug)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Embedding error: {0}")]
    Embedding(String),

    #[error("Generation error: {0}")]
    Generation(String),

    #[error("Backend timed out after {0}s")]
    Timeout(u64),

    #[error("Invalid table of contents: {0}")]
    Toc(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("URL parse error: {0}")]
    UrlParse(#[from] url::ParseError),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),

    #[error("TOML serialize error: {0}")]
    TomlSerialize(#[from] toml::ser::Error),

    #[error("Document not found: {0}")]
    DocumentNotFound(String),

    #[error("Not initialized: run 'paperpilot init' first")]
    NotInitialized,

    #[error("Invalid path: {0}")]
    InvalidPath(String),

    #[error("{0}")]
    Other(String),
}

/// Result type alias for paperpilot
pub type Result<T> = std::result::Result<T, Error>;
