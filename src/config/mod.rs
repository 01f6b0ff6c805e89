//! Configuration management for paperpilot
//!
//! Handles loading, saving, and validating configuration from TOML files.

mod defaults;

pub use defaults::*;

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info};

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Embedding backend configuration
    #[serde(default)]
    pub embedding: EmbeddingConfig,

    /// Text generation backend configuration
    #[serde(default)]
    pub generation: GenerationConfig,

    /// Chunking configuration
    #[serde(default)]
    pub chunk: ChunkConfig,

    /// Retrieval configuration
    #[serde(default)]
    pub retrieval: RetrievalConfig,

    /// Paths configuration (internal, not user-editable)
    #[serde(skip)]
    pub paths: PathsConfig,
}

/// Embedding configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingConfig {
    /// Base URL of the embedding backend
    #[serde(default = "default_embedding_backend_url")]
    pub backend_url: String,

    /// Model name/identifier
    #[serde(default = "default_embedding_model")]
    pub model: String,

    /// Embedding dimension (must match model)
    #[serde(default = "default_embedding_dimension")]
    pub dimension: usize,

    /// Batch size for embedding
    #[serde(default = "default_embedding_batch_size")]
    pub batch_size: usize,

    /// Per-request timeout in seconds
    #[serde(default = "default_embedding_timeout")]
    pub timeout_secs: u64,
}

impl EmbeddingConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// Generation configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationConfig {
    /// Base URL of an OpenAI-compatible chat completions backend
    #[serde(default = "default_generation_backend_url")]
    pub backend_url: String,

    /// Model name/identifier
    #[serde(default = "default_generation_model")]
    pub model: String,

    /// Sampling temperature
    #[serde(default = "default_generation_temperature")]
    pub temperature: f32,

    /// Environment variable holding the backend API key (optional)
    #[serde(default)]
    pub api_key_env: Option<String>,

    /// Per-request timeout in seconds
    #[serde(default = "default_generation_timeout")]
    pub timeout_secs: u64,
}

impl GenerationConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// Get the backend API key from environment
    pub fn api_key(&self) -> Option<String> {
        self.api_key_env
            .as_deref()
            .and_then(|name| std::env::var(name).ok())
    }
}

/// Chunking configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChunkConfig {
    /// Maximum characters per chunk
    #[serde(default = "default_chunk_max_chars")]
    pub max_chars: usize,

    /// Fraction of `max_chars` repeated at the start of the following chunk
    #[serde(default = "default_chunk_overlap_ratio")]
    pub overlap_ratio: f64,
}

impl ChunkConfig {
    /// Overlap in characters
    pub fn overlap_chars(&self) -> usize {
        (self.max_chars as f64 * self.overlap_ratio).floor() as usize
    }
}

/// Retrieval configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrievalConfig {
    /// Default number of results for a query
    #[serde(default = "default_retrieval_limit")]
    pub default_limit: usize,

    /// Maximum results allowed
    #[serde(default = "default_retrieval_max_limit")]
    pub max_limit: usize,

    /// Number of sources offered to generation and chat prompts
    #[serde(default = "default_retrieval_num_sources")]
    pub num_sources: usize,

    /// Chat messages replayed as conversation history
    #[serde(default = "default_chat_history_limit")]
    pub history_limit: usize,
}

/// Internal paths configuration
#[derive(Debug, Clone, Default)]
pub struct PathsConfig {
    /// Base directory for paperpilot data
    pub base_dir: PathBuf,

    /// Path to config file
    pub config_file: PathBuf,

    /// Path to SQLite database
    pub db_file: PathBuf,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            backend_url: default_embedding_backend_url(),
            model: default_embedding_model(),
            dimension: default_embedding_dimension(),
            batch_size: default_embedding_batch_size(),
            timeout_secs: default_embedding_timeout(),
        }
    }
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            backend_url: default_generation_backend_url(),
            model: default_generation_model(),
            temperature: default_generation_temperature(),
            api_key_env: None,
            timeout_secs: default_generation_timeout(),
        }
    }
}

impl Default for ChunkConfig {
    fn default() -> Self {
        Self {
            max_chars: default_chunk_max_chars(),
            overlap_ratio: default_chunk_overlap_ratio(),
        }
    }
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            default_limit: default_retrieval_limit(),
            max_limit: default_retrieval_max_limit(),
            num_sources: default_retrieval_num_sources(),
            history_limit: default_chat_history_limit(),
        }
    }
}

impl Config {
    /// Get the default base directory for paperpilot (~/.paperpilot)
    pub fn default_base_dir() -> PathBuf {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".paperpilot")
    }

    /// Get the default config file path
    pub fn default_config_path() -> PathBuf {
        Self::default_base_dir().join("config.toml")
    }

    /// Initialize paths configuration
    pub fn init_paths(&mut self, base_dir: Option<PathBuf>) {
        let base = base_dir.unwrap_or_else(Self::default_base_dir);
        self.paths = PathsConfig {
            config_file: base.join("config.toml"),
            db_file: base.join("metadata.db"),
            base_dir: base,
        };
    }

    /// Load configuration from a specific file path
    pub fn load(config_path: &Path) -> Result<Self> {
        debug!("Loading config from {:?}", config_path);

        if !config_path.exists() {
            return Err(Error::Config(format!(
                "Config file not found: {}",
                config_path.display()
            )));
        }

        let content = std::fs::read_to_string(config_path)?;
        let mut config: Config = toml::from_str(&content)?;

        let base = config_path.parent().unwrap_or(Path::new(".")).to_path_buf();
        config.paths = PathsConfig {
            config_file: config_path.to_path_buf(),
            db_file: base.join("metadata.db"),
            base_dir: base,
        };

        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a specific base directory, falling back to defaults
    pub fn load_from(base_dir: Option<PathBuf>) -> Result<Self> {
        let mut config = Config::default();
        config.init_paths(base_dir);

        if config.paths.config_file.exists() {
            debug!("Loading config from {:?}", config.paths.config_file);
            let content = std::fs::read_to_string(&config.paths.config_file)?;
            let mut loaded: Config = toml::from_str(&content)?;
            loaded.paths = config.paths;
            config = loaded;
        } else {
            debug!("No config file found, using defaults");
        }

        config.validate()?;
        Ok(config)
    }

    /// Save configuration to file
    pub fn save(&self) -> Result<()> {
        if let Some(parent) = self.paths.config_file.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let content = toml::to_string_pretty(self)?;
        std::fs::write(&self.paths.config_file, content)?;
        info!("Saved config to {:?}", self.paths.config_file);
        Ok(())
    }

    /// Check if paperpilot is initialized (config and DB exist)
    pub fn is_initialized(&self) -> bool {
        self.paths.config_file.exists() && self.paths.db_file.exists()
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if self.chunk.max_chars == 0 {
            return Err(Error::Config("chunk.max_chars must be positive".to_string()));
        }

        if !(0.0..1.0).contains(&self.chunk.overlap_ratio) {
            return Err(Error::Config(
                "chunk.overlap_ratio must be in [0.0, 1.0)".to_string(),
            ));
        }

        if self.embedding.dimension == 0 {
            return Err(Error::Config(
                "embedding.dimension must be positive".to_string(),
            ));
        }

        if self.embedding.batch_size == 0 {
            return Err(Error::Config(
                "embedding.batch_size must be positive".to_string(),
            ));
        }

        if !(0.0..=2.0).contains(&self.generation.temperature) {
            return Err(Error::Config(
                "generation.temperature must be between 0.0 and 2.0".to_string(),
            ));
        }

        if self.retrieval.max_limit == 0 {
            return Err(Error::Config(
                "retrieval.max_limit must be positive".to_string(),
            ));
        }

        if self.retrieval.default_limit > self.retrieval.max_limit {
            return Err(Error::Config(
                "retrieval.default_limit must be <= retrieval.max_limit".to_string(),
            ));
        }

        Ok(())
    }
}
