//! Default values for configuration

/// Default embedding backend URL
pub fn default_embedding_backend_url() -> String {
    std::env::var("PAPERPILOT_EMBEDDING_URL")
        .unwrap_or_else(|_| "http://127.0.0.1:7997".to_string())
}

/// Default embedding model
pub fn default_embedding_model() -> String {
    "nomic-embed-text".to_string()
}

/// Default embedding dimension
pub fn default_embedding_dimension() -> usize {
    768
}

/// Default batch size for embedding
pub fn default_embedding_batch_size() -> usize {
    32
}

/// Default embedding request timeout in seconds
pub fn default_embedding_timeout() -> u64 {
    30
}

/// Default generation backend URL (OpenAI-compatible chat completions)
pub fn default_generation_backend_url() -> String {
    std::env::var("PAPERPILOT_GENERATION_URL")
        .unwrap_or_else(|_| "http://127.0.0.1:11434".to_string())
}

/// Default generation model
pub fn default_generation_model() -> String {
    "gemini-2.0-flash".to_string()
}

/// Default sampling temperature
pub fn default_generation_temperature() -> f32 {
    0.7
}

/// Default generation request timeout in seconds
pub fn default_generation_timeout() -> u64 {
    60
}

/// Default maximum characters per chunk
pub fn default_chunk_max_chars() -> usize {
    1500
}

/// Default share of a chunk repeated at the start of the next one
pub fn default_chunk_overlap_ratio() -> f64 {
    0.1
}

/// Default number of hits returned by a plain query
pub fn default_retrieval_limit() -> usize {
    5
}

/// Upper bound on hits per query
pub fn default_retrieval_max_limit() -> usize {
    20
}

/// Default number of sources fed into generation and chat prompts
pub fn default_retrieval_num_sources() -> usize {
    3
}

/// Default number of chat messages replayed as history
pub fn default_chat_history_limit() -> usize {
    10
}
