//! Status command implementation

use crate::app::App;
use crate::error::Result;
use crate::meta::GlobalStats;
use serde::Serialize;
use tracing::info;

/// Status information
#[derive(Debug, Clone, Serialize)]
pub struct StatusInfo {
    pub config_path: String,
    pub db_path: String,
    pub embedding_backend: String,
    pub embedding_model: String,
    pub embedding_dimension: usize,
    pub generation_backend: String,
    pub generation_model: String,
    pub index_entries: usize,
    pub index_documents: usize,
    pub db_stats: GlobalStats,
}

/// Get system status
pub async fn cmd_status(app: &App) -> Result<StatusInfo> {
    info!("Getting status");

    let db_stats = app.db.get_global_stats().await?;
    let index_stats = app.index.stats().await;
    let config = &app.config;

    Ok(StatusInfo {
        config_path: config.paths.config_file.display().to_string(),
        db_path: config.paths.db_file.display().to_string(),
        embedding_backend: config.embedding.backend_url.clone(),
        embedding_model: app.embedder.model_name().to_string(),
        embedding_dimension: index_stats.dimension,
        generation_backend: config.generation.backend_url.clone(),
        generation_model: config.generation.model.clone(),
        index_entries: index_stats.entries,
        index_documents: index_stats.documents,
        db_stats,
    })
}

/// Print status to console
pub fn print_status(status: &StatusInfo) {
    println!("\n📊 paperpilot Status\n");
    println!("Configuration: {}", status.config_path);
    println!("Database: {}", status.db_path);
    println!("\nEmbedding:");
    println!("  Backend: {}", status.embedding_backend);
    println!(
        "  Model: {} ({} dimensions)",
        status.embedding_model, status.embedding_dimension
    );
    println!("\nGeneration:");
    println!("  Backend: {}", status.generation_backend);
    println!("  Model: {}", status.generation_model);
    println!("\nVector Index:");
    println!(
        "  Vectors: {} across {} documents",
        status.index_entries, status.index_documents
    );
    println!("\nDatabase Stats:");
    println!("  Documents: {}", status.db_stats.document_count);
    println!(
        "  Chunks: {} ({} embedded)",
        status.db_stats.chunk_count, status.db_stats.embedded_chunk_count
    );
    println!(
        "  Chat sessions: {} ({} messages)",
        status.db_stats.session_count, status.db_stats.message_count
    );
}
