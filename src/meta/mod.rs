//! Metadata storage using SQLite
//!
//! This module handles all local storage:
//! - Documents (ingested PDFs and their display metadata)
//! - Chunks (page-aligned text units, with embeddings as f32 BLOBs)
//! - Chat sessions and messages

mod infer;
mod schema;

pub use infer::*;
pub use schema::*;

use crate::chunk::ChunkRecord;
use crate::config::Config;
use crate::error::{Error, Result};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sqlx::sqlite::{SqliteConnectOptions, SqliteConnection, SqlitePool, SqlitePoolOptions};
use sqlx::FromRow;
use std::collections::HashMap;
use std::path::Path;
use std::str::FromStr;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Who wrote a chat message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Sender {
    User,
    Ai,
}

impl std::fmt::Display for Sender {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Sender::User => write!(f, "user"),
            Sender::Ai => write!(f, "ai"),
        }
    }
}

impl FromStr for Sender {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "user" => Ok(Sender::User),
            "ai" => Ok(Sender::Ai),
            _ => Err(Error::Other(format!("Unknown message sender: {}", s))),
        }
    }
}

/// An ingested document
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Document {
    pub id: String,
    pub original_filename: String,
    pub processed_document_id: String,
    pub title: Option<String>,
    pub author: Option<String>,
    pub publication_year: Option<i64>,
    pub content_hash: String,
    pub metadata_json: Option<String>,
    pub created_at: String,
}

impl Document {
    pub fn new(original_filename: String, content_hash: String) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            processed_document_id: processed_document_id(&original_filename),
            original_filename,
            title: None,
            author: None,
            publication_year: None,
            content_hash,
            metadata_json: None,
            created_at: Utc::now().to_rfc3339(),
        }
    }

    /// Ingestion details recorded with the document, `Null` when absent
    pub fn metadata(&self) -> Value {
        self.metadata_json
            .as_ref()
            .and_then(|j| serde_json::from_str(j).ok())
            .unwrap_or(Value::Null)
    }
}

/// A document together with its chunk count
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct DocumentListing {
    #[sqlx(flatten)]
    #[serde(flatten)]
    pub document: Document,
    pub chunk_count: i64,
}

/// A stored chunk
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Chunk {
    pub id: String,
    pub document_id: String,
    pub chunk_index: i64,
    pub content: String,
    pub page_number: Option<i64>,
    pub char_count: i64,
    pub char_start: i64,
    pub char_end: i64,
    #[serde(skip)]
    pub embedding: Option<Vec<u8>>,
    pub created_at: String,
}

impl Chunk {
    pub fn new(document_id: String, chunk_index: usize, record: &ChunkRecord) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            document_id,
            chunk_index: chunk_index as i64,
            content: record.content.clone(),
            page_number: Some(i64::from(record.page_number)),
            char_count: record.char_count as i64,
            char_start: record.char_start as i64,
            char_end: record.char_end as i64,
            embedding: None,
            created_at: Utc::now().to_rfc3339(),
        }
    }

    pub fn with_embedding(mut self, vector: &[f32]) -> Self {
        self.embedding = Some(encode_embedding(vector));
        self
    }

    /// Decode the stored embedding, if any
    pub fn embedding_vector(&self) -> Option<Vec<f32>> {
        self.embedding.as_deref().and_then(decode_embedding)
    }
}

/// A chat message row
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct ChatMessageRecord {
    pub id: i64,
    pub session_id: String,
    pub sender: String,
    pub content: String,
    pub created_at: String,
}

impl ChatMessageRecord {
    pub fn get_sender(&self) -> Result<Sender> {
        self.sender.parse()
    }
}

/// Encode a vector as little-endian f32 bytes
pub fn encode_embedding(vector: &[f32]) -> Vec<u8> {
    vector.iter().flat_map(|v| v.to_le_bytes()).collect()
}

/// Decode little-endian f32 bytes; `None` when the length is not a multiple of 4
pub fn decode_embedding(bytes: &[u8]) -> Option<Vec<f32>> {
    if bytes.len() % 4 != 0 {
        return None;
    }
    Some(
        bytes
            .chunks_exact(4)
            .map(|b| f32::from_le_bytes([b[0], b[1], b[2], b[3]]))
            .collect(),
    )
}

/// Metadata database handle
#[derive(Clone)]
pub struct MetaDb {
    pool: SqlitePool,
}

impl MetaDb {
    /// Connect to the metadata database
    pub async fn connect(config: &Config) -> Result<Self> {
        Self::open_pool(&config.paths.db_file).await
    }

    /// Open a database file directly, creating the schema when missing
    pub async fn open(db_path: &Path) -> Result<Self> {
        let db = Self::open_pool(db_path).await?;
        if !db.is_initialized().await? {
            db.init_schema().await?;
        }
        Ok(db)
    }

    async fn open_pool(db_path: &Path) -> Result<Self> {
        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let options = SqliteConnectOptions::new()
            .filename(db_path)
            .create_if_missing(true)
            .foreign_keys(true)
            .journal_mode(sqlx::sqlite::SqliteJournalMode::Wal)
            .synchronous(sqlx::sqlite::SqliteSynchronous::Normal);

        debug!("Connecting to SQLite database at {:?}", db_path);

        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await?;

        Ok(Self { pool })
    }

    /// Initialize the database schema
    pub async fn init_schema(&self) -> Result<()> {
        info!("Initializing database schema");
        sqlx::query(SCHEMA_SQL).execute(&self.pool).await?;
        Ok(())
    }

    /// Check if database is initialized
    pub async fn is_initialized(&self) -> Result<bool> {
        let result: Option<(i32,)> =
            sqlx::query_as("SELECT 1 FROM sqlite_master WHERE type='table' AND name='documents'")
                .fetch_optional(&self.pool)
                .await?;
        Ok(result.is_some())
    }

    // ===== Document Operations =====

    /// Write a document and its chunks in one transaction, first removing the
    /// document it replaces. On error nothing is written and nothing is removed.
    /// Embeddings whose dimension differs from `dimension` are stored as NULL.
    pub async fn store_document(
        &self,
        doc: &Document,
        chunks: &[Chunk],
        dimension: usize,
        replaces: Option<&str>,
    ) -> Result<usize> {
        let mut tx = self.pool.begin().await?;

        if let Some(old_id) = replaces {
            delete_document_rows(&mut tx, old_id).await?;
        }
        insert_document_row(&mut tx, doc).await?;
        let nulled = insert_chunk_rows(&mut tx, chunks, dimension).await?;

        tx.commit().await?;
        warn_nulled(nulled, dimension);
        Ok(chunks.len())
    }

    /// Get document by ID
    pub async fn get_document(&self, id: &str) -> Result<Option<Document>> {
        let doc = sqlx::query_as::<_, Document>("SELECT * FROM documents WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(doc)
    }

    /// Find an already ingested document with identical content
    pub async fn find_document_by_hash(&self, content_hash: &str) -> Result<Option<Document>> {
        let doc = sqlx::query_as::<_, Document>(
            "SELECT * FROM documents WHERE content_hash = ? ORDER BY created_at LIMIT 1",
        )
        .bind(content_hash)
        .fetch_optional(&self.pool)
        .await?;
        Ok(doc)
    }

    /// Fetch several documents at once, keyed by ID. Unknown IDs are absent.
    pub async fn get_documents(&self, ids: &[String]) -> Result<HashMap<String, Document>> {
        if ids.is_empty() {
            return Ok(HashMap::new());
        }

        let placeholders = ids.iter().map(|_| "?").collect::<Vec<_>>().join(",");
        let query = format!("SELECT * FROM documents WHERE id IN ({})", placeholders);

        let mut query_builder = sqlx::query_as::<_, Document>(&query);
        for id in ids {
            query_builder = query_builder.bind(id);
        }
        let docs = query_builder.fetch_all(&self.pool).await?;

        Ok(docs.into_iter().map(|d| (d.id.clone(), d)).collect())
    }

    /// List all documents with their chunk counts, newest first
    pub async fn list_documents(&self) -> Result<Vec<DocumentListing>> {
        let docs = sqlx::query_as::<_, DocumentListing>(
            r#"
            SELECT d.*, COUNT(c.id) AS chunk_count
            FROM documents d
            LEFT JOIN chunks c ON c.document_id = d.id
            GROUP BY d.id
            ORDER BY d.created_at DESC
            "#,
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(docs)
    }

    /// Delete a document and its chunks; returns whether it existed
    pub async fn delete_document(&self, id: &str) -> Result<bool> {
        let mut tx = self.pool.begin().await?;
        let existed = delete_document_rows(&mut tx, id).await?;
        tx.commit().await?;
        Ok(existed)
    }

    // ===== Chunk Operations =====

    /// Get chunks for a document in chunk order
    pub async fn get_chunks(&self, document_id: &str) -> Result<Vec<Chunk>> {
        let chunks = sqlx::query_as::<_, Chunk>(
            "SELECT * FROM chunks WHERE document_id = ? ORDER BY chunk_index",
        )
        .bind(document_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(chunks)
    }

    /// Load every chunk that has an embedding, in insertion order
    pub async fn load_embedded_chunks(&self) -> Result<Vec<Chunk>> {
        let chunks = sqlx::query_as::<_, Chunk>(
            "SELECT * FROM chunks WHERE embedding IS NOT NULL ORDER BY rowid",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(chunks)
    }

    // ===== Chat Operations =====

    /// Create the session if it does not exist yet; returns whether it was created
    pub async fn ensure_chat_session(&self, session_id: &str) -> Result<bool> {
        let result = sqlx::query("INSERT OR IGNORE INTO chat_sessions (id, created_at) VALUES (?, ?)")
            .bind(session_id)
            .bind(Utc::now().to_rfc3339())
            .execute(&self.pool)
            .await?;

        let created = result.rows_affected() > 0;
        if created {
            debug!("Created chat session {}", session_id);
        }
        Ok(created)
    }

    pub async fn add_chat_message(
        &self,
        session_id: &str,
        sender: Sender,
        content: &str,
    ) -> Result<i64> {
        let result = sqlx::query(
            "INSERT INTO chat_messages (session_id, sender, content, created_at) VALUES (?, ?, ?, ?)",
        )
        .bind(session_id)
        .bind(sender.to_string())
        .bind(content)
        .bind(Utc::now().to_rfc3339())
        .execute(&self.pool)
        .await?;
        Ok(result.last_insert_rowid())
    }

    /// The last `limit` messages of a session, oldest first
    pub async fn get_chat_history(
        &self,
        session_id: &str,
        limit: usize,
    ) -> Result<Vec<ChatMessageRecord>> {
        let mut messages = sqlx::query_as::<_, ChatMessageRecord>(
            "SELECT * FROM chat_messages WHERE session_id = ? ORDER BY id DESC LIMIT ?",
        )
        .bind(session_id)
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await?;
        messages.reverse();
        Ok(messages)
    }

    pub async fn delete_chat_session(&self, session_id: &str) -> Result<()> {
        let mut tx = self.pool.begin().await?;
        sqlx::query("DELETE FROM chat_messages WHERE session_id = ?")
            .bind(session_id)
            .execute(&mut *tx)
            .await?;
        sqlx::query("DELETE FROM chat_sessions WHERE id = ?")
            .bind(session_id)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;
        Ok(())
    }

    // ===== Statistics =====

    /// Get global statistics
    pub async fn get_global_stats(&self) -> Result<GlobalStats> {
        let document_count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM documents")
            .fetch_one(&self.pool)
            .await?;

        let chunk_count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM chunks")
            .fetch_one(&self.pool)
            .await?;

        let embedded_chunk_count: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM chunks WHERE embedding IS NOT NULL")
                .fetch_one(&self.pool)
                .await?;

        let session_count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM chat_sessions")
            .fetch_one(&self.pool)
            .await?;

        let message_count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM chat_messages")
            .fetch_one(&self.pool)
            .await?;

        Ok(GlobalStats {
            document_count: document_count as usize,
            chunk_count: chunk_count as usize,
            embedded_chunk_count: embedded_chunk_count as usize,
            session_count: session_count as usize,
            message_count: message_count as usize,
        })
    }
}

/// Global statistics
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GlobalStats {
    pub document_count: usize,
    pub chunk_count: usize,
    pub embedded_chunk_count: usize,
    pub session_count: usize,
    pub message_count: usize,
}

async fn insert_document_row(conn: &mut SqliteConnection, doc: &Document) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO documents (id, original_filename, processed_document_id, title, author, publication_year, content_hash, metadata_json, created_at)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(&doc.id)
    .bind(&doc.original_filename)
    .bind(&doc.processed_document_id)
    .bind(&doc.title)
    .bind(&doc.author)
    .bind(doc.publication_year)
    .bind(&doc.content_hash)
    .bind(&doc.metadata_json)
    .bind(&doc.created_at)
    .execute(&mut *conn)
    .await?;
    Ok(())
}

async fn delete_document_rows(conn: &mut SqliteConnection, id: &str) -> Result<bool> {
    sqlx::query("DELETE FROM chunks WHERE document_id = ?")
        .bind(id)
        .execute(&mut *conn)
        .await?;

    let result = sqlx::query("DELETE FROM documents WHERE id = ?")
        .bind(id)
        .execute(&mut *conn)
        .await?;
    Ok(result.rows_affected() > 0)
}

/// Returns how many embeddings were stored as NULL
async fn insert_chunk_rows(
    conn: &mut SqliteConnection,
    chunks: &[Chunk],
    dimension: usize,
) -> Result<usize> {
    let mut nulled = 0usize;

    for chunk in chunks {
        let embedding = match &chunk.embedding {
            Some(bytes) if bytes.len() == dimension * 4 => Some(bytes.as_slice()),
            Some(_) => {
                nulled += 1;
                None
            }
            None => None,
        };

        sqlx::query(
            r#"
            INSERT INTO chunks (id, document_id, chunk_index, content, page_number, char_count, char_start, char_end, embedding, created_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&chunk.id)
        .bind(&chunk.document_id)
        .bind(chunk.chunk_index)
        .bind(&chunk.content)
        .bind(chunk.page_number)
        .bind(chunk.char_count)
        .bind(chunk.char_start)
        .bind(chunk.char_end)
        .bind(embedding)
        .bind(&chunk.created_at)
        .execute(&mut *conn)
        .await?;
    }

    Ok(nulled)
}

fn warn_nulled(nulled: usize, dimension: usize) {
    if nulled > 0 {
        warn!(
            "Stored {} chunks without embeddings (dimension differs from {})",
            nulled, dimension
        );
    }
}
