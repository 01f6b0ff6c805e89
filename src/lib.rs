//! paperpilot: page-aware chunking, semantic retrieval and citation
//! tracking for text generation grounded in scientific PDFs
//!
//! This crate provides:
//! - Page-aligned chunking of extracted PDF text
//! - Embedding and generation clients for HTTP model backends
//! - An in-memory cosine vector index backed by SQLite storage
//! - Retrieval, context assembly and citation reconciliation
//! - One-shot answers, multi-turn chat and per-passage summaries

pub mod app;
pub mod backend;
pub mod chunk;
pub mod cite;
pub mod commands;
pub mod config;
pub mod context;
pub mod embed;
pub mod error;
pub mod generate;
pub mod meta;
pub mod progress;
pub mod rag;
pub mod retrieve;
pub mod store;

pub use app::App;
pub use config::Config;
pub use error::{Error, Result};
