//! paperpilot CLI entry point

use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::{generate, Shell};
use paperpilot::{
    commands::{
        cmd_chat, cmd_clear_chat, cmd_delete_document, cmd_generate, cmd_ingest, cmd_init,
        cmd_list_documents, cmd_query, cmd_show_document, cmd_status, cmd_summarize,
        print_answer, print_chat_reply, print_document_detail, print_documents,
        print_ingest_stats, print_init, print_query_results, print_status, print_summaries,
        run_chat_repl, IngestOptions, InitOptions, QueryOptions,
    },
    config::Config,
    error::Result,
    progress::LogWriterFactory,
    rag::ChatOptions,
    App,
};
use serde::Serialize;
use std::path::{Path, PathBuf};
use tracing::error;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Parser)]
#[command(name = "paperpilot")]
#[command(version, about = "Ask questions about scientific papers with page-accurate citations", long_about = None)]
struct Cli {
    /// Path to config file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Output as JSON
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize paperpilot configuration and database
    Init {
        /// Force overwrite existing config
        #[arg(long)]
        force: bool,
    },

    /// Ingest the extracted text of a PDF
    Ingest {
        /// Flattened text (markdown) produced by the PDF extractor
        path: PathBuf,

        /// Extractor sidecar JSON with the table of contents and PDF metadata
        #[arg(long)]
        meta: Option<PathBuf>,

        /// Original filename to record (defaults to the text file's name)
        #[arg(long)]
        filename: Option<String>,

        /// Document title
        #[arg(long)]
        title: Option<String>,

        /// Document author
        #[arg(long)]
        author: Option<String>,

        /// Publication year (inferred from the text when omitted)
        #[arg(long)]
        year: Option<i64>,

        /// Re-ingest even if identical content is already stored
        #[arg(long)]
        force: bool,
    },

    /// Search ingested documents
    Query {
        /// The search query
        query: String,

        /// Maximum number of results
        #[arg(short, long)]
        limit: Option<usize>,

        /// Restrict to specific document IDs
        #[arg(long)]
        document: Option<Vec<String>>,
    },

    /// Answer a question with cited sources
    Generate {
        /// The question or writing request
        query: String,

        /// Number of sources to offer the model
        #[arg(short = 'n', long)]
        sources: Option<usize>,

        /// Restrict to specific document IDs
        #[arg(long)]
        document: Option<Vec<String>>,
    },

    /// Chat about the ingested documents
    ///
    /// Without a message, reads messages from stdin until EOF or /quit
    Chat {
        /// Message to send
        message: Option<String>,

        /// Continue an existing session
        #[arg(short, long)]
        session: Option<String>,

        /// Answer without retrieving sources
        #[arg(long)]
        no_rag: bool,

        /// Number of sources to retrieve per message
        #[arg(short = 'n', long)]
        sources: Option<usize>,

        /// Delete the session's history and exit
        #[arg(long, requires = "session")]
        clear: bool,
    },

    /// Summarize the passages most relevant to a query
    Summarize {
        /// The search query
        query: String,

        /// Number of passages to summarize
        #[arg(short = 'n', long)]
        sources: Option<usize>,

        /// Restrict to specific document IDs
        #[arg(long)]
        document: Option<Vec<String>>,
    },

    /// Manage ingested documents
    Documents {
        #[command(subcommand)]
        action: Option<DocumentAction>,
    },

    /// Show system status
    Status,

    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

#[derive(Subcommand)]
enum DocumentAction {
    /// List ingested documents
    List,

    /// Show a document and its chunks
    Show {
        /// Document ID (use 'paperpilot documents' to list)
        document_id: String,
    },

    /// Remove a document and all its chunks
    Delete {
        /// Document ID (use 'paperpilot documents' to list)
        document_id: String,
    },
}

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        error!("{}", e);
        std::process::exit(1);
    }
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

async fn run() -> Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("debug"))
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(LogWriterFactory))
        .with(filter)
        .init();

    if let Commands::Init { force } = cli.command {
        let options = init_options(cli.config.as_deref(), force);
        let config = cmd_init(options).await?;
        if cli.json {
            print_json(&config)?;
        } else {
            print_init(&config);
        }
        return Ok(());
    }

    if let Commands::Completions { shell } = cli.command {
        let mut cmd = Cli::command();
        generate(shell, &mut cmd, "paperpilot", &mut std::io::stdout());
        return Ok(());
    }

    let config_path = cli
        .config
        .clone()
        .unwrap_or_else(Config::default_config_path);
    if !config_path.exists() {
        eprintln!(
            "Config file not found: {}\nRun 'paperpilot init' first.",
            config_path.display()
        );
        std::process::exit(1);
    }

    let config = Config::load(&config_path)?;
    let app = App::build(config).await?;

    match cli.command {
        Commands::Init { .. } | Commands::Completions { .. } => unreachable!(),

        Commands::Ingest {
            path,
            meta,
            filename,
            title,
            author,
            year,
            force,
        } => {
            let options = IngestOptions {
                meta_path: meta,
                filename,
                title,
                author,
                year,
                force,
            };
            let stats = cmd_ingest(&app, &path, options).await?;
            if cli.json {
                print_json(&stats)?;
            } else {
                print_ingest_stats(&stats);
            }
        }

        Commands::Query {
            query,
            limit,
            document,
        } => {
            let options = QueryOptions {
                limit,
                document_ids: document,
            };
            let result = cmd_query(&app, &query, options).await;
            if cli.json {
                print_json(&result)?;
            } else {
                print_query_results(&result);
            }
        }

        Commands::Generate {
            query,
            sources,
            document,
        } => {
            let options = QueryOptions {
                limit: sources,
                document_ids: document,
            };
            let answer = cmd_generate(&app, &query, options).await;
            if cli.json {
                print_json(&answer)?;
            } else {
                print_answer(&answer);
            }
        }

        Commands::Chat {
            message,
            session,
            no_rag,
            sources,
            clear,
        } => {
            let options = ChatOptions {
                use_rag: !no_rag,
                num_sources: sources.unwrap_or(app.config.retrieval.num_sources),
            };

            if clear {
                if let Some(session) = session.as_deref() {
                    cmd_clear_chat(&app, session).await?;
                    println!("✓ Cleared chat session {}", session);
                }
            } else if let Some(message) = message {
                let reply = cmd_chat(&app, session.as_deref(), &message, &options).await?;
                if cli.json {
                    print_json(&reply)?;
                } else {
                    print_chat_reply(&reply);
                    println!("\n(session: {})", reply.session_id);
                }
            } else {
                run_chat_repl(&app, session.as_deref(), &options).await?;
            }
        }

        Commands::Summarize {
            query,
            sources,
            document,
        } => {
            let options = QueryOptions {
                limit: sources,
                document_ids: document,
            };
            let result = cmd_summarize(&app, &query, options).await;
            if cli.json {
                print_json(&result)?;
            } else {
                print_summaries(&result);
            }
        }

        Commands::Documents { action } => match action.unwrap_or(DocumentAction::List) {
            DocumentAction::List => {
                let documents = cmd_list_documents(&app).await?;
                if cli.json {
                    print_json(&documents)?;
                } else {
                    print_documents(&documents);
                }
            }
            DocumentAction::Show { document_id } => {
                let detail = cmd_show_document(&app, &document_id).await?;
                if cli.json {
                    print_json(&detail)?;
                } else {
                    print_document_detail(&detail);
                }
            }
            DocumentAction::Delete { document_id } => {
                let stats = cmd_delete_document(&app, &document_id).await?;
                if cli.json {
                    print_json(&stats)?;
                } else {
                    println!(
                        "✓ Document '{}' removed ({} vectors)",
                        stats.document_id, stats.vectors_removed
                    );
                }
            }
        },

        Commands::Status => {
            let status = cmd_status(&app).await?;
            if cli.json {
                print_json(&status)?;
            } else {
                print_status(&status);
            }
        }
    }

    Ok(())
}

/// Resolve where `init` writes: a `.toml` path is the config file itself,
/// any other path is the base directory
fn init_options(config: Option<&Path>, force: bool) -> InitOptions {
    match config {
        Some(path) if path.extension().is_some_and(|e| e == "toml") => InitOptions {
            base_dir: path
                .parent()
                .map(PathBuf::from)
                .unwrap_or_else(Config::default_base_dir),
            config_path: path.to_path_buf(),
            force,
        },
        Some(path) => InitOptions::new(path.to_path_buf(), force),
        None => InitOptions::new(Config::default_base_dir(), force),
    }
}
