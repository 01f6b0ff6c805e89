//! Init command implementation

use crate::config::Config;
use crate::error::{Error, Result};
use crate::meta::MetaDb;
use std::path::PathBuf;
use tracing::info;

#[derive(Debug, Clone)]
pub struct InitOptions {
    pub base_dir: PathBuf,
    pub config_path: PathBuf,
    pub force: bool,
}

impl InitOptions {
    /// Options for a workspace whose config lives at `<base_dir>/config.toml`
    pub fn new(base_dir: PathBuf, force: bool) -> Self {
        Self {
            config_path: base_dir.join("config.toml"),
            base_dir,
            force,
        }
    }
}

/// Write a default configuration and create the metadata database
pub async fn cmd_init(options: InitOptions) -> Result<Config> {
    let InitOptions {
        base_dir,
        config_path,
        force,
    } = options;

    if config_path.exists() && !force {
        return Err(Error::Config(format!(
            "Config already exists at {}. Use --force to overwrite.",
            config_path.display()
        )));
    }

    let mut config = Config::default();
    config.init_paths(Some(base_dir));
    config.paths.config_file = config_path;
    config.validate()?;
    config.save()?;

    let db = MetaDb::connect(&config).await?;
    db.init_schema().await?;
    info!("Created database at {:?}", config.paths.db_file);

    Ok(config)
}

pub fn print_init(config: &Config) {
    println!("✓ paperpilot initialized successfully");
    println!("  Config: {}", config.paths.config_file.display());
    println!("  Database: {}", config.paths.db_file.display());
    println!("\nNext steps:");
    println!("  1. Point [embedding] and [generation] at your model backends");
    println!("  2. Ingest a paper: paperpilot ingest paper.md --meta paper_meta.json");
    println!("  3. Ask a question: paperpilot generate \"What is the main result?\"");
}
