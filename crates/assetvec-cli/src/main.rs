//! assetvec CLI - operator tool for the per-project vector index
//!
//! A thin layer over [`assetvec_index::IndexRegistry`]: store, query and
//! remove asset vectors, embed text, and inspect configuration.
//!
//! # Usage
//!
//! ```bash
//! # Store an asset from text (hashing embedder, flat backend)
//! assetvec --index-kind flat add --project campaign-7 --asset banner-1 --text "summer sale banner"
//!
//! # Nearest assets to a query
//! assetvec --index-kind flat search --project campaign-7 --text "summer banner" --top 3
//!
//! # Where each backend would keep a project
//! assetvec namespace --project "Campaign 7"
//! ```

use std::path::PathBuf;

use anyhow::Result;
use assetvec_config::{ConfigError, ConfigOverrides, EmbeddingProviderType, IndexKind, LogFormat};
use clap::{Args, Parser, Subcommand};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

mod commands;

/// assetvec - per-project vector similarity index
#[derive(Parser, Debug)]
#[command(name = "assetvec")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    #[command(flatten)]
    global: GlobalOptions,
}

/// Global options available to all commands
#[derive(Args, Debug, Clone)]
pub struct GlobalOptions {
    /// Directory holding the local `.assetvec/config.toml` (default: current directory)
    #[arg(long, short = 'w', global = true, env = "ASSETVEC_WORKSPACE")]
    workspace: Option<PathBuf>,

    /// Path to an additional configuration file
    #[arg(long, short = 'c', global = true, env = "ASSETVEC_CONFIG")]
    config: Option<PathBuf>,

    /// Enable verbose output
    #[arg(long, short = 'v', global = true)]
    verbose: bool,

    /// Suppress non-essential output
    #[arg(long, short = 'q', global = true)]
    quiet: bool,

    /// Index backend (in-process, qdrant, weaviate, sqlite-vec, pgvector, flat)
    #[arg(long, global = true, env = "ASSETVEC_INDEX_KIND", value_parser = parse_index_kind)]
    index_kind: Option<IndexKind>,

    /// Vector dimension
    #[arg(long, global = true, env = "ASSETVEC_DIMENSION")]
    dimension: Option<usize>,

    /// Flat index directory
    #[arg(long, global = true, env = "ASSETVEC_FLAT_DIR")]
    flat_dir: Option<PathBuf>,

    /// sqlite-vec database file
    #[arg(long, global = true, env = "ASSETVEC_SQLITE_PATH")]
    sqlite_path: Option<PathBuf>,

    /// Qdrant server URL
    #[arg(long, global = true, env = "ASSETVEC_QDRANT_URL")]
    qdrant_url: Option<String>,

    /// Weaviate server URL
    #[arg(long, global = true, env = "ASSETVEC_WEAVIATE_URL")]
    weaviate_url: Option<String>,

    /// PostgreSQL connection string
    #[arg(long, global = true, env = "ASSETVEC_POSTGRES_URL", hide_env_values = true)]
    postgres_url: Option<String>,

    /// Embedding provider type (hashing, openai)
    #[arg(long, global = true, env = "ASSETVEC_EMBEDDING_PROVIDER", value_parser = parse_embedding_provider)]
    embedding_provider: Option<EmbeddingProviderType>,
}

/// Parse index kind from string
fn parse_index_kind(s: &str) -> Result<IndexKind, String> {
    s.parse().map_err(|e: ConfigError| e.to_string())
}

/// Parse embedding provider from string
fn parse_embedding_provider(s: &str) -> Result<EmbeddingProviderType, String> {
    s.parse().map_err(|e: ConfigError| e.to_string())
}

impl GlobalOptions {
    /// Convert global options to config overrides
    pub fn to_config_overrides(&self) -> ConfigOverrides {
        ConfigOverrides {
            index_kind: self.index_kind,
            dimension: self.dimension,
            flat_dir: self.flat_dir.clone(),
            sqlite_path: self.sqlite_path.clone(),
            qdrant_url: self.qdrant_url.clone(),
            weaviate_url: self.weaviate_url.clone(),
            postgres_url: self.postgres_url.clone(),
            embedding_provider: self.embedding_provider,
            log_level: None,
        }
    }
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Store or replace an asset vector
    Add(commands::add::AddArgs),

    /// Find the nearest assets of a project
    Search(commands::search::SearchArgs),

    /// Delete an asset vector
    Remove(commands::remove::RemoveArgs),

    /// Embed text and print the vector and tags
    Embed(commands::embed::EmbedArgs),

    /// View and manage configuration
    #[command(subcommand)]
    Config(commands::config::ConfigCommand),

    /// Show the namespace each backend derives for a project
    Namespace(commands::namespace::NamespaceArgs),
}

/// Install the stderr subscriber.
///
/// `--verbose`/`--quiet` win; otherwise `RUST_LOG`, then `logging.level`.
fn init_tracing(global: &GlobalOptions) -> Result<()> {
    let logging = commands::load_config(global)
        .map(|config| config.logging)
        .unwrap_or_default();

    let filter = if global.quiet {
        EnvFilter::new("error")
    } else if global.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&logging.level))
    };

    let builder = FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);

    match logging.format {
        LogFormat::Json => tracing::subscriber::set_global_default(builder.json().finish())?,
        LogFormat::Text => {
            let ansi = std::io::IsTerminal::is_terminal(&std::io::stderr());
            tracing::subscriber::set_global_default(builder.with_ansi(ansi).finish())?
        }
    }

    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    init_tracing(&cli.global)?;

    // Execute the command
    match cli.command {
        Commands::Add(args) => commands::add::execute(args, cli.global).await,
        Commands::Search(args) => commands::search::execute(args, cli.global).await,
        Commands::Remove(args) => commands::remove::execute(args, cli.global).await,
        Commands::Embed(args) => commands::embed::execute(args, cli.global).await,
        Commands::Config(cmd) => commands::config::execute(cmd, cli.global).await,
        Commands::Namespace(args) => commands::namespace::execute(args, cli.global).await,
    }
}
