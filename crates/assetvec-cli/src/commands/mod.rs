//! CLI command implementations

pub mod add;
pub mod config;
pub mod embed;
pub mod namespace;
pub mod remove;
pub mod search;

use std::path::PathBuf;

use anyhow::{Context, Result};
use assetvec_config::{AssetvecConfig, ConfigLoader};
use assetvec_index::IndexRegistry;
use clap::Args;

use crate::GlobalOptions;

/// Resolve the directory holding the local config.
pub fn resolve_workspace(global: &GlobalOptions) -> Result<PathBuf> {
    match global.workspace {
        Some(ref ws) => Ok(ws.clone()),
        None => std::env::current_dir().context("Failed to get current directory"),
    }
}

/// Load configuration: defaults, global, local, `--config` file, CLI overrides.
pub fn load_config(global: &GlobalOptions) -> Result<AssetvecConfig> {
    let workspace = resolve_workspace(global)?;
    let overrides = global.to_config_overrides();

    ConfigLoader::new()
        .load_with_file(&workspace, global.config.as_deref(), Some(&overrides))
        .context("Failed to load configuration")
}

/// Create a registry for the effective configuration.
pub fn create_registry(global: &GlobalOptions) -> Result<IndexRegistry> {
    let config = load_config(global)?;
    IndexRegistry::new(config).context("Invalid configuration")
}

/// Either text to embed or a literal vector.
#[derive(Args, Debug)]
#[group(required = true, multiple = false)]
pub struct VectorInput {
    /// Text to embed with the configured provider
    #[arg(long)]
    text: Option<String>,

    /// Comma-separated vector components, e.g. `0.1,0.2,0.3`
    #[arg(long, value_delimiter = ',', allow_hyphen_values = true)]
    vector: Option<Vec<f32>>,
}

impl VectorInput {
    /// Vector for this input, embedding text through the registry.
    pub async fn resolve(self, registry: &IndexRegistry) -> Result<Vec<f32>> {
        match (self.text, self.vector) {
            (_, Some(vector)) => Ok(vector),
            (Some(text), None) => {
                let embedding = registry.embed(&text).await.context("Failed to embed text")?;
                Ok(embedding.vector)
            }
            (None, None) => anyhow::bail!("Either --text or --vector is required"),
        }
    }
}

/// Print an info message (respects quiet flag).
pub fn print_info(message: &str, quiet: bool) {
    if !quiet {
        eprintln!("{}", message);
    }
}
