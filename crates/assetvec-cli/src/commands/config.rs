//! Config command - View and manage configuration
//!
//! - Show the effective configuration
//! - Get a single value by dotted key
//! - Show configuration file paths
//! - Write a default configuration file

use std::path::PathBuf;

use anyhow::{Context, Result};
use assetvec_config::{AssetvecConfig, ConfigLoader};
use clap::Subcommand;
use serde::Serialize;

use super::{load_config, print_info, resolve_workspace};
use crate::GlobalOptions;

/// Config management commands
#[derive(Subcommand, Debug)]
pub enum ConfigCommand {
    /// Show the effective configuration (defaults, files and overrides merged)
    Show(ShowArgs),

    /// Get a specific configuration value
    Get(GetArgs),

    /// Show configuration file paths
    Path(PathArgs),

    /// Write a default configuration file if none exists
    Init(InitArgs),
}

/// Arguments for the show command
#[derive(clap::Args, Debug)]
pub struct ShowArgs {
    /// Output as JSON instead of TOML
    #[arg(long)]
    json: bool,
}

/// Arguments for the get command
#[derive(clap::Args, Debug)]
pub struct GetArgs {
    /// Configuration key (e.g., "index.flat.directory")
    key: String,

    /// Output as JSON
    #[arg(long)]
    json: bool,
}

/// Arguments for the path command
#[derive(clap::Args, Debug)]
pub struct PathArgs {
    /// Output as JSON
    #[arg(long)]
    json: bool,
}

/// Arguments for the init command
#[derive(clap::Args, Debug)]
pub struct InitArgs {
    /// Create ~/.assetvec/config.toml instead of the local file
    #[arg(long)]
    global: bool,
}

/// Configuration paths
#[derive(Debug, Clone, Serialize)]
pub struct ConfigPaths {
    /// Global config file path
    pub global: Option<PathBuf>,
    /// Local config file path
    pub local: PathBuf,
    /// Whether global config exists
    pub global_exists: bool,
    /// Whether local config exists
    pub local_exists: bool,
}

/// Execute the config command
pub async fn execute(cmd: ConfigCommand, global: GlobalOptions) -> Result<()> {
    match cmd {
        ConfigCommand::Show(args) => execute_show(args, global),
        ConfigCommand::Get(args) => execute_get(args, global),
        ConfigCommand::Path(args) => execute_path(args, global),
        ConfigCommand::Init(args) => execute_init(args, global),
    }
}

fn execute_show(args: ShowArgs, global: GlobalOptions) -> Result<()> {
    let config = load_config(&global)?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&config)?);
    } else {
        let toml = toml::to_string_pretty(&config).context("Failed to render configuration")?;
        print!("{}", toml);
    }
    Ok(())
}

fn execute_get(args: GetArgs, global: GlobalOptions) -> Result<()> {
    let config = load_config(&global)?;

    let value = get_config_value(&config, &args.key)
        .ok_or_else(|| anyhow::anyhow!("Unknown configuration key: {}", args.key))?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&value)?);
    } else {
        match value {
            serde_json::Value::String(s) => println!("{}", s),
            serde_json::Value::Null => println!("null"),
            other => println!("{}", other),
        }
    }
    Ok(())
}

fn execute_path(args: PathArgs, global: GlobalOptions) -> Result<()> {
    let workspace = resolve_workspace(&global)?;
    let loader = ConfigLoader::new();

    let global_path = loader.global_config_path();
    let local_path = loader.local_config_path(&workspace);

    let paths = ConfigPaths {
        global_exists: global_path.as_ref().is_some_and(|p| p.exists()),
        global: global_path,
        local_exists: local_path.exists(),
        local: local_path,
    };

    if args.json {
        println!("{}", serde_json::to_string_pretty(&paths)?);
        return Ok(());
    }

    let status = |exists: bool| if exists { "exists" } else { "not found" };
    match paths.global {
        Some(ref gp) => println!("Global: {} ({})", gp.display(), status(paths.global_exists)),
        None => println!("Global: not available (no home directory)"),
    }
    println!("Local:  {} ({})", paths.local.display(), status(paths.local_exists));
    Ok(())
}

fn execute_init(args: InitArgs, global: GlobalOptions) -> Result<()> {
    let loader = ConfigLoader::new();

    let path = if args.global {
        loader
            .init_global()
            .context("Failed to initialize global config")?
    } else {
        let workspace = resolve_workspace(&global)?;
        loader
            .init_local(&workspace)
            .context("Failed to initialize local config")?
    };

    print_info(&format!("Configuration at {}", path.display()), global.quiet);
    println!("{}", path.display());
    Ok(())
}

/// Get a configuration value by dotted key path
fn get_config_value(config: &AssetvecConfig, key: &str) -> Option<serde_json::Value> {
    let json = serde_json::to_value(config).ok()?;
    key.split('.')
        .try_fold(&json, |current, part| current.get(part))
        .cloned()
}
