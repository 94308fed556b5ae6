//! Search command - nearest assets of a project

use anyhow::{Context, Result};
use clap::Args;

use super::{create_registry, VectorInput};
use crate::GlobalOptions;

/// Arguments for the search command
#[derive(Args, Debug)]
pub struct SearchArgs {
    /// Project to search
    #[arg(long, short = 'p')]
    project: String,

    #[command(flatten)]
    input: VectorInput,

    /// Maximum number of results to return
    #[arg(long, short = 'n', default_value = "5")]
    top: usize,

    /// Output as a JSON array
    #[arg(long)]
    json: bool,
}

/// Execute the search command
pub async fn execute(args: SearchArgs, global: GlobalOptions) -> Result<()> {
    let registry = create_registry(&global)?;
    let query = args.input.resolve(&registry).await?;

    let hits = registry
        .search(&args.project, &query, args.top)
        .await
        .context("Search failed")?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&hits)?);
        return Ok(());
    }

    if hits.is_empty() {
        if !global.quiet {
            eprintln!("No results in project '{}'", args.project);
        }
        return Ok(());
    }

    for asset in &hits {
        println!("{}", asset);
    }
    Ok(())
}
