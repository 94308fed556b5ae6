//! Remove command - delete an asset vector

use anyhow::{Context, Result};
use clap::Args;

use super::{create_registry, print_info};
use crate::GlobalOptions;

/// Arguments for the remove command
#[derive(Args, Debug)]
pub struct RemoveArgs {
    /// Project the asset belongs to
    #[arg(long, short = 'p')]
    project: String,

    /// Asset ID
    #[arg(long, short = 'a')]
    asset: String,
}

/// Execute the remove command
pub async fn execute(args: RemoveArgs, global: GlobalOptions) -> Result<()> {
    let registry = create_registry(&global)?;

    registry
        .remove(&args.project, &args.asset)
        .await
        .with_context(|| format!("Failed to remove asset '{}'", args.asset))?;

    print_info(
        &format!("Removed asset '{}' from project '{}'", args.asset, args.project),
        global.quiet,
    );
    Ok(())
}
