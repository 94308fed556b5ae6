//! Add command - store or replace an asset vector

use anyhow::{Context, Result};
use clap::Args;

use super::{create_registry, print_info, VectorInput};
use crate::GlobalOptions;

/// Arguments for the add command
#[derive(Args, Debug)]
pub struct AddArgs {
    /// Project the asset belongs to
    #[arg(long, short = 'p')]
    project: String,

    /// Asset ID
    #[arg(long, short = 'a')]
    asset: String,

    #[command(flatten)]
    input: VectorInput,
}

/// Execute the add command
pub async fn execute(args: AddArgs, global: GlobalOptions) -> Result<()> {
    let registry = create_registry(&global)?;
    let vector = args.input.resolve(&registry).await?;

    registry
        .add_or_update(&args.project, &args.asset, &vector)
        .await
        .with_context(|| format!("Failed to store asset '{}'", args.asset))?;

    print_info(
        &format!(
            "Stored asset '{}' in project '{}' ({} index, {} dimensions)",
            args.asset,
            args.project,
            registry.kind(),
            vector.len()
        ),
        global.quiet,
    );
    Ok(())
}
