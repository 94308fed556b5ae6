//! Embed command - run text through the configured provider

use anyhow::{Context, Result};
use assetvec_embed::ProviderStatus;
use clap::Args;

use super::create_registry;
use crate::GlobalOptions;

/// Components shown in text output before eliding
const PREVIEW_LEN: usize = 8;

/// Arguments for the embed command
#[derive(Args, Debug)]
pub struct EmbedArgs {
    /// Text to embed
    #[arg(long, short = 't', required_unless_present = "status")]
    text: Option<String>,

    /// Check that the embedding provider is reachable instead of embedding
    #[arg(long, conflicts_with = "text")]
    status: bool,

    /// Output as JSON
    #[arg(long)]
    json: bool,
}

/// Execute the embed command
pub async fn execute(args: EmbedArgs, global: GlobalOptions) -> Result<()> {
    let registry = create_registry(&global)?;
    let embedder = registry
        .embedder()
        .await
        .context("Failed to create embedding provider")?;

    let Some(text) = args.text else {
        let status = embedder
            .status()
            .await
            .context("Failed to check embedding provider")?;
        return print_status(&status, args.json);
    };

    let embedding = embedder.embed(&text).await.context("Failed to embed text")?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&embedding)?);
        return Ok(());
    }

    let preview: Vec<String> = embedding
        .vector
        .iter()
        .take(PREVIEW_LEN)
        .map(|x| format!("{:.4}", x))
        .collect();
    let ellipsis = if embedding.vector.len() > PREVIEW_LEN {
        ", ..."
    } else {
        ""
    };

    println!("Provider:  {}", registry.config().embedding.provider);
    println!("Dimension: {}", embedding.vector.len());
    println!("Tags:      {}", embedding.tags.join(", "));
    println!("Vector:    [{}{}]", preview.join(", "), ellipsis);
    Ok(())
}

/// Print provider health; an unavailable provider fails the command.
fn print_status(status: &ProviderStatus, json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(status)?);
    } else {
        println!("Provider:  {}", status.provider_type);
        println!("Device:    {}", status.device);
        if let Some(latency) = status.latency_ms {
            println!("Latency:   {} ms", latency);
        }
        match status.error {
            Some(ref error) => println!("Status:    unavailable ({})", error),
            None => println!("Status:    available"),
        }
    }

    if !status.available {
        anyhow::bail!("Embedding provider {} is unavailable", status.provider_type);
    }
    Ok(())
}
