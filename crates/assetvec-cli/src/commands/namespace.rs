//! Namespace command - show where each backend keeps a project
//!
//! Distinct project IDs can sanitize to the same namespace; this prints the
//! derived names so operators can spot such collisions.

use anyhow::Result;
use assetvec_config::IndexKind;
use assetvec_index::NamespaceResolver;
use clap::Args;
use serde::Serialize;

use super::load_config;
use crate::GlobalOptions;

/// Arguments for the namespace command
#[derive(Args, Debug)]
pub struct NamespaceArgs {
    /// Project ID to resolve
    #[arg(long, short = 'p')]
    project: String,

    /// Output as JSON
    #[arg(long)]
    json: bool,
}

/// One backend's namespace for the project
#[derive(Debug, Serialize)]
struct ResolvedNamespace {
    kind: IndexKind,
    namespace: String,
    sanitized: bool,
}

/// Execute the namespace command
pub async fn execute(args: NamespaceArgs, global: GlobalOptions) -> Result<()> {
    let config = load_config(&global)?;

    let resolved: Vec<ResolvedNamespace> = IndexKind::ALL
        .into_iter()
        .map(|kind| match NamespaceResolver::for_kind(&config.index, kind) {
            Some(resolver) => ResolvedNamespace {
                kind,
                namespace: resolver.resolve(&args.project),
                sanitized: resolver.is_sanitized(&args.project),
            },
            // Keyed by the raw project ID
            None => ResolvedNamespace {
                kind,
                namespace: args.project.clone(),
                sanitized: false,
            },
        })
        .collect();

    if args.json {
        println!("{}", serde_json::to_string_pretty(&resolved)?);
        return Ok(());
    }

    for entry in &resolved {
        let marker = if entry.sanitized { "  (sanitized)" } else { "" };
        println!("{:<11} {}{}", entry.kind.as_str(), entry.namespace, marker);
    }
    Ok(())
}
