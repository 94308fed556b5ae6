//! Index error types.

use std::path::PathBuf;

use assetvec_config::{ConfigError, IndexKind};
use thiserror::Error;

/// Backend operation an error occurred in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    AddOrUpdate,
    Search,
    Remove,
    Connect,
    Load,
    Persist,
}

impl std::fmt::Display for Operation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::AddOrUpdate => "add_or_update",
            Self::Search => "search",
            Self::Remove => "remove",
            Self::Connect => "connect",
            Self::Load => "load",
            Self::Persist => "persist",
        })
    }
}

/// Errors that can occur during index operations.
///
/// Absent assets and absent namespaces are not errors: search returns an
/// empty list and remove is a no-op.
#[derive(Error, Debug)]
pub enum IndexError {
    /// Configuration rejected at construction
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Vector width differs from the configured dimension
    #[error("dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    /// Empty project or asset ID
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// Storage backend failure
    #[error("{kind} backend failed during {operation}: {message}")]
    Backend {
        kind: IndexKind,
        operation: Operation,
        message: String,
    },

    /// Local file I/O failure
    #[error("I/O error at '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Mapping file (de)serialization failure
    #[error("serialization error at '{path}': {source}")]
    Serialization {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    /// Embedding failure surfaced through the registry
    #[error("embedding failed: {0}")]
    Embed(#[from] assetvec_embed::EmbedError),
}

impl IndexError {
    /// Create a Backend error.
    pub fn backend(kind: IndexKind, operation: Operation, message: impl ToString) -> Self {
        Self::Backend {
            kind,
            operation,
            message: message.to_string(),
        }
    }

    /// Create an Io error.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Create a Serialization error.
    pub fn serialization(path: impl Into<PathBuf>, source: serde_json::Error) -> Self {
        Self::Serialization {
            path: path.into(),
            source,
        }
    }
}

/// Result type for index operations
pub type Result<T> = std::result::Result<T, IndexError>;

/// Reject empty project or asset identifiers.
pub(crate) fn require_ids(project_id: &str, asset_id: &str) -> Result<()> {
    require_project(project_id)?;
    if asset_id.is_empty() {
        return Err(IndexError::InvalidArgument(
            "asset_id must not be empty".into(),
        ));
    }
    Ok(())
}

/// Reject an empty project identifier.
pub(crate) fn require_project(project_id: &str) -> Result<()> {
    if project_id.is_empty() {
        return Err(IndexError::InvalidArgument(
            "project_id must not be empty".into(),
        ));
    }
    Ok(())
}

/// Check a vector against the configured width.
pub(crate) fn check_dimension(expected: usize, vector: &[f32]) -> Result<()> {
    if vector.len() != expected {
        return Err(IndexError::DimensionMismatch {
            expected,
            actual: vector.len(),
        });
    }
    Ok(())
}
