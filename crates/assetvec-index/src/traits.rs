//! Index trait definition.
//!
//! Defines the async contract every storage backend implements.

use assetvec_config::IndexKind;
use async_trait::async_trait;

use crate::error::{check_dimension, require_project, Result};

/// Per-project nearest-neighbour index over asset vectors.
///
/// Implementations are shared across tasks behind an `Arc`, and each call is
/// atomic from the caller's point of view.
#[async_trait]
pub trait VectorIndex: Send + Sync {
    /// Store `vector` for `asset_id` in `project_id`, replacing any previous vector.
    ///
    /// Fails with `DimensionMismatch` before touching storage when the vector
    /// width differs from the configured dimension. May create the project's
    /// namespace.
    async fn add_or_update(&self, project_id: &str, asset_id: &str, vector: &[f32]) -> Result<()>;

    /// Return up to `top_n` asset IDs of `project_id`, nearest first.
    ///
    /// An unknown project, an empty query or `top_n == 0` yields an empty list.
    async fn search(&self, project_id: &str, query: &[f32], top_n: usize) -> Result<Vec<String>>;

    /// Delete `asset_id` from `project_id`. Absent assets are ignored.
    async fn remove(&self, project_id: &str, asset_id: &str) -> Result<()>;

    /// Which backend this is.
    fn kind(&self) -> IndexKind;
}

/// Shared argument handling for `search`.
///
/// Returns `Ok(false)` when the call is trivially empty and the backend must
/// not be contacted.
pub(crate) fn should_search(
    expected_dim: usize,
    project_id: &str,
    query: &[f32],
    top_n: usize,
) -> Result<bool> {
    require_project(project_id)?;
    if query.is_empty() || top_n == 0 {
        return Ok(false);
    }
    check_dimension(expected_dim, query)?;
    Ok(true)
}
