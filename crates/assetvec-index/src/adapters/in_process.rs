//! In-memory linear-scan index.
//!
//! Nothing is persisted. Useful for tests and single-process deployments
//! with small projects.

use std::collections::HashMap;

use assetvec_config::IndexKind;
use async_trait::async_trait;
use tokio::sync::RwLock;
use tracing::debug;

use crate::error::{check_dimension, require_ids, require_project, Result};
use crate::traits::VectorIndex;

type Entries = Vec<(String, Vec<f32>)>;

/// Linear-scan index keyed by raw project ID.
#[derive(Debug, Default)]
pub struct InProcessIndex {
    /// Enforced width, if any
    dimension: Option<usize>,
    projects: RwLock<HashMap<String, Entries>>,
}

impl InProcessIndex {
    /// Index enforcing `dimension` on writes and non-empty queries.
    pub fn new(dimension: usize) -> Self {
        Self {
            dimension: Some(dimension),
            projects: RwLock::new(HashMap::new()),
        }
    }

    /// Index accepting vectors of any width.
    ///
    /// Searches then only compare against vectors of the query's width.
    pub fn unchecked() -> Self {
        Self::default()
    }

    /// Number of vectors stored for `project_id`.
    pub async fn len(&self, project_id: &str) -> usize {
        self.projects
            .read()
            .await
            .get(project_id)
            .map_or(0, Vec::len)
    }

    /// Whether `project_id` has an entry at all.
    pub async fn has_project(&self, project_id: &str) -> bool {
        self.projects.read().await.contains_key(project_id)
    }
}

fn euclidean(a: &[f32], b: &[f32]) -> f32 {
    a.iter()
        .zip(b)
        .map(|(x, y)| (x - y) * (x - y))
        .sum::<f32>()
        .sqrt()
}

#[async_trait]
impl VectorIndex for InProcessIndex {
    async fn add_or_update(&self, project_id: &str, asset_id: &str, vector: &[f32]) -> Result<()> {
        require_ids(project_id, asset_id)?;
        if let Some(expected) = self.dimension {
            check_dimension(expected, vector)?;
        }

        let mut projects = self.projects.write().await;
        let entries = projects.entry(project_id.to_string()).or_default();

        match entries.iter_mut().find(|(id, _)| id == asset_id) {
            Some((_, stored)) => *stored = vector.to_vec(),
            None => entries.push((asset_id.to_string(), vector.to_vec())),
        }

        debug!(
            "Stored asset '{}' in project '{}' ({} entries)",
            asset_id,
            project_id,
            entries.len()
        );
        Ok(())
    }

    async fn search(&self, project_id: &str, query: &[f32], top_n: usize) -> Result<Vec<String>> {
        require_project(project_id)?;
        if query.is_empty() || top_n == 0 {
            return Ok(Vec::new());
        }
        if let Some(expected) = self.dimension {
            check_dimension(expected, query)?;
        }

        let projects = self.projects.read().await;
        let Some(entries) = projects.get(project_id) else {
            return Ok(Vec::new());
        };

        let mut scored: Vec<(f32, &str)> = entries
            .iter()
            .filter(|(_, v)| v.len() == query.len())
            .map(|(id, v)| (euclidean(query, v), id.as_str()))
            .collect();

        // Stable: equal distances keep insertion order
        scored.sort_by(|a, b| a.0.total_cmp(&b.0));

        Ok(scored
            .into_iter()
            .take(top_n)
            .map(|(_, id)| id.to_string())
            .collect())
    }

    async fn remove(&self, project_id: &str, asset_id: &str) -> Result<()> {
        require_ids(project_id, asset_id)?;

        let mut projects = self.projects.write().await;
        if let Some(entries) = projects.get_mut(project_id) {
            entries.retain(|(id, _)| id != asset_id);
            if entries.is_empty() {
                projects.remove(project_id);
                debug!("Dropped empty project '{}'", project_id);
            }
        }
        Ok(())
    }

    fn kind(&self) -> IndexKind {
        IndexKind::InProcess
    }
}
