//! Label-indexed flat index (usearch, exact search).
//!
//! Each project owns `<dir>/<namespace>.usearch` plus
//! `<dir>/<namespace>.mapping.json`. State is loaded on first access and kept
//! for the life of the adapter. Updates retire the old label and add the
//! vector under a fresh one; labels are never reused and storage is never
//! compacted.
//!
//! Writes persist the index file first and the mapping second. A failed
//! persist drops the cached state, and loading skips labels the index holds
//! but the mapping never recorded. Nothing guards against another process
//! touching the same files.

pub mod mapping;

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use assetvec_config::{FlatSettings, IndexKind};
use async_trait::async_trait;
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, info, warn};
use usearch::{Index, IndexOptions, MetricKind, ScalarKind};

use crate::error::{check_dimension, require_ids, IndexError, Operation, Result};
use crate::namespace::{NamespaceResolver, FLAT_FILE};
use crate::traits::{should_search, VectorIndex};

pub use mapping::{Label, LabelMapping};

/// Capacity reserved for a fresh index
const INITIAL_CAPACITY: usize = 64;

fn backend_err(operation: Operation, message: impl ToString) -> IndexError {
    IndexError::backend(IndexKind::Flat, operation, message)
}

/// Exact-search index; `dimensions: 0` lets `load` take the width from disk.
fn new_index(dimensions: usize, operation: Operation) -> Result<Index> {
    let options = IndexOptions {
        dimensions,
        metric: MetricKind::L2sq,
        quantization: ScalarKind::F32,
        connectivity: 0,
        expansion_add: 0,
        expansion_search: 0,
        multi: false,
    };
    Index::new(&options).map_err(|e| backend_err(operation, e))
}

fn path_str(path: &Path, operation: Operation) -> Result<&str> {
    path.to_str()
        .ok_or_else(|| backend_err(operation, format!("non UTF-8 path {:?}", path)))
}

/// Loaded state of one project.
struct ProjectState {
    index: Index,
    mapping: LabelMapping,
    index_path: PathBuf,
    mapping_path: PathBuf,
}

impl ProjectState {
    fn load(directory: &Path, namespace: &str, dimension: usize) -> Result<Self> {
        let index_path = directory.join(format!("{}.usearch", namespace));
        let mapping_path = directory.join(format!("{}.mapping.json", namespace));

        let mut mapping = LabelMapping::load(&mapping_path)?.unwrap_or_default();

        let index = if index_path.exists() {
            let loaded = new_index(0, Operation::Load)?;
            loaded
                .load(path_str(&index_path, Operation::Load)?)
                .map_err(|e| backend_err(Operation::Load, e))?;

            if loaded.dimensions() == dimension {
                info!(
                    "Loaded flat index '{}' ({} vectors, {} mapped)",
                    namespace,
                    loaded.size(),
                    mapping.len()
                );
                loaded
            } else {
                warn!(
                    "Flat index '{}' has dimension {}, expected {}; starting empty",
                    namespace,
                    loaded.dimensions(),
                    dimension
                );
                mapping.clear_entries();
                new_index(dimension, Operation::Load)?
            }
        } else {
            debug!("No index file for '{}', starting empty", namespace);
            new_index(dimension, Operation::Load)?
        };

        if index.capacity() == 0 {
            index
                .reserve(INITIAL_CAPACITY)
                .map_err(|e| backend_err(Operation::Load, e))?;
        }

        let mut state = Self {
            index,
            mapping,
            index_path,
            mapping_path,
        };
        // The index is written before the mapping, so a crash in between
        // leaves labels on disk that the mapping never handed out.
        state.claim_label();
        Ok(state)
    }

    /// Next free label. Labels the index already holds are unmapped leftovers
    /// of an interrupted write; they are retired and skipped.
    fn claim_label(&mut self) -> Label {
        while self.index.contains(self.mapping.peek_label()) {
            let orphan = self.mapping.skip_label();
            warn!(
                "Label {} in {:?} is not in the mapping, retiring it",
                orphan, self.index_path
            );
            self.retire(orphan);
        }
        self.mapping.peek_label()
    }

    /// Remove `label` from the index, tolerating failure.
    fn retire(&self, label: Label) {
        match self.index.remove(label) {
            Ok(0) => debug!("Label {} was not present in the index", label),
            Ok(_) => {}
            Err(e) => debug!("Removing label {} failed: {}", label, e),
        }
    }

    /// Add the vector under a fresh label, then retire the asset's old one.
    /// A failed add leaves the previous vector and mapping untouched.
    fn upsert(&mut self, asset_id: &str, vector: &[f32]) -> Result<Label> {
        // usearch reads `dimensions` floats without checking the slice
        check_dimension(self.index.dimensions(), vector)?;

        let needed = self.index.size() + 1;
        if needed > self.index.capacity() {
            let grown = (self.index.capacity() * 2).max(needed).max(INITIAL_CAPACITY);
            self.index
                .reserve(grown)
                .map_err(|e| backend_err(Operation::AddOrUpdate, e))?;
        }

        let label = self.claim_label();
        self.index
            .add(label, vector)
            .map_err(|e| backend_err(Operation::AddOrUpdate, e))?;

        if let Some(old) = self.mapping.release(asset_id) {
            self.retire(old);
        }
        self.mapping.assign(asset_id);
        Ok(label)
    }

    fn persist(&self) -> Result<()> {
        if let Some(parent) = self.index_path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| IndexError::io(parent, e))?;
        }

        self.index
            .save(path_str(&self.index_path, Operation::Persist)?)
            .map_err(|e| backend_err(Operation::Persist, e))?;
        self.mapping.save(&self.mapping_path)
    }

    fn search(&self, query: &[f32], top_n: usize) -> Result<Vec<String>> {
        let k = top_n.min(self.index.size());
        if k == 0 {
            return Ok(Vec::new());
        }

        let matches = self
            .index
            .exact_search(query, k)
            .map_err(|e| backend_err(Operation::Search, e))?;

        Ok(matches
            .keys
            .iter()
            .filter_map(|&label| match self.mapping.asset_for(label) {
                Some(asset) => Some(asset.to_string()),
                None => {
                    warn!(
                        "Label {} in {:?} has no mapped asset, skipping",
                        label, self.index_path
                    );
                    None
                }
            })
            .collect())
    }
}

/// usearch-backed index with a label mapping per project
pub struct FlatIndex {
    directory: PathBuf,
    dimension: usize,
    resolver: NamespaceResolver,
    projects: RwLock<HashMap<String, Arc<Mutex<ProjectState>>>>,
}

impl FlatIndex {
    pub fn new(settings: &FlatSettings, dimension: usize) -> Self {
        info!(
            "Using flat index directory {:?} (dim={})",
            settings.directory, dimension
        );
        Self {
            directory: settings.directory.clone(),
            dimension,
            resolver: NamespaceResolver::new(&settings.file_prefix, FLAT_FILE),
            projects: RwLock::new(HashMap::new()),
        }
    }

    pub fn directory(&self) -> &Path {
        &self.directory
    }

    /// State for `namespace`, loading it on first access.
    async fn project(&self, namespace: &str) -> Result<Arc<Mutex<ProjectState>>> {
        if let Some(state) = self.projects.read().await.get(namespace) {
            return Ok(Arc::clone(state));
        }

        let mut projects = self.projects.write().await;
        if let Some(state) = projects.get(namespace) {
            return Ok(Arc::clone(state));
        }

        let state = Arc::new(Mutex::new(ProjectState::load(
            &self.directory,
            namespace,
            self.dimension,
        )?));
        projects.insert(namespace.to_string(), Arc::clone(&state));
        Ok(state)
    }

    /// Drop the cached state so the next access reloads it from disk.
    async fn evict(&self, namespace: &str) {
        if self.projects.write().await.remove(namespace).is_some() {
            warn!("Dropped cached state of '{}' after a failed write", namespace);
        }
    }

    /// Copy of the label mapping for `project_id`.
    pub async fn mapping(&self, project_id: &str) -> Result<LabelMapping> {
        let namespace = self.resolver.resolve(project_id);
        let state = self.project(&namespace).await?;
        let state = state.lock().await;
        Ok(state.mapping.clone())
    }

    /// Number of vectors physically held for `project_id`, retired labels excluded.
    pub async fn stored(&self, project_id: &str) -> Result<usize> {
        let namespace = self.resolver.resolve(project_id);
        let state = self.project(&namespace).await?;
        let state = state.lock().await;
        Ok(state.index.size())
    }
}

#[async_trait]
impl VectorIndex for FlatIndex {
    async fn add_or_update(&self, project_id: &str, asset_id: &str, vector: &[f32]) -> Result<()> {
        require_ids(project_id, asset_id)?;
        check_dimension(self.dimension, vector)?;

        let namespace = self.resolver.resolve(project_id);
        let project = self.project(&namespace).await?;
        let mut state = project.lock().await;

        let label = state.upsert(asset_id, vector)?;
        if let Err(e) = state.persist() {
            drop(state);
            self.evict(&namespace).await;
            return Err(e);
        }

        debug!(
            "Stored asset '{}' in '{}' under label {}",
            asset_id, namespace, label
        );
        Ok(())
    }

    async fn search(&self, project_id: &str, query: &[f32], top_n: usize) -> Result<Vec<String>> {
        if !should_search(self.dimension, project_id, query, top_n)? {
            return Ok(Vec::new());
        }

        let namespace = self.resolver.resolve(project_id);
        let state = self.project(&namespace).await?;
        let state = state.lock().await;
        state.search(query, top_n)
    }

    async fn remove(&self, project_id: &str, asset_id: &str) -> Result<()> {
        require_ids(project_id, asset_id)?;

        let namespace = self.resolver.resolve(project_id);
        let project = self.project(&namespace).await?;
        let mut state = project.lock().await;

        let Some(label) = state.mapping.release(asset_id) else {
            return Ok(());
        };
        state.retire(label);
        if let Err(e) = state.persist() {
            drop(state);
            self.evict(&namespace).await;
            return Err(e);
        }

        debug!("Removed asset '{}' (label {}) from '{}'", asset_id, label, namespace);
        Ok(())
    }

    fn kind(&self) -> IndexKind {
        IndexKind::Flat
    }
}

impl std::fmt::Debug for FlatIndex {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FlatIndex")
            .field("directory", &self.directory)
            .field("dimension", &self.dimension)
            .finish()
    }
}
