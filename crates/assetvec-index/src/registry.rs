//! Index registry.
//!
//! Owns one validated configuration and builds the selected adapter and the
//! embedder on first use. Both are cached for the life of the registry; the
//! configuration is never re-read.

use assetvec_config::{AssetvecConfig, IndexKind};
use assetvec_embed::{create_provider, Embedder, Embedding};
use tokio::sync::OnceCell;
use tracing::{debug, info};

use crate::adapters::ActiveIndex;
use crate::error::{IndexError, Result};
use crate::traits::VectorIndex;

/// Lazily constructed index plus embedding utility for one configuration.
pub struct IndexRegistry {
    config: AssetvecConfig,
    index: OnceCell<ActiveIndex>,
    embedder: OnceCell<Embedder>,
}

impl IndexRegistry {
    /// Create a registry, failing fast on invalid configuration.
    pub fn new(config: AssetvecConfig) -> Result<Self> {
        config.validate()?;
        debug!(
            "Index registry configured for {} (dim={})",
            config.index.kind, config.index.dimension
        );

        Ok(Self {
            config,
            index: OnceCell::new(),
            embedder: OnceCell::new(),
        })
    }

    pub fn config(&self) -> &AssetvecConfig {
        &self.config
    }

    /// Backend kind this registry serves.
    pub fn kind(&self) -> IndexKind {
        self.config.index.kind
    }

    pub fn dimension(&self) -> usize {
        self.config.index.dimension
    }

    /// The active adapter, built on first call.
    pub async fn index(&self) -> Result<&ActiveIndex> {
        self.index
            .get_or_try_init(|| async {
                let index = ActiveIndex::connect(&self.config.index).await?;
                info!("{} index ready", index.kind());
                Ok(index)
            })
            .await
    }

    /// The embedder, built on first call.
    pub async fn embedder(&self) -> Result<&Embedder> {
        self.embedder
            .get_or_try_init(|| async {
                let provider = create_provider(&self.config.embedding, self.dimension())?;
                Ok::<_, IndexError>(Embedder::new(provider, self.config.embedding.max_tags))
            })
            .await
    }

    pub async fn add_or_update(&self, project_id: &str, asset_id: &str, vector: &[f32]) -> Result<()> {
        self.index().await?.add_or_update(project_id, asset_id, vector).await
    }

    pub async fn search(&self, project_id: &str, query: &[f32], top_n: usize) -> Result<Vec<String>> {
        self.index().await?.search(project_id, query, top_n).await
    }

    pub async fn remove(&self, project_id: &str, asset_id: &str) -> Result<()> {
        self.index().await?.remove(project_id, asset_id).await
    }

    /// Embed `text` with the configured provider.
    pub async fn embed(&self, text: &str) -> Result<Embedding> {
        Ok(self.embedder().await?.embed(text).await?)
    }
}

impl std::fmt::Debug for IndexRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IndexRegistry")
            .field("kind", &self.config.index.kind)
            .field("dimension", &self.config.index.dimension)
            .field("index_ready", &self.index.initialized())
            .finish()
    }
}
