//! Backend adapters.
//!
//! One module per storage technology. [`ActiveIndex`] is the tagged union the
//! registry hands out; exactly one variant is built per registry.

pub mod flat;
pub mod in_process;
pub mod pgvector;
pub mod qdrant;
pub mod sqlite_vec;
pub mod weaviate;

use assetvec_config::{IndexConfig, IndexKind};
use async_trait::async_trait;
use tracing::info;

use crate::error::Result;
use crate::traits::VectorIndex;

pub use flat::FlatIndex;
pub use in_process::InProcessIndex;
pub use pgvector::PgvectorIndex;
pub use qdrant::QdrantIndex;
pub use sqlite_vec::SqliteVecIndex;
pub use weaviate::WeaviateIndex;

/// The adapter selected by configuration.
#[derive(Debug)]
pub enum ActiveIndex {
    InProcess(InProcessIndex),
    Qdrant(QdrantIndex),
    Weaviate(WeaviateIndex),
    SqliteVec(SqliteVecIndex),
    Pgvector(PgvectorIndex),
    Flat(FlatIndex),
}

impl ActiveIndex {
    /// Build the adapter for `config.kind`, connecting or opening as needed.
    ///
    /// `config` is expected to be validated already.
    pub async fn connect(config: &IndexConfig) -> Result<Self> {
        let dimension = config.dimension;
        info!("Initializing {} index (dim={})", config.kind, dimension);

        Ok(match config.kind {
            IndexKind::InProcess => Self::InProcess(InProcessIndex::new(dimension)),
            IndexKind::Qdrant => Self::Qdrant(QdrantIndex::connect(&config.qdrant, dimension).await?),
            IndexKind::Weaviate => {
                Self::Weaviate(WeaviateIndex::connect(&config.weaviate, dimension).await?)
            }
            IndexKind::SqliteVec => {
                Self::SqliteVec(SqliteVecIndex::open(&config.sqlite, dimension).await?)
            }
            IndexKind::Pgvector => {
                Self::Pgvector(PgvectorIndex::connect(&config.postgres, dimension).await?)
            }
            IndexKind::Flat => Self::Flat(FlatIndex::new(&config.flat, dimension)),
        })
    }

    fn inner(&self) -> &dyn VectorIndex {
        match self {
            Self::InProcess(index) => index,
            Self::Qdrant(index) => index,
            Self::Weaviate(index) => index,
            Self::SqliteVec(index) => index,
            Self::Pgvector(index) => index,
            Self::Flat(index) => index,
        }
    }
}

#[async_trait]
impl VectorIndex for ActiveIndex {
    async fn add_or_update(&self, project_id: &str, asset_id: &str, vector: &[f32]) -> Result<()> {
        self.inner().add_or_update(project_id, asset_id, vector).await
    }

    async fn search(&self, project_id: &str, query: &[f32], top_n: usize) -> Result<Vec<String>> {
        self.inner().search(project_id, query, top_n).await
    }

    async fn remove(&self, project_id: &str, asset_id: &str) -> Result<()> {
        self.inner().remove(project_id, asset_id).await
    }

    fn kind(&self) -> IndexKind {
        self.inner().kind()
    }
}
