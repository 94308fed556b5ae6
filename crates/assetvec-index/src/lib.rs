//! assetvec Index - per-project vector similarity index
//!
//! One contract, [`VectorIndex`], implemented by six interchangeable
//! backends:
//!
//! - [`InProcessIndex`]: in-memory linear scan
//! - [`QdrantIndex`]: one Qdrant collection, projects separated by payload
//! - [`WeaviateIndex`]: one Weaviate class per project
//! - [`SqliteVecIndex`]: one sqlite-vec virtual table per project
//! - [`PgvectorIndex`]: one PostgreSQL table per project
//! - [`FlatIndex`]: usearch files plus a persistent label mapping
//!
//! [`IndexRegistry`] validates a configuration, builds the selected adapter
//! once and exposes embedding through the same handle.
//!
//! ## Example
//!
//! ```ignore
//! use assetvec_config::AssetvecConfig;
//! use assetvec_index::IndexRegistry;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let registry = IndexRegistry::new(AssetvecConfig::default())?;
//!
//!     let banner = registry.embed("summer sale hero banner").await?;
//!     registry.add_or_update("campaign-7", "banner-1", &banner.vector).await?;
//!
//!     let query = registry.embed("summer banner").await?;
//!     let hits = registry.search("campaign-7", &query.vector, 5).await?;
//!     println!("{:?}", hits);
//!     Ok(())
//! }
//! ```

pub mod adapters;
pub mod error;
pub mod namespace;
pub mod registry;
pub mod traits;

pub use adapters::{
    ActiveIndex, FlatIndex, InProcessIndex, PgvectorIndex, QdrantIndex, SqliteVecIndex,
    WeaviateIndex,
};
pub use error::{IndexError, Operation, Result};
pub use namespace::{NamespaceResolver, NamespaceRules};
pub use registry::IndexRegistry;
pub use traits::VectorIndex;

pub use assetvec_config::IndexKind;
pub use assetvec_embed::Embedding;
