//! Embedding generation for assetvec
//!
//! Turns asset descriptions into fixed-length vectors for the index layer.
//!
//! # Architecture
//!
//! ```text
//! EmbeddingProvider (trait)
//!     ├── HashingProvider  - offline SHA-256 feature hashing (default)
//!     └── OpenAIProvider   - HTTP client for /v1/embeddings
//! ```
//!
//! `Embedder` wraps a provider and adds keyword tags to each vector.
//!
//! # Example
//!
//! ```ignore
//! use assetvec_embed::{create_provider, Embedder};
//!
//! let provider = create_provider(&config.embedding, config.index.dimension)?;
//! let embedder = Embedder::new(provider, config.embedding.max_tags);
//! let embedding = embedder.embed("summer sale hero banner").await?;
//! ```

mod embedder;
mod error;
pub mod factory;
pub mod hashing;
pub mod openai;
mod provider;
pub mod tags;

pub use embedder::{Embedder, Embedding};
pub use error::{EmbedError, Result};
pub use factory::{create as create_provider, validate_dimension};
pub use hashing::HashingProvider;
pub use openai::{OpenAIConfig, OpenAIProvider};
pub use provider::{EmbeddingProvider, EmbeddingProviderType, ProviderStatus};
