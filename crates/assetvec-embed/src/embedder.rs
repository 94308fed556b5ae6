//! `Embedder` facade: text in, vector plus keyword tags out.

use std::sync::Arc;

use serde::Serialize;

use crate::error::{EmbedError, Result};
use crate::provider::{EmbeddingProvider, ProviderStatus};
use crate::tags::extract_tags;

/// A vector together with the keyword tags of the text it came from.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Embedding {
    pub vector: Vec<f32>,
    pub tags: Vec<String>,
}

/// Wraps a provider and attaches keyword tags to each embedding.
#[derive(Clone)]
pub struct Embedder {
    provider: Arc<dyn EmbeddingProvider>,
    max_tags: usize,
}

impl Embedder {
    pub fn new(provider: Arc<dyn EmbeddingProvider>, max_tags: usize) -> Self {
        Self { provider, max_tags }
    }

    /// Underlying provider.
    pub fn provider(&self) -> &Arc<dyn EmbeddingProvider> {
        &self.provider
    }

    /// Vector width of every embedding this embedder returns.
    pub fn dimension(&self) -> usize {
        self.provider.dimension()
    }

    /// Health of the underlying provider.
    pub async fn status(&self) -> Result<ProviderStatus> {
        self.provider.check_status().await
    }

    /// Embed one text.
    pub async fn embed(&self, text: &str) -> Result<Embedding> {
        let mut vectors = self.provider.embed_batch(vec![text.to_string()]).await?;
        let vector = vectors.pop().ok_or(EmbedError::CountMismatch {
            sent: 1,
            received: 0,
        })?;

        Ok(Embedding {
            vector,
            tags: extract_tags(text, self.max_tags),
        })
    }
}

impl std::fmt::Debug for Embedder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Embedder")
            .field("provider", &self.provider.provider_type())
            .field("dimension", &self.provider.dimension())
            .field("max_tags", &self.max_tags)
            .finish()
    }
}
