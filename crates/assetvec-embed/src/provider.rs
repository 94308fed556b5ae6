//! Embedding provider trait and types
//!
//! Defines the core abstraction for embedding generation:
//! - `HashingProvider` - deterministic offline feature hashing
//! - `OpenAIProvider` - OpenAI-compatible APIs (OpenAI, Azure OpenAI, Ollama)

use async_trait::async_trait;
use serde::Serialize;

pub use assetvec_config::EmbeddingProviderType;

use crate::error::Result;

/// Status of an embedding provider
///
/// Contains health and capability information for diagnostics.
#[derive(Debug, Clone, Serialize)]
pub struct ProviderStatus {
    /// Whether the provider is available and responding
    pub available: bool,
    /// Type of provider
    pub provider_type: EmbeddingProviderType,
    /// Where embeddings are computed ("Local", "Remote")
    pub device: String,
    /// Last health check latency in milliseconds
    pub latency_ms: Option<u64>,
    /// Error message if provider is unavailable
    pub error: Option<String>,
}

impl ProviderStatus {
    /// Create a status for a healthy provider
    pub fn healthy(provider_type: EmbeddingProviderType, device: impl Into<String>) -> Self {
        Self {
            available: true,
            provider_type,
            device: device.into(),
            latency_ms: None,
            error: None,
        }
    }

    /// Create a status for an unavailable provider
    pub fn unavailable(provider_type: EmbeddingProviderType, error: impl Into<String>) -> Self {
        Self {
            available: false,
            provider_type,
            device: "N/A".into(),
            latency_ms: None,
            error: Some(error.into()),
        }
    }

    /// Set latency from a health check
    pub fn with_latency(mut self, latency_ms: u64) -> Self {
        self.latency_ms = Some(latency_ms);
        self
    }
}

/// Embedding provider trait
///
/// Converts text into fixed-length vectors. Every vector a provider returns
/// has exactly `dimension()` components.
///
/// # Thread Safety
///
/// Implementations must be `Send + Sync` for use with async runtimes and concurrent access.
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// Generate one embedding per input text, in input order
    async fn embed_batch(&self, texts: Vec<String>) -> Result<Vec<Vec<f32>>>;

    /// Check provider connectivity and status
    ///
    /// For remote providers, performs a health check request.
    async fn check_status(&self) -> Result<ProviderStatus>;

    /// Get the embedding dimension
    fn dimension(&self) -> usize;

    /// Get the provider type identifier
    fn provider_type(&self) -> EmbeddingProviderType;
}
