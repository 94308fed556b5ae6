//! Provider factory for creating embedding providers from configuration

use std::sync::Arc;

use assetvec_config::{EmbeddingConfig, EmbeddingProviderType};
use tracing::info;

use crate::error::{EmbedError, Result};
use crate::hashing::HashingProvider;
use crate::openai::{OpenAIConfig, OpenAIProvider};
use crate::provider::EmbeddingProvider;

/// Validate that a provider's embedding dimension matches the index dimension
///
/// Every backend rejects vectors of the wrong width, so a mismatch here would
/// only surface later as a failed write.
pub fn validate_dimension(provider: &dyn EmbeddingProvider, expected: usize) -> Result<()> {
    let actual = provider.dimension();
    if actual != expected {
        return Err(EmbedError::DimensionMismatch { expected, actual });
    }
    Ok(())
}

/// Create an embedding provider from configuration
///
/// `dimension` is the vector width the active index enforces.
pub fn create(config: &EmbeddingConfig, dimension: usize) -> Result<Arc<dyn EmbeddingProvider>> {
    config.validate()?;

    let provider: Arc<dyn EmbeddingProvider> = match config.provider {
        EmbeddingProviderType::Hashing => Arc::new(HashingProvider::new(dimension)?),
        EmbeddingProviderType::Openai => {
            let settings = config.openai.clone().unwrap_or_default();
            let openai_config = OpenAIConfig::from_settings(&settings, dimension);
            Arc::new(OpenAIProvider::new(openai_config)?)
        }
    };

    validate_dimension(provider.as_ref(), dimension)?;

    info!(
        "Embedding provider: {} ({} dimensions)",
        provider.provider_type(),
        provider.dimension()
    );
    Ok(provider)
}
