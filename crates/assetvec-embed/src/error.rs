//! Error types for assetvec-embed

use thiserror::Error;

/// Errors that can occur while producing embeddings
#[derive(Error, Debug)]
pub enum EmbedError {
    /// Invalid provider configuration
    #[error("Invalid embedding configuration: {0}")]
    InvalidConfig(String),

    /// Embedding provider unavailable
    #[error("Embedding provider unavailable: {0}")]
    ProviderUnavailable(String),

    /// Embedding dimension mismatch
    #[error("Embedding dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    /// Provider returned a different number of vectors than inputs
    #[error("Embedding count mismatch: sent {sent} texts, got {received} vectors")]
    CountMismatch { sent: usize, received: usize },

    /// OpenAI authentication failed
    #[error("OpenAI authentication failed: {0}")]
    OpenAIAuth(String),

    /// OpenAI rate limited
    #[error("OpenAI rate limited, retry after {retry_after:?} seconds")]
    OpenAIRateLimit { retry_after: Option<u64> },

    /// OpenAI model not found
    #[error("OpenAI model not found: {0}")]
    OpenAIInvalidModel(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl EmbedError {
    /// Whether sending the same request again may succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            EmbedError::ProviderUnavailable(_)
                | EmbedError::OpenAIRateLimit { .. }
                | EmbedError::CountMismatch { .. }
        )
    }
}

impl From<assetvec_config::ConfigError> for EmbedError {
    fn from(err: assetvec_config::ConfigError) -> Self {
        EmbedError::InvalidConfig(err.to_string())
    }
}

/// Result type for assetvec-embed operations
pub type Result<T> = std::result::Result<T, EmbedError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retryable_errors() {
        assert!(EmbedError::ProviderUnavailable("timeout".into()).is_retryable());
        assert!(EmbedError::OpenAIRateLimit { retry_after: None }.is_retryable());
        assert!(!EmbedError::OpenAIAuth("bad key".into()).is_retryable());
        assert!(!EmbedError::OpenAIInvalidModel("nope".into()).is_retryable());
        assert!(!EmbedError::DimensionMismatch {
            expected: 3,
            actual: 4
        }
        .is_retryable());
    }
}
