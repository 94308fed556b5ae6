//! Deterministic feature-hashing embedding provider.
//!
//! Each lower-cased word token and each adjacent word pair is hashed with
//! SHA-256. The first eight bytes pick a bucket, the ninth picks a sign. The
//! accumulated vector is L2-normalized, so Euclidean distance between two
//! embeddings tracks their cosine similarity.
//!
//! No network, no model files: the same text always maps to the same vector,
//! which makes this provider the default for tests and offline use.

use async_trait::async_trait;
use sha2::{Digest, Sha256};

use crate::error::{EmbedError, Result};
use crate::provider::{EmbeddingProvider, EmbeddingProviderType, ProviderStatus};
use crate::tags::tokenize;

/// Weight of word-pair features relative to single words
const BIGRAM_WEIGHT: f32 = 0.5;

/// Offline feature-hashing provider
#[derive(Debug, Clone)]
pub struct HashingProvider {
    dimension: usize,
}

impl HashingProvider {
    /// Create a provider producing vectors of `dimension` components.
    pub fn new(dimension: usize) -> Result<Self> {
        if dimension == 0 {
            return Err(EmbedError::InvalidConfig(
                "hashing provider dimension must be greater than zero".into(),
            ));
        }
        Ok(Self { dimension })
    }

    /// Embed a single text synchronously.
    pub fn embed_one(&self, text: &str) -> Vec<f32> {
        let mut vector = vec![0.0_f32; self.dimension];
        let tokens = tokenize(text);

        for token in &tokens {
            self.accumulate(&mut vector, token.as_bytes(), 1.0);
        }
        for pair in tokens.windows(2) {
            let feature = format!("{} {}", pair[0], pair[1]);
            self.accumulate(&mut vector, feature.as_bytes(), BIGRAM_WEIGHT);
        }

        normalize(&mut vector);
        vector
    }

    fn accumulate(&self, vector: &mut [f32], feature: &[u8], weight: f32) {
        let digest = Sha256::digest(feature);
        let mut bucket_bytes = [0u8; 8];
        bucket_bytes.copy_from_slice(&digest[..8]);
        let bucket = (u64::from_le_bytes(bucket_bytes) % self.dimension as u64) as usize;
        let sign = if digest[8] & 1 == 0 { 1.0 } else { -1.0 };
        vector[bucket] += sign * weight;
    }
}

/// Scale to unit length; the zero vector is left as is.
fn normalize(vector: &mut [f32]) {
    let norm = vector.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm > 0.0 {
        for x in vector.iter_mut() {
            *x /= norm;
        }
    }
}

#[async_trait]
impl EmbeddingProvider for HashingProvider {
    async fn embed_batch(&self, texts: Vec<String>) -> Result<Vec<Vec<f32>>> {
        Ok(texts.iter().map(|t| self.embed_one(t)).collect())
    }

    async fn check_status(&self) -> Result<ProviderStatus> {
        Ok(ProviderStatus::healthy(
            EmbeddingProviderType::Hashing,
            "Local",
        ))
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    fn provider_type(&self) -> EmbeddingProviderType {
        EmbeddingProviderType::Hashing
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn l2(a: &[f32], b: &[f32]) -> f32 {
        a.iter()
            .zip(b)
            .map(|(x, y)| (x - y) * (x - y))
            .sum::<f32>()
            .sqrt()
    }

    #[test]
    fn test_zero_dimension_rejected() {
        assert!(matches!(
            HashingProvider::new(0),
            Err(EmbedError::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_deterministic() {
        let provider = HashingProvider::new(64).unwrap();
        assert_eq!(
            provider.embed_one("Spring sale banner"),
            provider.embed_one("Spring sale banner")
        );
    }

    #[test]
    fn test_case_insensitive() {
        let provider = HashingProvider::new(64).unwrap();
        assert_eq!(
            provider.embed_one("Spring Sale"),
            provider.embed_one("spring sale")
        );
    }

    #[test]
    fn test_unit_length() {
        let provider = HashingProvider::new(128).unwrap();
        let v = provider.embed_one("email campaign for the autumn collection");
        let norm: f32 = v.iter().map(|x| x * x).sum::<f32>().sqrt();
        assert!((norm - 1.0).abs() < 1e-5);
    }

    #[test]
    fn test_empty_text_is_zero_vector() {
        let provider = HashingProvider::new(16).unwrap();
        let v = provider.embed_one("");
        assert_eq!(v.len(), 16);
        assert!(v.iter().all(|x| *x == 0.0));
    }

    #[test]
    fn test_shared_words_are_closer() {
        let provider = HashingProvider::new(256).unwrap();
        let base = provider.embed_one("red running shoes summer sale");
        let near = provider.embed_one("red running shoes on sale");
        let far = provider.embed_one("quarterly investor relations webinar");
        assert!(l2(&base, &near) < l2(&base, &far));
    }

    #[tokio::test]
    async fn test_embed_batch_preserves_order() {
        let provider = HashingProvider::new(32).unwrap();
        let out = provider
            .embed_batch(vec!["one".into(), "two".into()])
            .await
            .unwrap();
        assert_eq!(out.len(), 2);
        assert_eq!(out[0], provider.embed_one("one"));
        assert_eq!(out[1], provider.embed_one("two"));
    }

    #[tokio::test]
    async fn test_status_and_identity() {
        let provider = HashingProvider::new(32).unwrap();
        let status = provider.check_status().await.unwrap();
        assert!(status.available);
        assert_eq!(provider.dimension(), 32);
        assert_eq!(provider.provider_type(), EmbeddingProviderType::Hashing);
    }
}
