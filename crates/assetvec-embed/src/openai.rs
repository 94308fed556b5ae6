//! OpenAI-compatible embedding provider
//!
//! Works against OpenAI, Azure OpenAI and Ollama. Requests go to
//! `{base_url}/v1/embeddings` (or `{base_url}/embeddings` when the base
//! already ends in `/v1`) with `{"model": ..., "input": [...]}`; results are
//! reordered by the `index` field of each response item.
//!
//! The vector width is fixed by the index. Any response of another width is
//! rejected and not retried.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

#[cfg(feature = "rate-limit")]
use governor::{
    clock::DefaultClock,
    state::{InMemoryState, NotKeyed},
    Quota, RateLimiter,
};
#[cfg(feature = "rate-limit")]
use std::num::NonZeroU32;

use assetvec_config::OpenAISettings;

use crate::error::{EmbedError, Result};
use crate::provider::{EmbeddingProvider, EmbeddingProviderType, ProviderStatus};

/// First retry delay; doubles on each further attempt
const RETRY_BASE_DELAY: Duration = Duration::from_millis(500);

/// Text sent by `check_status`
const STATUS_CHECK_TEXT: &str = "status";

/// Connection settings for one OpenAI-compatible endpoint
#[derive(Debug, Clone)]
pub struct OpenAIConfig {
    /// Base URL, e.g. "https://api.openai.com/v1" or "http://localhost:11434"
    pub base_url: String,
    /// Optional for local servers such as Ollama
    pub api_key: Option<String>,
    pub model: String,
    /// Width every returned vector must have
    pub dimension: usize,
    pub timeout_secs: u64,
    /// Retries after the first attempt for transient failures
    pub max_retries: u32,
    /// Send the key as `api-key` instead of a bearer token
    pub azure_mode: bool,
    /// Only enforced with the `rate-limit` feature
    pub requests_per_second: u32,
}

impl OpenAIConfig {
    /// Build provider config from file settings.
    ///
    /// The API key is read from the environment variable named by
    /// `settings.api_key_env`; a missing variable means no auth header.
    pub fn from_settings(settings: &OpenAISettings, dimension: usize) -> Self {
        let api_key = settings
            .api_key_env
            .as_deref()
            .and_then(|name| std::env::var(name).ok())
            .filter(|key| !key.is_empty());

        Self {
            base_url: settings.url.clone(),
            api_key,
            model: settings.model.clone(),
            dimension,
            timeout_secs: settings.timeout_secs,
            max_retries: settings.max_retries,
            azure_mode: settings.azure_mode,
            requests_per_second: settings.requests_per_second,
        }
    }
}

#[derive(Debug, Serialize)]
struct EmbeddingsRequest<'a> {
    model: &'a str,
    input: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingData {
    embedding: Vec<f32>,
    index: usize,
}

#[derive(Debug, Deserialize)]
struct EmbeddingsResponse {
    data: Vec<EmbeddingData>,
}

/// OpenAI-compatible embedding provider
pub struct OpenAIProvider {
    client: Client,
    config: OpenAIConfig,
    #[cfg(feature = "rate-limit")]
    rate_limiter: RateLimiter<NotKeyed, InMemoryState, DefaultClock>,
}

impl OpenAIProvider {
    pub fn new(config: OpenAIConfig) -> Result<Self> {
        if config.dimension == 0 {
            return Err(EmbedError::InvalidConfig(
                "dimension must be greater than 0".into(),
            ));
        }

        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| EmbedError::ProviderUnavailable(format!("HTTP client error: {}", e)))?;

        #[cfg(feature = "rate-limit")]
        let rate_limiter = {
            let rps = NonZeroU32::new(config.requests_per_second).ok_or_else(|| {
                EmbedError::InvalidConfig("requests_per_second must be greater than 0".into())
            })?;
            RateLimiter::direct(Quota::per_second(rps))
        };

        Ok(Self {
            client,
            config,
            #[cfg(feature = "rate-limit")]
            rate_limiter,
        })
    }

    #[cfg(feature = "rate-limit")]
    async fn wait_for_permit(&self) {
        self.rate_limiter.until_ready().await;
    }

    #[cfg(not(feature = "rate-limit"))]
    async fn wait_for_permit(&self) {}

    fn embeddings_url(&self) -> String {
        let base = self.config.base_url.trim_end_matches('/');
        if base.ends_with("/v1") {
            format!("{}/embeddings", base)
        } else {
            format!("{}/v1/embeddings", base)
        }
    }

    fn build_request(&self, input: Vec<String>) -> RequestBuilder {
        let request = self.client.post(self.embeddings_url()).json(&EmbeddingsRequest {
            model: &self.config.model,
            input,
        });

        match self.config.api_key {
            Some(ref key) if self.config.azure_mode => request.header("api-key", key),
            Some(ref key) => request.bearer_auth(key),
            None => request,
        }
    }

    /// Send with bounded exponential backoff on transient errors.
    async fn request_with_retry(&self, texts: Vec<String>) -> Result<Vec<Vec<f32>>> {
        let mut delay = RETRY_BASE_DELAY;
        let mut attempt = 0;

        loop {
            match self.send_request(texts.clone()).await {
                Err(e) if e.is_retryable() && attempt < self.config.max_retries => {
                    attempt += 1;
                    warn!(
                        "Embedding request failed (attempt {}/{}): {}",
                        attempt,
                        self.config.max_retries + 1,
                        e
                    );
                    tokio::time::sleep(delay).await;
                    delay *= 2;
                }
                result => return result,
            }
        }
    }

    async fn send_request(&self, texts: Vec<String>) -> Result<Vec<Vec<f32>>> {
        self.wait_for_permit().await;

        let sent = texts.len();
        let response = self
            .build_request(texts)
            .send()
            .await
            .map_err(|e| EmbedError::ProviderUnavailable(format!("Request failed: {}", e)))?;

        if response.status() != StatusCode::OK {
            return Err(status_error(response).await);
        }

        let mut body: EmbeddingsResponse = response
            .json()
            .await
            .map_err(|e| EmbedError::ProviderUnavailable(format!("Invalid response: {}", e)))?;

        if body.data.len() != sent {
            return Err(EmbedError::CountMismatch {
                sent,
                received: body.data.len(),
            });
        }

        body.data.sort_by_key(|d| d.index);
        let embeddings: Vec<Vec<f32>> = body.data.into_iter().map(|d| d.embedding).collect();

        if let Some(bad) = embeddings.iter().find(|e| e.len() != self.config.dimension) {
            return Err(EmbedError::DimensionMismatch {
                expected: self.config.dimension,
                actual: bad.len(),
            });
        }

        debug!("Embedded {} texts with {}", sent, self.config.model);
        Ok(embeddings)
    }
}

/// Map a non-200 response to the matching error.
async fn status_error(response: Response) -> EmbedError {
    let status = response.status();
    let retry_after = response
        .headers()
        .get(reqwest::header::RETRY_AFTER)
        .and_then(|v| v.to_str().ok())
        .and_then(|s| s.parse::<u64>().ok());
    let body = response.text().await.unwrap_or_default();

    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
            EmbedError::OpenAIAuth(format!("Authentication failed: {}", body))
        }
        StatusCode::NOT_FOUND => EmbedError::OpenAIInvalidModel(format!("Model not found: {}", body)),
        StatusCode::TOO_MANY_REQUESTS => EmbedError::OpenAIRateLimit { retry_after },
        _ => EmbedError::ProviderUnavailable(format!(
            "Request failed with status {}: {}",
            status, body
        )),
    }
}

#[async_trait]
impl EmbeddingProvider for OpenAIProvider {
    async fn embed_batch(&self, texts: Vec<String>) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(vec![]);
        }
        self.request_with_retry(texts).await
    }

    /// One unretried request; a rate-limited endpoint still counts as reachable.
    async fn check_status(&self) -> Result<ProviderStatus> {
        let start = Instant::now();
        let outcome = self.send_request(vec![STATUS_CHECK_TEXT.to_string()]).await;
        let latency_ms = start.elapsed().as_millis() as u64;

        Ok(match outcome {
            Ok(_) | Err(EmbedError::OpenAIRateLimit { .. }) => {
                ProviderStatus::healthy(EmbeddingProviderType::Openai, "Remote")
                    .with_latency(latency_ms)
            }
            Err(e) => ProviderStatus::unavailable(EmbeddingProviderType::Openai, e.to_string()),
        })
    }

    fn dimension(&self) -> usize {
        self.config.dimension
    }

    fn provider_type(&self) -> EmbeddingProviderType {
        EmbeddingProviderType::Openai
    }
}

impl std::fmt::Debug for OpenAIProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpenAIProvider")
            .field("base_url", &self.config.base_url)
            .field("model", &self.config.model)
            .field("dimension", &self.config.dimension)
            .field("azure_mode", &self.config.azure_mode)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn mock_response(dim: usize, count: usize) -> serde_json::Value {
        let data: Vec<serde_json::Value> = (0..count)
            .map(|i| {
                serde_json::json!({
                    "object": "embedding",
                    "embedding": vec![i as f32; dim],
                    "index": i
                })
            })
            .collect();

        serde_json::json!({
            "object": "list",
            "data": data,
            "model": "test-model",
            "usage": {"prompt_tokens": 10, "total_tokens": 10}
        })
    }

    fn test_config(server: &MockServer, dimension: usize) -> OpenAIConfig {
        OpenAIConfig {
            base_url: server.uri(),
            api_key: Some("test-key".into()),
            model: "test-model".into(),
            dimension,
            timeout_secs: 5,
            max_retries: 1,
            azure_mode: false,
            requests_per_second: 100,
        }
    }

    #[tokio::test]
    async fn test_embed_batch_success() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/v1/embeddings"))
            .and(header("Authorization", "Bearer test-key"))
            .and(body_json(serde_json::json!({
                "model": "test-model",
                "input": ["hello world"]
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(mock_response(8, 1)))
            .mount(&server)
            .await;

        let provider = OpenAIProvider::new(test_config(&server, 8)).unwrap();
        let embeddings = provider
            .embed_batch(vec!["hello world".into()])
            .await
            .unwrap();

        assert_eq!(embeddings.len(), 1);
        assert_eq!(embeddings[0].len(), 8);
    }

    #[tokio::test]
    async fn test_results_follow_response_index() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/v1/embeddings"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "data": [
                    {"embedding": [1.0, 1.0], "index": 1},
                    {"embedding": [0.0, 0.0], "index": 0}
                ]
            })))
            .mount(&server)
            .await;

        let provider = OpenAIProvider::new(test_config(&server, 2)).unwrap();
        let out = provider
            .embed_batch(vec!["a".into(), "b".into()])
            .await
            .unwrap();

        assert_eq!(out, vec![vec![0.0, 0.0], vec![1.0, 1.0]]);
    }

    #[tokio::test]
    async fn test_empty_input() {
        let server = MockServer::start().await;
        let provider = OpenAIProvider::new(test_config(&server, 4)).unwrap();

        let result = provider.embed_batch(vec![]).await.unwrap();
        assert!(result.is_empty());
    }

    #[tokio::test]
    async fn test_auth_failure_is_not_retried() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/v1/embeddings"))
            .respond_with(ResponseTemplate::new(401).set_body_string("Invalid API key"))
            .expect(1)
            .mount(&server)
            .await;

        let provider = OpenAIProvider::new(test_config(&server, 4)).unwrap();
        let result = provider.embed_batch(vec!["test".into()]).await;

        assert!(matches!(result, Err(EmbedError::OpenAIAuth(_))));
    }

    #[tokio::test]
    async fn test_model_not_found() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/v1/embeddings"))
            .respond_with(ResponseTemplate::new(404).set_body_string("Model not found"))
            .mount(&server)
            .await;

        let provider = OpenAIProvider::new(test_config(&server, 4)).unwrap();
        let result = provider.embed_batch(vec!["test".into()]).await;

        assert!(matches!(result, Err(EmbedError::OpenAIInvalidModel(_))));
    }

    #[tokio::test]
    async fn test_rate_limit_retried_then_reported() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/v1/embeddings"))
            .respond_with(
                ResponseTemplate::new(429)
                    .insert_header("Retry-After", "60")
                    .set_body_string("Rate limited"),
            )
            .expect(2)
            .mount(&server)
            .await;

        let provider = OpenAIProvider::new(test_config(&server, 4)).unwrap();
        let result = provider.embed_batch(vec!["test".into()]).await;

        match result {
            Err(EmbedError::OpenAIRateLimit { retry_after }) => {
                assert_eq!(retry_after, Some(60));
            }
            other => panic!("Expected OpenAIRateLimit error, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_azure_mode_header() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/v1/embeddings"))
            .and(header("api-key", "azure-key"))
            .respond_with(ResponseTemplate::new(200).set_body_json(mock_response(4, 1)))
            .mount(&server)
            .await;

        let mut config = test_config(&server, 4);
        config.api_key = Some("azure-key".into());
        config.azure_mode = true;

        let provider = OpenAIProvider::new(config).unwrap();
        assert!(provider.embed_batch(vec!["test".into()]).await.is_ok());
    }

    #[tokio::test]
    async fn test_configured_dimension_enforced() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/v1/embeddings"))
            .respond_with(ResponseTemplate::new(200).set_body_json(mock_response(4, 1)))
            .expect(1)
            .mount(&server)
            .await;

        let provider = OpenAIProvider::new(test_config(&server, 3)).unwrap();
        assert_eq!(provider.dimension(), 3);

        let result = provider.embed_batch(vec!["test".into()]).await;
        assert!(matches!(
            result,
            Err(EmbedError::DimensionMismatch {
                expected: 3,
                actual: 4
            })
        ));
    }

    #[tokio::test]
    async fn test_check_status_healthy() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/v1/embeddings"))
            .respond_with(ResponseTemplate::new(200).set_body_json(mock_response(4, 1)))
            .mount(&server)
            .await;

        let provider = OpenAIProvider::new(test_config(&server, 4)).unwrap();
        let status = provider.check_status().await.unwrap();

        assert!(status.available);
        assert!(status.latency_ms.is_some());
    }

    #[tokio::test]
    async fn test_check_status_unavailable() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/v1/embeddings"))
            .respond_with(ResponseTemplate::new(401))
            .mount(&server)
            .await;

        let provider = OpenAIProvider::new(test_config(&server, 4)).unwrap();
        let status = provider.check_status().await.unwrap();

        assert!(!status.available);
        assert!(status.error.is_some());
    }

    #[tokio::test]
    async fn test_check_status_rate_limited_is_reachable() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/v1/embeddings"))
            .respond_with(ResponseTemplate::new(429))
            .expect(1)
            .mount(&server)
            .await;

        let provider = OpenAIProvider::new(test_config(&server, 4)).unwrap();
        let status = provider.check_status().await.unwrap();

        assert!(status.available);
    }

    #[tokio::test]
    async fn test_check_status_is_not_retried() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/v1/embeddings"))
            .respond_with(ResponseTemplate::new(503))
            .expect(1)
            .mount(&server)
            .await;

        let provider = OpenAIProvider::new(test_config(&server, 4)).unwrap();
        let status = provider.check_status().await.unwrap();

        assert!(!status.available);
        assert!(status.latency_ms.is_none());
    }

    #[test]
    fn test_zero_dimension_rejected() {
        let config = OpenAIConfig::from_settings(&OpenAISettings::default(), 0);
        assert!(matches!(
            OpenAIProvider::new(config),
            Err(EmbedError::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_config_from_settings_reads_key_env() {
        // SAFETY: the variable name is unique to this test
        unsafe {
            std::env::set_var("ASSETVEC_TEST_OPENAI_KEY", "sk-from-env");
        }

        let settings = OpenAISettings {
            api_key_env: Some("ASSETVEC_TEST_OPENAI_KEY".into()),
            ..Default::default()
        };
        let config = OpenAIConfig::from_settings(&settings, 1536);

        unsafe {
            std::env::remove_var("ASSETVEC_TEST_OPENAI_KEY");
        }

        assert_eq!(config.api_key.as_deref(), Some("sk-from-env"));
        assert_eq!(config.model, "text-embedding-3-small");
        assert_eq!(config.dimension, 1536);
    }

    #[test]
    fn test_embeddings_url_variants() {
        let mut config = OpenAIConfig::from_settings(&OpenAISettings::default(), 8);
        config.base_url = "http://localhost:11434/v1/".into();
        let provider = OpenAIProvider::new(config.clone()).unwrap();
        assert_eq!(
            provider.embeddings_url(),
            "http://localhost:11434/v1/embeddings"
        );

        config.base_url = "http://localhost:11434".into();
        let provider = OpenAIProvider::new(config).unwrap();
        assert_eq!(
            provider.embeddings_url(),
            "http://localhost:11434/v1/embeddings"
        );
    }
}
