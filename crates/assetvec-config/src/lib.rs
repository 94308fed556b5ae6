//! assetvec Configuration Management
//!
//! Provides configuration loading with support for:
//! - Global config: `~/.assetvec/config.toml`
//! - Local config: `.assetvec/config.toml` (in the working directory)
//! - CLI overrides via `ConfigOverrides`
//!
//! Configuration is merged in order: global → local → CLI overrides.
//! It is read once when the index registry is built; nothing re-reads it
//! while the process runs.

mod error;
mod loader;

pub use error::ConfigError;
pub use loader::ConfigLoader;

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Default vector width (text-embedding-3-small).
pub const DEFAULT_DIMENSION: usize = 1536;

/// Root configuration for assetvec.
///
/// Represents the fully merged configuration from all sources.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct AssetvecConfig {
    /// Vector index configuration
    pub index: IndexConfig,

    /// Embedding provider configuration
    pub embedding: EmbeddingConfig,

    /// Logging configuration
    pub logging: LoggingConfig,
}

/// Which backend implements the vector index.
///
/// Exactly one is active per process.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq, Eq, Hash)]
#[serde(rename_all = "kebab-case")]
pub enum IndexKind {
    /// In-memory linear scan (default, no external services)
    #[default]
    InProcess,
    /// Qdrant collection partitioned by a namespace payload field
    Qdrant,
    /// Weaviate, one class per project
    Weaviate,
    /// SQLite with sqlite-vec virtual tables, one collection per project
    SqliteVec,
    /// PostgreSQL with the pgvector extension, one table per project
    Pgvector,
    /// usearch flat index files with an asset-id/label mapping
    Flat,
}

impl IndexKind {
    /// All supported kinds, in documentation order.
    pub const ALL: [IndexKind; 6] = [
        IndexKind::InProcess,
        IndexKind::Qdrant,
        IndexKind::Weaviate,
        IndexKind::SqliteVec,
        IndexKind::Pgvector,
        IndexKind::Flat,
    ];

    /// Canonical configuration spelling.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::InProcess => "in-process",
            Self::Qdrant => "qdrant",
            Self::Weaviate => "weaviate",
            Self::SqliteVec => "sqlite-vec",
            Self::Pgvector => "pgvector",
            Self::Flat => "flat",
        }
    }
}

impl std::fmt::Display for IndexKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for IndexKind {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "in-process" | "in_process" | "inprocess" | "memory" => Ok(Self::InProcess),
            "qdrant" => Ok(Self::Qdrant),
            "weaviate" => Ok(Self::Weaviate),
            "sqlite-vec" | "sqlite_vec" | "sqlite" => Ok(Self::SqliteVec),
            "pgvector" | "postgres" | "postgresql" => Ok(Self::Pgvector),
            "flat" | "usearch" => Ok(Self::Flat),
            _ => Err(ConfigError::ValidationError(format!(
                "Unknown index kind: '{}'. Valid values: {}",
                s,
                Self::ALL.map(|k| k.as_str()).join(", ")
            ))),
        }
    }
}

/// Vector index configuration.
///
/// # Example TOML
///
/// ```toml
/// [index]
/// kind = "flat"
/// dimension = 1536
///
/// [index.flat]
/// directory = "/var/lib/assetvec/flat"
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct IndexConfig {
    /// Active backend
    pub kind: IndexKind,

    /// Vector width every backend enforces
    pub dimension: usize,

    /// Qdrant settings
    pub qdrant: QdrantSettings,

    /// Weaviate settings
    pub weaviate: WeaviateSettings,

    /// sqlite-vec settings
    pub sqlite: SqliteSettings,

    /// PostgreSQL/pgvector settings
    pub postgres: PostgresSettings,

    /// Flat index settings
    pub flat: FlatSettings,
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            kind: IndexKind::default(),
            dimension: DEFAULT_DIMENSION,
            qdrant: QdrantSettings::default(),
            weaviate: WeaviateSettings::default(),
            sqlite: SqliteSettings::default(),
            postgres: PostgresSettings::default(),
            flat: FlatSettings::default(),
        }
    }
}

impl IndexConfig {
    /// Validate that the selected backend has everything it needs.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.dimension == 0 {
            return Err(ConfigError::invalid_value(
                "index.dimension",
                "must be greater than zero",
            ));
        }

        match self.kind {
            IndexKind::InProcess => Ok(()),
            IndexKind::Qdrant => {
                if self.qdrant.url.is_empty() {
                    return Err(ConfigError::missing("index.qdrant.url", self.kind));
                }
                if self.qdrant.collection.is_empty() {
                    return Err(ConfigError::missing("index.qdrant.collection", self.kind));
                }
                Ok(())
            }
            IndexKind::Weaviate => {
                if self.weaviate.url.is_empty() {
                    return Err(ConfigError::missing("index.weaviate.url", self.kind));
                }
                Ok(())
            }
            IndexKind::SqliteVec => {
                if self.sqlite.path.as_os_str().is_empty() {
                    return Err(ConfigError::missing("index.sqlite.path", self.kind));
                }
                Ok(())
            }
            IndexKind::Pgvector => match self.postgres.connection_string.as_deref() {
                Some(conn) if !conn.trim().is_empty() => Ok(()),
                _ => Err(ConfigError::missing(
                    "index.postgres.connection_string",
                    self.kind,
                )),
            },
            IndexKind::Flat => {
                if self.flat.directory.as_os_str().is_empty() {
                    return Err(ConfigError::missing("index.flat.directory", self.kind));
                }
                Ok(())
            }
        }
    }
}

/// Qdrant connection settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct QdrantSettings {
    /// Qdrant server URL (gRPC port)
    pub url: String,

    /// API key for authentication (optional)
    pub api_key: Option<String>,

    /// Collection holding every project's points
    pub collection: String,

    /// Prefix for the per-project namespace payload value
    pub namespace_prefix: String,

    /// Request timeout in seconds
    pub timeout_secs: u64,
}

impl Default for QdrantSettings {
    fn default() -> Self {
        Self {
            url: "http://localhost:6334".to_string(),
            api_key: None,
            collection: "assetvec_assets".to_string(),
            namespace_prefix: "project".to_string(),
            timeout_secs: 30,
        }
    }
}

/// Weaviate connection settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WeaviateSettings {
    /// Weaviate REST endpoint
    pub url: String,

    /// API key sent as a bearer token (optional)
    pub api_key: Option<String>,

    /// Prefix for per-project class names
    pub class_prefix: String,

    /// Request timeout in seconds
    pub timeout_secs: u64,
}

impl Default for WeaviateSettings {
    fn default() -> Self {
        Self {
            url: "http://localhost:8080".to_string(),
            api_key: None,
            class_prefix: "Project".to_string(),
            timeout_secs: 30,
        }
    }
}

/// sqlite-vec storage settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SqliteSettings {
    /// Database file
    pub path: PathBuf,

    /// Prefix for per-project collection (virtual table) names
    pub collection_prefix: String,
}

impl Default for SqliteSettings {
    fn default() -> Self {
        Self {
            path: PathBuf::from(".assetvec/vectors.db"),
            collection_prefix: "project".to_string(),
        }
    }
}

/// PostgreSQL/pgvector settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PostgresSettings {
    /// libpq-style connection string, e.g. `host=localhost user=postgres dbname=assets`
    pub connection_string: Option<String>,

    /// Prefix for per-project table names
    pub table_prefix: String,
}

impl Default for PostgresSettings {
    fn default() -> Self {
        Self {
            connection_string: None,
            table_prefix: "project_vectors".to_string(),
        }
    }
}

/// Flat (usearch) index settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FlatSettings {
    /// Directory holding `<namespace>.usearch` and `<namespace>.mapping.json`
    pub directory: PathBuf,

    /// Prefix for per-project file stems
    pub file_prefix: String,
}

impl Default for FlatSettings {
    fn default() -> Self {
        Self {
            directory: PathBuf::from(".assetvec/flat"),
            file_prefix: "project".to_string(),
        }
    }
}

/// Embedding provider configuration.
///
/// # Example TOML
///
/// ```toml
/// [embedding]
/// provider = "openai"  # or "hashing"
///
/// [embedding.openai]
/// url = "https://api.openai.com/v1"
/// api_key_env = "OPENAI_API_KEY"
/// model = "text-embedding-3-small"
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EmbeddingConfig {
    /// Which embedding provider to use
    pub provider: EmbeddingProviderType,

    /// OpenAI-compatible provider settings (required when provider = "openai")
    pub openai: Option<OpenAISettings>,

    /// Maximum number of keyword tags returned alongside a vector
    pub max_tags: usize,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: EmbeddingProviderType::default(),
            openai: None,
            max_tags: 8,
        }
    }
}

impl EmbeddingConfig {
    /// Validate that required settings exist for the selected provider.
    pub fn validate(&self) -> Result<(), ConfigError> {
        match self.provider {
            EmbeddingProviderType::Hashing => Ok(()),
            EmbeddingProviderType::Openai => {
                let Some(settings) = self.openai.as_ref() else {
                    return Err(ConfigError::ValidationError(
                        "embedding.provider is 'openai' but [embedding.openai] section is missing"
                            .to_string(),
                    ));
                };
                if settings.url.is_empty() {
                    return Err(ConfigError::ValidationError(
                        "embedding.openai.url is required".to_string(),
                    ));
                }
                if settings.model.is_empty() {
                    return Err(ConfigError::ValidationError(
                        "embedding.openai.model is required".to_string(),
                    ));
                }
                Ok(())
            }
        }
    }
}

/// Embedding provider type selection.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum EmbeddingProviderType {
    /// Deterministic offline feature hashing (default)
    #[default]
    Hashing,
    /// OpenAI-compatible API (OpenAI, Azure OpenAI, Ollama, etc.)
    Openai,
}

impl std::fmt::Display for EmbeddingProviderType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Hashing => write!(f, "hashing"),
            Self::Openai => write!(f, "openai"),
        }
    }
}

impl std::str::FromStr for EmbeddingProviderType {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "hashing" | "hash" | "local" => Ok(Self::Hashing),
            "openai" => Ok(Self::Openai),
            _ => Err(ConfigError::ValidationError(format!(
                "Unknown embedding provider: '{}'. Valid values: hashing, openai",
                s
            ))),
        }
    }
}

/// OpenAI-compatible provider settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OpenAISettings {
    /// API base URL (e.g., "https://api.openai.com/v1")
    pub url: String,

    /// Environment variable name containing API key
    pub api_key_env: Option<String>,

    /// Embedding model
    pub model: String,

    /// Request timeout in seconds
    pub timeout_secs: u64,

    /// Maximum retry attempts
    pub max_retries: u32,

    /// Use Azure OpenAI authentication (api-key header)
    pub azure_mode: bool,

    /// Client-side request cap, enforced with the `rate-limit` feature
    pub requests_per_second: u32,
}

impl Default for OpenAISettings {
    fn default() -> Self {
        Self {
            url: "https://api.openai.com/v1".to_string(),
            api_key_env: Some("OPENAI_API_KEY".to_string()),
            model: "text-embedding-3-small".to_string(),
            timeout_secs: 30,
            max_retries: 3,
            azure_mode: false,
            requests_per_second: 10,
        }
    }
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,

    /// Log format (text, json)
    pub format: LogFormat,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::default(),
        }
    }
}

/// Log output format.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Human-readable text format
    #[default]
    Text,
    /// JSON structured logging
    Json,
}

/// CLI overrides for configuration values.
///
/// Used to apply command-line arguments over file-based config.
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    /// Override the active backend
    pub index_kind: Option<IndexKind>,

    /// Override the vector dimension
    pub dimension: Option<usize>,

    /// Override the flat index directory
    pub flat_dir: Option<PathBuf>,

    /// Override the sqlite-vec database file
    pub sqlite_path: Option<PathBuf>,

    /// Override the Qdrant URL
    pub qdrant_url: Option<String>,

    /// Override the Weaviate URL
    pub weaviate_url: Option<String>,

    /// Override the PostgreSQL connection string
    pub postgres_url: Option<String>,

    /// Override embedding provider type
    pub embedding_provider: Option<EmbeddingProviderType>,

    /// Override log level
    pub log_level: Option<String>,
}

impl AssetvecConfig {
    /// Apply CLI overrides to this configuration.
    pub fn apply_overrides(&mut self, overrides: &ConfigOverrides) {
        if let Some(kind) = overrides.index_kind {
            self.index.kind = kind;
        }

        if let Some(dimension) = overrides.dimension {
            self.index.dimension = dimension;
        }

        if let Some(ref dir) = overrides.flat_dir {
            self.index.flat.directory = dir.clone();
        }

        if let Some(ref path) = overrides.sqlite_path {
            self.index.sqlite.path = path.clone();
        }

        if let Some(ref url) = overrides.qdrant_url {
            self.index.qdrant.url = url.clone();
        }

        if let Some(ref url) = overrides.weaviate_url {
            self.index.weaviate.url = url.clone();
        }

        if let Some(ref conn) = overrides.postgres_url {
            self.index.postgres.connection_string = Some(conn.clone());
        }

        if let Some(provider) = overrides.embedding_provider {
            self.embedding.provider = provider;
        }

        if let Some(ref level) = overrides.log_level {
            self.logging.level = level.clone();
        }
    }

    /// Validate the configuration.
    ///
    /// Checks that all required settings exist for the selected backend and
    /// embedding provider.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.index.validate()?;
        self.embedding.validate()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_default_config() {
        let config = AssetvecConfig::default();
        assert_eq!(config.index.kind, IndexKind::InProcess);
        assert_eq!(config.index.dimension, DEFAULT_DIMENSION);
        assert_eq!(config.index.qdrant.url, "http://localhost:6334");
        assert_eq!(config.index.flat.directory, PathBuf::from(".assetvec/flat"));
        assert_eq!(config.embedding.provider, EmbeddingProviderType::Hashing);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_index_kind_from_str() {
        assert_eq!(
            "in-process".parse::<IndexKind>().unwrap(),
            IndexKind::InProcess
        );
        assert_eq!("memory".parse::<IndexKind>().unwrap(), IndexKind::InProcess);
        assert_eq!("Qdrant".parse::<IndexKind>().unwrap(), IndexKind::Qdrant);
        assert_eq!(
            "sqlite_vec".parse::<IndexKind>().unwrap(),
            IndexKind::SqliteVec
        );
        assert_eq!(
            "postgres".parse::<IndexKind>().unwrap(),
            IndexKind::Pgvector
        );
        assert_eq!("usearch".parse::<IndexKind>().unwrap(), IndexKind::Flat);

        let err = "pinecone".parse::<IndexKind>().unwrap_err();
        assert!(err.to_string().contains("pinecone"));
        assert!(err.to_string().contains("sqlite-vec"));
    }

    #[test]
    fn test_index_kind_display_roundtrips() {
        for kind in IndexKind::ALL {
            assert_eq!(kind.to_string().parse::<IndexKind>().unwrap(), kind);
        }
    }

    #[test]
    fn test_unknown_kind_in_toml_is_rejected() {
        let result: Result<AssetvecConfig, _> = toml::from_str(
            r#"
            [index]
            kind = "faiss-gpu"
            "#,
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_validate_zero_dimension() {
        let mut config = AssetvecConfig::default();
        config.index.dimension = 0;
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("index.dimension"));
    }

    #[test]
    fn test_validate_pgvector_requires_connection_string() {
        let mut config = AssetvecConfig::default();
        config.index.kind = IndexKind::Pgvector;
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("connection_string"));

        config.index.postgres.connection_string = Some("host=localhost user=postgres".into());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_qdrant_requires_url() {
        let mut config = AssetvecConfig::default();
        config.index.kind = IndexKind::Qdrant;
        config.index.qdrant.url.clear();
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("index.qdrant.url"));
    }

    #[test]
    fn test_validate_flat_requires_directory() {
        let mut config = AssetvecConfig::default();
        config.index.kind = IndexKind::Flat;
        config.index.flat.directory = PathBuf::new();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_apply_overrides() {
        let mut config = AssetvecConfig::default();
        let overrides = ConfigOverrides {
            index_kind: Some(IndexKind::Flat),
            dimension: Some(3),
            flat_dir: Some(PathBuf::from("/tmp/flat")),
            log_level: Some("debug".to_string()),
            ..Default::default()
        };

        config.apply_overrides(&overrides);

        assert_eq!(config.index.kind, IndexKind::Flat);
        assert_eq!(config.index.dimension, 3);
        assert_eq!(config.index.flat.directory, PathBuf::from("/tmp/flat"));
        assert_eq!(config.logging.level, "debug");
    }

    #[test]
    fn test_embedding_provider_type_from_str() {
        assert_eq!(
            "hashing".parse::<EmbeddingProviderType>().unwrap(),
            EmbeddingProviderType::Hashing
        );
        assert_eq!(
            "openai".parse::<EmbeddingProviderType>().unwrap(),
            EmbeddingProviderType::Openai
        );
        assert!("unknown".parse::<EmbeddingProviderType>().is_err());
    }

    #[test]
    fn test_embedding_config_validate_openai_missing() {
        let config = EmbeddingConfig {
            provider: EmbeddingProviderType::Openai,
            openai: None,
            ..Default::default()
        };
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("openai"));
    }

    #[test]
    fn test_embedding_config_validate_openai_valid() {
        let config = EmbeddingConfig {
            provider: EmbeddingProviderType::Openai,
            openai: Some(OpenAISettings::default()),
            ..Default::default()
        };
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_toml_roundtrip() {
        let mut config = AssetvecConfig::default();
        config.index.kind = IndexKind::Weaviate;
        config.index.weaviate.url = "http://weaviate:8080".to_string();
        config.index.dimension = 768;

        let toml_str = toml::to_string(&config).unwrap();
        let parsed: AssetvecConfig = toml::from_str(&toml_str).unwrap();

        assert_eq!(parsed.index.kind, IndexKind::Weaviate);
        assert_eq!(parsed.index.weaviate.url, "http://weaviate:8080");
        assert_eq!(parsed.index.dimension, 768);
    }
}
