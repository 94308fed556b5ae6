//! Configuration loader with inheritance support.
//!
//! Loads configuration from multiple sources and merges them:
//! 1. Global config: `~/.assetvec/config.toml`
//! 2. Local config: `.assetvec/config.toml` (in the working directory)
//! 3. An explicit file passed with `--config`
//! 4. CLI overrides
//!
//! Later sources override earlier ones.

use crate::error::ConfigError;
use crate::{
    AssetvecConfig, ConfigOverrides, EmbeddingConfig, FlatSettings, IndexConfig, LoggingConfig,
    PostgresSettings, QdrantSettings, SqliteSettings, WeaviateSettings,
};
use std::path::{Path, PathBuf};
use tracing::{debug, trace};

/// Configuration file name.
const CONFIG_FILE_NAME: &str = "config.toml";

/// Global and local configuration directory name.
const CONFIG_DIR: &str = ".assetvec";

/// Configuration loader with caching and inheritance support.
#[derive(Debug, Clone)]
pub struct ConfigLoader {
    /// Global config directory (e.g., `~/.assetvec`)
    global_config_dir: Option<PathBuf>,

    /// Cached global config
    global_config: Option<AssetvecConfig>,
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}

impl ConfigLoader {
    /// Create a new configuration loader.
    ///
    /// Automatically detects the global config directory (`~/.assetvec`).
    pub fn new() -> Self {
        Self {
            global_config_dir: dirs::home_dir().map(|h| h.join(CONFIG_DIR)),
            global_config: None,
        }
    }

    /// Create a loader with a custom global config directory.
    ///
    /// Useful for testing.
    pub fn with_global_dir(global_dir: impl Into<PathBuf>) -> Self {
        Self {
            global_config_dir: Some(global_dir.into()),
            global_config: None,
        }
    }

    /// Get the global config file path.
    pub fn global_config_path(&self) -> Option<PathBuf> {
        self.global_config_dir
            .as_ref()
            .map(|d| d.join(CONFIG_FILE_NAME))
    }

    /// Get the local config file path for a working directory.
    pub fn local_config_path(&self, workspace_root: &Path) -> PathBuf {
        workspace_root.join(CONFIG_DIR).join(CONFIG_FILE_NAME)
    }

    /// Load configuration with optional CLI overrides.
    ///
    /// Merges config in order: global → local → overrides.
    pub fn load(
        &mut self,
        workspace_root: &Path,
        overrides: Option<&ConfigOverrides>,
    ) -> Result<AssetvecConfig, ConfigError> {
        self.load_with_file(workspace_root, None, overrides)
    }

    /// Load configuration, layering an explicit file over the local one.
    ///
    /// Unlike the global and local files, an explicit file must exist.
    pub fn load_with_file(
        &mut self,
        workspace_root: &Path,
        explicit: Option<&Path>,
        overrides: Option<&ConfigOverrides>,
    ) -> Result<AssetvecConfig, ConfigError> {
        let mut config = AssetvecConfig::default();

        if let Some(global_config) = self.load_global()? {
            config = merge_configs(config, global_config);
        }

        if let Some(local_config) = self.load_local(workspace_root)? {
            config = merge_configs(config, local_config);
        }

        if let Some(path) = explicit {
            debug!("Loading config from {:?}", path);
            config = merge_configs(config, load_config_file(path)?);
        }

        if let Some(ovr) = overrides {
            config.apply_overrides(ovr);
        }

        Ok(config)
    }

    /// Load only the global configuration.
    pub fn load_global(&mut self) -> Result<Option<AssetvecConfig>, ConfigError> {
        if let Some(ref config) = self.global_config {
            return Ok(Some(config.clone()));
        }

        let Some(global_path) = self.global_config_path() else {
            debug!("No home directory found, skipping global config");
            return Ok(None);
        };

        if !global_path.exists() {
            trace!("Global config not found at {:?}", global_path);
            return Ok(None);
        }

        debug!("Loading global config from {:?}", global_path);
        let config = load_config_file(&global_path)?;
        self.global_config = Some(config.clone());

        Ok(Some(config))
    }

    /// Load only the local configuration for a working directory.
    pub fn load_local(&self, workspace_root: &Path) -> Result<Option<AssetvecConfig>, ConfigError> {
        let local_path = self.local_config_path(workspace_root);

        if !local_path.exists() {
            trace!("Local config not found at {:?}", local_path);
            return Ok(None);
        }

        debug!("Loading local config from {:?}", local_path);
        load_config_file(&local_path).map(Some)
    }

    /// Save configuration to the global config file.
    pub fn save_global(&self, config: &AssetvecConfig) -> Result<(), ConfigError> {
        let Some(global_path) = self.global_config_path() else {
            return Err(ConfigError::NoHomeDir);
        };

        save_config_file(&global_path, config)
    }

    /// Save configuration to the local config file.
    pub fn save_local(
        &self,
        workspace_root: &Path,
        config: &AssetvecConfig,
    ) -> Result<(), ConfigError> {
        let local_path = self.local_config_path(workspace_root);
        save_config_file(&local_path, config)
    }

    /// Initialize global configuration directory.
    ///
    /// Creates `~/.assetvec/config.toml` with default configuration.
    pub fn init_global(&self) -> Result<PathBuf, ConfigError> {
        let Some(ref global_dir) = self.global_config_dir else {
            return Err(ConfigError::NoHomeDir);
        };

        init_config_in(global_dir)
    }

    /// Initialize local configuration.
    ///
    /// Creates `.assetvec/config.toml` with default configuration.
    pub fn init_local(&self, workspace_root: &Path) -> Result<PathBuf, ConfigError> {
        init_config_in(&workspace_root.join(CONFIG_DIR))
    }

    /// Clear cached global configuration.
    ///
    /// Forces reload on next `load_global()` call.
    pub fn clear_cache(&mut self) {
        self.global_config = None;
    }
}

fn init_config_in(dir: &Path) -> Result<PathBuf, ConfigError> {
    if !dir.exists() {
        std::fs::create_dir_all(dir).map_err(|e| ConfigError::create_dir(dir, e))?;
    }

    let config_path = dir.join(CONFIG_FILE_NAME);
    if !config_path.exists() {
        save_config_file(&config_path, &AssetvecConfig::default())?;
    }

    Ok(config_path)
}

/// Load a configuration file from disk.
fn load_config_file(path: &Path) -> Result<AssetvecConfig, ConfigError> {
    let content = std::fs::read_to_string(path).map_err(|e| ConfigError::read_file(path, e))?;

    toml::from_str(&content).map_err(|e| ConfigError::parse_toml(path, e))
}

/// Save a configuration file to disk.
fn save_config_file(path: &Path, config: &AssetvecConfig) -> Result<(), ConfigError> {
    if let Some(parent) = path.parent() {
        if !parent.exists() {
            std::fs::create_dir_all(parent).map_err(|e| ConfigError::create_dir(parent, e))?;
        }
    }

    let content = toml::to_string_pretty(config)?;
    std::fs::write(path, content).map_err(|e| ConfigError::write_file(path, e))
}

/// Pick `overlay` unless it still holds the default value.
fn pick<T: PartialEq>(base: T, overlay: T, default: T) -> T {
    if overlay != default {
        overlay
    } else {
        base
    }
}

/// Merge two configurations, with `overlay` taking precedence.
///
/// This performs a field-by-field merge, allowing partial configs.
fn merge_configs(base: AssetvecConfig, overlay: AssetvecConfig) -> AssetvecConfig {
    AssetvecConfig {
        index: merge_index(base.index, overlay.index),
        embedding: merge_embedding(base.embedding, overlay.embedding),
        logging: merge_logging(base.logging, overlay.logging),
    }
}

fn merge_index(base: IndexConfig, overlay: IndexConfig) -> IndexConfig {
    let defaults = IndexConfig::default();
    IndexConfig {
        kind: pick(base.kind, overlay.kind, defaults.kind),
        dimension: pick(base.dimension, overlay.dimension, defaults.dimension),
        qdrant: merge_qdrant(base.qdrant, overlay.qdrant),
        weaviate: merge_weaviate(base.weaviate, overlay.weaviate),
        sqlite: merge_sqlite(base.sqlite, overlay.sqlite),
        postgres: merge_postgres(base.postgres, overlay.postgres),
        flat: merge_flat(base.flat, overlay.flat),
    }
}

fn merge_qdrant(base: QdrantSettings, overlay: QdrantSettings) -> QdrantSettings {
    let d = QdrantSettings::default();
    QdrantSettings {
        url: pick(base.url, overlay.url, d.url),
        api_key: overlay.api_key.or(base.api_key),
        collection: pick(base.collection, overlay.collection, d.collection),
        namespace_prefix: pick(
            base.namespace_prefix,
            overlay.namespace_prefix,
            d.namespace_prefix,
        ),
        timeout_secs: pick(base.timeout_secs, overlay.timeout_secs, d.timeout_secs),
    }
}

fn merge_weaviate(base: WeaviateSettings, overlay: WeaviateSettings) -> WeaviateSettings {
    let d = WeaviateSettings::default();
    WeaviateSettings {
        url: pick(base.url, overlay.url, d.url),
        api_key: overlay.api_key.or(base.api_key),
        class_prefix: pick(base.class_prefix, overlay.class_prefix, d.class_prefix),
        timeout_secs: pick(base.timeout_secs, overlay.timeout_secs, d.timeout_secs),
    }
}

fn merge_sqlite(base: SqliteSettings, overlay: SqliteSettings) -> SqliteSettings {
    let d = SqliteSettings::default();
    SqliteSettings {
        path: pick(base.path, overlay.path, d.path),
        collection_prefix: pick(
            base.collection_prefix,
            overlay.collection_prefix,
            d.collection_prefix,
        ),
    }
}

fn merge_postgres(base: PostgresSettings, overlay: PostgresSettings) -> PostgresSettings {
    let d = PostgresSettings::default();
    PostgresSettings {
        connection_string: overlay.connection_string.or(base.connection_string),
        table_prefix: pick(base.table_prefix, overlay.table_prefix, d.table_prefix),
    }
}

fn merge_flat(base: FlatSettings, overlay: FlatSettings) -> FlatSettings {
    let d = FlatSettings::default();
    FlatSettings {
        directory: pick(base.directory, overlay.directory, d.directory),
        file_prefix: pick(base.file_prefix, overlay.file_prefix, d.file_prefix),
    }
}

fn merge_embedding(base: EmbeddingConfig, overlay: EmbeddingConfig) -> EmbeddingConfig {
    let d = EmbeddingConfig::default();
    EmbeddingConfig {
        provider: pick(base.provider, overlay.provider, d.provider),
        // Overlay openai takes precedence if set
        openai: overlay.openai.or(base.openai),
        max_tags: pick(base.max_tags, overlay.max_tags, d.max_tags),
    }
}

fn merge_logging(base: LoggingConfig, overlay: LoggingConfig) -> LoggingConfig {
    let d = LoggingConfig::default();
    LoggingConfig {
        level: pick(base.level, overlay.level, d.level),
        format: pick(base.format, overlay.format, d.format),
    }
}
