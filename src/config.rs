//! Configuration module for the event index.
//!
//! This module provides a layered configuration system that supports:
//! - Default values
//! - TOML configuration file
//! - Environment variable overrides
//! - CLI argument overrides
//!
//! # Environment Variables
//!
//! Environment variables must be prefixed with `EVENTDEX_` and use double
//! underscores to separate nested levels:
//! - `EVENTDEX_REFRESH__INTERVAL_SECS=60` sets `refresh.interval_secs`
//! - `EVENTDEX_SEARCH__TOP_K=5` sets `search.top_k`
//! - `EVENTDEX_EMBEDDING__BACKEND=hash` sets `embedding.backend`

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

const CONFIG_DIR: &str = ".eventdex";
const CONFIG_FILE: &str = "settings.toml";
const ENV_PREFIX: &str = "EVENTDEX_";

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct Settings {
    /// Version of the configuration schema
    #[serde(default = "default_version")]
    pub version: u32,

    #[serde(default)]
    pub index: IndexConfig,

    #[serde(default)]
    pub embedding: EmbeddingConfig,

    #[serde(default)]
    pub refresh: RefreshConfig,

    #[serde(default)]
    pub search: SearchConfig,

    #[serde(default)]
    pub catalog: CatalogConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct IndexConfig {
    /// Directory holding the persisted snapshot
    #[serde(default = "default_index_path")]
    pub path: PathBuf,

    /// Write every published snapshot to disk and warm-start from it
    #[serde(default = "default_true")]
    pub persist: bool,
}

#[derive(Debug, Deserialize, Serialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum EmbeddingBackend {
    Fastembed,
    Hash,
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct EmbeddingConfig {
    #[serde(default = "default_backend")]
    pub backend: EmbeddingBackend,

    /// fastembed model name
    #[serde(default = "default_embedding_model")]
    pub model: String,

    /// Where downloaded models are cached
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cache_dir: Option<PathBuf>,

    /// Output dimension of the hash backend
    #[serde(default = "default_dimension")]
    pub dimension: usize,
}

/// What a refresh does when the catalog returns no records.
#[derive(Debug, Deserialize, Serialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum EmptyCatalogPolicy {
    /// Index the bundled sample events instead
    Fallback,
    /// Publish an empty snapshot; the catalog is the truth
    PublishEmpty,
    /// Keep serving the current snapshot
    KeepPrevious,
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct RefreshConfig {
    /// Seconds between scheduled refreshes (default: 30 minutes)
    #[serde(default = "default_interval_secs")]
    pub interval_secs: u64,

    /// Upper bound for one refresh, after which it fails and releases
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// Run a refresh as soon as the scheduler starts
    #[serde(default = "default_true")]
    pub refresh_on_start: bool,

    #[serde(default = "default_empty_catalog")]
    pub empty_catalog: EmptyCatalogPolicy,
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct SearchConfig {
    /// Results returned per query
    #[serde(default = "default_top_k")]
    pub top_k: usize,

    /// Turn free/paid, location and category hints in the query into filters
    #[serde(default)]
    pub extract_filters: bool,

    /// Also restrict results to the start date named by "today", "tomorrow",
    /// "this weekend" or "next week". Only used with `extract_filters`.
    #[serde(default)]
    pub filter_by_date: bool,

    /// Drop hits scoring below this similarity
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_score: Option<f32>,
}

#[derive(Debug, Deserialize, Serialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum CatalogKind {
    /// The bundled sample events
    Sample,
    /// A JSON array of events on disk
    JsonFile,
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct CatalogConfig {
    #[serde(default = "default_catalog_kind")]
    pub kind: CatalogKind,

    /// Path of the JSON catalog when `kind = "json_file"`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<PathBuf>,
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct LoggingConfig {
    /// Default filter directive; `RUST_LOG` takes precedence
    #[serde(default = "default_log_level")]
    pub level: String,
}

// Default value functions
fn default_version() -> u32 {
    1
}
fn default_index_path() -> PathBuf {
    PathBuf::from(".eventdex/index")
}
fn default_true() -> bool {
    true
}
fn default_backend() -> EmbeddingBackend {
    EmbeddingBackend::Fastembed
}
fn default_embedding_model() -> String {
    "AllMiniLML6V2".to_string()
}
fn default_dimension() -> usize {
    crate::vector::VECTOR_DIMENSION_384
}
fn default_interval_secs() -> u64 {
    30 * 60
}
fn default_timeout_secs() -> u64 {
    300
}
fn default_empty_catalog() -> EmptyCatalogPolicy {
    EmptyCatalogPolicy::Fallback
}
fn default_top_k() -> usize {
    crate::vector::DEFAULT_TOP_K
}
fn default_catalog_kind() -> CatalogKind {
    CatalogKind::Sample
}
fn default_log_level() -> String {
    "info".to_string()
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            version: default_version(),
            index: IndexConfig::default(),
            embedding: EmbeddingConfig::default(),
            refresh: RefreshConfig::default(),
            search: SearchConfig::default(),
            catalog: CatalogConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            path: default_index_path(),
            persist: true,
        }
    }
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            backend: default_backend(),
            model: default_embedding_model(),
            cache_dir: None,
            dimension: default_dimension(),
        }
    }
}

impl Default for RefreshConfig {
    fn default() -> Self {
        Self {
            interval_secs: default_interval_secs(),
            timeout_secs: default_timeout_secs(),
            refresh_on_start: true,
            empty_catalog: default_empty_catalog(),
        }
    }
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            top_k: default_top_k(),
            extract_filters: false,
            filter_by_date: false,
            min_score: None,
        }
    }
}

impl Default for CatalogConfig {
    fn default() -> Self {
        Self {
            kind: default_catalog_kind(),
            path: None,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

impl RefreshConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl Settings {
    /// Load configuration from all sources
    pub fn load() -> Result<Self, Box<figment::Error>> {
        let config_path = Self::find_workspace_config()
            .unwrap_or_else(|| PathBuf::from(CONFIG_DIR).join(CONFIG_FILE));
        Self::load_from(config_path)
    }

    /// Load configuration from a specific file, still honouring env overrides
    pub fn load_from(path: impl AsRef<Path>) -> Result<Self, Box<figment::Error>> {
        Figment::new()
            .merge(Serialized::defaults(Settings::default()))
            .merge(Toml::file(path.as_ref()))
            // Double underscore (__) separates nested levels
            .merge(Env::prefixed(ENV_PREFIX).map(|key| {
                key.as_str().to_lowercase().replace("__", ".").into()
            }))
            .extract()
            .map_err(Box::new)
    }

    /// Find `.eventdex/settings.toml` from the current directory up to root
    fn find_workspace_config() -> Option<PathBuf> {
        let current = std::env::current_dir().ok()?;

        for ancestor in current.ancestors() {
            let config_dir = ancestor.join(CONFIG_DIR);
            if config_dir.is_dir() {
                return Some(config_dir.join(CONFIG_FILE));
            }
        }

        None
    }

    /// Reject values that would make the service misbehave at runtime
    pub fn validate(&self) -> Result<(), String> {
        if self.search.top_k == 0 {
            return Err("search.top_k must be at least 1".to_string());
        }
        if self.refresh.interval_secs == 0 {
            return Err("refresh.interval_secs must be greater than 0".to_string());
        }
        if self.refresh.timeout_secs == 0 {
            return Err("refresh.timeout_secs must be greater than 0".to_string());
        }
        if self.embedding.dimension == 0 {
            return Err("embedding.dimension must be greater than 0".to_string());
        }
        if self.catalog.kind == CatalogKind::JsonFile && self.catalog.path.is_none() {
            return Err("catalog.path is required when catalog.kind = \"json_file\"".to_string());
        }
        if let Some(min) = self.search.min_score {
            if !(-1.0..=1.0).contains(&min) {
                return Err(format!("search.min_score must be within [-1, 1], got {min}"));
            }
        }
        Ok(())
    }

    /// Save current configuration to file
    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), Box<dyn std::error::Error>> {
        let parent = path.as_ref().parent().ok_or("Invalid path")?;
        std::fs::create_dir_all(parent)?;

        let toml_string = toml::to_string_pretty(self)?;
        std::fs::write(path, toml_string)?;

        Ok(())
    }

    /// Create a default settings file with helpful comments
    pub fn init_config_file(force: bool) -> Result<PathBuf, Box<dyn std::error::Error>> {
        let config_path = PathBuf::from(CONFIG_DIR).join(CONFIG_FILE);

        if !force && config_path.exists() {
            return Err("Configuration file already exists. Use --force to overwrite".into());
        }

        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        std::fs::write(&config_path, CONFIG_TEMPLATE)?;
        Ok(config_path)
    }
}

const CONFIG_TEMPLATE: &str = r#"# eventdex configuration

# Version of the configuration schema
version = 1

[index]
# Directory holding the persisted snapshot
path = ".eventdex/index"

# Persist every published snapshot and warm-start from it
persist = true

[embedding]
# "fastembed" (semantic, downloads the model once) or "hash" (lexical, offline)
backend = "fastembed"

# fastembed model name
model = "AllMiniLML6V2"

# Output dimension of the hash backend
dimension = 384

[refresh]
# Seconds between scheduled refreshes (30 minutes)
interval_secs = 1800

# A refresh running longer than this fails and releases the running state
timeout_secs = 300

# Refresh immediately when the scheduler starts
refresh_on_start = true

# When the catalog is empty: "fallback" (index sample events),
# "publish_empty", or "keep_previous"
empty_catalog = "fallback"

[search]
# Results returned per query
top_k = 10

# Turn free/paid, "in <place>" and category words in queries into hard
# filters. Off by default: a title containing those words would filter
# itself out.
extract_filters = false

# With extract_filters, also keep only events starting on the date named by
# "today", "tomorrow", "this weekend" or "next week"
filter_by_date = false

[catalog]
# "sample" or "json_file"
kind = "sample"
# path = "events.json"

[logging]
# Overridden by RUST_LOG when set
level = "info"
"#;
