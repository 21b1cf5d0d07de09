//! Configuration loading.
//!
//! Configuration is loaded from TOML files with the following resolution order:
//! 1. An explicit path (e.g. the CLI's `--config`)
//! 2. `~/.huginn/config.toml` (user)
//! 3. `/etc/huginn/config.toml` (system)
//!
//! ```toml
//! [cache]
//! max_size = 5000
//! default_ttl_ms = 1800000
//! storage_backend = "file"
//! storage_path = "/var/lib/huginn/cache.json"
//!
//! [similarity]
//! threshold = 0.9
//! algorithm = "jaccard"
//!
//! [gateway]
//! health_check_interval_ms = 30000
//!
//! [[providers]]
//! id = "openai-gpt4o"
//! model = "gpt-4o"
//! cost_per_1k_tokens = 0.005
//! ```
//!
//! Every section is optional; missing keys take the defaults of
//! [`CacheConfig`], [`SimilarityConfig`] and [`GatewayConfig`].

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use serde::Deserialize;

use crate::cache::{CacheConfig, CacheStore, FileStore, MemoryStore, SimilarityConfig};
use crate::gateway::GatewayConfig;
use crate::providers::{ProviderConfig, ProviderRegistry};
use crate::similarity::SimilarityAlgorithm;
use crate::{HuginnError, Result};

/// Top-level configuration file.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub cache: CacheSection,
    #[serde(default)]
    pub similarity: SimilaritySection,
    #[serde(default)]
    pub gateway: GatewaySection,
    #[serde(default)]
    pub providers: Vec<ProviderConfig>,
}

/// Where cache snapshots are persisted.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    #[default]
    Memory,
    File,
    Redis,
}

/// `[cache]` section.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CacheSection {
    pub max_size: usize,
    pub default_ttl_ms: u64,
    /// Lossy truncation of long content.
    #[serde(alias = "compression_enabled")]
    pub truncate_content: bool,
    pub truncate_threshold: usize,
    pub semantic_similarity: bool,
    pub adaptive_ttl: bool,
    pub adaptive_ttl_threshold: u64,
    pub adaptive_ttl_multiplier: f64,
    pub max_ttl_ms: u64,
    pub sweep_interval_ms: u64,
    pub storage_backend: StorageBackend,
    /// Snapshot file for the `file` backend. Default:
    /// `<cache dir>/huginn/cache.json`.
    pub storage_path: Option<PathBuf>,
    pub redis_url: Option<String>,
    pub redis_key: String,
}

impl Default for CacheSection {
    fn default() -> Self {
        let defaults = CacheConfig::default();
        Self {
            max_size: defaults.max_size,
            default_ttl_ms: defaults.default_ttl.as_millis() as u64,
            truncate_content: defaults.truncate_content,
            truncate_threshold: defaults.truncate_threshold,
            semantic_similarity: defaults.semantic_similarity,
            adaptive_ttl: defaults.adaptive_ttl,
            adaptive_ttl_threshold: defaults.adaptive_ttl_threshold,
            adaptive_ttl_multiplier: defaults.adaptive_ttl_multiplier,
            max_ttl_ms: defaults.max_ttl.as_millis() as u64,
            sweep_interval_ms: defaults.sweep_interval.as_millis() as u64,
            storage_backend: StorageBackend::default(),
            storage_path: None,
            redis_url: None,
            redis_key: "huginn:cache".to_string(),
        }
    }
}

/// `[similarity]` section.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SimilaritySection {
    pub threshold: f64,
    pub algorithm: SimilarityAlgorithm,
}

impl Default for SimilaritySection {
    fn default() -> Self {
        let defaults = SimilarityConfig::default();
        Self {
            threshold: defaults.threshold,
            algorithm: defaults.algorithm,
        }
    }
}

/// `[gateway]` section.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct GatewaySection {
    pub health_check_interval_ms: u64,
    pub dispatch_interval_ms: u64,
    pub max_in_flight: usize,
}

impl Default for GatewaySection {
    fn default() -> Self {
        let defaults = GatewayConfig::default();
        Self {
            health_check_interval_ms: defaults.health_check_interval.as_millis() as u64,
            dispatch_interval_ms: defaults.dispatch_interval.as_millis() as u64,
            max_in_flight: defaults.max_in_flight,
        }
    }
}

impl Config {
    /// Load configuration from the standard locations.
    ///
    /// Resolution order:
    /// 1. Explicit path (if provided)
    /// 2. `~/.huginn/config.toml`
    /// 3. `/etc/huginn/config.toml`
    pub fn load(explicit_path: Option<&Path>) -> Result<Self> {
        let path = Self::resolve_config_path(explicit_path)?;
        let content = fs::read_to_string(&path).map_err(|e| {
            HuginnError::Configuration(format!("Failed to read config file {path:?}: {e}"))
        })?;
        Self::from_toml(&content).map_err(|e| match e {
            HuginnError::Configuration(msg) => {
                HuginnError::Configuration(format!("{}: {msg}", path.display()))
            }
            other => other,
        })
    }

    /// Parse and validate a TOML document.
    pub fn from_toml(content: &str) -> Result<Self> {
        let config: Config = toml::from_str(content)
            .map_err(|e| HuginnError::Configuration(format!("Failed to parse config: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    /// Resolve the config file path.
    fn resolve_config_path(explicit: Option<&Path>) -> Result<PathBuf> {
        if let Some(path) = explicit {
            if path.exists() {
                return Ok(path.to_path_buf());
            }
            return Err(HuginnError::Configuration(format!(
                "Config file not found: {path:?}"
            )));
        }

        // User config
        if let Some(home) = dirs::home_dir() {
            let user_config = home.join(".huginn").join("config.toml");
            if user_config.exists() {
                return Ok(user_config);
            }
        }

        // System config
        let system_config = PathBuf::from("/etc/huginn/config.toml");
        if system_config.exists() {
            return Ok(system_config);
        }

        Err(HuginnError::Configuration(
            "No config file found. Create ~/.huginn/config.toml or /etc/huginn/config.toml"
                .to_string(),
        ))
    }

    /// Check every section and the provider catalog.
    pub fn validate(&self) -> Result<()> {
        self.cache_config().validate()?;
        self.similarity_config().validate()?;
        self.gateway_config().validate()?;
        ProviderRegistry::from_configs(self.providers.iter().cloned())?;
        for provider in &self.providers {
            if provider.timeout_ms == 0 {
                return Err(HuginnError::Configuration(format!(
                    "provider '{}': timeout_ms must be positive",
                    provider.id
                )));
            }
            if provider.cost_per_1k_tokens < 0.0 {
                return Err(HuginnError::Configuration(format!(
                    "provider '{}': cost_per_1k_tokens must not be negative",
                    provider.id
                )));
            }
        }
        if self.cache.storage_backend == StorageBackend::Redis && self.cache.redis_url.is_none() {
            return Err(HuginnError::Configuration(
                "cache: storage_backend = \"redis\" requires redis_url".into(),
            ));
        }
        Ok(())
    }

    pub fn cache_config(&self) -> CacheConfig {
        let c = &self.cache;
        CacheConfig {
            max_size: c.max_size,
            default_ttl: Duration::from_millis(c.default_ttl_ms),
            truncate_content: c.truncate_content,
            truncate_threshold: c.truncate_threshold,
            semantic_similarity: c.semantic_similarity,
            adaptive_ttl: c.adaptive_ttl,
            adaptive_ttl_threshold: c.adaptive_ttl_threshold,
            adaptive_ttl_multiplier: c.adaptive_ttl_multiplier,
            max_ttl: Duration::from_millis(c.max_ttl_ms),
            sweep_interval: Duration::from_millis(c.sweep_interval_ms),
            ..CacheConfig::default()
        }
    }

    pub fn similarity_config(&self) -> SimilarityConfig {
        SimilarityConfig::new()
            .threshold(self.similarity.threshold)
            .algorithm(self.similarity.algorithm)
    }

    pub fn gateway_config(&self) -> GatewayConfig {
        GatewayConfig::new()
            .health_check_interval(Duration::from_millis(self.gateway.health_check_interval_ms))
            .dispatch_interval(Duration::from_millis(self.gateway.dispatch_interval_ms))
            .max_in_flight(self.gateway.max_in_flight)
    }

    /// Snapshot file used by the `file` backend.
    pub fn storage_path(&self) -> PathBuf {
        self.cache.storage_path.clone().unwrap_or_else(|| {
            dirs::cache_dir()
                .unwrap_or_else(|| PathBuf::from(".cache"))
                .join("huginn")
                .join("cache.json")
        })
    }

    /// Open the configured cache store. Connects when the backend is redis.
    pub async fn cache_store(&self) -> Result<Arc<dyn CacheStore>> {
        match self.cache.storage_backend {
            StorageBackend::Memory => Ok(Arc::new(MemoryStore)),
            StorageBackend::File => Ok(Arc::new(FileStore::new(self.storage_path()))),
            StorageBackend::Redis => self.redis_store().await,
        }
    }

    #[cfg(feature = "redis")]
    async fn redis_store(&self) -> Result<Arc<dyn CacheStore>> {
        let url = self.cache.redis_url.as_deref().ok_or_else(|| {
            HuginnError::Configuration("cache: redis backend requires redis_url".into())
        })?;
        let store = crate::cache::RedisStore::connect(url, self.cache.redis_key.clone()).await?;
        Ok(Arc::new(store))
    }

    #[cfg(not(feature = "redis"))]
    async fn redis_store(&self) -> Result<Arc<dyn CacheStore>> {
        Err(HuginnError::Configuration(
            "cache: redis backend requires the `redis` feature".into(),
        ))
    }
}
