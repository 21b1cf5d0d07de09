//! Provider catalog.
//!
//! The `ProviderRegistry` stores provider configurations in registration
//! order (index 0 = first registered). Order matters: the router breaks
//! score ties in favour of the earlier registration.

use crate::{HuginnError, Result};

use super::config::ProviderConfig;

/// Static, ordered catalog of provider configurations.
#[derive(Debug, Clone, Default)]
pub struct ProviderRegistry {
    providers: Vec<ProviderConfig>,
}

impl ProviderRegistry {
    /// Create a new empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a registry from configurations, in order.
    pub fn from_configs(configs: impl IntoIterator<Item = ProviderConfig>) -> Result<Self> {
        let mut registry = Self::new();
        for config in configs {
            registry.add(config)?;
        }
        Ok(registry)
    }

    /// Append a provider (lowest tie-break priority so far).
    ///
    /// Fails on a duplicate id.
    pub fn add(&mut self, mut config: ProviderConfig) -> Result<()> {
        if config.id.is_empty() {
            return Err(HuginnError::Configuration(
                "provider id must not be empty".into(),
            ));
        }
        if self.get(&config.id).is_some() {
            return Err(HuginnError::Configuration(format!(
                "duplicate provider id: {}",
                config.id
            )));
        }
        if config.name.is_empty() {
            config.name = config.id.clone();
        }
        self.providers.push(config);
        Ok(())
    }

    /// Look up a provider by id.
    pub fn get(&self, id: &str) -> Option<&ProviderConfig> {
        self.providers.iter().find(|p| p.id == id)
    }

    /// Iterate providers in registration order.
    pub fn iter(&self) -> impl Iterator<Item = &ProviderConfig> {
        self.providers.iter()
    }

    /// All providers in registration order.
    pub fn providers(&self) -> &[ProviderConfig] {
        &self.providers
    }

    /// Provider ids in registration order.
    pub fn ids(&self) -> Vec<&str> {
        self.providers.iter().map(|p| p.id.as_str()).collect()
    }

    pub fn len(&self) -> usize {
        self.providers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.providers.is_empty()
    }
}
