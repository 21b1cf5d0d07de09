//! Builder for configuring gateway instances

use std::sync::Arc;
use std::time::Duration;

use crate::cache::{CacheConfig, CacheStore, MemoryStore, ResponseCache, SimilarityConfig};
use crate::clock::{Clock, SystemClock};
use crate::config::Config;
use crate::providers::{CostLedger, HealthTable, ProviderClient, ProviderConfig, ProviderRegistry};
use crate::{HuginnError, Result};

use super::events::{EventSink, NoopEventSink};
use super::service::{Gateway, GatewayConfig};

/// Builder for [`Gateway`].
///
/// ```rust,ignore
/// let gateway = Gateway::builder()
///     .provider(ProviderConfig::new("openai", "gpt-4o").cost_per_1k_tokens(0.005))
///     .provider(ProviderConfig::new("anthropic", "claude-sonnet"))
///     .client(Arc::new(MyClient::new()))
///     .cache(CacheConfig::new().max_size(5_000))
///     .event_sink(Arc::new(TracingEventSink))
///     .build()?;
/// ```
pub struct GatewayBuilder {
    providers: Vec<ProviderConfig>,
    client: Option<Arc<dyn ProviderClient>>,
    cache_config: CacheConfig,
    similarity_config: SimilarityConfig,
    store: Option<Arc<dyn CacheStore>>,
    events: Option<Arc<dyn EventSink>>,
    clock: Option<Arc<dyn Clock>>,
    gateway_config: GatewayConfig,
}

impl GatewayBuilder {
    pub fn new() -> Self {
        Self {
            providers: Vec::new(),
            client: None,
            cache_config: CacheConfig::default(),
            similarity_config: SimilarityConfig::default(),
            store: None,
            events: None,
            clock: None,
            gateway_config: GatewayConfig::default(),
        }
    }

    /// Start from a loaded [`Config`]: providers, cache, similarity and
    /// gateway settings. The client, cache store and event sink still need
    /// to be supplied; see [`Config::cache_store`].
    pub fn from_config(config: &Config) -> Self {
        Self::new()
            .providers(config.providers.iter().cloned())
            .cache(config.cache_config())
            .similarity(config.similarity_config())
            .gateway(config.gateway_config())
    }

    /// Register a provider. Registration order breaks routing ties.
    pub fn provider(mut self, provider: ProviderConfig) -> Self {
        self.providers.push(provider);
        self
    }

    pub fn providers(mut self, providers: impl IntoIterator<Item = ProviderConfig>) -> Self {
        self.providers.extend(providers);
        self
    }

    /// The client that performs provider calls and health probes. Required.
    pub fn client(mut self, client: Arc<dyn ProviderClient>) -> Self {
        self.client = Some(client);
        self
    }

    pub fn cache(mut self, config: CacheConfig) -> Self {
        self.cache_config = config;
        self
    }

    pub fn similarity(mut self, config: SimilarityConfig) -> Self {
        self.similarity_config = config;
        self
    }

    /// Snapshot persistence for the cache (default: none).
    pub fn cache_store(mut self, store: Arc<dyn CacheStore>) -> Self {
        self.store = Some(store);
        self
    }

    /// Where request outcomes are reported (default: discarded).
    pub fn event_sink(mut self, sink: Arc<dyn EventSink>) -> Self {
        self.events = Some(sink);
        self
    }

    /// Time source for cache expiry and spend buckets (default: system).
    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    pub fn gateway(mut self, config: GatewayConfig) -> Self {
        self.gateway_config = config;
        self
    }

    pub fn health_check_interval(mut self, interval: Duration) -> Self {
        self.gateway_config.health_check_interval = interval;
        self
    }

    pub fn dispatch_interval(mut self, interval: Duration) -> Self {
        self.gateway_config.dispatch_interval = interval;
        self
    }

    pub fn max_in_flight(mut self, n: usize) -> Self {
        self.gateway_config.max_in_flight = n;
        self
    }

    /// Build the gateway.
    ///
    /// Fails if no client is set, a provider id is empty or repeated, or a
    /// setting is out of range.
    pub fn build(self) -> Result<Gateway> {
        let client = self.client.ok_or_else(|| {
            HuginnError::Configuration("no provider client configured".into())
        })?;
        self.gateway_config.validate()?;

        let registry = Arc::new(ProviderRegistry::from_configs(self.providers)?);
        let clock = self.clock.unwrap_or_else(|| Arc::new(SystemClock));
        let store = self.store.unwrap_or_else(|| Arc::new(MemoryStore));
        let cache = Arc::new(
            ResponseCache::new(self.cache_config, self.similarity_config)?
                .with_clock(Arc::clone(&clock))
                .with_store(store),
        );
        let ledger = Arc::new(CostLedger::new(Arc::clone(&clock)));
        let events = self.events.unwrap_or_else(|| Arc::new(NoopEventSink));

        Ok(Gateway::new(
            registry,
            client,
            cache,
            Arc::new(HealthTable::new()),
            ledger,
            events,
            clock,
            self.gateway_config,
        ))
    }
}

impl Default for GatewayBuilder {
    fn default() -> Self {
        Self::new()
    }
}
