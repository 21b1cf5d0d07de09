//! Tests for TOML configuration loading and building a gateway from it.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use huginn::config::{Config, StorageBackend};
use huginn::{
    GatewayBuilder, GenerationRequest, HuginnError, ProviderClient, ProviderConfig, RequestType,
    Response, Result, SimilarityAlgorithm,
};

const FULL: &str = r#"
[cache]
max_size = 250
default_ttl_ms = 600000
max_ttl_ms = 7200000
semantic_similarity = false
storage_backend = "file"

[similarity]
threshold = 0.9
algorithm = "levenshtein"

[gateway]
health_check_interval_ms = 10000
dispatch_interval_ms = 50
max_in_flight = 8

[[providers]]
id = "openai"
model = "gpt-4o"
cost_per_1k_tokens = 0.005
timeout_ms = 20000

[providers.capabilities.gpt-4o]
logic = 85
analysis = 90

[providers.cost_limit]
max_daily_cost = 25.0
max_monthly_cost = 500.0

[providers.rate_limit]
requests_per_minute = 600

[[providers]]
id = "local"
model = "llama-3"
"#;

#[test]
fn full_document_maps_onto_runtime_configs() {
    let config = Config::from_toml(FULL).unwrap();

    let cache = config.cache_config();
    assert_eq!(cache.max_size, 250);
    assert_eq!(cache.default_ttl, Duration::from_secs(600));
    assert_eq!(cache.max_ttl, Duration::from_secs(7200));
    assert!(!cache.semantic_similarity);
    assert!(cache.adaptive_ttl, "unset keys keep defaults");
    assert_eq!(config.cache.storage_backend, StorageBackend::File);

    let similarity = config.similarity_config();
    assert_eq!(similarity.threshold, 0.9);
    assert_eq!(similarity.algorithm, SimilarityAlgorithm::Levenshtein);

    let gateway = config.gateway_config();
    assert_eq!(gateway.health_check_interval, Duration::from_secs(10));
    assert_eq!(gateway.dispatch_interval, Duration::from_millis(50));
    assert_eq!(gateway.max_in_flight, 8);

    let openai = &config.providers[0];
    assert_eq!(openai.capability(RequestType::Analysis), 90);
    assert_eq!(openai.capability(RequestType::Narrative), 50);
    assert_eq!(openai.cost_limit.max_daily_cost, 25.0);
    assert_eq!(openai.rate_limit.requests_per_minute, Some(600));
    assert_eq!(openai.timeout_ms, 20_000);

    let local = &config.providers[1];
    assert_eq!(local.cost_per_1k_tokens, 0.0);
    assert!(local.cost_limit.max_monthly_cost.is_infinite());
}

#[test]
fn load_reads_explicit_path() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("huginn.toml");
    std::fs::write(&path, FULL).unwrap();

    let config = Config::load(Some(&path)).unwrap();
    assert_eq!(config.providers.len(), 2);
}

#[test]
fn load_reports_path_of_invalid_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("broken.toml");
    std::fs::write(&path, "[cache]\nmax_size = 0\n").unwrap();

    let err = Config::load(Some(&path)).unwrap_err();
    assert!(err.to_string().contains("broken.toml"), "{err}");
}

#[test]
fn rejects_duplicate_provider_ids() {
    let doc = r#"
        [[providers]]
        id = "a"
        model = "m1"

        [[providers]]
        id = "a"
        model = "m2"
    "#;
    let err = Config::from_toml(doc).unwrap_err();
    assert!(err.to_string().contains("duplicate"), "{err}");
}

#[test]
fn rejects_negative_cost_and_zero_timeout() {
    let negative = "[[providers]]\nid = \"a\"\nmodel = \"m\"\ncost_per_1k_tokens = -1.0\n";
    assert!(Config::from_toml(negative).is_err());

    let zero = "[[providers]]\nid = \"a\"\nmodel = \"m\"\ntimeout_ms = 0\n";
    assert!(Config::from_toml(zero).is_err());
}

#[test]
fn rejects_malformed_toml() {
    let err = Config::from_toml("[cache\nmax_size = ").unwrap_err();
    assert!(matches!(err, HuginnError::Configuration(_)));
}

#[tokio::test]
async fn file_backend_store_uses_configured_path() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("snap.json");
    let doc = format!(
        "[cache]\nstorage_backend = \"file\"\nstorage_path = {:?}\n",
        path.display().to_string()
    );
    let config = Config::from_toml(&doc).unwrap();

    assert_eq!(config.storage_path(), path);
    let store = config.cache_store().await.unwrap();
    assert_eq!(store.name(), "file");
    assert!(store.is_durable());
}

#[tokio::test]
async fn memory_backend_is_the_default() {
    let config = Config::from_toml("").unwrap();
    let store = config.cache_store().await.unwrap();
    assert!(!store.is_durable());
}

struct Echo;

#[async_trait]
impl ProviderClient for Echo {
    async fn invoke(&self, _provider: &ProviderConfig, request: &GenerationRequest) -> Result<Response> {
        Ok(Response {
            content: request.prompt.clone(),
            ..Default::default()
        })
    }
}

#[tokio::test]
async fn gateway_builds_from_config() {
    let config = Config::from_toml(FULL).unwrap();
    let gw = GatewayBuilder::from_config(&config)
        .client(Arc::new(Echo))
        .cache_store(config.cache_store().await.unwrap())
        .build()
        .unwrap();

    assert_eq!(gw.registry().ids(), ["openai", "local"]);
    assert_eq!(gw.cache().config().max_size, 250);

    let request = GenerationRequest::new(RequestType::Analysis, "which provider?");
    let chosen = gw.router().select_provider(&request).unwrap();
    assert_eq!(chosen.id, "openai");
}
