//! Tests for [`ResponseCache`]: exact and fuzzy lookup, adaptive ttl,
//! expiry, scored eviction and snapshot persistence.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::{TimeZone, Utc};
use serde_json::Value;

use huginn::cache::{CacheConfig, FileStore, ResponseCache, SimilarityConfig, TRUNCATION_MARKER};
use huginn::{HuginnError, ManualClock, RequestType, Response, SimilarityAlgorithm, Usage};

fn clock() -> Arc<ManualClock> {
    Arc::new(ManualClock::new(
        Utc.with_ymd_and_hms(2026, 5, 4, 9, 0, 0).unwrap(),
    ))
}

fn cache_with(config: CacheConfig, clock: &Arc<ManualClock>) -> ResponseCache {
    ResponseCache::new(config, SimilarityConfig::default())
        .unwrap()
        .with_clock(clock.clone())
}

fn response(content: &str) -> Response {
    Response {
        content: content.into(),
        usage: Usage::new(10, 20),
        cost: 0.003,
        model: "model-x".into(),
        ..Default::default()
    }
}

fn no_context() -> BTreeMap<String, Value> {
    BTreeMap::new()
}

fn context(key: &str, value: i64) -> BTreeMap<String, Value> {
    BTreeMap::from([(key.to_string(), Value::from(value))])
}

// =========================================================================
// Exact lookup
// =========================================================================

#[test]
fn exact_hit_returns_stored_content() {
    let clock = clock();
    let cache = cache_with(CacheConfig::new(), &clock);
    let ctx = context("level", 1);

    cache.set("alpha", &ctx, RequestType::Logic, &response("first"));
    let entry = cache.get("alpha", &ctx).expect("exact hit");

    assert_eq!(entry.content, "first");
    assert_eq!(entry.access_count, 1);
    assert_eq!(entry.metadata.request_type, RequestType::Logic);
    assert!(entry.metadata.context_hash.is_some());
    assert!(entry.metadata.similarity.is_none());
    assert_eq!(cache.stats().semantic_matches, 0);
}

#[test]
fn set_with_same_key_replaces_entry() {
    let clock = clock();
    let cache = cache_with(CacheConfig::new(), &clock);

    cache.set("alpha", &no_context(), RequestType::Logic, &response("one"));
    cache.set("alpha", &no_context(), RequestType::Logic, &response("two"));

    assert_eq!(cache.len(), 1);
    assert_eq!(cache.get("alpha", &no_context()).unwrap().content, "two");
}

#[test]
fn context_key_order_does_not_matter() {
    let clock = clock();
    let cache = cache_with(CacheConfig::new().semantic_similarity(false), &clock);

    let mut a = BTreeMap::new();
    a.insert("x".to_string(), Value::from(1));
    a.insert("y".to_string(), Value::from(2));
    let mut b = BTreeMap::new();
    b.insert("y".to_string(), Value::from(2));
    b.insert("x".to_string(), Value::from(1));

    cache.set("alpha", &a, RequestType::Analysis, &response("r"));
    assert!(cache.get("alpha", &b).is_some());
}

#[test]
fn different_context_misses_without_semantic_matching() {
    let clock = clock();
    let cache = cache_with(CacheConfig::new().semantic_similarity(false), &clock);

    cache.set("alpha", &context("user", 1), RequestType::Logic, &response("r"));
    assert!(cache.get("alpha", &context("user", 2)).is_none());

    let stats = cache.stats();
    assert_eq!((stats.hits, stats.misses), (0, 1));
}

#[test]
fn prompt_ending_in_json_does_not_collide_with_context() {
    let clock = clock();
    let cache = cache_with(CacheConfig::new().semantic_similarity(false), &clock);
    let ctx = BTreeMap::from([("user".to_string(), Value::from("alice"))]);
    let glued = format!("summarize{}", serde_json::to_string(&ctx).unwrap());

    cache.set("summarize", &ctx, RequestType::Analysis, &response("for alice"));
    assert!(cache.get(&glued, &no_context()).is_none());

    cache.set(&glued, &no_context(), RequestType::Analysis, &response("literal"));
    assert_eq!(cache.len(), 2);
    assert_eq!(cache.get("summarize", &ctx).unwrap().content, "for alice");
    assert_eq!(cache.get(&glued, &no_context()).unwrap().content, "literal");
}

#[test]
fn constructor_rejects_invalid_config() {
    let short_cap = CacheConfig::new()
        .default_ttl(Duration::from_secs(600))
        .adaptive_ttl_policy(3, 2.0, Duration::from_secs(60));
    assert!(matches!(
        ResponseCache::new(short_cap, SimilarityConfig::default()),
        Err(HuginnError::Configuration(_))
    ));
    assert!(ResponseCache::new(CacheConfig::new(), SimilarityConfig::new().threshold(1.5)).is_err());
}

// =========================================================================
// Fuzzy lookup
// =========================================================================

#[test]
fn same_normalized_prompt_is_a_perfect_fuzzy_hit() {
    let clock = clock();
    let cache = cache_with(CacheConfig::new(), &clock);

    cache.set("Hello, World!", &no_context(), RequestType::Creation, &response("r"));
    let entry = cache.get("hello world", &no_context()).expect("fuzzy hit");

    assert_eq!(entry.metadata.similarity, Some(1.0));
    assert_eq!(cache.stats().semantic_matches, 1);
}

#[test]
fn fuzzy_matching_ignores_context() {
    let clock = clock();
    let cache = cache_with(CacheConfig::new(), &clock);

    cache.set("alpha", &context("user", 1), RequestType::Logic, &response("r"));
    let entry = cache.get("alpha", &context("user", 2)).expect("fuzzy hit");
    assert_eq!(entry.metadata.similarity, Some(1.0));
}

#[test]
fn similar_prompt_hits_above_threshold() {
    let clock = clock();
    let cache = cache_with(CacheConfig::new(), &clock);

    cache.set(
        "tell me a story about a dragon",
        &no_context(),
        RequestType::Narrative,
        &response("once upon a time"),
    );
    let entry = cache
        .get("A dragon story, please!", &no_context())
        .expect("semantic hit");

    assert_eq!(entry.content, "once upon a time");
    assert!(entry.metadata.similarity.unwrap() > 0.99);
    let stats = cache.stats();
    assert_eq!((stats.hits, stats.semantic_matches, stats.misses), (1, 1, 0));
}

#[test]
fn dissimilar_prompt_misses() {
    let clock = clock();
    let cache = cache_with(CacheConfig::new(), &clock);

    cache.set("dragon story", &no_context(), RequestType::Narrative, &response("r"));
    assert!(cache.get("solve this logic puzzle", &no_context()).is_none());
}

#[test]
fn semantic_matching_can_be_disabled() {
    let clock = clock();
    let cache = cache_with(CacheConfig::new().semantic_similarity(false), &clock);

    cache.set("Hello, World!", &no_context(), RequestType::Creation, &response("r"));
    assert!(cache.get("hello world", &no_context()).is_none());
}

#[test]
fn fuzzy_tie_goes_to_newest_entry() {
    let clock = clock();
    let cache = ResponseCache::new(
        CacheConfig::new(),
        SimilarityConfig::new()
            .algorithm(SimilarityAlgorithm::Jaccard)
            .threshold(0.3),
    )
    .unwrap()
    .with_clock(clock.clone());

    cache.set("red green", &no_context(), RequestType::Creation, &response("older"));
    clock.advance(Duration::from_secs(1));
    cache.set("red blue", &no_context(), RequestType::Creation, &response("newer"));

    // both candidates score 1/3
    let hit = cache.get("red yellow", &no_context()).expect("fuzzy hit");
    assert_eq!(hit.content, "newer");
}

#[test]
fn expired_entries_are_not_fuzzy_candidates() {
    let clock = clock();
    let cache = cache_with(
        CacheConfig::new().default_ttl(Duration::from_secs(10)),
        &clock,
    );

    cache.set("Hello, World!", &no_context(), RequestType::Creation, &response("r"));
    clock.advance(Duration::from_secs(11));
    assert!(cache.get("hello world", &no_context()).is_none());
}

// =========================================================================
// Expiry
// =========================================================================

#[test]
fn entry_expires_after_ttl() {
    let clock = clock();
    let cache = cache_with(
        CacheConfig::new().default_ttl(Duration::from_secs(1)),
        &clock,
    );
    cache.set("alpha", &no_context(), RequestType::Logic, &response("r"));

    clock.advance(Duration::from_millis(1000));
    assert!(cache.get("alpha", &no_context()).is_some(), "age == ttl is live");

    clock.advance(Duration::from_millis(1));
    assert!(cache.get("alpha", &no_context()).is_none());
    assert!(cache.is_empty());
    assert_eq!(cache.stats().evictions, 1);
}

#[test]
fn sweep_removes_only_expired_entries() {
    let clock = clock();
    let cache = cache_with(
        CacheConfig::new().default_ttl(Duration::from_secs(60)),
        &clock,
    );
    cache.set("alpha", &no_context(), RequestType::Logic, &response("r"));
    clock.advance(Duration::from_secs(45));
    cache.set("bravo", &no_context(), RequestType::Logic, &response("r"));
    clock.advance(Duration::from_secs(30));

    assert_eq!(cache.sweep(), 1);
    assert_eq!(cache.len(), 1);
    assert!(cache.get("bravo", &no_context()).is_some());
}

// =========================================================================
// Adaptive ttl
// =========================================================================

#[test]
fn ttl_grows_once_hits_pass_threshold() {
    let clock = clock();
    let cache = cache_with(CacheConfig::new(), &clock);
    cache.set("alpha", &no_context(), RequestType::Logic, &response("r"));

    for _ in 0..5 {
        let entry = cache.get("alpha", &no_context()).unwrap();
        assert_eq!(entry.ttl(), Duration::from_secs(3600));
    }
    let entry = cache.get("alpha", &no_context()).unwrap();
    assert_eq!(entry.access_count, 6);
    assert_eq!(entry.ttl(), Duration::from_secs(5400));
}

#[test]
fn ttl_growth_is_capped() {
    let clock = clock();
    let cache = cache_with(
        CacheConfig::new().adaptive_ttl_policy(1, 3.0, Duration::from_secs(2 * 3600)),
        &clock,
    );
    cache.set("alpha", &no_context(), RequestType::Logic, &response("r"));

    cache.get("alpha", &no_context());
    let entry = cache.get("alpha", &no_context()).unwrap();
    assert_eq!(entry.ttl(), Duration::from_secs(2 * 3600));

    let entry = cache.get("alpha", &no_context()).unwrap();
    assert_eq!(entry.ttl(), Duration::from_secs(2 * 3600));
}

#[test]
fn ttl_is_fixed_when_adaptive_ttl_is_off() {
    let clock = clock();
    let cache = cache_with(CacheConfig::new().adaptive_ttl(false), &clock);
    cache.set("alpha", &no_context(), RequestType::Logic, &response("r"));

    let mut last = None;
    for _ in 0..10 {
        last = cache.get("alpha", &no_context());
    }
    assert_eq!(last.unwrap().ttl(), Duration::from_secs(3600));
}

// =========================================================================
// Eviction
// =========================================================================

#[test]
fn full_cache_evicts_lowest_scoring_entry() {
    let clock = clock();
    let cache = cache_with(CacheConfig::new().max_size(2), &clock);

    cache.set("alpha", &no_context(), RequestType::Logic, &response("a"));
    cache.set("bravo", &no_context(), RequestType::Logic, &response("b"));
    clock.advance(Duration::from_secs(60));
    assert!(cache.get("alpha", &no_context()).is_some());
    clock.advance(Duration::from_secs(60));

    cache.set("charlie", &no_context(), RequestType::Logic, &response("c"));

    assert_eq!(cache.len(), 2);
    assert!(cache.get("charlie", &no_context()).is_some());
    assert!(cache.get("alpha", &no_context()).is_some());
    assert!(cache.get("bravo", &no_context()).is_none());
    assert_eq!(cache.stats().evictions, 1);
}

#[test]
fn eviction_tie_removes_oldest_entry() {
    let clock = clock();
    let cache = cache_with(
        CacheConfig::new().max_size(2).eviction_weights(1.0, 0.0),
        &clock,
    );

    cache.set("alpha", &no_context(), RequestType::Logic, &response("a"));
    clock.advance(Duration::from_secs(1));
    cache.set("bravo", &no_context(), RequestType::Logic, &response("b"));
    clock.advance(Duration::from_secs(1));
    cache.set("charlie", &no_context(), RequestType::Logic, &response("c"));

    assert_eq!(cache.len(), 2);
    assert!(cache.get("alpha", &no_context()).is_none());
}

#[test]
fn eviction_removes_a_tenth_of_a_large_cache() {
    let clock = clock();
    let cache = cache_with(CacheConfig::new().max_size(20).semantic_similarity(false), &clock);
    for i in 0..20 {
        cache.set(&format!("p{i}"), &no_context(), RequestType::Logic, &response("r"));
        clock.advance(Duration::from_secs(1));
    }

    cache.set("overflow", &no_context(), RequestType::Logic, &response("r"));

    assert_eq!(cache.len(), 19);
    assert_eq!(cache.stats().evictions, 2);
    assert!(cache.get("p0", &no_context()).is_none());
    assert!(cache.get("p1", &no_context()).is_none());
    assert!(cache.get("p2", &no_context()).is_some());
}

#[test]
fn replacing_a_key_in_a_full_cache_does_not_evict() {
    let clock = clock();
    let cache = cache_with(CacheConfig::new().max_size(2), &clock);
    cache.set("alpha", &no_context(), RequestType::Logic, &response("a"));
    cache.set("bravo", &no_context(), RequestType::Logic, &response("b"));
    cache.set("alpha", &no_context(), RequestType::Logic, &response("a2"));

    assert_eq!(cache.len(), 2);
    assert_eq!(cache.stats().evictions, 0);
}

// =========================================================================
// Truncation
// =========================================================================

#[test]
fn long_content_is_truncated_when_enabled() {
    let clock = clock();
    let cache = cache_with(CacheConfig::new().truncate_content(10), &clock);
    let long = "abcdefghijklmnopqrstuvwxyz";

    cache.set("alpha", &no_context(), RequestType::Logic, &response(long));
    let entry = cache.get("alpha", &no_context()).unwrap();
    assert_eq!(entry.content, format!("abcdefghij{TRUNCATION_MARKER}"));

    cache.set("bravo", &no_context(), RequestType::Logic, &response("short"));
    assert_eq!(cache.get("bravo", &no_context()).unwrap().content, "short");
}

#[test]
fn content_is_kept_whole_by_default() {
    let clock = clock();
    let cache = cache_with(CacheConfig::new(), &clock);
    let long = "x".repeat(20_000);
    cache.set("alpha", &no_context(), RequestType::Logic, &response(&long));
    assert_eq!(cache.get("alpha", &no_context()).unwrap().content, long);
}

// =========================================================================
// Cached responses
// =========================================================================

#[test]
fn cached_response_is_free_and_marked() {
    let clock = clock();
    let cache = cache_with(CacheConfig::new(), &clock);
    cache.set("alpha", &no_context(), RequestType::Logic, &response("r"));

    let hit = cache.get("alpha", &no_context()).unwrap().to_response("req-9");
    assert!(hit.is_cached());
    assert_eq!(hit.cost, 0.0);
    assert_eq!(hit.request_id, "req-9");
    assert_eq!(hit.metadata["original_cost"], Value::from(0.003));
    assert_eq!(hit.usage, Usage::new(10, 20));
}

#[test]
fn clear_keeps_counters() {
    let clock = clock();
    let cache = cache_with(CacheConfig::new(), &clock);
    cache.set("alpha", &no_context(), RequestType::Logic, &response("r"));
    cache.get("alpha", &no_context());
    cache.clear();

    assert!(cache.is_empty());
    assert_eq!(cache.stats().hits, 1);
}

// =========================================================================
// Persistence
// =========================================================================

#[tokio::test]
async fn file_store_round_trip_restores_entries() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("cache.json");
    let clock = clock();

    let cache = cache_with(CacheConfig::new(), &clock)
        .with_store(Arc::new(FileStore::new(path.clone())));
    cache.set("alpha", &no_context(), RequestType::Logic, &response("a"));
    cache.set("bravo", &context("k", 1), RequestType::Narrative, &response("b"));
    cache.flush().await.unwrap();

    let restored = cache_with(CacheConfig::new(), &clock)
        .with_store(Arc::new(FileStore::new(path)));
    assert_eq!(restored.restore().await.unwrap(), 2);
    assert_eq!(restored.get("bravo", &context("k", 1)).unwrap().content, "b");
}

#[tokio::test]
async fn restore_drops_expired_entries() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("cache.json");
    let clock = clock();

    let config = CacheConfig::new().default_ttl(Duration::from_secs(60));
    let cache = cache_with(config.clone(), &clock)
        .with_store(Arc::new(FileStore::new(path.clone())));
    cache.set("alpha", &no_context(), RequestType::Logic, &response("a"));
    cache.flush().await.unwrap();

    clock.advance(Duration::from_secs(61));
    let restored = cache_with(config, &clock).with_store(Arc::new(FileStore::new(path)));
    assert_eq!(restored.restore().await.unwrap(), 0);
    assert!(restored.is_empty());
}

#[tokio::test]
async fn restore_without_snapshot_loads_nothing() {
    let dir = tempfile::tempdir().unwrap();
    let clock = clock();
    let cache = cache_with(CacheConfig::new(), &clock)
        .with_store(Arc::new(FileStore::new(dir.path().join("missing.json"))));
    assert_eq!(cache.restore().await.unwrap(), 0);
}

#[tokio::test]
async fn restore_keeps_most_recently_used_when_over_capacity() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("cache.json");
    let clock = clock();

    let big = cache_with(CacheConfig::new().semantic_similarity(false), &clock)
        .with_store(Arc::new(FileStore::new(path.clone())));
    for name in ["alpha", "bravo", "charlie"] {
        big.set(name, &no_context(), RequestType::Logic, &response(name));
        clock.advance(Duration::from_secs(1));
    }
    big.get("alpha", &no_context());
    big.flush().await.unwrap();

    let small = cache_with(CacheConfig::new().max_size(2).semantic_similarity(false), &clock)
        .with_store(Arc::new(FileStore::new(path)));
    assert_eq!(small.restore().await.unwrap(), 2);
    assert!(small.get("alpha", &no_context()).is_some());
    assert!(small.get("charlie", &no_context()).is_some());
    assert!(small.get("bravo", &no_context()).is_none());
}

#[tokio::test]
async fn corrupt_snapshot_is_an_error() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("cache.json");
    std::fs::write(&path, "not json").unwrap();

    let clock = clock();
    let cache = cache_with(CacheConfig::new(), &clock).with_store(Arc::new(FileStore::new(path)));
    assert!(cache.restore().await.is_err());
}
