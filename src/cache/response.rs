//! Semantic response cache.
//!
//! [`ResponseCache`] stores provider responses keyed by an exact hash of
//! prompt and context, with a fuzzy fallback that matches prompts by
//! text similarity. The gateway consults it before routing; a hit skips
//! provider selection, the cost check and the provider call entirely.
//!
//! # Lookup
//!
//! 1. Exact: SHA-256 of the prompt plus canonical context JSON. An expired
//!    exact entry is evicted and the lookup continues as a miss.
//! 2. Fuzzy (when `semantic_similarity` is on): scan unexpired entries. A
//!    prompt that normalizes to the same text scores 1.0; otherwise the
//!    configured [`SimilarityAlgorithm`] scores the prompts. The best score
//!    at or above the threshold wins, ties going to the newest entry.
//!    Context does not take part in fuzzy matching.
//!
//! Every hit bumps `access_count` and `last_accessed`. Once an entry has
//! been hit more than `adaptive_ttl_threshold` times, each further hit grows
//! its ttl by `adaptive_ttl_multiplier`, capped at `max_ttl`.
//!
//! # Eviction
//!
//! Inserting a new key into a full cache first removes the lowest-scoring
//! tenth of entries (at least one), scored as
//! `access_count * access_weight + idle_minutes * idle_weight`. Expired
//! entries are also removed by [`sweep`](ResponseCache::sweep), which
//! [`spawn_sweeper`](ResponseCache::spawn_sweeper) runs on a fixed cadence.
//!
//! # Persistence
//!
//! Every `set` hands a snapshot to the configured
//! [`CacheStore`](super::CacheStore) on a spawned task. Failures are logged
//! and counted, never returned.

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, info, instrument, warn};

use crate::clock::{Clock, SystemClock};
use crate::similarity::{SimilarityAlgorithm, normalize, similarity};
use crate::task::TaskHandle;
use crate::telemetry;
use crate::types::{RequestType, Response, canonical_context};
use crate::{HuginnError, Result};

use super::entry::{CacheEntry, EntryMetadata, exact_key, prompt_hash, sha256_hex};
use super::store::{CacheSnapshot, CacheStore, MemoryStore};

/// Suffix appended to truncated content.
pub const TRUNCATION_MARKER: &str = "\n[truncated]";

/// Configuration for the response cache.
///
/// ```rust
/// # use huginn::CacheConfig;
/// # use std::time::Duration;
/// let config = CacheConfig::new()
///     .max_size(5_000)
///     .default_ttl(Duration::from_secs(1800))
///     .adaptive_ttl(false);
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct CacheConfig {
    /// Maximum number of entries. Default: 1,000.
    pub max_size: usize,
    /// Time-to-live of a new entry. Default: 1 hour.
    pub default_ttl: Duration,
    /// Cut content longer than `truncate_threshold` characters. Lossy.
    /// Default: off.
    pub truncate_content: bool,
    /// Default: 10,000 characters.
    pub truncate_threshold: usize,
    /// Fall back to similarity matching on an exact miss. Default: on.
    pub semantic_similarity: bool,
    /// Grow the ttl of frequently hit entries. Default: on.
    pub adaptive_ttl: bool,
    /// Hits after which the ttl starts growing. Default: 5.
    pub adaptive_ttl_threshold: u64,
    /// Default: 1.5.
    pub adaptive_ttl_multiplier: f64,
    /// Upper bound for adaptive growth. Default: 24 hours.
    pub max_ttl: Duration,
    /// Eviction score weight per access. Default: 1.0.
    pub access_weight: f64,
    /// Eviction score weight per idle minute. Default: -1.0.
    pub idle_weight: f64,
    /// Cadence of the background sweep. Default: 60 seconds.
    pub sweep_interval: Duration,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            max_size: 1_000,
            default_ttl: Duration::from_secs(3600),
            truncate_content: false,
            truncate_threshold: 10_000,
            semantic_similarity: true,
            adaptive_ttl: true,
            adaptive_ttl_threshold: 5,
            adaptive_ttl_multiplier: 1.5,
            max_ttl: Duration::from_secs(24 * 3600),
            access_weight: 1.0,
            idle_weight: -1.0,
            sweep_interval: Duration::from_secs(60),
        }
    }
}

impl CacheConfig {
    /// Create a new config with sensible defaults.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn max_size(mut self, n: usize) -> Self {
        self.max_size = n;
        self
    }

    pub fn default_ttl(mut self, ttl: Duration) -> Self {
        self.default_ttl = ttl;
        self
    }

    /// Enable lossy truncation above `threshold` characters.
    pub fn truncate_content(mut self, threshold: usize) -> Self {
        self.truncate_content = true;
        self.truncate_threshold = threshold;
        self
    }

    pub fn semantic_similarity(mut self, enabled: bool) -> Self {
        self.semantic_similarity = enabled;
        self
    }

    pub fn adaptive_ttl(mut self, enabled: bool) -> Self {
        self.adaptive_ttl = enabled;
        self
    }

    /// Tune adaptive ttl growth.
    pub fn adaptive_ttl_policy(mut self, threshold: u64, multiplier: f64, max_ttl: Duration) -> Self {
        self.adaptive_ttl_threshold = threshold;
        self.adaptive_ttl_multiplier = multiplier;
        self.max_ttl = max_ttl;
        self
    }

    /// Set the eviction score weights.
    pub fn eviction_weights(mut self, access_weight: f64, idle_weight: f64) -> Self {
        self.access_weight = access_weight;
        self.idle_weight = idle_weight;
        self
    }

    pub fn sweep_interval(mut self, interval: Duration) -> Self {
        self.sweep_interval = interval;
        self
    }

    pub(crate) fn validate(&self) -> Result<()> {
        let invalid = |msg: &str| Err(HuginnError::Configuration(format!("cache: {msg}")));
        if self.max_size == 0 {
            return invalid("max_size must be positive");
        }
        if self.default_ttl.is_zero() {
            return invalid("default_ttl must be positive");
        }
        if self.max_ttl < self.default_ttl {
            return invalid("max_ttl must not be shorter than default_ttl");
        }
        if self.sweep_interval.is_zero() {
            return invalid("sweep_interval must be positive");
        }
        if self.adaptive_ttl_multiplier.is_nan() || self.adaptive_ttl_multiplier < 1.0 {
            return invalid("adaptive_ttl_multiplier must be at least 1.0");
        }
        Ok(())
    }
}

/// How fuzzy lookups score prompts.
///
/// ```rust
/// # use huginn::{SimilarityAlgorithm, SimilarityConfig};
/// let config = SimilarityConfig::new()
///     .threshold(0.9)
///     .algorithm(SimilarityAlgorithm::Jaccard);
/// ```
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SimilarityConfig {
    /// Minimum score for a fuzzy hit, in `[0, 1]`. Default: 0.85.
    pub threshold: f64,
    pub algorithm: SimilarityAlgorithm,
}

impl Default for SimilarityConfig {
    fn default() -> Self {
        Self {
            threshold: 0.85,
            algorithm: SimilarityAlgorithm::default(),
        }
    }
}

impl SimilarityConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn threshold(mut self, threshold: f64) -> Self {
        self.threshold = threshold;
        self
    }

    pub fn algorithm(mut self, algorithm: SimilarityAlgorithm) -> Self {
        self.algorithm = algorithm;
        self
    }

    pub(crate) fn validate(&self) -> Result<()> {
        if !(0.0..=1.0).contains(&self.threshold) {
            return Err(HuginnError::Configuration(format!(
                "similarity: threshold {} is outside [0, 1]",
                self.threshold
            )));
        }
        Ok(())
    }
}

/// Cache counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub evictions: u64,
    pub total_requests: u64,
    pub semantic_matches: u64,
    /// Hits as a percentage of lookups; 0 before the first lookup.
    pub hit_rate: f64,
    pub size: usize,
    pub max_size: usize,
}

#[derive(Debug, Default)]
struct Counters {
    hits: AtomicU64,
    misses: AtomicU64,
    evictions: AtomicU64,
    semantic_matches: AtomicU64,
}

/// In-memory response cache with similarity fallback.
pub struct ResponseCache {
    config: CacheConfig,
    similarity: SimilarityConfig,
    clock: Arc<dyn Clock>,
    store: Arc<dyn CacheStore>,
    entries: Mutex<HashMap<String, CacheEntry>>,
    generation: AtomicU64,
    counters: Counters,
}

impl ResponseCache {
    /// Create a cache on the system clock with no persistence.
    ///
    /// Fails with [`HuginnError::Configuration`] when either config is out
    /// of range.
    pub fn new(config: CacheConfig, similarity: SimilarityConfig) -> Result<Self> {
        config.validate()?;
        similarity.validate()?;
        Ok(Self {
            config,
            similarity,
            clock: Arc::new(SystemClock),
            store: Arc::new(MemoryStore),
            entries: Mutex::new(HashMap::new()),
            generation: AtomicU64::new(0),
            counters: Counters::default(),
        })
    }

    /// Read time from `clock` instead of the system clock.
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Persist snapshots to `store`.
    pub fn with_store(mut self, store: Arc<dyn CacheStore>) -> Self {
        self.store = store;
        self
    }

    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    pub fn similarity_config(&self) -> &SimilarityConfig {
        &self.similarity
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, CacheEntry>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Look up a response for `prompt` under `context`.
    ///
    /// The returned entry is a copy; a fuzzy hit has
    /// `metadata.similarity` set.
    pub fn get(&self, prompt: &str, context: &BTreeMap<String, Value>) -> Option<CacheEntry> {
        let now = self.clock.now();
        let key = exact_key(prompt, &canonical_context(context));
        let mut entries = self.lock();

        if let Some(entry) = entries.get(&key)
            && entry.is_expired(now)
        {
            entries.remove(&key);
            self.record_evictions(1, "expired");
        }

        if let Some(entry) = entries.get_mut(&key) {
            self.record_hit(entry, now);
            let hit = entry.clone();
            drop(entries);
            self.counters.hits.fetch_add(1, Ordering::Relaxed);
            metrics::counter!(telemetry::CACHE_HITS_TOTAL, "match" => "exact").increment(1);
            debug!(key = %key, access_count = hit.access_count, "cache hit");
            return Some(hit);
        }

        if self.config.semantic_similarity
            && let Some((matched, score)) = self.best_fuzzy_match(&entries, prompt, now)
            && let Some(entry) = entries.get_mut(&matched)
        {
            self.record_hit(entry, now);
            let mut hit = entry.clone();
            drop(entries);
            hit.metadata.similarity = Some(score);
            self.counters.hits.fetch_add(1, Ordering::Relaxed);
            self.counters.semantic_matches.fetch_add(1, Ordering::Relaxed);
            metrics::counter!(telemetry::CACHE_HITS_TOTAL, "match" => "semantic").increment(1);
            debug!(key = %matched, similarity = score, "semantic cache hit");
            return Some(hit);
        }

        drop(entries);
        self.counters.misses.fetch_add(1, Ordering::Relaxed);
        metrics::counter!(telemetry::CACHE_MISSES_TOTAL).increment(1);
        None
    }

    /// Best unexpired fuzzy candidate at or above the threshold.
    fn best_fuzzy_match(
        &self,
        entries: &HashMap<String, CacheEntry>,
        prompt: &str,
        now: DateTime<Utc>,
    ) -> Option<(String, f64)> {
        let query_hash = prompt_hash(prompt);
        let query = normalize(prompt);
        let mut best: Option<(&CacheEntry, f64)> = None;

        for entry in entries.values().filter(|e| !e.is_expired(now)) {
            let score = if entry.metadata.prompt_hash == query_hash {
                1.0
            } else {
                similarity(&query, &entry.prompt, self.similarity.algorithm)
            };
            if score < self.similarity.threshold {
                continue;
            }
            let better = match best {
                None => true,
                Some((b, s)) => score > s || (score == s && entry.created_at > b.created_at),
            };
            if better {
                best = Some((entry, score));
            }
        }
        best.map(|(entry, score)| (entry.key.clone(), score))
    }

    fn record_hit(&self, entry: &mut CacheEntry, now: DateTime<Utc>) {
        entry.touch(now);
        if self.config.adaptive_ttl && entry.access_count > self.config.adaptive_ttl_threshold {
            let cap = self.config.max_ttl.as_millis() as u64;
            let grown = (entry.ttl_ms as f64 * self.config.adaptive_ttl_multiplier).min(cap as f64);
            entry.ttl_ms = entry.ttl_ms.max(grown as u64);
        }
    }

    /// Cache `response` as the answer to `prompt` under `context`. Returns
    /// the entry key.
    ///
    /// An existing entry with the same key is replaced without eviction.
    pub fn set(
        &self,
        prompt: &str,
        context: &BTreeMap<String, Value>,
        request_type: RequestType,
        response: &Response,
    ) -> String {
        let now = self.clock.now();
        let context_json = canonical_context(context);
        let key = exact_key(prompt, &context_json);

        let content = if self.config.truncate_content {
            truncate(&response.content, self.config.truncate_threshold)
        } else {
            response.content.clone()
        };

        let entry = CacheEntry {
            id: uuid::Uuid::new_v4().to_string(),
            key: key.clone(),
            prompt: normalize(prompt),
            content,
            usage: response.usage,
            cost: response.cost,
            model: response.model.clone(),
            created_at: now,
            last_accessed: now,
            access_count: 0,
            ttl_ms: self.config.default_ttl.as_millis() as u64,
            metadata: EntryMetadata {
                request_type,
                prompt_hash: prompt_hash(prompt),
                context_hash: (!context_json.is_empty()).then(|| sha256_hex(&context_json)),
                similarity: None,
            },
        };

        let mut entries = self.lock();
        if !entries.contains_key(&key) && entries.len() >= self.config.max_size {
            let evicted = self.evict_lowest(&mut entries, now);
            self.record_evictions(evicted, "capacity");
        }
        entries.insert(key.clone(), entry);
        let snapshot = self.snapshot_locked(&entries, now);
        drop(entries);

        if let Some(snapshot) = snapshot {
            self.persist_in_background(snapshot);
        }
        key
    }

    /// Remove the lowest-scoring tenth of entries (at least one).
    fn evict_lowest(
        &self,
        entries: &mut HashMap<String, CacheEntry>,
        now: DateTime<Utc>,
    ) -> usize {
        let count = (entries.len() / 10).max(1);
        let mut scored: Vec<(f64, DateTime<Utc>, String)> = entries
            .values()
            .map(|e| {
                let score = e.access_count as f64 * self.config.access_weight
                    + e.idle_minutes(now) * self.config.idle_weight;
                (score, e.created_at, e.key.clone())
            })
            .collect();
        scored.sort_by(|a, b| {
            a.0.total_cmp(&b.0)
                .then_with(|| a.1.cmp(&b.1))
                .then_with(|| a.2.cmp(&b.2))
        });
        for (_, _, key) in scored.into_iter().take(count) {
            entries.remove(&key);
        }
        count
    }

    fn record_evictions(&self, count: usize, cause: &'static str) {
        if count == 0 {
            return;
        }
        self.counters
            .evictions
            .fetch_add(count as u64, Ordering::Relaxed);
        metrics::counter!(telemetry::CACHE_EVICTIONS_TOTAL, "cause" => cause)
            .increment(count as u64);
        debug!(count, cause, "cache entries evicted");
    }

    fn snapshot_locked(
        &self,
        entries: &HashMap<String, CacheEntry>,
        now: DateTime<Utc>,
    ) -> Option<CacheSnapshot> {
        if !self.store.is_durable() {
            return None;
        }
        Some(CacheSnapshot {
            generation: self.generation.fetch_add(1, Ordering::Relaxed) + 1,
            saved_at: now,
            entries: entries.values().cloned().collect(),
        })
    }

    fn persist_in_background(&self, snapshot: CacheSnapshot) {
        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            debug!("no runtime; cache snapshot not persisted");
            return;
        };
        let store = Arc::clone(&self.store);
        runtime.spawn(async move {
            if let Err(e) = store.write(&snapshot).await {
                metrics::counter!(telemetry::CACHE_PERSIST_FAILURES_TOTAL).increment(1);
                warn!(store = store.name(), error = %e, "cache snapshot write failed");
            }
        });
    }

    /// Write the current entries to the store and wait for the result.
    pub async fn flush(&self) -> Result<()> {
        let now = self.clock.now();
        let snapshot = {
            let entries = self.lock();
            self.snapshot_locked(&entries, now)
        };
        match snapshot {
            Some(snapshot) => self.store.write(&snapshot).await,
            None => Ok(()),
        }
    }

    /// Load the last persisted snapshot. Expired entries are dropped and, if
    /// the snapshot holds more than `max_size`, the most recently used are
    /// kept. Returns the number of entries loaded.
    pub async fn restore(&self) -> Result<usize> {
        let Some(snapshot) = self.store.read().await? else {
            return Ok(0);
        };
        let now = self.clock.now();
        let mut live: Vec<CacheEntry> = snapshot
            .entries
            .into_iter()
            .filter(|e| !e.is_expired(now))
            .collect();
        live.sort_by(|a, b| b.last_accessed.cmp(&a.last_accessed));
        live.truncate(self.config.max_size);

        let loaded = live.len();
        let mut entries = self.lock();
        entries.clear();
        entries.extend(live.into_iter().map(|e| (e.key.clone(), e)));
        drop(entries);

        self.generation
            .fetch_max(snapshot.generation, Ordering::Relaxed);
        info!(store = self.store.name(), entries = loaded, "cache restored");
        Ok(loaded)
    }

    /// Remove every expired entry. Returns the number removed.
    #[instrument(skip(self))]
    pub fn sweep(&self) -> usize {
        let now = self.clock.now();
        let mut entries = self.lock();
        let before = entries.len();
        entries.retain(|_, e| !e.is_expired(now));
        let removed = before - entries.len();
        drop(entries);
        self.record_evictions(removed, "expired");
        removed
    }

    /// Run [`sweep`](Self::sweep) every `interval` until shut down.
    pub fn spawn_sweeper(self: &Arc<Self>, interval: Duration) -> TaskHandle {
        let cache = Arc::clone(self);
        TaskHandle::spawn_periodic("cache-sweeper", interval, move || {
            let cache = Arc::clone(&cache);
            async move {
                cache.sweep();
            }
        })
    }

    /// Drop every entry. Counters are kept.
    pub fn clear(&self) {
        self.lock().clear();
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn stats(&self) -> CacheStats {
        let hits = self.counters.hits.load(Ordering::Relaxed);
        let misses = self.counters.misses.load(Ordering::Relaxed);
        let total = hits + misses;
        CacheStats {
            hits,
            misses,
            evictions: self.counters.evictions.load(Ordering::Relaxed),
            total_requests: total,
            semantic_matches: self.counters.semantic_matches.load(Ordering::Relaxed),
            hit_rate: if total == 0 {
                0.0
            } else {
                hits as f64 / total as f64 * 100.0
            },
            size: self.len(),
            max_size: self.config.max_size,
        }
    }
}

impl std::fmt::Debug for ResponseCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResponseCache")
            .field("config", &self.config)
            .field("similarity", &self.similarity)
            .field("store", &self.store.name())
            .field("size", &self.len())
            .finish()
    }
}

/// Keep the first `max_chars` characters and append [`TRUNCATION_MARKER`].
fn truncate(content: &str, max_chars: usize) -> String {
    match content.char_indices().nth(max_chars) {
        Some((cut, _)) => format!("{}{TRUNCATION_MARKER}", &content[..cut]),
        None => content.to_owned(),
    }
}
