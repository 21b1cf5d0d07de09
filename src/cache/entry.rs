//! Cache entry type and key derivation.

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sha2::{Digest, Sha256};

use crate::similarity::normalize;
use crate::types::{FinishReason, RequestType, Response, Usage};

/// Hex SHA-256 of a string.
pub fn sha256_hex(input: &str) -> String {
    hex::encode(Sha256::digest(input.as_bytes()))
}

/// Exact cache key: SHA-256 of the length-prefixed prompt followed by the
/// canonical context JSON (empty when there is no context).
///
/// The prefix keeps a prompt that ends in JSON from colliding with a shorter
/// prompt plus that JSON as context.
pub fn exact_key(prompt: &str, context_json: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update((prompt.len() as u64).to_le_bytes());
    hasher.update(prompt.as_bytes());
    hasher.update(context_json.as_bytes());
    hex::encode(hasher.finalize())
}

/// Hash of the normalized prompt, shared by prompts that differ only in case,
/// punctuation or spacing.
pub fn prompt_hash(prompt: &str) -> String {
    sha256_hex(&normalize(prompt))
}

/// Bookkeeping carried alongside a cached response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntryMetadata {
    pub request_type: RequestType,
    pub prompt_hash: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context_hash: Option<String>,
    /// Set on the copy returned by a fuzzy lookup.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub similarity: Option<f64>,
}

/// One cached response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheEntry {
    pub id: String,
    pub key: String,
    /// Normalized prompt, scored by fuzzy lookups.
    pub prompt: String,
    pub content: String,
    pub usage: Usage,
    /// What the original provider call cost, in USD.
    pub cost: f64,
    pub model: String,
    pub created_at: DateTime<Utc>,
    pub last_accessed: DateTime<Utc>,
    pub access_count: u64,
    pub ttl_ms: u64,
    pub metadata: EntryMetadata,
}

impl CacheEntry {
    pub fn ttl(&self) -> Duration {
        Duration::from_millis(self.ttl_ms)
    }

    /// Age measured from creation; access does not refresh it.
    pub fn age_ms(&self, now: DateTime<Utc>) -> i64 {
        (now - self.created_at).num_milliseconds()
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.age_ms(now) > self.ttl_ms as i64
    }

    /// Minutes since the last access, fractional.
    pub fn idle_minutes(&self, now: DateTime<Utc>) -> f64 {
        (now - self.last_accessed).num_milliseconds().max(0) as f64 / 60_000.0
    }

    /// Record a hit.
    pub(crate) fn touch(&mut self, now: DateTime<Utc>) {
        self.access_count = self.access_count.saturating_add(1);
        if now > self.last_accessed {
            self.last_accessed = now;
        }
    }

    /// Build the response a cache hit returns. It costs nothing; the
    /// original price is kept in metadata.
    pub fn to_response(&self, request_id: &str) -> Response {
        let mut metadata = serde_json::Map::new();
        metadata.insert("cached".into(), Value::Bool(true));
        metadata.insert("cache_entry_id".into(), Value::from(self.id.clone()));
        metadata.insert("original_cost".into(), Value::from(self.cost));
        metadata.insert("access_count".into(), Value::from(self.access_count));
        if let Some(similarity) = self.metadata.similarity {
            metadata.insert("similarity".into(), Value::from(similarity));
        }
        Response {
            id: uuid::Uuid::new_v4().to_string(),
            request_id: request_id.to_owned(),
            content: self.content.clone(),
            usage: self.usage,
            cost: 0.0,
            latency_ms: 0,
            model: self.model.clone(),
            finish_reason: FinishReason::Cached,
            metadata,
        }
    }
}
