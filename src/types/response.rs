//! Response types

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Token usage statistics
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Usage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
    pub total_tokens: u32,
}

impl Usage {
    /// Usage with `total_tokens` derived from the two halves.
    pub fn new(prompt_tokens: u32, completion_tokens: u32) -> Self {
        Self {
            prompt_tokens,
            completion_tokens,
            total_tokens: prompt_tokens.saturating_add(completion_tokens),
        }
    }
}

/// Reason the model stopped generating
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FinishReason {
    #[default]
    Stop,
    Length,
    ContentFilter,
    /// Served from the response cache.
    Cached,
}

/// Result of a generation request.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Response {
    pub id: String,
    pub request_id: String,
    pub content: String,
    #[serde(default)]
    pub usage: Usage,
    /// Cost of this call in USD. Zero for cache hits.
    #[serde(default)]
    pub cost: f64,
    #[serde(default)]
    pub latency_ms: u64,
    pub model: String,
    #[serde(default)]
    pub finish_reason: FinishReason,
    #[serde(default)]
    pub metadata: Map<String, Value>,
}

impl Response {
    /// Whether this response was served from the cache.
    pub fn is_cached(&self) -> bool {
        self.metadata
            .get("cached")
            .and_then(Value::as_bool)
            .unwrap_or(false)
    }
}
