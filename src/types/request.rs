//! Generation request types

use std::collections::BTreeMap;
use std::fmt;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Task category of a request; drives the capability-fit part of routing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RequestType {
    Creation,
    Logic,
    Narrative,
    Analysis,
}

impl RequestType {
    /// All request types, in declaration order.
    pub const ALL: [RequestType; 4] = [
        RequestType::Creation,
        RequestType::Logic,
        RequestType::Narrative,
        RequestType::Analysis,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            RequestType::Creation => "creation",
            RequestType::Logic => "logic",
            RequestType::Narrative => "narrative",
            RequestType::Analysis => "analysis",
        }
    }
}

impl fmt::Display for RequestType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for RequestType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "creation" => Ok(RequestType::Creation),
            "logic" => Ok(RequestType::Logic),
            "narrative" => Ok(RequestType::Narrative),
            "analysis" => Ok(RequestType::Analysis),
            other => Err(format!("unknown request type: {other}")),
        }
    }
}

/// Request priority.
///
/// Advisory: only the router's cost adjustment reads it. The admission
/// queue stays FIFO regardless of priority.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum Priority {
    Low,
    #[default]
    Medium,
    High,
    Critical,
}

impl std::str::FromStr for Priority {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "low" => Ok(Priority::Low),
            "medium" => Ok(Priority::Medium),
            "high" => Ok(Priority::High),
            "critical" => Ok(Priority::Critical),
            other => Err(format!("unknown priority: {other}")),
        }
    }
}

/// A single generation request.
///
/// ```rust
/// # use huginn::{GenerationRequest, Priority, RequestType};
/// let request = GenerationRequest::new(RequestType::Narrative, "Describe the harbour at dawn")
///     .priority(Priority::High)
///     .context("scene", "harbour")
///     .session("session-42");
/// assert_eq!(request.priority, Priority::High);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerationRequest {
    pub id: String,
    #[serde(rename = "type")]
    pub request_type: RequestType,
    pub prompt: String,
    /// Opaque caller context. Ordered so its serialized form is canonical
    /// and can take part in the cache key.
    #[serde(default)]
    pub context: BTreeMap<String, Value>,
    #[serde(default)]
    pub priority: Priority,
    /// Caller deadline in milliseconds. When shorter than the provider's
    /// timeout it takes precedence.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_ms: Option<u64>,
    #[serde(default)]
    pub session_id: String,
    pub timestamp: DateTime<Utc>,
}

impl GenerationRequest {
    /// Create a request with a fresh id, medium priority and empty context.
    pub fn new(request_type: RequestType, prompt: impl Into<String>) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            request_type,
            prompt: prompt.into(),
            context: BTreeMap::new(),
            priority: Priority::default(),
            timeout_ms: None,
            session_id: String::new(),
            timestamp: Utc::now(),
        }
    }

    /// Set the priority.
    pub fn priority(mut self, priority: Priority) -> Self {
        self.priority = priority;
        self
    }

    /// Add a context entry.
    pub fn context(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.context.insert(key.into(), value.into());
        self
    }

    /// Set the caller deadline.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout_ms = Some(timeout.as_millis() as u64);
        self
    }

    /// Set the session id.
    pub fn session(mut self, session_id: impl Into<String>) -> Self {
        self.session_id = session_id.into();
        self
    }

    /// Caller deadline, if any.
    pub fn timeout_duration(&self) -> Option<Duration> {
        self.timeout_ms.map(Duration::from_millis)
    }

    /// Canonical JSON of the context (empty string when there is none).
    pub fn context_json(&self) -> String {
        canonical_context(&self.context)
    }

    /// Rough token count of prompt plus context: one token per four chars.
    pub fn estimated_tokens(&self) -> u64 {
        let chars = self.prompt.chars().count() + self.context_json().chars().count();
        chars.div_ceil(4) as u64
    }
}

/// Serialize a context map deterministically. `BTreeMap` keys are sorted, so
/// two equal maps always yield the same string.
pub(crate) fn canonical_context(context: &BTreeMap<String, Value>) -> String {
    if context.is_empty() {
        return String::new();
    }
    serde_json::to_string(context).unwrap_or_default()
}
