//! Static provider configuration.

use std::collections::HashMap;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::types::{GenerationRequest, RequestType};

/// Neutral capability score: contributes nothing to the routing score.
pub const NEUTRAL_CAPABILITY: u32 = 50;

/// How well one model suits each request type (0–100, 50 = neutral).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CapabilityScores {
    pub creation: u32,
    pub logic: u32,
    pub narrative: u32,
    pub analysis: u32,
}

impl Default for CapabilityScores {
    fn default() -> Self {
        Self::uniform(NEUTRAL_CAPABILITY)
    }
}

impl CapabilityScores {
    /// Same score for every request type.
    pub fn uniform(score: u32) -> Self {
        Self {
            creation: score,
            logic: score,
            narrative: score,
            analysis: score,
        }
    }

    pub fn get(&self, request_type: RequestType) -> u32 {
        match request_type {
            RequestType::Creation => self.creation,
            RequestType::Logic => self.logic,
            RequestType::Narrative => self.narrative,
            RequestType::Analysis => self.analysis,
        }
    }

    /// Builder-style setter for one request type.
    pub fn with(mut self, request_type: RequestType, score: u32) -> Self {
        match request_type {
            RequestType::Creation => self.creation = score,
            RequestType::Logic => self.logic = score,
            RequestType::Narrative => self.narrative = score,
            RequestType::Analysis => self.analysis = score,
        }
        self
    }
}

/// Declared request and token throughput limits.
///
/// Carried for the provider client; the gateway does not enforce them.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RateLimit {
    pub requests_per_minute: Option<u32>,
    pub tokens_per_minute: Option<u32>,
}

/// Spend caps in USD. Unset caps are unlimited.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CostLimit {
    pub max_daily_cost: f64,
    pub max_monthly_cost: f64,
}

impl Default for CostLimit {
    fn default() -> Self {
        Self {
            max_daily_cost: f64::INFINITY,
            max_monthly_cost: f64::INFINITY,
        }
    }
}

impl CostLimit {
    pub fn new(max_daily_cost: f64, max_monthly_cost: f64) -> Self {
        Self {
            max_daily_cost,
            max_monthly_cost,
        }
    }
}

/// One routable upstream: a vendor endpoint serving a model.
///
/// Deserializes from a `[[providers]]` table:
///
/// ```toml
/// [[providers]]
/// id = "openai-gpt4o"
/// model = "gpt-4o"
/// cost_per_1k_tokens = 0.005
/// timeout_ms = 30000
///
/// [providers.capabilities.gpt-4o]
/// logic = 90
/// narrative = 70
///
/// [providers.cost_limit]
/// max_daily_cost = 25.0
/// max_monthly_cost = 500.0
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProviderConfig {
    pub id: String,
    /// Display name. Defaults to the id.
    #[serde(default)]
    pub name: String,
    /// Model requests are served with.
    pub model: String,
    /// Capability table keyed by model.
    #[serde(default)]
    pub capabilities: HashMap<String, CapabilityScores>,
    /// Price used for cost estimation and routing, in USD per 1K tokens.
    #[serde(default)]
    pub cost_per_1k_tokens: f64,
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
    /// Consumed by the provider client, not by the gateway.
    #[serde(default = "default_retry_attempts")]
    pub retry_attempts: u32,
    #[serde(default)]
    pub rate_limit: RateLimit,
    #[serde(default)]
    pub cost_limit: CostLimit,
}

fn default_timeout_ms() -> u64 {
    30_000
}

fn default_retry_attempts() -> u32 {
    3
}

impl ProviderConfig {
    /// Create a provider with neutral capabilities, no price and no caps.
    pub fn new(id: impl Into<String>, model: impl Into<String>) -> Self {
        let id = id.into();
        Self {
            name: id.clone(),
            id,
            model: model.into(),
            capabilities: HashMap::new(),
            cost_per_1k_tokens: 0.0,
            timeout_ms: default_timeout_ms(),
            retry_attempts: default_retry_attempts(),
            rate_limit: RateLimit::default(),
            cost_limit: CostLimit::default(),
        }
    }

    /// Set the capability scores of the provider's own model.
    pub fn capabilities(mut self, scores: CapabilityScores) -> Self {
        self.capabilities.insert(self.model.clone(), scores);
        self
    }

    /// Set the price per 1K tokens.
    pub fn cost_per_1k_tokens(mut self, cost: f64) -> Self {
        self.cost_per_1k_tokens = cost;
        self
    }

    /// Set the call timeout.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout_ms = timeout.as_millis() as u64;
        self
    }

    /// Set the spend caps.
    pub fn cost_limit(mut self, limit: CostLimit) -> Self {
        self.cost_limit = limit;
        self
    }

    /// Set the declared rate limit.
    pub fn rate_limit(mut self, limit: RateLimit) -> Self {
        self.rate_limit = limit;
        self
    }

    pub fn timeout_duration(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    /// Capability score for a request type on this provider's model.
    pub fn capability(&self, request_type: RequestType) -> u32 {
        self.capabilities
            .get(&self.model)
            .map(|scores| scores.get(request_type))
            .unwrap_or(NEUTRAL_CAPABILITY)
    }

    /// Estimated USD cost of serving a request, from its prompt size.
    pub fn estimate_cost(&self, request: &GenerationRequest) -> f64 {
        request.estimated_tokens() as f64 / 1000.0 * self.cost_per_1k_tokens
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_defaults() {
        let p = ProviderConfig::new("a", "model-a");
        assert_eq!(p.name, "a");
        assert_eq!(p.timeout_ms, 30_000);
        assert_eq!(p.retry_attempts, 3);
        assert!(p.cost_limit.max_daily_cost.is_infinite());
    }

    #[test]
    fn capability_defaults_to_neutral() {
        let p = ProviderConfig::new("a", "model-a");
        assert_eq!(p.capability(RequestType::Logic), NEUTRAL_CAPABILITY);
    }

    #[test]
    fn capability_reads_own_model_row() {
        let p = ProviderConfig::new("a", "model-a")
            .capabilities(CapabilityScores::default().with(RequestType::Logic, 90));
        assert_eq!(p.capability(RequestType::Logic), 90);
        assert_eq!(p.capability(RequestType::Narrative), 50);
    }

    #[test]
    fn estimate_cost_scales_with_prompt() {
        let p = ProviderConfig::new("a", "m").cost_per_1k_tokens(2.0);
        // 4000 chars -> 1000 tokens -> 2.0 USD
        let request = GenerationRequest::new(RequestType::Logic, "x".repeat(4000));
        assert!((p.estimate_cost(&request) - 2.0).abs() < 1e-9);
    }

    #[test]
    fn deserializes_from_toml() {
        let toml = r#"
            id = "anthropic"
            model = "claude"
            cost_per_1k_tokens = 0.003

            [capabilities.claude]
            narrative = 95

            [cost_limit]
            max_daily_cost = 10.0
        "#;
        let p: ProviderConfig = toml::from_str(toml).unwrap();
        assert_eq!(p.capability(RequestType::Narrative), 95);
        assert_eq!(p.capability(RequestType::Logic), 50);
        assert_eq!(p.cost_limit.max_daily_cost, 10.0);
        assert!(p.cost_limit.max_monthly_cost.is_infinite());
        assert!(p.rate_limit.requests_per_minute.is_none());
    }
}
