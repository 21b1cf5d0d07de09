//! Provider scoring and selection.
//!
//! Every candidate starts at [`BASE_SCORE`] and collects five adjustments:
//!
//! | component  | rule                                                         |
//! |------------|--------------------------------------------------------------|
//! | health     | +20 healthy, -10 degraded, -50 unhealthy, 0 unknown          |
//! | latency    | +10 under 1s, -15 over 5s, 0 otherwise or unknown            |
//! | cost       | +10 for critical priority, else `-min(20, estimate * 1000)`  |
//! | capability | `score[model][type] - 50` (missing entries count as 50)      |
//! | congestion | `-min(15, active requests of the same type * 2)`             |
//!
//! The total is clamped at zero. Unhealthy providers are filtered out before
//! scoring, and ties go to the provider registered first, so selection is
//! deterministic for a given registry, health snapshot and load.

use std::sync::Arc;

use serde::Serialize;
use tracing::debug;

use crate::telemetry;
use crate::types::{GenerationRequest, Priority};

use super::config::{NEUTRAL_CAPABILITY, ProviderConfig};
use super::health::{HealthStatus, HealthTable, is_routable};
use super::load::ActiveRequests;
use super::registry::ProviderRegistry;

/// Starting score of every candidate.
pub const BASE_SCORE: f64 = 100.0;

const FAST_LATENCY_MS: u64 = 1_000;
const SLOW_LATENCY_MS: u64 = 5_000;
const MAX_COST_PENALTY: f64 = 20.0;
const CRITICAL_COST_BONUS: f64 = 10.0;
const MAX_CONGESTION_PENALTY: f64 = 15.0;
const CONGESTION_PER_REQUEST: f64 = 2.0;

/// Score breakdown for one candidate provider.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProviderScore {
    pub provider_id: String,
    pub status: HealthStatus,
    pub health: f64,
    pub latency: f64,
    pub cost: f64,
    pub capability: f64,
    pub congestion: f64,
    /// Sum of the base score and all adjustments, clamped at zero.
    pub total: f64,
    pub estimated_cost: f64,
}

/// Picks the provider for each request.
#[derive(Debug, Clone)]
pub struct Router {
    registry: Arc<ProviderRegistry>,
    health: Arc<HealthTable>,
    active: Arc<ActiveRequests>,
}

impl Router {
    pub fn new(
        registry: Arc<ProviderRegistry>,
        health: Arc<HealthTable>,
        active: Arc<ActiveRequests>,
    ) -> Self {
        Self {
            registry,
            health,
            active,
        }
    }

    pub fn registry(&self) -> &Arc<ProviderRegistry> {
        &self.registry
    }

    /// Score every routable provider, in registration order.
    pub fn score_candidates(&self, request: &GenerationRequest) -> Vec<ProviderScore> {
        let same_type = self.active.count_by_type(request.request_type);
        self.registry
            .iter()
            .filter_map(|provider| {
                let status = self.health.status(&provider.id);
                if !is_routable(status) {
                    return None;
                }
                let latency_ms = self.health.get(&provider.id).and_then(|h| h.latency_ms);
                Some(score_provider(provider, request, status, latency_ms, same_type))
            })
            .collect()
    }

    /// The best-scoring routable provider, or `None` when every provider is
    /// unhealthy (or none is registered).
    pub fn select_provider(&self, request: &GenerationRequest) -> Option<ProviderConfig> {
        let scores = self.score_candidates(request);
        let best = best_candidate(&scores)?;
        debug!(
            provider = %best.provider_id,
            score = best.total,
            candidates = scores.len(),
            request_type = %request.request_type,
            "provider selected"
        );
        metrics::counter!(telemetry::PROVIDER_SELECTIONS_TOTAL,
            "provider" => best.provider_id.clone(),
            "request_type" => request.request_type.as_str(),
        )
        .increment(1);
        self.registry.get(&best.provider_id).cloned()
    }
}

/// Score one provider against a request.
pub fn score_provider(
    provider: &ProviderConfig,
    request: &GenerationRequest,
    status: HealthStatus,
    latency_ms: Option<u64>,
    active_same_type: usize,
) -> ProviderScore {
    let estimated_cost = provider.estimate_cost(request);

    let health = match status {
        HealthStatus::Healthy => 20.0,
        HealthStatus::Degraded => -10.0,
        HealthStatus::Unhealthy => -50.0,
        HealthStatus::Unknown => 0.0,
    };
    let latency = match latency_ms {
        Some(ms) if ms < FAST_LATENCY_MS => 10.0,
        Some(ms) if ms > SLOW_LATENCY_MS => -15.0,
        _ => 0.0,
    };
    let cost = if request.priority == Priority::Critical {
        CRITICAL_COST_BONUS
    } else {
        -(estimated_cost * 1000.0).min(MAX_COST_PENALTY)
    };
    let capability =
        f64::from(provider.capability(request.request_type)) - f64::from(NEUTRAL_CAPABILITY);
    let congestion = -(active_same_type as f64 * CONGESTION_PER_REQUEST).min(MAX_CONGESTION_PENALTY);

    let total = (BASE_SCORE + health + latency + cost + capability + congestion).max(0.0);

    ProviderScore {
        provider_id: provider.id.clone(),
        status,
        health,
        latency,
        cost,
        capability,
        congestion,
        total,
        estimated_cost,
    }
}

/// Highest total wins; on a tie the earlier entry is kept.
fn best_candidate(scores: &[ProviderScore]) -> Option<&ProviderScore> {
    scores
        .iter()
        .fold(None, |best: Option<&ProviderScore>, s| match best {
            Some(b) if b.total >= s.total => Some(b),
            _ => Some(s),
        })
}
