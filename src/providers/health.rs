//! Provider health tracking.
//!
//! [`HealthTable`] is the snapshot the router reads. [`HealthMonitor`] keeps
//! it current by sending a synthetic low-priority request to every provider
//! through the same [`ProviderClient`] real traffic uses.
//!
//! # State machine
//!
//! ```text
//!            success                 failure (1..=3 in a row)
//! Unknown ───────────► Healthy ─────────────────────────► Degraded
//!                        ▲  ▲                                 │
//!                        │  └──────────── success ────────────┤
//!                        │                                    │ failure (>3 in a row)
//!                        └──────────── success ─────────── Unhealthy
//! ```
//!
//! The table is eventually consistent with real availability, lagging by at
//! most one probe interval.

use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::Duration;

use chrono::{DateTime, Utc};
use futures_util::future::join_all;
use serde::Serialize;
use tokio::time::Instant;
use tracing::{debug, info, instrument, warn};

use crate::HuginnError;
use crate::clock::Clock;
use crate::task::TaskHandle;
use crate::telemetry;
use crate::types::{GenerationRequest, Priority, RequestType};

use super::config::ProviderConfig;
use super::registry::ProviderRegistry;
use super::traits::ProviderClient;

/// Consecutive failures beyond which a provider is unhealthy.
pub const UNHEALTHY_THRESHOLD: u32 = 3;

/// Default interval between probe rounds.
pub const DEFAULT_PROBE_INTERVAL: Duration = Duration::from_secs(30);

/// Prompt sent by health probes.
pub const PROBE_PROMPT: &str = "ping";

/// Health classification of a provider.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum HealthStatus {
    /// Never probed.
    #[default]
    Unknown,
    Healthy,
    Degraded,
    Unhealthy,
}

impl HealthStatus {
    fn from_failures(consecutive_failures: u32) -> Self {
        match consecutive_failures {
            0 => HealthStatus::Healthy,
            n if n > UNHEALTHY_THRESHOLD => HealthStatus::Unhealthy,
            _ => HealthStatus::Degraded,
        }
    }
}

/// Latest probe outcome for one provider.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProviderHealth {
    pub provider_id: String,
    pub status: HealthStatus,
    /// Latency of the latest probe.
    pub latency_ms: Option<u64>,
    pub consecutive_failures: u32,
    pub last_checked: DateTime<Utc>,
    pub last_error: Option<String>,
}

/// Shared health snapshot, keyed by provider id.
///
/// Entries are created by the first recorded probe and never removed.
#[derive(Debug, Default)]
pub struct HealthTable {
    entries: RwLock<HashMap<String, ProviderHealth>>,
}

impl HealthTable {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> RwLockReadGuard<'_, HashMap<String, ProviderHealth>> {
        self.entries.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, HashMap<String, ProviderHealth>> {
        self.entries.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Status of a provider; `Unknown` if it was never probed.
    pub fn status(&self, provider_id: &str) -> HealthStatus {
        self.read()
            .get(provider_id)
            .map(|h| h.status)
            .unwrap_or_default()
    }

    /// Health record of a provider, if it was ever probed.
    pub fn get(&self, provider_id: &str) -> Option<ProviderHealth> {
        self.read().get(provider_id).cloned()
    }

    /// Copy of the whole table.
    pub fn snapshot(&self) -> HashMap<String, ProviderHealth> {
        self.read().clone()
    }

    /// Record a successful probe. Returns the new status.
    pub fn record_success(
        &self,
        provider_id: &str,
        latency: Duration,
        now: DateTime<Utc>,
    ) -> HealthStatus {
        self.record(provider_id, Some(latency), None, now)
    }

    /// Record a failed probe. Returns the new status.
    pub fn record_failure(
        &self,
        provider_id: &str,
        latency: Option<Duration>,
        error: impl Into<String>,
        now: DateTime<Utc>,
    ) -> HealthStatus {
        self.record(provider_id, latency, Some(error.into()), now)
    }

    fn record(
        &self,
        provider_id: &str,
        latency: Option<Duration>,
        error: Option<String>,
        now: DateTime<Utc>,
    ) -> HealthStatus {
        let mut entries = self.write();
        let entry = entries
            .entry(provider_id.to_owned())
            .or_insert_with(|| ProviderHealth {
                provider_id: provider_id.to_owned(),
                status: HealthStatus::Unknown,
                latency_ms: None,
                consecutive_failures: 0,
                last_checked: now,
                last_error: None,
            });

        let previous = entry.status;
        match error {
            None => entry.consecutive_failures = 0,
            Some(ref e) => {
                entry.consecutive_failures = entry.consecutive_failures.saturating_add(1);
                entry.last_error = Some(e.clone());
            }
        }
        entry.status = HealthStatus::from_failures(entry.consecutive_failures);
        entry.latency_ms = latency.map(|d| d.as_millis() as u64);
        entry.last_checked = now;

        if entry.status != previous {
            info!(
                provider = provider_id,
                from = ?previous,
                to = ?entry.status,
                consecutive_failures = entry.consecutive_failures,
                "provider health changed"
            );
        }
        entry.status
    }
}

/// Periodically probes every registered provider.
pub struct HealthMonitor {
    registry: Arc<ProviderRegistry>,
    client: Arc<dyn ProviderClient>,
    table: Arc<HealthTable>,
    clock: Arc<dyn Clock>,
}

impl HealthMonitor {
    pub fn new(
        registry: Arc<ProviderRegistry>,
        client: Arc<dyn ProviderClient>,
        table: Arc<HealthTable>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            registry,
            client,
            table,
            clock,
        }
    }

    /// The table this monitor writes.
    pub fn table(&self) -> &Arc<HealthTable> {
        &self.table
    }

    /// Probe one provider and record the outcome.
    pub async fn probe(&self, provider: &ProviderConfig) -> HealthStatus {
        let request = probe_request();
        let timeout = provider.timeout_duration();
        let start = Instant::now();
        let call = self.client.invoke(provider, &request);
        let outcome = match tokio::time::timeout(timeout, call).await {
            Ok(result) => result.map(|_| ()),
            Err(_) => Err(HuginnError::Timeout {
                provider: provider.id.clone(),
                timeout,
            }),
        };
        let latency = start.elapsed();
        let now = self.clock.now();

        match outcome {
            Ok(()) => {
                metrics::counter!(telemetry::HEALTH_PROBES_TOTAL,
                    "provider" => provider.id.clone(),
                    "status" => "ok",
                )
                .increment(1);
                debug!(provider = %provider.id, latency_ms = latency.as_millis() as u64, "probe ok");
                self.table.record_success(&provider.id, latency, now)
            }
            Err(e) => {
                metrics::counter!(telemetry::HEALTH_PROBES_TOTAL,
                    "provider" => provider.id.clone(),
                    "status" => "error",
                )
                .increment(1);
                warn!(provider = %provider.id, error = %e, "probe failed");
                self.table
                    .record_failure(&provider.id, Some(latency), e.to_string(), now)
            }
        }
    }

    /// Probe every registered provider concurrently.
    #[instrument(skip(self), fields(providers = self.registry.len()))]
    pub async fn probe_all(&self) {
        join_all(self.registry.iter().map(|p| self.probe(p))).await;
    }

    /// Run [`probe_all`](Self::probe_all) every `interval` until shut down.
    pub fn spawn(self: &Arc<Self>, interval: Duration) -> TaskHandle {
        let monitor = Arc::clone(self);
        TaskHandle::spawn_periodic("health-monitor", interval, move || {
            let monitor = Arc::clone(&monitor);
            async move { monitor.probe_all().await }
        })
    }
}

/// The synthetic request a probe sends.
pub fn probe_request() -> GenerationRequest {
    GenerationRequest::new(RequestType::Analysis, PROBE_PROMPT)
        .priority(Priority::Low)
        .context("health_check", true)
        .session("health-monitor")
}

/// Whether the router may pick a provider in this state.
pub fn is_routable(status: HealthStatus) -> bool {
    status != HealthStatus::Unhealthy
}
