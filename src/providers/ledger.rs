//! Per-provider spend ledger.
//!
//! Spend is bucketed by calendar day and calendar month (UTC, read from the
//! injected [`Clock`]). The first access after a day or month boundary
//! starts that bucket from zero, so caps reset without a separate job.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use chrono::{DateTime, Datelike, NaiveDate, Utc};
use serde::Serialize;
use tracing::debug;

use crate::clock::Clock;
use crate::telemetry;

use super::config::ProviderConfig;

/// Current spend of one provider.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct SpendSnapshot {
    pub day: NaiveDate,
    pub daily_spend: f64,
    /// `(year, month)` of the monthly bucket.
    pub month: (i32, u32),
    pub monthly_spend: f64,
}

impl SpendSnapshot {
    fn empty(now: DateTime<Utc>) -> Self {
        Self {
            day: now.date_naive(),
            daily_spend: 0.0,
            month: (now.year(), now.month()),
            monthly_spend: 0.0,
        }
    }

    /// Reset whichever buckets `now` has moved past.
    fn roll(&mut self, now: DateTime<Utc>) {
        let today = now.date_naive();
        if self.day != today {
            self.day = today;
            self.daily_spend = 0.0;
        }
        let month = (now.year(), now.month());
        if self.month != month {
            self.month = month;
            self.monthly_spend = 0.0;
        }
    }
}

/// Running spend counters, one entry per provider.
pub struct CostLedger {
    clock: Arc<dyn Clock>,
    entries: Mutex<HashMap<String, SpendSnapshot>>,
}

impl CostLedger {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            clock,
            entries: Mutex::new(HashMap::new()),
        }
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, SpendSnapshot>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Whether `estimated_cost` fits under both of the provider's caps.
    pub fn check_cost_limit(&self, provider: &ProviderConfig, estimated_cost: f64) -> bool {
        let spend = self.spend(&provider.id);
        spend.daily_spend + estimated_cost <= provider.cost_limit.max_daily_cost
            && spend.monthly_spend + estimated_cost <= provider.cost_limit.max_monthly_cost
    }

    /// Add the actual cost of a completed call.
    pub fn record_spend(&self, provider_id: &str, actual_cost: f64) {
        if actual_cost <= 0.0 || !actual_cost.is_finite() {
            return;
        }
        let now = self.clock.now();
        let mut entries = self.lock();
        let entry = entries
            .entry(provider_id.to_owned())
            .or_insert_with(|| SpendSnapshot::empty(now));
        entry.roll(now);
        entry.daily_spend += actual_cost;
        entry.monthly_spend += actual_cost;
        debug!(
            provider = provider_id,
            cost = actual_cost,
            daily = entry.daily_spend,
            monthly = entry.monthly_spend,
            "spend recorded"
        );
        metrics::counter!(telemetry::SPEND_TOTAL, "provider" => provider_id.to_owned())
            .increment((actual_cost * 1_000_000.0).round() as u64);
    }

    /// Spend in the current day and month buckets.
    pub fn spend(&self, provider_id: &str) -> SpendSnapshot {
        let now = self.clock.now();
        let mut entries = self.lock();
        match entries.get_mut(provider_id) {
            Some(entry) => {
                entry.roll(now);
                *entry
            }
            None => SpendSnapshot::empty(now),
        }
    }
}

impl std::fmt::Debug for CostLedger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CostLedger")
            .field("providers", &self.lock().len())
            .finish()
    }
}
