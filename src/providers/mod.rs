//! Provider catalog, health, spend and routing.
//!
//! - [`ProviderRegistry`] - static catalog of [`ProviderConfig`]s in
//!   registration order.
//! - [`HealthMonitor`] / [`HealthTable`] - periodic probes and the status
//!   snapshot they maintain.
//! - [`CostLedger`] - per-provider daily and monthly spend.
//! - [`ActiveRequests`] - in-flight requests, read for congestion scoring.
//! - [`Router`] - scores candidates and selects one per request.
//! - [`ProviderClient`] - the seam to the code that actually calls a vendor.

pub mod config;
pub mod health;
pub mod ledger;
pub mod load;
pub mod registry;
pub mod routing;
pub mod traits;

pub use config::{CapabilityScores, CostLimit, NEUTRAL_CAPABILITY, ProviderConfig, RateLimit};
pub use health::{HealthMonitor, HealthStatus, HealthTable, ProviderHealth};
pub use ledger::{CostLedger, SpendSnapshot};
pub use load::{ActiveGuard, ActiveRequest, ActiveRequests};
pub use registry::ProviderRegistry;
pub use routing::{ProviderScore, Router};
pub use traits::ProviderClient;
