//! Telemetry metric name constants.
//!
//! Centralised metric names for huginn operations. Consumers install
//! their own `metrics` recorder (e.g. prometheus, statsd); without a
//! recorder installed, all metric calls are no-ops.
//!
//! # Metric naming conventions
//!
//! All metrics are prefixed with `huginn_`. Counters end in `_total`,
//! histograms use meaningful units (e.g. `_seconds`).
//!
//! # Common labels
//!
//! - `provider` - provider id (e.g. "openai-gpt4o")
//! - `request_type` - "creation", "logic", "narrative" or "analysis"
//! - `status` - outcome: "ok" or "error"
//! - `match` - cache hit kind: "exact" or "semantic"

/// Total requests accepted by the gateway.
///
/// Labels: `request_type`.
pub const REQUESTS_TOTAL: &str = "huginn_requests_total";

/// Provider call outcomes.
///
/// Labels: `provider`, `status` ("ok" | "error").
pub const PROVIDER_CALLS_TOTAL: &str = "huginn_provider_calls_total";

/// Provider call duration in seconds.
///
/// Labels: `provider`.
pub const REQUEST_DURATION_SECONDS: &str = "huginn_request_duration_seconds";

/// Requests rejected before any provider call.
///
/// Labels: `reason` ("no_healthy_provider" | "cost_limit").
pub const ADMISSION_REJECTIONS_TOTAL: &str = "huginn_admission_rejections_total";

/// Provider chosen by the router.
///
/// Labels: `provider`, `request_type`.
pub const PROVIDER_SELECTIONS_TOTAL: &str = "huginn_provider_selections_total";

/// Total spend recorded in the ledger, in micro-dollars (USD * 1e6).
///
/// Labels: `provider`.
pub const SPEND_TOTAL: &str = "huginn_spend_micro_usd_total";

/// Total cache hits.
///
/// Labels: `match` ("exact" | "semantic").
pub const CACHE_HITS_TOTAL: &str = "huginn_cache_hits_total";

/// Total cache misses.
pub const CACHE_MISSES_TOTAL: &str = "huginn_cache_misses_total";

/// Total cache evictions (capacity, expiry on read, or sweep).
///
/// Labels: `cause` ("capacity" | "expired").
pub const CACHE_EVICTIONS_TOTAL: &str = "huginn_cache_evictions_total";

/// Failed best-effort cache snapshot writes.
pub const CACHE_PERSIST_FAILURES_TOTAL: &str = "huginn_cache_persist_failures_total";

/// Health probe outcomes.
///
/// Labels: `provider`, `status` ("ok" | "error").
pub const HEALTH_PROBES_TOTAL: &str = "huginn_health_probes_total";

/// Depth of the admission queue, sampled on every enqueue and dispatch.
pub const QUEUE_DEPTH: &str = "huginn_queue_depth";
