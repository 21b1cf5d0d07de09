//! The gateway facade.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;
use tokio::time::Instant;
use tracing::{debug, info, instrument, warn};

use crate::cache::{CacheStats, ResponseCache};
use crate::clock::Clock;
use crate::providers::health::DEFAULT_PROBE_INTERVAL;
use crate::providers::{
    ActiveRequest, ActiveRequests, CostLedger, HealthMonitor, HealthTable, ProviderClient,
    ProviderConfig, ProviderHealth, ProviderRegistry, Router,
};
use crate::queue::{QueueTicket, RequestHandler, RequestQueue, spawn_dispatcher};
use crate::task::TaskHandle;
use crate::telemetry;
use crate::types::{GenerationRequest, Response};
use crate::{HuginnError, Result};

use super::builder::GatewayBuilder;
use super::events::{EventSink, GatewayEvent};

/// Background task cadences.
///
/// ```rust
/// # use huginn::GatewayConfig;
/// # use std::time::Duration;
/// let config = GatewayConfig::new()
///     .health_check_interval(Duration::from_secs(10))
///     .max_in_flight(8);
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct GatewayConfig {
    /// Interval between health probe rounds. Default: 30 seconds.
    pub health_check_interval: Duration,
    /// Interval between queue pops. Default: 100 ms.
    pub dispatch_interval: Duration,
    /// Queued requests dispatched concurrently. Default: 4.
    pub max_in_flight: usize,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            health_check_interval: DEFAULT_PROBE_INTERVAL,
            dispatch_interval: Duration::from_millis(100),
            max_in_flight: 4,
        }
    }
}

impl GatewayConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn health_check_interval(mut self, interval: Duration) -> Self {
        self.health_check_interval = interval;
        self
    }

    pub fn dispatch_interval(mut self, interval: Duration) -> Self {
        self.dispatch_interval = interval;
        self
    }

    pub fn max_in_flight(mut self, n: usize) -> Self {
        self.max_in_flight = n;
        self
    }

    pub(crate) fn validate(&self) -> Result<()> {
        if self.health_check_interval.is_zero() || self.dispatch_interval.is_zero() {
            return Err(HuginnError::Configuration(
                "gateway: intervals must be positive".into(),
            ));
        }
        if self.max_in_flight == 0 {
            return Err(HuginnError::Configuration(
                "gateway: max_in_flight must be positive".into(),
            ));
        }
        Ok(())
    }
}

/// Gateway request counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct GatewayStats {
    pub total_requests: u64,
    pub cache_hits: u64,
    pub cache_misses: u64,
    pub failed_requests: u64,
    /// Spend across all providers since start, in USD.
    pub total_cost: f64,
}

#[derive(Debug, Default)]
struct Counters {
    total_requests: AtomicU64,
    cache_hits: AtomicU64,
    cache_misses: AtomicU64,
    failed_requests: AtomicU64,
    /// Micro-dollars, so the sum stays atomic.
    total_cost_micros: AtomicU64,
}

/// Point-in-time view of providers, their health and current load.
#[derive(Debug, Clone, Serialize)]
pub struct ServiceStatus {
    pub providers: Vec<ProviderConfig>,
    /// Health of every provider probed so far, in registration order.
    pub health: Vec<ProviderHealth>,
    pub active_requests: Vec<ActiveRequest>,
    pub queue_depth: usize,
}

/// Handles to the gateway's background tasks.
#[derive(Debug)]
pub struct BackgroundTasks {
    pub health: TaskHandle,
    pub sweeper: TaskHandle,
    pub dispatcher: TaskHandle,
    queue: Arc<RequestQueue>,
}

impl BackgroundTasks {
    /// Stop all three tasks and wait for them to exit.
    ///
    /// The request queue is closed once the dispatcher has stopped: requests
    /// still waiting fail with [`HuginnError::QueueClosed`] and later
    /// [`Gateway::enqueue`] calls are refused. Requests already dispatched
    /// run to completion.
    pub async fn shutdown(self) {
        self.dispatcher.shutdown().await;
        let dropped = self.queue.close();
        self.sweeper.shutdown().await;
        self.health.shutdown().await;
        info!(dropped, "background tasks stopped");
    }
}

/// Cache-fronted, health- and cost-aware request router.
///
/// Built with [`Gateway::builder`]. Every request runs cache lookup, provider
/// selection, the cost check and the provider call, in that order; see
/// [`send_request`](Self::send_request).
pub struct Gateway {
    registry: Arc<ProviderRegistry>,
    client: Arc<dyn ProviderClient>,
    cache: Arc<ResponseCache>,
    router: Router,
    health: Arc<HealthMonitor>,
    ledger: Arc<CostLedger>,
    active: Arc<ActiveRequests>,
    queue: Arc<RequestQueue>,
    events: Arc<dyn EventSink>,
    clock: Arc<dyn Clock>,
    config: GatewayConfig,
    counters: Counters,
}

impl Gateway {
    pub fn builder() -> GatewayBuilder {
        GatewayBuilder::new()
    }

    #[allow(clippy::too_many_arguments)]
    pub(super) fn new(
        registry: Arc<ProviderRegistry>,
        client: Arc<dyn ProviderClient>,
        cache: Arc<ResponseCache>,
        health_table: Arc<HealthTable>,
        ledger: Arc<CostLedger>,
        events: Arc<dyn EventSink>,
        clock: Arc<dyn Clock>,
        config: GatewayConfig,
    ) -> Self {
        let active = Arc::new(ActiveRequests::new());
        let router = Router::new(
            Arc::clone(&registry),
            Arc::clone(&health_table),
            Arc::clone(&active),
        );
        let health = Arc::new(HealthMonitor::new(
            Arc::clone(&registry),
            Arc::clone(&client),
            health_table,
            Arc::clone(&clock),
        ));
        Self {
            registry,
            client,
            cache,
            router,
            health,
            ledger,
            active,
            queue: Arc::new(RequestQueue::new()),
            events,
            clock,
            config,
            counters: Counters::default(),
        }
    }

    /// Serve one request.
    ///
    /// # Errors
    ///
    /// - [`HuginnError::NoHealthyProvider`] if every provider is unhealthy.
    /// - [`HuginnError::CostLimitExceeded`] if the selected provider would
    ///   exceed a spend cap. No other provider is tried.
    /// - [`HuginnError::Timeout`] if the provider does not answer within its
    ///   timeout (or the request's, when shorter).
    /// - Any error the provider client returns, unchanged.
    #[instrument(skip(self, request), fields(request_id = %request.id, request_type = %request.request_type))]
    pub async fn send_request(&self, request: GenerationRequest) -> Result<Response> {
        let _active = self.active.register(&request, self.clock.now());
        self.counters.total_requests.fetch_add(1, Ordering::Relaxed);
        metrics::counter!(telemetry::REQUESTS_TOTAL,
            "request_type" => request.request_type.as_str(),
        )
        .increment(1);

        if let Some(entry) = self.cache.get(&request.prompt, &request.context) {
            self.counters.cache_hits.fetch_add(1, Ordering::Relaxed);
            debug!(entry = %entry.id, "served from cache");
            return Ok(entry.to_response(&request.id));
        }
        self.counters.cache_misses.fetch_add(1, Ordering::Relaxed);

        let Some(provider) = self.router.select_provider(&request) else {
            metrics::counter!(telemetry::ADMISSION_REJECTIONS_TOTAL,
                "reason" => "no_healthy_provider",
            )
            .increment(1);
            warn!("no healthy provider available");
            return Err(HuginnError::NoHealthyProvider);
        };

        let estimated_cost = provider.estimate_cost(&request);
        if !self.ledger.check_cost_limit(&provider, estimated_cost) {
            metrics::counter!(telemetry::ADMISSION_REJECTIONS_TOTAL,
                "reason" => "cost_limit",
            )
            .increment(1);
            warn!(provider = %provider.id, estimated_cost, "cost limit exceeded");
            return Err(HuginnError::CostLimitExceeded {
                provider: provider.id.clone(),
                estimated_cost,
            });
        }

        let timeout = match request.timeout_duration() {
            Some(deadline) => deadline.min(provider.timeout_duration()),
            None => provider.timeout_duration(),
        };
        let start = Instant::now();
        let call = self.client.invoke(&provider, &request);
        let outcome = match tokio::time::timeout(timeout, call).await {
            Ok(result) => result,
            Err(_) => Err(HuginnError::Timeout {
                provider: provider.id.clone(),
                timeout,
            }),
        };
        let latency = start.elapsed();
        record_call(&provider.id, latency, outcome.is_ok());

        match outcome {
            Ok(mut response) => {
                self.complete_response(&mut response, &provider, &request, latency);
                self.ledger.record_spend(&provider.id, response.cost);
                self.add_cost(response.cost);
                self.cache.set(
                    &request.prompt,
                    &request.context,
                    request.request_type,
                    &response,
                );
                self.events
                    .emit(GatewayEvent::RequestCompleted {
                        request,
                        response: response.clone(),
                        provider_id: provider.id.clone(),
                        latency,
                    })
                    .await;
                Ok(response)
            }
            Err(e) => {
                self.counters.failed_requests.fetch_add(1, Ordering::Relaxed);
                self.events
                    .emit(GatewayEvent::RequestFailed {
                        request,
                        provider_id: provider.id.clone(),
                        error: e.to_string(),
                        latency,
                    })
                    .await;
                Err(e)
            }
        }
    }

    /// Fill in what the client left empty. A response without a cost is
    /// priced at the provider's rate from its reported usage.
    fn complete_response(
        &self,
        response: &mut Response,
        provider: &ProviderConfig,
        request: &GenerationRequest,
        latency: Duration,
    ) {
        if response.id.is_empty() {
            response.id = uuid::Uuid::new_v4().to_string();
        }
        if response.request_id.is_empty() {
            response.request_id = request.id.clone();
        }
        if response.model.is_empty() {
            response.model = provider.model.clone();
        }
        if response.cost <= 0.0 && response.usage.total_tokens > 0 {
            response.cost =
                f64::from(response.usage.total_tokens) / 1000.0 * provider.cost_per_1k_tokens;
        }
        response.latency_ms = latency.as_millis() as u64;
    }

    fn add_cost(&self, cost: f64) {
        if cost > 0.0 && cost.is_finite() {
            self.counters
                .total_cost_micros
                .fetch_add((cost * 1_000_000.0).round() as u64, Ordering::Relaxed);
        }
    }

    /// Queue a request for asynchronous dispatch.
    pub fn enqueue(&self, request: GenerationRequest) -> Result<QueueTicket> {
        self.queue.push(request)
    }

    /// Start health probing, cache sweeping and queue dispatch.
    ///
    /// Requires a tokio runtime.
    pub fn start(self: &Arc<Self>) -> BackgroundTasks {
        let health = self.health.spawn(self.config.health_check_interval);
        let sweeper = self
            .cache
            .spawn_sweeper(self.cache.config().sweep_interval);
        let handler: Arc<dyn RequestHandler> = Arc::clone(self) as Arc<dyn RequestHandler>;
        let dispatcher = spawn_dispatcher(
            handler,
            Arc::clone(&self.queue),
            self.config.dispatch_interval,
            self.config.max_in_flight,
        );
        info!(
            providers = self.registry.len(),
            health_interval_ms = self.config.health_check_interval.as_millis() as u64,
            "gateway started"
        );
        BackgroundTasks {
            health,
            sweeper,
            dispatcher,
            queue: Arc::clone(&self.queue),
        }
    }

    /// Load the cache's last persisted snapshot.
    pub async fn restore_cache(&self) -> Result<usize> {
        self.cache.restore().await
    }

    /// Run one health probe round now.
    pub async fn probe_health(&self) {
        self.health.probe_all().await;
    }

    pub fn cache_stats(&self) -> CacheStats {
        self.cache.stats()
    }

    pub fn stats(&self) -> GatewayStats {
        GatewayStats {
            total_requests: self.counters.total_requests.load(Ordering::Relaxed),
            cache_hits: self.counters.cache_hits.load(Ordering::Relaxed),
            cache_misses: self.counters.cache_misses.load(Ordering::Relaxed),
            failed_requests: self.counters.failed_requests.load(Ordering::Relaxed),
            total_cost: self.counters.total_cost_micros.load(Ordering::Relaxed) as f64
                / 1_000_000.0,
        }
    }

    pub fn service_status(&self) -> ServiceStatus {
        let table = self.health.table();
        ServiceStatus {
            providers: self.registry.providers().to_vec(),
            health: self
                .registry
                .iter()
                .filter_map(|p| table.get(&p.id))
                .collect(),
            active_requests: self.active.list(),
            queue_depth: self.queue.pending(),
        }
    }

    pub fn registry(&self) -> &Arc<ProviderRegistry> {
        &self.registry
    }

    pub fn router(&self) -> &Router {
        &self.router
    }

    pub fn cache(&self) -> &Arc<ResponseCache> {
        &self.cache
    }

    pub fn health(&self) -> &Arc<HealthTable> {
        self.health.table()
    }

    pub fn ledger(&self) -> &Arc<CostLedger> {
        &self.ledger
    }

    pub fn active_requests(&self) -> &Arc<ActiveRequests> {
        &self.active
    }

    pub fn queue(&self) -> &Arc<RequestQueue> {
        &self.queue
    }

    pub fn client_name(&self) -> &str {
        self.client.name()
    }
}

#[async_trait]
impl RequestHandler for Gateway {
    async fn handle(&self, request: GenerationRequest) -> Result<Response> {
        self.send_request(request).await
    }
}

impl std::fmt::Debug for Gateway {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Gateway")
            .field("providers", &self.registry.ids())
            .field("client", &self.client.name())
            .field("cache", &self.cache)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

fn record_call(provider: &str, latency: Duration, ok: bool) {
    let status = if ok { "ok" } else { "error" };
    metrics::counter!(telemetry::PROVIDER_CALLS_TOTAL,
        "provider" => provider.to_owned(),
        "status" => status,
    )
    .increment(1);
    metrics::histogram!(telemetry::REQUEST_DURATION_SECONDS,
        "provider" => provider.to_owned(),
    )
    .record(latency.as_secs_f64());
}
