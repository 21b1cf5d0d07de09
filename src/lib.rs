//! Huginn - caching, cost-aware router for AI model providers
//!
//! Huginn sits between application code and several interchangeable model
//! providers. For every [`GenerationRequest`] the [`Gateway`]:
//!
//! 1. answers from the semantic [`ResponseCache`] when it can,
//! 2. otherwise scores every healthy provider on health, latency, cost,
//!    task fit and current load, and picks the best,
//! 3. rejects the request if that provider would break its spend cap,
//! 4. calls the provider through your [`ProviderClient`], records the spend
//!    and caches the answer.
//!
//! Huginn does not speak any vendor's HTTP API itself; the
//! [`ProviderClient`] you supply does.
//!
//! # Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//!
//! use async_trait::async_trait;
//! use huginn::{
//!     CapabilityScores, CostLimit, Gateway, GenerationRequest, ProviderClient, ProviderConfig,
//!     RequestType, Response, Usage,
//! };
//!
//! struct MyClient;
//!
//! #[async_trait]
//! impl ProviderClient for MyClient {
//!     async fn invoke(
//!         &self,
//!         provider: &ProviderConfig,
//!         request: &GenerationRequest,
//!     ) -> huginn::Result<Response> {
//!         // call the vendor API for `provider.model` here
//!         Ok(Response {
//!             content: format!("answer to: {}", request.prompt),
//!             usage: Usage::new(12, 40),
//!             ..Default::default()
//!         })
//!     }
//! }
//!
//! #[tokio::main]
//! async fn main() -> huginn::Result<()> {
//!     let gateway = Arc::new(
//!         Gateway::builder()
//!             .provider(
//!                 ProviderConfig::new("openai", "gpt-4o")
//!                     .cost_per_1k_tokens(0.005)
//!                     .capabilities(CapabilityScores::default().with(RequestType::Logic, 85))
//!                     .cost_limit(CostLimit::new(20.0, 400.0)),
//!             )
//!             .provider(ProviderConfig::new("local", "llama-3").cost_per_1k_tokens(0.0))
//!             .client(Arc::new(MyClient))
//!             .build()?,
//!     );
//!     let tasks = gateway.start();
//!
//!     let response = gateway
//!         .send_request(GenerationRequest::new(RequestType::Logic, "Is 97 prime?"))
//!         .await?;
//!     println!("{} (cached: {})", response.content, response.is_cached());
//!
//!     tasks.shutdown().await;
//!     Ok(())
//! }
//! ```
//!
//! # Metrics
//!
//! Counters and histograms are emitted through the `metrics` facade; see
//! [`telemetry`] for names. Nothing is recorded unless the application
//! installs a recorder.

pub mod cache;
pub mod clock;
pub mod config;
pub mod error;
pub mod gateway;
pub mod providers;
pub mod queue;
pub mod similarity;
pub mod task;
pub mod telemetry;
pub mod types;
mod version;

// Re-export main types at crate root
pub use cache::{CacheConfig, CacheEntry, CacheStats, CacheStore, ResponseCache, SimilarityConfig};
pub use clock::{Clock, ManualClock, SystemClock};
pub use error::{HuginnError, Result};
pub use gateway::{
    BackgroundTasks, ChannelEventSink, EventSink, Gateway, GatewayBuilder, GatewayConfig,
    GatewayEvent, GatewayStats, NoopEventSink, ServiceStatus, TracingEventSink,
};
pub use providers::{
    CapabilityScores, CostLimit, HealthStatus, ProviderClient, ProviderConfig, RateLimit,
};
pub use queue::QueueTicket;
pub use similarity::SimilarityAlgorithm;
pub use task::TaskHandle;
pub use types::{FinishReason, GenerationRequest, Priority, RequestType, Response, Usage};
pub use version::{PKG_VERSION, version_string};
