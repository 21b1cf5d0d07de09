//! The provider client seam.
//!
//! The gateway never talks HTTP itself. It hands the selected
//! [`ProviderConfig`] and the request to a [`ProviderClient`], which owns
//! transport, authentication, retries (`retry_attempts`) and rate limiting.
//!
//! # Errors
//!
//! Whatever the client returns is propagated to the caller unchanged. Health
//! probes go through the same client, so any error counts as a failed probe.
//!
//! # Example
//!
//! ```ignore
//! struct EchoClient;
//!
//! #[async_trait]
//! impl ProviderClient for EchoClient {
//!     async fn invoke(&self, provider: &ProviderConfig, request: &GenerationRequest) -> Result<Response> {
//!         Ok(Response {
//!             request_id: request.id.clone(),
//!             content: request.prompt.clone(),
//!             model: provider.model.clone(),
//!             ..Default::default()
//!         })
//!     }
//! }
//! ```

use async_trait::async_trait;

use crate::Result;
use crate::types::{GenerationRequest, Response};

use super::config::ProviderConfig;

/// Calls an upstream model provider.
#[async_trait]
pub trait ProviderClient: Send + Sync {
    /// Client name for logging/debugging.
    fn name(&self) -> &str {
        "provider-client"
    }

    /// Execute one request against `provider`.
    async fn invoke(&self, provider: &ProviderConfig, request: &GenerationRequest)
    -> Result<Response>;
}
