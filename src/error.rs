//! Huginn error types

use std::time::Duration;

/// Huginn error types
#[derive(Debug, thiserror::Error)]
pub enum HuginnError {
    // Admission control
    /// Every registered provider is currently unhealthy (or none is registered).
    #[error("no healthy provider available")]
    NoHealthyProvider,

    /// The selected provider would exceed its daily or monthly spend cap.
    #[error("cost limit exceeded for provider '{provider}' (estimated cost {estimated_cost:.6})")]
    CostLimitExceeded {
        provider: String,
        estimated_cost: f64,
    },

    // Provider/network errors, produced by `ProviderClient` implementations
    // and passed through the gateway unchanged.
    #[error("HTTP error: {0}")]
    Http(String),

    #[error("API error ({status}): {message}")]
    Api { status: u16, message: String },

    #[error("rate limited, retry after {retry_after:?}")]
    RateLimited { retry_after: Option<Duration> },

    #[error("provider '{provider}' timed out after {timeout:?}")]
    Timeout { provider: String, timeout: Duration },

    #[error("provider error: {0}")]
    Provider(String),

    // Cache durability; logged at the point of failure, never returned from
    // the request path.
    #[error("cache persistence error: {0}")]
    CachePersistence(String),

    // Queue
    #[error("request queue is closed")]
    QueueClosed,

    // Configuration errors
    #[error("configuration error: {0}")]
    Configuration(String),

    // Data errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl HuginnError {
    /// Whether this error is a caller-facing admission rejection (as opposed
    /// to a failure of the provider call itself).
    pub fn is_admission_rejection(&self) -> bool {
        matches!(
            self,
            HuginnError::NoHealthyProvider | HuginnError::CostLimitExceeded { .. }
        )
    }
}

/// Result type alias for Huginn operations
pub type Result<T> = std::result::Result<T, HuginnError>;
