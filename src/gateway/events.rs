//! Request outcome notifications.
//!
//! The gateway awaits [`EventSink::emit`] inline after every provider call,
//! so a sink sees events in completion order and a slow sink slows the
//! gateway down. [`ChannelEventSink`] turns that into bounded-channel
//! backpressure for consumers that process events elsewhere.

use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tracing::{debug, info, warn};

use crate::types::{GenerationRequest, Response};

/// Outcome of a request that reached a provider.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum GatewayEvent {
    RequestCompleted {
        request: GenerationRequest,
        response: Response,
        provider_id: String,
        latency: Duration,
    },
    RequestFailed {
        request: GenerationRequest,
        provider_id: String,
        error: String,
        latency: Duration,
    },
}

impl GatewayEvent {
    pub fn request(&self) -> &GenerationRequest {
        match self {
            GatewayEvent::RequestCompleted { request, .. }
            | GatewayEvent::RequestFailed { request, .. } => request,
        }
    }

    pub fn latency(&self) -> Duration {
        match self {
            GatewayEvent::RequestCompleted { latency, .. }
            | GatewayEvent::RequestFailed { latency, .. } => *latency,
        }
    }

    pub fn is_failure(&self) -> bool {
        matches!(self, GatewayEvent::RequestFailed { .. })
    }
}

/// Receives gateway events.
#[async_trait]
pub trait EventSink: Send + Sync {
    async fn emit(&self, event: GatewayEvent);
}

/// Discards every event.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopEventSink;

#[async_trait]
impl EventSink for NoopEventSink {
    async fn emit(&self, _event: GatewayEvent) {}
}

/// Logs every event.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingEventSink;

#[async_trait]
impl EventSink for TracingEventSink {
    async fn emit(&self, event: GatewayEvent) {
        match &event {
            GatewayEvent::RequestCompleted {
                request,
                response,
                provider_id,
                latency,
            } => info!(
                request_id = %request.id,
                provider = %provider_id,
                model = %response.model,
                cost = response.cost,
                latency_ms = latency.as_millis() as u64,
                "request completed"
            ),
            GatewayEvent::RequestFailed {
                request,
                provider_id,
                error,
                latency,
            } => warn!(
                request_id = %request.id,
                provider = %provider_id,
                error = %error,
                latency_ms = latency.as_millis() as u64,
                "request failed"
            ),
        }
    }
}

/// Forwards events into a bounded channel, waiting for capacity.
#[derive(Debug, Clone)]
pub struct ChannelEventSink {
    tx: mpsc::Sender<GatewayEvent>,
}

impl ChannelEventSink {
    /// Create a sink and the stream that receives its events.
    ///
    /// # Panics
    ///
    /// Panics if `buffer` is zero.
    pub fn channel(buffer: usize) -> (Self, ReceiverStream<GatewayEvent>) {
        let (tx, rx) = mpsc::channel(buffer);
        (Self { tx }, ReceiverStream::new(rx))
    }
}

#[async_trait]
impl EventSink for ChannelEventSink {
    async fn emit(&self, event: GatewayEvent) {
        if self.tx.send(event).await.is_err() {
            debug!("event receiver dropped; event discarded");
        }
    }
}
