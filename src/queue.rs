//! FIFO admission queue and its dispatcher.
//!
//! [`RequestQueue::push`] accepts a request for asynchronous submission and
//! returns a [`QueueTicket`] that resolves to the request's outcome. The
//! dispatcher started by [`spawn_dispatcher`] pops at most one request per
//! tick and runs it on its own task, with no more than `max_in_flight`
//! dispatches running at once. A tick that finds every slot taken pops
//! nothing.
//!
//! Ordering is strictly FIFO; priority only matters to the router. Each
//! popped request is owned by exactly one dispatch.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::{Semaphore, oneshot};
use tracing::debug;

use crate::task::TaskHandle;
use crate::telemetry;
use crate::types::{GenerationRequest, Response};
use crate::{HuginnError, Result};

/// Executes a dequeued request.
#[async_trait]
pub trait RequestHandler: Send + Sync + 'static {
    async fn handle(&self, request: GenerationRequest) -> Result<Response>;
}

pub(crate) struct QueuedRequest {
    request: GenerationRequest,
    reply: oneshot::Sender<Result<Response>>,
}

#[derive(Default)]
struct QueueState {
    items: VecDeque<QueuedRequest>,
    closed: bool,
}

/// Resolves to the outcome of a queued request.
#[derive(Debug)]
pub struct QueueTicket {
    request_id: String,
    rx: oneshot::Receiver<Result<Response>>,
}

impl QueueTicket {
    pub fn request_id(&self) -> &str {
        &self.request_id
    }

    /// Wait for the request to be dispatched and completed.
    ///
    /// Resolves to [`HuginnError::QueueClosed`] if the queue was closed
    /// before the request was dispatched.
    pub async fn wait(self) -> Result<Response> {
        self.rx.await.unwrap_or(Err(HuginnError::QueueClosed))
    }
}

/// Strict FIFO of pending requests.
#[derive(Default)]
pub struct RequestQueue {
    state: Mutex<QueueState>,
}

impl RequestQueue {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, QueueState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Append a request.
    pub fn push(&self, request: GenerationRequest) -> Result<QueueTicket> {
        let (reply, rx) = oneshot::channel();
        let request_id = request.id.clone();
        let depth = {
            let mut state = self.lock();
            if state.closed {
                return Err(HuginnError::QueueClosed);
            }
            state.items.push_back(QueuedRequest { request, reply });
            state.items.len()
        };
        metrics::gauge!(telemetry::QUEUE_DEPTH).set(depth as f64);
        debug!(request_id = %request_id, depth, "request queued");
        Ok(QueueTicket { request_id, rx })
    }

    pub(crate) fn pop(&self) -> Option<QueuedRequest> {
        let (item, depth) = {
            let mut state = self.lock();
            (state.items.pop_front(), state.items.len())
        };
        if item.is_some() {
            metrics::gauge!(telemetry::QUEUE_DEPTH).set(depth as f64);
        }
        item
    }

    /// Number of requests waiting.
    pub fn pending(&self) -> usize {
        self.lock().items.len()
    }

    pub fn is_closed(&self) -> bool {
        self.lock().closed
    }

    /// Refuse new requests and fail every pending ticket with
    /// [`HuginnError::QueueClosed`]. Returns how many were pending.
    pub fn close(&self) -> usize {
        let drained: Vec<QueuedRequest> = {
            let mut state = self.lock();
            state.closed = true;
            state.items.drain(..).collect()
        };
        let count = drained.len();
        for item in drained {
            let _ = item.reply.send(Err(HuginnError::QueueClosed));
        }
        metrics::gauge!(telemetry::QUEUE_DEPTH).set(0.0);
        count
    }
}

impl std::fmt::Debug for RequestQueue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.lock();
        f.debug_struct("RequestQueue")
            .field("pending", &state.items.len())
            .field("closed", &state.closed)
            .finish()
    }
}

/// Drain `queue` into `handler`, one request per `interval` tick.
///
/// `max_in_flight` of zero is treated as one.
pub fn spawn_dispatcher(
    handler: Arc<dyn RequestHandler>,
    queue: Arc<RequestQueue>,
    interval: Duration,
    max_in_flight: usize,
) -> TaskHandle {
    let permits = Arc::new(Semaphore::new(max_in_flight.max(1)));
    TaskHandle::spawn_periodic("queue-dispatcher", interval, move || {
        let handler = Arc::clone(&handler);
        let queue = Arc::clone(&queue);
        let permits = Arc::clone(&permits);
        async move {
            let Ok(permit) = permits.try_acquire_owned() else {
                return;
            };
            let Some(item) = queue.pop() else {
                return;
            };
            debug!(request_id = %item.request.id, "dispatching queued request");
            tokio::spawn(async move {
                let _permit = permit;
                let outcome = handler.handle(item.request).await;
                let _ = item.reply.send(outcome);
            });
        }
    })
}
