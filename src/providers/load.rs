//! Active-request registry.
//!
//! Every request in flight through the gateway holds an [`ActiveGuard`].
//! The router reads per-type counts for its congestion adjustment; the
//! guard's `Drop` deregisters the request on every exit path, including
//! early returns and panics.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::types::{GenerationRequest, Priority, RequestType};

/// Summary of a request currently in flight.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ActiveRequest {
    pub request_id: String,
    pub request_type: RequestType,
    pub priority: Priority,
    pub session_id: String,
    pub started_at: DateTime<Utc>,
}

/// Registry of in-flight requests.
#[derive(Debug, Default)]
pub struct ActiveRequests {
    next_slot: AtomicU64,
    inner: Mutex<HashMap<u64, ActiveRequest>>,
}

impl ActiveRequests {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<u64, ActiveRequest>> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Register a request. It stays active until the guard is dropped.
    ///
    /// Slots are independent of request ids, so the same request submitted
    /// twice counts twice.
    pub fn register(
        self: &Arc<Self>,
        request: &GenerationRequest,
        now: DateTime<Utc>,
    ) -> ActiveGuard {
        let slot = self.next_slot.fetch_add(1, Ordering::Relaxed);
        self.lock().insert(
            slot,
            ActiveRequest {
                request_id: request.id.clone(),
                request_type: request.request_type,
                priority: request.priority,
                session_id: request.session_id.clone(),
                started_at: now,
            },
        );
        ActiveGuard {
            registry: Arc::clone(self),
            slot,
        }
    }

    /// Number of active requests of a given type.
    pub fn count_by_type(&self, request_type: RequestType) -> usize {
        self.lock()
            .values()
            .filter(|r| r.request_type == request_type)
            .count()
    }

    /// Total number of active requests.
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Active requests, oldest first.
    pub fn list(&self) -> Vec<ActiveRequest> {
        let mut list: Vec<_> = self.lock().values().cloned().collect();
        list.sort_by(|a, b| a.started_at.cmp(&b.started_at));
        list
    }
}

/// Deregisters its request when dropped.
#[derive(Debug)]
pub struct ActiveGuard {
    registry: Arc<ActiveRequests>,
    slot: u64,
}

impl Drop for ActiveGuard {
    fn drop(&mut self) {
        self.registry.lock().remove(&self.slot);
    }
}
