//! Cancellable fixed-interval background tasks.
//!
//! Health probing, cache sweeping and queue draining each run as a
//! [`TaskHandle`]: a tokio task driven by `tokio::time::interval` that exits
//! when its shutdown signal fires. Handles are independent, so each loop can
//! be started and stopped on its own.

use std::future::Future;
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info};

/// Handle to a running periodic task.
#[derive(Debug)]
pub struct TaskHandle {
    name: &'static str,
    shutdown: watch::Sender<bool>,
    join: JoinHandle<()>,
}

impl TaskHandle {
    /// Spawn `tick` every `period`. The first tick runs immediately.
    ///
    /// A tick that overruns the period delays the next one rather than
    /// bursting to catch up.
    ///
    /// # Panics
    ///
    /// Requires a tokio runtime context; panics if `period` is zero.
    pub fn spawn_periodic<F, Fut>(name: &'static str, period: Duration, mut tick: F) -> Self
    where
        F: FnMut() -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let (shutdown, mut shutdown_rx) = watch::channel(false);
        let join = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            debug!(task = name, period_ms = period.as_millis() as u64, "task started");
            loop {
                tokio::select! {
                    _ = ticker.tick() => tick().await,
                    _ = shutdown_rx.changed() => {
                        info!(task = name, "task shutdown signal received");
                        break;
                    }
                }
            }
        });
        Self {
            name,
            shutdown,
            join,
        }
    }

    /// Task name, for logs.
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Whether the task has exited.
    pub fn is_finished(&self) -> bool {
        self.join.is_finished()
    }

    /// Signal the task to stop and wait for it to exit. A tick that is
    /// already running completes first.
    pub async fn shutdown(self) {
        let _ = self.shutdown.send(true);
        let _ = self.join.await;
    }
}
