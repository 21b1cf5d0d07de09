//! Tests for the admission queue and its dispatcher.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;

use huginn::queue::{RequestHandler, RequestQueue, spawn_dispatcher};
use huginn::{
    Gateway, GenerationRequest, HuginnError, ProviderClient, ProviderConfig, RequestType,
    Response, Result,
};

/// Records the order requests arrive in and how many run at once.
#[derive(Default)]
struct RecordingHandler {
    order: Mutex<Vec<String>>,
    per_id: Mutex<HashMap<String, usize>>,
    running: AtomicUsize,
    peak: AtomicUsize,
    work: Duration,
}

impl RecordingHandler {
    fn with_work(work: Duration) -> Arc<Self> {
        Arc::new(Self {
            work,
            ..Default::default()
        })
    }
}

#[async_trait]
impl RequestHandler for RecordingHandler {
    async fn handle(&self, request: GenerationRequest) -> Result<Response> {
        let now = self.running.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
        self.order.lock().unwrap().push(request.prompt.clone());
        *self
            .per_id
            .lock()
            .unwrap()
            .entry(request.id.clone())
            .or_default() += 1;

        tokio::time::sleep(self.work).await;
        self.running.fetch_sub(1, Ordering::SeqCst);
        Ok(Response {
            request_id: request.id,
            content: request.prompt,
            ..Default::default()
        })
    }
}

fn req(prompt: &str) -> GenerationRequest {
    GenerationRequest::new(RequestType::Logic, prompt)
}

#[tokio::test(start_paused = true)]
async fn dispatches_in_fifo_order() {
    let handler = RecordingHandler::with_work(Duration::from_millis(10));
    let queue = Arc::new(RequestQueue::new());
    let tickets: Vec<_> = ["first", "second", "third"]
        .into_iter()
        .map(|p| queue.push(req(p)).unwrap())
        .collect();

    let dispatcher = spawn_dispatcher(
        Arc::clone(&handler) as Arc<dyn RequestHandler>,
        Arc::clone(&queue),
        Duration::from_millis(100),
        1,
    );
    for ticket in tickets {
        ticket.wait().await.unwrap();
    }
    dispatcher.shutdown().await;

    assert_eq!(*handler.order.lock().unwrap(), ["first", "second", "third"]);
    assert_eq!(queue.pending(), 0);
}

#[tokio::test(start_paused = true)]
async fn ticket_receives_its_own_response() {
    let handler = RecordingHandler::with_work(Duration::ZERO);
    let queue = Arc::new(RequestQueue::new());
    let a = queue.push(req("apple")).unwrap();
    let b = queue.push(req("banana")).unwrap();
    let b_id = b.request_id().to_string();

    let dispatcher = spawn_dispatcher(handler, Arc::clone(&queue), Duration::from_millis(50), 4);
    let rb = b.wait().await.unwrap();
    let ra = a.wait().await.unwrap();
    dispatcher.shutdown().await;

    assert_eq!(ra.content, "apple");
    assert_eq!(rb.content, "banana");
    assert_eq!(rb.request_id, b_id);
}

#[tokio::test(start_paused = true)]
async fn every_request_is_dispatched_exactly_once() {
    let handler = RecordingHandler::with_work(Duration::from_millis(250));
    let queue = Arc::new(RequestQueue::new());
    let tickets: Vec<_> = (0..12)
        .map(|i| queue.push(req(&format!("job {i}"))).unwrap())
        .collect();

    let dispatcher = spawn_dispatcher(
        Arc::clone(&handler) as Arc<dyn RequestHandler>,
        Arc::clone(&queue),
        Duration::from_millis(10),
        3,
    );
    for ticket in tickets {
        ticket.wait().await.unwrap();
    }
    dispatcher.shutdown().await;

    let per_id = handler.per_id.lock().unwrap();
    assert_eq!(per_id.len(), 12);
    assert!(per_id.values().all(|&n| n == 1));
}

#[tokio::test(start_paused = true)]
async fn in_flight_dispatch_is_bounded() {
    let handler = RecordingHandler::with_work(Duration::from_secs(1));
    let queue = Arc::new(RequestQueue::new());
    let tickets: Vec<_> = (0..8)
        .map(|i| queue.push(req(&format!("job {i}"))).unwrap())
        .collect();

    let dispatcher = spawn_dispatcher(
        Arc::clone(&handler) as Arc<dyn RequestHandler>,
        Arc::clone(&queue),
        Duration::from_millis(10),
        2,
    );
    for ticket in tickets {
        ticket.wait().await.unwrap();
    }
    dispatcher.shutdown().await;

    assert_eq!(handler.peak.load(Ordering::SeqCst), 2);
}

#[tokio::test(start_paused = true)]
async fn stopped_dispatcher_leaves_queue_untouched() {
    let handler = RecordingHandler::with_work(Duration::ZERO);
    let queue = Arc::new(RequestQueue::new());

    let dispatcher = spawn_dispatcher(
        Arc::clone(&handler) as Arc<dyn RequestHandler>,
        Arc::clone(&queue),
        Duration::from_millis(10),
        1,
    );
    dispatcher.shutdown().await;

    queue.push(req("late")).unwrap();
    tokio::time::sleep(Duration::from_secs(1)).await;
    assert_eq!(queue.pending(), 1);
    assert!(handler.order.lock().unwrap().is_empty());
}

#[tokio::test]
async fn closing_the_queue_fails_waiters() {
    let queue = RequestQueue::new();
    let ticket = queue.push(req("never")).unwrap();
    assert_eq!(queue.close(), 1);
    assert!(queue.is_closed());
    assert!(matches!(ticket.wait().await, Err(HuginnError::QueueClosed)));
    assert!(matches!(queue.push(req("after")), Err(HuginnError::QueueClosed)));
}

// =========================================================================
// Through the gateway
// =========================================================================

struct Echo;

#[async_trait]
impl ProviderClient for Echo {
    async fn invoke(&self, _provider: &ProviderConfig, request: &GenerationRequest) -> Result<Response> {
        Ok(Response {
            content: request.prompt.to_uppercase(),
            ..Default::default()
        })
    }
}

#[tokio::test(start_paused = true)]
async fn gateway_serves_enqueued_requests() {
    let gw = Arc::new(
        Gateway::builder()
            .provider(ProviderConfig::new("echo", "echo-1"))
            .client(Arc::new(Echo))
            .dispatch_interval(Duration::from_millis(20))
            .build()
            .unwrap(),
    );

    let ticket = gw.enqueue(req("queued hello")).unwrap();
    assert_eq!(gw.service_status().queue_depth, 1);

    let tasks = gw.start();
    let response = ticket.wait().await.unwrap();
    tasks.shutdown().await;

    assert_eq!(response.content, "QUEUED HELLO");
    assert_eq!(gw.stats().total_requests, 1);
    assert!(gw.active_requests().is_empty());
}

#[tokio::test(start_paused = true)]
async fn gateway_shutdown_fails_waiting_tickets() {
    let gw = Arc::new(
        Gateway::builder()
            .provider(ProviderConfig::new("echo", "echo-1"))
            .client(Arc::new(Echo))
            .dispatch_interval(Duration::from_secs(3600))
            .build()
            .unwrap(),
    );

    let tasks = gw.start();
    // Let the first immediate tick pass before anything is queued.
    tokio::time::sleep(Duration::from_secs(1)).await;
    let ticket = gw.enqueue(req("left behind")).unwrap();
    tasks.shutdown().await;

    let outcome = tokio::time::timeout(Duration::from_secs(86_400), ticket.wait())
        .await
        .expect("ticket resolves after shutdown");
    assert!(matches!(outcome, Err(HuginnError::QueueClosed)));
    assert_eq!(gw.service_status().queue_depth, 0);
    assert!(matches!(gw.enqueue(req("too late")), Err(HuginnError::QueueClosed)));
    assert_eq!(gw.stats().total_requests, 0);
}
