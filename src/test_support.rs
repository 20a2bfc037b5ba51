//! Shared fixtures for the module tests: an in-process fake worker node and
//! a few helpers to wire coordinator components around it.

use crate::config::CoordinatorConfig;
use crate::coordinator::service::Coordinator;
use crate::dispatch::protocol::{
    ENDPOINT_ACCUMULATE_RESULTS, ENDPOINT_PING, ENDPOINT_PREPARE_AND_PACKAGE,
    ENDPOINT_RUN_COMPUTATION, ENDPOINT_VALIDATE_DATA,
};
use crate::queue::types::{UnitResult, WorkUnit};
use crate::registry::types::{DomainType, NodeId, WorkerNode};
use crate::results::types::{
    ComputationRequest, ComputationResult, Payload, ResultsProtocol, Status,
};

use axum::response::{IntoResponse, Response};
use axum::{
    Extension, Json, Router,
    http::StatusCode,
    routing::{get, post},
};
use parking_lot::Mutex;
use serde_json::json;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;
use tokio::sync::Semaphore;
use tokio::task::JoinHandle;

/// Id workers put on the units they prepare; the coordinator must replace it.
pub const WORKER_UNIT_ID: u64 = 999;

/// Knobs and call records of a `FakeWorker`.
pub struct FakeWorkerState {
    pub validation_errors: Mutex<Vec<String>>,
    pub reject_validation: AtomicBool,
    pub fail_compute: AtomicBool,
    pub fail_accumulate: AtomicBool,
    /// When set, every compute call waits for a permit of `gate`.
    pub gated: AtomicBool,
    pub gate: Semaphore,
    pub prepare_calls: AtomicUsize,
    /// Compute calls received, counted before the gate.
    pub compute_received: AtomicUsize,
    pub compute_calls: AtomicUsize,
    pub pings: AtomicUsize,
    pub accumulated: Mutex<Vec<ResultsProtocol>>,
}

impl FakeWorkerState {
    fn new() -> Self {
        Self {
            validation_errors: Mutex::new(Vec::new()),
            reject_validation: AtomicBool::new(false),
            fail_compute: AtomicBool::new(false),
            fail_accumulate: AtomicBool::new(false),
            gated: AtomicBool::new(false),
            gate: Semaphore::new(0),
            prepare_calls: AtomicUsize::new(0),
            compute_received: AtomicUsize::new(0),
            compute_calls: AtomicUsize::new(0),
            pings: AtomicUsize::new(0),
            accumulated: Mutex::new(Vec::new()),
        }
    }
}

/// Worker node speaking the worker contract over real HTTP.
///
/// Preparation turns every entry of `payload.data.items` into one unit,
/// computation squares the unit's `value`, accumulation sums the squares.
pub struct FakeWorker {
    pub uri: String,
    pub state: Arc<FakeWorkerState>,
    task: JoinHandle<()>,
}

impl FakeWorker {
    pub async fn start() -> Self {
        let state = Arc::new(FakeWorkerState::new());

        let app = Router::new()
            .route(ENDPOINT_VALIDATE_DATA, post(validate_data))
            .route(ENDPOINT_PREPARE_AND_PACKAGE, post(prepare_and_package))
            .route(ENDPOINT_RUN_COMPUTATION, post(run_computation))
            .route(ENDPOINT_ACCUMULATE_RESULTS, post(accumulate_results))
            .route(ENDPOINT_PING, get(ping))
            .layer(Extension(state.clone()));

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("bind fake worker");
        let addr = listener.local_addr().expect("fake worker addr");

        let task = tokio::spawn(async move {
            let _ = axum::serve(listener, app).await;
        });

        Self {
            uri: format!("http://{}", addr),
            state,
            task,
        }
    }

    /// Starts a worker whose compute calls block until `release` is called.
    pub async fn start_gated() -> Self {
        let worker = Self::start().await;
        worker.state.gated.store(true, Ordering::SeqCst);
        worker
    }

    pub fn release(&self, calls: usize) {
        self.state.gate.add_permits(calls);
    }

    pub fn node(&self, id: &str, domain: &str) -> WorkerNode {
        WorkerNode::new(id, domain, self.uri.clone())
    }
}

impl Drop for FakeWorker {
    fn drop(&mut self) {
        self.task.abort();
    }
}

async fn validate_data(
    Extension(state): Extension<Arc<FakeWorkerState>>,
    Json(_payload): Json<Payload>,
) -> Response {
    if state.reject_validation.load(Ordering::SeqCst) {
        return StatusCode::BAD_REQUEST.into_response();
    }
    Json(state.validation_errors.lock().clone()).into_response()
}

async fn prepare_and_package(
    Extension(state): Extension<Arc<FakeWorkerState>>,
    Json(request): Json<ComputationRequest>,
) -> Json<Vec<WorkUnit>> {
    state.prepare_calls.fetch_add(1, Ordering::SeqCst);

    let items = request
        .payload
        .and_then(|payload| payload.data.get("items").cloned())
        .and_then(|items| items.as_array().cloned())
        .unwrap_or_default();

    Json(
        items
            .into_iter()
            .map(|value| {
                WorkUnit::new(DomainType::default(), 0, WORKER_UNIT_ID, json!({ "value": value }))
            })
            .collect(),
    )
}

async fn run_computation(
    Extension(state): Extension<Arc<FakeWorkerState>>,
    Json(unit): Json<WorkUnit>,
) -> Response {
    state.compute_received.fetch_add(1, Ordering::SeqCst);
    if state.gated.load(Ordering::SeqCst) {
        if let Ok(permit) = state.gate.acquire().await {
            permit.forget();
        }
    }
    state.compute_calls.fetch_add(1, Ordering::SeqCst);

    if state.fail_compute.load(Ordering::SeqCst) {
        return StatusCode::INTERNAL_SERVER_ERROR.into_response();
    }

    let value = unit.data.get("value").and_then(|v| v.as_i64()).unwrap_or(0);
    let mut echoed = unit;
    echoed.id = 0;

    Json(UnitResult {
        work_package: echoed,
        data: json!({ "square": value * value }),
        node_id: Some(NodeId::from("worker-side")),
        started_timestamp: 0,
        finished_timestamp: 0,
        running_time: 0,
    })
    .into_response()
}

async fn accumulate_results(
    Extension(state): Extension<Arc<FakeWorkerState>>,
    Json(protocol): Json<ResultsProtocol>,
) -> Response {
    if state.fail_accumulate.load(Ordering::SeqCst) {
        return StatusCode::INTERNAL_SERVER_ERROR.into_response();
    }

    let sum: i64 = protocol
        .work_package_results
        .iter()
        .filter_map(|result| result.data.get("square").and_then(|v| v.as_i64()))
        .sum();
    state.accumulated.lock().push(protocol);

    Json(ComputationResult {
        status: Status::Done,
        error_message: None,
        results: Some(json!({ "sum": sum })),
    })
    .into_response()
}

async fn ping(Extension(state): Extension<Arc<FakeWorkerState>>) -> StatusCode {
    state.pings.fetch_add(1, Ordering::SeqCst);
    StatusCode::OK
}

/// Base URI of a port nothing listens on.
pub async fn dead_uri() -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind");
    let addr = listener.local_addr().expect("addr");
    drop(listener);
    format!("http://{}", addr)
}

/// Coordinator with short retries and no timers running.
pub fn test_coordinator() -> Arc<Coordinator> {
    Coordinator::new(test_config())
}

pub fn test_config() -> CoordinatorConfig {
    CoordinatorConfig {
        retry_count: 2,
        retry_delay_ms: 10,
        request_timeout_ms: 5_000,
        ..CoordinatorConfig::default()
    }
}

/// Polls `condition` every 10 ms until it holds or five seconds passed.
pub async fn wait_until<F: Fn() -> bool>(condition: F) -> bool {
    for _ in 0..500 {
        if condition() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    condition()
}
