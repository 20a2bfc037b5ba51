//! Results Module Tests
//!
//! ## Test Scopes
//! - **Status**: `UNKNOWN -> PENDING -> WORKING -> DONE` and the reported counts.
//! - **Integrity**: Duplicate, foreign and stale results never grow the protocol past its units.
//! - **Statistics**: Timing figures sent for accumulation.
//! - **Collection**: Fetching results from a fake worker and clearing the run.
//! - **HTTP**: Status and result endpoints.

#[cfg(test)]
mod tests {
    use crate::dispatch::client::WorkerClient;
    use crate::error::CoordinatorError;
    use crate::events::bus::EventSubscriber;
    use crate::events::types::WorkflowEvent;
    use crate::queue::types::{UnitResult, WorkUnit};
    use crate::registry::service::NodeRegistry;
    use crate::registry::types::{DomainType, NodeId, NodeStatus};
    use crate::results::handlers::{handle_result, handle_status};
    use crate::results::protocol::{ENDPOINT_RESULT, ENDPOINT_STATUS};
    use crate::results::store::RequestProtocolStore;
    use crate::results::types::{
        ComputationRequest, ComputationResult, ComputationStatus, RequestProtocol, ResultOutcome,
        Status,
    };
    use crate::test_support::FakeWorker;

    use axum::body::{Body, to_bytes};
    use axum::http::{Request, StatusCode};
    use axum::{Extension, Router, routing::get};
    use serde_json::json;
    use std::sync::Arc;
    use std::sync::atomic::Ordering;
    use std::time::Duration;
    use tower::ServiceExt;

    const RUN: u64 = 3;

    fn demo() -> DomainType {
        DomainType::new("DEMO")
    }

    fn store_with(registry: Arc<NodeRegistry>) -> RequestProtocolStore {
        RequestProtocolStore::new(
            registry,
            WorkerClient::new(Duration::from_secs(5)),
            2,
            Duration::from_millis(5),
        )
    }

    fn request(run_id: u64) -> ComputationRequest {
        let mut request = ComputationRequest::new("DEMO", json!({"items": [1, 2, 3]}));
        request.run_id = run_id;
        request.started_timestamp = 1_000;
        request
    }

    fn unit(run_id: u64, id: u64) -> WorkUnit {
        WorkUnit::new(demo(), run_id, id, json!({"value": id}))
    }

    fn result(unit: &WorkUnit, running_time: u64, finished: u64) -> UnitResult {
        UnitResult {
            work_package: unit.clone(),
            data: json!({"square": unit.id * unit.id}),
            node_id: Some(NodeId::from("node-1")),
            started_timestamp: finished - running_time,
            finished_timestamp: finished,
            running_time,
        }
    }

    fn prepared_store(registry: Arc<NodeRegistry>, units: u64) -> (RequestProtocolStore, Vec<WorkUnit>) {
        let store = store_with(registry);
        store.on_request_accepted(&demo(), &request(RUN));
        let units: Vec<WorkUnit> = (1..=units).map(|id| unit(RUN, id)).collect();
        store.on_preparation_finished(&demo(), &units, 40, 2);
        (store, units)
    }

    // ============================================================
    // STATUS TESTS
    // ============================================================

    #[test]
    fn test_status_progression() {
        let store = store_with(Arc::new(NodeRegistry::new()));
        assert_eq!(store.status(&demo()), ComputationStatus::unknown());

        store.on_request_accepted(&demo(), &request(RUN));
        let pending = store.status(&demo());
        assert_eq!(pending.status, Status::Pending);
        assert_eq!(pending.percent_done, 0);
        assert_eq!(pending.units_remaining, -1);

        let units: Vec<WorkUnit> = (1..=3).map(|id| unit(RUN, id)).collect();
        store.on_preparation_finished(&demo(), &units, 10, 1);
        let started = store.status(&demo());
        assert_eq!(started.status, Status::Working);
        assert_eq!(started.percent_done, 0);
        assert_eq!(started.units_remaining, 3);

        store.on_result_arrived(&result(&units[0], 5, 2_000));
        let working = store.status(&demo());
        assert_eq!(working.status, Status::Working);
        assert_eq!(working.percent_done, 33);
        assert_eq!(working.units_remaining, 2);

        store.on_result_arrived(&result(&units[1], 5, 2_000));
        assert_eq!(store.status(&demo()).percent_done, 67);

        store.on_result_arrived(&result(&units[2], 5, 2_000));
        let done = store.status(&demo());
        assert_eq!(done.status, Status::Done);
        assert_eq!(done.percent_done, 100);
        assert_eq!(done.units_remaining, 0);
    }

    #[test]
    fn test_status_wire_format() {
        let status = ComputationStatus {
            status: Status::Working,
            percent_done: 67,
            units_remaining: 1,
        };

        let value = serde_json::to_value(&status).unwrap();

        assert_eq!(
            value,
            json!({"status": "WORKING", "percentDone": 67, "unitsRemaining": 1})
        );
    }

    #[test]
    fn test_failed_only_arrives_from_workers() {
        let result: ComputationResult =
            serde_json::from_value(json!({"status": "FAILED", "errorMessage": "boom"})).unwrap();

        assert_eq!(result.status, Status::Failed);
        assert!(result.status.is_terminal());
        assert!(Status::Done.is_terminal());
        assert!(!Status::Working.is_terminal());
    }

    #[test]
    fn test_new_request_replaces_protocol() {
        let (store, units) = prepared_store(Arc::new(NodeRegistry::new()), 2);
        store.on_result_arrived(&result(&units[0], 1, 2_000));

        store.on_request_accepted(&demo(), &request(RUN + 1));

        assert_eq!(store.run_id(&demo()), Some(RUN + 1));
        assert_eq!(store.run_id(&DomainType::new("NONE")), None);
        let protocol = store.protocol(&demo()).unwrap();
        assert_eq!(protocol.run_id(), RUN + 1);
        assert!(protocol.units.is_empty());
        assert!(protocol.results.is_empty());
        assert_eq!(store.status(&demo()).status, Status::Pending);
    }

    // ============================================================
    // INTEGRITY TESTS
    // ============================================================

    #[test]
    fn test_results_never_exceed_units() {
        let (store, units) = prepared_store(Arc::new(NodeRegistry::new()), 2);

        let outcomes = vec![
            store.on_result_arrived(&result(&units[0], 1, 2_000)),
            store.on_result_arrived(&result(&units[0], 1, 2_000)),
            store.on_result_arrived(&result(&unit(RUN, 77), 1, 2_000)),
            store.on_result_arrived(&result(&unit(RUN - 1, 2), 1, 2_000)),
        ];

        assert_eq!(
            outcomes,
            vec![
                ResultOutcome::Recorded,
                ResultOutcome::Duplicate,
                ResultOutcome::UnknownUnit,
                ResultOutcome::StaleRun
            ]
        );
        let protocol = store.protocol(&demo()).unwrap();
        assert_eq!(protocol.results.len(), 1);
        assert!(protocol.results.len() <= protocol.units.len());
        assert_eq!(store.status(&demo()).status, Status::Working);
    }

    #[test]
    fn test_result_without_protocol_dropped() {
        let store = store_with(Arc::new(NodeRegistry::new()));

        let outcome = store.on_result_arrived(&result(&unit(RUN, 1), 1, 2_000));

        assert_eq!(outcome, ResultOutcome::NoProtocol);
        assert!(!store.has_protocol(&demo()));
    }

    #[test]
    fn test_stale_preparation_units_dropped() {
        let store = store_with(Arc::new(NodeRegistry::new()));
        store.on_request_accepted(&demo(), &request(RUN));

        store.on_preparation_finished(&demo(), &[unit(RUN - 1, 1), unit(RUN, 2)], 10, 1);

        let protocol = store.protocol(&demo()).unwrap();
        assert_eq!(protocol.units, vec![unit(RUN, 2)]);
        assert_eq!(protocol.request.number_wps, 1);
    }

    #[test]
    fn test_store_follows_events() {
        let store = store_with(Arc::new(NodeRegistry::new()));
        let units = vec![unit(RUN, 1)];

        store.on_event(&WorkflowEvent::RequestAccepted {
            domain: demo(),
            request: request(RUN),
        });
        store.on_event(&WorkflowEvent::PreparationFinished {
            domain: demo(),
            units: units.clone(),
            preparation_ms: 12,
            nodes_at_start: 4,
        });
        store.on_event(&WorkflowEvent::ResultArrived {
            result: result(&units[0], 3, 2_000),
        });

        let protocol = store.protocol(&demo()).unwrap();
        assert_eq!(protocol.request.preparation_time, 12);
        assert_eq!(protocol.request.number_nodes_start, 4);
        assert_eq!(store.status(&demo()).status, Status::Done);
        assert!(store.unfinished_units(&demo()).is_empty());
    }

    // ============================================================
    // STATISTICS TESTS
    // ============================================================

    #[test]
    fn test_results_protocol_statistics() {
        let mut protocol = RequestProtocol::new(request(RUN));
        let units: Vec<WorkUnit> = (1..=3).map(|id| unit(RUN, id)).collect();
        protocol.add_units(&units, 40, 2);
        protocol.add_result(&result(&units[0], 10, 1_500));
        protocol.add_result(&result(&units[1], 30, 1_800));
        protocol.add_result(&result(&units[2], 20, 1_700));

        let stats = protocol.results_protocol(5);

        assert_eq!(stats.domain, demo());
        assert_eq!(stats.work_package_results.len(), 3);
        assert_eq!(stats.started_timestamp, 1_000);
        assert_eq!(stats.finished_timestamp, 1_800);
        assert_eq!(stats.elapsed_time, 800);
        assert_eq!(stats.preparation_time, 40);
        assert_eq!(stats.min_wp_time, 10);
        assert_eq!(stats.max_wp_time, 30);
        assert_eq!(stats.avg_wp_time, 20);
        assert_eq!(stats.number_nodes_start, 2);
        assert_eq!(stats.number_nodes_end, 5);
        assert_eq!(stats.number_wps, 3);

        let value = serde_json::to_value(&stats).unwrap();
        assert_eq!(value["numberWPs"], 3);
        assert_eq!(value["workPackageResults"][0]["workPackage"]["runId"], RUN);
    }

    // ============================================================
    // COLLECTION TESTS
    // ============================================================

    #[tokio::test]
    async fn test_fetch_before_done_is_not_done() {
        let (store, _) = prepared_store(Arc::new(NodeRegistry::new()), 2);

        let fetched = store.fetch_and_clear_result(&demo()).await;

        assert!(matches!(fetched, Err(CoordinatorError::NotDone(_))));
        assert!(store.has_protocol(&demo()));
    }

    #[tokio::test]
    async fn test_fetch_accumulates_and_clears() {
        // ARRANGE
        let worker = FakeWorker::start().await;
        let registry = Arc::new(NodeRegistry::new());
        registry.register(worker.node("node-1", "DEMO")).unwrap();
        let (store, units) = prepared_store(registry.clone(), 2);
        for unit in &units {
            store.on_result_arrived(&result(unit, 5, 2_000));
        }

        // ACT
        let fetched = store.fetch_and_clear_result(&demo()).await.unwrap();

        // ASSERT
        assert_eq!(fetched.status, Status::Done);
        assert_eq!(fetched.results, Some(json!({"sum": 5})));
        assert_eq!(store.status(&demo()), ComputationStatus::unknown());
        assert_eq!(
            registry.status_of(&NodeId::from("node-1")),
            Some(NodeStatus::Ready)
        );

        let accumulated = worker.state.accumulated.lock();
        assert_eq!(accumulated.len(), 1);
        assert_eq!(accumulated[0].number_wps, 2);
        assert_eq!(accumulated[0].number_nodes_end, 1);
    }

    #[tokio::test]
    async fn test_failed_accumulation_keeps_protocol() {
        let worker = FakeWorker::start().await;
        worker.state.fail_accumulate.store(true, Ordering::SeqCst);
        let registry = Arc::new(NodeRegistry::new());
        registry.register(worker.node("node-1", "DEMO")).unwrap();
        let (store, units) = prepared_store(registry.clone(), 1);
        store.on_result_arrived(&result(&units[0], 5, 2_000));

        let fetched = store.fetch_and_clear_result(&demo()).await;

        let err = fetched.unwrap_err();
        assert!(err.is_network());
        assert_eq!(err.status_code(), StatusCode::BAD_GATEWAY);
        assert_eq!(store.status(&demo()).status, Status::Done);
        assert_eq!(
            registry.status_of(&NodeId::from("node-1")),
            Some(NodeStatus::Ready)
        );
    }

    #[tokio::test]
    async fn test_fetch_without_nodes_is_no_capacity() {
        let (store, units) = prepared_store(Arc::new(NodeRegistry::new()), 1);
        store.on_result_arrived(&result(&units[0], 5, 2_000));

        let fetched = store.fetch_and_clear_result(&demo()).await;

        assert!(matches!(
            fetched,
            Err(CoordinatorError::NoCapacity { attempts: 2 })
        ));
        assert!(store.has_protocol(&demo()));
    }

    // ============================================================
    // HTTP TESTS
    // ============================================================

    fn app(store: Arc<RequestProtocolStore>) -> Router {
        Router::new()
            .route(ENDPOINT_STATUS, get(handle_status))
            .route(ENDPOINT_RESULT, get(handle_result))
            .layer(Extension(store))
    }

    async fn get_json(app: Router, uri: &str) -> (StatusCode, serde_json::Value) {
        let response = app
            .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[tokio::test]
    async fn test_status_endpoint_unknown_domain() {
        let store = Arc::new(store_with(Arc::new(NodeRegistry::new())));

        let (status, body) = get_json(app(store), "/status/NOPE").await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(
            body,
            json!({"status": "UNKNOWN", "percentDone": -1, "unitsRemaining": -1})
        );
    }

    #[tokio::test]
    async fn test_result_endpoint_not_done() {
        let (store, _) = prepared_store(Arc::new(NodeRegistry::new()), 2);

        let (status, body) = get_json(app(Arc::new(store)), "/result/DEMO").await;

        assert_eq!(status, StatusCode::NOT_ACCEPTABLE);
        let result: ComputationResult = serde_json::from_value(body).unwrap();
        assert_eq!(result.status, Status::Working);
        assert_eq!(result.error_message.as_deref(), Some("Computation not done yet"));
        assert!(result.results.is_none());
    }
}
