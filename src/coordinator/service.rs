use super::handlers::handle_start_computation;
use super::protocol::{
    ENDPOINT_START_COMPUTATION, MSG_VALIDATION_FAILED, MSG_VALIDATION_FAILED_RESPONSE_CODE,
};
use crate::config::CoordinatorConfig;
use crate::dispatch::client::WorkerClient;
use crate::dispatch::service::DispatchServices;
use crate::error::{CoordinatorError, Result};
use crate::events::bus::EventBus;
use crate::events::types::WorkflowEvent;
use crate::queue::service::WorkQueueManager;
use crate::queue::types::now_ms;
use crate::registry::handlers::{
    handle_active_domain, handle_node_list, handle_number_of_nodes, handle_register_node,
    handle_unregister_node,
};
use crate::registry::protocol::{
    ENDPOINT_ACTIVE_DOMAIN, ENDPOINT_NODE_LIST, ENDPOINT_NUMBER_OF_NODES, ENDPOINT_REGISTER_NODE,
    ENDPOINT_UNREGISTER_NODE,
};
use crate::registry::service::NodeRegistry;
use crate::registry::types::{DomainType, NodeId, NodeStatus};
use crate::results::handlers::{handle_result, handle_status};
use crate::results::protocol::{ENDPOINT_RESULT, ENDPOINT_STATUS};
use crate::results::store::RequestProtocolStore;
use crate::results::types::{ComputationRequest, Payload};

use axum::{
    Router,
    extract::Extension,
    routing::{get, post},
};
use std::sync::Arc;
use tokio::task::{JoinHandle, JoinSet};
use tokio::time::{Instant, MissedTickBehavior};

/// Owns every component of the coordinator and wires them together.
pub struct Coordinator {
    config: CoordinatorConfig,
    registry: Arc<NodeRegistry>,
    bus: Arc<EventBus>,
    protocols: Arc<RequestProtocolStore>,
    queue: Arc<WorkQueueManager>,
    dispatch: Arc<DispatchServices>,
}

impl Coordinator {
    /// Builds all components and subscribes the protocol store and the queue
    /// manager, in that order, to the event bus.
    pub fn new(config: CoordinatorConfig) -> Arc<Self> {
        let registry = Arc::new(match config.domain.as_deref().map(str::trim) {
            Some(domain) if !domain.is_empty() => NodeRegistry::with_domain(DomainType::new(domain)),
            _ => NodeRegistry::new(),
        });

        let client = WorkerClient::new(config.request_timeout());
        let bus = Arc::new(EventBus::new());

        let protocols = Arc::new(RequestProtocolStore::new(
            registry.clone(),
            client.clone(),
            config.retry_count,
            config.retry_delay(),
        ));
        let queue = Arc::new(WorkQueueManager::new(registry.clone(), protocols.clone()));
        let dispatch = Arc::new(DispatchServices::new(registry.clone(), client, bus.clone()));

        // Results must be recorded before their unit leaves the running set
        bus.subscribe(protocols.clone());
        bus.subscribe(queue.clone());

        Arc::new(Self {
            config,
            registry,
            bus,
            protocols,
            queue,
            dispatch,
        })
    }

    pub fn config(&self) -> &CoordinatorConfig {
        &self.config
    }

    pub fn registry(&self) -> &Arc<NodeRegistry> {
        &self.registry
    }

    pub fn bus(&self) -> &Arc<EventBus> {
        &self.bus
    }

    pub fn protocols(&self) -> &Arc<RequestProtocolStore> {
        &self.protocols
    }

    pub fn queue(&self) -> &Arc<WorkQueueManager> {
        &self.queue
    }

    pub fn dispatch(&self) -> &Arc<DispatchServices> {
        &self.dispatch
    }

    /// The inbound HTTP API.
    pub fn router(self: &Arc<Self>) -> Router {
        Router::new()
            .route(ENDPOINT_REGISTER_NODE, post(handle_register_node))
            .route(ENDPOINT_UNREGISTER_NODE, post(handle_unregister_node))
            .route(ENDPOINT_NUMBER_OF_NODES, get(handle_number_of_nodes))
            .route(ENDPOINT_NODE_LIST, get(handle_node_list))
            .route(ENDPOINT_ACTIVE_DOMAIN, get(handle_active_domain))
            .route(ENDPOINT_START_COMPUTATION, post(handle_start_computation))
            .route(ENDPOINT_STATUS, get(handle_status))
            .route(ENDPOINT_RESULT, get(handle_result))
            .layer(Extension(self.registry.clone()))
            .layer(Extension(self.protocols.clone()))
            .layer(Extension(self.clone()))
    }

    /// Spawns the event dispatcher, the distribution timer and the ping timer.
    pub fn start(self: &Arc<Self>) -> Vec<JoinHandle<()>> {
        let mut handles = Vec::with_capacity(3);

        match self.bus.clone().start() {
            Some(handle) => handles.push(handle),
            None => tracing::warn!("Event dispatcher already running"),
        }

        let coordinator = self.clone();
        handles.push(tokio::spawn(async move {
            let config = &coordinator.config;
            let mut interval = tokio::time::interval_at(
                Instant::now() + config.distribution_startup_delay(),
                config.distribution_interval(),
            );
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                interval.tick().await;
                coordinator.distribute_work();
            }
        }));

        let coordinator = self.clone();
        handles.push(tokio::spawn(async move {
            let config = &coordinator.config;
            let mut interval = tokio::time::interval_at(
                Instant::now() + config.ping_startup_delay(),
                config.ping_interval(),
            );
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                interval.tick().await;
                coordinator.ping_nodes().await;
            }
        }));

        tracing::info!(
            "Coordinator started: distribution every {:?}, ping every {:?}",
            self.config.distribution_interval(),
            self.config.ping_interval()
        );
        handles
    }

    /// Runs one distribution cycle now.
    pub fn distribute_work(&self) -> usize {
        self.queue.distribute_work(&self.dispatch)
    }

    /// Accepts a client request.
    ///
    /// The payload is validated synchronously on a reserved node; that same
    /// node then prepares the work units in the background. Returns once the
    /// preparation was handed off.
    pub async fn start_computation(&self, mut request: ComputationRequest) -> Result<()> {
        tracing::info!("Starting computation for domain {}", request.domain);

        if request.domain.is_empty() {
            return Err(CoordinatorError::Validation(
                "Domain must not be empty".to_string(),
            ));
        }
        let Some(payload) = request.payload.clone() else {
            return Err(CoordinatorError::Validation(
                "Payload must not be empty".to_string(),
            ));
        };

        let domain = self.registry.claim_domain(&request.domain)?;

        request.run_id = self.dispatch.next_run_id();
        request.started_timestamp = now_ms();

        let node_id = self
            .registry
            .reserve_with_retry(&domain, self.config.retry_count, self.config.retry_delay())
            .await?;

        if let Err(e) = self.validate_data(&node_id, &payload).await {
            tracing::info!("Freeing node {} because validation failed", node_id);
            if let Err(release) = self.registry.release_unused(&node_id) {
                tracing::error!("Failed to return node {}: {}", node_id, release);
            }
            return Err(e);
        }
        tracing::info!("Validation of run {} was successful", request.run_id);

        self.bus.publish(WorkflowEvent::RequestAccepted {
            domain: domain.clone(),
            request: request.clone(),
        });

        let dispatch = self.dispatch.clone();
        tokio::spawn(async move {
            let run_id = request.run_id;
            if let Err(e) = dispatch.prepare_and_package(&node_id, request).await {
                tracing::warn!("Preparation of run {} on node {} failed: {}", run_id, node_id, e);
            }
        });

        Ok(())
    }

    async fn validate_data(&self, node_id: &NodeId, payload: &Payload) -> Result<()> {
        let base = self
            .registry
            .uri_for(node_id)
            .ok_or_else(|| CoordinatorError::UnknownNode(node_id.to_string()))?;
        tracing::info!("Validating data using node {}", node_id);

        match self.dispatch.client().validate_data(&base, payload).await {
            Ok(errors) if errors.is_empty() => Ok(()),
            Ok(errors) => {
                tracing::info!("Validation failed - validation errors: {:?}", errors);
                Err(CoordinatorError::Validation(format!(
                    "{}{:?}",
                    MSG_VALIDATION_FAILED, errors
                )))
            }
            Err(CoordinatorError::WorkerStatus { status, .. }) => {
                tracing::info!("Validation failed - response code was {}", status);
                Err(CoordinatorError::Validation(format!(
                    "{}{}",
                    MSG_VALIDATION_FAILED_RESPONSE_CODE, status
                )))
            }
            Err(e) => Err(e),
        }
    }

    /// Probes every available node once. Unreachable nodes are only logged.
    ///
    /// Returns the number of nodes that answered.
    pub async fn ping_nodes(&self) -> usize {
        let mut probes = JoinSet::new();
        for node in self.registry.list_nodes() {
            if node.status == NodeStatus::Unavailable {
                continue;
            }
            let client = self.dispatch.client().clone();
            probes.spawn(async move {
                let outcome = client.ping(&node.uri).await;
                (node.id, outcome)
            });
        }

        let total = probes.len();
        let mut reachable = 0;
        while let Some(joined) = probes.join_next().await {
            match joined {
                Ok((_, Ok(()))) => reachable += 1,
                Ok((node_id, Err(e))) => {
                    tracing::warn!("Node {} did not answer ping: {}", node_id, e);
                }
                Err(e) => tracing::warn!("Ping task failed: {}", e),
            }
        }

        tracing::info!("Ping sweep: {} of {} nodes reachable", reachable, total);
        reachable
    }
}
