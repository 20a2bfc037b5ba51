use super::client::WorkerClient;
use crate::error::{CoordinatorError, Result};
use crate::events::bus::EventBus;
use crate::events::types::WorkflowEvent;
use crate::queue::types::{RunId, UnitId, WorkUnit, now_ms};
use crate::registry::service::NodeRegistry;
use crate::registry::types::NodeId;
use crate::results::types::ComputationRequest;

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

/// Runs the two asynchronous worker calls of a computation.
///
/// Both calls follow the same pattern: the node handed in must be `Reserved`,
/// it is `Busy` for exactly the duration of the call and `Ready` afterwards,
/// whether the call succeeded or not. Successful calls are reported on the
/// event bus.
pub struct DispatchServices {
    registry: Arc<NodeRegistry>,
    client: WorkerClient,
    bus: Arc<EventBus>,
    next_run_id: AtomicU64,
    next_unit_id: AtomicU64,
}

impl DispatchServices {
    pub fn new(registry: Arc<NodeRegistry>, client: WorkerClient, bus: Arc<EventBus>) -> Self {
        Self {
            registry,
            client,
            bus,
            next_run_id: AtomicU64::new(1),
            next_unit_id: AtomicU64::new(1),
        }
    }

    pub fn client(&self) -> &WorkerClient {
        &self.client
    }

    /// Allocates the id of a newly accepted request.
    pub fn next_run_id(&self) -> RunId {
        self.next_run_id.fetch_add(1, Ordering::Relaxed)
    }

    fn next_unit_id(&self) -> UnitId {
        self.next_unit_id.fetch_add(1, Ordering::Relaxed)
    }

    /// Has `node_id` split the request into work units and publishes them.
    ///
    /// Returns the number of units produced.
    pub async fn prepare_and_package(
        &self,
        node_id: &NodeId,
        request: ComputationRequest,
    ) -> Result<usize> {
        let base = self.node_uri(node_id)?;
        let started = Instant::now();

        self.registry.occupy(node_id)?;
        tracing::info!(
            "Preparing data of run {} in domain {} on node {}",
            request.run_id,
            request.domain,
            node_id
        );
        let outcome = self.client.prepare_and_package(&base, &request).await;
        self.release(node_id);

        let units = outcome?;
        let preparation_ms = started.elapsed().as_millis() as u64;
        tracing::info!(
            "Preparation phase on node {} took {} ms and produced {} work units",
            node_id,
            preparation_ms,
            units.len()
        );

        let units: Vec<WorkUnit> = units
            .into_iter()
            .map(|unit| {
                WorkUnit::new(
                    request.domain.clone(),
                    request.run_id,
                    self.next_unit_id(),
                    unit.data,
                )
            })
            .collect();
        let count = units.len();

        self.bus.publish(WorkflowEvent::PreparationFinished {
            domain: request.domain.clone(),
            units,
            preparation_ms,
            nodes_at_start: self.registry.node_count(),
        });

        Ok(count)
    }

    /// Computes one unit on `node_id` and publishes its result.
    pub async fn run_computation(&self, node_id: &NodeId, unit: WorkUnit) -> Result<()> {
        let base = self.node_uri(node_id)?;

        self.registry.occupy(node_id)?;
        tracing::debug!("Running work unit {} on node {}", unit.id, node_id);
        let started = now_ms();
        let outcome = self.client.run_computation(&base, &unit).await;
        let finished = now_ms();
        self.release(node_id);

        let mut result = outcome?;
        result.work_package = unit;
        result.node_id = Some(node_id.clone());
        result.started_timestamp = started;
        result.finished_timestamp = finished;
        result.running_time = finished.saturating_sub(started);

        tracing::debug!(
            "Work unit {} finished on node {} after {} ms",
            result.unit_id(),
            node_id,
            result.running_time
        );
        self.bus.publish(WorkflowEvent::ResultArrived { result });

        Ok(())
    }

    fn node_uri(&self, node_id: &NodeId) -> Result<String> {
        self.registry
            .uri_for(node_id)
            .ok_or_else(|| CoordinatorError::UnknownNode(node_id.to_string()))
    }

    fn release(&self, node_id: &NodeId) {
        match self.registry.free(node_id) {
            Ok(()) => {}
            Err(CoordinatorError::UnknownNode(_)) => {
                tracing::info!("Node {} left during its call, nothing to free", node_id);
            }
            Err(e) => tracing::warn!("Failed to free node {}: {}", node_id, e),
        }
    }
}
