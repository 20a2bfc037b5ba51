use super::protocol::MSG_NO_RESULTS;
use super::types::{
    ComputationRequest, ComputationResult, ComputationStatus, RequestProtocol, ResultOutcome,
};
use crate::dispatch::client::WorkerClient;
use crate::error::{CoordinatorError, Result};
use crate::events::bus::EventSubscriber;
use crate::events::types::WorkflowEvent;
use crate::queue::types::{RunId, UnitResult, WorkUnit};
use crate::registry::service::NodeRegistry;
use crate::registry::types::DomainType;

use dashmap::DashMap;
use std::sync::Arc;
use std::time::Duration;

/// Keeps the `RequestProtocol` of every domain with an open run.
pub struct RequestProtocolStore {
    protocols: DashMap<DomainType, RequestProtocol>,
    registry: Arc<NodeRegistry>,
    client: WorkerClient,
    retry_count: u32,
    retry_delay: Duration,
}

impl RequestProtocolStore {
    pub fn new(
        registry: Arc<NodeRegistry>,
        client: WorkerClient,
        retry_count: u32,
        retry_delay: Duration,
    ) -> Self {
        Self {
            protocols: DashMap::new(),
            registry,
            client,
            retry_count,
            retry_delay,
        }
    }

    pub fn has_protocol(&self, domain: &DomainType) -> bool {
        self.protocols.contains_key(domain)
    }

    /// Snapshot of a domain's protocol.
    pub fn protocol(&self, domain: &DomainType) -> Option<RequestProtocol> {
        self.protocols.get(domain).map(|entry| entry.value().clone())
    }

    /// Run id of the domain's open run.
    pub fn run_id(&self, domain: &DomainType) -> Option<RunId> {
        self.protocols.get(domain).map(|protocol| protocol.run_id())
    }

    /// Opens a new run for `domain`, discarding whatever was recorded before.
    pub fn on_request_accepted(&self, domain: &DomainType, request: &ComputationRequest) {
        let previous = self
            .protocols
            .insert(domain.clone(), RequestProtocol::new(request.clone()));

        if let Some(previous) = previous {
            tracing::warn!(
                "Protocol of run {} in domain {} replaced by run {}",
                previous.run_id(),
                domain,
                request.run_id
            );
        }
        tracing::info!("ComputationRequest added to protocol in domain {}", domain);
    }

    pub fn on_preparation_finished(
        &self,
        domain: &DomainType,
        units: &[WorkUnit],
        preparation_ms: u64,
        nodes_at_start: usize,
    ) {
        let Some(mut protocol) = self.protocols.get_mut(domain) else {
            tracing::warn!(
                "No protocol in domain {}, dropping {} work units",
                domain,
                units.len()
            );
            return;
        };

        let run_id = protocol.run_id();
        let current: Vec<WorkUnit> = units
            .iter()
            .filter(|unit| unit.run_id == run_id)
            .cloned()
            .collect();
        if current.len() < units.len() {
            tracing::warn!(
                "Dropped {} work units of a previous run in domain {}",
                units.len() - current.len(),
                domain
            );
        }

        protocol.add_units(&current, preparation_ms, nodes_at_start);
        tracing::info!(
            "Added {} work units to protocol in domain {}",
            current.len(),
            domain
        );
    }

    pub fn on_result_arrived(&self, result: &UnitResult) -> ResultOutcome {
        let domain = result.domain();
        let outcome = match self.protocols.get_mut(domain) {
            Some(mut protocol) => protocol.add_result(result),
            None => ResultOutcome::NoProtocol,
        };

        match outcome {
            ResultOutcome::Recorded => tracing::info!(
                "Result added for work unit {} in domain {}",
                result.unit_id(),
                domain
            ),
            other => tracing::warn!(
                "Result for work unit {} in domain {} dropped: {:?}",
                result.unit_id(),
                domain,
                other
            ),
        }
        outcome
    }

    pub fn status(&self, domain: &DomainType) -> ComputationStatus {
        match self.protocols.get(domain) {
            Some(protocol) => protocol.status(),
            None => {
                tracing::debug!("No request submitted for domain {}", domain);
                ComputationStatus::unknown()
            }
        }
    }

    /// Units of the open run that have not reported a result yet.
    pub fn unfinished_units(&self, domain: &DomainType) -> Vec<WorkUnit> {
        self.protocols
            .get(domain)
            .map(|protocol| protocol.unfinished_units())
            .unwrap_or_default()
    }

    /// Has a worker combine the results of a finished run and closes the run.
    ///
    /// The protocol is only removed when the worker accepted the accumulation
    /// and no newer run replaced it in the meantime. The reserved node is
    /// freed whatever the outcome.
    pub async fn fetch_and_clear_result(&self, domain: &DomainType) -> Result<ComputationResult> {
        let status = self.status(domain);
        tracing::info!("Computation status is {:?}", status);
        if !status.status.is_terminal() {
            return Err(CoordinatorError::NotDone(status.status.to_string()));
        }

        let snapshot = self
            .protocol(domain)
            .ok_or_else(|| CoordinatorError::NotDone(status.status.to_string()))?;
        if snapshot.results.is_empty() {
            return Ok(ComputationResult::error(status.status, MSG_NO_RESULTS));
        }
        tracing::info!(
            "Protocol for domain {} contains {} results",
            domain,
            snapshot.results.len()
        );

        let node_id = self
            .registry
            .reserve_with_retry(domain, self.retry_count, self.retry_delay)
            .await?;
        let base = self
            .registry
            .uri_for(&node_id)
            .ok_or_else(|| CoordinatorError::UnknownNode(node_id.to_string()))?;

        let accumulation = snapshot.results_protocol(self.registry.node_count());

        self.registry.occupy(&node_id)?;
        let outcome = self.client.accumulate_results(&base, &accumulation).await;
        match self.registry.free(&node_id) {
            Ok(()) => {}
            Err(CoordinatorError::UnknownNode(_)) => {
                tracing::info!("Node {} left during accumulation", node_id);
            }
            Err(e) => tracing::warn!("Failed to free node {} after accumulation: {}", node_id, e),
        }

        let result = outcome.map_err(|e| {
            tracing::warn!("Accumulation on node {} failed: {}", node_id, e);
            e
        })?;
        tracing::info!("Computation result received: {:?}", result.status);

        let run_id = snapshot.run_id();
        if self
            .protocols
            .remove_if(domain, |_, protocol| protocol.run_id() == run_id)
            .is_some()
        {
            tracing::info!("Removing protocol of domain {} from result store", domain);
        }

        Ok(result)
    }
}

impl EventSubscriber for RequestProtocolStore {
    fn name(&self) -> &'static str {
        "RequestProtocolStore"
    }

    fn on_event(&self, event: &WorkflowEvent) {
        match event {
            WorkflowEvent::RequestAccepted { domain, request } => {
                self.on_request_accepted(domain, request);
            }
            WorkflowEvent::PreparationFinished {
                domain,
                units,
                preparation_ms,
                nodes_at_start,
            } => {
                self.on_preparation_finished(domain, units, *preparation_ms, *nodes_at_start);
            }
            WorkflowEvent::ResultArrived { result } => {
                self.on_result_arrived(result);
            }
        }
    }
}
