use super::types::{RunId, RunningEntry, UnitId, WorkUnit, now_ms};
use crate::dispatch::service::DispatchServices;
use crate::events::bus::EventSubscriber;
use crate::events::types::WorkflowEvent;
use crate::registry::service::NodeRegistry;
use crate::registry::types::{DomainType, NodeId};
use crate::results::store::RequestProtocolStore;

use dashmap::DashMap;
use parking_lot::Mutex;
use std::collections::{HashSet, VecDeque};
use std::sync::Arc;

/// Pending work per domain plus the set of units currently out on a node.
pub struct WorkQueueManager {
    /// FIFO of units waiting for a node, lazily created per domain.
    queues: DashMap<DomainType, Mutex<VecDeque<WorkUnit>>>,

    /// `Unit ID -> RunningEntry`. Shared with the dispatch tasks so a failed
    /// call can drop its own entry.
    running: Arc<DashMap<UnitId, RunningEntry>>,

    registry: Arc<NodeRegistry>,
    protocols: Arc<RequestProtocolStore>,
}

impl WorkQueueManager {
    pub fn new(registry: Arc<NodeRegistry>, protocols: Arc<RequestProtocolStore>) -> Self {
        Self {
            queues: DashMap::new(),
            running: Arc::new(DashMap::new()),
            registry,
            protocols,
        }
    }

    pub fn enqueue(&self, domain: &DomainType, units: Vec<WorkUnit>) {
        let count = units.len();
        let queue = self.queues.entry(domain.clone()).or_default();
        queue.lock().extend(units);
        tracing::info!("Added {} work units to queue of domain {}", count, domain);
    }

    pub fn queue_len(&self, domain: &DomainType) -> usize {
        self.queues
            .get(domain)
            .map(|queue| queue.lock().len())
            .unwrap_or(0)
    }

    pub fn running_count(&self) -> usize {
        self.running.len()
    }

    pub fn is_running(&self, unit_id: UnitId) -> bool {
        self.running.contains_key(&unit_id)
    }

    pub fn running_node(&self, unit_id: UnitId) -> Option<NodeId> {
        self.running.get(&unit_id).map(|entry| entry.node_id.clone())
    }

    /// Drops queued units of every run but `run_id`. Returns how many went.
    pub fn retain_run(&self, domain: &DomainType, run_id: RunId) -> usize {
        let Some(queue) = self.queues.get(domain) else {
            return 0;
        };
        let mut queue = queue.lock();
        let before = queue.len();
        queue.retain(|unit| unit.run_id == run_id);
        before - queue.len()
    }

    pub(crate) fn pop_next(&self, domain: &DomainType) -> Option<WorkUnit> {
        self.queues
            .get(domain)
            .and_then(|queue| queue.lock().pop_front())
    }

    pub(crate) fn track_running(&self, unit: WorkUnit, node_id: NodeId) {
        self.running.insert(
            unit.id,
            RunningEntry {
                unit,
                node_id,
                dispatched_at: now_ms(),
            },
        );
    }

    /// Forgets an in-flight unit once its result came in.
    pub fn complete(&self, unit_id: UnitId) -> Option<RunningEntry> {
        let removed = self.running.remove(&unit_id).map(|(_, entry)| entry);
        if removed.is_none() {
            tracing::debug!("Work unit {} was not in the running set", unit_id);
        }
        removed
    }

    /// One tick of the distribution timer.
    ///
    /// Hands queued units of the active domain to `Ready` nodes until either
    /// runs out. An empty queue triggers lost-work recovery instead. Must be
    /// called within a Tokio runtime; returns the number of units dispatched.
    pub fn distribute_work(&self, dispatch: &Arc<DispatchServices>) -> usize {
        let Some(domain) = self.registry.active_domain() else {
            tracing::trace!("No active domain, nothing to distribute");
            return 0;
        };

        if self.queue_len(&domain) == 0 {
            let recovered = self.recover_lost_work(&domain);
            if recovered > 0 {
                tracing::info!(
                    "Re-enqueued {} lost work units, dispatching next cycle",
                    recovered
                );
            }
            return 0;
        }

        let mut dispatched = 0;
        loop {
            let Some(node_id) = self.registry.reserve(&domain) else {
                tracing::debug!("No free node for domain {}, waiting for next cycle", domain);
                break;
            };

            let Some(unit) = self.pop_next(&domain) else {
                if let Err(e) = self.registry.release_unused(&node_id) {
                    tracing::error!("Failed to return unused node {}: {}", node_id, e);
                }
                break;
            };

            tracing::info!("Dispatching work unit {} to node {}", unit.id, node_id);
            self.track_running(unit.clone(), node_id.clone());

            let running = self.running.clone();
            let dispatch = dispatch.clone();
            tokio::spawn(async move {
                let unit_id = unit.id;
                if let Err(e) = dispatch.run_computation(&node_id, unit).await {
                    tracing::warn!(
                        "Work unit {} failed on node {}: {}. Left for recovery",
                        unit_id,
                        node_id,
                        e
                    );
                    // A recovered copy may already run elsewhere
                    running.remove_if(&unit_id, |_, entry| entry.node_id == node_id);
                }
            });

            dispatched += 1;
        }

        dispatched
    }

    /// Re-enqueues units of the open run that are neither finished, queued,
    /// nor running on a node the registry still knows.
    ///
    /// Running the recovery again without new completions in between finds
    /// nothing new.
    pub fn recover_lost_work(&self, domain: &DomainType) -> usize {
        let unfinished = self.protocols.unfinished_units(domain);
        if unfinished.is_empty() {
            return 0;
        }

        let queue = self.queues.entry(domain.clone()).or_default();
        let mut queue = queue.lock();
        let queued: HashSet<UnitId> = queue.iter().map(|unit| unit.id).collect();

        let mut recovered = 0;
        for unit in unfinished {
            if queued.contains(&unit.id) {
                continue;
            }

            let owner = self.running_node(unit.id);
            if let Some(node_id) = &owner {
                if self.registry.has_node(node_id) {
                    continue;
                }
                self.running.remove(&unit.id);
            }

            tracing::info!(
                "Lost work unit {} found (last node: {:?}), re-enqueueing",
                unit.id,
                owner.as_ref().map(|id| id.0.as_str())
            );
            queue.push_back(unit);
            recovered += 1;
        }

        recovered
    }
}

impl EventSubscriber for WorkQueueManager {
    fn name(&self) -> &'static str {
        "WorkQueueManager"
    }

    fn on_event(&self, event: &WorkflowEvent) {
        match event {
            WorkflowEvent::RequestAccepted { domain, request } => {
                let purged = self.retain_run(domain, request.run_id);
                if purged > 0 {
                    tracing::info!(
                        "Dropped {} queued work units of a previous run in domain {}",
                        purged,
                        domain
                    );
                }
            }
            WorkflowEvent::PreparationFinished { domain, units, .. } => {
                let Some(run_id) = self.protocols.run_id(domain) else {
                    tracing::warn!(
                        "No open run in domain {}, not queueing {} work units",
                        domain,
                        units.len()
                    );
                    return;
                };

                let current: Vec<WorkUnit> = units
                    .iter()
                    .filter(|unit| unit.run_id == run_id)
                    .cloned()
                    .collect();
                if current.len() < units.len() {
                    tracing::info!(
                        "Not queueing {} work units of a previous run in domain {}",
                        units.len() - current.len(),
                        domain
                    );
                }
                self.enqueue(domain, current);
            }
            WorkflowEvent::ResultArrived { result } => {
                self.complete(result.unit_id());
            }
        }
    }
}
