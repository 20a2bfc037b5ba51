use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use parking_lot::RwLock;
use std::time::Duration;

use super::types::{DomainType, NodeId, NodeStatus, WorkerNode};
use crate::error::{CoordinatorError, Result};

/// Source of truth for node identity, node status and the active domain.
pub struct NodeRegistry {
    nodes: DashMap<NodeId, WorkerNode>,
    domain: RwLock<Option<DomainType>>,
}

impl NodeRegistry {
    pub fn new() -> Self {
        Self {
            nodes: DashMap::new(),
            domain: RwLock::new(None),
        }
    }

    /// Creates a registry whose active domain is fixed from the start.
    pub fn with_domain(domain: DomainType) -> Self {
        tracing::info!("Active domain pinned to {}", domain);
        Self {
            nodes: DashMap::new(),
            domain: RwLock::new(Some(domain)),
        }
    }

    pub fn has_nodes(&self) -> bool {
        !self.nodes.is_empty()
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn has_node(&self, id: &NodeId) -> bool {
        self.nodes.contains_key(id)
    }

    pub fn get_node(&self, id: &NodeId) -> Option<WorkerNode> {
        self.nodes.get(id).map(|entry| entry.value().clone())
    }

    pub fn status_of(&self, id: &NodeId) -> Option<NodeStatus> {
        self.nodes.get(id).map(|entry| entry.status)
    }

    pub fn uri_for(&self, id: &NodeId) -> Option<String> {
        match self.nodes.get(id) {
            Some(entry) => Some(entry.uri.clone()),
            None => {
                tracing::info!("Node with ID {} not found", id);
                None
            }
        }
    }

    /// All registered nodes, sorted by id.
    pub fn list_nodes(&self) -> Vec<WorkerNode> {
        let mut nodes: Vec<WorkerNode> = self
            .nodes
            .iter()
            .map(|entry| entry.value().clone())
            .collect();
        nodes.sort_by(|a, b| a.id.cmp(&b.id));
        nodes
    }

    pub fn active_domain(&self) -> Option<DomainType> {
        self.domain.read().clone()
    }

    /// Makes `domain` the active one if none is set yet.
    ///
    /// Returns the active domain, or `DomainMismatch` when a different domain
    /// already holds the registry.
    pub fn claim_domain(&self, domain: &DomainType) -> Result<DomainType> {
        let mut active = self.domain.write();
        match active.as_ref() {
            None => {
                tracing::info!("Domain not set - accepting domain {}", domain);
                *active = Some(domain.clone());
                Ok(domain.clone())
            }
            Some(current) if current == domain => Ok(current.clone()),
            Some(current) => Err(CoordinatorError::DomainMismatch {
                requested: domain.to_string(),
                active: current.to_string(),
            }),
        }
    }

    /// Registers a node and marks it `Ready`.
    ///
    /// Returns `Ok(false)` without touching anything when the id is already
    /// registered.
    pub fn register(&self, mut node: WorkerNode) -> Result<bool> {
        if node.id.0.trim().is_empty() {
            return Err(CoordinatorError::Validation(
                "Node id must not be empty".to_string(),
            ));
        }

        tracing::info!(
            "Register node {} for domain {} at {}",
            node.id,
            node.domain_type,
            node.uri
        );

        match self.nodes.entry(node.id.clone()) {
            Entry::Occupied(existing) => {
                tracing::info!("Node {} already registered: {:?}", node.id, existing.get());
                Ok(false)
            }
            Entry::Vacant(slot) => {
                if let Err(e) = self.claim_domain(&node.domain_type) {
                    tracing::info!("Node {} rejected: {}", node.id, e);
                    return Err(e);
                }

                node.set_status(NodeStatus::Ready);
                slot.insert(node.clone());

                tracing::info!(
                    "Node registered as {} and status changed to {}",
                    node.id,
                    NodeStatus::Ready
                );
                Ok(true)
            }
        }
    }

    /// Removes a node. Absent ids are only logged.
    pub fn unregister(&self, id: &NodeId) -> Option<WorkerNode> {
        match self.nodes.remove(id) {
            Some((_, mut node)) => {
                node.set_status(NodeStatus::Unavailable);
                tracing::info!("Node {} unregistered", id);
                Some(node)
            }
            None => {
                tracing::info!("Node with ID {} was not found and could not be removed", id);
                None
            }
        }
    }

    /// Reserves a `Ready` node serving `domain`.
    ///
    /// The status check and the `Ready -> Reserved` write happen under the
    /// node's entry lock, so two concurrent callers can never win the same node.
    pub fn reserve(&self, domain: &DomainType) -> Option<NodeId> {
        for mut entry in self.nodes.iter_mut() {
            let node = entry.value_mut();
            if node.domain_type == *domain && node.status == NodeStatus::Ready {
                node.set_status(NodeStatus::Reserved);
                tracing::debug!("Node {} status changed to {}", node.id, node.status);
                return Some(node.id.clone());
            }
        }

        None
    }

    /// Reserves a node, retrying a fixed number of times with a fixed pause.
    ///
    /// This waits on the caller's own task; it is the only deliberate wait on
    /// the client request path.
    pub async fn reserve_with_retry(
        &self,
        domain: &DomainType,
        attempts: u32,
        delay: Duration,
    ) -> Result<NodeId> {
        tracing::info!("Trying to reserve a node...");
        let attempts = attempts.max(1);

        for attempt in 0..attempts {
            if let Some(node_id) = self.reserve(domain) {
                tracing::info!("Reserved node is {}", node_id);
                return Ok(node_id);
            }

            if attempt + 1 < attempts {
                tracing::info!("Waiting for {:?} before retrying", delay);
                tokio::time::sleep(delay).await;
            }
        }

        tracing::info!("No free nodes found after {} retries", attempts);
        Err(CoordinatorError::NoCapacity { attempts })
    }

    /// `Reserved -> Busy`. Any other starting status is an invariant violation.
    pub fn occupy(&self, id: &NodeId) -> Result<()> {
        let mut entry = self.nodes.get_mut(id).ok_or_else(|| {
            tracing::error!("Node with ID {} unknown", id);
            CoordinatorError::UnknownNode(id.to_string())
        })?;

        if entry.status != NodeStatus::Reserved {
            tracing::error!(
                "Unexpected node status on occupy: Node with ID {} has status {} instead of RESERVED",
                id,
                entry.status
            );
            return Err(CoordinatorError::InvalidState {
                node_id: id.to_string(),
                expected: NodeStatus::Reserved.to_string(),
                actual: entry.status.to_string(),
            });
        }

        entry.set_status(NodeStatus::Busy);
        tracing::info!("Node {} status changed to {}", id, entry.status);
        Ok(())
    }

    /// `Busy -> Ready`. Other starting statuses are logged and overridden.
    pub fn free(&self, id: &NodeId) -> Result<()> {
        let mut entry = self.nodes.get_mut(id).ok_or_else(|| {
            tracing::info!("Node with ID {} unknown, nothing to free", id);
            CoordinatorError::UnknownNode(id.to_string())
        })?;

        if entry.status != NodeStatus::Busy {
            tracing::warn!(
                "Unexpected node status on free: Node with ID {} has status {} instead of BUSY",
                id,
                entry.status
            );
        }

        entry.set_status(NodeStatus::Ready);
        tracing::info!("Node {} status changed to {}", id, entry.status);
        Ok(())
    }

    /// Hands an unused reservation back through `Busy` so no step of the
    /// lifecycle is skipped.
    pub fn release_unused(&self, id: &NodeId) -> Result<()> {
        self.occupy(id)?;
        self.free(id)
    }
}

impl Default for NodeRegistry {
    fn default() -> Self {
        Self::new()
    }
}
