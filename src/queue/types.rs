use crate::registry::types::{DomainType, NodeId};
use serde::{Deserialize, Serialize};

/// Identifier of a work unit. Assigned by the coordinator, unique per instance.
pub type UnitId = u64;

/// Identifier of one accepted computation request.
pub type RunId = u64;

/// An independently computable slice of a request's data.
///
/// Produced by a worker's preparation step. The coordinator overwrites
/// `domain`, `run_id` and `id` before the unit is queued, so workers may leave
/// them out.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct WorkUnit {
    #[serde(default)]
    pub domain: DomainType,
    #[serde(default)]
    pub run_id: RunId,
    #[serde(default)]
    pub id: UnitId,
    /// Opaque, domain-specific input for the worker.
    #[serde(default)]
    pub data: serde_json::Value,
}

impl WorkUnit {
    pub fn new(domain: DomainType, run_id: RunId, id: UnitId, data: serde_json::Value) -> Self {
        Self {
            domain,
            run_id,
            id,
            data,
        }
    }
}

/// Outcome of computing one `WorkUnit` on a worker node.
///
/// Node id and timestamps are stamped by the coordinator from its own
/// observation of the call.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct UnitResult {
    /// The unit exactly as it was dispatched.
    pub work_package: WorkUnit,
    #[serde(default)]
    pub data: serde_json::Value,
    #[serde(default)]
    pub node_id: Option<NodeId>,
    #[serde(default)]
    pub started_timestamp: u64,
    #[serde(default)]
    pub finished_timestamp: u64,
    /// Milliseconds between dispatch and response.
    #[serde(default)]
    pub running_time: u64,
}

impl UnitResult {
    pub fn unit_id(&self) -> UnitId {
        self.work_package.id
    }

    pub fn domain(&self) -> &DomainType {
        &self.work_package.domain
    }
}

/// An in-flight dispatch: which unit went to which node.
#[derive(Debug, Clone)]
pub struct RunningEntry {
    pub unit: WorkUnit,
    pub node_id: NodeId,
    pub dispatched_at: u64,
}

/// Current wall-clock time in milliseconds since the Unix epoch.
pub fn now_ms() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|elapsed| elapsed.as_millis() as u64)
        .unwrap_or_default()
}
