use serde::{Deserialize, Serialize};
use std::fmt;

/// Unique identifier of a worker node, chosen by the node itself.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub String);

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for NodeId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

/// Identifies which kind of computation is being served.
///
/// Plain string value with structural equality; "DEMO" and "DEMO" are the same
/// domain no matter who created them.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct DomainType(pub String);

impl DomainType {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn is_empty(&self) -> bool {
        self.0.trim().is_empty()
    }
}

impl fmt::Display for DomainType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for DomainType {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

/// A node's place in its reservation lifecycle.
///
/// Nodes move `Unavailable -> Ready -> Reserved -> Busy -> Ready`; the remaining
/// variants are part of the wire format but never assigned by the registry.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "UPPERCASE")]
pub enum NodeStatus {
    Ready,
    Reserved,
    Busy,
    Done,
    Suspicious,
    #[default]
    Unavailable,
}

impl fmt::Display for NodeStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            NodeStatus::Ready => "READY",
            NodeStatus::Reserved => "RESERVED",
            NodeStatus::Busy => "BUSY",
            NodeStatus::Done => "DONE",
            NodeStatus::Suspicious => "SUSPICIOUS",
            NodeStatus::Unavailable => "UNAVAILABLE",
        };
        f.write_str(name)
    }
}

/// A remote, domain-specific compute endpoint registered with the coordinator.
///
/// `status` and `last_status_change` are coordinator-side bookkeeping: they are
/// reported in node listings but ignored when a node registers itself.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkerNode {
    pub id: NodeId,
    pub domain_type: DomainType,
    /// Base URI the coordinator uses to reach the node, e.g. `http://10.0.0.5:8081`.
    pub uri: String,

    #[serde(default, skip_deserializing)]
    pub status: NodeStatus,
    #[serde(default, skip_deserializing)]
    pub last_status_change: Option<u64>,
}

impl WorkerNode {
    pub fn new(id: impl Into<String>, domain: impl Into<String>, uri: impl Into<String>) -> Self {
        Self {
            id: NodeId(id.into()),
            domain_type: DomainType(domain.into()),
            uri: uri.into(),
            status: NodeStatus::Unavailable,
            last_status_change: None,
        }
    }

    /// Updates the status and stamps the time of the change.
    pub fn set_status(&mut self, status: NodeStatus) {
        self.status = status;
        self.last_status_change = Some(crate::queue::types::now_ms());
    }
}
