//! Node Management Endpoints
//!
//! Paths of the inbound API used by worker nodes to join or leave the
//! coordinator, plus the read-only views on the registry.

pub const ENDPOINT_REGISTER_NODE: &str = "/registerNode";
pub const ENDPOINT_UNREGISTER_NODE: &str = "/unregisterNode/:id";
pub const ENDPOINT_NUMBER_OF_NODES: &str = "/numberOfNodes";
pub const ENDPOINT_NODE_LIST: &str = "/getNodeList";
pub const ENDPOINT_ACTIVE_DOMAIN: &str = "/activeDomain";
