//! Error types for coordinator operations.

use axum::http::StatusCode;
use thiserror::Error;

/// Result type alias for coordinator operations.
pub type Result<T> = std::result::Result<T, CoordinatorError>;

/// Errors that can occur while coordinating nodes and computation runs.
#[derive(Debug, Error)]
pub enum CoordinatorError {
    /// Bad or missing request fields, or a worker rejected the payload.
    #[error("{0}")]
    Validation(String),

    /// No node could be reserved after the configured number of attempts.
    #[error("no free nodes found after {attempts} attempts")]
    NoCapacity {
        /// Number of reservation attempts made.
        attempts: u32,
    },

    /// A node or request targets a domain other than the active one.
    #[error("domain {requested} differs from the active domain {active}")]
    DomainMismatch {
        /// Domain the caller asked for.
        requested: String,
        /// Domain currently served by the registry.
        active: String,
    },

    /// A registry invariant was violated. Never retried.
    #[error("node {node_id} has status {actual} instead of {expected}")]
    InvalidState {
        /// Node whose status was unexpected.
        node_id: String,
        /// Status the transition required.
        expected: String,
        /// Status the node actually had.
        actual: String,
    },

    /// The node id is not registered.
    #[error("node with id {0} unknown")]
    UnknownNode(String),

    /// Results were requested before the computation finished.
    #[error("computation not done yet (status {0})")]
    NotDone(String),

    /// A call to a worker node failed.
    #[error("worker call failed: {0}")]
    Network(#[from] reqwest::Error),

    /// A worker answered with a non-success status code.
    #[error("worker {url} answered with {status}")]
    WorkerStatus {
        /// Full URL of the worker endpoint.
        url: String,
        /// Status code returned.
        status: u16,
    },
}

impl CoordinatorError {
    /// HTTP status used when this error reaches the request boundary.
    pub fn status_code(&self) -> StatusCode {
        match self {
            CoordinatorError::Validation(_)
            | CoordinatorError::DomainMismatch { .. }
            | CoordinatorError::NotDone(_) => StatusCode::NOT_ACCEPTABLE,
            CoordinatorError::NoCapacity { .. } | CoordinatorError::InvalidState { .. } => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
            CoordinatorError::UnknownNode(_) => StatusCode::NOT_FOUND,
            CoordinatorError::Network(_) | CoordinatorError::WorkerStatus { .. } => {
                StatusCode::BAD_GATEWAY
            }
        }
    }

    /// True for failures talking to a worker node.
    pub fn is_network(&self) -> bool {
        matches!(
            self,
            CoordinatorError::Network(_) | CoordinatorError::WorkerStatus { .. }
        )
    }
}
