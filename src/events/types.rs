use crate::queue::types::{UnitResult, WorkUnit};
use crate::registry::types::DomainType;
use crate::results::types::ComputationRequest;
use tokio::sync::mpsc;

/// Progress notifications of a computation run.
#[derive(Debug, Clone)]
pub enum WorkflowEvent {
    /// A client request passed validation and a run was opened for it.
    RequestAccepted {
        domain: DomainType,
        request: ComputationRequest,
    },

    /// A worker split the request into work units.
    PreparationFinished {
        domain: DomainType,
        units: Vec<WorkUnit>,
        /// Duration of the preparation call in milliseconds.
        preparation_ms: u64,
        /// Registered nodes when preparation finished.
        nodes_at_start: usize,
    },

    /// A worker returned the result of one unit.
    ResultArrived { result: UnitResult },
}

impl WorkflowEvent {
    pub fn kind(&self) -> &'static str {
        match self {
            WorkflowEvent::RequestAccepted { .. } => "RequestAccepted",
            WorkflowEvent::PreparationFinished { .. } => "PreparationFinished",
            WorkflowEvent::ResultArrived { .. } => "ResultArrived",
        }
    }

    pub fn domain(&self) -> &DomainType {
        match self {
            WorkflowEvent::RequestAccepted { domain, .. } => domain,
            WorkflowEvent::PreparationFinished { domain, .. } => domain,
            WorkflowEvent::ResultArrived { result } => result.domain(),
        }
    }
}

pub type EventSender = mpsc::UnboundedSender<WorkflowEvent>;

pub type EventReceiver = mpsc::UnboundedReceiver<WorkflowEvent>;

pub fn create_event_channel() -> (EventSender, EventReceiver) {
    mpsc::unbounded_channel()
}
