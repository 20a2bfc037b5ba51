use crate::queue::types::{RunId, UnitId, UnitResult, WorkUnit};
use crate::registry::types::DomainType;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;

/// Client-supplied input of a computation.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Payload {
    #[serde(default)]
    pub data: serde_json::Value,
}

/// A client request to run a computation.
///
/// Clients only send `domain` and `payload`; every other field is stamped by
/// the coordinator while the run progresses.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ComputationRequest {
    #[serde(default)]
    pub domain: DomainType,
    #[serde(default)]
    pub payload: Option<Payload>,
    #[serde(default)]
    pub run_id: RunId,
    #[serde(default)]
    pub started_timestamp: u64,
    #[serde(default)]
    pub preparation_time: u64,
    #[serde(default)]
    pub number_nodes_start: usize,
    #[serde(default, rename = "numberWPs")]
    pub number_wps: usize,
}

impl ComputationRequest {
    pub fn new(domain: impl Into<String>, data: serde_json::Value) -> Self {
        Self {
            domain: DomainType::new(domain),
            payload: Some(Payload { data }),
            ..Default::default()
        }
    }
}

/// Externally visible state of a domain's computation.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "UPPERCASE")]
pub enum Status {
    Unknown,
    Pending,
    Working,
    /// Only ever reported by a worker's `ComputationResult`.
    Failed,
    Done,
}

impl Status {
    /// Whether results may be collected.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Status::Done | Status::Failed)
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Status::Unknown => "UNKNOWN",
            Status::Pending => "PENDING",
            Status::Working => "WORKING",
            Status::Failed => "FAILED",
            Status::Done => "DONE",
        };
        f.write_str(name)
    }
}

/// Response of `/status/{domain}`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ComputationStatus {
    pub status: Status,
    /// `-1` when nothing is known about the domain.
    pub percent_done: i32,
    /// `-1` while the number of units is not known yet.
    pub units_remaining: i64,
}

impl ComputationStatus {
    pub fn unknown() -> Self {
        Self {
            status: Status::Unknown,
            percent_done: -1,
            units_remaining: -1,
        }
    }
}

/// Everything a worker needs to combine the unit results into a final answer.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ResultsProtocol {
    pub domain: DomainType,
    pub work_package_results: Vec<UnitResult>,
    pub started_timestamp: u64,
    pub finished_timestamp: u64,
    pub elapsed_time: u64,
    pub preparation_time: u64,
    pub min_wp_time: u64,
    pub max_wp_time: u64,
    pub avg_wp_time: u64,
    pub number_nodes_start: usize,
    pub number_nodes_end: usize,
    #[serde(rename = "numberWPs")]
    pub number_wps: usize,
}

/// Final answer of a computation, as produced by a worker's accumulation step.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ComputationResult {
    pub status: Status,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub results: Option<serde_json::Value>,
}

impl ComputationResult {
    pub fn error(status: Status, message: impl Into<String>) -> Self {
        Self {
            status,
            error_message: Some(message.into()),
            results: None,
        }
    }
}

/// What happened to a result handed to a `RequestProtocol`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResultOutcome {
    Recorded,
    Duplicate,
    UnknownUnit,
    StaleRun,
    /// No run is open for the result's domain.
    NoProtocol,
}

/// Append-only record of one run: the request, its units and their results.
#[derive(Debug, Clone)]
pub struct RequestProtocol {
    pub request: ComputationRequest,
    pub units: Vec<WorkUnit>,
    pub results: Vec<UnitResult>,
}

impl RequestProtocol {
    pub fn new(request: ComputationRequest) -> Self {
        Self {
            request,
            units: Vec::new(),
            results: Vec::new(),
        }
    }

    pub fn run_id(&self) -> RunId {
        self.request.run_id
    }

    pub fn has_unit(&self, id: UnitId) -> bool {
        self.units.iter().any(|unit| unit.id == id)
    }

    pub fn has_result(&self, id: UnitId) -> bool {
        self.results.iter().any(|result| result.unit_id() == id)
    }

    pub fn add_units(&mut self, units: &[WorkUnit], preparation_ms: u64, nodes_at_start: usize) {
        self.units.extend(units.iter().cloned());
        self.request.preparation_time += preparation_ms;
        self.request.number_nodes_start = nodes_at_start;
        self.request.number_wps = self.units.len();
    }

    /// Appends a result unless it belongs to another run, to no known unit,
    /// or its unit already reported.
    pub fn add_result(&mut self, result: &UnitResult) -> ResultOutcome {
        if result.work_package.run_id != self.run_id() {
            return ResultOutcome::StaleRun;
        }
        if !self.has_unit(result.unit_id()) {
            return ResultOutcome::UnknownUnit;
        }
        if self.has_result(result.unit_id()) {
            return ResultOutcome::Duplicate;
        }

        self.results.push(result.clone());
        ResultOutcome::Recorded
    }

    pub fn status(&self) -> ComputationStatus {
        let units = self.units.len();
        let results = self.results.len();

        if units == 0 && results == 0 {
            return ComputationStatus {
                status: Status::Pending,
                percent_done: 0,
                units_remaining: -1,
            };
        }

        if results > 0 && results == units {
            return ComputationStatus {
                status: Status::Done,
                percent_done: 100,
                units_remaining: 0,
            };
        }

        let percent = (100.0 * results as f64 / units.max(1) as f64).round() as i32;
        ComputationStatus {
            status: Status::Working,
            percent_done: percent,
            units_remaining: units.saturating_sub(results) as i64,
        }
    }

    /// Units that have not reported a result yet, in generation order.
    pub fn unfinished_units(&self) -> Vec<WorkUnit> {
        let done: HashSet<UnitId> = self.results.iter().map(UnitResult::unit_id).collect();
        self.units
            .iter()
            .filter(|unit| !done.contains(&unit.id))
            .cloned()
            .collect()
    }

    /// Builds the accumulation request with timing statistics over all results.
    pub fn results_protocol(&self, nodes_at_end: usize) -> ResultsProtocol {
        let started = self.request.started_timestamp;
        let finished = self
            .results
            .iter()
            .map(|result| result.finished_timestamp)
            .max()
            .unwrap_or(started);

        let times: Vec<u64> = self.results.iter().map(|result| result.running_time).collect();
        let min = times.iter().copied().min().unwrap_or_default();
        let max = times.iter().copied().max().unwrap_or_default();
        let avg = if times.is_empty() {
            0
        } else {
            times.iter().sum::<u64>() / times.len() as u64
        };

        ResultsProtocol {
            domain: self.request.domain.clone(),
            work_package_results: self.results.clone(),
            started_timestamp: started,
            finished_timestamp: finished,
            elapsed_time: finished.saturating_sub(started),
            preparation_time: self.request.preparation_time,
            min_wp_time: min,
            max_wp_time: max,
            avg_wp_time: avg,
            number_nodes_start: self.request.number_nodes_start,
            number_nodes_end: nodes_at_end,
            number_wps: self.units.len(),
        }
    }
}
