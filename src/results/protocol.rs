//! Result Endpoints
//!
//! Paths clients poll for progress and collect the final answer from.

pub const ENDPOINT_STATUS: &str = "/status/:domain";
pub const ENDPOINT_RESULT: &str = "/result/:domain";

pub const MSG_NOT_DONE: &str = "Computation not done yet";
pub const MSG_NO_RESULTS: &str = "No results found";
