//! Worker Node Contract
//!
//! Paths every worker node serves. All calls except `ping` are JSON `POST`s.

pub const ENDPOINT_VALIDATE_DATA: &str = "/validateData";
pub const ENDPOINT_PREPARE_AND_PACKAGE: &str = "/prepareAndPackageData";
pub const ENDPOINT_RUN_COMPUTATION: &str = "/runComputation";
pub const ENDPOINT_ACCUMULATE_RESULTS: &str = "/accumulateResults";
pub const ENDPOINT_PING: &str = "/ping";
