//! Computation Submission Endpoint

pub const ENDPOINT_START_COMPUTATION: &str = "/startComputation";

/// Reply sent once a request was validated and handed to a worker for preparation.
pub const MSG_ACCEPTED: &str = "Data accepted, computation submitted";

pub const MSG_VALIDATION_FAILED: &str = "Data validation failed: ";
pub const MSG_VALIDATION_FAILED_RESPONSE_CODE: &str = "Data validation failed: response code=";
