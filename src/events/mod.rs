//! Workflow Events
//!
//! Decouples the services that talk to worker nodes from the components that
//! keep track of a run. Three kinds of events exist: a request was accepted,
//! its preparation finished, a unit result arrived.

pub mod bus;
pub mod types;
