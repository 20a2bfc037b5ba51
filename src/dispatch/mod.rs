//! Worker Dispatch Module
//!
//! Everything that calls out to worker nodes: the HTTP client for the worker
//! contract and the services that bracket each call with the node's
//! `Busy`/`Ready` transitions and report the outcome as an event.

pub mod client;
pub mod protocol;
pub mod service;
