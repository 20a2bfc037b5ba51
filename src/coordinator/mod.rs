//! Coordinator Module
//!
//! Assembles the registry, event bus, protocol store, work queue and dispatch
//! services into one explicitly constructed `Coordinator`, exposes them through
//! the HTTP router and drives the two periodic jobs:
//!
//! - **Distribution**: hands queued work units to free nodes, or recovers lost
//!   units once the queue is empty.
//! - **Ping**: probes every registered node and reports the unreachable ones.

pub mod handlers;
pub mod protocol;
pub mod service;
