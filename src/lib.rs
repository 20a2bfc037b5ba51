//! Computation Coordinator Library
//!
//! This library crate defines the modules of a coordinator that accepts
//! computation requests, has worker nodes split them into work units and
//! distributes those units across every node serving the active domain.
//! It serves as the foundation for the binary executable (`main.rs`).
//!
//! ## Architecture Modules
//!
//! - **`registry`**: Worker node membership, the reservation lifecycle and the
//!   single active domain.
//! - **`events`**: In-process event bus connecting request intake, preparation
//!   and result arrival to their subscribers.
//! - **`results`**: Per-domain request protocols, progress reporting and the
//!   final result collection.
//! - **`queue`**: Pending work units per domain, the in-flight set and the
//!   recovery of lost units.
//! - **`dispatch`**: Outbound calls to worker nodes.
//! - **`coordinator`**: Wiring of all components, the HTTP router and the
//!   periodic distribution and ping jobs.

pub mod config;
pub mod coordinator;
pub mod dispatch;
pub mod error;
pub mod events;
pub mod queue;
pub mod registry;
pub mod results;

#[cfg(test)]
mod test_support;
