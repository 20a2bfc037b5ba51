//! Node Registry Module
//!
//! Keeps track of every worker node registered with the coordinator and of the
//! single domain the coordinator currently serves.
//!
//! ## Core Mechanisms
//! - **Registration**: The first node (or request) to arrive fixes the active domain;
//!   nodes of any other domain are turned away.
//! - **Reservation**: Work is only handed to a node after it was atomically moved
//!   from `Ready` to `Reserved`, so a node never receives two jobs at once.
//! - **Lifecycle**: `Reserved -> Busy -> Ready` brackets every outbound call.

pub mod handlers;
pub mod protocol;
pub mod service;
pub mod types;
