//! Work Queue Module
//!
//! Turns prepared work units into worker calls.
//!
//! ## Core Mechanisms
//! - **Queueing**: One FIFO per domain, filled when a preparation finishes.
//! - **Distribution**: A periodic cycle pairs queue heads with reserved nodes and
//!   dispatches each pair on its own task.
//! - **Running Set**: Every in-flight unit is tracked together with its node until
//!   the result arrives or the call fails.
//! - **Recovery**: When the queue runs dry before the run is complete, units that
//!   are neither finished nor running on a known node are queued again
//!   (at-least-once execution).

pub mod service;
pub mod types;
