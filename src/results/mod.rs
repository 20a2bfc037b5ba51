//! Run Protocols and Results
//!
//! Records, per domain, the request being served, the work units it was split
//! into and every result reported so far. Progress reported to clients is
//! derived from these counts, and the final answer is produced by handing all
//! results to one worker for accumulation.
//!
//! ## Status Progression
//! `UNKNOWN -> PENDING -> WORKING -> DONE`, after which a successful result
//! fetch removes the protocol and the domain reads `UNKNOWN` again.

pub mod handlers;
pub mod protocol;
pub mod store;
pub mod types;

#[cfg(test)]
mod tests;
