//! Chunked submission of long item lists to bulk remote calls.
//!
//! A remote call that accepts at most `L` items is invoked once per chunk
//! of the input, in order, and the per-chunk results are returned in the
//! same order. [`ServiceEnabler`] composes this with a state pre-filter to
//! enable only the project services that are not enabled yet.

#![forbid(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![forbid(clippy::panic)]

pub mod chunk;
pub mod enabler;

pub use chunk::{
    ChunkLimit, EmptyInput, pending_items, plan_chunks, run_in_chunks, run_in_chunks_concurrent,
};
pub use enabler::{
    ChunkOutcome, ChunkReport, EnableReport, EnablerConfig, ServiceEnabler, read_service_list,
};
