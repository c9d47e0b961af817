#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![deny(clippy::panic)]

//! # provcheck
//!
//! Idempotent provisioning checks for an analytics deployment on Google
//! Cloud: deployer role audit, batched API enablement, dataset access
//! grants and waits on workflow and Dataform runs.
//!
//! The components live in their own crates and are re-exported here.

pub use provcheck_batcher;
pub use provcheck_core;
pub use provcheck_gcp;
pub use provcheck_poller;
pub use provcheck_reconciler;

pub mod cli;
pub mod commands;
pub mod config;
pub mod dataset_list;
pub mod outcome;
pub mod provision;
