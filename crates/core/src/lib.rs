//! # provcheck-core
//!
//! Core types, errors, and collaborator traits shared by the provcheck
//! components.
//!
//! - [`types`] holds the domain model: operation handles and statuses,
//!   normalized principals, grant specs and access-list snapshots, service ids.
//! - [`ports`] holds the narrow traits through which components talk to the
//!   remote platform.
//! - [`memory`] provides recording in-memory implementations of every port.

#![forbid(unsafe_code)]
#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![deny(clippy::panic)]

pub mod error;
pub mod memory;
pub mod ports;
pub mod result;
pub mod types;

pub use error::Error;
pub use ports::{BatchService, GrantStore, OperationService, RoleBindingSource};
pub use result::{OptionExt, Result, ResultExt};
pub use types::*;
