//! Domain types shared by the poller, reconciler and batcher.

pub mod grant;
pub mod operation;
pub mod principal;
pub mod service;

pub use grant::{AccessEntry, GrantSnapshot, GrantSpec, Grantee, ResourceId, Role};
pub use operation::{OperationHandle, OperationRequest, OperationSnapshot, OperationStatus};
pub use principal::{Principal, PrincipalKind};
pub use service::{BatchResult, ServiceId, ServiceState};
