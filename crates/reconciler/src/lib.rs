//! Read-check-write reconciliation of resource access lists.
//!
//! The reconciler follows a three-step cycle per grant:
//!
//! - **Check**: fetch the access list, keep only grants not already present
//! - **Apply**: append the missing entry and replace the whole list
//! - **Verify**: confirm the grant is visible after the write
//!
//! Running it twice with the same input writes nothing the second time.
//!
//! The [`roles`] module audits the deploying identity's project roles.
//!
//! # Example
//!
//! ```ignore
//! use provcheck_core::{memory::InMemoryGrantStore, GrantSpec, Principal, ResourceId, Role};
//! use provcheck_reconciler::ReconcilerBuilder;
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> provcheck_core::Result<()> {
//!     let resource = ResourceId::new("proj.marketing_ga4_base");
//!     let store = Arc::new(InMemoryGrantStore::new().with_resource(resource.clone(), vec![]));
//!     let reconciler = ReconcilerBuilder::new().with_store(store).build()?;
//!
//!     let grant = GrantSpec::new(
//!         resource.clone(),
//!         Principal::normalize("deployer@proj.iam.gserviceaccount.com")?,
//!         Role::new("OWNER"),
//!     );
//!     let changes = reconciler.ensure_grants(&resource, &[grant]).await?;
//!     assert!(changes.converged());
//!     Ok(())
//! }
//! ```

#![forbid(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![forbid(clippy::panic)]

pub mod reconciler;
pub mod roles;
pub mod types;

// Re-export main types
pub use reconciler::{GrantReconciler, ReconcilerBuilder, ReconcilerConfig};
pub use roles::{
    ADMIN_EQUIVALENT_ROLES, DeploymentIdentity, ImpersonationCheck, RoleAudit, RoleAuditReport,
    TOKEN_CREATOR_ROLE, missing_roles, missing_roles_with, read_role_list,
};
pub use types::{AppliedChanges, AppliedGrant};
