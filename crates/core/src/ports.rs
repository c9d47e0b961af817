//! Collaborator traits the components consume.
//!
//! Each trait is the narrowest view of the remote platform a component
//! needs. Implementations are injected explicitly; nothing in the workspace
//! keeps a process-wide client.

use async_trait::async_trait;

use crate::result::Result;
use crate::types::{
    AccessEntry, BatchResult, GrantSnapshot, OperationHandle, OperationRequest,
    OperationSnapshot, Principal, ResourceId, Role, ServiceId, ServiceState,
};

/// Launches remote operations and reports their status.
#[async_trait]
pub trait OperationService: Send + Sync {
    /// Submit an operation and return its handle.
    async fn submit(&self, request: &OperationRequest) -> Result<OperationHandle>;

    /// Read the current status of an operation. Read-only.
    async fn query_status(&self, handle: &OperationHandle) -> Result<OperationSnapshot>;
}

/// Reads and replaces the access list of a resource.
///
/// The remote contract is replace-the-collection: there is no primitive
/// for adding a single entry.
#[async_trait]
pub trait GrantStore: Send + Sync {
    /// Fetch the current access list.
    ///
    /// Fails with `ResourceNotFound` when the resource does not exist or is
    /// not visible to the caller.
    async fn fetch_grants(&self, resource: &ResourceId) -> Result<GrantSnapshot>;

    /// Replace the whole access list and return the post-write snapshot.
    ///
    /// When `expected_version` is given the write is rejected with
    /// `Conflict` if the resource changed since that version was read.
    async fn replace_grants(
        &self,
        resource: &ResourceId,
        entries: Vec<AccessEntry>,
        expected_version: Option<&str>,
    ) -> Result<GrantSnapshot>;
}

/// Reports project-level role bindings.
#[async_trait]
pub trait RoleBindingSource: Send + Sync {
    /// Roles bound to `principal` on the project.
    async fn fetch_project_role_bindings(&self, principal: &Principal) -> Result<Vec<Role>>;
}

/// Bulk service calls with a per-call item cap.
#[async_trait]
pub trait BatchService: Send + Sync {
    /// Submit one chunk of services for enablement.
    async fn submit_batch(&self, chunk: &[ServiceId]) -> Result<BatchResult>;

    /// Read the current state of one chunk of services.
    async fn fetch_states(&self, chunk: &[ServiceId]) -> Result<Vec<(ServiceId, ServiceState)>>;
}
