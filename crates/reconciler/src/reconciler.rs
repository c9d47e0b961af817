//! Grant reconciler implementation.
//!
//! The remote access list is read-then-replaced without a lock. Between the
//! fetch that precedes a write and the write itself, another writer can
//! change the list; without a version check that change is silently
//! overwritten. With `optimistic_concurrency` on, the fetched version is
//! sent along and a concurrent change surfaces as a `Conflict` failure for
//! that grant instead.

use std::sync::Arc;

use itertools::Itertools;
use provcheck_core::{Error, GrantSpec, GrantStore, ResourceId, Result};
use tracing::{debug, info, warn};

use crate::types::{AppliedChanges, AppliedGrant};

/// Configuration for the reconciler.
#[derive(Debug, Clone)]
pub struct ReconcilerConfig {
    /// Send the fetched version with each replace so concurrent writes are
    /// detected instead of overwritten.
    pub optimistic_concurrency: bool,
}

impl Default for ReconcilerConfig {
    fn default() -> Self {
        Self {
            optimistic_concurrency: true,
        }
    }
}

/// Ensures desired grants are present on their resources, writing only
/// the missing ones.
pub struct GrantReconciler {
    /// Access-list store.
    store: Arc<dyn GrantStore>,
    /// Configuration.
    config: ReconcilerConfig,
}

impl GrantReconciler {
    /// Create a new reconciler.
    pub fn new(store: Arc<dyn GrantStore>, config: ReconcilerConfig) -> Self {
        Self { store, config }
    }

    /// Ensure every grant in `desired` is present on `resource`.
    ///
    /// 1. **Check**: fetch the access list and split `desired` into present
    ///    and missing grants by exact `(principal, role)` match.
    /// 2. **Apply**: for each missing grant, re-fetch, append the new entry
    ///    and replace the whole list. One write per grant, attempted once.
    /// 3. **Verify**: look for the grant in the post-write snapshot.
    ///
    /// Calling this again with the same input performs only the Check step.
    ///
    /// # Errors
    ///
    /// `ResourceNotFound` when the resource cannot be fetched, and
    /// `InvalidInput` when a grant names a different resource. Failures of
    /// individual writes are recorded in the result, not returned.
    pub async fn ensure_grants(
        &self,
        resource: &ResourceId,
        desired: &[GrantSpec],
    ) -> Result<AppliedChanges> {
        if let Some(stray) = desired.iter().find(|g| &g.resource != resource) {
            return Err(Error::invalid_input(format!(
                "grant '{stray}' does not target resource '{resource}'"
            )));
        }
        let desired = desired.iter().unique().collect_vec();

        info!(
            resource = %resource,
            desired = desired.len(),
            "Starting grant reconciliation"
        );

        let current = self.store.fetch_grants(resource).await?;
        let (present, missing): (Vec<&GrantSpec>, Vec<&GrantSpec>) =
            desired.into_iter().partition(|g| current.satisfies(g));

        debug!(
            resource = %resource,
            present = present.len(),
            missing = missing.len(),
            "Checked grants"
        );

        let mut changes = AppliedChanges::new();
        changes
            .already_present
            .extend(present.into_iter().cloned());

        for grant in missing {
            match self.apply(resource, grant).await {
                Ok(Some(applied)) => changes.applied.push(applied),
                Ok(None) => changes.already_present.push(grant.clone()),
                Err(e @ Error::ResourceNotFound { .. }) => return Err(e),
                Err(e) => {
                    warn!(grant = %grant, error = %e, "Grant write failed");
                    changes.failed.push((grant.clone(), e.to_string()));
                }
            }
        }

        if changes.converged() {
            info!(resource = %resource, "Grants already converged");
        } else {
            info!(
                resource = %resource,
                applied = changes.applied.len(),
                failed = changes.failed.len(),
                "Grant reconciliation complete"
            );
        }

        Ok(changes)
    }

    /// Ensure grants spanning several resources.
    ///
    /// Grants are grouped by resource in first-seen order and each group is
    /// reconciled with [`Self::ensure_grants`].
    ///
    /// # Errors
    ///
    /// Stops at the first resource that cannot be fetched.
    pub async fn ensure_all(&self, desired: &[GrantSpec]) -> Result<AppliedChanges> {
        let mut changes = AppliedChanges::new();
        for (resource, grants) in group_by_resource(desired) {
            let outcome = self.ensure_grants(&resource, &grants).await?;
            changes.merge(outcome);
        }
        Ok(changes)
    }

    /// Write one missing grant. `Ok(None)` means it appeared before the write.
    async fn apply(&self, resource: &ResourceId, grant: &GrantSpec) -> Result<Option<AppliedGrant>> {
        let fresh = self.store.fetch_grants(resource).await?;
        if fresh.satisfies(grant) {
            debug!(grant = %grant, "Grant appeared since check, skipping write");
            return Ok(None);
        }

        let entries = fresh.with_entry(grant.to_entry());
        let expected_version = if self.config.optimistic_concurrency {
            fresh.version.as_deref()
        } else {
            None
        };

        let updated = self
            .store
            .replace_grants(resource, entries, expected_version)
            .await?;

        let verified = updated.satisfies(grant);
        if verified {
            info!(
                "Added entity: {} as {} on {}",
                grant.principal, grant.role, grant.resource
            );
        }

        Ok(Some(AppliedGrant {
            grant: grant.clone(),
            verified,
        }))
    }

    /// Get the configuration.
    pub const fn config(&self) -> &ReconcilerConfig {
        &self.config
    }
}

/// Group grants by resource, keeping first-seen resource order.
fn group_by_resource(desired: &[GrantSpec]) -> Vec<(ResourceId, Vec<GrantSpec>)> {
    let mut groups: Vec<(ResourceId, Vec<GrantSpec>)> = Vec::new();
    for grant in desired {
        match groups.iter_mut().find(|(r, _)| r == &grant.resource) {
            Some((_, grants)) => grants.push(grant.clone()),
            None => groups.push((grant.resource.clone(), vec![grant.clone()])),
        }
    }
    groups
}

/// Builder for GrantReconciler.
pub struct ReconcilerBuilder {
    store: Option<Arc<dyn GrantStore>>,
    config: ReconcilerConfig,
}

impl ReconcilerBuilder {
    /// Create a new builder.
    pub fn new() -> Self {
        Self {
            store: None,
            config: ReconcilerConfig::default(),
        }
    }

    /// Set the grant store.
    #[must_use]
    pub fn with_store(mut self, store: Arc<dyn GrantStore>) -> Self {
        self.store = Some(store);
        self
    }

    /// Set the configuration.
    #[must_use]
    pub fn with_config(mut self, config: ReconcilerConfig) -> Self {
        self.config = config;
        self
    }

    /// Enable/disable the version check on writes.
    #[must_use]
    pub const fn optimistic_concurrency(mut self, enabled: bool) -> Self {
        self.config.optimistic_concurrency = enabled;
        self
    }

    /// Build the reconciler.
    ///
    /// # Errors
    ///
    /// `InvalidConfig` when no store was set.
    pub fn build(self) -> Result<GrantReconciler> {
        let store = self
            .store
            .ok_or_else(|| Error::invalid_config("Grant store is required"))?;
        Ok(GrantReconciler::new(store, self.config))
    }
}

impl Default for ReconcilerBuilder {
    fn default() -> Self {
        Self::new()
    }
}
