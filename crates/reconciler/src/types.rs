//! Result types for grant reconciliation.

use provcheck_core::{GrantSpec, ResourceId};
use serde::Serialize;

/// A grant the reconciler wrote.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AppliedGrant {
    /// The grant that was missing and got written.
    pub grant: GrantSpec,
    /// Whether the post-write snapshot showed the grant.
    ///
    /// This is best-effort confirmation, not a transactional guarantee.
    pub verified: bool,
}

/// Outcome of reconciling one or more resources.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct AppliedChanges {
    /// Grants that were missing and got written, in desired order.
    pub applied: Vec<AppliedGrant>,
    /// Grants that were already in place; no write was issued for them.
    pub already_present: Vec<GrantSpec>,
    /// Grants whose single write attempt failed, with the reason.
    pub failed: Vec<(GrantSpec, String)>,
}

impl AppliedChanges {
    /// Create an empty result.
    pub fn new() -> Self {
        Self::default()
    }

    /// Nothing had to be written and nothing failed.
    pub fn converged(&self) -> bool {
        self.applied.is_empty() && self.failed.is_empty()
    }

    /// Every missing grant was written.
    pub fn all_succeeded(&self) -> bool {
        self.failed.is_empty()
    }

    /// Fold another result into this one, keeping order.
    pub fn merge(&mut self, other: Self) {
        self.applied.extend(other.applied);
        self.already_present.extend(other.already_present);
        self.failed.extend(other.failed);
    }

    /// Resources touched by a write, in first-write order.
    pub fn written_resources(&self) -> Vec<&ResourceId> {
        let mut seen: Vec<&ResourceId> = Vec::new();
        for applied in &self.applied {
            if !seen.contains(&&applied.grant.resource) {
                seen.push(&applied.grant.resource);
            }
        }
        seen
    }
}
