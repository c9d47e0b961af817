//! Access grant types.

use std::fmt;

use serde::{Deserialize, Serialize};

use super::principal::Principal;

/// Identifier of a resource that carries an access list (e.g. a dataset).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ResourceId(String);

impl ResourceId {
    /// Wrap a resource identifier.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// The identifier as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ResourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// An opaque role name (`OWNER`, `roles/editor`, ...).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Role(String);

impl Role {
    /// Wrap a role name.
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    /// The role name as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Role {
    fn from(name: &str) -> Self {
        Self::new(name)
    }
}

/// One desired access grant: `principal` holds `role` on `resource`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct GrantSpec {
    pub resource: ResourceId,
    pub principal: Principal,
    pub role: Role,
}

impl GrantSpec {
    /// Create a grant spec.
    pub fn new(resource: ResourceId, principal: Principal, role: Role) -> Self {
        Self {
            resource,
            principal,
            role,
        }
    }

    /// The access entry that realizes this grant.
    pub fn to_entry(&self) -> AccessEntry {
        AccessEntry::principal(self.principal.clone(), self.role.clone())
    }
}

impl fmt::Display for GrantSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} as {} on {}", self.principal, self.role, self.resource)
    }
}

/// Who an access entry applies to.
///
/// Entries that do not name a principal (groups, special groups, authorized
/// views) are carried verbatim so a whole-collection replace preserves them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Grantee {
    Principal(Principal),
    Opaque(serde_json::Value),
}

/// One entry of a resource's access list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AccessEntry {
    #[serde(default)]
    pub role: Option<Role>,
    pub grantee: Grantee,
    /// The entry as the remote system returned it. Written back verbatim so
    /// fields the core does not model (e.g. conditions) survive a replace.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<serde_json::Value>,
}

impl AccessEntry {
    /// An entry granting `role` to `principal`.
    pub fn principal(principal: Principal, role: Role) -> Self {
        Self {
            role: Some(role),
            grantee: Grantee::Principal(principal),
            source: None,
        }
    }

    /// An entry the core does not interpret.
    pub fn opaque(role: Option<Role>, raw: serde_json::Value) -> Self {
        Self {
            role,
            grantee: Grantee::Opaque(raw),
            source: None,
        }
    }

    /// Exact `(principal, role)` match.
    pub fn grants(&self, principal: &Principal, role: &Role) -> bool {
        match (&self.grantee, &self.role) {
            (Grantee::Principal(p), Some(r)) => p == principal && r == role,
            _ => false,
        }
    }
}

/// Snapshot of the access list currently held on one resource.
///
/// `version` is the remote concurrency token (an etag) when the remote
/// system provides one.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GrantSnapshot {
    pub resource: ResourceId,
    pub entries: Vec<AccessEntry>,
    #[serde(default)]
    pub version: Option<String>,
}

impl GrantSnapshot {
    /// Create a snapshot.
    pub fn new(resource: ResourceId, entries: Vec<AccessEntry>) -> Self {
        Self {
            resource,
            entries,
            version: None,
        }
    }

    /// Attach a concurrency token.
    #[must_use]
    pub fn with_version(mut self, version: impl Into<String>) -> Self {
        self.version = Some(version.into());
        self
    }

    /// Whether `principal` already holds exactly `role`.
    pub fn contains(&self, principal: &Principal, role: &Role) -> bool {
        self.entries.iter().any(|e| e.grants(principal, role))
    }

    /// Whether the grant described by `spec` is present.
    pub fn satisfies(&self, spec: &GrantSpec) -> bool {
        self.contains(&spec.principal, &spec.role)
    }

    /// The full replacement collection: current entries plus `entry`.
    pub fn with_entry(&self, entry: AccessEntry) -> Vec<AccessEntry> {
        self.entries
            .iter()
            .cloned()
            .chain(std::iter::once(entry))
            .collect()
    }
}
