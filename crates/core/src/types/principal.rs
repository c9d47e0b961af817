//! Normalized principal identities.
//!
//! A principal is always stored in exactly one of two prefixed forms,
//! `serviceAccount:<id>` or `user:<id>`. The prefix is part of identity:
//! `user:a@x` and `serviceAccount:a@x` are different principals.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::Error;
use crate::result::Result;

const SERVICE_ACCOUNT_PREFIX: &str = "serviceAccount:";
const USER_PREFIX: &str = "user:";
const SERVICE_ACCOUNT_MARKER: &str = "gserviceaccount";

/// The two identity classes a principal can belong to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PrincipalKind {
    ServiceAccount,
    User,
}

impl PrincipalKind {
    /// Member prefix for this kind, including the colon.
    pub const fn prefix(self) -> &'static str {
        match self {
            Self::ServiceAccount => SERVICE_ACCOUNT_PREFIX,
            Self::User => USER_PREFIX,
        }
    }
}

/// A normalized identity string.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Principal {
    member: String,
}

impl Principal {
    /// Normalize a raw account identifier.
    ///
    /// Surrounding whitespace is trimmed. An identifier that already carries
    /// one of the two prefixes is kept as is; otherwise ids containing
    /// `gserviceaccount` become service accounts and everything else a user.
    ///
    /// # Errors
    ///
    /// Returns `InvalidInput` when the identifier is empty after trimming or
    /// has a prefix with no id behind it.
    pub fn normalize(raw: &str) -> Result<Self> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err(Error::invalid_input("principal identifier is empty"));
        }

        let member = if trimmed.starts_with(SERVICE_ACCOUNT_PREFIX) || trimmed.starts_with(USER_PREFIX)
        {
            trimmed.to_string()
        } else if trimmed.contains(SERVICE_ACCOUNT_MARKER) {
            format!("{SERVICE_ACCOUNT_PREFIX}{trimmed}")
        } else {
            format!("{USER_PREFIX}{trimmed}")
        };

        let principal = Self { member };
        if principal.id().trim().is_empty() {
            return Err(Error::invalid_input(format!(
                "principal '{trimmed}' has no identifier after its prefix"
            )));
        }
        Ok(principal)
    }

    /// Build a principal of an explicit kind from a bare id.
    ///
    /// # Errors
    ///
    /// Returns `InvalidInput` for an empty id.
    pub fn with_kind(kind: PrincipalKind, id: &str) -> Result<Self> {
        let id = id.trim();
        if id.is_empty() {
            return Err(Error::invalid_input("principal identifier is empty"));
        }
        Ok(Self {
            member: format!("{}{id}", kind.prefix()),
        })
    }

    /// Which identity class this principal belongs to.
    pub fn kind(&self) -> PrincipalKind {
        if self.member.starts_with(SERVICE_ACCOUNT_PREFIX) {
            PrincipalKind::ServiceAccount
        } else {
            PrincipalKind::User
        }
    }

    /// The identifier without its prefix (usually an email address).
    pub fn id(&self) -> &str {
        self.member
            .strip_prefix(self.kind().prefix())
            .unwrap_or(&self.member)
    }

    /// The full prefixed member string, as IAM policies spell it.
    pub fn as_member(&self) -> &str {
        &self.member
    }
}

impl fmt::Display for Principal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.member)
    }
}

impl FromStr for Principal {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::normalize(s)
    }
}

impl Serialize for Principal {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.member)
    }
}

impl<'de> Deserialize<'de> for Principal {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Self::normalize(&raw).map_err(serde::de::Error::custom)
    }
}
