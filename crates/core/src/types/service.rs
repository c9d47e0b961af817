//! Project service (API) types used by bulk enablement.

use std::fmt;

use serde::{Deserialize, Serialize};

use super::operation::OperationHandle;

/// Short service identifier, e.g. `bigquery.googleapis.com`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ServiceId(String);

impl ServiceId {
    /// Wrap a service identifier.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Build from a full resource name such as
    /// `projects/p/services/bigquery.googleapis.com`.
    pub fn from_resource_name(name: &str) -> Self {
        Self::new(name.rsplit('/').next().unwrap_or(name))
    }

    /// The identifier as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ServiceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Enablement state of a service on a project.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ServiceState {
    Enabled,
    Disabled,
    #[serde(other)]
    Unspecified,
}

/// Outcome of one bulk call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchResult {
    /// Items that were part of the call.
    pub submitted: Vec<ServiceId>,
    /// Long-running operation started by the call, if any.
    #[serde(default)]
    pub operation: Option<OperationHandle>,
    /// Raw remote response.
    #[serde(default)]
    pub detail: serde_json::Value,
}

impl BatchResult {
    /// A result for a call that finished synchronously.
    pub fn completed(submitted: Vec<ServiceId>) -> Self {
        Self {
            submitted,
            operation: None,
            detail: serde_json::Value::Null,
        }
    }

    /// A result for a call that started a long-running operation.
    pub fn started(submitted: Vec<ServiceId>, operation: OperationHandle) -> Self {
        Self {
            submitted,
            operation: Some(operation),
            detail: serde_json::Value::Null,
        }
    }
}
