//! Remote long-running operation types.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Opaque reference to a submitted remote operation.
///
/// Issued by the remote system and never modified afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OperationHandle(String);

impl OperationHandle {
    /// Wrap a remote operation name.
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    /// The remote name of the operation.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for OperationHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Status of a remote operation.
///
/// `TimedOut` is produced locally by the poller; remote adapters never
/// report it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OperationStatus {
    Pending,
    Running,
    Succeeded,
    Failed,
    Cancelled,
    TimedOut,
}

impl OperationStatus {
    /// Every status, in declaration order.
    pub const ALL: [Self; 6] = [
        Self::Pending,
        Self::Running,
        Self::Succeeded,
        Self::Failed,
        Self::Cancelled,
        Self::TimedOut,
    ];

    /// Wire name of the status.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "PENDING",
            Self::Running => "RUNNING",
            Self::Succeeded => "SUCCEEDED",
            Self::Failed => "FAILED",
            Self::Cancelled => "CANCELLED",
            Self::TimedOut => "TIMED_OUT",
        }
    }

    /// Whether this status is the successful outcome.
    pub const fn is_success(self) -> bool {
        matches!(self, Self::Succeeded)
    }
}

impl fmt::Display for OperationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Point-in-time view of a remote operation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OperationSnapshot {
    /// Operation this snapshot belongs to.
    pub handle: OperationHandle,
    /// Status mapped from the remote state.
    pub status: OperationStatus,
    /// Raw remote payload, kept for reporting.
    #[serde(default)]
    pub detail: serde_json::Value,
}

impl OperationSnapshot {
    /// Create a snapshot without a remote payload.
    pub fn new(handle: OperationHandle, status: OperationStatus) -> Self {
        Self {
            handle,
            status,
            detail: serde_json::Value::Null,
        }
    }

    /// Attach the raw remote payload.
    #[must_use]
    pub fn with_detail(mut self, detail: serde_json::Value) -> Self {
        self.detail = detail;
        self
    }
}

/// Request to launch a remote operation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OperationRequest {
    /// Remote parent the operation is created under (e.g. a workflow path).
    pub target: String,
    /// Optional argument payload.
    #[serde(default)]
    pub argument: Option<serde_json::Value>,
}

impl OperationRequest {
    /// Request an operation on `target` without arguments.
    pub fn new(target: impl Into<String>) -> Self {
        Self {
            target: target.into(),
            argument: None,
        }
    }

    /// Attach an argument payload.
    #[must_use]
    pub fn with_argument(mut self, argument: serde_json::Value) -> Self {
        self.argument = Some(argument);
        self
    }
}
