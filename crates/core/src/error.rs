//! Core error types for provcheck operations.
//!
//! The taxonomy separates transient transport failures (absorbed inside wait
//! loops) from fatal conditions (missing resources, missing configuration)
//! that stop an operation immediately.

use std::path::PathBuf;

use thiserror::Error;

/// Core error type for provcheck operations.
#[derive(Debug, Error)]
pub enum Error {
    // Remote collaborator errors
    #[error("transport error during {operation}: {reason}")]
    Transport { operation: String, reason: String },

    #[error("resource '{resource}' not found")]
    ResourceNotFound { resource: String },

    #[error("timed out after {elapsed_ms}ms waiting for {what}")]
    Timeout { what: String, elapsed_ms: u64 },

    #[error("concurrent modification of '{resource}': {reason}")]
    Conflict { resource: String, reason: String },

    #[error("remote call '{operation}' rejected ({status}): {reason}")]
    Remote {
        operation: String,
        status: u16,
        reason: String,
    },

    // Boundary errors
    #[error("required configuration '{name}' is missing")]
    ConfigurationMissing { name: String },

    #[error("invalid configuration: {reason}")]
    InvalidConfig { reason: String },

    #[error("invalid input: {reason}")]
    InvalidInput { reason: String },

    // I/O and parsing
    #[error("failed to read file '{path}': {reason}")]
    FileReadFailed { path: PathBuf, reason: String },

    #[error("JSON parse error: {reason}")]
    JsonParseFailed { reason: String },

    #[error("TOML parse error: {reason}")]
    TomlParseFailed { reason: String },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Create a transport error.
    pub fn transport(operation: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Transport {
            operation: operation.into(),
            reason: reason.into(),
        }
    }

    /// Create a resource not found error.
    pub fn resource_not_found(resource: impl Into<String>) -> Self {
        Self::ResourceNotFound {
            resource: resource.into(),
        }
    }

    /// Create a timeout error.
    pub fn timeout(what: impl Into<String>, elapsed_ms: u64) -> Self {
        Self::Timeout {
            what: what.into(),
            elapsed_ms,
        }
    }

    /// Create a conflict error.
    pub fn conflict(resource: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Conflict {
            resource: resource.into(),
            reason: reason.into(),
        }
    }

    /// Create a remote rejection error.
    pub fn remote(operation: impl Into<String>, status: u16, reason: impl Into<String>) -> Self {
        Self::Remote {
            operation: operation.into(),
            status,
            reason: reason.into(),
        }
    }

    /// Create a configuration missing error.
    pub fn configuration_missing(name: impl Into<String>) -> Self {
        Self::ConfigurationMissing { name: name.into() }
    }

    /// Create an invalid config error.
    pub fn invalid_config(reason: impl Into<String>) -> Self {
        Self::InvalidConfig {
            reason: reason.into(),
        }
    }

    /// Create an invalid input error.
    pub fn invalid_input(reason: impl Into<String>) -> Self {
        Self::InvalidInput {
            reason: reason.into(),
        }
    }

    /// Create a file read error.
    pub fn file_read_failed(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        Self::FileReadFailed {
            path: path.into(),
            reason: reason.into(),
        }
    }

    /// Create a JSON parse error.
    pub fn json_parse_failed(reason: impl Into<String>) -> Self {
        Self::JsonParseFailed {
            reason: reason.into(),
        }
    }

    /// Create a TOML parse error.
    pub fn toml_parse_failed(reason: impl Into<String>) -> Self {
        Self::TomlParseFailed {
            reason: reason.into(),
        }
    }

    /// Transient errors may succeed on a later attempt; wait loops absorb them.
    pub const fn is_transient(&self) -> bool {
        matches!(self, Self::Transport { .. })
    }

    /// Fatal errors end the operation that hit them; no retry at any layer.
    pub const fn is_fatal(&self) -> bool {
        matches!(
            self,
            Self::ResourceNotFound { .. } | Self::ConfigurationMissing { .. }
        )
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Self::json_parse_failed(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transport_is_transient() {
        let err = Error::transport("get_execution", "connection reset");
        assert!(err.is_transient());
        assert!(!err.is_fatal());
        assert!(err.to_string().contains("get_execution"));
    }

    #[test]
    fn test_not_found_is_fatal() {
        let err = Error::resource_not_found("proj.dataset");
        assert!(err.is_fatal());
        assert!(!err.is_transient());
        assert_eq!(err.to_string(), "resource 'proj.dataset' not found");
    }

    #[test]
    fn test_configuration_missing_display() {
        let err = Error::configuration_missing("PROJECT_ID");
        assert!(err.is_fatal());
        assert!(err.to_string().contains("PROJECT_ID"));
    }

    #[test]
    fn test_remote_display_carries_status() {
        let err = Error::remote("batchEnable", 403, "permission denied");
        let message = err.to_string();
        assert!(message.contains("403"));
        assert!(message.contains("permission denied"));
    }
}
