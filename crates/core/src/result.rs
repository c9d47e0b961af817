//! Result alias and small combinator traits used across the workspace.

use crate::error::Error;

/// The standard Result type for provcheck operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Extension trait for turning recoverable failures into logged absences.
pub trait ResultExt<T> {
    /// Convert to an Option, logging the error at warn level with `context`.
    fn into_option_logged(self, context: &str) -> Option<T>;

    /// Get the value or `default`, logging the error at warn level.
    fn or_default_logged(self, default: T, context: &str) -> T;
}

impl<T> ResultExt<T> for Result<T> {
    fn into_option_logged(self, context: &str) -> Option<T> {
        match self {
            Ok(value) => Some(value),
            Err(e) => {
                tracing::warn!(error = %e, "{context}");
                None
            }
        }
    }

    fn or_default_logged(self, default: T, context: &str) -> T {
        self.into_option_logged(context).unwrap_or(default)
    }
}

/// Extension trait mapping `None` onto the boundary error variants.
pub trait OptionExt<T> {
    /// `None` becomes `ConfigurationMissing { name }`.
    fn ok_or_missing(self, name: &str) -> Result<T>;

    /// `None` becomes `ResourceNotFound { resource }`.
    fn ok_or_not_found(self, resource: &str) -> Result<T>;
}

impl<T> OptionExt<T> for Option<T> {
    fn ok_or_missing(self, name: &str) -> Result<T> {
        self.ok_or_else(|| Error::configuration_missing(name))
    }

    fn ok_or_not_found(self, resource: &str) -> Result<T> {
        self.ok_or_else(|| Error::resource_not_found(resource))
    }
}
