//! Configuration for the Google Cloud REST adapters.

use std::path::Path;
use std::time::Duration;

use provcheck_core::{Error, Result};
use serde::{Deserialize, Serialize};
use url::Url;

/// User agent sent with every request.
pub const USER_AGENT: &str = "cloud-solutions/marketing-analytics-jumpstart-deploy-v1.0";

/// Base URLs of the APIs the adapters talk to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Endpoints {
    #[serde(default = "default_bigquery")]
    pub bigquery: String,
    #[serde(default = "default_service_usage")]
    pub service_usage: String,
    #[serde(default = "default_resource_manager")]
    pub resource_manager: String,
    #[serde(default = "default_workflow_executions")]
    pub workflow_executions: String,
    #[serde(default = "default_dataform")]
    pub dataform: String,
}

impl Default for Endpoints {
    fn default() -> Self {
        Self {
            bigquery: default_bigquery(),
            service_usage: default_service_usage(),
            resource_manager: default_resource_manager(),
            workflow_executions: default_workflow_executions(),
            dataform: default_dataform(),
        }
    }
}

impl Endpoints {
    /// Point every API at the same base URL (a proxy or a mock server).
    pub fn all_at(base: &Url) -> Self {
        let base = base.to_string();
        Self {
            bigquery: base.clone(),
            service_usage: base.clone(),
            resource_manager: base.clone(),
            workflow_executions: base.clone(),
            dataform: base,
        }
    }

    /// Parse one endpoint, making sure relative joins append to its path.
    ///
    /// # Errors
    ///
    /// `InvalidConfig` when the URL does not parse.
    pub fn parse(raw: &str) -> Result<Url> {
        let normalized = if raw.ends_with('/') {
            raw.to_string()
        } else {
            format!("{raw}/")
        };
        Url::parse(&normalized)
            .map_err(|e| Error::invalid_config(format!("invalid endpoint '{raw}': {e}")))
    }
}

/// Configuration for [`crate::GcpClient`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GcpConfig {
    /// OAuth bearer token. Never written back out.
    #[serde(default, skip_serializing)]
    pub access_token: Option<String>,

    #[serde(default)]
    pub endpoints: Endpoints,

    /// Per-request timeout.
    #[serde(with = "duration_secs", default = "default_timeout")]
    pub timeout: Duration,

    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

impl Default for GcpConfig {
    fn default() -> Self {
        Self {
            access_token: None,
            endpoints: Endpoints::default(),
            timeout: default_timeout(),
            user_agent: default_user_agent(),
        }
    }
}

impl GcpConfig {
    /// Create a config authenticating with `token`.
    pub fn with_token(token: impl Into<String>) -> Self {
        Self {
            access_token: Some(token.into()),
            ..Default::default()
        }
    }

    /// Send every request to `base`.
    #[must_use]
    pub fn base_url(mut self, base: &Url) -> Self {
        self.endpoints = Endpoints::all_at(base);
        self
    }

    /// Set the timeout.
    #[must_use]
    pub const fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Load configuration from a file.
    ///
    /// # Errors
    ///
    /// `FileReadFailed` when the file cannot be read, or a parse error for
    /// malformed JSON/TOML.
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| Error::file_read_failed(path, e.to_string()))?;

        if path.extension().is_some_and(|e| e == "json") {
            Ok(serde_json::from_str(&content)?)
        } else {
            toml::from_str(&content).map_err(|e| Error::toml_parse_failed(e.to_string()))
        }
    }
}

fn default_bigquery() -> String {
    "https://bigquery.googleapis.com/".to_string()
}

fn default_service_usage() -> String {
    "https://serviceusage.googleapis.com/".to_string()
}

fn default_resource_manager() -> String {
    "https://cloudresourcemanager.googleapis.com/".to_string()
}

fn default_workflow_executions() -> String {
    "https://workflowexecutions.googleapis.com/".to_string()
}

fn default_dataform() -> String {
    "https://dataform.googleapis.com/".to_string()
}

const fn default_timeout() -> Duration {
    Duration::from_secs(60)
}

fn default_user_agent() -> String {
    USER_AGENT.to_string()
}

/// Serialization helper for Duration as seconds.
mod duration_secs {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        duration.as_secs().serialize(serializer)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        let secs = u64::deserialize(deserializer)?;
        Ok(Duration::from_secs(secs))
    }
}
