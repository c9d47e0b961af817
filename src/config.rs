//! Configuration: TOML-file tunables and process environment.
//!
//! Tunables default to the values the deployment scripts always used, so an
//! absent config file changes nothing. Environment values are read through
//! a lookup function, which keeps parsing pure and testable.

use std::path::{Path, PathBuf};
use std::time::Duration;

use provcheck_batcher::{ChunkLimit, EmptyInput, EnablerConfig};
use provcheck_core::{Error, OptionExt, Principal, Result, Role};
use provcheck_gcp::GcpConfig;
use provcheck_poller::{PollPolicy, PollerConfig};
use provcheck_reconciler::{ADMIN_EQUIVALENT_ROLES, DeploymentIdentity, ReconcilerConfig};
use serde::{Deserialize, Serialize};

/// Poll timing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PollingConfig {
    /// First delay of the exponential policy.
    pub backoff_initial_secs: u64,
    /// Upper bound for exponential delays. Unbounded when absent.
    pub backoff_max_delay_secs: Option<u64>,
    pub fixed_interval_secs: u64,
    pub fixed_timeout_secs: u64,
    /// Consecutive transport failures absorbed by a wait.
    pub transport_error_tolerance: u32,
}

impl Default for PollingConfig {
    fn default() -> Self {
        Self {
            backoff_initial_secs: 1,
            backoff_max_delay_secs: None,
            fixed_interval_secs: 30,
            fixed_timeout_secs: 300,
            transport_error_tolerance: 1,
        }
    }
}

impl PollingConfig {
    /// Policy for short operations: back off until no longer running.
    pub fn backoff_policy(&self) -> PollPolicy {
        PollPolicy::until_not_running(
            Duration::from_secs(self.backoff_initial_secs),
            self.backoff_max_delay_secs.map(Duration::from_secs),
        )
    }

    /// Policy for long jobs: fixed interval until settled or timed out.
    pub fn fixed_policy(&self) -> PollPolicy {
        PollPolicy::until_settled(
            Duration::from_secs(self.fixed_interval_secs),
            Duration::from_secs(self.fixed_timeout_secs),
        )
    }

    pub const fn poller_config(&self) -> PollerConfig {
        PollerConfig {
            transport_error_tolerance: self.transport_error_tolerance,
        }
    }
}

/// Chunked submission settings.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BatchingConfig {
    pub chunk_size: ChunkLimit,
    pub empty_input: EmptyInput,
}

impl BatchingConfig {
    pub const fn enabler_config(&self) -> EnablerConfig {
        EnablerConfig {
            limit: self.chunk_size,
            empty_input: self.empty_input,
        }
    }
}

/// Grant reconciliation settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GrantsConfig {
    pub optimistic_concurrency: bool,
}

impl Default for GrantsConfig {
    fn default() -> Self {
        Self {
            optimistic_concurrency: true,
        }
    }
}

impl GrantsConfig {
    pub const fn reconciler_config(&self) -> ReconcilerConfig {
        ReconcilerConfig {
            optimistic_concurrency: self.optimistic_concurrency,
        }
    }
}

/// Top-level configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProvcheckConfig {
    pub polling: PollingConfig,
    pub batching: BatchingConfig,
    pub grants: GrantsConfig,
    /// Required deployer roles, one per line.
    pub roles_file: PathBuf,
    /// Required project services, one per line.
    pub apis_file: PathBuf,
    /// Roles that imply every other project role.
    pub admin_roles: Vec<String>,
    /// Role granted on each dataset.
    pub dataset_role: String,
    /// Dataform repository polled by `wait-dataform`.
    pub dataform_repository: String,
    pub gcp: GcpConfig,
}

impl Default for ProvcheckConfig {
    fn default() -> Self {
        Self {
            polling: PollingConfig::default(),
            batching: BatchingConfig::default(),
            grants: GrantsConfig::default(),
            roles_file: PathBuf::from("scripts/deployer_roles.txt"),
            apis_file: PathBuf::from("scripts/project_apis.txt"),
            admin_roles: ADMIN_EQUIVALENT_ROLES.iter().map(ToString::to_string).collect(),
            dataset_role: "OWNER".to_string(),
            dataform_repository: "marketing-analytics".to_string(),
            gcp: GcpConfig::default(),
        }
    }
}

impl ProvcheckConfig {
    /// Load configuration from a TOML file.
    ///
    /// # Errors
    ///
    /// `FileReadFailed` or `TomlParseFailed`; `InvalidConfig` for values
    /// that parse but make no sense.
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| Error::file_read_failed(path, e.to_string()))?;
        Self::from_toml(&content)
    }

    /// Parse configuration from TOML text.
    ///
    /// # Errors
    ///
    /// `TomlParseFailed` or `InvalidConfig`.
    pub fn from_toml(content: &str) -> Result<Self> {
        let config: Self =
            toml::from_str(content).map_err(|e| Error::toml_parse_failed(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Check the poll schedules.
    ///
    /// # Errors
    ///
    /// `InvalidConfig` for zero delays or a cap below the first delay.
    pub fn validate(&self) -> Result<()> {
        self.polling.backoff_policy().schedule.validate()?;
        self.polling.fixed_policy().schedule.validate()
    }

    pub fn admin_roles(&self) -> Vec<Role> {
        self.admin_roles.iter().map(|r| Role::new(r.as_str())).collect()
    }
}

/// Variables read from the process environment.
pub mod vars {
    pub const PROJECT_ID: &str = "PROJECT_ID";
    pub const REGION: &str = "REGION";
    pub const CURRENT_USER: &str = "CURRENT_USER";
    pub const USE_DEPLOYER_SA: &str = "MAJ_USE_DEPLOYER_SA";
    pub const DEPLOYER_ACCOUNT: &str = "DEPLOYER_ACCOUNT";
    pub const DEPLOYER_SA: &str = "_DEPLOYER_SA";
    pub const GA4_EXPORT_PROJECT: &str = "TF_VAR_source_ga4_export_project_id";
    pub const GA4_EXPORT_DATASET: &str = "TF_VAR_source_ga4_export_dataset";
    pub const ADS_EXPORT_DATA: &str = "TF_VAR_source_ads_export_data";
    pub const GA4_PROPERTY_ID: &str = "GA4_PROPERTY_ID";
    pub const ACCESS_TOKEN: &str = "GOOGLE_OAUTH_ACCESS_TOKEN";
}

const DEFAULT_REGION: &str = "us-central1";

/// Deployment environment. Blank values count as unset.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Environment {
    pub project_id: Option<String>,
    pub region: String,
    pub current_user: Option<String>,
    pub use_deployer_service_account: bool,
    pub deployer_account: Option<String>,
    pub deployer_sa: Option<String>,
    pub ga4_export_project: Option<String>,
    pub ga4_export_dataset: Option<String>,
    pub ads_export_data: Option<String>,
    pub ga4_property_id: Option<String>,
    pub access_token: Option<String>,
}

impl Environment {
    /// Read the environment through `lookup`.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &str| {
            lookup(name)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };
        Self {
            project_id: get(vars::PROJECT_ID),
            region: get(vars::REGION).unwrap_or_else(|| DEFAULT_REGION.to_string()),
            current_user: get(vars::CURRENT_USER),
            use_deployer_service_account: get(vars::USE_DEPLOYER_SA)
                .is_some_and(|v| v.eq_ignore_ascii_case("true")),
            deployer_account: get(vars::DEPLOYER_ACCOUNT),
            deployer_sa: get(vars::DEPLOYER_SA),
            ga4_export_project: get(vars::GA4_EXPORT_PROJECT),
            ga4_export_dataset: get(vars::GA4_EXPORT_DATASET),
            ads_export_data: get(vars::ADS_EXPORT_DATA),
            ga4_property_id: get(vars::GA4_PROPERTY_ID),
            access_token: get(vars::ACCESS_TOKEN),
        }
    }

    /// Read the process environment.
    pub fn from_env() -> Self {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// # Errors
    ///
    /// `ConfigurationMissing` when `PROJECT_ID` is unset.
    pub fn project_id(&self) -> Result<&str> {
        self.project_id.as_deref().ok_or_missing(vars::PROJECT_ID)
    }

    /// # Errors
    ///
    /// `ConfigurationMissing` when `GA4_PROPERTY_ID` is unset.
    pub fn ga4_property_id(&self) -> Result<&str> {
        self.ga4_property_id
            .as_deref()
            .ok_or_missing(vars::GA4_PROPERTY_ID)
    }

    /// # Errors
    ///
    /// `ConfigurationMissing` when `_DEPLOYER_SA` is unset.
    pub fn deployer_service_account(&self) -> Result<Principal> {
        let raw = self.deployer_sa.as_deref().ok_or_missing(vars::DEPLOYER_SA)?;
        Principal::normalize(raw)
    }

    /// The deploying identity described by the environment.
    ///
    /// # Errors
    ///
    /// `ConfigurationMissing` when `PROJECT_ID` or `CURRENT_USER` is unset.
    pub fn deployment_identity(&self) -> Result<DeploymentIdentity> {
        let project_id = self.project_id()?;
        let user = self
            .current_user
            .as_deref()
            .ok_or_missing(vars::CURRENT_USER)?;
        DeploymentIdentity::resolve(
            project_id,
            user,
            self.use_deployer_service_account,
            self.deployer_account.as_deref(),
        )
    }
}
