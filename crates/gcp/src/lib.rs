#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![deny(clippy::panic)]

//! # provcheck-gcp
//!
//! Google Cloud REST adapters for the provcheck collaborator traits.
//!
//! | Adapter | Trait | API |
//! |---------|-------|-----|
//! | [`BigQueryDatasets`] | `GrantStore` | BigQuery datasets get/patch |
//! | [`ServiceUsage`] | `BatchService` | Service Usage batchGet/batchEnable |
//! | [`ServiceUsageOperations`] | `OperationService` | Service Usage operations |
//! | [`ResourceManager`] | `RoleBindingSource` | Resource Manager getIamPolicy |
//! | [`WorkflowExecutions`] | `OperationService` | Workflows executions |
//! | [`DataformInvocations`] | `OperationService` | Dataform workflow invocations |
//!
//! All adapters share one [`GcpClient`], built once and passed in.
//!
//! ## Example
//!
//! ```ignore
//! use provcheck_gcp::{BigQueryDatasets, GcpClient, GcpConfig};
//!
//! let client = GcpClient::new(GcpConfig::with_token(token))?;
//! let datasets = BigQueryDatasets::new(client.clone());
//! let snapshot = datasets.fetch_grants(&ResourceId::new("proj.analytics")).await?;
//! ```

pub mod bigquery;
pub mod client;
pub mod config;
pub mod dataform;
pub mod resource_manager;
pub mod service_usage;
pub mod workflows;

// Re-export commonly used items
pub use bigquery::{BigQueryDatasets, DatasetRef};
pub use client::GcpClient;
pub use config::{Endpoints, GcpConfig, USER_AGENT};
pub use dataform::{DataformInvocations, invocation_status};
pub use resource_manager::ResourceManager;
pub use service_usage::{ServiceUsage, ServiceUsageOperations};
pub use workflows::{WorkflowExecutions, execution_status};
