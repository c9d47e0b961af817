//! BigQuery dataset access lists.
//!
//! A dataset's `access` array has no add-one-entry call: changing it means
//! sending the whole array back. `userByEmail` entries map to principals;
//! every other entry kind (groups, special groups, views, routines) is
//! carried through as an opaque value. Every entry read from the remote side
//! is written back exactly as it was read.

use async_trait::async_trait;
use provcheck_core::{
    AccessEntry, Error, GrantSnapshot, GrantStore, Grantee, Principal, ResourceId, Result, Role,
};
use reqwest::Method;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::debug;

use crate::client::GcpClient;

/// `project.dataset`, split.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DatasetRef {
    pub project: String,
    pub dataset: String,
}

impl DatasetRef {
    /// Parse a `project.dataset` resource id.
    ///
    /// # Errors
    ///
    /// `InvalidInput` when either half is missing.
    pub fn parse(resource: &ResourceId) -> Result<Self> {
        match resource.as_str().split_once('.') {
            Some((project, dataset)) if !project.is_empty() && !dataset.is_empty() => Ok(Self {
                project: project.to_string(),
                dataset: dataset.to_string(),
            }),
            _ => Err(Error::invalid_input(format!(
                "dataset id '{resource}' is not of the form project.dataset"
            ))),
        }
    }

    fn path(&self) -> String {
        format!(
            "bigquery/v2/projects/{}/datasets/{}",
            self.project, self.dataset
        )
    }
}

#[derive(Debug, Deserialize)]
struct DatasetResource {
    #[serde(default)]
    etag: Option<String>,
    #[serde(default)]
    access: Vec<Map<String, Value>>,
}

#[derive(Debug, Serialize)]
struct AccessPatch {
    access: Vec<Value>,
}

/// Dataset access lists as a [`GrantStore`]. Resource ids are `project.dataset`.
#[derive(Debug, Clone)]
pub struct BigQueryDatasets {
    client: GcpClient,
}

impl BigQueryDatasets {
    pub fn new(client: GcpClient) -> Self {
        Self { client }
    }

    fn snapshot(resource: &ResourceId, dataset: DatasetResource) -> Result<GrantSnapshot> {
        let entries = dataset
            .access
            .into_iter()
            .map(entry_from_json)
            .collect::<Result<Vec<_>>>()?;
        let snapshot = GrantSnapshot::new(resource.clone(), entries);
        Ok(match dataset.etag {
            Some(etag) => snapshot.with_version(etag),
            None => snapshot,
        })
    }
}

fn entry_from_json(raw: Map<String, Value>) -> Result<AccessEntry> {
    let role = raw.get("role").and_then(Value::as_str).map(Role::new);
    match raw.get("userByEmail").and_then(Value::as_str) {
        Some(email) => Ok(AccessEntry {
            role,
            grantee: Grantee::Principal(Principal::normalize(email)?),
            source: Some(Value::Object(raw.clone())),
        }),
        None => Ok(AccessEntry::opaque(role, Value::Object(raw))),
    }
}

fn entry_to_json(entry: &AccessEntry) -> Value {
    if let Some(source) = &entry.source {
        return source.clone();
    }
    match &entry.grantee {
        Grantee::Principal(principal) => {
            let mut object = Map::new();
            if let Some(role) = &entry.role {
                object.insert("role".into(), Value::String(role.as_str().to_string()));
            }
            object.insert("userByEmail".into(), Value::String(principal.id().to_string()));
            Value::Object(object)
        }
        Grantee::Opaque(raw) => raw.clone(),
    }
}

#[async_trait]
impl GrantStore for BigQueryDatasets {
    async fn fetch_grants(&self, resource: &ResourceId) -> Result<GrantSnapshot> {
        let dataset_ref = DatasetRef::parse(resource)?;
        let url = GcpClient::endpoint(&self.client.bases().bigquery, &dataset_ref.path())?;
        let dataset: DatasetResource = self
            .client
            .get_json("datasets.get", resource.as_str(), url)
            .await?;
        Self::snapshot(resource, dataset)
    }

    async fn replace_grants(
        &self,
        resource: &ResourceId,
        entries: Vec<AccessEntry>,
        expected_version: Option<&str>,
    ) -> Result<GrantSnapshot> {
        let dataset_ref = DatasetRef::parse(resource)?;
        let url = GcpClient::endpoint(&self.client.bases().bigquery, &dataset_ref.path())?;
        let body = AccessPatch {
            access: entries.iter().map(entry_to_json).collect(),
        };
        debug!(resource = %resource, entries = body.access.len(), "Replacing dataset access list");

        let dataset: DatasetResource = self
            .client
            .send_json(
                "datasets.patch",
                resource.as_str(),
                Method::PATCH,
                url,
                &body,
                expected_version,
            )
            .await?;
        Self::snapshot(resource, dataset)
    }
}
