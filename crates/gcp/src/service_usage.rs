//! Service Usage: bulk service state lookup and enablement.

use async_trait::async_trait;
use provcheck_core::{
    BatchResult, BatchService, Error, OperationHandle, OperationRequest, OperationService,
    OperationSnapshot, OperationStatus, Result, ServiceId, ServiceState,
};
use reqwest::Method;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::client::GcpClient;

#[derive(Debug, Deserialize)]
struct BatchGetResponse {
    #[serde(default)]
    services: Vec<ServiceEntry>,
}

#[derive(Debug, Deserialize)]
struct ServiceEntry {
    name: String,
    #[serde(default = "unspecified")]
    state: ServiceState,
}

const fn unspecified() -> ServiceState {
    ServiceState::Unspecified
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct BatchEnableRequest<'a> {
    service_ids: Vec<&'a str>,
}

/// A long-running operation resource.
#[derive(Debug, Deserialize)]
struct LongRunningOperation {
    name: String,
    #[serde(default)]
    done: bool,
    #[serde(default)]
    error: Option<Value>,
}

impl LongRunningOperation {
    fn status(&self) -> OperationStatus {
        match (self.done, &self.error) {
            (false, _) => OperationStatus::Running,
            (true, Some(_)) => OperationStatus::Failed,
            (true, None) => OperationStatus::Succeeded,
        }
    }
}

/// Service enablement for one project as a [`BatchService`].
#[derive(Debug, Clone)]
pub struct ServiceUsage {
    client: GcpClient,
    project_id: String,
}

impl ServiceUsage {
    pub fn new(client: GcpClient, project_id: impl Into<String>) -> Self {
        Self {
            client,
            project_id: project_id.into(),
        }
    }

    fn parent(&self) -> String {
        format!("projects/{}", self.project_id)
    }
}

#[async_trait]
impl BatchService for ServiceUsage {
    async fn submit_batch(&self, chunk: &[ServiceId]) -> Result<BatchResult> {
        let url = GcpClient::endpoint(
            &self.client.bases().service_usage,
            &format!("v1/{}/services:batchEnable", self.parent()),
        )?;
        let body = BatchEnableRequest {
            service_ids: chunk.iter().map(ServiceId::as_str).collect(),
        };
        let raw: Value = self
            .client
            .send_json("services.batchEnable", &self.parent(), Method::POST, url, &body, None)
            .await?;
        let operation: LongRunningOperation = serde_json::from_value(raw.clone())?;

        let result = if operation.done {
            BatchResult::completed(chunk.to_vec())
        } else {
            BatchResult::started(chunk.to_vec(), OperationHandle::new(operation.name))
        };
        Ok(BatchResult {
            detail: raw,
            ..result
        })
    }

    async fn fetch_states(&self, chunk: &[ServiceId]) -> Result<Vec<(ServiceId, ServiceState)>> {
        if chunk.is_empty() {
            return Ok(Vec::new());
        }
        let url = GcpClient::endpoint(
            &self.client.bases().service_usage,
            &format!("v1/{}/services:batchGet", self.parent()),
        )?;
        let names: Vec<(&str, String)> = chunk
            .iter()
            .map(|id| ("names", format!("{}/services/{id}", self.parent())))
            .collect();
        let response: BatchGetResponse = self
            .client
            .get_json_query("services.batchGet", &self.parent(), url, &names)
            .await?;

        Ok(response
            .services
            .into_iter()
            .map(|s| (ServiceId::from_resource_name(&s.name), s.state))
            .collect())
    }
}

/// Service Usage long-running operations as an [`OperationService`].
///
/// Operations are started by [`ServiceUsage::submit_batch`]; this type only
/// reports on them.
#[derive(Debug, Clone)]
pub struct ServiceUsageOperations {
    client: GcpClient,
}

impl ServiceUsageOperations {
    pub fn new(client: GcpClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl OperationService for ServiceUsageOperations {
    async fn submit(&self, request: &OperationRequest) -> Result<OperationHandle> {
        Err(Error::invalid_input(format!(
            "service usage operations are started by batchEnable, not submitted directly (target '{}')",
            request.target
        )))
    }

    async fn query_status(&self, handle: &OperationHandle) -> Result<OperationSnapshot> {
        let url = GcpClient::endpoint(
            &self.client.bases().service_usage,
            &format!("v1/{}", handle.as_str()),
        )?;
        let raw: Value = self
            .client
            .get_json("operations.get", handle.as_str(), url)
            .await?;
        let operation: LongRunningOperation = serde_json::from_value(raw.clone())?;
        Ok(OperationSnapshot::new(handle.clone(), operation.status()).with_detail(raw))
    }
}
