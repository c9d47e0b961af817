//! Dataform workflow invocations.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use provcheck_core::{
    OperationHandle, OperationRequest, OperationService, OperationSnapshot, OperationStatus,
    Result,
};
use reqwest::Method;
use serde::Deserialize;
use serde_json::{Value, json};
use tracing::debug;

use crate::client::GcpClient;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ListInvocations {
    #[serde(default)]
    workflow_invocations: Vec<Invocation>,
    #[serde(default)]
    next_page_token: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Invocation {
    name: String,
    #[serde(default)]
    state: String,
    #[serde(default)]
    invocation_timing: Option<Timing>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Timing {
    #[serde(default)]
    start_time: Option<DateTime<Utc>>,
}

impl Invocation {
    fn started(&self) -> Option<DateTime<Utc>> {
        self.invocation_timing.as_ref().and_then(|t| t.start_time)
    }
}

/// Map an invocation state onto the core status set.
pub fn invocation_status(state: &str) -> OperationStatus {
    match state {
        "RUNNING" | "CANCELING" => OperationStatus::Running,
        "SUCCEEDED" => OperationStatus::Succeeded,
        "FAILED" => OperationStatus::Failed,
        "CANCELLED" => OperationStatus::Cancelled,
        _ => OperationStatus::Pending,
    }
}

/// Dataform workflow invocations in one project and location.
#[derive(Debug, Clone)]
pub struct DataformInvocations {
    client: GcpClient,
    project_id: String,
    location: String,
}

impl DataformInvocations {
    pub fn new(client: GcpClient, project_id: impl Into<String>, location: impl Into<String>) -> Self {
        Self {
            client,
            project_id: project_id.into(),
            location: location.into(),
        }
    }

    /// Full resource name of a repository.
    pub fn repository_path(&self, repository: &str) -> String {
        if repository.starts_with("projects/") {
            repository.to_string()
        } else {
            format!(
                "projects/{}/locations/{}/repositories/{repository}",
                self.project_id, self.location
            )
        }
    }

    /// The invocation of `repository` with the most recent start time.
    ///
    /// Invocations without a start time are ignored. On equal start times
    /// the first one listed wins. `None` when nothing has started.
    ///
    /// # Errors
    ///
    /// `ResourceNotFound` when the repository does not exist; transport and
    /// remote errors from the list call.
    pub async fn latest_invocation(&self, repository: &str) -> Result<Option<OperationHandle>> {
        let parent = self.repository_path(repository);
        let url = GcpClient::endpoint(
            &self.client.bases().dataform,
            &format!("v1beta1/{parent}/workflowInvocations"),
        )?;

        let mut latest: Option<(DateTime<Utc>, String)> = None;
        let mut page_token: Option<String> = None;
        loop {
            let query: Vec<(&str, String)> = page_token
                .take()
                .map(|t| ("pageToken", t))
                .into_iter()
                .collect();
            let page: ListInvocations = self
                .client
                .get_json_query("workflowInvocations.list", &parent, url.clone(), &query)
                .await?;

            for invocation in page.workflow_invocations {
                if let Some(started) = invocation.started() {
                    let newer = latest.as_ref().is_none_or(|(best, _)| started > *best);
                    if newer {
                        latest = Some((started, invocation.name));
                    }
                }
            }

            match page.next_page_token.filter(|t| !t.is_empty()) {
                Some(token) => page_token = Some(token),
                None => break,
            }
        }

        debug!(repository = %parent, found = latest.is_some(), "Looked up latest invocation");
        Ok(latest.map(|(_, name)| OperationHandle::new(name)))
    }
}

#[async_trait]
impl OperationService for DataformInvocations {
    /// Start an invocation of the repository named by the request target.
    /// The request argument, if any, is the invocation body.
    async fn submit(&self, request: &OperationRequest) -> Result<OperationHandle> {
        let parent = self.repository_path(&request.target);
        let url = GcpClient::endpoint(
            &self.client.bases().dataform,
            &format!("v1beta1/{parent}/workflowInvocations"),
        )?;
        let body = request.argument.clone().unwrap_or_else(|| json!({}));
        let invocation: Invocation = self
            .client
            .send_json("workflowInvocations.create", &parent, Method::POST, url, &body, None)
            .await?;
        Ok(OperationHandle::new(invocation.name))
    }

    async fn query_status(&self, handle: &OperationHandle) -> Result<OperationSnapshot> {
        let url = GcpClient::endpoint(
            &self.client.bases().dataform,
            &format!("v1beta1/{}", handle.as_str()),
        )?;
        let raw: Value = self
            .client
            .get_json("workflowInvocations.get", handle.as_str(), url)
            .await?;
        let invocation: Invocation = serde_json::from_value(raw.clone())?;
        Ok(OperationSnapshot::new(handle.clone(), invocation_status(&invocation.state)).with_detail(raw))
    }
}
