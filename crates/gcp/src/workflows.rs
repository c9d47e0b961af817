//! Workflows executions.

use async_trait::async_trait;
use provcheck_core::{
    OperationHandle, OperationRequest, OperationService, OperationSnapshot, OperationStatus,
    Result,
};
use reqwest::Method;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::info;

use crate::client::GcpClient;

#[derive(Debug, Serialize)]
struct CreateExecution {
    #[serde(skip_serializing_if = "Option::is_none")]
    argument: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Execution {
    name: String,
    #[serde(default)]
    state: String,
}

/// Map an execution state onto the core status set.
///
/// A queued execution is in flight, so it maps to `Running` and keeps a
/// backoff wait going. Unrecognised states map to `Pending`.
pub fn execution_status(state: &str) -> OperationStatus {
    match state {
        "ACTIVE" | "QUEUED" => OperationStatus::Running,
        "SUCCEEDED" => OperationStatus::Succeeded,
        "FAILED" => OperationStatus::Failed,
        "CANCELLED" => OperationStatus::Cancelled,
        _ => OperationStatus::Pending,
    }
}

/// Workflow executions in one project and location.
///
/// `submit` starts an execution of the workflow named by the request
/// target; the returned handle is the execution resource name.
#[derive(Debug, Clone)]
pub struct WorkflowExecutions {
    client: GcpClient,
    project_id: String,
    location: String,
}

impl WorkflowExecutions {
    pub fn new(client: GcpClient, project_id: impl Into<String>, location: impl Into<String>) -> Self {
        Self {
            client,
            project_id: project_id.into(),
            location: location.into(),
        }
    }

    /// Full resource name of a workflow. Full names pass through.
    pub fn workflow_path(&self, workflow: &str) -> String {
        if workflow.starts_with("projects/") {
            workflow.to_string()
        } else {
            format!(
                "projects/{}/locations/{}/workflows/{workflow}",
                self.project_id, self.location
            )
        }
    }
}

#[async_trait]
impl OperationService for WorkflowExecutions {
    async fn submit(&self, request: &OperationRequest) -> Result<OperationHandle> {
        let parent = self.workflow_path(&request.target);
        let url = GcpClient::endpoint(
            &self.client.bases().workflow_executions,
            &format!("v1/{parent}/executions"),
        )?;
        let body = CreateExecution {
            argument: request.argument.as_ref().map(Value::to_string),
        };
        let execution: Execution = self
            .client
            .send_json("executions.create", &parent, Method::POST, url, &body, None)
            .await?;

        info!(execution = %execution.name, "Created execution");
        Ok(OperationHandle::new(execution.name))
    }

    async fn query_status(&self, handle: &OperationHandle) -> Result<OperationSnapshot> {
        let url = GcpClient::endpoint(
            &self.client.bases().workflow_executions,
            &format!("v1/{}", handle.as_str()),
        )?;
        let raw: Value = self
            .client
            .get_json("executions.get", handle.as_str(), url)
            .await?;
        let execution: Execution = serde_json::from_value(raw.clone())?;
        Ok(OperationSnapshot::new(handle.clone(), execution_status(&execution.state)).with_detail(raw))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_execution_status_mapping() {
        assert_eq!(execution_status("ACTIVE"), OperationStatus::Running);
        assert_eq!(execution_status("QUEUED"), OperationStatus::Running);
        assert_eq!(execution_status("SUCCEEDED"), OperationStatus::Succeeded);
        assert_eq!(execution_status("FAILED"), OperationStatus::Failed);
        assert_eq!(execution_status("CANCELLED"), OperationStatus::Cancelled);
        assert_eq!(execution_status("STATE_UNSPECIFIED"), OperationStatus::Pending);
    }
}
