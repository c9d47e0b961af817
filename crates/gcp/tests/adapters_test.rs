//! HTTP-level tests for the REST adapters against a mock server.

use std::time::Duration;

use provcheck_core::{
    AccessEntry, BatchService, Error, GrantStore, OperationHandle, OperationRequest,
    OperationService, OperationStatus, Principal, ResourceId, Role, RoleBindingSource, ServiceId,
    ServiceState,
};
use provcheck_gcp::{
    BigQueryDatasets, DataformInvocations, GcpClient, GcpConfig, ResourceManager, ServiceUsage,
    ServiceUsageOperations, USER_AGENT, WorkflowExecutions,
};
use serde_json::json;
use url::Url;
use wiremock::matchers::{body_json, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

type TestResult = std::result::Result<(), Box<dyn std::error::Error>>;

fn client_for(server: &MockServer) -> std::result::Result<GcpClient, Box<dyn std::error::Error>> {
    let base = server.uri().parse::<Url>()?;
    Ok(GcpClient::new(
        GcpConfig::with_token("test-token")
            .base_url(&base)
            .timeout(Duration::from_secs(5)),
    )?)
}

#[tokio::test]
async fn test_fetch_dataset_grants() -> TestResult {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/bigquery/v2/projects/proj/datasets/ga4"))
        .and(header("authorization", "Bearer test-token"))
        .and(header("user-agent", USER_AGENT))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "etag": "etag-1",
            "access": [
                { "role": "OWNER", "userByEmail": "deployer@proj.iam.gserviceaccount.com" },
                { "role": "READER", "specialGroup": "projectReaders" }
            ]
        })))
        .mount(&server)
        .await;

    let datasets = BigQueryDatasets::new(client_for(&server)?);
    let snapshot = datasets.fetch_grants(&ResourceId::new("proj.ga4")).await?;

    assert_eq!(snapshot.version.as_deref(), Some("etag-1"));
    assert_eq!(snapshot.entries.len(), 2);
    assert!(snapshot.contains(
        &Principal::normalize("deployer@proj.iam.gserviceaccount.com")?,
        &Role::new("OWNER")
    ));
    Ok(())
}

#[tokio::test]
async fn test_missing_dataset_is_not_found() -> TestResult {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/bigquery/v2/projects/proj/datasets/absent"))
        .respond_with(ResponseTemplate::new(404).set_body_json(json!({
            "error": { "code": 404, "message": "Not found: Dataset proj:absent" }
        })))
        .mount(&server)
        .await;

    let datasets = BigQueryDatasets::new(client_for(&server)?);
    let result = datasets.fetch_grants(&ResourceId::new("proj.absent")).await;

    assert!(matches!(result, Err(Error::ResourceNotFound { .. })));
    Ok(())
}

#[tokio::test]
async fn test_replace_sends_whole_list_with_if_match() -> TestResult {
    let server = MockServer::start().await;
    Mock::given(method("PATCH"))
        .and(path("/bigquery/v2/projects/proj/datasets/ga4"))
        .and(header("if-match", "etag-1"))
        .and(body_json(json!({
            "access": [
                { "role": "READER", "specialGroup": "projectReaders" },
                { "role": "OWNER", "userByEmail": "alice@example.com" }
            ]
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "etag": "etag-2",
            "access": [
                { "role": "READER", "specialGroup": "projectReaders" },
                { "role": "OWNER", "userByEmail": "alice@example.com" }
            ]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let datasets = BigQueryDatasets::new(client_for(&server)?);
    let entries = vec![
        AccessEntry::opaque(
            Some(Role::new("READER")),
            json!({ "role": "READER", "specialGroup": "projectReaders" }),
        ),
        AccessEntry::principal(Principal::normalize("alice@example.com")?, Role::new("OWNER")),
    ];

    let snapshot = datasets
        .replace_grants(&ResourceId::new("proj.ga4"), entries, Some("etag-1"))
        .await?;

    assert_eq!(snapshot.version.as_deref(), Some("etag-2"));
    Ok(())
}

#[tokio::test]
async fn test_fetched_entries_written_back_verbatim() -> TestResult {
    let server = MockServer::start().await;
    let conditioned = json!({
        "role": "READER",
        "userByEmail": "bob@example.com",
        "condition": {
            "title": "expires",
            "expression": "request.time < timestamp('2030-01-01T00:00:00Z')"
        }
    });
    Mock::given(method("GET"))
        .and(path("/bigquery/v2/projects/proj/datasets/ga4"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "etag": "etag-1",
            "access": [conditioned.clone()]
        })))
        .mount(&server)
        .await;
    Mock::given(method("PATCH"))
        .and(path("/bigquery/v2/projects/proj/datasets/ga4"))
        .and(body_json(json!({
            "access": [
                conditioned.clone(),
                { "role": "OWNER", "userByEmail": "deployer@proj.iam.gserviceaccount.com" }
            ]
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "etag": "etag-2",
            "access": [
                conditioned.clone(),
                { "role": "OWNER", "userByEmail": "deployer@proj.iam.gserviceaccount.com" }
            ]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let datasets = BigQueryDatasets::new(client_for(&server)?);
    let resource = ResourceId::new("proj.ga4");
    let current = datasets.fetch_grants(&resource).await?;
    let entries = current.with_entry(AccessEntry::principal(
        Principal::normalize("deployer@proj.iam.gserviceaccount.com")?,
        Role::new("OWNER"),
    ));

    let snapshot = datasets
        .replace_grants(&resource, entries, current.version.as_deref())
        .await?;

    assert_eq!(snapshot.entries.len(), 2);
    assert_eq!(
        snapshot.entries.first().and_then(|e| e.source.clone()),
        Some(conditioned)
    );
    Ok(())
}

#[tokio::test]
async fn test_stale_etag_is_conflict() -> TestResult {
    let server = MockServer::start().await;
    Mock::given(method("PATCH"))
        .and(path("/bigquery/v2/projects/proj/datasets/ga4"))
        .respond_with(ResponseTemplate::new(412).set_body_json(json!({
            "error": { "code": 412, "message": "Precondition check failed." }
        })))
        .mount(&server)
        .await;

    let datasets = BigQueryDatasets::new(client_for(&server)?);
    let result = datasets
        .replace_grants(&ResourceId::new("proj.ga4"), Vec::new(), Some("stale"))
        .await;

    assert!(matches!(result, Err(Error::Conflict { .. })));
    Ok(())
}

#[tokio::test]
async fn test_server_error_is_transient() -> TestResult {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(503).set_body_string("unavailable"))
        .mount(&server)
        .await;

    let operations = ServiceUsageOperations::new(client_for(&server)?);
    let result = operations
        .query_status(&OperationHandle::new("operations/abc"))
        .await;

    assert!(result.is_err_and(|e| e.is_transient()));
    Ok(())
}

#[tokio::test]
async fn test_batch_get_maps_states() -> TestResult {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v1/projects/proj/services:batchGet"))
        .and(query_param("names", "projects/proj/services/bigquery.googleapis.com"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "services": [
                { "name": "projects/123/services/bigquery.googleapis.com", "state": "ENABLED" },
                { "name": "projects/123/services/dataform.googleapis.com", "state": "DISABLED" }
            ]
        })))
        .mount(&server)
        .await;

    let usage = ServiceUsage::new(client_for(&server)?, "proj");
    let states = usage
        .fetch_states(&[
            ServiceId::new("bigquery.googleapis.com"),
            ServiceId::new("dataform.googleapis.com"),
        ])
        .await?;

    assert_eq!(
        states,
        vec![
            (ServiceId::new("bigquery.googleapis.com"), ServiceState::Enabled),
            (ServiceId::new("dataform.googleapis.com"), ServiceState::Disabled),
        ]
    );
    Ok(())
}

#[tokio::test]
async fn test_batch_enable_returns_operation() -> TestResult {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/projects/proj/services:batchEnable"))
        .and(body_json(json!({ "serviceIds": ["dataform.googleapis.com"] })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "name": "operations/acf.p2-123",
            "done": false
        })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/v1/operations/acf.p2-123"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "name": "operations/acf.p2-123",
            "done": true,
            "response": {}
        })))
        .mount(&server)
        .await;

    let client = client_for(&server)?;
    let usage = ServiceUsage::new(client.clone(), "proj");
    let result = usage
        .submit_batch(&[ServiceId::new("dataform.googleapis.com")])
        .await?;

    let handle = result.operation.ok_or("no operation")?;
    assert_eq!(handle.as_str(), "operations/acf.p2-123");

    let snapshot = ServiceUsageOperations::new(client).query_status(&handle).await?;
    assert_eq!(snapshot.status, OperationStatus::Succeeded);
    Ok(())
}

#[tokio::test]
async fn test_project_role_bindings() -> TestResult {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v3/projects/proj:getIamPolicy"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "bindings": [
                { "role": "roles/editor", "members": ["serviceAccount:deployer@proj.iam.gserviceaccount.com"] },
                { "role": "roles/iam.serviceAccountTokenCreator", "members": ["user:alice@example.com"] }
            ]
        })))
        .mount(&server)
        .await;

    let manager = ResourceManager::new(client_for(&server)?, "proj");
    let roles = manager
        .fetch_project_role_bindings(&Principal::normalize("deployer@proj.iam.gserviceaccount.com")?)
        .await?;

    assert_eq!(roles, vec![Role::new("roles/editor")]);
    Ok(())
}

#[tokio::test]
async fn test_workflow_execution_lifecycle() -> TestResult {
    let server = MockServer::start().await;
    let execution = "projects/proj/locations/us-central1/workflows/dataform-1-incremental/executions/e1";
    Mock::given(method("POST"))
        .and(path("/v1/projects/proj/locations/us-central1/workflows/dataform-1-incremental/executions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "name": execution,
            "state": "ACTIVE"
        })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path(format!("/v1/{execution}")))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "name": execution,
            "state": "SUCCEEDED",
            "result": "\"ok\""
        })))
        .mount(&server)
        .await;

    let workflows = WorkflowExecutions::new(client_for(&server)?, "proj", "us-central1");
    let handle = workflows
        .submit(&OperationRequest::new("dataform-1-incremental"))
        .await?;
    let snapshot = workflows.query_status(&handle).await?;

    assert_eq!(handle.as_str(), execution);
    assert_eq!(snapshot.status, OperationStatus::Succeeded);
    assert_eq!(snapshot.detail["result"], json!("\"ok\""));
    Ok(())
}

#[tokio::test]
async fn test_queued_execution_is_in_flight() -> TestResult {
    let server = MockServer::start().await;
    let execution = "projects/proj/locations/us-central1/workflows/w/executions/q1";
    Mock::given(method("GET"))
        .and(path(format!("/v1/{execution}")))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "name": execution,
            "state": "QUEUED"
        })))
        .mount(&server)
        .await;

    let workflows = WorkflowExecutions::new(client_for(&server)?, "proj", "us-central1");
    let snapshot = workflows
        .query_status(&OperationHandle::new(execution))
        .await?;

    assert_eq!(snapshot.status, OperationStatus::Running);
    Ok(())
}

#[tokio::test]
async fn test_latest_dataform_invocation_across_pages() -> TestResult {
    let server = MockServer::start().await;
    let list = "/v1beta1/projects/proj/locations/us-central1/repositories/marketing-analytics/workflowInvocations";
    Mock::given(method("GET"))
        .and(path(list))
        .and(query_param("pageToken", "page-2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "workflowInvocations": [
                { "name": "inv/late", "state": "RUNNING", "invocationTiming": { "startTime": "2024-05-03T00:00:00Z" } }
            ]
        })))
        .with_priority(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path(list))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "workflowInvocations": [
                { "name": "inv/early", "state": "SUCCEEDED", "invocationTiming": { "startTime": "2024-05-01T00:00:00Z" } },
                { "name": "inv/unstarted", "state": "STATE_UNSPECIFIED" }
            ],
            "nextPageToken": "page-2"
        })))
        .with_priority(2)
        .mount(&server)
        .await;

    let dataform = DataformInvocations::new(client_for(&server)?, "proj", "us-central1");
    let latest = dataform.latest_invocation("marketing-analytics").await?;

    assert_eq!(latest, Some(OperationHandle::new("inv/late")));
    Ok(())
}
