//! Compositions of the components that the CLI commands run.
//!
//! Everything here talks to the remote platform only through the
//! collaborator traits, so the same flows run against the REST adapters or
//! the in-memory fakes.

use itertools::Itertools;
use provcheck_batcher::{EnableReport, ServiceEnabler};
use provcheck_core::{
    Error, GrantSpec, OperationHandle, OperationRequest, OperationService, OptionExt, Result, Role,
    ServiceId,
};
use provcheck_poller::{PollPolicy, PollReport, Poller};
use serde::Serialize;
use tracing::{info, warn};

use crate::config::{Environment, vars};
use crate::dataset_list::{DatasetLocation, parse_dataset_list};
use crate::outcome::Outcome;

/// Datasets the deployer service account must own: the GA4 export dataset
/// followed by every entry of the ads export list.
///
/// # Errors
///
/// `ConfigurationMissing` for an unset deployer account or GA4 export
/// location; `InvalidInput` for a malformed ads export list.
pub fn dataset_grants(env: &Environment, role: &Role) -> Result<Vec<GrantSpec>> {
    let principal = env.deployer_service_account()?;
    let ga4 = DatasetLocation::new(
        env.ga4_export_project
            .as_deref()
            .ok_or_missing(vars::GA4_EXPORT_PROJECT)?,
        env.ga4_export_dataset
            .as_deref()
            .ok_or_missing(vars::GA4_EXPORT_DATASET)?,
    )?;
    let ads = match env.ads_export_data.as_deref() {
        Some(raw) => parse_dataset_list(raw)?,
        None => Vec::new(),
    };

    Ok(std::iter::once(ga4)
        .chain(ads)
        .map(|location| GrantSpec::new(location.resource_id(), principal.clone(), role.clone()))
        .unique()
        .collect())
}

/// One enable operation and how its wait ended.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OperationWait {
    pub handle: OperationHandle,
    /// `None` when the status could not be read.
    pub report: Option<PollReport>,
}

/// Result of `enable_apis`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ApiEnablement {
    pub report: EnableReport,
    pub operations: Vec<OperationWait>,
}

impl ApiEnablement {
    pub fn outcome(&self) -> Outcome {
        let submitted = if self.report.all_submitted() {
            Outcome::Success
        } else {
            Outcome::Failure
        };
        self.operations
            .iter()
            .map(|wait| Outcome::from_poll(wait.report.as_ref()))
            .fold(submitted, Outcome::then)
    }
}

/// Enable the services that are not enabled yet. Each operation a chunk
/// starts is awaited before the next chunk is submitted.
pub async fn enable_apis(
    enabler: &ServiceEnabler,
    operations: &dyn OperationService,
    poller: &Poller,
    policy: &PollPolicy,
    services: &[ServiceId],
) -> ApiEnablement {
    let (report, waits) = enabler
        .enable_then(services, move |handle| async move {
            let wait = poller.await_terminal(&handle, operations, policy).await;
            match &wait {
                Some(r) if r.succeeded() => info!(operation = %handle, "Enable operation finished"),
                Some(r) => {
                    warn!(operation = %handle, status = %r.status, "Enable operation did not succeed");
                }
                None => warn!(operation = %handle, "Enable operation status unavailable"),
            }
            OperationWait {
                handle,
                report: wait,
            }
        })
        .await;

    ApiEnablement {
        report,
        operations: waits,
    }
}

/// Name of the incremental workflow deployed for a GA4 property.
pub fn incremental_workflow(ga4_property_id: &str) -> String {
    format!("dataform-{ga4_property_id}-incremental")
}

/// A finished or abandoned wait on a known operation.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WaitResult {
    pub handle: OperationHandle,
    pub report: Option<PollReport>,
}

impl WaitResult {
    pub fn outcome(&self) -> Outcome {
        Outcome::from_poll(self.report.as_ref())
    }
}

/// Start `workflow` and wait for it to leave its in-flight state.
///
/// # Errors
///
/// Errors from the submission; the wait itself never errors.
pub async fn run_workflow(
    executions: &dyn OperationService,
    poller: &Poller,
    policy: &PollPolicy,
    workflow: &str,
) -> Result<WaitResult> {
    let request = OperationRequest::new(workflow);
    let (handle, report) = poller.submit_and_await(executions, &request, policy).await?;
    Ok(WaitResult { handle, report })
}

/// Wait on `latest`, the most recent invocation of `repository`.
///
/// # Errors
///
/// `ResourceNotFound` when the repository has no started invocation.
pub async fn wait_for_invocation(
    latest: Option<OperationHandle>,
    repository: &str,
    invocations: &dyn OperationService,
    poller: &Poller,
    policy: &PollPolicy,
) -> Result<WaitResult> {
    let handle = latest.ok_or_else(|| {
        Error::resource_not_found(format!("latest invocation of {repository}"))
    })?;
    info!(invocation = %handle, "Waiting for invocation");
    let report = poller.await_terminal(&handle, invocations, policy).await;
    Ok(WaitResult { handle, report })
}
