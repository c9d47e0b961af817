//! CLI command handlers.
//!
//! Each handler wires the REST adapters into one component, runs it, prints
//! a report and returns the process outcome. Failures that stop a command
//! before it has a report come back as errors.

#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![deny(clippy::panic)]

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use provcheck_batcher::{ChunkLimit, ServiceEnabler, read_service_list};
use provcheck_core::{OptionExt, Role};
use provcheck_gcp::{
    BigQueryDatasets, DataformInvocations, GcpClient, ResourceManager, ServiceUsage,
    ServiceUsageOperations, WorkflowExecutions,
};
use provcheck_poller::{PollPolicy, Poller};
use provcheck_reconciler::{GrantReconciler, RoleAudit, read_role_list};
use serde::Serialize;
use tracing::{debug, info};

use crate::cli::{Cli, Commands};
use crate::config::{Environment, ProvcheckConfig, vars};
use crate::outcome::Outcome;
use crate::provision::{
    dataset_grants, enable_apis, incremental_workflow, run_workflow, wait_for_invocation,
};

/// Everything a handler needs.
struct Session {
    config: ProvcheckConfig,
    env: Environment,
    json: bool,
}

impl Session {
    fn client(&self) -> Result<GcpClient> {
        let mut gcp = self.config.gcp.clone();
        if gcp.access_token.is_none() {
            gcp.access_token = Some(
                self.env
                    .access_token
                    .clone()
                    .ok_or_missing(vars::ACCESS_TOKEN)?,
            );
        }
        Ok(GcpClient::new(gcp)?)
    }

    fn poller(&self) -> Poller {
        Poller::system().with_config(self.config.polling.poller_config())
    }

    fn report<T: Serialize>(&self, report: &T, summary: impl FnOnce() -> String) -> Result<()> {
        if self.json {
            println!(
                "{}",
                serde_json::to_string_pretty(report).context("Failed to encode report")?
            );
        } else {
            println!("{}", summary());
        }
        Ok(())
    }
}

/// Load the configuration file, or the defaults when none is given.
pub fn load_config(path: Option<&Path>) -> Result<ProvcheckConfig> {
    match path {
        Some(path) => ProvcheckConfig::from_file(path)
            .with_context(|| format!("Failed to load config from {}", path.display())),
        None => Ok(ProvcheckConfig::default()),
    }
}

/// Execute a CLI command.
///
/// This is the main command dispatcher that routes to the appropriate handler.
pub async fn execute_command(cli: Cli) -> Result<Outcome> {
    let ctx = Session {
        config: load_config(cli.config.as_deref())?,
        env: Environment::from_env(),
        json: cli.json,
    };
    debug!(
        polling = ?ctx.config.polling,
        batching = ?ctx.config.batching,
        "Loaded configuration"
    );

    match cli.command {
        Commands::CheckRoles { roles_file } => cmd_check_roles(&ctx, roles_file.as_deref()).await,
        Commands::EnableApis {
            apis_file,
            chunk_size,
        } => cmd_enable_apis(&ctx, apis_file.as_deref(), chunk_size).await,
        Commands::GrantDatasets => cmd_grant_datasets(&ctx).await,
        Commands::RunWorkflow { workflow } => cmd_run_workflow(&ctx, workflow).await,
        Commands::WaitDataform {
            repository,
            timeout_secs,
            interval_secs,
        } => cmd_wait_dataform(&ctx, repository, timeout_secs, interval_secs).await,
    }
}

/// Audit the deployer's project roles.
async fn cmd_check_roles(ctx: &Session, roles_file: Option<&Path>) -> Result<Outcome> {
    let identity = ctx.env.deployment_identity()?;
    let path = roles_file.unwrap_or(ctx.config.roles_file.as_path());
    let required = read_role_list(path)?;

    let bindings = ResourceManager::new(ctx.client()?, identity.project_id.clone());
    let audit = RoleAudit::new(Arc::new(bindings)).with_admin_equivalent(ctx.config.admin_roles());
    let report = audit.audit(&identity, &required).await?;

    ctx.report(&report, || {
        let missing = report
            .missing
            .as_deref()
            .filter(|roles| !roles.is_empty())
            .map_or_else(
                || "none".to_string(),
                |roles| roles.iter().map(Role::as_str).collect::<Vec<_>>().join(", "),
            );
        format!(
            "deployer: {}\nmissing roles: {missing}\nimpersonation: {:?}",
            report.deployer, report.impersonation
        )
    })?;

    Ok(if report.is_ready() {
        Outcome::Success
    } else {
        Outcome::Failure
    })
}

/// Enable missing project APIs in chunks and wait on the operations.
async fn cmd_enable_apis(
    ctx: &Session,
    apis_file: Option<&Path>,
    chunk_size: Option<usize>,
) -> Result<Outcome> {
    let project_id = ctx.env.project_id()?;
    let path = apis_file.unwrap_or(ctx.config.apis_file.as_path());
    let services = read_service_list(path)?;

    let mut enabler_config = ctx.config.batching.enabler_config();
    if let Some(size) = chunk_size {
        enabler_config.limit = ChunkLimit::new(size)?;
    }

    let client = ctx.client()?;
    let enabler = ServiceEnabler::new(
        Arc::new(ServiceUsage::new(client.clone(), project_id)),
        enabler_config,
    );
    let operations = ServiceUsageOperations::new(client);
    let policy = ctx.config.polling.backoff_policy();

    let result = enable_apis(&enabler, &operations, &ctx.poller(), &policy, &services).await;

    ctx.report(&result, || {
        format!(
            "already enabled: {}\nrequested: {}\nfailed chunks: {}\noperations awaited: {}",
            result.report.already_enabled.len(),
            result.report.requested().len(),
            result.report.failed_chunks().len(),
            result.operations.len()
        )
    })?;
    Ok(result.outcome())
}

/// Give the deployer service account ownership of the export datasets.
async fn cmd_grant_datasets(ctx: &Session) -> Result<Outcome> {
    let role = Role::new(ctx.config.dataset_role.as_str());
    let desired = dataset_grants(&ctx.env, &role)?;
    info!(grants = desired.len(), "Ensuring dataset grants");

    let reconciler = GrantReconciler::new(
        Arc::new(BigQueryDatasets::new(ctx.client()?)),
        ctx.config.grants.reconciler_config(),
    );
    let changes = reconciler
        .ensure_all(&desired)
        .await
        .context("Dataset grant reconciliation stopped")?;

    ctx.report(&changes, || {
        format!(
            "added: {}\nalready present: {}\nfailed: {}",
            changes.applied.len(),
            changes.already_present.len(),
            changes.failed.len()
        )
    })?;

    Ok(if changes.all_succeeded() {
        Outcome::Success
    } else {
        Outcome::Failure
    })
}

/// Start a workflow and wait for it.
async fn cmd_run_workflow(ctx: &Session, workflow: Option<String>) -> Result<Outcome> {
    let project_id = ctx.env.project_id()?;
    let workflow = match workflow {
        Some(name) => name,
        None => incremental_workflow(ctx.env.ga4_property_id()?),
    };

    let executions = WorkflowExecutions::new(ctx.client()?, project_id, ctx.env.region.as_str());
    let policy = ctx.config.polling.backoff_policy();
    let result = run_workflow(&executions, &ctx.poller(), &policy, &workflow).await?;

    ctx.report(&result, || {
        let status = result
            .report
            .as_ref()
            .map_or_else(|| "unknown".to_string(), |r| r.status.to_string());
        format!("execution: {}\nstatus: {status}", result.handle)
    })?;
    Ok(result.outcome())
}

/// Wait for the latest Dataform invocation.
async fn cmd_wait_dataform(
    ctx: &Session,
    repository: Option<String>,
    timeout_secs: Option<u64>,
    interval_secs: Option<u64>,
) -> Result<Outcome> {
    let project_id = ctx.env.project_id()?;
    let repository = repository.unwrap_or_else(|| ctx.config.dataform_repository.clone());

    let polling = &ctx.config.polling;
    let policy = PollPolicy::until_settled(
        Duration::from_secs(interval_secs.unwrap_or(polling.fixed_interval_secs)),
        Duration::from_secs(timeout_secs.unwrap_or(polling.fixed_timeout_secs)),
    );
    policy.schedule.validate()?;

    let dataform = DataformInvocations::new(ctx.client()?, project_id, ctx.env.region.as_str());
    let latest = dataform.latest_invocation(&repository).await?;
    let result =
        wait_for_invocation(latest, &repository, &dataform, &ctx.poller(), &policy).await?;

    ctx.report(&result, || {
        let status = result
            .report
            .as_ref()
            .map_or_else(|| "unknown".to_string(), |r| r.status.to_string());
        format!("invocation: {}\nstatus: {status}", result.handle)
    })?;
    Ok(result.outcome())
}
