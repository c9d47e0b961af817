//! Project role checks for the deploying identity.

use std::collections::HashSet;
use std::path::Path;
use std::sync::Arc;

use itertools::Itertools;
use provcheck_core::{Error, Principal, Result, Role, RoleBindingSource};
use serde::Serialize;
use tracing::{error, info};

/// Roles that imply every other project role.
pub const ADMIN_EQUIVALENT_ROLES: [&str; 2] = ["roles/owner", "roles/admin"];

/// Role a user needs to impersonate the deployer service account.
pub const TOKEN_CREATOR_ROLE: &str = "roles/iam.serviceAccountTokenCreator";

/// Required roles absent from `existing`, in the order of `required`.
///
/// Returns `None` when `existing` holds an admin-equivalent role: nothing
/// needs granting.
pub fn missing_roles(existing: &HashSet<Role>, required: &[Role]) -> Option<Vec<Role>> {
    let admin: Vec<Role> = ADMIN_EQUIVALENT_ROLES.iter().map(|r| Role::new(*r)).collect();
    missing_roles_with(existing, required, &admin)
}

/// [`missing_roles`] with a caller-supplied admin-equivalent set.
pub fn missing_roles_with(
    existing: &HashSet<Role>,
    required: &[Role],
    admin_equivalent: &[Role],
) -> Option<Vec<Role>> {
    if admin_equivalent.iter().any(|r| existing.contains(r)) {
        return None;
    }
    Some(
        required
            .iter()
            .filter(|r| !existing.contains(*r))
            .cloned()
            .collect(),
    )
}

/// Read a role list: one role per line, surrounding whitespace trimmed,
/// blank lines skipped.
///
/// # Errors
///
/// `FileReadFailed` when the file cannot be read.
pub fn read_role_list(path: &Path) -> Result<Vec<Role>> {
    let content = std::fs::read_to_string(path)
        .map_err(|e| Error::file_read_failed(path, e.to_string()))?;
    Ok(content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(Role::new)
        .collect())
}

/// Who runs a deployment, and as whom.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DeploymentIdentity {
    pub project_id: String,
    /// The human (or CI) account invoking the deployment.
    pub user: Principal,
    /// The account the deployment acts as.
    pub deployer: Principal,
    /// Whether the deployment impersonates a deployer service account.
    pub uses_deployer_service_account: bool,
}

impl DeploymentIdentity {
    /// Resolve the deploying identity.
    ///
    /// Without a deployer service account the user deploys as themselves.
    /// With one and no explicit deployer account, the deployer defaults to
    /// `deployer@<project>.iam.gserviceaccount.com`.
    ///
    /// # Errors
    ///
    /// `InvalidInput` when an account string is empty.
    pub fn resolve(
        project_id: &str,
        user_account: &str,
        use_deployer_service_account: bool,
        deployer_account: Option<&str>,
    ) -> Result<Self> {
        let user = Principal::normalize(user_account)?;
        let deployer = if !use_deployer_service_account {
            user.clone()
        } else {
            match deployer_account.map(str::trim).filter(|a| !a.is_empty()) {
                Some(account) => Principal::normalize(account)?,
                None => Principal::normalize(&format!(
                    "deployer@{project_id}.iam.gserviceaccount.com"
                ))?,
            }
        };
        Ok(Self {
            project_id: project_id.to_string(),
            user,
            deployer,
            uses_deployer_service_account: use_deployer_service_account,
        })
    }

    /// Whether the user acts as a different account.
    pub fn impersonates(&self) -> bool {
        self.uses_deployer_service_account && self.user != self.deployer
    }
}

/// Result of checking whether the user may impersonate the deployer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ImpersonationCheck {
    /// The user deploys as themselves.
    NotRequired,
    /// The user holds the token creator role (or an admin-equivalent role).
    Granted,
    /// The user lacks the token creator role.
    MissingTokenCreator,
}

/// Outcome of a deployer role audit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RoleAuditReport {
    pub deployer: Principal,
    /// `None` when the deployer holds an admin-equivalent role.
    pub missing: Option<Vec<Role>>,
    pub impersonation: ImpersonationCheck,
}

impl RoleAuditReport {
    /// The deployer has every required role and can be acted as.
    pub fn is_ready(&self) -> bool {
        self.missing.as_ref().is_none_or(Vec::is_empty)
            && self.impersonation != ImpersonationCheck::MissingTokenCreator
    }
}

/// Checks a deploying identity's project roles.
pub struct RoleAudit {
    bindings: Arc<dyn RoleBindingSource>,
    admin_equivalent: Vec<Role>,
}

impl RoleAudit {
    /// Create an audit using the default admin-equivalent roles.
    pub fn new(bindings: Arc<dyn RoleBindingSource>) -> Self {
        Self {
            bindings,
            admin_equivalent: ADMIN_EQUIVALENT_ROLES.iter().map(|r| Role::new(*r)).collect(),
        }
    }

    /// Replace the admin-equivalent role set.
    #[must_use]
    pub fn with_admin_equivalent(mut self, roles: Vec<Role>) -> Self {
        self.admin_equivalent = roles;
        self
    }

    /// Audit `identity` against `required` project roles.
    ///
    /// # Errors
    ///
    /// `InvalidInput` for an empty required list; errors from the binding
    /// source propagate.
    pub async fn audit(
        &self,
        identity: &DeploymentIdentity,
        required: &[Role],
    ) -> Result<RoleAuditReport> {
        if required.is_empty() {
            return Err(Error::invalid_input("required role list is empty"));
        }

        let deployer_roles: HashSet<Role> = self
            .bindings
            .fetch_project_role_bindings(&identity.deployer)
            .await?
            .into_iter()
            .collect();

        let missing = missing_roles_with(&deployer_roles, required, &self.admin_equivalent);
        match missing.as_deref() {
            Some(roles) if !roles.is_empty() => {
                error!(
                    account = %identity.deployer,
                    missing = %roles.iter().map(Role::as_str).join(", "),
                    "Required roles are missing"
                );
            }
            _ => info!(account = %identity.deployer, "Account has all the required roles"),
        }

        let impersonation = self.check_impersonation(identity).await?;

        Ok(RoleAuditReport {
            deployer: identity.deployer.clone(),
            missing,
            impersonation,
        })
    }

    async fn check_impersonation(&self, identity: &DeploymentIdentity) -> Result<ImpersonationCheck> {
        if !identity.impersonates() {
            return Ok(ImpersonationCheck::NotRequired);
        }

        let user_roles: HashSet<Role> = self
            .bindings
            .fetch_project_role_bindings(&identity.user)
            .await?
            .into_iter()
            .collect();
        let token_creator = [Role::new(TOKEN_CREATOR_ROLE)];

        let lacking = missing_roles_with(&user_roles, &token_creator, &self.admin_equivalent)
            .is_some_and(|missing| !missing.is_empty());
        if lacking {
            error!(
                account = %identity.user,
                "Missing {TOKEN_CREATOR_ROLE}, which is required for service account impersonation"
            );
            Ok(ImpersonationCheck::MissingTokenCreator)
        } else {
            info!(
                account = %identity.user,
                "User account can impersonate the deployer service account"
            );
            Ok(ImpersonationCheck::Granted)
        }
    }
}
