//! Project IAM policy lookups.

use async_trait::async_trait;
use provcheck_core::{Principal, Result, Role, RoleBindingSource};
use reqwest::Method;
use serde::Deserialize;
use serde_json::json;

use crate::client::GcpClient;

#[derive(Debug, Deserialize)]
struct Policy {
    #[serde(default)]
    bindings: Vec<Binding>,
}

#[derive(Debug, Deserialize)]
struct Binding {
    role: String,
    #[serde(default)]
    members: Vec<String>,
}

/// Project-level role bindings from Resource Manager.
#[derive(Debug, Clone)]
pub struct ResourceManager {
    client: GcpClient,
    project_id: String,
}

impl ResourceManager {
    pub fn new(client: GcpClient, project_id: impl Into<String>) -> Self {
        Self {
            client,
            project_id: project_id.into(),
        }
    }
}

#[async_trait]
impl RoleBindingSource for ResourceManager {
    async fn fetch_project_role_bindings(&self, principal: &Principal) -> Result<Vec<Role>> {
        let resource = format!("projects/{}", self.project_id);
        let url = GcpClient::endpoint(
            &self.client.bases().resource_manager,
            &format!("v3/{resource}:getIamPolicy"),
        )?;
        let policy: Policy = self
            .client
            .send_json("projects.getIamPolicy", &resource, Method::POST, url, &json!({}), None)
            .await?;

        Ok(roles_of(&policy, principal))
    }
}

fn roles_of(policy: &Policy, principal: &Principal) -> Vec<Role> {
    policy
        .bindings
        .iter()
        .filter(|b| b.members.iter().any(|m| m == principal.as_member()))
        .map(|b| Role::new(b.role.as_str()))
        .collect()
}
