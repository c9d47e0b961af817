//! In-memory collaborators.
//!
//! These back the component tests and local dry runs. Every call is
//! recorded so callers can assert how many reads and writes happened.

use std::collections::{HashMap, HashSet, VecDeque};

use async_trait::async_trait;
use tokio::sync::Mutex;

use crate::error::Error;
use crate::ports::{BatchService, GrantStore, OperationService, RoleBindingSource};
use crate::result::Result;
use crate::types::{
    AccessEntry, BatchResult, GrantSnapshot, OperationHandle, OperationRequest,
    OperationSnapshot, OperationStatus, Principal, ResourceId, Role, ServiceId, ServiceState,
};

/// Access lists held in memory, versioned per write.
#[derive(Debug, Default)]
pub struct InMemoryGrantStore {
    state: Mutex<GrantStoreState>,
}

#[derive(Debug, Default)]
struct GrantStoreState {
    resources: HashMap<ResourceId, GrantSnapshot>,
    revision: u64,
    fetches: usize,
    writes: Vec<(ResourceId, Vec<AccessEntry>)>,
    discard_writes: bool,
}

impl GrantStoreState {
    fn next_version(&mut self) -> String {
        self.revision = self.revision.saturating_add(1);
        format!("rev-{}", self.revision)
    }

    fn put(&mut self, resource: ResourceId, entries: Vec<AccessEntry>) -> GrantSnapshot {
        let version = self.next_version();
        let snapshot = GrantSnapshot::new(resource.clone(), entries).with_version(version);
        self.resources.insert(resource, snapshot.clone());
        snapshot
    }
}

impl InMemoryGrantStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a resource with an initial access list.
    #[must_use]
    pub fn with_resource(mut self, resource: ResourceId, entries: Vec<AccessEntry>) -> Self {
        self.state.get_mut().put(resource, entries);
        self
    }

    /// Accept writes without applying them, so post-write reads miss the new entry.
    #[must_use]
    pub fn discarding_writes(mut self) -> Self {
        self.state.get_mut().discard_writes = true;
        self
    }

    /// Append an entry as an outside writer would, bumping the version.
    pub async fn external_write(&self, resource: &ResourceId, entry: AccessEntry) -> Result<()> {
        let mut state = self.state.lock().await;
        let current = state
            .resources
            .get(resource)
            .ok_or_else(|| Error::resource_not_found(resource.as_str()))?;
        let entries = current.with_entry(entry);
        state.put(resource.clone(), entries);
        Ok(())
    }

    /// Current snapshot of a resource, if it exists. Not counted as a fetch.
    pub async fn snapshot(&self, resource: &ResourceId) -> Option<GrantSnapshot> {
        self.state.lock().await.resources.get(resource).cloned()
    }

    /// Number of `fetch_grants` calls served.
    pub async fn fetch_count(&self) -> usize {
        self.state.lock().await.fetches
    }

    /// Every `replace_grants` call, in order.
    pub async fn writes(&self) -> Vec<(ResourceId, Vec<AccessEntry>)> {
        self.state.lock().await.writes.clone()
    }
}

#[async_trait]
impl GrantStore for InMemoryGrantStore {
    async fn fetch_grants(&self, resource: &ResourceId) -> Result<GrantSnapshot> {
        let mut state = self.state.lock().await;
        state.fetches = state.fetches.saturating_add(1);
        state
            .resources
            .get(resource)
            .cloned()
            .ok_or_else(|| Error::resource_not_found(resource.as_str()))
    }

    async fn replace_grants(
        &self,
        resource: &ResourceId,
        entries: Vec<AccessEntry>,
        expected_version: Option<&str>,
    ) -> Result<GrantSnapshot> {
        let mut state = self.state.lock().await;
        state.writes.push((resource.clone(), entries.clone()));

        let current = state
            .resources
            .get(resource)
            .cloned()
            .ok_or_else(|| Error::resource_not_found(resource.as_str()))?;

        if let Some(expected) = expected_version {
            if current.version.as_deref() != Some(expected) {
                return Err(Error::conflict(
                    resource.as_str(),
                    format!(
                        "expected version {expected}, found {}",
                        current.version.as_deref().unwrap_or("none")
                    ),
                ));
            }
        }

        if state.discard_writes {
            return Ok(current);
        }
        Ok(state.put(resource.clone(), entries))
    }
}

/// One scripted answer of [`ScriptedOperations`].
#[derive(Debug, Clone, PartialEq)]
pub enum ScriptStep {
    Status(OperationStatus),
    TransportError(String),
}

/// Operation service that replays a fixed sequence of answers.
///
/// Once the script is exhausted the last step repeats forever.
#[derive(Debug)]
pub struct ScriptedOperations {
    state: Mutex<ScriptState>,
}

#[derive(Debug)]
struct ScriptState {
    steps: VecDeque<ScriptStep>,
    last: ScriptStep,
    queries: usize,
    submitted: Vec<OperationRequest>,
}

impl ScriptedOperations {
    /// Create a service answering with `steps` in order.
    pub fn new(steps: impl IntoIterator<Item = ScriptStep>) -> Self {
        let steps: VecDeque<ScriptStep> = steps.into_iter().collect();
        let last = steps
            .back()
            .cloned()
            .unwrap_or(ScriptStep::Status(OperationStatus::Running));
        Self {
            state: Mutex::new(ScriptState {
                steps,
                last,
                queries: 0,
                submitted: Vec::new(),
            }),
        }
    }

    /// A service reporting `status` on every query.
    pub fn always(status: OperationStatus) -> Self {
        Self::new([ScriptStep::Status(status)])
    }

    /// A service reporting each status in turn.
    pub fn statuses(statuses: impl IntoIterator<Item = OperationStatus>) -> Self {
        Self::new(statuses.into_iter().map(ScriptStep::Status))
    }

    /// Number of status queries answered (including scripted failures).
    pub async fn query_count(&self) -> usize {
        self.state.lock().await.queries
    }

    /// Every submitted request, in order.
    pub async fn submitted(&self) -> Vec<OperationRequest> {
        self.state.lock().await.submitted.clone()
    }
}

#[async_trait]
impl OperationService for ScriptedOperations {
    async fn submit(&self, request: &OperationRequest) -> Result<OperationHandle> {
        let mut state = self.state.lock().await;
        state.submitted.push(request.clone());
        Ok(OperationHandle::new(format!(
            "{}/executions/{}",
            request.target,
            state.submitted.len()
        )))
    }

    async fn query_status(&self, handle: &OperationHandle) -> Result<OperationSnapshot> {
        let mut state = self.state.lock().await;
        state.queries = state.queries.saturating_add(1);
        let step = state.steps.pop_front().unwrap_or_else(|| state.last.clone());
        match step {
            ScriptStep::Status(status) => Ok(OperationSnapshot::new(handle.clone(), status)),
            ScriptStep::TransportError(reason) => Err(Error::transport("query_status", reason)),
        }
    }
}

/// Fixed project role bindings.
#[derive(Debug, Default, Clone)]
pub struct StaticRoleBindings {
    bindings: HashMap<Principal, Vec<Role>>,
}

impl StaticRoleBindings {
    /// Create an empty binding table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind `roles` to `principal`.
    #[must_use]
    pub fn bind(mut self, principal: Principal, roles: impl IntoIterator<Item = Role>) -> Self {
        self.bindings.entry(principal).or_default().extend(roles);
        self
    }
}

#[async_trait]
impl RoleBindingSource for StaticRoleBindings {
    async fn fetch_project_role_bindings(&self, principal: &Principal) -> Result<Vec<Role>> {
        Ok(self.bindings.get(principal).cloned().unwrap_or_default())
    }
}

/// Service enablement state held in memory.
#[derive(Debug, Default)]
pub struct InMemoryServiceRegistry {
    state: Mutex<RegistryState>,
}

#[derive(Debug, Default)]
struct RegistryState {
    services: HashMap<ServiceId, ServiceState>,
    submitted: Vec<Vec<ServiceId>>,
    fetched: Vec<Vec<ServiceId>>,
    failing_submits: HashSet<usize>,
}

impl InMemoryServiceRegistry {
    /// Create an empty registry; unknown services read as disabled.
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a service state.
    #[must_use]
    pub fn with_service(mut self, id: &str, state: ServiceState) -> Self {
        self.state.get_mut().services.insert(ServiceId::new(id), state);
        self
    }

    /// Make the `call_index`-th (zero-based) `submit_batch` call fail with a transport error.
    #[must_use]
    pub fn failing_submit(mut self, call_index: usize) -> Self {
        self.state.get_mut().failing_submits.insert(call_index);
        self
    }

    /// Every chunk passed to `submit_batch`, in order.
    pub async fn submitted_chunks(&self) -> Vec<Vec<ServiceId>> {
        self.state.lock().await.submitted.clone()
    }

    /// Every chunk passed to `fetch_states`, in order.
    pub async fn fetched_chunks(&self) -> Vec<Vec<ServiceId>> {
        self.state.lock().await.fetched.clone()
    }

    /// Current state of a service.
    pub async fn state_of(&self, id: &str) -> ServiceState {
        self.state
            .lock()
            .await
            .services
            .get(&ServiceId::new(id))
            .copied()
            .unwrap_or(ServiceState::Disabled)
    }
}

#[async_trait]
impl BatchService for InMemoryServiceRegistry {
    async fn submit_batch(&self, chunk: &[ServiceId]) -> Result<BatchResult> {
        let mut state = self.state.lock().await;
        let call_index = state.submitted.len();
        state.submitted.push(chunk.to_vec());

        if state.failing_submits.contains(&call_index) {
            return Err(Error::transport(
                "submit_batch",
                format!("scripted failure on call {call_index}"),
            ));
        }

        for id in chunk {
            state.services.insert(id.clone(), ServiceState::Enabled);
        }
        Ok(BatchResult::completed(chunk.to_vec()))
    }

    async fn fetch_states(&self, chunk: &[ServiceId]) -> Result<Vec<(ServiceId, ServiceState)>> {
        let mut state = self.state.lock().await;
        state.fetched.push(chunk.to_vec());
        Ok(chunk
            .iter()
            .map(|id| {
                let current = state
                    .services
                    .get(id)
                    .copied()
                    .unwrap_or(ServiceState::Disabled);
                (id.clone(), current)
            })
            .collect())
    }
}
