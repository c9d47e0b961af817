//! Bulk enablement of project services.

use std::future::{Future, ready};
use std::path::Path;
use std::sync::Arc;

use provcheck_core::{BatchResult, BatchService, Error, OperationHandle, Result, ServiceId, ServiceState};
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::chunk::{ChunkLimit, EmptyInput, pending_items, plan_chunks, run_in_chunks};

/// Read a service list: one service id per line, blank lines skipped.
///
/// Lines may hold either the short id (`bigquery.googleapis.com`) or the
/// full resource name (`projects/p/services/bigquery.googleapis.com`).
///
/// # Errors
///
/// `FileReadFailed` when the file cannot be read.
pub fn read_service_list(path: &Path) -> Result<Vec<ServiceId>> {
    let content = std::fs::read_to_string(path)
        .map_err(|e| Error::file_read_failed(path, e.to_string()))?;
    Ok(content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(ServiceId::from_resource_name)
        .collect())
}

/// How a single submitted chunk ended.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum ChunkOutcome {
    Submitted { result: BatchResult },
    Failed { reason: String },
}

/// One chunk of an enable run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChunkReport {
    /// Zero-based position of the chunk.
    pub index: usize,
    pub items: Vec<ServiceId>,
    pub outcome: ChunkOutcome,
}

impl ChunkReport {
    pub fn failed(&self) -> bool {
        matches!(self.outcome, ChunkOutcome::Failed { .. })
    }

    /// Long-running operation started by this chunk, if it was accepted.
    pub fn operation(&self) -> Option<&OperationHandle> {
        match &self.outcome {
            ChunkOutcome::Submitted { result } => result.operation.as_ref(),
            ChunkOutcome::Failed { .. } => None,
        }
    }
}

/// Result of [`ServiceEnabler::enable`].
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct EnableReport {
    /// Services that needed no call.
    pub already_enabled: Vec<ServiceId>,
    /// Per-chunk submissions, in order.
    pub chunks: Vec<ChunkReport>,
}

impl EnableReport {
    /// Every chunk was accepted by the remote side.
    pub fn all_submitted(&self) -> bool {
        !self.chunks.iter().any(ChunkReport::failed)
    }

    /// Services that were submitted for enablement.
    pub fn requested(&self) -> Vec<&ServiceId> {
        self.chunks.iter().flat_map(|c| c.items.iter()).collect()
    }

    /// Long-running operations started by accepted chunks.
    pub fn operations(&self) -> Vec<&OperationHandle> {
        self.chunks.iter().filter_map(ChunkReport::operation).collect()
    }

    pub fn failed_chunks(&self) -> Vec<&ChunkReport> {
        self.chunks.iter().filter(|c| c.failed()).collect()
    }
}

/// Settings for [`ServiceEnabler`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EnablerConfig {
    pub limit: ChunkLimit,
    pub empty_input: EmptyInput,
}

/// Enables services that are not yet enabled, a bounded chunk at a time.
pub struct ServiceEnabler {
    service: Arc<dyn BatchService>,
    config: EnablerConfig,
}

impl ServiceEnabler {
    pub fn new(service: Arc<dyn BatchService>, config: EnablerConfig) -> Self {
        Self { service, config }
    }

    /// Look up the state of `services` and enable the ones not enabled.
    ///
    /// State lookups and enable calls are both chunked. A lookup that fails
    /// leaves its services in the pending set; enabling an already-enabled
    /// service is harmless remotely. A failed enable chunk is logged and
    /// recorded, and later chunks still run. No call is retried.
    pub async fn enable(&self, services: &[ServiceId]) -> EnableReport {
        let (report, _) = self.enable_then(services, |_| ready(())).await;
        report
    }

    /// Like [`Self::enable`], awaiting `after_operation` on every operation
    /// an accepted chunk started before the next chunk is submitted.
    ///
    /// Returns the report and the follow-up results in chunk order.
    pub async fn enable_then<W, F, Fut>(
        &self,
        services: &[ServiceId],
        mut after_operation: F,
    ) -> (EnableReport, Vec<W>)
    where
        F: FnMut(OperationHandle) -> Fut,
        Fut: Future<Output = W>,
    {
        let states = self.current_states(services).await;

        let already_enabled: Vec<ServiceId> = states
            .iter()
            .filter(|(_, state)| *state == ServiceState::Enabled)
            .map(|(id, _)| id.clone())
            .collect();
        let pending = pending_items(states, &ServiceState::Enabled);

        if pending.is_empty() {
            info!("All required service APIs are enabled");
        }

        let mut chunks = Vec::new();
        let mut follow_ups = Vec::new();
        for (index, items) in plan_chunks(&pending, self.config.limit, self.config.empty_input)
            .into_iter()
            .enumerate()
        {
            let report = self.submit_chunk(index, items).await;
            if let Some(operation) = report.operation() {
                follow_ups.push(after_operation(operation.clone()).await);
            }
            chunks.push(report);
        }

        (
            EnableReport {
                already_enabled,
                chunks,
            },
            follow_ups,
        )
    }

    async fn submit_chunk(&self, index: usize, items: &[ServiceId]) -> ChunkReport {
        debug!(chunk = index, count = items.len(), "Submitting enable chunk");
        let outcome = match self.service.submit_batch(items).await {
            Ok(result) => {
                info!(chunk = index, services = items.len(), "Enable request accepted");
                ChunkOutcome::Submitted { result }
            }
            Err(e) => {
                warn!(chunk = index, error = %e, "Enable request failed");
                ChunkOutcome::Failed {
                    reason: e.to_string(),
                }
            }
        };
        ChunkReport {
            index,
            items: items.to_vec(),
            outcome,
        }
    }

    async fn current_states(&self, services: &[ServiceId]) -> Vec<(ServiceId, ServiceState)> {
        let lookups = run_in_chunks(services, self.config.limit, EmptyInput::Skip, |chunk| {
            let service = Arc::clone(&self.service);
            async move {
                match service.fetch_states(chunk).await {
                    Ok(states) => states,
                    Err(e) => {
                        warn!(error = %e, count = chunk.len(), "Service state lookup failed");
                        chunk
                            .iter()
                            .map(|id| (id.clone(), ServiceState::Unspecified))
                            .collect()
                    }
                }
            }
        })
        .await;
        lookups.into_iter().flatten().collect()
    }
}
