//! The wait loop.

use std::sync::Arc;
use std::time::Duration;

use provcheck_core::{
    OperationHandle, OperationRequest, OperationService, OperationSnapshot, OperationStatus,
    Result,
};
use serde::Serialize;
use tracing::{debug, error, info, warn};

use crate::clock::{Clock, TokioClock};
use crate::schedule::PollPolicy;

/// Configuration for the poller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollerConfig {
    /// Consecutive transport failures absorbed before the wait is abandoned.
    pub transport_error_tolerance: u32,
}

impl Default for PollerConfig {
    fn default() -> Self {
        Self {
            transport_error_tolerance: 1,
        }
    }
}

/// Final outcome of a wait.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PollReport {
    /// Terminal status reported by the remote system, or `TimedOut`.
    pub status: OperationStatus,
    /// Last snapshot successfully read, if any.
    pub snapshot: Option<OperationSnapshot>,
    /// Number of status queries issued.
    pub polls: u32,
    /// Time spent in the wait.
    pub elapsed: Duration,
}

impl PollReport {
    /// Whether the operation succeeded.
    pub const fn succeeded(&self) -> bool {
        self.status.is_success()
    }

    /// Whether the wait ran out of budget.
    pub fn timed_out(&self) -> bool {
        self.status == OperationStatus::TimedOut
    }
}

/// Drives status queries for one operation until it reaches a terminal
/// status or the schedule's budget is spent.
///
/// Queries for a handle are strictly sequential: the next query is only
/// issued after the previous one returned and the scheduled delay passed.
pub struct Poller {
    clock: Arc<dyn Clock>,
    config: PollerConfig,
}

impl Poller {
    /// Create a poller on the given clock.
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            clock,
            config: PollerConfig::default(),
        }
    }

    /// Create a poller on the tokio wall clock.
    pub fn system() -> Self {
        Self::new(Arc::new(TokioClock::new()))
    }

    /// Replace the configuration.
    #[must_use]
    pub const fn with_config(mut self, config: PollerConfig) -> Self {
        self.config = config;
        self
    }

    /// Get the configuration.
    pub const fn config(&self) -> &PollerConfig {
        &self.config
    }

    /// Poll `handle` until its status is in the policy's terminal set.
    ///
    /// A query is only issued while the elapsed time is strictly below the
    /// schedule's timeout; once it is reached the wait returns `TimedOut`
    /// with the last snapshot read.
    ///
    /// Transport failures are logged and absorbed up to the configured
    /// tolerance of consecutive failures. Past that, or on any
    /// non-transient error, the wait is abandoned and `None` is returned.
    ///
    /// A schedule that fails [`PollSchedule::validate`] issues no query and
    /// returns `None`.
    ///
    /// [`PollSchedule::validate`]: crate::schedule::PollSchedule::validate
    pub async fn await_terminal(
        &self,
        handle: &OperationHandle,
        service: &dyn OperationService,
        policy: &PollPolicy,
    ) -> Option<PollReport> {
        if let Err(e) = policy.schedule.validate() {
            error!(operation = %handle, error = %e, "Refusing to poll with an invalid schedule");
            return None;
        }
        let start = self.clock.now();
        let timeout = policy.schedule.timeout();
        let mut delays = policy.schedule.delays();
        let mut polls = 0u32;
        let mut consecutive_failures = 0u32;
        let mut last: Option<OperationSnapshot> = None;

        loop {
            let elapsed = self.clock.now().saturating_sub(start);
            if timeout.is_some_and(|budget| elapsed >= budget) {
                info!(
                    operation = %handle,
                    polls,
                    elapsed_secs = elapsed.as_secs(),
                    "Timed out waiting for operation"
                );
                return Some(PollReport {
                    status: OperationStatus::TimedOut,
                    snapshot: last,
                    polls,
                    elapsed,
                });
            }

            polls = polls.saturating_add(1);
            match service.query_status(handle).await {
                Ok(snapshot) => {
                    consecutive_failures = 0;
                    if policy.terminal.contains(snapshot.status) {
                        let elapsed = self.clock.now().saturating_sub(start);
                        info!(
                            operation = %handle,
                            status = %snapshot.status,
                            polls,
                            "Operation finished"
                        );
                        return Some(PollReport {
                            status: snapshot.status,
                            snapshot: Some(snapshot),
                            polls,
                            elapsed,
                        });
                    }
                    debug!(operation = %handle, status = %snapshot.status, "Waiting for operation");
                    last = Some(snapshot);
                }
                Err(e) if e.is_transient() => {
                    consecutive_failures = consecutive_failures.saturating_add(1);
                    if consecutive_failures > self.config.transport_error_tolerance {
                        warn!(
                            operation = %handle,
                            error = %e,
                            consecutive_failures,
                            "Abandoning wait after repeated transport errors"
                        );
                        return None;
                    }
                    warn!(operation = %handle, error = %e, "Status query failed, will retry");
                }
                Err(e) => {
                    error!(operation = %handle, error = %e, "Status query failed");
                    return None;
                }
            }

            let delay = delays.next().unwrap_or(Duration::MAX);
            self.clock.sleep(delay).await;
        }
    }

    /// Submit an operation, then wait for it.
    ///
    /// # Errors
    ///
    /// Propagates the submission error; the wait itself never errors.
    pub async fn submit_and_await(
        &self,
        service: &dyn OperationService,
        request: &OperationRequest,
        policy: &PollPolicy,
    ) -> Result<(OperationHandle, Option<PollReport>)> {
        policy.schedule.validate()?;
        let handle = service.submit(request).await?;
        info!(operation = %handle, target = %request.target, "Submitted operation");
        let report = self.await_terminal(&handle, service, policy).await;
        Ok((handle, report))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::VirtualClock;
    use provcheck_core::memory::{ScriptStep, ScriptedOperations};

    fn poller(clock: &Arc<VirtualClock>) -> Poller {
        Poller::new(clock.clone())
    }

    #[tokio::test]
    async fn test_immediate_terminal_needs_one_query() {
        let clock = Arc::new(VirtualClock::new());
        let ops = ScriptedOperations::always(OperationStatus::Succeeded);
        let policy = PollPolicy::until_settled(Duration::from_secs(30), Duration::from_secs(300));

        let report = poller(&clock)
            .await_terminal(&OperationHandle::new("op"), &ops, &policy)
            .await;

        let report = report.map(|r| (r.status, r.polls));
        assert_eq!(report, Some((OperationStatus::Succeeded, 1)));
        assert!(clock.sleeps().await.is_empty());
    }

    #[tokio::test]
    async fn test_single_transport_error_is_absorbed() {
        let clock = Arc::new(VirtualClock::new());
        let ops = ScriptedOperations::new([
            ScriptStep::TransportError("reset".into()),
            ScriptStep::Status(OperationStatus::Failed),
        ]);
        let policy = PollPolicy::until_settled(Duration::from_secs(30), Duration::from_secs(300));

        let report = poller(&clock)
            .await_terminal(&OperationHandle::new("op"), &ops, &policy)
            .await;

        assert_eq!(report.map(|r| r.status), Some(OperationStatus::Failed));
    }

    #[tokio::test]
    async fn test_repeated_transport_errors_abandon_wait() {
        let clock = Arc::new(VirtualClock::new());
        let ops = ScriptedOperations::new([ScriptStep::TransportError("down".into())]);
        let policy = PollPolicy::until_settled(Duration::from_secs(30), Duration::from_secs(300));

        let report = poller(&clock)
            .await_terminal(&OperationHandle::new("op"), &ops, &policy)
            .await;

        assert!(report.is_none());
        assert_eq!(ops.query_count().await, 2);
    }

    #[tokio::test]
    async fn test_success_resets_failure_count() {
        let clock = Arc::new(VirtualClock::new());
        let ops = ScriptedOperations::new([
            ScriptStep::TransportError("blip".into()),
            ScriptStep::Status(OperationStatus::Running),
            ScriptStep::TransportError("blip".into()),
            ScriptStep::Status(OperationStatus::Succeeded),
        ]);
        let policy = PollPolicy::until_settled(Duration::from_secs(30), Duration::from_secs(300));

        let report = poller(&clock)
            .await_terminal(&OperationHandle::new("op"), &ops, &policy)
            .await;

        assert_eq!(report.map(|r| r.polls), Some(4));
    }

    #[tokio::test]
    async fn test_submit_rejects_invalid_schedule() {
        let clock = Arc::new(VirtualClock::new());
        let ops = ScriptedOperations::always(OperationStatus::Succeeded);
        let policy = PollPolicy::until_settled(Duration::ZERO, Duration::from_secs(300));

        let result = poller(&clock)
            .submit_and_await(&ops, &OperationRequest::new("wf"), &policy)
            .await;

        assert!(result.is_err());
        assert!(ops.submitted().await.is_empty());
    }
}
