//! Poll schedules and terminal status sets.

use std::time::Duration;

use provcheck_core::{Error, OperationStatus, Result};

/// How long to wait between polls, and when to give up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollSchedule {
    /// Delay starts at `initial` and doubles after every non-terminal poll.
    /// There is no elapsed-time limit.
    Exponential {
        initial: Duration,
        max_delay: Option<Duration>,
    },
    /// Constant delay; the wait ends with `TIMED_OUT` once `timeout` has
    /// elapsed.
    FixedWithTimeout { interval: Duration, timeout: Duration },
}

impl PollSchedule {
    /// Default exponential schedule: 1s, doubling, uncapped.
    pub const fn exponential() -> Self {
        Self::Exponential {
            initial: Duration::from_secs(1),
            max_delay: None,
        }
    }

    /// Default fixed schedule: poll every 30s for at most 300s.
    pub const fn fixed_with_timeout() -> Self {
        Self::FixedWithTimeout {
            interval: Duration::from_secs(30),
            timeout: Duration::from_secs(300),
        }
    }

    /// Elapsed-time budget, if the schedule has one.
    pub const fn timeout(&self) -> Option<Duration> {
        match self {
            Self::Exponential { .. } => None,
            Self::FixedWithTimeout { timeout, .. } => Some(*timeout),
        }
    }

    /// Reject schedules that would spin without waiting.
    ///
    /// # Errors
    ///
    /// Returns `InvalidConfig` for a zero initial delay or interval, or a
    /// cap below the initial delay.
    pub fn validate(&self) -> Result<()> {
        match self {
            Self::Exponential { initial, max_delay } => {
                if initial.is_zero() {
                    return Err(Error::invalid_config("initial poll delay must be positive"));
                }
                if max_delay.is_some_and(|cap| cap < *initial) {
                    return Err(Error::invalid_config(
                        "maximum poll delay must not be below the initial delay",
                    ));
                }
                Ok(())
            }
            Self::FixedWithTimeout { interval, .. } => {
                if interval.is_zero() {
                    return Err(Error::invalid_config("poll interval must be positive"));
                }
                Ok(())
            }
        }
    }

    /// The sequence of delays this schedule produces.
    pub fn delays(&self) -> Delays {
        match *self {
            Self::Exponential { initial, max_delay } => Delays {
                next: initial,
                growth: Growth::Doubling { cap: max_delay },
            },
            Self::FixedWithTimeout { interval, .. } => Delays {
                next: interval,
                growth: Growth::Constant,
            },
        }
    }
}

#[derive(Debug, Clone, Copy)]
enum Growth {
    Constant,
    Doubling { cap: Option<Duration> },
}

/// Infinite iterator over poll delays.
#[derive(Debug, Clone)]
pub struct Delays {
    next: Duration,
    growth: Growth,
}

impl Iterator for Delays {
    type Item = Duration;

    fn next(&mut self) -> Option<Duration> {
        let current = self.next;
        if let Growth::Doubling { cap } = self.growth {
            let doubled = current.checked_mul(2).unwrap_or(Duration::MAX);
            self.next = cap.map_or(doubled, |cap| doubled.min(cap));
        }
        Some(current)
    }
}

/// Explicit set of statuses that end a wait.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TerminalSet {
    mask: u8,
}

impl TerminalSet {
    /// A set containing exactly `statuses`.
    pub fn of(statuses: &[OperationStatus]) -> Self {
        Self {
            mask: statuses.iter().fold(0, |mask, s| mask | bit(*s)),
        }
    }

    /// `SUCCEEDED | FAILED | CANCELLED`.
    pub fn settled() -> Self {
        Self::of(&[
            OperationStatus::Succeeded,
            OperationStatus::Failed,
            OperationStatus::Cancelled,
        ])
    }

    /// Every remote status except `in_flight`.
    ///
    /// Used where a wait ends as soon as the operation leaves its in-flight
    /// state, whatever it moves to.
    pub fn all_except(in_flight: OperationStatus) -> Self {
        let statuses: Vec<OperationStatus> = OperationStatus::ALL
            .into_iter()
            .filter(|s| *s != in_flight && *s != OperationStatus::TimedOut)
            .collect();
        Self::of(&statuses)
    }

    /// Whether `status` ends the wait.
    pub const fn contains(&self, status: OperationStatus) -> bool {
        self.mask & bit(status) != 0
    }

    /// Members of the set, in status declaration order.
    pub fn statuses(&self) -> Vec<OperationStatus> {
        OperationStatus::ALL
            .into_iter()
            .filter(|s| self.contains(*s))
            .collect()
    }
}

const fn bit(status: OperationStatus) -> u8 {
    match status {
        OperationStatus::Pending => 1,
        OperationStatus::Running => 1 << 1,
        OperationStatus::Succeeded => 1 << 2,
        OperationStatus::Failed => 1 << 3,
        OperationStatus::Cancelled => 1 << 4,
        OperationStatus::TimedOut => 1 << 5,
    }
}

/// A schedule paired with the statuses that end it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollPolicy {
    pub schedule: PollSchedule,
    pub terminal: TerminalSet,
}

impl PollPolicy {
    /// Pair a schedule with a terminal set.
    pub const fn new(schedule: PollSchedule, terminal: TerminalSet) -> Self {
        Self { schedule, terminal }
    }

    /// Short-lived operations: exponential backoff until the operation is
    /// no longer running.
    pub fn until_not_running(initial: Duration, max_delay: Option<Duration>) -> Self {
        Self::new(
            PollSchedule::Exponential { initial, max_delay },
            TerminalSet::all_except(OperationStatus::Running),
        )
    }

    /// Long-lived jobs: fixed interval until settled or the budget runs out.
    pub fn until_settled(interval: Duration, timeout: Duration) -> Self {
        Self::new(
            PollSchedule::FixedWithTimeout { interval, timeout },
            TerminalSet::settled(),
        )
    }
}
