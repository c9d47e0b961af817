//! Process outcome and exit codes.

use std::process::ExitCode;

use provcheck_core::Error;
use provcheck_poller::PollReport;
use serde::Serialize;

/// How a command ended. Every terminal case is distinct.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    Success,
    Failure,
    TimedOut,
    NotFound,
    Configuration,
}

impl Outcome {
    pub const fn code(self) -> u8 {
        match self {
            Self::Success => 0,
            Self::Failure => 1,
            Self::TimedOut => 2,
            Self::NotFound => 3,
            Self::Configuration => 4,
        }
    }

    pub fn exit_code(self) -> ExitCode {
        ExitCode::from(self.code())
    }

    /// Outcome for a command that stopped on `error`.
    pub const fn from_error(error: &Error) -> Self {
        match error {
            Error::ResourceNotFound { .. } => Self::NotFound,
            Error::ConfigurationMissing { .. } | Error::InvalidConfig { .. } => Self::Configuration,
            Error::Timeout { .. } => Self::TimedOut,
            _ => Self::Failure,
        }
    }

    /// Outcome for an `anyhow` chain, using the first core error found in it.
    pub fn from_anyhow(error: &anyhow::Error) -> Self {
        error
            .chain()
            .find_map(|cause| cause.downcast_ref::<Error>())
            .map_or(Self::Failure, Self::from_error)
    }

    /// Outcome of a wait. An abandoned wait (`None`) is a failure.
    pub fn from_poll(report: Option<&PollReport>) -> Self {
        match report {
            Some(r) if r.succeeded() => Self::Success,
            Some(r) if r.timed_out() => Self::TimedOut,
            _ => Self::Failure,
        }
    }

    /// Keep the first non-success outcome.
    #[must_use]
    pub fn then(self, next: Self) -> Self {
        if self == Self::Success { next } else { self }
    }
}
