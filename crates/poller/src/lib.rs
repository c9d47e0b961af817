//! # provcheck-poller
//!
//! Waits on remote long-running operations.
//!
//! Two policies cover the observed use cases:
//!
//! - **Exponential backoff, no timeout**: for short operations such as
//!   workflow executions. Delays run 1s, 2s, 4s, ... and the wait ends as soon
//!   as the operation leaves its in-flight state.
//! - **Fixed interval with a hard timeout**: for long jobs such as Dataform
//!   invocations. Polls every 30s and gives up with `TIMED_OUT` after 300s.
//!
//! Both are parameters, not constants: see [`PollSchedule`] and
//! [`PollPolicy`].
//!
//! # Example
//!
//! ```ignore
//! use provcheck_poller::{PollPolicy, Poller};
//!
//! let poller = Poller::system();
//! let policy = PollPolicy::until_settled(interval, timeout);
//! match poller.await_terminal(&handle, &service, &policy).await {
//!     Some(report) if report.timed_out() => { /* still running */ }
//!     Some(report) => println!("finished: {}", report.status),
//!     None => { /* status could not be read */ }
//! }
//! ```

#![forbid(unsafe_code)]
#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![deny(clippy::panic)]

pub mod clock;
pub mod poller;
pub mod schedule;

pub use clock::{Clock, TokioClock, VirtualClock};
pub use poller::{PollReport, Poller, PollerConfig};
pub use schedule::{Delays, PollPolicy, PollSchedule, TerminalSet};
