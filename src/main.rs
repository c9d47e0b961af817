//! # provcheck
//!
//! Entry point. Parses the command line, sets up logging, runs one command
//! and turns its outcome into the process exit code:
//!
//! | Code | Meaning |
//! |------|---------|
//! | 0 | success |
//! | 1 | failure (missing roles, failed writes, failed operations) |
//! | 2 | an operation did not settle before its timeout |
//! | 3 | a resource does not exist |
//! | 4 | required configuration is missing or invalid |

#![forbid(unsafe_code)]
#![forbid(clippy::unwrap_used)]
#![forbid(clippy::panic)]
#![deny(clippy::expect_used)]

use std::process::ExitCode;

use clap::Parser;
use tracing::{error, info};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use provcheck::cli::Cli;
use provcheck::commands::execute_command;
use provcheck::outcome::Outcome;

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let outcome = match execute_command(cli).await {
        Ok(outcome) => outcome,
        Err(err) => {
            error!("{err:#}");
            Outcome::from_anyhow(&err)
        }
    };
    info!(outcome = ?outcome, code = outcome.code(), "Done");
    outcome.exit_code()
}

/// Initialize tracing subscriber with environment filter.
///
/// Logs go to stderr so stdout carries only the command report.
fn init_tracing(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}
