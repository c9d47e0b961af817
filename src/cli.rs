//! CLI command definitions using clap.

#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![deny(clippy::panic)]

use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// provcheck - deployment provisioning checks
#[derive(Parser, Debug)]
#[command(name = "provcheck")]
#[command(version)]
#[command(about = "Idempotent provisioning checks for an analytics deployment")]
#[command(
    long_about = "provcheck audits deployer roles, enables project APIs in batches, grants dataset access without duplicating entries, and waits on workflow and Dataform runs."
)]
pub struct Cli {
    /// Configuration file (TOML)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Log at debug level unless RUST_LOG says otherwise
    #[arg(short, long, global = true, default_value_t = false)]
    pub verbose: bool,

    /// Print the command report as JSON
    #[arg(long, global = true, default_value_t = false)]
    pub json: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Check that the deployer holds every required project role
    CheckRoles {
        /// Required roles, one per line
        #[arg(long)]
        roles_file: Option<PathBuf>,
    },

    /// Enable the project APIs that are not enabled yet
    EnableApis {
        /// Required services, one per line
        #[arg(long)]
        apis_file: Option<PathBuf>,

        /// Services per enable call
        #[arg(long)]
        chunk_size: Option<usize>,
    },

    /// Grant the deployer service account access to the export datasets
    GrantDatasets,

    /// Run a workflow and wait for it to finish
    RunWorkflow {
        /// Workflow name or full resource name
        /// (default: dataform-{GA4_PROPERTY_ID}-incremental)
        #[arg(short, long)]
        workflow: Option<String>,
    },

    /// Wait for the latest Dataform invocation to settle
    WaitDataform {
        /// Dataform repository
        #[arg(short, long)]
        repository: Option<String>,

        /// Give up after this many seconds
        #[arg(long)]
        timeout_secs: Option<u64>,

        /// Seconds between status checks
        #[arg(long)]
        interval_secs: Option<u64>,
    },
}
