//! Command-line interface for reconciling asset inventories against the
//! authoritative topography.
#![forbid(unsafe_code)]

use clap::{Parser, Subcommand};

mod document;
mod error;
mod reconcile;

pub use error::CliError;
use reconcile::{ReconcileArgs, run_reconcile};

pub(crate) const ARG_RECONCILE_INPUT: &str = "input";
pub(crate) const ARG_RECONCILE_OUTPUT: &str = "output";
pub(crate) const ARG_RECONCILE_MATCH_CONFIG: &str = "match-config";
pub(crate) const ENV_RECONCILE_INPUT: &str = "LANDMATCH_CMDS_RECONCILE_INPUT";

/// Run the CLI with the current process arguments and environment.
pub fn run() -> Result<(), CliError> {
    let cli = Cli::try_parse().map_err(CliError::ArgumentParsing)?;
    match cli.command {
        Command::Reconcile(args) => run_reconcile(args),
    }
}

#[derive(Debug, Parser)]
#[command(
    name = "landmatch",
    about = "Match asset-management polygons against the authoritative topography",
    version
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Classify every asset type of a batch and derive reconciliation actions.
    Reconcile(ReconcileArgs),
}

#[cfg(test)]
mod tests;
