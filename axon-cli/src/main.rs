//! ## axon-cli
//! **Command line entry point**
//!
//! `axon run` executes the configured scenario on a fixed worker pool and
//! prints its report as YAML; `axon check-config` prints the resolved
//! configuration.

use clap::Parser;

mod commands;

use commands::Cli;

fn main() -> anyhow::Result<()> {
    commands::run_command(Cli::parse())
}
