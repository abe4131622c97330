//! Command implementations.

mod analyze;

use crate::cli::{Cli, Commands};

/// Dispatch CLI command to the appropriate handler.
pub fn run_command(cli: &Cli) -> i32 {
    match &cli.command {
        Commands::Analyze(args) => analyze::cmd_analyze(args, cli.silent),
    }
}
