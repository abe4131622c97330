//! LoopPoint CLI

mod cli;
mod commands;
mod terminal;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use cli::Cli;

fn main() {
    let cli = Cli::parse();

    let metrics_handle = if cli.metrics {
        looppoint::metrics::CliRecorder::new().install()
    } else {
        None
    };
    looppoint::metrics::init();

    let default_level = if cli.verbose {
        "looppoint=debug,looppoint_probe=debug"
    } else if cli.silent {
        "error"
    } else {
        "looppoint=info,looppoint_probe=info"
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let exit_code = commands::run_command(&cli);

    if let Some(handle) = metrics_handle {
        handle.print_summary();
    }

    std::process::exit(exit_code);
}
