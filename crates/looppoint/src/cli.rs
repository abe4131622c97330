//! CLI definitions and argument types.

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use looppoint::{AddrRange, DEFAULT_REGION_LENGTH};

/// Exit code for success.
pub const EXIT_SUCCESS: i32 = 0;
/// Exit code for failure.
pub const EXIT_FAILURE: i32 = 1;

#[derive(Parser)]
#[command(name = "looppoint")]
#[command(about = "LoopPoint region analysis over committed-instruction traces")]
#[command(version)]
pub struct Cli {
    /// Show metrics summary after execution
    #[arg(long, global = true)]
    pub metrics: bool,

    /// Enable verbose output (sets RUST_LOG=debug)
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Suppress output (only show errors)
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub silent: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Replay a commit trace and report regions, markers and basic blocks
    Analyze(AnalyzeArgs),
}

#[derive(clap::Args)]
pub struct AnalyzeArgs {
    /// Commit trace (`.zst` files are decompressed)
    #[arg(value_name = "TRACE")]
    pub trace: PathBuf,

    /// Instructions per region
    #[arg(long, default_value_t = DEFAULT_REGION_LENGTH)]
    pub region_len: u64,

    /// Do not stop at region boundaries
    #[arg(long)]
    pub no_exit_event: bool,

    /// Valid basic-block address range (START:END, END=0 disables)
    #[arg(long, value_name = "START:END")]
    pub bb_range: Option<AddrRange>,

    /// Valid marker address range (START:END, END=0 disables)
    #[arg(long, value_name = "START:END")]
    pub marker_range: Option<AddrRange>,

    /// Excluded address range (repeatable)
    #[arg(long, value_name = "START:END")]
    pub exclude: Vec<AddrRange>,

    /// Keep kernel-mode instructions in the analysis
    #[arg(long)]
    pub no_kernel_filter: bool,

    /// Attach probes without listening
    #[arg(long)]
    pub no_listen_at_start: bool,

    /// Maximum number of hardware threads in the trace
    #[arg(long, default_value_t = looppoint::replay::DEFAULT_MAX_THREADS)]
    pub max_threads: usize,

    /// Write per-region basic-block vectors in SimPoint format
    #[arg(long, value_name = "PATH")]
    pub bbv: Option<PathBuf>,
}
