//! Analyze command.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use tracing::{error, info};

use looppoint::{ManagerConfig, ProbeConfig, Replay, ReplayReport, bbv, open_trace};

use crate::cli::{AnalyzeArgs, EXIT_FAILURE, EXIT_SUCCESS};
use crate::terminal::{self, Spinner};

fn probe_config(args: &AnalyzeArgs) -> ProbeConfig {
    let mut config = ProbeConfig::default()
        .with_kernel_filter_at_start(!args.no_kernel_filter)
        .with_listening_at_start(!args.no_listen_at_start);
    if let Some(range) = args.bb_range {
        config = config.with_bb_valid_range(range);
    }
    if let Some(range) = args.marker_range {
        config = config.with_marker_valid_range(range);
    }
    for range in &args.exclude {
        config = config.with_excluded_range(*range);
    }
    config
}

fn manager_config(args: &AnalyzeArgs) -> ManagerConfig {
    ManagerConfig::default()
        .with_region_length(args.region_len)
        .with_exit_event(!args.no_exit_event)
}

/// Handle the `analyze` command.
pub fn cmd_analyze(args: &AnalyzeArgs, silent: bool) -> i32 {
    let records = match open_trace(&args.trace) {
        Ok(records) => records,
        Err(e) => {
            error!(error = %e, path = %args.trace.display(), "failed to open trace");
            return EXIT_FAILURE;
        }
    };

    let spinner = if silent {
        Spinner::hidden()
    } else {
        Spinner::new(format!("Replaying {}", args.trace.display()))
    };
    let mut replay = Replay::new(probe_config(args), &manager_config(args)).with_max_threads(args.max_threads);
    if let Err(e) = replay.run(records) {
        spinner.finish_with_failure(&format!("replay failed: {e}"));
        return EXIT_FAILURE;
    }
    let report = replay.finish();
    spinner.finish_with_success(&format!(
        "replayed {} instructions, {} regions",
        report.instructions,
        report.boundaries.len()
    ));
    looppoint::metrics::record_report(&report);

    if let Some(path) = &args.bbv {
        if let Err(e) = write_bbv_file(path, &report) {
            error!(error = %e, path = %path.display(), "failed to write basic-block vectors");
            return EXIT_FAILURE;
        }
        info!(path = %path.display(), regions = report.regions.len(), "wrote basic-block vectors");
    }

    if !silent {
        print_report(&report);
    }
    EXIT_SUCCESS
}

fn write_bbv_file(path: &Path, report: &ReplayReport) -> std::io::Result<()> {
    let mut out = BufWriter::new(File::create(path)?);
    bbv::write_bbv(&mut out, &report.regions, &report.bb_inst)?;
    out.flush()
}

fn print_report(report: &ReplayReport) {
    terminal::heading("Regions");
    if report.boundaries.is_empty() {
        println!("  none");
    }
    for boundary in &report.boundaries {
        println!(
            "  #{:<4} marker {:<24} tick {:<12} {} instructions",
            boundary.index,
            boundary.marker.to_string(),
            boundary.tick,
            boundary.instructions
        );
    }
    terminal::row("trailing instructions", report.trailing_instructions);
    terminal::row("stop requests", report.stop_requests);

    terminal::heading("Markers");
    let mut markers: Vec<_> = report.marker_counts.iter().collect();
    markers.sort_by(|a, b| b.1.cmp(a.1).then(a.0.cmp(b.0)));
    for (pc, count) in markers.iter().take(10) {
        terminal::row(&format!("{pc:#x}"), count);
    }
    if markers.len() > 10 {
        terminal::row("...", format!("{} more", markers.len() - 10));
    }

    terminal::heading("Threads");
    for stats in &report.threads {
        terminal::row(
            &format!("thread {}", stats.thread),
            format!(
                "kernel filtered {}, user filtered {}, pending {}",
                stats.filtered_kernel, stats.filtered_user, stats.pending
            ),
        );
    }
    terminal::row("basic blocks", report.bb_inst.len());
}
