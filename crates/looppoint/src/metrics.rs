//! Replay metrics using metrics-rs.
//!
//! Metrics are recorded once per replay from the final report, never from
//! the per-instruction path.

use std::collections::HashMap;
use std::sync::Arc;

use metrics::{
    Counter, Gauge, Histogram, Key, KeyName, Metadata, Recorder, SharedString, Unit, counter,
    describe_counter, describe_gauge, gauge,
};
use parking_lot::RwLock;

use crate::replay::ReplayReport;

/// Register metric descriptions. Call once at startup.
pub fn init() {
    describe_counter!(
        "looppoint_instructions_total",
        Unit::Count,
        "Committed instructions delivered to probes"
    );
    describe_counter!(
        "looppoint_filtered_kernel_total",
        Unit::Count,
        "Kernel-mode instructions filtered per thread"
    );
    describe_counter!(
        "looppoint_filtered_user_total",
        Unit::Count,
        "User-mode instructions outside the valid address ranges per thread"
    );
    describe_counter!("looppoint_regions_total", Unit::Count, "Regions cut");
    describe_counter!(
        "looppoint_stop_requests_total",
        Unit::Count,
        "Region-boundary stop requests raised by the manager"
    );
    describe_counter!(
        "looppoint_markers_total",
        Unit::Count,
        "Marker visits counted by the manager"
    );
    describe_gauge!(
        "looppoint_basic_blocks",
        Unit::Count,
        "Distinct basic blocks with a recorded length"
    );
    describe_gauge!(
        "looppoint_trailing_instructions",
        Unit::Count,
        "Instructions counted after the last region boundary"
    );
}

/// Record the outcome of a replay.
#[allow(clippy::cast_precision_loss)]
pub fn record_report(report: &ReplayReport) {
    counter!("looppoint_instructions_total").absolute(report.instructions);
    counter!("looppoint_regions_total").absolute(report.boundaries.len() as u64);
    counter!("looppoint_stop_requests_total").absolute(report.stop_requests);
    counter!("looppoint_markers_total").absolute(report.marker_counts.values().sum());
    gauge!("looppoint_basic_blocks").set(report.bb_inst.len() as f64);
    gauge!("looppoint_trailing_instructions").set(report.trailing_instructions as f64);

    for stats in &report.threads {
        let labels = [("thread", stats.thread.to_string())];
        counter!("looppoint_filtered_kernel_total", &labels).absolute(stats.filtered_kernel);
        counter!("looppoint_filtered_user_total", &labels).absolute(stats.filtered_user);
    }
}

// ============================================================================
// CLI Recorder for terminal output
// ============================================================================

#[derive(Default)]
struct Storage {
    counters: RwLock<HashMap<String, u64>>,
    gauges: RwLock<HashMap<String, f64>>,
}

struct CliCounter {
    key: String,
    storage: Arc<Storage>,
}

impl metrics::CounterFn for CliCounter {
    fn increment(&self, value: u64) {
        *self.storage.counters.write().entry(self.key.clone()).or_insert(0) += value;
    }

    fn absolute(&self, value: u64) {
        self.storage.counters.write().insert(self.key.clone(), value);
    }
}

struct CliGauge {
    key: String,
    storage: Arc<Storage>,
}

impl metrics::GaugeFn for CliGauge {
    fn increment(&self, value: f64) {
        *self.storage.gauges.write().entry(self.key.clone()).or_insert(0.0) += value;
    }

    fn decrement(&self, value: f64) {
        *self.storage.gauges.write().entry(self.key.clone()).or_insert(0.0) -= value;
    }

    fn set(&self, value: f64) {
        self.storage.gauges.write().insert(self.key.clone(), value);
    }
}

/// Recorder that keeps counters and gauges in memory for a summary.
#[derive(Default)]
pub struct CliRecorder {
    storage: Arc<Storage>,
}

impl CliRecorder {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Install as the global recorder. Returns `None` if a recorder is
    /// already installed.
    #[must_use]
    pub fn install(self) -> Option<CliRecorderHandle> {
        let storage = Arc::clone(&self.storage);
        metrics::set_global_recorder(self).ok()?;
        Some(CliRecorderHandle { storage })
    }
}

fn key_to_string(key: &Key) -> String {
    let labels: Vec<String> = key
        .labels()
        .map(|l| format!("{}={}", l.key(), l.value()))
        .collect();
    if labels.is_empty() {
        key.name().to_string()
    } else {
        format!("{}{{{}}}", key.name(), labels.join(","))
    }
}

impl Recorder for CliRecorder {
    fn describe_counter(&self, _key: KeyName, _unit: Option<Unit>, _description: SharedString) {}
    fn describe_gauge(&self, _key: KeyName, _unit: Option<Unit>, _description: SharedString) {}
    fn describe_histogram(&self, _key: KeyName, _unit: Option<Unit>, _description: SharedString) {}

    fn register_counter(&self, key: &Key, _metadata: &Metadata<'_>) -> Counter {
        Counter::from_arc(Arc::new(CliCounter {
            key: key_to_string(key),
            storage: Arc::clone(&self.storage),
        }))
    }

    fn register_gauge(&self, key: &Key, _metadata: &Metadata<'_>) -> Gauge {
        Gauge::from_arc(Arc::new(CliGauge {
            key: key_to_string(key),
            storage: Arc::clone(&self.storage),
        }))
    }

    fn register_histogram(&self, _key: &Key, _metadata: &Metadata<'_>) -> Histogram {
        Histogram::noop()
    }
}

/// Access to metrics collected by an installed `CliRecorder`.
pub struct CliRecorderHandle {
    storage: Arc<Storage>,
}

impl CliRecorderHandle {
    #[must_use]
    pub fn get_counter(&self, key: &str) -> Option<u64> {
        self.storage.counters.read().get(key).copied()
    }

    #[must_use]
    pub fn get_gauge(&self, key: &str) -> Option<f64> {
        self.storage.gauges.read().get(key).copied()
    }

    /// Print collected metrics, sorted by key.
    pub fn print_summary(&self) {
        let counters = self.storage.counters.read();
        let gauges = self.storage.gauges.read();
        if counters.is_empty() && gauges.is_empty() {
            println!("No metrics collected.");
            return;
        }

        println!();
        println!("## Metrics Summary");
        if !counters.is_empty() {
            println!();
            println!("### Counters");
            let mut entries: Vec<_> = counters.iter().collect();
            entries.sort_by(|a, b| a.0.cmp(b.0));
            for (key, value) in entries {
                println!("  {key}: {value}");
            }
        }
        if !gauges.is_empty() {
            println!();
            println!("### Gauges");
            let mut entries: Vec<_> = gauges.iter().collect();
            entries.sort_by(|a, b| a.0.cmp(b.0));
            for (key, value) in entries {
                println!("  {key}: {value:.2}");
            }
        }
    }
}
