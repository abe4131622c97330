//! Cross-thread marker and region accounting.

use std::sync::Arc;

use parking_lot::Mutex;
use rustc_hash::FxHashMap;
use tracing::{debug, info, trace};

use looppoint_core::Addr;

use crate::ManagerConfig;

/// Exit reason passed to the simulator when a region is complete.
pub const REGION_BOUNDARY_REASON: &str = "simpoint starting point found";

/// Manager handle shared by every probe of a simulation.
///
/// Probes are driven from the single simulation thread, one commit at a
/// time, so the lock is never contended. If probes are ever driven from
/// several host threads, `count_pc` calls from different threads still
/// serialize here, but the region cut then depends on their interleaving.
///
/// Probes release the lock before calling `SimControl::exit_sim_loop_now`,
/// so a controller may lock the manager from inside that callback.
pub type SharedManager = Arc<Mutex<LoopPointManager>>;

/// Global marker counters, basic-block lengths and the region trigger.
#[derive(Debug)]
pub struct LoopPointManager {
    counter: FxHashMap<Addr, u64>,
    bb_inst: FxHashMap<Addr, u64>,
    region_length: u64,
    global_inst_counter: u64,
    most_recent_pc: Addr,
    raise_exit_event: bool,
}

impl LoopPointManager {
    #[must_use]
    pub fn new(config: &ManagerConfig) -> Self {
        debug!(region_length = config.region_length, "created looppoint manager");
        Self {
            counter: FxHashMap::default(),
            bb_inst: FxHashMap::default(),
            region_length: config.region_length,
            global_inst_counter: 0,
            most_recent_pc: 0,
            raise_exit_event: config.raise_exit_event,
        }
    }

    /// Wrap into a handle for probes.
    #[must_use]
    pub fn into_shared(self) -> SharedManager {
        Arc::new(Mutex::new(self))
    }

    /// Count a visit to marker `pc` that ends a span of `inst_count`
    /// instructions.
    ///
    /// Returns whether the simulation must stop now for a region boundary.
    /// Once the running counter reaches the region length this holds on
    /// every call until the driver clears the counter. The caller raises
    /// the stop with `REGION_BOUNDARY_REASON` after releasing the manager.
    #[must_use = "a region boundary must be reported to the simulator"]
    pub fn count_pc(&mut self, pc: Addr, inst_count: u64) -> bool {
        *self.counter.entry(pc).or_insert(0) += 1;
        self.most_recent_pc = pc;
        self.global_inst_counter += inst_count;
        trace!(
            pc = format_args!("{pc:#x}"),
            inst_count,
            global = self.global_inst_counter,
            "counted marker"
        );

        if self.raise_exit_event && self.global_inst_counter >= self.region_length {
            info!(
                pc = format_args!("{pc:#x}"),
                count = self.counter[&pc],
                instructions = self.global_inst_counter,
                "region boundary found"
            );
            return true;
        }
        false
    }

    /// Record the length of the block starting at `start`. Only the first
    /// recorded length is kept. Returns whether it was recorded.
    pub fn update_bb_inst(&mut self, start: Addr, len: u64) -> bool {
        if self.bb_inst.contains_key(&start) {
            return false;
        }
        self.bb_inst.insert(start, len);
        true
    }

    /// Visits per marker pc.
    #[must_use]
    pub const fn counter(&self) -> &FxHashMap<Addr, u64> {
        &self.counter
    }

    /// Visits of `pc`, or `None` if it was never counted.
    #[must_use]
    pub fn pc_count(&self, pc: Addr) -> Option<u64> {
        self.counter.get(&pc).copied()
    }

    /// Instruction length per basic block start.
    #[must_use]
    pub const fn bb_inst(&self) -> &FxHashMap<Addr, u64> {
        &self.bb_inst
    }

    /// Instructions counted since the counter was last cleared.
    #[must_use]
    pub const fn global_inst_counter(&self) -> u64 {
        self.global_inst_counter
    }

    pub const fn clear_global_inst_counter(&mut self) {
        self.global_inst_counter = 0;
    }

    /// Last marker pc counted by any thread.
    #[must_use]
    pub const fn most_recent_pc(&self) -> Addr {
        self.most_recent_pc
    }

    #[must_use]
    pub const fn region_length(&self) -> u64 {
        self.region_length
    }

    #[must_use]
    pub const fn is_raising_exit_event(&self) -> bool {
        self.raise_exit_event
    }

    pub const fn enable_raising_exit_event(&mut self) {
        self.raise_exit_event = true;
    }

    pub const fn disable_raising_exit_event(&mut self) {
        self.raise_exit_event = false;
    }
}

impl Default for LoopPointManager {
    fn default() -> Self {
        Self::new(&ManagerConfig::default())
    }
}
