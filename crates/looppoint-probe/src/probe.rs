//! Per-thread LoopPoint probe.
//!
//! The probe listens to the commit stream of one hardware thread. Each
//! committed instruction that survives filtering extends the open basic
//! block; a control instruction closes it, and a direct backward transfer
//! reports its target as a loop marker to the shared manager.

use rustc_hash::FxHashMap;
use tracing::debug;

use looppoint_core::{Addr, AddrFilter, AddrRange, PcCountPair, SimControl, StaticInst, ThreadContext, Tick};

use crate::{BasicBlockTracker, MostRecentMarkers, ProbeConfig, REGION_BOUNDARY_REASON, SharedManager};

/// Name of the probe point that reports committed instructions.
pub const COMMIT_PROBE_POINT: &str = "Commit";

/// Registration of a probe on a named probe point.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ProbeListener {
    point: &'static str,
}

impl ProbeListener {
    #[must_use]
    pub const fn new(point: &'static str) -> Self {
        Self { point }
    }

    #[must_use]
    pub const fn point(&self) -> &'static str {
        self.point
    }
}

/// Basic-block and loop-marker probe for one hardware thread.
pub struct LoopPointProbe {
    manager: SharedManager,
    filter: AddrFilter,
    start_listening_at_init: bool,
    listeners: Vec<ProbeListener>,
    tracker: BasicBlockTracker,
    most_recent: MostRecentMarkers,
    /// Instructions since the last marker was forwarded.
    local_inst_counter: u64,
    filtered_kernel_inst_count: u64,
    filtered_user_inst_count: u64,
    filter_kernel_inst: bool,
}

impl LoopPointProbe {
    /// Create a probe. It does not listen until `reg_probe_listeners` or
    /// `start_listening` is called.
    #[must_use]
    pub fn new(config: &ProbeConfig, manager: SharedManager) -> Self {
        for range in &config.exclude_addr_ranges {
            debug!(range = %range, "added excluded address range");
        }
        debug!(
            excluded = config.exclude_addr_ranges.len(),
            bb_valid = %config.bb_valid_addr_range,
            marker_valid = %config.marker_valid_addr_range,
            "created looppoint probe"
        );
        Self {
            manager,
            filter: AddrFilter::new(
                config.bb_valid_addr_range,
                config.marker_valid_addr_range,
                config.exclude_addr_ranges.clone(),
            ),
            start_listening_at_init: config.start_listening_at_start,
            listeners: Vec::new(),
            tracker: BasicBlockTracker::new(),
            most_recent: MostRecentMarkers::new(),
            local_inst_counter: 0,
            filtered_kernel_inst_count: 0,
            filtered_user_inst_count: 0,
            filter_kernel_inst: config.start_kernel_filter_at_start,
        }
    }

    /// Register listeners as configured by `start_listening_at_start`.
    pub fn reg_probe_listeners(&mut self) {
        if self.start_listening_at_init {
            self.start_listening();
            debug!("start listening to the core");
        }
    }

    /// Listen to committed instructions. No-op if already listening.
    pub fn start_listening(&mut self) {
        if self.listeners.is_empty() {
            self.listeners.push(ProbeListener::new(COMMIT_PROBE_POINT));
        }
        debug!(listeners = self.listeners.len(), "start listening");
    }

    /// Drop all listeners.
    pub fn stop_listening(&mut self) {
        self.listeners.clear();
        debug!(listeners = self.listeners.len(), "stop listening");
    }

    #[must_use]
    pub fn is_listening(&self) -> bool {
        !self.listeners.is_empty()
    }

    #[must_use]
    pub fn listeners(&self) -> &[ProbeListener] {
        &self.listeners
    }

    /// Deliver a notification from probe point `point` to every listener
    /// registered on it.
    pub fn notify<T, I, S>(&mut self, point: &str, thread: &T, inst: &I, sim: &mut S)
    where
        T: ThreadContext + ?Sized,
        I: StaticInst + ?Sized,
        S: SimControl + ?Sized,
    {
        let hits = self.listeners.iter().filter(|l| l.point == point).count();
        for _ in 0..hits {
            self.check_pc(thread, inst, sim);
        }
    }

    /// Commit probe point notification.
    pub fn commit<T, I, S>(&mut self, thread: &T, inst: &I, sim: &mut S)
    where
        T: ThreadContext + ?Sized,
        I: StaticInst + ?Sized,
        S: SimControl + ?Sized,
    {
        self.notify(COMMIT_PROBE_POINT, thread, inst, sim);
    }

    /// Analyze one committed instruction.
    pub fn check_pc<T, I, S>(&mut self, thread: &T, inst: &I, sim: &mut S)
    where
        T: ThreadContext + ?Sized,
        I: StaticInst + ?Sized,
        S: SimControl + ?Sized,
    {
        // Only the last micro-op retires the macro-op.
        if inst.is_microop() && !inst.is_last_microop() {
            return;
        }

        if self.filter_kernel_inst && !thread.in_user_mode() {
            self.filtered_kernel_inst_count += 1;
            return;
        }

        let pc = thread.pc();
        if !self.filter.admits_block(pc) {
            self.filtered_user_inst_count += 1;
            return;
        }

        self.tracker.observe(pc);
        self.local_inst_counter += 1;

        if !inst.is_control() {
            return;
        }

        let closed = self.tracker.close();
        if closed.first_visit {
            self.manager
                .lock()
                .update_bb_inst(closed.start, closed.instruction_count);
        }

        if !self.filter.admits_marker(pc) {
            return;
        }

        let npc = thread.npc();
        if inst.is_direct_ctrl() && npc < pc {
            let tick = sim.cur_tick();
            let (count, stop) = {
                let mut manager = self.manager.lock();
                let count = manager.pc_count(npc).unwrap_or(1);
                (count, manager.count_pc(npc, self.local_inst_counter))
            };
            self.update_most_recent_pc_count(npc, count, tick);
            self.local_inst_counter = 0;
            // The manager is unlocked here, so the controller may reset it.
            if stop {
                sim.exit_sim_loop_now(REGION_BOUNDARY_REASON);
            }
        }
    }

    /// Move marker `npc` to the front of the MRU cache with its visit count
    /// before this visit.
    fn update_most_recent_pc_count(&mut self, npc: Addr, count: u64, tick: Tick) {
        self.most_recent.touch(PcCountPair::new(npc, count), tick);
    }

    pub fn change_bb_valid_addr_range(&mut self, start: Addr, end: Addr) {
        self.filter.bb_valid = AddrRange::new(start, end);
        debug!(range = %self.filter.bb_valid, "new bb valid address range");
    }

    pub fn change_marker_valid_addr_range(&mut self, start: Addr, end: Addr) {
        self.filter.marker_valid = AddrRange::new(start, end);
        debug!(range = %self.filter.marker_valid, "new marker valid address range");
    }

    pub fn add_exclude_addr_range(&mut self, start: Addr, end: Addr) {
        let range = AddrRange::new(start, end);
        self.filter.excluded.push(range);
        debug!(range = %range, "added excluded address range");
    }

    pub const fn start_filter_kernel_inst(&mut self) {
        self.filter_kernel_inst = true;
    }

    pub const fn stop_filter_kernel_inst(&mut self) {
        self.filter_kernel_inst = false;
    }

    #[must_use]
    pub const fn is_filtering_kernel_inst(&self) -> bool {
        self.filter_kernel_inst
    }

    #[must_use]
    pub const fn filter(&self) -> &AddrFilter {
        &self.filter
    }

    /// Execution count per basic block start.
    #[must_use]
    pub const fn bb_freq(&self) -> &FxHashMap<Addr, u64> {
        self.tracker.freq()
    }

    pub fn clear_bb_freq(&mut self) {
        self.tracker.clear_freq();
    }

    /// Up to five most recent markers with the tick they were seen at.
    #[must_use]
    pub fn most_recent_pc_count(&self) -> Vec<(PcCountPair, Tick)> {
        self.most_recent.to_vec()
    }

    /// Instructions counted since the last marker.
    #[must_use]
    pub const fn local_inst_counter(&self) -> u64 {
        self.local_inst_counter
    }

    #[must_use]
    pub const fn filtered_kernel_inst_count(&self) -> u64 {
        self.filtered_kernel_inst_count
    }

    #[must_use]
    pub const fn filtered_user_inst_count(&self) -> u64 {
        self.filtered_user_inst_count
    }

    pub const fn clear_filtered_kernel_inst_count(&mut self) {
        self.filtered_kernel_inst_count = 0;
    }

    pub const fn clear_filtered_user_inst_count(&mut self) {
        self.filtered_user_inst_count = 0;
    }

    #[must_use]
    pub const fn manager(&self) -> &SharedManager {
        &self.manager
    }
}
