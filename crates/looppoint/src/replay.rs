//! Trace replay driver.
//!
//! `Replay` plays the part of the simulator around the probes: it delivers
//! each committed instruction to the probe of its thread, keeps simulated
//! time, and acts on region-boundary stop requests the way an external
//! controller would: cut the region, collect its basic-block vector and
//! clear the manager's running counter before resuming.

use std::collections::BTreeMap;
use std::sync::Arc;

use tracing::{debug, info};

use looppoint_core::{Addr, PcCountPair, SimControl, Tick};
use looppoint_probe::{LoopPointManager, LoopPointProbe, ManagerConfig, ProbeConfig, SharedManager};

use crate::trace::{CommitRecord, TraceError};
use crate::{Error, Result};

/// Default limit on distinct hardware thread ids in a trace.
pub const DEFAULT_MAX_THREADS: usize = 256;

/// Basic-block execution counts of one region, summed over threads.
pub type BlockVector = BTreeMap<Addr, u64>;

/// A region cut on a stop request.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RegionBoundary {
    /// Region index, starting at 0.
    pub index: usize,
    /// Marker that completed the region, with its global count.
    pub marker: PcCountPair,
    /// Tick of the instruction that completed the region.
    pub tick: Tick,
    /// Instructions counted by the manager in this region.
    pub instructions: u64,
}

/// Per-thread counters at the end of a replay.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ThreadStats {
    pub thread: usize,
    pub filtered_kernel: u64,
    pub filtered_user: u64,
    /// Instructions after the thread's last marker.
    pub pending: u64,
    pub recent_markers: usize,
}

/// Result of a replay.
#[derive(Clone, Debug, Default)]
pub struct ReplayReport {
    pub boundaries: Vec<RegionBoundary>,
    /// One vector per boundary, plus the trailing partial region if any
    /// block executed after the last boundary.
    pub regions: Vec<BlockVector>,
    pub bb_inst: BTreeMap<Addr, u64>,
    pub marker_counts: BTreeMap<Addr, u64>,
    pub threads: Vec<ThreadStats>,
    /// Committed instructions delivered to probes.
    pub instructions: u64,
    /// Instructions counted by the manager after the last boundary.
    pub trailing_instructions: u64,
    /// Stop requests raised, including repeats collapsed into one boundary.
    pub stop_requests: u64,
}

/// Simulation controls seen by the probes.
#[derive(Debug, Default)]
struct Control {
    tick: Tick,
    stop: Option<String>,
    requests: u64,
}

impl SimControl for Control {
    fn cur_tick(&self) -> Tick {
        self.tick
    }

    fn exit_sim_loop_now(&mut self, reason: &str) {
        self.requests += 1;
        self.stop = Some(reason.to_string());
    }
}

/// Replays committed instructions through one probe per thread.
pub struct Replay {
    config: ProbeConfig,
    manager: SharedManager,
    probes: BTreeMap<usize, LoopPointProbe>,
    max_threads: usize,
    control: Control,
    boundaries: Vec<RegionBoundary>,
    regions: Vec<BlockVector>,
    instructions: u64,
}

impl Replay {
    #[must_use]
    pub fn new(probe_config: ProbeConfig, manager_config: &ManagerConfig) -> Self {
        Self {
            config: probe_config,
            manager: LoopPointManager::new(manager_config).into_shared(),
            probes: BTreeMap::new(),
            max_threads: DEFAULT_MAX_THREADS,
            control: Control::default(),
            boundaries: Vec::new(),
            regions: Vec::new(),
            instructions: 0,
        }
    }

    #[must_use]
    pub fn with_max_threads(mut self, max_threads: usize) -> Self {
        self.max_threads = max_threads;
        self
    }

    #[must_use]
    pub const fn manager(&self) -> &SharedManager {
        &self.manager
    }

    /// Probes of the threads seen so far, by thread id.
    pub fn probes(&self) -> impl Iterator<Item = (usize, &LoopPointProbe)> {
        self.probes.iter().map(|(&thread, probe)| (thread, probe))
    }

    #[must_use]
    pub fn probe(&self, thread: usize) -> Option<&LoopPointProbe> {
        self.probes.get(&thread)
    }

    pub fn probe_mut(&mut self, thread: usize) -> Option<&mut LoopPointProbe> {
        self.probes.get_mut(&thread)
    }

    #[must_use]
    pub fn boundaries(&self) -> &[RegionBoundary] {
        &self.boundaries
    }

    #[must_use]
    pub const fn tick(&self) -> Tick {
        self.control.tick
    }

    const fn check_thread(&self, thread: usize) -> Result<()> {
        if thread >= self.max_threads {
            return Err(Error::ThreadLimit {
                thread,
                max: self.max_threads,
            });
        }
        Ok(())
    }

    /// Commit one instruction. Returns the boundary if it completed a region.
    ///
    /// # Errors
    ///
    /// Returns an error if the thread id exceeds the thread limit.
    pub fn step(&mut self, record: &CommitRecord) -> Result<Option<RegionBoundary>> {
        self.check_thread(record.thread)?;
        self.control.tick += 1;
        self.instructions += 1;

        let probe = self.probes.entry(record.thread).or_insert_with(|| {
            let mut probe = LoopPointProbe::new(&self.config, Arc::clone(&self.manager));
            probe.reg_probe_listeners();
            debug!(thread = record.thread, "attached probe");
            probe
        });
        probe.commit(record, record, &mut self.control);

        if let Some(reason) = self.control.stop.take() {
            debug!(reason = %reason, tick = self.control.tick, "simulation stopped");
            return Ok(Some(self.cut_region()));
        }
        Ok(None)
    }

    /// Replay every record of a trace.
    ///
    /// # Errors
    ///
    /// Stops at the first unreadable record or thread limit violation.
    pub fn run<I>(&mut self, records: I) -> Result<()>
    where
        I: IntoIterator<Item = std::result::Result<CommitRecord, TraceError>>,
    {
        for record in records {
            self.step(&record?)?;
        }
        Ok(())
    }

    fn cut_region(&mut self) -> RegionBoundary {
        let (marker, instructions) = {
            let mut manager = self.manager.lock();
            let pc = manager.most_recent_pc();
            let marker = PcCountPair::new(pc, manager.pc_count(pc).unwrap_or(0));
            let instructions = manager.global_inst_counter();
            manager.clear_global_inst_counter();
            (marker, instructions)
        };
        let boundary = RegionBoundary {
            index: self.boundaries.len(),
            marker,
            tick: self.control.tick,
            instructions,
        };
        let vector = self.take_block_vector();
        self.regions.push(vector);
        self.boundaries.push(boundary);
        info!(
            region = boundary.index,
            marker = %boundary.marker,
            tick = boundary.tick,
            instructions,
            "region cut"
        );
        boundary
    }

    fn take_block_vector(&mut self) -> BlockVector {
        let mut vector = BlockVector::new();
        for probe in self.probes.values_mut() {
            for (&start, &count) in probe.bb_freq() {
                *vector.entry(start).or_insert(0) += count;
            }
            probe.clear_bb_freq();
        }
        vector
    }

    /// Finish the replay and collect the report.
    #[must_use]
    pub fn finish(mut self) -> ReplayReport {
        let trailing = self.take_block_vector();
        if !trailing.is_empty() {
            self.regions.push(trailing);
        }

        let manager = self.manager.lock();
        let threads = self
            .probes
            .iter()
            .map(|(&thread, probe)| ThreadStats {
                thread,
                filtered_kernel: probe.filtered_kernel_inst_count(),
                filtered_user: probe.filtered_user_inst_count(),
                pending: probe.local_inst_counter(),
                recent_markers: probe.most_recent_pc_count().len(),
            })
            .collect();

        ReplayReport {
            boundaries: self.boundaries,
            regions: self.regions,
            bb_inst: manager.bb_inst().iter().map(|(&k, &v)| (k, v)).collect(),
            marker_counts: manager.counter().iter().map(|(&k, &v)| (k, v)).collect(),
            threads,
            instructions: self.instructions,
            trailing_instructions: manager.global_inst_counter(),
            stop_requests: self.control.requests,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn loop_records(thread: usize, start: Addr, body: u64, iterations: usize) -> Vec<CommitRecord> {
        let mut records = Vec::new();
        for _ in 0..iterations {
            for i in 0..body {
                let pc = start + i * 4;
                records.push(CommitRecord::new(thread, pc, pc + 4));
            }
            records.push(CommitRecord::branch(thread, start + body * 4, start));
        }
        records
    }

    #[test]
    fn test_step_cuts_region_at_threshold() {
        let mut replay = Replay::new(
            ProbeConfig::default(),
            &ManagerConfig::default().with_region_length(20),
        );
        let mut cut = Vec::new();
        for record in loop_records(0, 0x100, 4, 5) {
            if let Some(boundary) = replay.step(&record).unwrap() {
                cut.push(boundary);
            }
        }

        assert_eq!(cut.len(), 1);
        assert_eq!(
            cut[0],
            RegionBoundary {
                index: 0,
                marker: PcCountPair::new(0x100, 4),
                tick: 20,
                instructions: 20,
            }
        );
        assert_eq!(replay.manager().lock().global_inst_counter(), 5);
    }

    #[test]
    fn test_block_vectors_are_per_region() {
        let mut replay = Replay::new(
            ProbeConfig::default(),
            &ManagerConfig::default().with_region_length(10),
        );
        let records = loop_records(0, 0x100, 1, 5)
            .into_iter()
            .chain(loop_records(1, 0x800, 1, 2));
        replay.run(records.map(Ok)).unwrap();
        let report = replay.finish();

        assert_eq!(report.boundaries.len(), 1);
        assert_eq!(report.boundaries[0].tick, 10);
        assert_eq!(report.regions.len(), 2);
        assert_eq!(report.regions[0], BlockVector::from([(0x100, 5)]));
        assert_eq!(report.regions[1], BlockVector::from([(0x800, 2)]));
        assert_eq!(report.bb_inst, BTreeMap::from([(0x100, 2), (0x800, 2)]));
        assert_eq!(report.marker_counts, BTreeMap::from([(0x100, 5), (0x800, 2)]));
        assert_eq!(report.instructions, 14);
        assert_eq!(report.trailing_instructions, 4);
        assert_eq!(report.threads.len(), 2);
    }

    #[test]
    fn test_thread_limit() {
        let mut replay = Replay::new(ProbeConfig::default(), &ManagerConfig::default()).with_max_threads(2);
        assert!(replay.step(&CommitRecord::new(1, 0x10, 0x14)).is_ok());
        assert!(matches!(
            replay.step(&CommitRecord::new(2, 0x10, 0x14)),
            Err(Error::ThreadLimit { thread: 2, max: 2 })
        ));
    }

    #[test]
    fn test_only_seen_threads_get_probes() {
        let mut replay = Replay::new(
            ProbeConfig::default(),
            &ManagerConfig::default().with_exit_event(false),
        );
        replay.run(loop_records(200, 0x100, 1, 2).into_iter().map(Ok)).unwrap();
        assert_eq!(replay.probes().map(|(thread, _)| thread).collect::<Vec<_>>(), vec![200]);
        assert!(replay.probe(0).is_none());

        let report = replay.finish();
        assert_eq!(report.threads.len(), 1);
        assert_eq!(report.threads[0].thread, 200);
        assert_eq!(report.marker_counts.get(&0x100), Some(&2));
    }

    #[test]
    fn test_probes_start_idle_when_configured() {
        let mut replay = Replay::new(
            ProbeConfig::default().with_listening_at_start(false),
            &ManagerConfig::default().with_region_length(1),
        );
        for record in loop_records(0, 0x100, 2, 3) {
            assert_eq!(replay.step(&record).unwrap(), None);
        }
        assert!(!replay.probe(0).is_some_and(LoopPointProbe::is_listening));

        replay.probe_mut(0).unwrap().start_listening();
        let boundary = loop_records(0, 0x100, 2, 1)
            .iter()
            .find_map(|record| replay.step(record).unwrap());
        assert_eq!(boundary.map(|b| b.instructions), Some(3));
    }
}
