//! Basic-block reconstruction from a committed instruction stream.

use rustc_hash::{FxHashMap, FxHashSet};

use looppoint_core::Addr;

/// A basic block closed by a control instruction.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ClosedBlock {
    /// Starting PC.
    pub start: Addr,
    /// Number of instructions in this block, including the control instruction.
    pub instruction_count: u64,
    /// First time this tracker closed a block at `start`.
    pub first_visit: bool,
}

/// Tracks the open basic block and how often each block has executed.
#[derive(Clone, Debug, Default)]
pub struct BasicBlockTracker {
    start: Addr,
    instruction_count: u64,
    freq: FxHashMap<Addr, u64>,
    encountered: FxHashSet<Addr>,
}

impl BasicBlockTracker {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Account one instruction at `pc` to the open block, opening a new one
    /// if the previous block was closed.
    #[inline]
    pub fn observe(&mut self, pc: Addr) {
        if self.instruction_count == 0 {
            self.start = pc;
        }
        self.instruction_count += 1;
    }

    /// Close the open block on a control instruction.
    pub fn close(&mut self) -> ClosedBlock {
        *self.freq.entry(self.start).or_insert(0) += 1;
        let closed = ClosedBlock {
            start: self.start,
            instruction_count: self.instruction_count,
            first_visit: self.encountered.insert(self.start),
        };
        self.instruction_count = 0;
        closed
    }

    /// Start address of the open block, if any instruction is pending.
    #[must_use]
    pub const fn open_block(&self) -> Option<Addr> {
        if self.instruction_count == 0 {
            None
        } else {
            Some(self.start)
        }
    }

    /// Instructions accumulated in the open block.
    #[must_use]
    pub const fn open_len(&self) -> u64 {
        self.instruction_count
    }

    /// Execution count per block start address.
    #[must_use]
    pub const fn freq(&self) -> &FxHashMap<Addr, u64> {
        &self.freq
    }

    /// Clear execution counts. Blocks already reported stay reported.
    pub fn clear_freq(&mut self) {
        self.freq.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_block_start_is_first_pc_after_close() {
        let mut tracker = BasicBlockTracker::new();
        assert_eq!(tracker.open_block(), None);
        tracker.observe(0x100);
        tracker.observe(0x104);
        assert_eq!(tracker.open_block(), Some(0x100));
        assert_eq!(tracker.open_len(), 2);

        let closed = tracker.close();
        assert_eq!(
            closed,
            ClosedBlock {
                start: 0x100,
                instruction_count: 2,
                first_visit: true
            }
        );
        assert_eq!(tracker.open_block(), None);

        tracker.observe(0x200);
        assert_eq!(tracker.close().start, 0x200);
    }

    #[test]
    fn test_frequency_and_first_visit() {
        let mut tracker = BasicBlockTracker::new();
        for _ in 0..3 {
            tracker.observe(0x40);
            tracker.observe(0x44);
            tracker.close();
        }
        assert_eq!(tracker.freq().get(&0x40), Some(&3));
        assert_eq!(tracker.freq().len(), 1);

        tracker.observe(0x40);
        assert!(!tracker.close().first_visit);
    }

    #[test]
    fn test_clear_freq_keeps_reported_blocks() {
        let mut tracker = BasicBlockTracker::new();
        tracker.observe(0x80);
        assert!(tracker.close().first_visit);
        tracker.clear_freq();
        assert!(tracker.freq().is_empty());

        tracker.observe(0x80);
        let closed = tracker.close();
        assert!(!closed.first_visit);
        assert_eq!(tracker.freq().get(&0x80), Some(&1));
    }
}
