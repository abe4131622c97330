//! Most-recently-used loop markers of one thread.
//!
//! Entries live in a fixed array ordered most recent first, so promotion
//! and eviction are slice rotations and never allocate.

use looppoint_core::{Addr, PcCountPair, Tick};

/// Number of markers remembered per thread.
pub const MOST_RECENT_CAPACITY: usize = 5;

/// Fixed-capacity MRU list of (marker, tick) pairs keyed by marker pc.
#[derive(Clone, Debug, Default)]
pub struct MostRecentMarkers {
    entries: [(PcCountPair, Tick); MOST_RECENT_CAPACITY],
    len: usize,
}

impl MostRecentMarkers {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a visit to `marker` at `tick`.
    ///
    /// A known pc is moved to the front with its count and tick refreshed.
    /// An unknown pc is inserted at the front, dropping the least recently
    /// used entry when full.
    pub fn touch(&mut self, marker: PcCountPair, tick: Tick) {
        let end = match self.position(marker.pc) {
            Some(idx) => idx + 1,
            None if self.len < MOST_RECENT_CAPACITY => {
                self.len += 1;
                self.len
            }
            None => MOST_RECENT_CAPACITY,
        };
        self.entries[..end].rotate_right(1);
        self.entries[0] = (marker, tick);
    }

    /// Index of `pc`, 0 being the most recent.
    #[must_use]
    pub fn position(&self, pc: Addr) -> Option<usize> {
        self.entries[..self.len]
            .iter()
            .position(|(marker, _)| marker.pc == pc)
    }

    #[must_use]
    pub fn get(&self, pc: Addr) -> Option<(PcCountPair, Tick)> {
        self.position(pc).map(|idx| self.entries[idx])
    }

    #[must_use]
    pub const fn len(&self) -> usize {
        self.len
    }

    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Entries, most recent first.
    pub fn iter(&self) -> impl Iterator<Item = &(PcCountPair, Tick)> {
        self.entries[..self.len].iter()
    }

    #[must_use]
    pub fn to_vec(&self) -> Vec<(PcCountPair, Tick)> {
        self.entries[..self.len].to_vec()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pcs(recent: &MostRecentMarkers) -> Vec<Addr> {
        recent.iter().map(|(marker, _)| marker.pc).collect()
    }

    #[test]
    fn test_insert_at_front() {
        let mut recent = MostRecentMarkers::new();
        assert!(recent.is_empty());
        recent.touch(PcCountPair::new(0x10, 1), 5);
        recent.touch(PcCountPair::new(0x20, 1), 6);
        assert_eq!(pcs(&recent), vec![0x20, 0x10]);
        assert_eq!(recent.get(0x10), Some((PcCountPair::new(0x10, 1), 5)));
    }

    #[test]
    fn test_sixth_marker_evicts_least_recent() {
        let mut recent = MostRecentMarkers::new();
        for (tick, pc) in (1..=6).map(|i| (i, i * 0x10)) {
            recent.touch(PcCountPair::new(pc, 1), tick);
            assert!(recent.len() <= MOST_RECENT_CAPACITY);
        }
        assert_eq!(recent.len(), MOST_RECENT_CAPACITY);
        assert_eq!(pcs(&recent), vec![0x60, 0x50, 0x40, 0x30, 0x20]);
        assert_eq!(recent.get(0x10), None);
    }

    #[test]
    fn test_touch_promotes_without_growing() {
        let mut recent = MostRecentMarkers::new();
        for pc in [0x10, 0x20, 0x30, 0x40, 0x50] {
            recent.touch(PcCountPair::new(pc, 1), 0);
        }
        recent.touch(PcCountPair::new(0x20, 7), 99);
        assert_eq!(recent.len(), MOST_RECENT_CAPACITY);
        assert_eq!(pcs(&recent), vec![0x20, 0x50, 0x40, 0x30, 0x10]);
        assert_eq!(recent.get(0x20), Some((PcCountPair::new(0x20, 7), 99)));

        // the promoted entry is no longer the eviction candidate
        recent.touch(PcCountPair::new(0x60, 1), 100);
        assert_eq!(pcs(&recent), vec![0x60, 0x20, 0x50, 0x40, 0x30]);
    }

    #[test]
    fn test_refresh_front_entry() {
        let mut recent = MostRecentMarkers::new();
        recent.touch(PcCountPair::new(0x10, 1), 1);
        recent.touch(PcCountPair::new(0x10, 2), 2);
        assert_eq!(recent.len(), 1);
        assert_eq!(recent.to_vec(), vec![(PcCountPair::new(0x10, 2), 2)]);
    }
}
