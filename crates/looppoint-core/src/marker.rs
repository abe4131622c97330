//! Loop markers.

use std::fmt;

use crate::Addr;

/// A dynamic visit to a pc: the address and how many times it had been
/// seen globally when the visit was recognized.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct PcCountPair {
    pub pc: Addr,
    pub count: u64,
}

impl PcCountPair {
    #[must_use]
    pub const fn new(pc: Addr, count: u64) -> Self {
        Self { pc, count }
    }
}

impl fmt::Display for PcCountPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({:#x}, {})", self.pc, self.count)
    }
}
