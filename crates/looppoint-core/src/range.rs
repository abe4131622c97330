//! Instruction address ranges and the filter built from them.
//!
//! Ranges are inclusive on both ends. A range whose `end` is zero is the
//! "disabled" sentinel: as a valid range it admits every pc, and as an
//! excluded range it excludes nothing.

use std::fmt;
use std::str::FromStr;

use thiserror::Error;

use crate::Addr;

/// Inclusive instruction address range `[start, end]`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct AddrRange {
    pub start: Addr,
    pub end: Addr,
}

impl AddrRange {
    #[must_use]
    pub const fn new(start: Addr, end: Addr) -> Self {
        Self { start, end }
    }

    /// The `0..=0` range, used as "no restriction".
    #[must_use]
    pub const fn disabled() -> Self {
        Self { start: 0, end: 0 }
    }

    #[must_use]
    pub const fn is_disabled(&self) -> bool {
        self.end == 0
    }

    /// Inclusive bounds check, ignoring the disabled sentinel.
    #[must_use]
    pub const fn contains(&self, pc: Addr) -> bool {
        self.start <= pc && pc <= self.end
    }

    /// Valid-range test: a disabled range admits everything.
    #[must_use]
    pub const fn admits(&self, pc: Addr) -> bool {
        self.is_disabled() || self.contains(pc)
    }

    /// Excluded-range test: a disabled range excludes nothing.
    #[must_use]
    pub const fn excludes(&self, pc: Addr) -> bool {
        !self.is_disabled() && self.contains(pc)
    }
}

impl fmt::Display for AddrRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#x}:{:#x}", self.start, self.end)
    }
}

/// Error parsing an address range from `START:END`.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ParseRangeError {
    #[error("expected START:END, got '{0}'")]
    MissingSeparator(String),
    #[error("invalid address '{0}'")]
    InvalidAddress(String),
    #[error("range start {start:#x} is above end {end:#x}")]
    Inverted { start: Addr, end: Addr },
}

fn parse_addr(s: &str) -> Result<Addr, ParseRangeError> {
    let s = s.trim();
    let parsed = s
        .strip_prefix("0x")
        .or_else(|| s.strip_prefix("0X"))
        .map_or_else(|| s.parse::<Addr>(), |hex| Addr::from_str_radix(hex, 16));
    parsed.map_err(|_| ParseRangeError::InvalidAddress(s.to_string()))
}

impl FromStr for AddrRange {
    type Err = ParseRangeError;

    /// Parse `START:END` where each side is decimal or `0x`-prefixed hex.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (start, end) = s
            .split_once(':')
            .ok_or_else(|| ParseRangeError::MissingSeparator(s.to_string()))?;
        let range = Self::new(parse_addr(start)?, parse_addr(end)?);
        if !range.is_disabled() && range.start > range.end {
            return Err(ParseRangeError::Inverted {
                start: range.start,
                end: range.end,
            });
        }
        Ok(range)
    }
}

/// Address eligibility rules for basic blocks and markers.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct AddrFilter {
    /// Instructions outside this range are not part of any basic block.
    pub bb_valid: AddrRange,
    /// Control instructions outside this range never produce markers.
    pub marker_valid: AddrRange,
    /// Instructions inside any of these ranges are ignored.
    pub excluded: Vec<AddrRange>,
}

impl AddrFilter {
    #[must_use]
    pub const fn new(bb_valid: AddrRange, marker_valid: AddrRange, excluded: Vec<AddrRange>) -> Self {
        Self {
            bb_valid,
            marker_valid,
            excluded,
        }
    }

    #[must_use]
    pub fn is_excluded(&self, pc: Addr) -> bool {
        self.excluded.iter().any(|range| range.excludes(pc))
    }

    /// Whether `pc` takes part in basic-block analysis.
    #[must_use]
    pub fn admits_block(&self, pc: Addr) -> bool {
        self.bb_valid.admits(pc) && !self.is_excluded(pc)
    }

    /// Whether a control instruction at `pc` may produce a marker.
    #[must_use]
    pub const fn admits_marker(&self, pc: Addr) -> bool {
        self.marker_valid.admits(pc)
    }
}
