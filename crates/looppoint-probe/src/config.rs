//! Probe and manager configuration.

use looppoint_core::AddrRange;

/// Default instruction budget of a region.
pub const DEFAULT_REGION_LENGTH: u64 = 100_000_000;

/// Per-thread probe configuration.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ProbeConfig {
    /// Valid instruction address range for basic blocks.
    pub bb_valid_addr_range: AddrRange,
    /// Valid instruction address range for markers.
    pub marker_valid_addr_range: AddrRange,
    /// Instruction address ranges ignored by the analysis.
    pub exclude_addr_ranges: Vec<AddrRange>,
    /// Register the commit listener when probes are registered.
    pub start_listening_at_start: bool,
    /// Filter kernel-mode instructions from the start.
    pub start_kernel_filter_at_start: bool,
}

impl Default for ProbeConfig {
    fn default() -> Self {
        Self {
            bb_valid_addr_range: AddrRange::disabled(),
            marker_valid_addr_range: AddrRange::disabled(),
            exclude_addr_ranges: Vec::new(),
            start_listening_at_start: true,
            start_kernel_filter_at_start: true,
        }
    }
}

impl ProbeConfig {
    #[must_use]
    pub fn with_bb_valid_range(mut self, range: AddrRange) -> Self {
        self.bb_valid_addr_range = range;
        self
    }

    #[must_use]
    pub fn with_marker_valid_range(mut self, range: AddrRange) -> Self {
        self.marker_valid_addr_range = range;
        self
    }

    #[must_use]
    pub fn with_excluded_range(mut self, range: AddrRange) -> Self {
        self.exclude_addr_ranges.push(range);
        self
    }

    #[must_use]
    pub fn with_listening_at_start(mut self, enabled: bool) -> Self {
        self.start_listening_at_start = enabled;
        self
    }

    #[must_use]
    pub fn with_kernel_filter_at_start(mut self, enabled: bool) -> Self {
        self.start_kernel_filter_at_start = enabled;
        self
    }
}

/// Shared manager configuration.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ManagerConfig {
    /// Instructions per region before an exit is requested.
    pub region_length: u64,
    /// Request a simulation exit when a region is complete.
    pub raise_exit_event: bool,
}

impl Default for ManagerConfig {
    fn default() -> Self {
        Self {
            region_length: DEFAULT_REGION_LENGTH,
            raise_exit_event: true,
        }
    }
}

impl ManagerConfig {
    #[must_use]
    pub fn with_region_length(mut self, region_length: u64) -> Self {
        self.region_length = region_length;
        self
    }

    #[must_use]
    pub fn with_exit_event(mut self, enabled: bool) -> Self {
        self.raise_exit_event = enabled;
        self
    }
}
