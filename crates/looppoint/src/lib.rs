//! LoopPoint region analysis over committed-instruction traces.
//!
//! Re-exports the probe and manager, and adds a trace-driven replay that
//! stands in for the simulator: it feeds each committed instruction to the
//! probe of its hardware thread and cuts a region whenever the manager asks
//! for the simulation to stop.
//!
//! # Example
//!
//! ```ignore
//! use looppoint::{ManagerConfig, ProbeConfig, Replay, open_trace};
//!
//! let mut replay = Replay::new(ProbeConfig::default(), &ManagerConfig::default());
//! replay.run(open_trace(path)?)?;
//! let report = replay.finish();
//! ```

pub use looppoint_core::{
    Addr, AddrFilter, AddrRange, ParseRangeError, PcCountPair, SimControl, StaticInst,
    ThreadContext, Tick,
};
pub use looppoint_probe::{
    BasicBlockTracker, COMMIT_PROBE_POINT, DEFAULT_REGION_LENGTH, LoopPointManager, LoopPointProbe,
    MOST_RECENT_CAPACITY, ManagerConfig, MostRecentMarkers, ProbeConfig, REGION_BOUNDARY_REASON,
    SharedManager,
};

pub mod bbv;
pub mod metrics;
pub mod replay;
pub mod trace;

pub use replay::{BlockVector, RegionBoundary, Replay, ReplayReport, ThreadStats};
pub use trace::{CommitRecord, TraceError, TraceReader, open_trace};

use thiserror::Error;

/// Replay errors.
#[derive(Error, Debug)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("trace error: {0}")]
    Trace(#[from] TraceError),
    #[error("thread {thread} exceeds the limit of {max} threads")]
    ThreadLimit { thread: usize, max: usize },
}

pub type Result<T> = std::result::Result<T, Error>;
