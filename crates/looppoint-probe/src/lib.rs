//! LoopPoint region analysis.
//!
//! A `LoopPointProbe` per hardware thread reconstructs basic blocks from
//! committed instructions and reports loop back-edge targets ("markers") to
//! a `LoopPointManager` shared by all probes. The manager accumulates
//! instructions between markers and asks the simulator to stop once a region
//! of the configured length is complete.
//!
//! ```ignore
//! use looppoint_probe::{LoopPointManager, LoopPointProbe, ManagerConfig, ProbeConfig};
//!
//! let manager = LoopPointManager::new(&ManagerConfig::default()).into_shared();
//! let mut probe = LoopPointProbe::new(&ProbeConfig::default(), manager.clone());
//! probe.reg_probe_listeners();
//!
//! // for every committed instruction
//! probe.commit(&thread, &inst, &mut sim);
//! ```

mod block;
mod config;
mod manager;
mod probe;
mod recent;

pub use block::{BasicBlockTracker, ClosedBlock};
pub use config::{DEFAULT_REGION_LENGTH, ManagerConfig, ProbeConfig};
pub use manager::{LoopPointManager, REGION_BOUNDARY_REASON, SharedManager};
pub use probe::{COMMIT_PROBE_POINT, LoopPointProbe, ProbeListener};
pub use recent::{MOST_RECENT_CAPACITY, MostRecentMarkers};
