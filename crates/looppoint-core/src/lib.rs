//! Core types for LoopPoint analysis.
//!
//! This crate holds the pieces shared by the probe and its drivers:
//! - `AddrRange` and `AddrFilter` for address eligibility
//! - `PcCountPair` loop markers
//! - `ThreadContext`, `StaticInst` and `SimControl`, the host simulator seams

mod host;
mod marker;
mod range;

pub use host::{SimControl, StaticInst, ThreadContext};
pub use marker::PcCountPair;
pub use range::{AddrFilter, AddrRange, ParseRangeError};

/// Instruction address.
pub type Addr = u64;

/// Simulated time.
pub type Tick = u64;
