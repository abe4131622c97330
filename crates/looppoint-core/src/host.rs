//! Interfaces the analysis consumes from the host simulator.
//!
//! Handles are borrowed for the duration of a single commit notification;
//! the analysis never stores them.

use crate::{Addr, Tick};

/// Architectural state of the hardware thread that committed an instruction.
pub trait ThreadContext {
    /// PC of the committed instruction.
    fn pc(&self) -> Addr;

    /// Resolved next PC.
    fn npc(&self) -> Addr;

    /// Whether the thread is executing in user (unprivileged) mode.
    fn in_user_mode(&self) -> bool;
}

/// Classification bits of a decoded instruction.
pub trait StaticInst {
    fn is_microop(&self) -> bool;

    fn is_last_microop(&self) -> bool;

    /// Any instruction that may alter control flow (branch, jump, call, return).
    fn is_control(&self) -> bool;

    /// Control transfer whose target is statically known.
    fn is_direct_ctrl(&self) -> bool;
}

/// Simulation loop controls.
pub trait SimControl {
    /// Current simulated time.
    fn cur_tick(&self) -> Tick;

    /// Stop the simulation loop before any further instruction commits.
    fn exit_sim_loop_now(&mut self, reason: &str);
}

impl<T: ThreadContext + ?Sized> ThreadContext for &T {
    fn pc(&self) -> Addr {
        (**self).pc()
    }

    fn npc(&self) -> Addr {
        (**self).npc()
    }

    fn in_user_mode(&self) -> bool {
        (**self).in_user_mode()
    }
}

impl<I: StaticInst + ?Sized> StaticInst for &I {
    fn is_microop(&self) -> bool {
        (**self).is_microop()
    }

    fn is_last_microop(&self) -> bool {
        (**self).is_last_microop()
    }

    fn is_control(&self) -> bool {
        (**self).is_control()
    }

    fn is_direct_ctrl(&self) -> bool {
        (**self).is_direct_ctrl()
    }
}
