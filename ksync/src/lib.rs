//! Synchronisation core for the kernel: blocking FIFO mutexes with handoff
//! release, and per-CPU timed sleep driven by the tick timer.
//!
//! Everything here is generic over the hardware and scheduler collaborators
//! ([`CpuOps`], [`Scheduler`] and [`TickTimer`]), so the kernel binds the
//! primitives to its own arch implementation and the host test-suite binds
//! them to mocks.
#![cfg_attr(not(test), no_std)]

extern crate alloc;

pub mod config;
pub mod error;
pub mod memory;
pub mod sched;
pub mod sync;
pub mod time;

#[cfg(test)]
pub mod test;

pub use sched::{Scheduler, ThreadId};
pub use time::{Tick, TickTimer, TimerHandler};

/// CPU topology and interrupt control for the current core.
pub trait CpuOps: 'static {
    /// Returns the ID of the currently executing core.
    fn id() -> usize;

    /// Returns the number of cores brought up at boot.
    fn count() -> usize;

    /// Masks interrupts on the current core, returning the previous state.
    fn disable_interrupts() -> usize;

    /// Restores an interrupt state previously returned by
    /// [`CpuOps::disable_interrupts`].
    fn restore_interrupt_state(flags: usize);
}
