use core::fmt::Display;

use crate::error::Result;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ThreadId(u64);

impl ThreadId {
    pub const fn from_value(value: u64) -> Self {
        Self(value)
    }

    pub const fn value(self) -> u64 {
        self.0
    }
}

impl Display for ThreadId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// The scheduler services the blocking primitives are built on.
pub trait Scheduler: 'static {
    /// Returns the ID of the thread running on the current core.
    fn current_thread() -> ThreadId;

    /// Suspends the current thread, releasing `guard` as part of the same
    /// step.
    ///
    /// The thread must be marked as suspending before `guard` is dropped. A
    /// [`Scheduler::resume_thread`] issued for this thread at any point after
    /// that drop must not be lost: either the thread has not parked yet and
    /// returns straight away, or it is parked and gets woken. Returns once the
    /// thread has been resumed.
    fn pause_current<G>(guard: G);

    /// Makes a paused thread runnable again.
    ///
    /// Fails with [`KernelError::NoSuchThread`] if the thread is gone.
    ///
    /// [`KernelError::NoSuchThread`]: crate::error::KernelError::NoSuchThread
    fn resume_thread(thread: ThreadId) -> Result<()>;
}
