//! Blocking mutex with FIFO wakeup and handoff release.
//!
//! Two locks make up the mutex:
//!
//! - `owner`, a bare spinlock that is held for as long as somebody owns the
//!   mutex. It is only ever *tried*, never spun on, and always with
//!   interrupts masked so a transfer can't be interleaved with an interrupt
//!   handler on the same core.
//! - `queue`, a plain spinlock over the [`WaitQueue`]. Both `acquire` and
//!   `release` hold it while they look at `owner`, which is what closes the
//!   lost-wakeup window: a releaser either finds a fully linked waiter or
//!   unlocks `owner` before the waiter's try, never in between.
//!
//! On release with waiters present, `owner` is left locked and ownership is
//! passed straight to the longest-waiting thread that can still be resumed.
//! The mutex is never observably free while anyone is queued.

use super::{
    spinlock::{IrqSafe, LockKind, RawSpinLock, SpinLock},
    wait_queue::WaitQueue,
};
use crate::{CpuOps, Scheduler, error::Result};
use core::{
    cell::UnsafeCell,
    marker::PhantomData,
    ops::{Deref, DerefMut},
    sync::atomic::{Ordering, fence},
};
use log::{trace, warn};

pub struct RawMutex<CPU, S> {
    owner: RawSpinLock,
    queue: SpinLock<WaitQueue>,
    _phantom: PhantomData<fn() -> (CPU, S)>,
}

impl<CPU: CpuOps, S: Scheduler> RawMutex<CPU, S> {
    /// Creates an unlocked mutex whose wait queue holds at most `pool_blocks`
    /// blocked threads.
    pub fn new(pool_blocks: usize) -> Result<Self> {
        Ok(Self {
            owner: RawSpinLock::new(),
            queue: SpinLock::new(WaitQueue::new(pool_blocks)?),
            _phantom: PhantomData,
        })
    }

    fn try_take_ownership(&self) -> bool {
        IrqSafe::<CPU>::critical(|| self.owner.try_lock())
    }

    /// Acquires the mutex, blocking the current thread until it is handed
    /// ownership.
    ///
    /// Fails with `OutOfMemory` if the mutex is contended and its wait queue
    /// is full. Nothing is queued in that case and the caller does not own
    /// the mutex.
    pub fn acquire(&self) -> Result<()> {
        let mut queue = self.queue.lock();

        if self.try_take_ownership() {
            return Ok(());
        }

        let thread = S::current_thread();

        queue.enqueue(thread)?;

        trace!("thread {thread} blocking on contended mutex");

        // Drops the queue lock as part of suspending.
        S::pause_current(queue);

        // We were resumed by `release`, which handed `owner` over to us
        // without unlocking it.
        fence(Ordering::Acquire);

        Ok(())
    }

    /// Acquires the mutex only if nobody owns it right now. Never blocks and
    /// never queues.
    pub fn try_acquire(&self) -> bool {
        let _queue = self.queue.lock();

        self.try_take_ownership()
    }

    /// Releases the mutex, handing it to the longest-waiting thread if there
    /// is one.
    ///
    /// Waiters that can no longer be resumed are dropped from the queue and
    /// the next one is tried. Only once the queue is empty does the mutex
    /// become free.
    ///
    /// # Safety
    ///
    /// The caller must own the mutex.
    pub unsafe fn release(&self) {
        fence(Ordering::Release);

        let mut queue = self.queue.lock();

        while let Some(thread) = queue.dequeue() {
            match S::resume_thread(thread) {
                // `owner` stays locked; it now belongs to `thread`.
                Ok(()) => return,
                Err(e) => warn!("Mutex handoff skipping waiter {thread}: {e}"),
            }
        }

        // SAFETY: The caller owns the mutex, so `owner` is held.
        IrqSafe::<CPU>::critical(|| unsafe { self.owner.unlock() });
    }

    /// Returns `true` while the mutex is owned or a handoff is in flight.
    pub fn is_locked(&self) -> bool {
        self.owner.is_locked()
    }

    /// Number of threads currently queued.
    pub fn waiters(&self) -> usize {
        self.queue.lock().len()
    }

    /// Tears the mutex down, releasing its pool.
    ///
    /// Nobody may own or be waiting on the mutex.
    pub fn destroy(self) {
        debug_assert!(!self.is_locked(), "Destroying a held mutex");

        let queue = self.queue.into_inner();

        debug_assert!(queue.is_empty(), "Destroying a mutex with waiters");

        trace!("destroying mutex with {} queue blocks", queue.capacity());
    }
}

/// A mutual exclusion primitive protecting a `T`, built on [`RawMutex`].
pub struct Mutex<T: ?Sized, CPU, S> {
    raw: RawMutex<CPU, S>,
    data: UnsafeCell<T>,
}

unsafe impl<T: ?Sized + Send, CPU, S> Send for Mutex<T, CPU, S> {}
unsafe impl<T: ?Sized + Send, CPU, S> Sync for Mutex<T, CPU, S> {}

impl<T, CPU: CpuOps, S: Scheduler> Mutex<T, CPU, S> {
    pub fn new(value: T, pool_blocks: usize) -> Result<Self> {
        Ok(Self {
            raw: RawMutex::new(pool_blocks)?,
            data: UnsafeCell::new(value),
        })
    }

    pub fn into_inner(self) -> T {
        self.raw.destroy();
        self.data.into_inner()
    }
}

impl<T: ?Sized, CPU: CpuOps, S: Scheduler> Mutex<T, CPU, S> {
    /// Acquires the mutex, blocking the current thread until it is able to do
    /// so. See [`RawMutex::acquire`].
    pub fn lock(&self) -> Result<MutexGuard<'_, T, CPU, S>> {
        self.raw.acquire()?;

        Ok(MutexGuard::new(self))
    }

    pub fn try_lock(&self) -> Option<MutexGuard<'_, T, CPU, S>> {
        self.raw.try_acquire().then(|| MutexGuard::new(self))
    }

    pub fn get_mut(&mut self) -> &mut T {
        self.data.get_mut()
    }

    pub fn raw(&self) -> &RawMutex<CPU, S> {
        &self.raw
    }
}

#[must_use = "if unused the Mutex will immediately unlock"]
pub struct MutexGuard<'a, T: ?Sized, CPU: CpuOps, S: Scheduler> {
    mutex: &'a Mutex<T, CPU, S>,
    // Ownership belongs to the thread that acquired the mutex.
    _not_send: PhantomData<*const ()>,
}

// A shared guard only hands out `&T`.
unsafe impl<T: ?Sized + Sync, CPU: CpuOps, S: Scheduler> Sync for MutexGuard<'_, T, CPU, S> {}

impl<'a, T: ?Sized, CPU: CpuOps, S: Scheduler> MutexGuard<'a, T, CPU, S> {
    fn new(mutex: &'a Mutex<T, CPU, S>) -> Self {
        Self {
            mutex,
            _not_send: PhantomData,
        }
    }
}

impl<T: ?Sized, CPU: CpuOps, S: Scheduler> Deref for MutexGuard<'_, T, CPU, S> {
    type Target = T;

    fn deref(&self) -> &T {
        // SAFETY: The guard owns the mutex.
        unsafe { &*self.mutex.data.get() }
    }
}

impl<T: ?Sized, CPU: CpuOps, S: Scheduler> DerefMut for MutexGuard<'_, T, CPU, S> {
    fn deref_mut(&mut self) -> &mut T {
        // SAFETY: The guard owns the mutex.
        unsafe { &mut *self.mutex.data.get() }
    }
}

impl<T: ?Sized, CPU: CpuOps, S: Scheduler> Drop for MutexGuard<'_, T, CPU, S> {
    fn drop(&mut self) {
        // SAFETY: The guard owns the mutex and releases it exactly once.
        unsafe { self.mutex.raw.release() };
    }
}
