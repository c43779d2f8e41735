use crate::CpuOps;
use core::{
    cell::UnsafeCell,
    hint::spin_loop,
    marker::PhantomData,
    ops::{Deref, DerefMut},
    sync::atomic::{AtomicBool, Ordering},
};

/// A bare test-and-set lock with no data and no interrupt handling.
pub struct RawSpinLock {
    locked: AtomicBool,
}

impl RawSpinLock {
    pub const fn new() -> Self {
        Self {
            locked: AtomicBool::new(false),
        }
    }

    pub fn lock(&self) {
        while self
            .locked
            .compare_exchange_weak(false, true, Ordering::Acquire, Ordering::Relaxed)
            .is_err()
        {
            // Spin on a plain load so contended waiters don't bounce the
            // cache line between cores.
            while self.locked.load(Ordering::Relaxed) {
                spin_loop();
            }
        }
    }

    /// Takes the lock only if it is free right now.
    pub fn try_lock(&self) -> bool {
        self.locked
            .compare_exchange(false, true, Ordering::Acquire, Ordering::Relaxed)
            .is_ok()
    }

    /// # Safety
    ///
    /// The lock must be held, either by the caller or by an owner on whose
    /// behalf the caller is releasing it.
    pub unsafe fn unlock(&self) {
        self.locked.store(false, Ordering::Release);
    }

    pub fn is_locked(&self) -> bool {
        self.locked.load(Ordering::Relaxed)
    }
}

impl Default for RawSpinLock {
    fn default() -> Self {
        Self::new()
    }
}

/// Selects what a lock does to the current core's interrupt state while it is
/// held.
pub trait LockKind {
    type State: Copy;

    fn enter() -> Self::State;
    fn exit(state: Self::State);

    /// Runs `f` inside an `enter`/`exit` pair.
    fn critical<R>(f: impl FnOnce() -> R) -> R {
        let state = Self::enter();
        let ret = f();
        Self::exit(state);
        ret
    }
}

/// For locks that are never taken from an interrupt handler. Leaves the
/// interrupt state alone.
pub struct Plain;

impl LockKind for Plain {
    type State = ();

    fn enter() {}
    fn exit(_: ()) {}
}

/// For locks that an interrupt handler on the same core may also take.
/// Interrupts are masked for as long as the lock is held.
pub struct IrqSafe<CPU>(PhantomData<CPU>);

impl<CPU: CpuOps> LockKind for IrqSafe<CPU> {
    type State = usize;

    fn enter() -> usize {
        CPU::disable_interrupts()
    }

    fn exit(flags: usize) {
        CPU::restore_interrupt_state(flags);
    }
}

/// A spinlock protecting a `T`.
pub struct SpinLock<T: ?Sized, K = Plain> {
    raw: RawSpinLock,
    kind: PhantomData<K>,
    data: UnsafeCell<T>,
}

pub type SpinLockIrq<T, CPU> = SpinLock<T, IrqSafe<CPU>>;

unsafe impl<T: ?Sized + Send, K: LockKind> Send for SpinLock<T, K> {}
unsafe impl<T: ?Sized + Send, K: LockKind> Sync for SpinLock<T, K> {}

impl<T, K: LockKind> SpinLock<T, K> {
    pub const fn new(data: T) -> Self {
        Self {
            raw: RawSpinLock::new(),
            kind: PhantomData,
            data: UnsafeCell::new(data),
        }
    }

    pub fn into_inner(self) -> T {
        self.data.into_inner()
    }
}

impl<T: ?Sized, K: LockKind> SpinLock<T, K> {
    pub fn lock(&self) -> SpinLockGuard<'_, T, K> {
        let state = K::enter();

        self.raw.lock();

        SpinLockGuard {
            lock: self,
            state,
            _not_send: PhantomData,
        }
    }

    pub fn try_lock(&self) -> Option<SpinLockGuard<'_, T, K>> {
        let state = K::enter();

        if self.raw.try_lock() {
            Some(SpinLockGuard {
                lock: self,
                state,
                _not_send: PhantomData,
            })
        } else {
            K::exit(state);
            None
        }
    }

    pub fn get_mut(&mut self) -> &mut T {
        self.data.get_mut()
    }
}

#[must_use = "if unused the SpinLock will immediately unlock"]
pub struct SpinLockGuard<'a, T: ?Sized, K: LockKind> {
    lock: &'a SpinLock<T, K>,
    state: K::State,
    // The saved interrupt state belongs to the core that took the lock.
    _not_send: PhantomData<*const ()>,
}

impl<T: ?Sized, K: LockKind> Deref for SpinLockGuard<'_, T, K> {
    type Target = T;

    fn deref(&self) -> &T {
        // SAFETY: The guard holds the lock, so nobody else can access the data.
        unsafe { &*self.lock.data.get() }
    }
}

impl<T: ?Sized, K: LockKind> DerefMut for SpinLockGuard<'_, T, K> {
    fn deref_mut(&mut self) -> &mut T {
        // SAFETY: The guard holds the lock, so nobody else can access the data.
        unsafe { &mut *self.lock.data.get() }
    }
}

impl<T: ?Sized, K: LockKind> Drop for SpinLockGuard<'_, T, K> {
    fn drop(&mut self) {
        // SAFETY: The guard's existence means we took the lock.
        unsafe { self.lock.raw.unlock() };
        K::exit(self.state);
    }
}
