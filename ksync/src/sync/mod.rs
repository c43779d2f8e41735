use crate::{CpuOps, Scheduler, TickTimer, TimerHandler, config::SyncConfig};
use alloc::sync::Arc;
use log::debug;

pub mod list;
pub mod mutex;
pub mod sleep;
pub mod spinlock;
pub mod wait_queue;

pub use mutex::{Mutex, MutexGuard, RawMutex};
pub use sleep::SleepQueues;
pub use spinlock::{SpinLock, SpinLockGuard, SpinLockIrq};

/// Boot-time setup of the sleep subsystem.
///
/// Creates a sleep timeline for every core and installs the timer interrupt
/// handler that drives them. The returned registry lives for the rest of the
/// kernel's lifetime.
///
/// # Panics
///
/// If the per-CPU pools can't be created. There is no degraded mode to fall
/// back to without sleep support.
pub fn init_sync<CPU, S, T>(timer: Arc<T>, config: &SyncConfig) -> Arc<SleepQueues<CPU, S, T>>
where
    CPU: CpuOps,
    S: Scheduler,
    T: TickTimer,
{
    let queues = match SleepQueues::new(timer.clone(), config) {
        Ok(queues) => Arc::new(queues),
        Err(e) => panic!("Failed to create per-CPU sleep pools: {e}"),
    };

    let handler: Arc<dyn TimerHandler> = queues.clone();
    timer.register_handler(handler);

    debug!("sleep queues ready on {} cpus", queues.cpus());

    queues
}
