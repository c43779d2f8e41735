//! Per-CPU timed sleep.
//!
//! Each core owns a [`SleepTimeline`]: the threads sleeping on that core,
//! ordered by wake tick. `sleep` links the caller into its core's timeline,
//! re-arms the core's timer if it became the earliest sleeper and suspends.
//! The timer interrupt pops the earliest sleeper, re-arms the timer for the
//! next one and resumes it.
//!
//! The timeline lock is interrupt-masking: the only contenders for a core's
//! timeline are threads on that core and that core's timer interrupt.

use super::{list::PoolList, spinlock::SpinLockIrq};
use crate::{
    CpuOps, Scheduler, ThreadId,
    config::{SyncConfig, WakePolicy},
    error::{KernelError, Result},
    time::{Tick, TickTimer, TimerHandler, duration_to_ticks},
};
use alloc::{boxed::Box, sync::Arc, vec::Vec};
use core::{marker::PhantomData, time::Duration};
use log::{trace, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Sleeper {
    pub thread: ThreadId,
    pub wake_tick: Tick,
}

/// Sleepers on a single core, earliest deadline first.
pub struct SleepTimeline {
    sleepers: PoolList<Sleeper>,
}

impl SleepTimeline {
    pub fn new(capacity: usize) -> Result<Self> {
        Ok(Self {
            sleepers: PoolList::new(capacity)?,
        })
    }

    /// Links `sleeper` in deadline order, behind any sleepers with the same
    /// wake tick.
    ///
    /// Returns `true` if it is now the earliest sleeper, in which case the
    /// core's timer needs re-arming.
    pub fn insert(&mut self, sleeper: Sleeper) -> Result<bool> {
        self.sleepers.insert_ordered_by_key(sleeper, |s| s.wake_tick)
    }

    pub fn earliest(&self) -> Option<&Sleeper> {
        self.sleepers.front()
    }

    pub fn pop_earliest(&mut self) -> Option<Sleeper> {
        self.sleepers.pop_front()
    }

    pub fn len(&self) -> usize {
        self.sleepers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sleepers.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Sleeper> {
        self.sleepers.iter()
    }
}

/// The registry of per-CPU sleep timelines.
pub struct SleepQueues<CPU, S, T> {
    timelines: Box<[SpinLockIrq<SleepTimeline, CPU>]>,
    timer: Arc<T>,
    tick_interval: Duration,
    wake_policy: WakePolicy,
    _sched: PhantomData<fn() -> S>,
}

impl<CPU: CpuOps, S: Scheduler, T: TickTimer> SleepQueues<CPU, S, T> {
    /// Creates one timeline per detected core, up to `config.max_cpus`.
    pub fn new(timer: Arc<T>, config: &SyncConfig) -> Result<Self> {
        config.validate()?;

        let cpus = CPU::count().clamp(1, config.max_cpus);

        let mut timelines = Vec::new();
        timelines
            .try_reserve_exact(cpus)
            .map_err(|_| KernelError::OutOfMemory)?;

        for _ in 0..cpus {
            timelines.push(SpinLockIrq::new(SleepTimeline::new(
                config.sleep_pool_blocks,
            )?));
        }

        Ok(Self {
            timelines: timelines.into_boxed_slice(),
            timer,
            tick_interval: config.tick_interval,
            wake_policy: config.wake_policy,
            _sched: PhantomData,
        })
    }

    /// Number of cores with a timeline.
    pub fn cpus(&self) -> usize {
        self.timelines.len()
    }

    /// Number of threads sleeping on `cpu`.
    pub fn sleepers(&self, cpu: usize) -> usize {
        self.timelines.get(cpu).map_or(0, |t| t.lock().len())
    }

    /// Suspends the current thread for at least `duration`, rounded down to
    /// whole ticks.
    ///
    /// Fails with `OutOfMemory`, without sleeping, if this core's sleep pool
    /// is exhausted.
    pub fn sleep(&self, duration: Duration) -> Result<()> {
        let cpu = CPU::id();
        let mut timeline = self
            .timelines
            .get(cpu)
            .ok_or(KernelError::InvalidValue)?
            .lock();

        let thread = S::current_thread();
        let wake_tick = self
            .timer
            .current_tick()
            .saturating_add(duration_to_ticks(duration, self.tick_interval));

        if timeline.insert(Sleeper { thread, wake_tick })? {
            self.timer.set_next_tick(cpu, wake_tick);
        }

        trace!("thread {thread} sleeping on cpu {cpu} until tick {wake_tick}");

        // Drops the timeline lock (and unmasks interrupts) as part of
        // suspending.
        S::pause_current(timeline);

        Ok(())
    }

    /// Timer interrupt handler for `cpu`.
    pub fn handle_timer(&self, cpu: usize) {
        let Some(timeline) = self.timelines.get(cpu) else {
            warn!("Timer interrupt for unmanaged cpu {cpu}");
            return;
        };

        let mut timeline = timeline.lock();

        match self.wake_policy {
            WakePolicy::One => {
                if let Some(sleeper) = timeline.pop_earliest() {
                    Self::wake(sleeper);
                }
            }
            WakePolicy::AllDue => {
                let now = self.timer.current_tick();

                while timeline.earliest().is_some_and(|s| s.wake_tick <= now) {
                    if let Some(sleeper) = timeline.pop_earliest() {
                        Self::wake(sleeper);
                    }
                }
            }
        }

        if let Some(next) = timeline.earliest() {
            self.timer.set_next_tick(cpu, next.wake_tick);
        }
    }

    fn wake(sleeper: Sleeper) {
        if let Err(e) = S::resume_thread(sleeper.thread) {
            warn!("Could not wake sleeping thread {}: {e}", sleeper.thread);
        }
    }
}

impl<CPU: CpuOps, S: Scheduler, T: TickTimer> TimerHandler for SleepQueues<CPU, S, T> {
    fn on_timer(&self, cpu: usize) {
        self.handle_timer(cpu);
    }
}
