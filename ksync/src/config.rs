use core::time::Duration;

use crate::error::{KernelError, Result};

/// The largest number of cores the sleep registry will manage.
#[cfg(feature = "smp")]
pub const MAX_CPUS: usize = 8;
#[cfg(not(feature = "smp"))]
pub const MAX_CPUS: usize = 1;

/// Scheduler tick granularity. Sleep durations are truncated to a whole
/// number of these.
pub const DEFAULT_TICK_INTERVAL: Duration = Duration::from_millis(1);

/// Default number of nodes in each bounded wait/sleep pool.
pub const DEFAULT_POOL_BLOCKS: usize = 64;

/// How many sleepers a single timer interrupt wakes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum WakePolicy {
    /// Wake only the earliest sleeper. Further sleepers sharing the same
    /// deadline are woken by subsequent firings, since the timer is re-armed
    /// for their (already elapsed) tick.
    #[default]
    One,
    /// Wake every sleeper whose deadline is at or before the current tick.
    AllDue,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncConfig {
    pub tick_interval: Duration,
    /// Upper bound on the number of per-CPU sleep timelines. The detected core
    /// count is clamped to this.
    pub max_cpus: usize,
    /// Capacity of each per-CPU sleep pool.
    pub sleep_pool_blocks: usize,
    pub wake_policy: WakePolicy,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            tick_interval: DEFAULT_TICK_INTERVAL,
            max_cpus: MAX_CPUS,
            sleep_pool_blocks: DEFAULT_POOL_BLOCKS,
            wake_policy: WakePolicy::default(),
        }
    }
}

impl SyncConfig {
    pub fn validate(&self) -> Result<()> {
        if self.tick_interval.is_zero()
            || self.sleep_pool_blocks == 0
            || self.max_cpus == 0
            || self.max_cpus > MAX_CPUS
        {
            return Err(KernelError::InvalidValue);
        }

        Ok(())
    }
}
