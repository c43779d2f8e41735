use alloc::sync::Arc;
use core::time::Duration;

/// The kernel's discrete unit of time.
pub type Tick = u64;

/// Receives timer interrupts once registered with a [`TickTimer`].
pub trait TimerHandler: Send + Sync {
    /// Called in interrupt context on `cpu` when its programmed tick is
    /// reached.
    fn on_timer(&self, cpu: usize);
}

/// Per-core one-shot tick timer.
pub trait TickTimer: Send + Sync + 'static {
    /// Returns the number of ticks since boot.
    fn current_tick(&self) -> Tick;

    /// Arms `cpu`'s timer to interrupt at `tick`, replacing any previous
    /// target. A tick that has already elapsed fires promptly.
    fn set_next_tick(&self, cpu: usize, tick: Tick);

    /// Installs the process-wide interrupt handler.
    fn register_handler(&self, handler: Arc<dyn TimerHandler>);
}

/// Converts `duration` to a whole number of ticks, rounding down.
pub fn duration_to_ticks(duration: Duration, tick_interval: Duration) -> Tick {
    debug_assert!(!tick_interval.is_zero());

    let ticks = duration.as_nanos() / tick_interval.as_nanos();

    Tick::try_from(ticks).unwrap_or(Tick::MAX)
}

#[cfg(test)]
pub mod test {
    use super::*;

    #[test]
    fn test_whole_ticks() {
        let ms = Duration::from_millis(1);
        assert_eq!(duration_to_ticks(Duration::from_millis(5), ms), 5);
        assert_eq!(duration_to_ticks(Duration::ZERO, ms), 0);
    }

    #[test]
    fn test_sub_tick_remainder_truncated() {
        let interval = Duration::from_millis(10);
        assert_eq!(duration_to_ticks(Duration::from_millis(19), interval), 1);
        assert_eq!(duration_to_ticks(Duration::from_millis(9), interval), 0);
    }

    #[test]
    fn test_saturates_on_overflow() {
        let interval = Duration::from_nanos(1);
        assert_eq!(duration_to_ticks(Duration::MAX, interval), Tick::MAX);
    }
}
