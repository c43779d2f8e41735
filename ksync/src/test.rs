//! Host implementations of the hardware and scheduler collaborators.
//!
//! Each std thread plays a kernel thread. Its "core" and interrupt mask live
//! in thread-locals, and pausing parks the std thread until a resume permit
//! is posted.

use crate::{
    CpuOps, Scheduler, ThreadId,
    error::{KernelError, Result},
    time::{Tick, TickTimer, TimerHandler},
};
use std::{
    cell::Cell,
    collections::HashMap,
    sync::{
        Arc, Mutex, OnceLock,
        atomic::{AtomicBool, AtomicU64, Ordering},
    },
    thread::{self, Thread},
    time::{Duration, Instant},
};

pub const MOCK_CPUS: usize = 4;

thread_local! {
    static CPU_ID: Cell<usize> = const { Cell::new(0) };
    static IRQ_DEPTH: Cell<usize> = const { Cell::new(0) };
    static CURRENT: Registration = Registration::new();
}

pub struct MockCpu;

impl MockCpu {
    /// Pins the calling thread to `cpu`.
    pub fn set_id(cpu: usize) {
        CPU_ID.with(|id| id.set(cpu));
    }

    pub fn irqs_masked() -> bool {
        IRQ_DEPTH.with(Cell::get) > 0
    }
}

impl CpuOps for MockCpu {
    fn id() -> usize {
        CPU_ID.with(Cell::get)
    }

    fn count() -> usize {
        MOCK_CPUS
    }

    fn disable_interrupts() -> usize {
        IRQ_DEPTH.with(|depth| {
            let prev = depth.get();
            depth.set(prev + 1);
            prev
        })
    }

    fn restore_interrupt_state(flags: usize) {
        IRQ_DEPTH.with(|depth| depth.set(flags));
    }
}

struct ThreadRecord {
    thread: Thread,
    resume_permit: AtomicBool,
}

fn threads() -> &'static Mutex<HashMap<ThreadId, Arc<ThreadRecord>>> {
    static THREADS: OnceLock<Mutex<HashMap<ThreadId, Arc<ThreadRecord>>>> = OnceLock::new();

    THREADS.get_or_init(Default::default)
}

/// Registers the owning std thread with the mock scheduler for as long as it
/// lives.
struct Registration {
    id: ThreadId,
    record: Arc<ThreadRecord>,
}

impl Registration {
    fn new() -> Self {
        static NEXT_ID: AtomicU64 = AtomicU64::new(1);

        let id = ThreadId::from_value(NEXT_ID.fetch_add(1, Ordering::Relaxed));
        let record = Arc::new(ThreadRecord {
            thread: thread::current(),
            resume_permit: AtomicBool::new(false),
        });

        threads().lock().unwrap().insert(id, record.clone());

        Self { id, record }
    }
}

impl Drop for Registration {
    fn drop(&mut self) {
        if let Ok(mut threads) = threads().lock() {
            threads.remove(&self.id);
        }
    }
}

pub struct MockSched;

impl Scheduler for MockSched {
    fn current_thread() -> ThreadId {
        CURRENT.with(|reg| reg.id)
    }

    fn pause_current<G>(guard: G) {
        let record = CURRENT.with(|reg| reg.record.clone());

        drop(guard);

        // A resume that lands between the drop and the park leaves the permit
        // set, so the loop exits without parking.
        while !record.resume_permit.swap(false, Ordering::Acquire) {
            thread::park();
        }
    }

    fn resume_thread(thread: ThreadId) -> Result<()> {
        let record = threads()
            .lock()
            .unwrap()
            .get(&thread)
            .cloned()
            .ok_or(KernelError::NoSuchThread)?;

        record.resume_permit.store(true, Ordering::Release);
        record.thread.unpark();

        Ok(())
    }
}

/// A tick timer whose clock only moves when told to and whose interrupts are
/// raised by calling [`MockTimer::fire`].
#[derive(Default)]
pub struct MockTimer {
    now: AtomicU64,
    programmed: Mutex<Vec<(usize, Tick)>>,
    handler: Mutex<Option<Arc<dyn TimerHandler>>>,
}

impl MockTimer {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn set_now(&self, tick: Tick) {
        self.now.store(tick, Ordering::SeqCst);
    }

    /// Every `(cpu, tick)` the timer has been armed with, oldest first.
    pub fn programmed(&self) -> Vec<(usize, Tick)> {
        self.programmed.lock().unwrap().clone()
    }

    /// The tick `cpu`'s timer is currently armed for.
    pub fn target(&self, cpu: usize) -> Option<Tick> {
        self.programmed
            .lock()
            .unwrap()
            .iter()
            .rev()
            .find(|(c, _)| *c == cpu)
            .map(|(_, tick)| *tick)
    }

    pub fn has_handler(&self) -> bool {
        self.handler.lock().unwrap().is_some()
    }

    /// Raises `cpu`'s timer interrupt on the calling thread.
    pub fn fire(&self, cpu: usize) {
        let handler = self.handler.lock().unwrap().clone();

        if let Some(handler) = handler {
            handler.on_timer(cpu);
        }
    }
}

impl TickTimer for MockTimer {
    fn current_tick(&self) -> Tick {
        self.now.load(Ordering::SeqCst)
    }

    fn set_next_tick(&self, cpu: usize, tick: Tick) {
        self.programmed.lock().unwrap().push((cpu, tick));
    }

    fn register_handler(&self, handler: Arc<dyn TimerHandler>) {
        *self.handler.lock().unwrap() = Some(handler);
    }
}

/// Spins until `cond` holds, failing the test if that takes unreasonably long.
pub fn wait_until(mut cond: impl FnMut() -> bool) {
    let start = Instant::now();

    while !cond() {
        assert!(
            start.elapsed() < Duration::from_secs(10),
            "timed out waiting for condition"
        );
        thread::yield_now();
    }
}
