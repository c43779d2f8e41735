use super::list::PoolList;
use crate::{ThreadId, error::Result};

/// FIFO queue of threads blocked on a mutex.
///
/// Nodes come from a bounded pool owned by the queue; enqueueing on a full
/// pool fails with `OutOfMemory` instead of allocating.
pub struct WaitQueue {
    waiters: PoolList<ThreadId>,
}

impl WaitQueue {
    pub fn new(capacity: usize) -> Result<Self> {
        Ok(Self {
            waiters: PoolList::new(capacity)?,
        })
    }

    /// Appends `thread` behind every thread already waiting.
    pub fn enqueue(&mut self, thread: ThreadId) -> Result<()> {
        self.waiters.push_back(thread)
    }

    /// Removes the longest-waiting thread.
    pub fn dequeue(&mut self) -> Option<ThreadId> {
        self.waiters.pop_front()
    }

    pub fn len(&self) -> usize {
        self.waiters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.waiters.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.waiters.capacity()
    }
}
