use crate::error::{KernelError, Result};
use alloc::vec::Vec;
use core::mem;

/// Handle to a block allocated from a [`BlockPool`].
///
/// Only valid for the pool that returned it, until it is freed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockId(usize);

enum Slot<T> {
    Free { next_free: Option<usize> },
    Used(T),
}

/// A fixed-capacity block allocator.
///
/// All storage is reserved when the pool is created; `alloc` and `free` are
/// O(1) pops/pushes on an index free-list threaded through the unused slots,
/// and never allocate, block or grow. Used to keep heap allocation off the
/// lock fast paths.
pub struct BlockPool<T> {
    slots: Vec<Slot<T>>,
    next_free: Option<usize>,
    in_use: usize,
}

impl<T> BlockPool<T> {
    /// Creates a pool holding at most `capacity` blocks.
    pub fn new(capacity: usize) -> Result<Self> {
        if capacity == 0 {
            return Err(KernelError::InvalidValue);
        }

        let mut slots = Vec::new();
        slots
            .try_reserve_exact(capacity)
            .map_err(|_| KernelError::OutOfMemory)?;

        for i in 0..capacity {
            let next_free = (i + 1 < capacity).then_some(i + 1);
            slots.push(Slot::Free { next_free });
        }

        Ok(Self {
            slots,
            next_free: Some(0),
            in_use: 0,
        })
    }

    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    /// Number of blocks currently handed out.
    pub fn in_use(&self) -> usize {
        self.in_use
    }

    pub fn is_full(&self) -> bool {
        self.next_free.is_none()
    }

    /// Moves `value` into a free block.
    ///
    /// # Returns
    /// - `None` if every block is in use; `value` is dropped.
    /// - `Some(id)` of the block now holding `value`.
    pub fn alloc(&mut self, value: T) -> Option<BlockId> {
        let idx = self.next_free?;

        let old = mem::replace(&mut self.slots[idx], Slot::Used(value));
        let Slot::Free { next_free } = old else {
            panic!("Block pool free-list points at block {idx}, which is in use");
        };

        self.next_free = next_free;
        self.in_use += 1;

        Some(BlockId(idx))
    }

    /// Returns the block to the pool, handing back its contents.
    pub fn free(&mut self, id: BlockId) -> T {
        let freed = Slot::Free {
            next_free: self.next_free,
        };

        let Slot::Used(value) = mem::replace(&mut self.slots[id.0], freed) else {
            panic!("Double free of pool block {}", id.0);
        };

        self.next_free = Some(id.0);
        self.in_use -= 1;

        value
    }

    pub fn get(&self, id: BlockId) -> &T {
        match &self.slots[id.0] {
            Slot::Used(value) => value,
            Slot::Free { .. } => panic!("Access to free pool block {}", id.0),
        }
    }

    pub fn get_mut(&mut self, id: BlockId) -> &mut T {
        match &mut self.slots[id.0] {
            Slot::Used(value) => value,
            Slot::Free { .. } => panic!("Access to free pool block {}", id.0),
        }
    }
}
