//! A singly linked list whose nodes live in a [`BlockPool`].
//!
//! Linking never touches the heap, and a full pool is reported before
//! anything is linked, so a failed insert leaves the list exactly as it was.

use crate::{
    error::{KernelError, Result},
    memory::pool::{BlockId, BlockPool},
};

struct Node<T> {
    next: Option<BlockId>,
    value: T,
}

pub struct PoolList<T> {
    pool: BlockPool<Node<T>>,
    /// Next element to be popped.
    front: Option<BlockId>,
    /// Most recently appended element.
    back: Option<BlockId>,
}

impl<T> PoolList<T> {
    /// Creates an empty list that can hold at most `capacity` elements.
    pub fn new(capacity: usize) -> Result<Self> {
        Ok(Self {
            pool: BlockPool::new(capacity)?,
            front: None,
            back: None,
        })
    }

    pub fn len(&self) -> usize {
        self.pool.in_use()
    }

    pub fn is_empty(&self) -> bool {
        self.front.is_none()
    }

    pub fn capacity(&self) -> usize {
        self.pool.capacity()
    }

    pub fn front(&self) -> Option<&T> {
        self.front.map(|id| &self.pool.get(id).value)
    }

    fn alloc(&mut self, value: T) -> Result<BlockId> {
        self.pool
            .alloc(Node { next: None, value })
            .ok_or(KernelError::OutOfMemory)
    }

    pub fn push_back(&mut self, value: T) -> Result<()> {
        let id = self.alloc(value)?;

        match self.back {
            Some(back) => self.pool.get_mut(back).next = Some(id),
            None => self.front = Some(id),
        }

        self.back = Some(id);

        Ok(())
    }

    pub fn pop_front(&mut self) -> Option<T> {
        let id = self.front?;
        let node = self.pool.free(id);

        self.front = node.next;

        if self.front.is_none() {
            self.back = None;
        }

        Some(node.value)
    }

    /// Inserts `value` after the last element whose key is `<=` its own, so
    /// the list stays sorted by `key` and equal keys keep insertion order.
    ///
    /// Returns `true` if `value` became the new front.
    pub fn insert_ordered_by_key<K, F>(&mut self, value: T, key: F) -> Result<bool>
    where
        K: Ord,
        F: Fn(&T) -> K,
    {
        let new_key = key(&value);
        let id = self.alloc(value)?;

        let Some(front) = self.front else {
            self.front = Some(id);
            self.back = Some(id);
            return Ok(true);
        };

        if new_key < key(&self.pool.get(front).value) {
            self.pool.get_mut(id).next = Some(front);
            self.front = Some(id);
            return Ok(true);
        }

        let mut prev = front;

        while let Some(next) = self.pool.get(prev).next
            && key(&self.pool.get(next).value) <= new_key
        {
            prev = next;
        }

        let after = self.pool.get(prev).next;

        self.pool.get_mut(id).next = after;
        self.pool.get_mut(prev).next = Some(id);

        if after.is_none() {
            self.back = Some(id);
        }

        Ok(false)
    }

    pub fn iter(&self) -> Iter<'_, T> {
        Iter {
            list: self,
            cur: self.front,
        }
    }
}

pub struct Iter<'a, T> {
    list: &'a PoolList<T>,
    cur: Option<BlockId>,
}

impl<'a, T> Iterator for Iter<'a, T> {
    type Item = &'a T;

    fn next(&mut self) -> Option<Self::Item> {
        let node = self.list.pool.get(self.cur?);
        self.cur = node.next;
        Some(&node.value)
    }
}

#[cfg(test)]
pub mod test {
    use super::*;

    fn contents<T: Copy>(list: &PoolList<T>) -> Vec<T> {
        list.iter().copied().collect()
    }

    #[test]
    fn test_fifo() {
        let mut list = PoolList::new(4).unwrap();

        for i in 1..=3 {
            list.push_back(i).unwrap();
        }

        assert_eq!(list.front(), Some(&1));
        assert_eq!(list.pop_front(), Some(1));

        list.push_back(4).unwrap();

        assert_eq!(contents(&list), [2, 3, 4]);
        assert_eq!(list.pop_front(), Some(2));
        assert_eq!(list.pop_front(), Some(3));
        assert_eq!(list.pop_front(), Some(4));
        assert_eq!(list.pop_front(), None);
        assert!(list.is_empty());
    }

    #[test]
    fn test_push_after_drain() {
        let mut list = PoolList::new(1).unwrap();

        list.push_back('a').unwrap();
        assert_eq!(list.pop_front(), Some('a'));

        list.push_back('b').unwrap();
        assert_eq!(contents(&list), ['b']);
    }

    #[test]
    fn test_full_pool_links_nothing() {
        let mut list = PoolList::new(2).unwrap();

        list.push_back(1).unwrap();
        list.push_back(2).unwrap();

        assert_eq!(list.push_back(3), Err(KernelError::OutOfMemory));
        assert_eq!(
            list.insert_ordered_by_key(0, |v| *v),
            Err(KernelError::OutOfMemory)
        );
        assert_eq!(contents(&list), [1, 2]);
        assert_eq!(list.len(), 2);
    }

    #[test]
    fn test_ordered_insert_ties_keep_arrival_order() {
        let mut list = PoolList::new(8).unwrap();

        // (key, arrival)
        assert!(list.insert_ordered_by_key((5, 1), |v| v.0).unwrap());
        assert!(list.insert_ordered_by_key((2, 2), |v| v.0).unwrap());
        assert!(!list.insert_ordered_by_key((8, 3), |v| v.0).unwrap());
        assert!(!list.insert_ordered_by_key((2, 4), |v| v.0).unwrap());
        assert!(!list.insert_ordered_by_key((5, 5), |v| v.0).unwrap());

        assert_eq!(contents(&list), [(2, 2), (2, 4), (5, 1), (5, 5), (8, 3)]);
    }

    #[test]
    fn test_ordered_insert_at_back_updates_tail() {
        let mut list = PoolList::new(4).unwrap();

        list.insert_ordered_by_key(1, |v| *v).unwrap();
        list.insert_ordered_by_key(9, |v| *v).unwrap();
        list.push_back(10).unwrap();

        assert_eq!(contents(&list), [1, 9, 10]);
    }
}
