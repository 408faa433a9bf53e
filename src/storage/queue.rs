//! Arrival queue: a doubly linked FIFO with a key index.
//!
//! ## Design
//!
//! Nodes are stored in a [`Slab`]; `prev`/`next` are slab indices. A hash
//! index maps each key to its slot, so removal by key never walks the list.
//!
//! ```text
//! head (oldest) <-> node <-> node <-> tail (newest)
//! ```
//!
//! - New entries are appended at the tail
//! - Consumers read from the head
//! - Any entry can be unlinked in O(1) by key or by [`QueueRef`]
//!
//! [`remove`](ArrivalQueue::remove) drops the entry;
//! [`detach`](ArrivalQueue::detach) hands it back to the caller.

use std::collections::HashMap;
use std::fmt;
use std::hash::Hash;

use slab::Slab;

use crate::error::{Error, Result};

const UNLINKED: &str = "queue node is not linked";

#[derive(Debug)]
struct QueueNode<K, V> {
    key: K,
    data: V,
    prev: Option<usize>,
    next: Option<usize>,
    stamp: u64,
}

/// Handle to a linked queue node.
///
/// Stays valid until that node is removed or detached.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct QueueRef {
    slot: usize,
    stamp: u64,
}

/// Doubly linked FIFO queue with O(1) keyed removal.
///
/// ## Example
///
/// ```
/// use lob_core::storage::ArrivalQueue;
///
/// let mut queue = ArrivalQueue::new();
/// queue.add(1, "first").unwrap();
/// queue.add(2, "second").unwrap();
///
/// queue.remove(&1).unwrap();
/// assert_eq!(queue.head(), Some((&2, &"second")));
/// ```
pub struct ArrivalQueue<K, V> {
    nodes: Slab<QueueNode<K, V>>,
    index: HashMap<K, usize>,
    head: Option<usize>,
    tail: Option<usize>,
    next_stamp: u64,
}

impl<K, V> Default for ArrivalQueue<K, V> {
    fn default() -> Self {
        Self {
            nodes: Slab::new(),
            index: HashMap::new(),
            head: None,
            tail: None,
            next_stamp: 0,
        }
    }
}

impl<K: fmt::Debug, V: fmt::Debug> fmt::Debug for ArrivalQueue<K, V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.iter()).finish()
    }
}

impl<K, V> ArrivalQueue<K, V> {
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.head.is_none()
    }

    /// Oldest entry
    pub fn head(&self) -> Option<(&K, &V)> {
        self.head.map(|slot| self.entry(slot))
    }

    /// Newest entry
    pub fn tail(&self) -> Option<(&K, &V)> {
        self.tail.map(|slot| self.entry(slot))
    }

    pub fn head_ref(&self) -> Option<QueueRef> {
        self.head.map(|slot| self.handle(slot))
    }

    pub fn tail_ref(&self) -> Option<QueueRef> {
        self.tail.map(|slot| self.handle(slot))
    }

    /// Entry behind a handle, if the node is still linked
    pub fn get_node(&self, node: QueueRef) -> Option<(&K, &V)> {
        self.resolve(node).ok().map(|slot| self.entry(slot))
    }

    /// Mutable data behind a handle
    ///
    /// # Errors
    ///
    /// [`Error::InvalidState`] if the node was removed or detached.
    pub fn node_mut(&mut self, node: QueueRef) -> Result<&mut V> {
        let slot = self.resolve(node)?;
        Ok(&mut self.nodes[slot].data)
    }

    /// The node after `node`, toward the tail
    pub fn next_ref(&self, node: QueueRef) -> Result<Option<QueueRef>> {
        let slot = self.resolve(node)?;
        Ok(self.nodes[slot].next.map(|s| self.handle(s)))
    }

    /// The node before `node`, toward the head
    pub fn prev_ref(&self, node: QueueRef) -> Result<Option<QueueRef>> {
        let slot = self.resolve(node)?;
        Ok(self.nodes[slot].prev.map(|s| self.handle(s)))
    }

    /// Head to tail
    pub fn iter(&self) -> Iter<'_, K, V> {
        Iter {
            queue: self,
            cursor: self.head,
        }
    }

    #[inline]
    fn entry(&self, slot: usize) -> (&K, &V) {
        let node = &self.nodes[slot];
        (&node.key, &node.data)
    }

    #[inline]
    fn handle(&self, slot: usize) -> QueueRef {
        QueueRef {
            slot,
            stamp: self.nodes[slot].stamp,
        }
    }

    #[inline]
    fn resolve(&self, node: QueueRef) -> Result<usize> {
        match self.nodes.get(node.slot) {
            Some(n) if n.stamp == node.stamp => Ok(node.slot),
            _ => Err(Error::InvalidState(UNLINKED)),
        }
    }

    /// Link `slot` between `prev` and `next`, fixing head/tail at the ends
    fn link(&mut self, slot: usize, prev: Option<usize>, next: Option<usize>) {
        self.nodes[slot].prev = prev;
        self.nodes[slot].next = next;

        match prev {
            Some(p) => self.nodes[p].next = Some(slot),
            None => self.head = Some(slot),
        }
        match next {
            Some(n) => self.nodes[n].prev = Some(slot),
            None => self.tail = Some(slot),
        }
    }

    /// Close the gap around `slot`. The node itself stays allocated.
    fn unlink(&mut self, slot: usize) {
        let prev = self.nodes[slot].prev;
        let next = self.nodes[slot].next;

        match prev {
            Some(p) => self.nodes[p].next = next,
            None => self.head = next,
        }
        match next {
            Some(n) => self.nodes[n].prev = prev,
            None => self.tail = prev,
        }
    }
}

impl<K: Eq + Hash + Clone, V> ArrivalQueue<K, V> {
    /// Queue with room for `capacity` entries
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            nodes: Slab::with_capacity(capacity),
            index: HashMap::with_capacity(capacity),
            head: None,
            tail: None,
            next_stamp: 0,
        }
    }

    #[inline]
    pub fn contains_key(&self, key: &K) -> bool {
        self.index.contains_key(key)
    }

    pub fn get(&self, key: &K) -> Option<&V> {
        self.index.get(key).map(|&slot| &self.nodes[slot].data)
    }

    pub fn get_mut(&mut self, key: &K) -> Option<&mut V> {
        let slot = *self.index.get(key)?;
        Some(&mut self.nodes[slot].data)
    }

    /// Handle of the node holding `key`
    pub fn node_ref(&self, key: &K) -> Option<QueueRef> {
        self.index.get(key).map(|&slot| self.handle(slot))
    }

    /// Append after the current tail.
    ///
    /// # Errors
    ///
    /// [`Error::DuplicateKey`] if `key` is already queued.
    pub fn add(&mut self, key: K, data: V) -> Result<QueueRef> {
        let tail = self.tail;
        self.insert_between(key, data, tail, None)
    }

    /// Insert directly after `at`
    ///
    /// # Errors
    ///
    /// [`Error::InvalidState`] if `at` is no longer linked,
    /// [`Error::DuplicateKey`] if `key` is already queued.
    pub fn insert_after(&mut self, at: QueueRef, key: K, data: V) -> Result<QueueRef> {
        let slot = self.resolve(at)?;
        let next = self.nodes[slot].next;
        self.insert_between(key, data, Some(slot), next)
    }

    /// Insert directly before `at`
    pub fn insert_before(&mut self, at: QueueRef, key: K, data: V) -> Result<QueueRef> {
        let slot = self.resolve(at)?;
        let prev = self.nodes[slot].prev;
        self.insert_between(key, data, prev, Some(slot))
    }

    /// Unlink and drop the entry for `key`.
    ///
    /// # Errors
    ///
    /// [`Error::NotFound`] if `key` is not queued.
    pub fn remove(&mut self, key: &K) -> Result<()> {
        self.detach(key).map(drop)
    }

    /// Unlink the entry for `key` and return it to the caller.
    pub fn detach(&mut self, key: &K) -> Result<(K, V)> {
        let slot = *self.index.get(key).ok_or(Error::NotFound)?;
        Ok(self.take(slot))
    }

    /// Unlink and drop the node behind a handle
    ///
    /// # Errors
    ///
    /// [`Error::InvalidState`] if the node was already removed or detached.
    pub fn remove_node(&mut self, node: QueueRef) -> Result<()> {
        self.detach_node(node).map(drop)
    }

    /// Unlink the node behind a handle and return its entry
    pub fn detach_node(&mut self, node: QueueRef) -> Result<(K, V)> {
        let slot = self.resolve(node)?;
        Ok(self.take(slot))
    }

    /// Detach the oldest entry
    pub fn pop_head(&mut self) -> Option<(K, V)> {
        let slot = self.head?;
        Some(self.take(slot))
    }

    /// Drop every entry. Outstanding handles become stale.
    pub fn clear(&mut self) {
        self.nodes.clear();
        self.index.clear();
        self.head = None;
        self.tail = None;
    }

    fn insert_between(
        &mut self,
        key: K,
        data: V,
        prev: Option<usize>,
        next: Option<usize>,
    ) -> Result<QueueRef> {
        if self.index.contains_key(&key) {
            return Err(Error::DuplicateKey);
        }

        let stamp = self.next_stamp;
        self.next_stamp += 1;

        let slot = self.nodes.insert(QueueNode {
            key: key.clone(),
            data,
            prev: None,
            next: None,
            stamp,
        });
        self.index.insert(key, slot);
        self.link(slot, prev, next);

        Ok(QueueRef { slot, stamp })
    }

    fn take(&mut self, slot: usize) -> (K, V) {
        self.unlink(slot);
        let node = self.nodes.remove(slot);
        self.index.remove(&node.key);
        (node.key, node.data)
    }
}

impl<K: Eq + Hash + Clone, V: PartialEq> ArrivalQueue<K, V> {
    /// Check the queue holds exactly `expected`, head to tail.
    ///
    /// Also checks backward links, the tail pointer and the key index.
    /// Verification only.
    pub fn validate(&self, expected: &[(K, V)]) -> bool {
        let mut cursor = self.head;
        let mut prev = None;

        for (key, data) in expected {
            let Some(slot) = cursor else { return false };
            let node = &self.nodes[slot];
            if node.key != *key || node.data != *data || node.prev != prev {
                return false;
            }
            if self.index.get(key) != Some(&slot) {
                return false;
            }
            prev = cursor;
            cursor = node.next;
        }

        cursor.is_none()
            && self.tail == prev
            && self.index.len() == expected.len()
            && self.nodes.len() == expected.len()
    }
}

/// Head-to-tail iterator over an [`ArrivalQueue`]
pub struct Iter<'a, K, V> {
    queue: &'a ArrivalQueue<K, V>,
    cursor: Option<usize>,
}

impl<'a, K, V> Iterator for Iter<'a, K, V> {
    type Item = (&'a K, &'a V);

    fn next(&mut self) -> Option<Self::Item> {
        let slot = self.cursor?;
        let node = &self.queue.nodes[slot];
        self.cursor = node.next;
        Some((&node.key, &node.data))
    }
}

impl<'a, K, V> IntoIterator for &'a ArrivalQueue<K, V> {
    type Item = (&'a K, &'a V);
    type IntoIter = Iter<'a, K, V>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

// ============================================================================
// Unit Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn queue_of(entries: &[(i32, i32)]) -> ArrivalQueue<i32, i32> {
        let mut queue = ArrivalQueue::new();
        for &(k, v) in entries {
            queue.add(k, v).unwrap();
        }
        queue
    }

    #[test]
    fn test_empty_queue() {
        let mut queue: ArrivalQueue<i32, i32> = ArrivalQueue::new();

        assert!(queue.is_empty());
        assert!(queue.head().is_none());
        assert!(queue.tail().is_none());
        assert!(queue.pop_head().is_none());
        assert!(queue.validate(&[]));
        assert_eq!(queue.remove(&23), Err(Error::NotFound));
    }

    #[test]
    fn test_single_entry_is_head_and_tail() {
        let mut queue = queue_of(&[(1, -1)]);

        assert_eq!(queue.head(), Some((&1, &-1)));
        assert_eq!(queue.tail(), Some((&1, &-1)));

        queue.remove(&1).unwrap();
        assert!(queue.head().is_none());
        assert!(queue.tail().is_none());
        assert_eq!(queue.remove(&1), Err(Error::NotFound));
    }

    #[test]
    fn test_remove_inside_list() {
        let mut queue = queue_of(&[(1, -1), (2, -2), (5, -5), (3, -3)]);
        assert_eq!(queue.head(), Some((&1, &-1)));
        assert_eq!(queue.tail(), Some((&3, &-3)));

        queue.remove(&2).unwrap();
        assert_eq!(queue.head(), Some((&1, &-1)));
        assert_eq!(queue.tail(), Some((&3, &-3)));
        assert!(queue.validate(&[(1, -1), (5, -5), (3, -3)]));

        queue.remove(&1).unwrap();
        assert_eq!(queue.head(), Some((&5, &-5)));
        assert_eq!(queue.tail(), Some((&3, &-3)));

        queue.remove(&3).unwrap();
        assert_eq!(queue.head(), Some((&5, &-5)));
        assert_eq!(queue.tail(), Some((&5, &-5)));

        queue.remove(&5).unwrap();
        assert!(queue.head().is_none());
        assert!(queue.tail().is_none());
        assert!(queue.validate(&[]));
    }

    #[test]
    fn test_duplicate_key_rejected() {
        let mut queue = queue_of(&[(1, -1)]);
        assert_eq!(queue.add(1, 99), Err(Error::DuplicateKey));
        assert!(queue.validate(&[(1, -1)]));
    }

    #[test]
    fn test_detach_returns_entry() {
        let mut queue = queue_of(&[(1, 10), (2, 20)]);
        assert_eq!(queue.detach(&2), Ok((2, 20)));
        assert!(queue.validate(&[(1, 10)]));
    }

    #[test]
    fn test_insert_after_and_before() {
        let mut queue = queue_of(&[(1, -1), (2, -2)]);
        let first = queue.node_ref(&1).unwrap();

        let seven = queue.insert_after(first, 7, -7).unwrap();
        assert!(queue.validate(&[(1, -1), (7, -7), (2, -2)]));

        queue.insert_before(first, 0, 0).unwrap();
        assert!(queue.validate(&[(0, 0), (1, -1), (7, -7), (2, -2)]));

        let tail = queue.tail_ref().unwrap();
        queue.insert_after(tail, 12, -12).unwrap();
        assert!(queue.validate(&[(0, 0), (1, -1), (7, -7), (2, -2), (12, -12)]));
        assert_eq!(queue.tail(), Some((&12, &-12)));

        assert_eq!(queue.next_ref(seven).unwrap(), queue.node_ref(&2));
        assert_eq!(queue.prev_ref(seven).unwrap(), Some(first));
    }

    #[test]
    fn test_node_api_rejects_unlinked_node() {
        let mut queue = queue_of(&[(1, -1), (2, -2)]);
        let node = queue.node_ref(&1).unwrap();
        queue.remove_node(node).unwrap();

        assert_eq!(queue.remove_node(node), Err(Error::InvalidState(UNLINKED)));
        assert!(matches!(queue.insert_after(node, 3, -3), Err(Error::InvalidState(_))));
        assert!(matches!(queue.node_mut(node), Err(Error::InvalidState(_))));
        assert!(queue.get_node(node).is_none());

        // Slot reuse does not revive the stale handle
        queue.add(4, -4).unwrap();
        assert!(queue.get_node(node).is_none());
        assert!(queue.validate(&[(2, -2), (4, -4)]));
    }

    #[test]
    fn test_node_mut_updates_in_place() {
        let mut queue = queue_of(&[(1, 100), (2, 200)]);
        let node = queue.node_ref(&2).unwrap();
        *queue.node_mut(node).unwrap() -= 50;

        assert_eq!(queue.get(&2), Some(&150));
        assert!(queue.validate(&[(1, 100), (2, 150)]));
    }

    #[test]
    fn test_pop_head_is_fifo() {
        let mut queue = queue_of(&[(3, 0), (1, 0), (2, 0)]);
        let order: Vec<_> = std::iter::from_fn(|| queue.pop_head().map(|(k, _)| k)).collect();

        assert_eq!(order, vec![3, 1, 2]);
        assert!(queue.is_empty());
    }

    #[test]
    fn test_validate_rejects_wrong_sequence() {
        let queue = queue_of(&[(1, -1), (2, -2)]);

        assert!(!queue.validate(&[(2, -2), (1, -1)]));
        assert!(!queue.validate(&[(1, -1)]));
        assert!(!queue.validate(&[(1, -1), (2, -2), (3, -3)]));
        assert!(!queue.validate(&[(1, -1), (2, 0)]));
    }

    #[test]
    fn test_clear() {
        let mut queue = queue_of(&[(1, -1), (2, -2)]);
        let node = queue.head_ref().unwrap();
        queue.clear();

        assert!(queue.is_empty());
        assert!(queue.get_node(node).is_none());
        assert!(!queue.contains_key(&1));
    }
}
