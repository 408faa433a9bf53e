//! Red-black tree keyed by price.
//!
//! ## Design
//!
//! Nodes live in a [`Slab`] arena and refer to each other by slab index.
//! Parent links are plain indices, so rotations only rewrite integers and
//! never move a node's key or value. An absent child is `None` and counts as
//! a black leaf; there is no allocated sentinel.
//!
//! Mirror-image cases of the fixup algorithms share one code path: every
//! child access goes through a [`Dir`] and the opposite branch is simply
//! `dir.flip()`.
//!
//! ## Handles
//!
//! [`insert`](RedBlackTree::insert) returns a [`NodeRef`]. A handle stays
//! valid until its own node is deleted: rotations and two-child deletions
//! relink nodes in place instead of copying entries between slots. Every
//! node carries a stamp that is never reused, so a handle to a deleted node
//! is rejected even after its slab slot has been recycled.
//!
//! ## Complexity
//!
//! | Operation | Complexity |
//! |-----------|------------|
//! | find / insert / delete | O(log m) |
//! | delete_node (handle) | O(log m) fixup, no search |
//! | min / max | O(log m) |
//! | get / get_mut (handle) | O(1) |

use std::cmp::Ordering;
use std::fmt;

use slab::Slab;

use crate::error::{Error, Result};

/// Child direction. `Left` holds smaller keys.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dir {
    Left = 0,
    Right = 1,
}

impl Dir {
    /// The mirror direction
    #[inline]
    pub fn flip(self) -> Self {
        match self {
            Dir::Left => Dir::Right,
            Dir::Right => Dir::Left,
        }
    }

    #[inline]
    fn idx(self) -> usize {
        self as usize
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Color {
    Red,
    Black,
}

#[derive(Debug)]
struct Node<K, V> {
    key: K,
    value: V,
    color: Color,
    parent: Option<usize>,
    children: [Option<usize>; 2],
    stamp: u64,
}

impl<K, V> Node<K, V> {
    #[inline]
    fn child(&self, dir: Dir) -> Option<usize> {
        self.children[dir.idx()]
    }
}

/// Stable handle to a tree node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeRef {
    slot: usize,
    stamp: u64,
}

/// Self-balancing ordered map with red-black invariants.
///
/// ## Example
///
/// ```
/// use lob_core::storage::RedBlackTree;
///
/// let mut tree = RedBlackTree::new();
/// tree.insert(2, "b");
/// tree.insert(1, "a");
///
/// assert_eq!(tree.find(&1), Some(&"a"));
/// assert_eq!(tree.first_key_value(), Some((&1, &"a")));
/// assert_eq!(tree.validate(), Ok(2));
/// ```
pub struct RedBlackTree<K, V> {
    nodes: Slab<Node<K, V>>,
    root: Option<usize>,
    next_stamp: u64,
}

impl<K, V> Default for RedBlackTree<K, V> {
    fn default() -> Self {
        Self {
            nodes: Slab::new(),
            root: None,
            next_stamp: 0,
        }
    }
}

impl<K: fmt::Debug, V: fmt::Debug> fmt::Debug for RedBlackTree<K, V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map().entries(self.iter()).finish()
    }
}

impl<K, V> RedBlackTree<K, V> {
    /// Create an empty tree
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an empty tree with room for `capacity` nodes
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            nodes: Slab::with_capacity(capacity),
            root: None,
            next_stamp: 0,
        }
    }

    /// Number of distinct keys
    #[inline]
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.root.is_none()
    }

    /// Remove every node. Outstanding handles become stale.
    pub fn clear(&mut self) {
        self.nodes.clear();
        self.root = None;
    }

    /// Key and value behind a handle, if the node is still in the tree
    pub fn get(&self, node: NodeRef) -> Option<(&K, &V)> {
        let slot = self.resolve(node)?;
        let n = &self.nodes[slot];
        Some((&n.key, &n.value))
    }

    /// Mutable value behind a handle. The key stays immutable.
    pub fn get_mut(&mut self, node: NodeRef) -> Option<&mut V> {
        let slot = self.resolve(node)?;
        Some(&mut self.nodes[slot].value)
    }

    /// Handle of the smallest key
    pub fn min(&self) -> Option<NodeRef> {
        self.root.map(|r| self.handle(self.extreme(r, Dir::Left)))
    }

    /// Handle of the largest key
    pub fn max(&self) -> Option<NodeRef> {
        self.root.map(|r| self.handle(self.extreme(r, Dir::Right)))
    }

    pub fn first_key_value(&self) -> Option<(&K, &V)> {
        self.min().and_then(|n| self.get(n))
    }

    pub fn last_key_value(&self) -> Option<(&K, &V)> {
        self.max().and_then(|n| self.get(n))
    }

    /// Mutable value of the smallest key
    pub fn first_value_mut(&mut self) -> Option<&mut V> {
        let node = self.min()?;
        self.get_mut(node)
    }

    /// Mutable value of the largest key
    pub fn last_value_mut(&mut self) -> Option<&mut V> {
        let node = self.max()?;
        self.get_mut(node)
    }

    /// In-order iterator; `.rev()` walks from the largest key down
    pub fn iter(&self) -> Iter<'_, K, V> {
        Iter {
            tree: self,
            front: self.root.map(|r| self.extreme(r, Dir::Left)),
            back: self.root.map(|r| self.extreme(r, Dir::Right)),
            remaining: self.nodes.len(),
        }
    }

    // ========================================================================
    // Link helpers
    // ========================================================================

    #[inline]
    fn resolve(&self, node: NodeRef) -> Option<usize> {
        self.nodes
            .get(node.slot)
            .filter(|n| n.stamp == node.stamp)
            .map(|_| node.slot)
    }

    #[inline]
    fn handle(&self, slot: usize) -> NodeRef {
        NodeRef {
            slot,
            stamp: self.nodes[slot].stamp,
        }
    }

    /// Absent children count as black
    #[inline]
    fn is_red(&self, node: Option<usize>) -> bool {
        node.is_some_and(|n| self.nodes[n].color == Color::Red)
    }

    #[inline]
    fn set_color(&mut self, node: usize, color: Color) {
        self.nodes[node].color = color;
    }

    /// Which side of `parent` holds `child`
    #[inline]
    fn side_of(&self, child: Option<usize>, parent: usize) -> Dir {
        if self.nodes[parent].child(Dir::Left) == child {
            Dir::Left
        } else {
            Dir::Right
        }
    }

    /// Follow `dir` children from `node` until there are none
    fn extreme(&self, mut node: usize, dir: Dir) -> usize {
        while let Some(next) = self.nodes[node].child(dir) {
            node = next;
        }
        node
    }

    /// In-order neighbour of `node` in direction `dir`
    fn step(&self, node: usize, dir: Dir) -> Option<usize> {
        if let Some(sub) = self.nodes[node].child(dir) {
            return Some(self.extreme(sub, dir.flip()));
        }
        let mut cur = node;
        let mut parent = self.nodes[cur].parent;
        while let Some(p) = parent {
            if self.nodes[p].child(dir) != Some(cur) {
                return Some(p);
            }
            cur = p;
            parent = self.nodes[p].parent;
        }
        None
    }

    /// Point `parent`'s link that held `old` (or the root) at `new`
    fn replace_child(&mut self, parent: Option<usize>, old: usize, new: Option<usize>) {
        match parent {
            None => self.root = new,
            Some(p) => {
                let dir = self.side_of(Some(old), p);
                self.nodes[p].children[dir.idx()] = new;
            }
        }
    }

    /// Put subtree `with` where `node` hangs. `node`'s own links are untouched.
    fn transplant(&mut self, node: usize, with: Option<usize>) {
        let parent = self.nodes[node].parent;
        self.replace_child(parent, node, with);
        if let Some(w) = with {
            self.nodes[w].parent = parent;
        }
    }

    /// Rotate `node` down toward `dir`; its child on the opposite side rises.
    ///
    /// ```text
    ///     node                 up
    ///    /    \    rotate     /  \
    ///   a      up   Left    node  c
    ///         /  \   ==>    /  \
    ///        b    c        a    b
    /// ```
    fn rotate(&mut self, node: usize, dir: Dir) {
        let up = self.nodes[node]
            .child(dir.flip())
            .expect("rotation needs a child on the rising side");

        let inner = self.nodes[up].child(dir);
        self.nodes[node].children[dir.flip().idx()] = inner;
        if let Some(inner) = inner {
            self.nodes[inner].parent = Some(node);
        }

        self.transplant(node, Some(up));

        self.nodes[up].children[dir.idx()] = Some(node);
        self.nodes[node].parent = Some(up);
    }
}

impl<K: Ord, V> RedBlackTree<K, V> {
    /// Value stored under `key`
    pub fn find(&self, key: &K) -> Option<&V> {
        self.search(key).ok().map(|slot| &self.nodes[slot].value)
    }

    pub fn find_mut(&mut self, key: &K) -> Option<&mut V> {
        let slot = self.search(key).ok()?;
        Some(&mut self.nodes[slot].value)
    }

    /// Handle of the node holding `key`
    pub fn find_node(&self, key: &K) -> Option<NodeRef> {
        self.search(key).ok().map(|slot| self.handle(slot))
    }

    #[inline]
    pub fn contains_key(&self, key: &K) -> bool {
        self.search(key).is_ok()
    }

    /// Insert `value` under `key`.
    ///
    /// An existing key has its value overwritten in place and keeps its
    /// handle; the tree shape does not change.
    pub fn insert(&mut self, key: K, value: V) -> NodeRef {
        match self.search(&key) {
            Ok(slot) => {
                self.nodes[slot].value = value;
                self.handle(slot)
            }
            Err(at) => {
                let slot = self.attach(key, value, at);
                self.handle(slot)
            }
        }
    }

    /// Handle of the node for `key`, inserting `make()` first if absent
    pub fn get_or_insert_with<F: FnOnce() -> V>(&mut self, key: K, make: F) -> NodeRef {
        match self.search(&key) {
            Ok(slot) => self.handle(slot),
            Err(at) => {
                let slot = self.attach(key, make(), at);
                self.handle(slot)
            }
        }
    }

    /// Remove `key` and return its value.
    ///
    /// # Errors
    ///
    /// [`Error::NotFound`] if the key is absent. The tree is unchanged.
    pub fn delete(&mut self, key: &K) -> Result<V> {
        let slot = self.search(key).map_err(|_| Error::NotFound)?;
        Ok(self.remove_slot(slot).value)
    }

    /// Remove the node behind `node` without searching for it.
    ///
    /// # Errors
    ///
    /// [`Error::InvalidState`] if the handle's node was already deleted.
    pub fn delete_node(&mut self, node: NodeRef) -> Result<(K, V)> {
        let slot = self
            .resolve(node)
            .ok_or(Error::InvalidState("tree node is no longer in the tree"))?;
        let removed = self.remove_slot(slot);
        Ok((removed.key, removed.value))
    }

    /// Check the red-black invariants, parent links and key order.
    ///
    /// Returns the node count. Verification only; O(m).
    pub fn validate(&self) -> Result<usize> {
        if let Some(root) = self.root {
            if self.nodes[root].parent.is_some() {
                return Err(Error::InvariantViolation("root has a parent".into()));
            }
            if self.nodes[root].color == Color::Red {
                return Err(Error::InvariantViolation("root is red".into()));
            }
        }

        let mut count = 0;
        self.black_height(self.root, None, &mut count)?;
        if count != self.nodes.len() {
            return Err(Error::InvariantViolation(format!(
                "{} nodes reachable from the root, {} allocated",
                count,
                self.nodes.len()
            )));
        }

        let mut prev: Option<&K> = None;
        for (key, _) in self.iter() {
            if prev.is_some_and(|p| p >= key) {
                return Err(Error::InvariantViolation(
                    "in-order traversal is not strictly increasing".into(),
                ));
            }
            prev = Some(key);
        }

        Ok(count)
    }

    // ========================================================================
    // Internals
    // ========================================================================

    /// `Ok(slot)` if found, else the attach point: parent and side, or
    /// `None` for an empty tree
    fn search(&self, key: &K) -> std::result::Result<usize, Option<(usize, Dir)>> {
        let mut cur = self.root;
        let mut at = None;
        while let Some(n) = cur {
            let node = &self.nodes[n];
            let dir = match key.cmp(&node.key) {
                Ordering::Less => Dir::Left,
                Ordering::Greater => Dir::Right,
                Ordering::Equal => return Ok(n),
            };
            at = Some((n, dir));
            cur = node.child(dir);
        }
        Err(at)
    }

    fn attach(&mut self, key: K, value: V, at: Option<(usize, Dir)>) -> usize {
        let stamp = self.next_stamp;
        self.next_stamp += 1;

        let slot = self.nodes.insert(Node {
            key,
            value,
            color: Color::Red,
            parent: at.map(|(p, _)| p),
            children: [None, None],
            stamp,
        });

        match at {
            None => self.root = Some(slot),
            Some((parent, dir)) => self.nodes[parent].children[dir.idx()] = Some(slot),
        }

        self.insert_fix(slot);
        slot
    }

    /// Restore the invariants after attaching red `node`
    fn insert_fix(&mut self, mut node: usize) {
        while let Some(mut parent) = self.nodes[node].parent.filter(|&p| self.is_red(Some(p))) {
            // A red parent is never the root
            let grand = self.nodes[parent]
                .parent
                .expect("red node has a parent");
            let side = self.side_of(Some(parent), grand);
            let uncle = self.nodes[grand].child(side.flip());

            if let Some(uncle) = uncle.filter(|&u| self.is_red(Some(u))) {
                self.set_color(parent, Color::Black);
                self.set_color(uncle, Color::Black);
                self.set_color(grand, Color::Red);
                node = grand;
                continue;
            }

            // Inner grandchild: turn it into the outer case
            if self.side_of(Some(node), parent) != side {
                self.rotate(parent, side);
                std::mem::swap(&mut node, &mut parent);
            }

            self.set_color(parent, Color::Black);
            self.set_color(grand, Color::Red);
            self.rotate(grand, side.flip());
        }

        if let Some(root) = self.root {
            self.set_color(root, Color::Black);
        }
    }

    /// Unlink `slot` from the tree, rebalance, and free it
    fn remove_slot(&mut self, slot: usize) -> Node<K, V> {
        let left = self.nodes[slot].child(Dir::Left);
        let right = self.nodes[slot].child(Dir::Right);
        let mut removed_color = self.nodes[slot].color;

        // `fix` takes the removed position; it may be absent, so its parent
        // is tracked separately.
        let (fix, fix_parent) = match (left, right) {
            (None, only) | (only, None) => {
                let parent = self.nodes[slot].parent;
                self.transplant(slot, only);
                (only, parent)
            }
            (Some(left), Some(right)) => {
                let succ = self.extreme(right, Dir::Left);
                removed_color = self.nodes[succ].color;
                let succ_right = self.nodes[succ].child(Dir::Right);

                let fix_parent = if succ == right {
                    succ
                } else {
                    let parent = self.nodes[succ]
                        .parent
                        .expect("successor below the right child has a parent");
                    self.transplant(succ, succ_right);
                    self.nodes[succ].children[Dir::Right.idx()] = Some(right);
                    self.nodes[right].parent = Some(succ);
                    parent
                };

                self.transplant(slot, Some(succ));
                self.nodes[succ].children[Dir::Left.idx()] = Some(left);
                self.nodes[left].parent = Some(succ);
                self.nodes[succ].color = self.nodes[slot].color;

                (succ_right, Some(fix_parent))
            }
        };

        if removed_color == Color::Black {
            self.delete_fix(fix, fix_parent);
        }

        self.nodes.remove(slot)
    }

    /// Restore black-height at `node`, one black short after a removal
    fn delete_fix(&mut self, mut node: Option<usize>, mut parent: Option<usize>) {
        while node != self.root && !self.is_red(node) {
            let Some(p) = parent else { break };
            let dir = self.side_of(node, p);

            // The short side cannot be the only non-empty side
            let mut sibling = self.nodes[p]
                .child(dir.flip())
                .expect("black-deficient node has a sibling");

            if self.is_red(Some(sibling)) {
                self.set_color(sibling, Color::Black);
                self.set_color(p, Color::Red);
                self.rotate(p, dir);
                sibling = self.nodes[p]
                    .child(dir.flip())
                    .expect("sibling after rotation");
            }

            let near = self.nodes[sibling].child(dir);
            let far = self.nodes[sibling].child(dir.flip());

            if !self.is_red(near) && !self.is_red(far) {
                self.set_color(sibling, Color::Red);
                node = Some(p);
                parent = self.nodes[p].parent;
                continue;
            }

            if !self.is_red(far) {
                let near = near.expect("red near child");
                self.set_color(near, Color::Black);
                self.set_color(sibling, Color::Red);
                self.rotate(sibling, dir.flip());
                sibling = self.nodes[p]
                    .child(dir.flip())
                    .expect("sibling after rotation");
            }

            let parent_color = self.nodes[p].color;
            self.set_color(sibling, parent_color);
            self.set_color(p, Color::Black);
            if let Some(far) = self.nodes[sibling].child(dir.flip()) {
                self.set_color(far, Color::Black);
            }
            self.rotate(p, dir);

            node = self.root;
            parent = None;
        }

        if let Some(n) = node {
            self.set_color(n, Color::Black);
        }
    }

    /// Black-height of the subtree at `node`, counting the absent leaf
    fn black_height(&self, node: Option<usize>, parent: Option<usize>, count: &mut usize) -> Result<usize> {
        let Some(n) = node else { return Ok(1) };
        let current = &self.nodes[n];
        *count += 1;

        if current.parent != parent {
            return Err(Error::InvariantViolation("broken parent link".into()));
        }
        if current.color == Color::Red
            && (self.is_red(current.child(Dir::Left)) || self.is_red(current.child(Dir::Right)))
        {
            return Err(Error::InvariantViolation("red node has a red child".into()));
        }

        let left = self.black_height(current.child(Dir::Left), Some(n), count)?;
        let right = self.black_height(current.child(Dir::Right), Some(n), count)?;
        if left != right {
            return Err(Error::InvariantViolation(format!(
                "black-height mismatch: {} on the left, {} on the right",
                left, right
            )));
        }

        Ok(left + usize::from(current.color == Color::Black))
    }
}

/// In-order iterator over a [`RedBlackTree`]
pub struct Iter<'a, K, V> {
    tree: &'a RedBlackTree<K, V>,
    front: Option<usize>,
    back: Option<usize>,
    remaining: usize,
}

impl<'a, K, V> Iterator for Iter<'a, K, V> {
    type Item = (&'a K, &'a V);

    fn next(&mut self) -> Option<Self::Item> {
        if self.remaining == 0 {
            return None;
        }
        let slot = self.front?;
        self.remaining -= 1;
        self.front = self.tree.step(slot, Dir::Right);
        let node = &self.tree.nodes[slot];
        Some((&node.key, &node.value))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.remaining, Some(self.remaining))
    }
}

impl<K, V> DoubleEndedIterator for Iter<'_, K, V> {
    fn next_back(&mut self) -> Option<Self::Item> {
        if self.remaining == 0 {
            return None;
        }
        let slot = self.back?;
        self.remaining -= 1;
        self.back = self.tree.step(slot, Dir::Left);
        let node = &self.tree.nodes[slot];
        Some((&node.key, &node.value))
    }
}

impl<K, V> ExactSizeIterator for Iter<'_, K, V> {}

impl<'a, K, V> IntoIterator for &'a RedBlackTree<K, V> {
    type Item = (&'a K, &'a V);
    type IntoIter = Iter<'a, K, V>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

// ============================================================================
// Unit Tests
// ============================================================================
