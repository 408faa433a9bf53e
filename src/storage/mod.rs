//! Generic storage structures behind the order book.
//!
//! - [`RedBlackTree`]: ordered map with O(log m) worst case, one per book side
//! - [`ArrivalQueue`]: FIFO with O(1) keyed removal, one per price level
//!
//! Both keep their nodes in a slab arena and hand out stamped handles
//! ([`NodeRef`], [`QueueRef`]) that a caller can hold to skip a lookup.

pub mod queue;
pub mod tree;

pub use queue::{ArrivalQueue, QueueRef};
pub use tree::{NodeRef, RedBlackTree};
