//! Price level: all resting orders at one price.
//!
//! ## Design
//!
//! A `PriceLevel` is the value stored in a side's price tree. It owns the
//! level's [`ArrivalQueue`] of orders keyed by order id, and keeps two
//! aggregates in step with it:
//!
//! - `order_count`: number of queued orders
//! - `total_volume`: sum of their remaining quantities
//!
//! ## Queue Structure
//!
//! ```text
//! head (oldest) <-> order2 <-> order3 <-> tail (newest)
//! ```
//!
//! - New orders are appended at the tail
//! - Matching consumes orders from the head
//! - Any order can be removed in O(1) through its [`QueueRef`]

use crate::error::{Error, Result};
use crate::storage::{ArrivalQueue, QueueRef};
use crate::types::Order;

/// A price level containing orders at a single price.
#[derive(Debug)]
pub struct PriceLevel {
    price: u64,
    total_volume: u64,
    order_count: usize,
    orders: ArrivalQueue<u64, Order>,
}

impl PriceLevel {
    /// Create a new empty price level
    pub fn new(price: u64) -> Self {
        Self::with_capacity(price, 0)
    }

    /// Empty level whose queue has room for `capacity` orders
    pub fn with_capacity(price: u64, capacity: usize) -> Self {
        Self {
            price,
            total_volume: 0,
            order_count: 0,
            orders: ArrivalQueue::with_capacity(capacity),
        }
    }

    #[inline]
    pub fn price(&self) -> u64 {
        self.price
    }

    /// Sum of remaining quantities at this level
    #[inline]
    pub fn total_volume(&self) -> u64 {
        self.total_volume
    }

    #[inline]
    pub fn order_count(&self) -> usize {
        self.order_count
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.order_count == 0
    }

    /// Oldest order, first to be matched
    #[inline]
    pub fn head_order(&self) -> Option<&Order> {
        self.orders.head().map(|(_, order)| order)
    }

    /// Newest order
    #[inline]
    pub fn tail_order(&self) -> Option<&Order> {
        self.orders.tail().map(|(_, order)| order)
    }

    /// The order queue, for callers walking it in arrival order
    #[inline]
    pub fn orders(&self) -> &ArrivalQueue<u64, Order> {
        &self.orders
    }

    /// Order held by a queue node
    pub fn order(&self, node: QueueRef) -> Option<&Order> {
        self.orders.get_node(node).map(|(_, order)| order)
    }

    /// Append an order at the tail of the queue.
    ///
    /// # Errors
    ///
    /// - [`Error::InvalidQuantity`] if the level's volume would overflow
    /// - [`Error::DuplicateKey`] if the order id is already queued here
    ///
    /// The level is unchanged on error.
    pub fn push_back(&mut self, order: Order) -> Result<QueueRef> {
        let quantity = order.remaining;
        let total_volume = self
            .total_volume
            .checked_add(quantity)
            .ok_or(Error::InvalidQuantity {
                order_id: order.id,
                quantity,
            })?;
        let node = self.orders.add(order.id, order)?;

        self.order_count += 1;
        self.total_volume = total_volume;
        Ok(node)
    }

    /// Unlink an order and return it with its remaining quantity intact.
    ///
    /// # Errors
    ///
    /// [`Error::InvalidState`] if the node is no longer in this queue.
    pub fn remove(&mut self, node: QueueRef) -> Result<Order> {
        let (_, order) = self.orders.detach_node(node)?;

        self.order_count -= 1;
        self.total_volume -= order.remaining;
        Ok(order)
    }

    /// Fill part of a queued order.
    ///
    /// The fill is capped at the order's remaining quantity; the capped
    /// amount is returned. The order stays queued even when it reaches
    /// zero so the caller decides when to remove it.
    pub fn fill(&mut self, node: QueueRef, quantity: u64, event_time: u64) -> Result<u64> {
        let order = self.orders.node_mut(node)?;
        let filled = order.fill(quantity);
        order.event_time = event_time;

        self.total_volume -= filled;
        Ok(filled)
    }

    /// Compare the aggregates with the queue contents
    pub fn validate(&self) -> Result<()> {
        let mut count = 0usize;
        let mut volume = 0u64;

        for (id, order) in self.orders.iter() {
            if *id != order.id {
                return Err(Error::InvariantViolation(format!(
                    "queue key {} holds order {}",
                    id, order.id
                )));
            }
            if order.price != self.price {
                return Err(Error::InvariantViolation(format!(
                    "order {} priced {} queued at level {}",
                    order.id, order.price, self.price
                )));
            }
            if order.remaining == 0 {
                return Err(Error::InvariantViolation(format!(
                    "order {} rests with zero quantity",
                    order.id
                )));
            }
            count += 1;
            volume = volume.checked_add(order.remaining).ok_or_else(|| {
                Error::InvariantViolation(format!("level {} volume overflows", self.price))
            })?;
        }

        if count != self.order_count || count != self.orders.len() {
            return Err(Error::InvariantViolation(format!(
                "level {} counts {} orders, queue holds {}",
                self.price, self.order_count, count
            )));
        }
        if volume != self.total_volume {
            return Err(Error::InvariantViolation(format!(
                "level {} volume {} but queue sums to {}",
                self.price, self.total_volume, volume
            )));
        }
        Ok(())
    }
}

// ============================================================================
// Unit Tests
// ============================================================================
