//! Two-sided order book.
//!
//! ## Architecture
//!
//! - **Price trees**: one [`RedBlackTree`] per side, keyed by price, valued
//!   by [`PriceLevel`]. Both trees sort ascending; the best bid is the
//!   maximum of the bid tree and the best ask the minimum of the ask tree.
//! - **Order index**: `HashMap` from order id to [`OrderLocation`] (side,
//!   price, level handle, queue handle). Cancel and reduce go straight to
//!   the queue node without descending the tree.
//!
//! Every indexed id points at a node reachable from its side's tree, and
//! every reachable node is indexed. [`OrderBook::validate`] checks both
//! directions.
//!
//! ## Time
//!
//! The book stamps orders with a logical clock that advances once per
//! accepted mutation. Replaying the same calls yields the same stamps and
//! the same state root.
//!
//! ## Example
//!
//! ```
//! use lob_core::orderbook::OrderBook;
//! use lob_core::types::{Order, Side};
//!
//! let mut book = OrderBook::with_capacity(1_000);
//!
//! let bid = book.add_order(Order::new(1, Side::Buy, 9_950, 100)).unwrap();
//! book.add_order(Order::new(2, Side::Sell, 10_050, 100)).unwrap();
//!
//! assert_eq!(book.best_bid(), Some(9_950));
//! assert_eq!(book.spread(), Some(100));
//!
//! book.cancel_order(bid).unwrap();
//! assert_eq!(book.best_bid(), None);
//! ```

use std::collections::HashMap;

use sha2::{Digest, Sha256};
use tracing::{debug, trace};

use crate::error::{Error, Result};
use crate::orderbook::PriceLevel;
use crate::storage::{NodeRef, QueueRef, RedBlackTree};
use crate::types::{Order, Side};

/// Pre-sizing for the book's structures.
///
/// All zero by default; structures then grow on demand.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct BookConfig {
    /// Expected number of resting orders (order index)
    pub order_capacity: usize,
    /// Expected number of price levels per side (tree arenas)
    pub level_capacity: usize,
    /// Expected number of orders per price level (queue arenas)
    pub level_queue_capacity: usize,
}

/// Where a resting order lives.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OrderLocation {
    pub side: Side,
    pub price: u64,
    /// Handle of the price level node in the side's tree
    pub level: NodeRef,
    /// Handle of the order's node in the level's queue
    pub node: QueueRef,
}

/// Outcome of [`OrderBook::reduce_order`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reduction {
    /// The order keeps resting with `remaining` left
    Partial { filled: u64, remaining: u64 },
    /// The order was filled out and removed from the book
    Filled { filled: u64, order: Order },
}

/// Aggregates of one price level, for depth queries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LevelSummary {
    pub price: u64,
    pub volume: u64,
    pub order_count: usize,
}

/// Limit order book indexing resting orders by price and arrival.
#[derive(Debug)]
pub struct OrderBook {
    bids: RedBlackTree<u64, PriceLevel>,
    asks: RedBlackTree<u64, PriceLevel>,

    /// Order id to location (O(1) cancel)
    order_index: HashMap<u64, OrderLocation>,

    config: BookConfig,

    /// Next id handed to an order submitted with id 0
    next_order_id: u64,

    /// Logical clock; last value handed out
    clock: u64,

    bid_count: usize,
    ask_count: usize,
}

impl Default for OrderBook {
    fn default() -> Self {
        Self::new()
    }
}

impl OrderBook {
    /// Create an empty book
    pub fn new() -> Self {
        Self::with_config(BookConfig::default())
    }

    /// Create a book with room for `order_capacity` resting orders
    pub fn with_capacity(order_capacity: usize) -> Self {
        Self::with_config(BookConfig {
            order_capacity,
            ..BookConfig::default()
        })
    }

    pub fn with_config(config: BookConfig) -> Self {
        Self {
            bids: RedBlackTree::with_capacity(config.level_capacity),
            asks: RedBlackTree::with_capacity(config.level_capacity),
            order_index: HashMap::with_capacity(config.order_capacity),
            config,
            next_order_id: 1,
            clock: 0,
            bid_count: 0,
            ask_count: 0,
        }
    }

    #[inline]
    pub fn config(&self) -> &BookConfig {
        &self.config
    }

    // ========================================================================
    // Size
    // ========================================================================

    /// Total number of resting orders
    #[inline]
    pub fn order_count(&self) -> usize {
        self.order_index.len()
    }

    #[inline]
    pub fn bid_count(&self) -> usize {
        self.bid_count
    }

    #[inline]
    pub fn ask_count(&self) -> usize {
        self.ask_count
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.order_index.is_empty()
    }

    /// Number of bid price levels
    #[inline]
    pub fn bid_levels(&self) -> usize {
        self.bids.len()
    }

    /// Number of ask price levels
    #[inline]
    pub fn ask_levels(&self) -> usize {
        self.asks.len()
    }

    /// Clear all orders from the book
    pub fn clear(&mut self) {
        self.bids.clear();
        self.asks.clear();
        self.order_index.clear();
        self.bid_count = 0;
        self.ask_count = 0;
    }

    // ========================================================================
    // Order Management
    // ========================================================================

    /// Rest an order on its side of the book.
    ///
    /// An order with id 0 gets the next free id. The order is appended to
    /// the queue at its price, creating the price level if needed.
    ///
    /// # Returns
    ///
    /// The order's id
    ///
    /// # Errors
    ///
    /// - [`Error::InvalidQuantity`] if nothing remains to rest, or if the
    ///   level's total volume would overflow
    /// - [`Error::InvalidSide`] if `side_raw` is not a known side
    /// - [`Error::DuplicateOrder`] if the id is already resting
    ///
    /// The book is unchanged on error, including the id counter and clock.
    pub fn add_order(&mut self, mut order: Order) -> Result<u64> {
        if order.remaining == 0 {
            return Err(Error::InvalidQuantity {
                order_id: order.id,
                quantity: order.remaining,
            });
        }
        let Some(side) = Side::from_u8(order.side_raw) else {
            return Err(Error::InvalidSide(order.side_raw));
        };
        let assigned = order.id == 0;
        if assigned {
            order.id = self.next_free_id();
        } else if self.order_index.contains_key(&order.id) {
            return Err(Error::DuplicateOrder(order.id));
        }

        // Committed only once the order rests
        let now = self.clock + 1;
        order.entry_time = now;
        order.event_time = now;

        let order_id = order.id;
        let price = order.price;
        let queue_capacity = self.config.level_queue_capacity;

        let tree = self.side_tree_mut(side);
        let levels_before = tree.len();
        let level_ref =
            tree.get_or_insert_with(price, || PriceLevel::with_capacity(price, queue_capacity));
        let created = tree.len() > levels_before;

        let level = tree
            .get_mut(level_ref)
            .ok_or(Error::InvalidState("price level missing right after insert"))?;
        let node = match level.push_back(order) {
            Ok(node) => node,
            Err(err) => {
                if created {
                    tree.delete_node(level_ref)?;
                }
                return Err(err);
            }
        };

        if created {
            debug!(side = %side, price, "price level created");
        }

        self.clock = now;
        if assigned {
            self.next_order_id = order_id + 1;
        }

        self.order_index.insert(
            order_id,
            OrderLocation {
                side,
                price,
                level: level_ref,
                node,
            },
        );
        *self.side_count_mut(side) += 1;

        trace!(order_id, side = %side, price, "order added");
        Ok(order_id)
    }

    /// Cancel a resting order.
    ///
    /// # Returns
    ///
    /// The cancelled order, with `remaining` set to zero
    ///
    /// # Errors
    ///
    /// [`Error::OrderNotFound`] if the id is unknown, already cancelled or
    /// already filled.
    pub fn cancel_order(&mut self, order_id: u64) -> Result<Order> {
        let location = self.lookup(order_id)?;
        let now = self.tick();

        let mut order = self.unlink(location)?;
        let cancelled = order.cancel();
        order.event_time = now;

        trace!(order_id, side = %location.side, price = location.price, cancelled, "order cancelled");
        Ok(order)
    }

    /// Apply an execution of `quantity` against a resting order.
    ///
    /// A fill larger than the remaining quantity is capped. When nothing
    /// remains the order leaves the book exactly as on cancel.
    ///
    /// # Errors
    ///
    /// - [`Error::InvalidQuantity`] for a zero fill
    /// - [`Error::OrderNotFound`] if the id is not resting
    pub fn reduce_order(&mut self, order_id: u64, quantity: u64) -> Result<Reduction> {
        if quantity == 0 {
            return Err(Error::InvalidQuantity { order_id, quantity });
        }
        let location = self.lookup(order_id)?;
        let now = self.tick();

        let level = self
            .side_tree_mut(location.side)
            .get_mut(location.level)
            .ok_or(Error::InvalidState("order index points at a deleted price level"))?;
        let filled = level.fill(location.node, quantity, now)?;
        let remaining = level.order(location.node).map_or(0, |o| o.remaining);

        if remaining > 0 {
            trace!(order_id, filled, remaining, "order reduced");
            return Ok(Reduction::Partial { filled, remaining });
        }

        let order = self.unlink(location)?;
        trace!(order_id, filled, "order filled");
        Ok(Reduction::Filled { filled, order })
    }

    /// Get a resting order by id
    pub fn get_order(&self, order_id: u64) -> Option<&Order> {
        let location = self.order_index.get(&order_id)?;
        let (_, level) = self.side_tree(location.side).get(location.level)?;
        level.order(location.node)
    }

    /// Where a resting order lives
    #[inline]
    pub fn location(&self, order_id: u64) -> Option<&OrderLocation> {
        self.order_index.get(&order_id)
    }

    #[inline]
    pub fn contains_order(&self, order_id: u64) -> bool {
        self.order_index.contains_key(&order_id)
    }

    // ========================================================================
    // Best Bid/Ask
    // ========================================================================

    /// Best price on `side`: highest bid or lowest ask
    pub fn best_price(&self, side: Side) -> Option<u64> {
        self.best_level(side).map(PriceLevel::price)
    }

    #[inline]
    pub fn best_bid(&self) -> Option<u64> {
        self.best_price(Side::Buy)
    }

    #[inline]
    pub fn best_ask(&self) -> Option<u64> {
        self.best_price(Side::Sell)
    }

    /// Get the spread (best_ask - best_bid), if the book is not crossed
    pub fn spread(&self) -> Option<u64> {
        match (self.best_bid(), self.best_ask()) {
            (Some(bid), Some(ask)) if ask >= bid => Some(ask - bid),
            _ => None,
        }
    }

    /// Price level at the best price on `side`
    pub fn best_level(&self, side: Side) -> Option<&PriceLevel> {
        let best = match side {
            Side::Buy => self.bids.last_key_value(),
            Side::Sell => self.asks.first_key_value(),
        };
        best.map(|(_, level)| level)
    }

    /// Oldest order at the best price on `side`; the next one to match
    pub fn front_order(&self, side: Side) -> Option<&Order> {
        self.best_level(side).and_then(PriceLevel::head_order)
    }

    /// Price level at an exact price
    pub fn level(&self, side: Side, price: u64) -> Option<&PriceLevel> {
        self.side_tree(side).find(&price)
    }

    /// Price levels on `side`, best price first
    pub fn levels(&self, side: Side) -> Box<dyn Iterator<Item = &PriceLevel> + '_> {
        match side {
            Side::Buy => Box::new(self.bids.iter().rev().map(|(_, level)| level)),
            Side::Sell => Box::new(self.asks.iter().map(|(_, level)| level)),
        }
    }

    /// Aggregates of up to `max_levels` levels on `side`, best price first
    pub fn depth(&self, side: Side, max_levels: usize) -> Vec<LevelSummary> {
        self.levels(side)
            .take(max_levels)
            .map(|level| LevelSummary {
                price: level.price(),
                volume: level.total_volume(),
                order_count: level.order_count(),
            })
            .collect()
    }

    // ========================================================================
    // Verification
    // ========================================================================

    /// SHA-256 over the SSZ encoding of every resting order.
    ///
    /// Bids are hashed best price first, then asks best price first; within
    /// a level orders are hashed in arrival order.
    pub fn compute_state_root(&self) -> Result<[u8; 32]> {
        let mut hasher = Sha256::new();

        for side in [Side::Buy, Side::Sell] {
            hasher.update([side.to_u8()]);
            for level in self.levels(side) {
                hasher.update(level.price().to_le_bytes());
                for (_, order) in level.orders() {
                    let bytes = ssz_rs::serialize(order)
                        .map_err(|e| Error::Serialization(format!("{:?}", e)))?;
                    hasher.update(&bytes);
                }
            }
        }

        let result = hasher.finalize();
        let mut root = [0u8; 32];
        root.copy_from_slice(&result);
        Ok(root)
    }

    /// Check trees, levels and the order index against each other.
    ///
    /// Verification only; O(n).
    pub fn validate(&self) -> Result<()> {
        let mut reachable = 0usize;

        for side in [Side::Buy, Side::Sell] {
            let tree = self.side_tree(side);
            tree.validate()?;

            let mut side_orders = 0usize;
            for (&price, level) in tree.iter() {
                if level.price() != price {
                    return Err(Error::InvariantViolation(format!(
                        "level priced {} stored under key {}",
                        level.price(),
                        price
                    )));
                }
                if level.is_empty() {
                    return Err(Error::InvariantViolation(format!(
                        "empty {} level at {}",
                        side, price
                    )));
                }
                level.validate()?;

                for (&order_id, order) in level.orders() {
                    if order.side() != side {
                        return Err(Error::InvariantViolation(format!(
                            "order {} rests on the wrong side",
                            order_id
                        )));
                    }
                    let location = self.order_index.get(&order_id).ok_or_else(|| {
                        Error::InvariantViolation(format!("order {} is not indexed", order_id))
                    })?;
                    let level_matches = tree.get(location.level).map(|(p, _)| *p) == Some(price);
                    let node_matches = level.order(location.node).map(|o| o.id) == Some(order_id);
                    if location.side != side || location.price != price || !level_matches || !node_matches {
                        return Err(Error::InvariantViolation(format!(
                            "order {} indexed at the wrong location",
                            order_id
                        )));
                    }
                    side_orders += 1;
                }
            }

            if side_orders != self.side_count(side) {
                return Err(Error::InvariantViolation(format!(
                    "{} side counts {} orders, trees hold {}",
                    side,
                    self.side_count(side),
                    side_orders
                )));
            }
            reachable += side_orders;
        }

        if reachable != self.order_index.len() {
            return Err(Error::InvariantViolation(format!(
                "order index holds {} entries, trees hold {} orders",
                self.order_index.len(),
                reachable
            )));
        }
        Ok(())
    }

    // ========================================================================
    // ID Generation
    // ========================================================================

    /// Get the current next order ID (without incrementing)
    #[inline]
    pub fn peek_next_order_id(&self) -> u64 {
        self.next_order_id
    }

    // ========================================================================
    // Internals
    // ========================================================================

    /// First id at or after the counter that is not resting
    fn next_free_id(&self) -> u64 {
        let mut id = self.next_order_id;
        while self.order_index.contains_key(&id) {
            id += 1;
        }
        id
    }

    #[inline]
    fn tick(&mut self) -> u64 {
        self.clock += 1;
        self.clock
    }

    #[inline]
    fn lookup(&self, order_id: u64) -> Result<OrderLocation> {
        self.order_index
            .get(&order_id)
            .copied()
            .ok_or(Error::OrderNotFound(order_id))
    }

    #[inline]
    fn side_tree(&self, side: Side) -> &RedBlackTree<u64, PriceLevel> {
        match side {
            Side::Buy => &self.bids,
            Side::Sell => &self.asks,
        }
    }

    #[inline]
    fn side_tree_mut(&mut self, side: Side) -> &mut RedBlackTree<u64, PriceLevel> {
        match side {
            Side::Buy => &mut self.bids,
            Side::Sell => &mut self.asks,
        }
    }

    #[inline]
    fn side_count(&self, side: Side) -> usize {
        match side {
            Side::Buy => self.bid_count,
            Side::Sell => self.ask_count,
        }
    }

    #[inline]
    fn side_count_mut(&mut self, side: Side) -> &mut usize {
        match side {
            Side::Buy => &mut self.bid_count,
            Side::Sell => &mut self.ask_count,
        }
    }

    /// Take an order out of its queue, level and the index.
    /// Deletes the level when it empties.
    fn unlink(&mut self, location: OrderLocation) -> Result<Order> {
        let tree = self.side_tree_mut(location.side);
        let level = tree
            .get_mut(location.level)
            .ok_or(Error::InvalidState("order index points at a deleted price level"))?;
        let order = level.remove(location.node)?;

        if level.is_empty() {
            tree.delete_node(location.level)?;
            debug!(side = %location.side, price = location.price, "price level deleted");
        }

        self.order_index.remove(&order.id);
        *self.side_count_mut(location.side) -= 1;
        Ok(order)
    }
}

// ============================================================================
// Unit Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn buy(id: u64, price: u64, quantity: u64) -> Order {
        Order::new(id, Side::Buy, price, quantity)
    }

    fn sell(id: u64, price: u64, quantity: u64) -> Order {
        Order::new(id, Side::Sell, price, quantity)
    }

    #[test]
    fn test_book_new() {
        let book = OrderBook::new();

        assert!(book.is_empty());
        assert_eq!(book.order_count(), 0);
        assert!(book.best_bid().is_none());
        assert!(book.best_ask().is_none());
        assert!(book.spread().is_none());
        assert!(book.validate().is_ok());
    }

    #[test]
    fn test_book_with_config() {
        let config = BookConfig {
            order_capacity: 100,
            level_capacity: 10,
            level_queue_capacity: 4,
        };
        let book = OrderBook::with_config(config);
        assert_eq!(book.config(), &config);
    }

    #[test]
    fn test_add_buy_and_sell() {
        let mut book = OrderBook::with_capacity(100);

        assert_eq!(book.add_order(buy(1, 10_000, 100)), Ok(1));
        assert_eq!(book.add_order(sell(2, 10_100, 100)), Ok(2));

        assert_eq!(book.bid_count(), 1);
        assert_eq!(book.ask_count(), 1);
        assert_eq!(book.best_bid(), Some(10_000));
        assert_eq!(book.best_ask(), Some(10_100));
        assert_eq!(book.spread(), Some(100));
        assert!(book.validate().is_ok());
    }

    #[test]
    fn test_price_priority_per_side() {
        let mut book = OrderBook::new();
        book.add_order(buy(1, 4_900, 10)).unwrap();
        book.add_order(buy(2, 5_100, 10)).unwrap();
        book.add_order(buy(3, 5_000, 10)).unwrap();
        book.add_order(sell(4, 5_300, 10)).unwrap();
        book.add_order(sell(5, 5_200, 10)).unwrap();

        assert_eq!(book.best_price(Side::Buy), Some(5_100));
        assert_eq!(book.best_price(Side::Sell), Some(5_200));
        assert_eq!(book.bid_levels(), 3);
        assert_eq!(book.ask_levels(), 2);
    }

    #[test]
    fn test_time_priority_within_level() {
        let mut book = OrderBook::new();
        book.add_order(buy(7, 10_000, 10)).unwrap();
        book.add_order(buy(3, 10_000, 20)).unwrap();
        book.add_order(buy(9, 10_000, 30)).unwrap();

        let level = book.best_level(Side::Buy).unwrap();
        assert_eq!(level.order_count(), 3);
        assert_eq!(level.total_volume(), 60);
        assert_eq!(book.front_order(Side::Buy).map(|o| o.id), Some(7));

        let entry_times: Vec<_> = level.orders().iter().map(|(_, o)| o.entry_time).collect();
        assert!(entry_times.windows(2).all(|w| w[0] < w[1]));
    }

    #[test]
    fn test_auto_order_id() {
        let mut book = OrderBook::new();
        book.add_order(buy(1, 10_000, 10)).unwrap();

        // 1 is taken, so id 0 gets 2
        assert_eq!(book.add_order(buy(0, 10_000, 10)), Ok(2));
        assert_eq!(book.peek_next_order_id(), 3);
    }

    #[test]
    fn test_reject_duplicate_and_zero_quantity() {
        let mut book = OrderBook::new();
        book.add_order(buy(1, 10_000, 10)).unwrap();

        assert_eq!(book.add_order(sell(1, 10_100, 10)), Err(Error::DuplicateOrder(1)));
        assert_eq!(
            book.add_order(buy(2, 10_000, 0)),
            Err(Error::InvalidQuantity { order_id: 2, quantity: 0 })
        );
        assert_eq!(book.order_count(), 1);
        assert_eq!(book.ask_levels(), 0);
        assert!(book.validate().is_ok());
    }

    #[test]
    fn test_volume_overflow_rejected_and_book_unchanged() {
        let half = u64::MAX / 2 + 1;
        let seed = || {
            let mut book = OrderBook::new();
            book.add_order(buy(0, 100, half)).unwrap();
            book.add_order(buy(0, 99, 10)).unwrap();
            book
        };

        let mut book = seed();
        let untouched = seed();

        // Existing level: count, volume, id counter and clock all stay put
        assert_eq!(
            book.add_order(buy(0, 100, half)),
            Err(Error::InvalidQuantity { order_id: 3, quantity: half })
        );
        let level = book.level(Side::Buy, 100).unwrap();
        assert_eq!(level.order_count(), 1);
        assert_eq!(level.total_volume(), half);
        assert_eq!(book.order_count(), 2);
        assert_eq!(book.bid_levels(), 2);
        assert_eq!(book.peek_next_order_id(), untouched.peek_next_order_id());
        assert!(!book.contains_order(3));
        assert!(book.validate().is_ok());

        // The next accepted order gets the same id and stamp as without the failure
        assert_eq!(book.add_order(sell(0, 200, 5)), Ok(3));
        let mut replay = untouched;
        replay.add_order(sell(0, 200, 5)).unwrap();
        assert_eq!(book.compute_state_root(), replay.compute_state_root());
    }

    #[test]
    fn test_rejected_add_at_new_price_leaves_no_level() {
        let mut book = OrderBook::new();
        book.add_order(buy(1, 100, 10)).unwrap();
        let root = book.compute_state_root();

        let mut bad_side = buy(2, 150, 10);
        bad_side.side_raw = 7;
        assert_eq!(book.add_order(bad_side), Err(Error::InvalidSide(7)));
        assert_eq!(book.add_order(sell(3, 150, 0)), Err(Error::InvalidQuantity { order_id: 3, quantity: 0 }));

        assert_eq!(book.bid_levels(), 1);
        assert_eq!(book.ask_levels(), 0);
        assert!(book.level(Side::Buy, 150).is_none());
        assert_eq!(book.compute_state_root(), root);
        assert!(book.validate().is_ok());
    }

    #[test]
    fn test_cancel_order() {
        let mut book = OrderBook::new();
        book.add_order(buy(42, 10_000, 100)).unwrap();

        let cancelled = book.cancel_order(42).unwrap();
        assert_eq!(cancelled.id, 42);
        assert_eq!(cancelled.remaining, 0);
        assert!(cancelled.event_time > cancelled.entry_time);

        assert!(book.is_empty());
        assert_eq!(book.bid_levels(), 0);
        assert!(!book.contains_order(42));
        assert_eq!(book.cancel_order(42), Err(Error::OrderNotFound(42)));
        assert!(book.validate().is_ok());
    }

    #[test]
    fn test_cancel_nonexistent() {
        let mut book = OrderBook::new();
        assert_eq!(book.cancel_order(999), Err(Error::OrderNotFound(999)));
    }

    #[test]
    fn test_cancel_keeps_level_with_other_orders() {
        let mut book = OrderBook::new();
        book.add_order(sell(1, 10_100, 10)).unwrap();
        book.add_order(sell(2, 10_100, 20)).unwrap();
        book.add_order(sell(3, 10_100, 30)).unwrap();

        book.cancel_order(2).unwrap();

        let level = book.level(Side::Sell, 10_100).unwrap();
        assert_eq!(level.order_count(), 2);
        assert_eq!(level.total_volume(), 40);
        assert!(level.orders().validate(&[
            (1, book.get_order(1).unwrap().clone()),
            (3, book.get_order(3).unwrap().clone()),
        ]));
        assert!(book.validate().is_ok());
    }

    #[test]
    fn test_cancel_best_level_moves_best_price() {
        let mut book = OrderBook::new();
        book.add_order(buy(1, 5_000, 10)).unwrap();
        book.add_order(buy(2, 4_900, 10)).unwrap();

        book.cancel_order(1).unwrap();

        assert_eq!(book.bid_levels(), 1);
        assert_eq!(book.best_bid(), Some(4_900));
    }

    #[test]
    fn test_reduce_partial_then_full() {
        let mut book = OrderBook::new();
        book.add_order(sell(1, 10_100, 100)).unwrap();
        book.add_order(sell(2, 10_100, 50)).unwrap();

        assert_eq!(
            book.reduce_order(1, 30),
            Ok(Reduction::Partial { filled: 30, remaining: 70 })
        );
        assert_eq!(book.level(Side::Sell, 10_100).unwrap().total_volume(), 120);
        assert_eq!(book.get_order(1).map(|o| o.remaining), Some(70));

        match book.reduce_order(1, 1_000).unwrap() {
            Reduction::Filled { filled, order } => {
                assert_eq!(filled, 70);
                assert_eq!(order.id, 1);
                assert!(order.is_filled());
            }
            other => panic!("expected a full fill, got {:?}", other),
        }

        assert!(!book.contains_order(1));
        assert_eq!(book.front_order(Side::Sell).map(|o| o.id), Some(2));
        assert_eq!(book.level(Side::Sell, 10_100).unwrap().total_volume(), 50);
        assert!(book.validate().is_ok());
    }

    #[test]
    fn test_reduce_last_order_deletes_level() {
        let mut book = OrderBook::new();
        book.add_order(buy(1, 10_000, 10)).unwrap();

        assert!(matches!(book.reduce_order(1, 10), Ok(Reduction::Filled { filled: 10, .. })));
        assert_eq!(book.bid_levels(), 0);
        assert!(book.best_bid().is_none());
    }

    #[test]
    fn test_reduce_rejects_bad_input() {
        let mut book = OrderBook::new();
        book.add_order(buy(1, 10_000, 10)).unwrap();

        assert_eq!(
            book.reduce_order(1, 0),
            Err(Error::InvalidQuantity { order_id: 1, quantity: 0 })
        );
        assert_eq!(book.reduce_order(2, 5), Err(Error::OrderNotFound(2)));
        assert_eq!(book.get_order(1).map(|o| o.remaining), Some(10));
    }

    #[test]
    fn test_depth() {
        let mut book = OrderBook::new();
        book.add_order(buy(1, 9_900, 10)).unwrap();
        book.add_order(buy(2, 10_000, 20)).unwrap();
        book.add_order(buy(3, 10_000, 5)).unwrap();
        book.add_order(buy(4, 9_800, 1)).unwrap();

        let depth = book.depth(Side::Buy, 2);
        assert_eq!(
            depth,
            vec![
                LevelSummary { price: 10_000, volume: 25, order_count: 2 },
                LevelSummary { price: 9_900, volume: 10, order_count: 1 },
            ]
        );
        assert!(book.depth(Side::Sell, 5).is_empty());
    }

    #[test]
    fn test_state_root_tracks_resting_state() {
        let build = || {
            let mut book = OrderBook::new();
            book.add_order(buy(1, 9_900, 10)).unwrap();
            book.add_order(sell(2, 10_100, 10)).unwrap();
            book
        };

        let a = build();
        let mut b = build();
        assert_eq!(a.compute_state_root(), b.compute_state_root());

        b.reduce_order(2, 1).unwrap();
        assert_ne!(a.compute_state_root(), b.compute_state_root());
    }

    #[test]
    fn test_location_and_get_order() {
        let mut book = OrderBook::new();
        book.add_order(sell(5, 10_200, 10)).unwrap();

        let location = *book.location(5).unwrap();
        assert_eq!(location.side, Side::Sell);
        assert_eq!(location.price, 10_200);
        assert_eq!(book.get_order(5).map(|o| o.price), Some(10_200));
        assert!(book.get_order(6).is_none());
    }

    #[test]
    fn test_clear() {
        let mut book = OrderBook::new();
        book.add_order(buy(1, 10_000, 10)).unwrap();
        book.add_order(sell(2, 10_100, 10)).unwrap();

        book.clear();

        assert!(book.is_empty());
        assert_eq!(book.bid_count(), 0);
        assert_eq!(book.ask_count(), 0);
        assert!(book.best_bid().is_none());
        assert!(book.validate().is_ok());
    }
}
