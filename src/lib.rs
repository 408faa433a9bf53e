//! # lob-core
//!
//! Indexing and storage core of a limit order book.
//!
//! ## Architecture
//!
//! - **Storage**: a red-black tree (one per side, keyed by price) and an
//!   indexed arrival queue (one per price level, keyed by order id)
//! - **OrderBook**: composes both with an order-id index so cancels skip the
//!   tree descent
//! - **Types**: `Order` and `Side`
//!
//! ## Design Principles
//!
//! 1. **Determinism**: a logical clock stamps orders; same calls, same state
//! 2. **Arena storage**: tree and queue nodes live in slabs and link by index
//! 3. **Synchronous**: single writer, every call runs to completion
//!
//! ## Example
//!
//! ```
//! use lob_core::{Order, OrderBook, Reduction, Side};
//!
//! let mut book = OrderBook::new();
//! book.add_order(Order::new(1, Side::Sell, 10_100, 50)).unwrap();
//! book.add_order(Order::new(2, Side::Sell, 10_100, 70)).unwrap();
//!
//! // A matcher takes 50 from the front of the best ask
//! let front = book.front_order(Side::Sell).unwrap().id;
//! let outcome = book.reduce_order(front, 50).unwrap();
//! assert!(matches!(outcome, Reduction::Filled { filled: 50, .. }));
//! assert_eq!(book.front_order(Side::Sell).map(|o| o.id), Some(2));
//! ```

// ============================================================================
// Module declarations
// ============================================================================

/// Error type and result alias
pub mod error;

/// Core data types: Order, Side
pub mod types;

/// Generic storage: red-black tree and arrival queue
pub mod storage;

/// Order book: price levels and the two-sided book
pub mod orderbook;

// ============================================================================
// Re-exports for convenience
// ============================================================================

pub use error::{Error, Result};
pub use orderbook::{BookConfig, LevelSummary, OrderBook, OrderLocation, PriceLevel, Reduction};
pub use storage::{ArrivalQueue, NodeRef, QueueRef, RedBlackTree};
pub use types::{Order, Side};
