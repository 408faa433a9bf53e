//! Order book built on the storage structures.
//!
//! ## Architecture
//!
//! - [`PriceLevel`]: FIFO queue of orders at one price plus its aggregates
//! - [`OrderBook`]: bid and ask price trees plus the order-id index
//!
//! ## Performance
//!
//! | Operation | Complexity |
//! |-----------|------------|
//! | Add order | O(log m) |
//! | Cancel order by ID | O(1) lookup + O(log m) if the level empties |
//! | Reduce order | O(1), as cancel when filled out |
//! | Best bid/ask | O(log m) |
//!
//! m is the number of price levels on the side.
//!
//! The book performs no matching. A matching engine reads
//! [`OrderBook::front_order`], decides the fill, and reports it back through
//! [`OrderBook::reduce_order`].

pub mod book;
pub mod level;

pub use book::{BookConfig, LevelSummary, OrderBook, OrderLocation, Reduction};
pub use level::PriceLevel;
