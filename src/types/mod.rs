//! Core data types for the order book.
//!
//! - [`Order`]: A resting limit order
//! - [`Side`]: Buy or Sell
//!
//! Prices are integer ticks and quantities are integer units; the book
//! never interprets them beyond ordering and summing.

mod order;

pub use order::{Order, Side};
