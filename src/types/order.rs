//! Resting order and side.
//!
//! ## SSZ Serialization
//!
//! `Order` derives `SimpleSerialize` from ssz_rs so resting state has one
//! canonical byte encoding (used by the book's state root). The side is
//! stored as a `u8` for that reason.
//!
//! ## Timestamps
//!
//! `entry_time` and `event_time` are logical sequence numbers assigned by
//! the order book, not wall-clock readings. `entry_time` defines time
//! priority and never changes once the order rests; `event_time` moves on
//! every mutation.

use ssz_rs::prelude::*;

// ============================================================================
// Side enum
// ============================================================================

/// Order side: Buy or Sell
///
/// Represented as u8 for SSZ compatibility:
/// - Buy = 0
/// - Sell = 1
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Side {
    /// Bid side, best price is the highest
    #[default]
    Buy,
    /// Ask side, best price is the lowest
    Sell,
}

impl Side {
    pub fn to_u8(self) -> u8 {
        match self {
            Side::Buy => 0,
            Side::Sell => 1,
        }
    }

    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            0 => Some(Side::Buy),
            1 => Some(Side::Sell),
            _ => None,
        }
    }

    /// Returns the opposite side
    pub fn opposite(self) -> Self {
        match self {
            Side::Buy => Side::Sell,
            Side::Sell => Side::Buy,
        }
    }
}

impl std::fmt::Display for Side {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Side::Buy => f.write_str("buy"),
            Side::Sell => f.write_str("sell"),
        }
    }
}

// ============================================================================
// Order struct
// ============================================================================

/// A limit order resting (or about to rest) in the book.
///
/// ## SSZ Layout
///
/// Fixed-size container of 49 bytes:
/// id (8) + side_raw (1) + price (8) + quantity (8) + remaining (8) +
/// entry_time (8) + event_time (8).
///
/// ## Example
///
/// ```
/// use lob_core::types::{Order, Side};
///
/// // id 0 asks the book to assign one
/// let order = Order::new(0, Side::Buy, 10_050, 300);
/// assert_eq!(order.remaining, 300);
/// assert_eq!(order.side(), Side::Buy);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Default, SimpleSerialize)]
pub struct Order {
    /// Unique order identifier; 0 until the book assigns one
    pub id: u64,

    /// Order side as u8 (0=Buy, 1=Sell)
    pub side_raw: u8,

    /// Limit price in ticks
    pub price: u64,

    /// Original quantity
    pub quantity: u64,

    /// Quantity still resting; decremented by fills
    pub remaining: u64,

    /// Sequence number at which the book accepted the order
    pub entry_time: u64,

    /// Sequence number of the last mutation
    pub event_time: u64,
}

impl Order {
    /// Create a new limit order with nothing filled yet
    pub fn new(id: u64, side: Side, price: u64, quantity: u64) -> Self {
        Self {
            id,
            side_raw: side.to_u8(),
            price,
            quantity,
            remaining: quantity,
            entry_time: 0,
            event_time: 0,
        }
    }

    /// Get the order side
    pub fn side(&self) -> Side {
        Side::from_u8(self.side_raw).unwrap_or(Side::Buy)
    }

    /// Check if the order is fully filled
    pub fn is_filled(&self) -> bool {
        self.remaining == 0
    }

    /// Get the filled quantity
    pub fn filled_quantity(&self) -> u64 {
        self.quantity.saturating_sub(self.remaining)
    }

    /// Fill up to `fill_qty`.
    ///
    /// Returns the quantity actually filled, which is capped at `remaining`.
    pub fn fill(&mut self, fill_qty: u64) -> u64 {
        let actual_fill = fill_qty.min(self.remaining);
        self.remaining -= actual_fill;
        actual_fill
    }

    /// Zero the remaining quantity; returns what was left
    pub fn cancel(&mut self) -> u64 {
        std::mem::take(&mut self.remaining)
    }
}

// ============================================================================
// Unit Tests
// ============================================================================
