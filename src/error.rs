//! Error types shared by the storage structures and the order book.
//!
//! ## Taxonomy
//!
//! - **Not found**: an operation referenced a key or order id that is not
//!   present. Lookups (`find`, `get`) return `None` instead; only mutating
//!   operations (`delete`, `remove`, `cancel_order`) fail with an error.
//! - **Invalid state**: a node handle no longer refers to a linked node.
//! - **Invariant violation**: produced by the validators only. Seeing one
//!   means a bug in the rebalancing or bookkeeping code.

use thiserror::Error;

/// Errors returned by the tree, the arrival queue and the order book.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Error {
    /// Key is not present in the tree or queue
    #[error("key not found")]
    NotFound,

    /// Order id is not resting in the book
    #[error("order {0} is not resting in the book")]
    OrderNotFound(u64),

    /// Key is already present in the queue
    #[error("key already present")]
    DuplicateKey,

    /// Order id is already resting in the book
    #[error("order {0} is already resting in the book")]
    DuplicateOrder(u64),

    /// Zero quantity on add, or a zero fill
    #[error("invalid quantity {quantity} for order {order_id}")]
    InvalidQuantity {
        /// Order the quantity was given for
        order_id: u64,
        /// The rejected quantity
        quantity: u64,
    },

    /// Raw side byte is neither buy nor sell
    #[error("invalid side {0}")]
    InvalidSide(u8),

    /// Structural precondition violated (stale or detached node handle)
    #[error("invalid state: {0}")]
    InvalidState(&'static str),

    /// A validator found a broken invariant
    #[error("invariant violated: {0}")]
    InvariantViolation(String),

    /// SSZ encoding failed while hashing the book
    #[error("serialization failed: {0}")]
    Serialization(String),
}

impl Error {
    /// True for both the generic and the order-specific not-found forms.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Error::NotFound | Error::OrderNotFound(_))
    }
}

/// Crate-wide result alias.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        assert_eq!(Error::NotFound.to_string(), "key not found");
        assert_eq!(
            Error::OrderNotFound(7).to_string(),
            "order 7 is not resting in the book"
        );
        assert_eq!(
            Error::InvalidQuantity { order_id: 3, quantity: 0 }.to_string(),
            "invalid quantity 0 for order 3"
        );
        assert_eq!(Error::InvalidSide(7).to_string(), "invalid side 7");
        assert_eq!(
            Error::InvalidState("node is not linked").to_string(),
            "invalid state: node is not linked"
        );
    }

    #[test]
    fn test_is_not_found() {
        assert!(Error::NotFound.is_not_found());
        assert!(Error::OrderNotFound(1).is_not_found());
        assert!(!Error::DuplicateKey.is_not_found());
        assert!(!Error::InvalidState("x").is_not_found());
    }
}
