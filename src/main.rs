//! lob-core demo binary.
//!
//! Seeds a book with a deterministic order stream, cancels and reduces a
//! share of it, validates every index, and logs the resulting top of book.
//!
//! ```bash
//! RUST_LOG=info cargo run --release -- 100000
//! ```

use std::process::ExitCode;
use std::time::Instant;

use lob_core::{BookConfig, Order, OrderBook, Side};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

const DEFAULT_ORDERS: u64 = 10_000;
const MID_PRICE: u64 = 10_000;
const PRICE_BAND: u64 = 200;

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let orders = match std::env::args().nth(1).map(|arg| arg.parse::<u64>()) {
        None => DEFAULT_ORDERS,
        Some(Ok(n)) => n,
        Some(Err(e)) => {
            error!(error = %e, "order count must be an unsigned integer");
            return ExitCode::FAILURE;
        }
    };

    let mut book = OrderBook::with_config(BookConfig {
        order_capacity: orders as usize,
        level_capacity: PRICE_BAND as usize,
        level_queue_capacity: 16,
    });

    let start = Instant::now();
    let mut cancelled = 0u64;
    let mut reduced = 0u64;

    for i in 1..=orders {
        // Bids below the mid, asks above, spread over the band
        let offset = (i * 7_919) % (PRICE_BAND / 2) + 1;
        let (side, price) = if i % 2 == 0 {
            (Side::Buy, MID_PRICE - offset)
        } else {
            (Side::Sell, MID_PRICE + offset)
        };
        let quantity = (i * 31) % 500 + 1;

        if let Err(e) = book.add_order(Order::new(i, side, price, quantity)) {
            error!(order_id = i, error = %e, "add rejected");
            return ExitCode::FAILURE;
        }

        if i % 5 == 0 && book.cancel_order(i - 3).is_ok() {
            cancelled += 1;
        }
        if i % 7 == 0 {
            if let Some(front) = book.front_order(side.opposite()).map(|o| o.id) {
                if book.reduce_order(front, quantity).is_ok() {
                    reduced += 1;
                }
            }
        }
    }
    let elapsed = start.elapsed();

    if let Err(e) = book.validate() {
        error!(error = %e, "book failed validation");
        return ExitCode::FAILURE;
    }

    info!(
        orders,
        cancelled,
        reduced,
        resting = book.order_count(),
        bid_levels = book.bid_levels(),
        ask_levels = book.ask_levels(),
        elapsed = ?elapsed,
        "book built"
    );
    info!(best_bid = ?book.best_bid(), best_ask = ?book.best_ask(), spread = ?book.spread(), "top of book");

    for side in [Side::Buy, Side::Sell] {
        for level in book.depth(side, 5) {
            info!(side = %side, price = level.price, volume = level.volume, orders = level.order_count, "depth");
        }
    }

    match book.compute_state_root() {
        Ok(root) => info!(state_root = %hex::encode(root), "state root"),
        Err(e) => {
            error!(error = %e, "state root failed");
            return ExitCode::FAILURE;
        }
    }

    ExitCode::SUCCESS
}
