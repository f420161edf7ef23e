//! Implementation of the stock and revenue ledger

use serde::{Deserialize, Serialize};
use vending_core::Money;

use crate::error::Error;

/// Stock and revenue of the machine
///
/// The ledger itself is not synchronized; the [`Machine`](crate::Machine)
/// keeps it behind a single lock so that checking and decrementing the stock
/// happen in one critical section.
#[derive(Clone, Debug)]
pub struct Ledger {
    /// Remaining sellable items
    stock: u32,
    /// Items sold so far
    sold: u32,
    /// Money collected from successful purchases
    revenue: Money,
}

/// Point-in-time view of the ledger
#[derive(Clone, Copy, PartialEq, Eq, Debug, Deserialize, Serialize)]
pub struct Stats {
    /// Price of a single item
    pub price: Money,
    /// Remaining sellable items
    pub stock: u32,
    /// Items sold so far
    pub sold: u32,
    /// Money collected from successful purchases
    pub revenue: Money,
}

impl Ledger {
    /// Create a new [`Ledger`] holding `stock` items and no revenue.
    pub fn new(stock: u32) -> Self {
        Self {
            stock,
            sold: 0,
            revenue: 0,
        }
    }

    /// Get the number of remaining items.
    pub fn stock(&self) -> u32 {
        self.stock
    }

    /// Get the accumulated revenue.
    pub fn revenue(&self) -> Money {
        self.revenue
    }

    /// Sell a single item for `price`.
    ///
    /// Returns `false` without touching the ledger if the stock is exhausted.
    /// The ledger is left untouched as well if the revenue would overflow.
    pub fn sell(&mut self, price: Money) -> Result<bool, Error> {
        if self.stock == 0 {
            return Ok(false);
        }
        let revenue = self
            .revenue
            .checked_add(price)
            .ok_or(Error::RevenueOverflow)?;
        self.stock -= 1;
        self.sold += 1;
        self.revenue = revenue;
        Ok(true)
    }

    /// Take a snapshot for reporting.
    pub fn stats(&self, price: Money) -> Stats {
        Stats {
            price,
            stock: self.stock,
            sold: self.sold,
            revenue: self.revenue,
        }
    }
}
