//! Shopping cart: at most one line per (user, product).

mod commands;
mod service;

pub use commands::{AddToCart, UpdateCartLine};
pub use service::CartService;

use common::Money;
use store::CartLineRecord;

use crate::error::DomainError;
use crate::pricing;

/// A user's cart with derived totals.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cart {
    /// Lines, newest first.
    pub lines: Vec<CartLineRecord>,
    /// Σ quantity.
    pub item_count: u64,
    /// Σ current unit price × quantity.
    pub total: Money,
}

impl Cart {
    pub(crate) fn from_lines(lines: Vec<CartLineRecord>) -> Result<Self, DomainError> {
        let item_count = lines.iter().map(|line| u64::from(line.quantity)).sum();
        let total = pricing::cart_total(&lines)?;
        Ok(Self {
            lines,
            item_count,
            total,
        })
    }

    /// Returns true if the cart has no lines.
    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }
}
