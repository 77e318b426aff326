//! Order status state machine.
//!
//! ```text
//! PENDING ──► COMPLETED ──► CANCELLED
//!    │                         ▲
//!    └─────────────────────────┘
//! ```
//!
//! Entering CANCELLED from any other status gives every line's stock back.

use common::{OrderId, OrderStatus};

use crate::error::DomainError;

/// A validated status change.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Transition {
    pub from: OrderStatus,
    pub to: OrderStatus,
}

impl Transition {
    /// Validates moving `order_id` from `from` to `to`.
    pub fn plan(order_id: OrderId, from: OrderStatus, to: OrderStatus) -> Result<Self, DomainError> {
        if !from.can_transition_to(to) {
            return Err(DomainError::Conflict(format!(
                "order {order_id} cannot move from {from} to {to}"
            )));
        }
        Ok(Self { from, to })
    }

    /// Returns true if applying this transition must release the order's
    /// stock. A second cancellation never does.
    pub fn restores_stock(&self) -> bool {
        self.from.restores_stock_on(self.to)
    }

    /// Returns true if the status does not change.
    pub fn is_unchanged(&self) -> bool {
        self.from == self.to
    }
}
