//! Order status set.

use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// The status of an order in its lifecycle.
///
/// ```text
/// Pending ──► Completed
///    │            │
///    └────────────┴──► Cancelled
/// ```
///
/// Cancelled is the only compensating status: entering it gives the order's
/// stock back to the catalog.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderStatus {
    /// Placed, stock already taken from the catalog.
    #[default]
    Pending,

    /// Fulfilled (terminal).
    Completed,

    /// Cancelled, stock returned (terminal).
    Cancelled,
}

/// Returned when parsing a status string that is not one of the known values.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown order status: {0:?}")]
pub struct UnknownStatus(pub String);

impl OrderStatus {
    pub const ALL: [OrderStatus; 3] = [
        OrderStatus::Pending,
        OrderStatus::Completed,
        OrderStatus::Cancelled,
    ];

    /// Returns true if moving from `self` to `next` is allowed.
    ///
    /// Re-writing the current status is always allowed. Status never moves
    /// backwards except into `Cancelled`.
    pub fn can_transition_to(&self, next: OrderStatus) -> bool {
        match (self, next) {
            (current, next) if *current == next => true,
            (OrderStatus::Pending, _) => true,
            (OrderStatus::Completed, OrderStatus::Cancelled) => true,
            _ => false,
        }
    }

    /// Returns true if moving from `self` to `next` must give stock back.
    pub fn restores_stock_on(&self, next: OrderStatus) -> bool {
        next == OrderStatus::Cancelled && *self != OrderStatus::Cancelled
    }

    /// Returns the persisted/wire name.
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Pending => "PENDING",
            OrderStatus::Completed => "COMPLETED",
            OrderStatus::Cancelled => "CANCELLED",
        }
    }
}

impl std::fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OrderStatus {
    type Err = UnknownStatus;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        OrderStatus::ALL
            .into_iter()
            .find(|status| status.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| UnknownStatus(s.to_string()))
    }
}
