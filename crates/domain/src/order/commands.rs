//! Order commands.

use common::{OrderId, OrderStatus, PageRequest};

/// Command to turn the caller's cart into an order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PlaceOrder {
    /// Free-form notes stored on the order.
    pub notes: Option<String>,
}

impl PlaceOrder {
    /// Creates a new PlaceOrder command without notes.
    pub fn new() -> Self {
        Self::default()
    }

    /// Attaches notes to the order.
    pub fn with_notes(mut self, notes: impl Into<String>) -> Self {
        self.notes = Some(notes.into());
        self
    }
}

/// Command to move an order to a new status.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpdateOrderStatus {
    pub order_id: OrderId,
    pub status: OrderStatus,

    /// Replaces the stored notes when present.
    pub notes: Option<String>,
}

impl UpdateOrderStatus {
    /// Creates a new UpdateOrderStatus command.
    pub fn new(order_id: OrderId, status: OrderStatus) -> Self {
        Self {
            order_id,
            status,
            notes: None,
        }
    }

    /// Creates a command cancelling the order.
    pub fn cancel(order_id: OrderId) -> Self {
        Self::new(order_id, OrderStatus::Cancelled)
    }

    /// Creates a command completing the order.
    pub fn complete(order_id: OrderId) -> Self {
        Self::new(order_id, OrderStatus::Completed)
    }

    /// Attaches notes that replace the stored ones.
    pub fn with_notes(mut self, notes: impl Into<String>) -> Self {
        self.notes = Some(notes.into());
        self
    }
}

/// Parameters for an order listing.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ListOrders {
    pub page: PageRequest,
    pub status: Option<OrderStatus>,
}

impl ListOrders {
    /// Creates a listing of the given page.
    pub fn new(page: PageRequest) -> Self {
        Self { page, status: None }
    }

    /// Restricts the listing to one status.
    pub fn with_status(mut self, status: OrderStatus) -> Self {
        self.status = Some(status);
        self
    }
}
