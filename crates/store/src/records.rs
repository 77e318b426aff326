//! Row types read from and written to the store.

use chrono::{DateTime, Utc};
use common::{CartLineId, Money, OrderId, OrderLineId, OrderStatus, ProductId, UserId};

/// A catalog product as persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProductRecord {
    pub id: ProductId,
    pub name: String,
    pub description: Option<String>,
    pub price: Money,
    pub stock: u32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A product to insert into the catalog.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewProduct {
    pub name: String,
    pub description: Option<String>,
    pub price: Money,
    pub stock: u32,
}

impl NewProduct {
    pub fn new(name: impl Into<String>, price: Money, stock: u32) -> Self {
        Self {
            name: name.into(),
            description: None,
            price,
            stock,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }
}

/// A cart line joined with the product it points at.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CartLineRecord {
    pub id: CartLineId,
    pub user_id: UserId,
    pub quantity: u32,
    pub product: ProductRecord,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// An order line to freeze at placement time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewOrderLine {
    pub product_id: ProductId,
    pub product_name: String,
    pub quantity: u32,
    pub unit_price: Money,
}

/// An order to insert together with its lines.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewOrder {
    pub user_id: UserId,
    pub total: Money,
    pub status: OrderStatus,
    pub notes: Option<String>,
    pub lines: Vec<NewOrderLine>,
}

/// A persisted, immutable order line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderLineRecord {
    pub id: OrderLineId,
    pub order_id: OrderId,
    pub product_id: ProductId,
    pub product_name: String,
    pub quantity: u32,
    pub unit_price: Money,
}

/// A persisted order with its lines.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderRecord {
    pub id: OrderId,
    pub user_id: UserId,
    pub total: Money,
    pub status: OrderStatus,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub lines: Vec<OrderLineRecord>,
}

/// Aggregate counters over all orders.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct OrderStats {
    pub total_orders: u64,
    pub pending_orders: u64,
    pub completed_orders: u64,
    pub cancelled_orders: u64,
    /// Sum of totals over completed orders.
    pub total_revenue: Money,
}

/// Outcome of a conditional stock update.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StockChange {
    /// The update was written; `remaining` is the stock after it.
    Applied { remaining: u32 },

    /// The decrement would have crossed zero. Nothing was written.
    Insufficient { available: u32 },

    /// No such product.
    UnknownProduct,
}
