//! Order placement and lifecycle.

mod commands;
mod lifecycle;
mod service;

pub use commands::{ListOrders, PlaceOrder, UpdateOrderStatus};
pub use lifecycle::Transition;
pub use service::{OrderPage, OrderService, OrderStatistics};
