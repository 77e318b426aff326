//! Domain layer for the commerce backend.
//!
//! This crate provides the stock-consistent order lifecycle:
//! - StockLedger, the only writer of product stock
//! - CartService for the per-user cart
//! - OrderService for placement, status changes and statistics
//! - CatalogService, a thin product catalog
//!
//! Every operation takes a [`RequestContext`] naming the caller.

pub mod cart;
pub mod catalog;
pub mod context;
pub mod error;
pub mod ledger;
pub mod order;
pub mod pricing;

pub use cart::{AddToCart, Cart, CartService, UpdateCartLine};
pub use catalog::CatalogService;
pub use context::RequestContext;
pub use error::DomainError;
pub use ledger::StockLedger;
pub use order::{
    ListOrders, OrderPage, OrderService, OrderStatistics, PlaceOrder, Transition,
    UpdateOrderStatus,
};
