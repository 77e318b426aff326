//! Transactional persistence for the catalog, carts and orders.
//!
//! [`Store`] opens transactions; [`StoreTransaction`] is the only way to read
//! or write rows. Two implementations ship: [`InMemoryStore`] for tests and
//! local runs, and [`PostgresStore`] for production.

pub mod error;
pub mod memory;
pub mod postgres;
pub mod query;
pub mod records;
pub mod store;

pub use error::{Result, StoreError};
pub use memory::{InMemoryStore, InMemoryTransaction};
pub use postgres::{PostgresOptions, PostgresStore, PostgresTransaction};
pub use query::OrderQuery;
pub use records::{
    CartLineRecord, NewOrder, NewOrderLine, NewProduct, OrderLineRecord, OrderRecord, OrderStats,
    ProductRecord, StockChange,
};
pub use store::{Store, StoreTransaction};
