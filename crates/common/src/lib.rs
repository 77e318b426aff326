//! Shared types for the commerce backend.
//!
//! Everything here is plain data: typed row identifiers, fixed-point
//! [`Money`], the [`OrderStatus`] state set and pagination parameters.

pub mod ids;
pub mod money;
pub mod pagination;
pub mod status;

pub use ids::{CartLineId, OrderId, OrderLineId, ProductId, UserId};
pub use money::{Money, MoneyParseError};
pub use pagination::{PageInfo, PageRequest, PaginationError};
pub use status::{OrderStatus, UnknownStatus};
