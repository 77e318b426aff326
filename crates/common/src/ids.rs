//! Typed row identifiers.
//!
//! Every table uses a `BIGSERIAL` key. Wrapping the raw `i64` keeps a cart
//! line id from being passed where an order id is expected.

use serde::{Deserialize, Serialize};

macro_rules! row_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(i64);

        impl $name {
            /// Wraps a raw key.
            pub const fn new(value: i64) -> Self {
                Self(value)
            }

            /// Returns the raw key.
            pub const fn get(&self) -> i64 {
                self.0
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<i64> for $name {
            fn from(value: i64) -> Self {
                Self(value)
            }
        }

        impl From<$name> for i64 {
            fn from(id: $name) -> Self {
                id.0
            }
        }
    };
}

row_id!(
    /// Identifier of an authenticated user, supplied by the identity layer.
    UserId
);

row_id!(
    /// Identifier of a catalog product.
    ProductId
);

row_id!(
    /// Identifier of a single cart line.
    CartLineId
);

row_id!(
    /// Identifier of a placed order.
    OrderId
);

row_id!(
    /// Identifier of a frozen order line.
    OrderLineId
);
