//! Cart commands.

use common::{CartLineId, ProductId};

use crate::error::DomainError;

/// Command to add units of a product to the caller's cart.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AddToCart {
    pub product_id: ProductId,

    /// Units to add on top of any already in the cart.
    pub quantity: u32,
}

impl AddToCart {
    /// Creates a new AddToCart command.
    pub fn new(product_id: ProductId, quantity: u32) -> Self {
        Self {
            product_id,
            quantity,
        }
    }
}

/// Command to set the absolute quantity of one of the caller's lines.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UpdateCartLine {
    pub line_id: CartLineId,
    pub quantity: u32,
}

impl UpdateCartLine {
    /// Creates a new UpdateCartLine command.
    pub fn new(line_id: CartLineId, quantity: u32) -> Self {
        Self { line_id, quantity }
    }
}

pub(crate) fn validate_quantity(quantity: u32) -> Result<(), DomainError> {
    if quantity == 0 {
        return Err(DomainError::Validation(
            "quantity must be at least 1".into(),
        ));
    }
    Ok(())
}
