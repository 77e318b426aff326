//! Pricing snapshot: order lines freeze the product price and name they were
//! placed at.
//!
//! Every total is computed with checked arithmetic. A total that does not fit
//! is a validation error, raised before anything is written.

use common::Money;
use store::{CartLineRecord, NewOrderLine};

use crate::error::DomainError;

/// Freezes each cart line's current unit price and product name.
pub fn snapshot_lines(lines: &[CartLineRecord]) -> Vec<NewOrderLine> {
    lines
        .iter()
        .map(|line| NewOrderLine {
            product_id: line.product.id,
            product_name: line.product.name.clone(),
            quantity: line.quantity,
            unit_price: line.product.price,
        })
        .collect()
}

fn out_of_range() -> DomainError {
    DomainError::Validation("amount exceeds the supported range".into())
}

/// Unit price × quantity.
pub fn line_total(unit_price: Money, quantity: u32) -> Result<Money, DomainError> {
    unit_price.checked_mul(quantity).ok_or_else(out_of_range)
}

/// Σ unit price × quantity over `(unit price, quantity)` pairs.
pub fn total<I>(lines: I) -> Result<Money, DomainError>
where
    I: IntoIterator<Item = (Money, u32)>,
{
    lines
        .into_iter()
        .try_fold(Money::zero(), |acc, (unit_price, quantity)| {
            acc.checked_add(line_total(unit_price, quantity)?)
                .ok_or_else(out_of_range)
        })
}

/// Σ unit price × quantity over frozen lines.
pub fn snapshot_total(lines: &[NewOrderLine]) -> Result<Money, DomainError> {
    total(lines.iter().map(|line| (line.unit_price, line.quantity)))
}

/// Σ current price × quantity over cart lines.
pub fn cart_total(lines: &[CartLineRecord]) -> Result<Money, DomainError> {
    total(lines.iter().map(|line| (line.product.price, line.quantity)))
}
