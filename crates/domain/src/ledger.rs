//! Stock ledger: the only code path that changes `Product.stock`.

use common::ProductId;
use store::{StockChange, StoreTransaction};

use crate::error::DomainError;

/// Reserves and releases product stock inside a caller's transaction.
///
/// Every check is made by the store against the value the transaction will
/// commit over, so a reservation that succeeds here cannot oversell once the
/// transaction commits.
#[derive(Debug, Clone, Copy, Default)]
pub struct StockLedger;

impl StockLedger {
    /// Takes `quantity` units of a product, returning the stock left.
    ///
    /// Writes nothing when fewer than `quantity` units are available.
    #[tracing::instrument(skip(self, tx))]
    pub async fn reserve<T: StoreTransaction>(
        &self,
        tx: &mut T,
        product_id: ProductId,
        product_name: &str,
        quantity: u32,
    ) -> Result<u32, DomainError> {
        match tx.decrement_stock(product_id, quantity).await? {
            StockChange::Applied { remaining } => Ok(remaining),
            StockChange::Insufficient { available } => {
                metrics::counter!("stock_reservations_rejected_total").increment(1);
                tracing::warn!(available, "stock reservation rejected");
                Err(DomainError::InsufficientStock {
                    product_id,
                    product_name: product_name.to_string(),
                    available,
                    requested: quantity,
                })
            }
            StockChange::UnknownProduct => Err(DomainError::not_found("Product", product_id)),
        }
    }

    /// Gives `quantity` units back to a product.
    #[tracing::instrument(skip(self, tx))]
    pub async fn release<T: StoreTransaction>(
        &self,
        tx: &mut T,
        product_id: ProductId,
        quantity: u32,
    ) -> Result<u32, DomainError> {
        match tx.increment_stock(product_id, quantity).await? {
            StockChange::Applied { remaining } => {
                metrics::counter!("stock_released_units_total").increment(u64::from(quantity));
                Ok(remaining)
            }
            // Products referenced by order lines cannot be deleted, so a
            // release always finds its product.
            StockChange::Insufficient { .. } | StockChange::UnknownProduct => {
                Err(DomainError::not_found("Product", product_id))
            }
        }
    }
}
