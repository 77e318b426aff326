//! Cart service.

use common::CartLineId;
use store::{CartLineRecord, Store, StoreTransaction};

use crate::context::RequestContext;
use crate::error::DomainError;
use crate::pricing;

use super::commands::validate_quantity;
use super::{AddToCart, Cart, UpdateCartLine};

/// Service for managing the caller's cart.
///
/// Every check against product stock is made inside the same transaction as
/// the write it guards. Lines belonging to another user behave exactly like
/// missing lines.
#[derive(Debug, Clone)]
pub struct CartService<S: Store> {
    store: S,
}

impl<S: Store> CartService<S> {
    /// Creates a new cart service over the given store.
    pub fn new(store: S) -> Self {
        Self { store }
    }

    /// Adds units of a product, merging into any existing line.
    ///
    /// The resulting line quantity, not just the added amount, must be
    /// covered by current stock, and the cart total must stay representable.
    /// The product row is locked first, so concurrent additions of the same
    /// product by one user accumulate instead of overwriting each other.
    #[tracing::instrument(skip(self))]
    pub async fn add_item(
        &self,
        ctx: &RequestContext,
        cmd: AddToCart,
    ) -> Result<CartLineRecord, DomainError> {
        validate_quantity(cmd.quantity)?;

        let mut tx = self.store.begin().await?;
        let product = tx
            .lock_product(cmd.product_id)
            .await?
            .ok_or_else(|| DomainError::not_found("Product", cmd.product_id))?;

        let existing = tx
            .cart_line_for_product(ctx.user_id, cmd.product_id)
            .await?
            .map_or(0, |line| line.quantity);
        let target = existing
            .checked_add(cmd.quantity)
            .ok_or_else(|| DomainError::Validation("quantity is too large".into()))?;

        if target > product.stock {
            tracing::warn!(
                available = product.stock,
                requested = target,
                "cart addition exceeds stock"
            );
            return Err(DomainError::InsufficientStock {
                product_id: product.id,
                product_name: product.name,
                available: product.stock,
                requested: target,
            });
        }

        let others = tx.cart_lines(ctx.user_id).await?;
        pricing::total(
            others
                .iter()
                .filter(|line| line.product.id != product.id)
                .map(|line| (line.product.price, line.quantity))
                .chain([(product.price, target)]),
        )?;

        let line_id = tx
            .upsert_cart_line(ctx.user_id, cmd.product_id, target)
            .await?;
        let line = load_line(&mut tx, ctx, line_id).await?;
        tx.commit().await?;

        metrics::counter!("cart_additions_total").increment(1);
        tracing::info!(line_id = %line_id, quantity = target, "cart line saved");
        Ok(line)
    }

    /// Returns the caller's cart, newest line first.
    #[tracing::instrument(skip(self))]
    pub async fn get_cart(&self, ctx: &RequestContext) -> Result<Cart, DomainError> {
        let mut tx = self.store.begin().await?;
        let lines = tx.cart_lines(ctx.user_id).await?;
        Cart::from_lines(lines)
    }

    /// Returns one of the caller's cart lines.
    #[tracing::instrument(skip(self))]
    pub async fn get_line(
        &self,
        ctx: &RequestContext,
        line_id: CartLineId,
    ) -> Result<CartLineRecord, DomainError> {
        let mut tx = self.store.begin().await?;
        load_line(&mut tx, ctx, line_id).await
    }

    /// Sets the absolute quantity of a line, re-checking stock.
    #[tracing::instrument(skip(self))]
    pub async fn update_line(
        &self,
        ctx: &RequestContext,
        cmd: UpdateCartLine,
    ) -> Result<CartLineRecord, DomainError> {
        validate_quantity(cmd.quantity)?;

        let mut tx = self.store.begin().await?;
        let line = load_line(&mut tx, ctx, cmd.line_id).await?;
        if cmd.quantity > line.product.stock {
            tracing::warn!(
                available = line.product.stock,
                requested = cmd.quantity,
                "cart update exceeds stock"
            );
            return Err(DomainError::InsufficientStock {
                product_id: line.product.id,
                product_name: line.product.name,
                available: line.product.stock,
                requested: cmd.quantity,
            });
        }

        let others = tx.cart_lines(ctx.user_id).await?;
        pricing::total(
            others
                .iter()
                .filter(|other| other.id != line.id)
                .map(|other| (other.product.price, other.quantity))
                .chain([(line.product.price, cmd.quantity)]),
        )?;

        if !tx
            .update_cart_line(ctx.user_id, cmd.line_id, cmd.quantity)
            .await?
        {
            return Err(DomainError::not_found("Cart line", cmd.line_id));
        }
        let line = load_line(&mut tx, ctx, cmd.line_id).await?;
        tx.commit().await?;

        Ok(line)
    }

    /// Removes one of the caller's lines.
    #[tracing::instrument(skip(self))]
    pub async fn remove_line(
        &self,
        ctx: &RequestContext,
        line_id: CartLineId,
    ) -> Result<(), DomainError> {
        let mut tx = self.store.begin().await?;
        if !tx.delete_cart_line(ctx.user_id, line_id).await? {
            return Err(DomainError::not_found("Cart line", line_id));
        }
        tx.commit().await?;
        Ok(())
    }

    /// Removes all of the caller's lines, returning how many were removed.
    #[tracing::instrument(skip(self))]
    pub async fn clear(&self, ctx: &RequestContext) -> Result<u64, DomainError> {
        let mut tx = self.store.begin().await?;
        let removed = tx.clear_cart(ctx.user_id).await?;
        tx.commit().await?;
        Ok(removed)
    }
}

async fn load_line<T: StoreTransaction>(
    tx: &mut T,
    ctx: &RequestContext,
    line_id: CartLineId,
) -> Result<CartLineRecord, DomainError> {
    tx.cart_line(ctx.user_id, line_id)
        .await?
        .ok_or_else(|| DomainError::not_found("Cart line", line_id))
}

#[cfg(test)]
mod tests {
    use super::*;
    use common::{Money, ProductId, UserId};
    use store::{InMemoryStore, NewProduct};

    async fn setup(stock: u32) -> (CartService<InMemoryStore>, InMemoryStore, ProductId) {
        let store = InMemoryStore::new();
        let mut tx = store.begin().await.unwrap();
        let product = tx
            .insert_product(NewProduct::new("Widget", Money::from_cents(1000), stock))
            .await
            .unwrap();
        tx.commit().await.unwrap();
        (CartService::new(store.clone()), store, product.id)
    }

    fn alice() -> RequestContext {
        RequestContext::user(UserId::new(1))
    }

    #[tokio::test]
    async fn test_add_merges_quantities() {
        let (service, _, product_id) = setup(5).await;

        service
            .add_item(&alice(), AddToCart::new(product_id, 2))
            .await
            .unwrap();
        let line = service
            .add_item(&alice(), AddToCart::new(product_id, 3))
            .await
            .unwrap();

        assert_eq!(line.quantity, 5);
        let cart = service.get_cart(&alice()).await.unwrap();
        assert_eq!(cart.lines.len(), 1);
        assert_eq!(cart.item_count, 5);
        assert_eq!(cart.total, Money::from_cents(5000));
    }

    #[tokio::test]
    async fn test_cumulative_add_over_stock_changes_nothing() {
        let (service, store, product_id) = setup(5).await;
        service
            .add_item(&alice(), AddToCart::new(product_id, 3))
            .await
            .unwrap();

        let err = service
            .add_item(&alice(), AddToCart::new(product_id, 3))
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            DomainError::InsufficientStock {
                available: 5,
                requested: 6,
                ..
            }
        ));
        let cart = service.get_cart(&alice()).await.unwrap();
        assert_eq!(cart.lines[0].quantity, 3);
        assert_eq!(store.stock_of(product_id).await, Some(5));
    }

    #[tokio::test]
    async fn test_add_unknown_product() {
        let (service, _, _) = setup(5).await;
        let err = service
            .add_item(&alice(), AddToCart::new(ProductId::new(99), 1))
            .await
            .unwrap_err();
        assert!(matches!(err, DomainError::NotFound { .. }));
    }

    #[tokio::test]
    async fn test_zero_quantity_is_rejected() {
        let (service, _, product_id) = setup(5).await;
        let err = service
            .add_item(&alice(), AddToCart::new(product_id, 0))
            .await
            .unwrap_err();
        assert!(matches!(err, DomainError::Validation(_)));
    }

    #[tokio::test]
    async fn test_update_revalidates_absolute_quantity() {
        let (service, _, product_id) = setup(5).await;
        let line = service
            .add_item(&alice(), AddToCart::new(product_id, 1))
            .await
            .unwrap();

        let updated = service
            .update_line(&alice(), UpdateCartLine::new(line.id, 5))
            .await
            .unwrap();
        assert_eq!(updated.quantity, 5);

        let err = service
            .update_line(&alice(), UpdateCartLine::new(line.id, 6))
            .await
            .unwrap_err();
        assert!(matches!(err, DomainError::InsufficientStock { .. }));
    }

    #[tokio::test]
    async fn test_unrepresentable_total_is_rejected_before_write() {
        let store = InMemoryStore::new();
        let mut tx = store.begin().await.unwrap();
        let price = "50000000000000000.00".parse().unwrap();
        let product = tx
            .insert_product(NewProduct::new("Yacht", price, 5))
            .await
            .unwrap();
        tx.commit().await.unwrap();
        let service = CartService::new(store.clone());

        let err = service
            .add_item(&alice(), AddToCart::new(product.id, 2))
            .await
            .unwrap_err();
        assert!(matches!(err, DomainError::Validation(_)));
        assert_eq!(store.cart_line_count().await, 0);

        let line = service
            .add_item(&alice(), AddToCart::new(product.id, 1))
            .await
            .unwrap();
        let err = service
            .update_line(&alice(), UpdateCartLine::new(line.id, 2))
            .await
            .unwrap_err();
        assert!(matches!(err, DomainError::Validation(_)));
        assert_eq!(service.get_line(&alice(), line.id).await.unwrap().quantity, 1);
    }

    #[tokio::test]
    async fn test_foreign_lines_look_missing() {
        let (service, _, product_id) = setup(5).await;
        let line = service
            .add_item(&alice(), AddToCart::new(product_id, 1))
            .await
            .unwrap();
        let bob = RequestContext::user(UserId::new(2));

        assert!(matches!(
            service.get_line(&bob, line.id).await,
            Err(DomainError::NotFound { .. })
        ));
        assert!(matches!(
            service
                .update_line(&bob, UpdateCartLine::new(line.id, 1))
                .await,
            Err(DomainError::NotFound { .. })
        ));
        assert!(matches!(
            service.remove_line(&bob, line.id).await,
            Err(DomainError::NotFound { .. })
        ));
        assert_eq!(service.get_line(&alice(), line.id).await.unwrap().quantity, 1);
    }

    #[tokio::test]
    async fn test_remove_and_clear() {
        let (service, store, product_id) = setup(5).await;
        let line = service
            .add_item(&alice(), AddToCart::new(product_id, 1))
            .await
            .unwrap();

        service.remove_line(&alice(), line.id).await.unwrap();
        assert!(matches!(
            service.remove_line(&alice(), line.id).await,
            Err(DomainError::NotFound { .. })
        ));

        service
            .add_item(&alice(), AddToCart::new(product_id, 2))
            .await
            .unwrap();
        assert_eq!(service.clear(&alice()).await.unwrap(), 1);
        assert_eq!(store.cart_line_count().await, 0);
    }
}
