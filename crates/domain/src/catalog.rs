//! Minimal product catalog.

use common::{Money, ProductId};
use store::{NewProduct, ProductRecord, Store, StoreError, StoreTransaction};

use crate::context::RequestContext;
use crate::error::DomainError;

/// Service for reading and maintaining catalog products.
///
/// Stock is set once at creation; afterwards it only moves through the
/// [`StockLedger`](crate::StockLedger).
#[derive(Debug, Clone)]
pub struct CatalogService<S: Store> {
    store: S,
}

impl<S: Store> CatalogService<S> {
    /// Creates a new catalog service over the given store.
    pub fn new(store: S) -> Self {
        Self { store }
    }

    /// Lists all products, ordered by id.
    #[tracing::instrument(skip(self))]
    pub async fn list_products(&self) -> Result<Vec<ProductRecord>, DomainError> {
        let mut tx = self.store.begin().await?;
        Ok(tx.list_products().await?)
    }

    /// Loads a product by id.
    #[tracing::instrument(skip(self))]
    pub async fn get_product(&self, id: ProductId) -> Result<ProductRecord, DomainError> {
        let mut tx = self.store.begin().await?;
        tx.product(id)
            .await?
            .ok_or_else(|| DomainError::not_found("Product", id))
    }

    /// Adds a product to the catalog.
    #[tracing::instrument(skip(self, product), fields(name = %product.name))]
    pub async fn create_product(
        &self,
        ctx: &RequestContext,
        product: NewProduct,
    ) -> Result<ProductRecord, DomainError> {
        ctx.require_admin()?;
        if product.name.trim().is_empty() {
            return Err(DomainError::Validation("product name is required".into()));
        }
        if product.price.is_negative() {
            return Err(DomainError::Validation(
                "product price must not be negative".into(),
            ));
        }

        let mut tx = self.store.begin().await?;
        let record = tx.insert_product(product).await?;
        tx.commit().await?;

        tracing::info!(product_id = %record.id, "product created");
        Ok(record)
    }

    /// Changes the list price of a product. Placed orders keep their price.
    #[tracing::instrument(skip(self))]
    pub async fn update_price(
        &self,
        ctx: &RequestContext,
        id: ProductId,
        price: Money,
    ) -> Result<ProductRecord, DomainError> {
        ctx.require_admin()?;
        if price.is_negative() {
            return Err(DomainError::Validation(
                "product price must not be negative".into(),
            ));
        }

        let mut tx = self.store.begin().await?;
        if !tx.update_product_price(id, price).await? {
            return Err(DomainError::not_found("Product", id));
        }
        let record = tx
            .product(id)
            .await?
            .ok_or_else(|| DomainError::not_found("Product", id))?;
        tx.commit().await?;

        Ok(record)
    }

    /// Removes a product and any cart lines holding it.
    ///
    /// Products that appear on an order line cannot be deleted.
    #[tracing::instrument(skip(self))]
    pub async fn delete_product(
        &self,
        ctx: &RequestContext,
        id: ProductId,
    ) -> Result<(), DomainError> {
        ctx.require_admin()?;

        let mut tx = self.store.begin().await?;
        let deleted = tx.delete_product(id).await.map_err(|err| match err {
            StoreError::ProductReferenced(id) => {
                DomainError::Conflict(format!("product {id} is referenced by existing orders"))
            }
            other => other.into(),
        })?;
        if !deleted {
            return Err(DomainError::not_found("Product", id));
        }
        tx.commit().await?;

        tracing::info!(product_id = %id, "product deleted");
        Ok(())
    }
}
