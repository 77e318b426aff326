use async_trait::async_trait;
use common::{CartLineId, Money, OrderId, OrderStatus, ProductId, UserId};

use crate::{
    CartLineRecord, NewOrder, NewProduct, OrderQuery, OrderRecord, OrderStats, ProductRecord,
    Result, StockChange,
};

/// Core trait for store implementations.
///
/// A store hands out transactions. Every read and write goes through one, so
/// the caller decides where the atomic boundary sits.
#[async_trait]
pub trait Store: Send + Sync {
    /// The transaction type produced by [`Store::begin`].
    type Tx: StoreTransaction;

    /// Opens a transaction.
    ///
    /// Work done through the transaction becomes visible to others only on
    /// [`StoreTransaction::commit`]. Dropping it without committing, on any
    /// exit path, rolls everything back.
    async fn begin(&self) -> Result<Self::Tx>;
}

/// A single unit of work against the store.
///
/// Implementations must serialise conflicting writes to the same product
/// stock counter: [`StoreTransaction::decrement_stock`] is a conditional
/// update evaluated against the committed value, never a read followed by a
/// blind write.
#[async_trait]
pub trait StoreTransaction: Send {
    // Catalog

    /// Inserts a product.
    async fn insert_product(&mut self, product: NewProduct) -> Result<ProductRecord>;

    /// Fetches a product by id.
    async fn product(&mut self, id: ProductId) -> Result<Option<ProductRecord>>;

    /// Fetches a product and locks its row until the transaction ends.
    ///
    /// Writers that read-modify-write state keyed by a product (such as a
    /// user's cart line for it) take this lock first so they serialise.
    async fn lock_product(&mut self, id: ProductId) -> Result<Option<ProductRecord>>;

    /// Lists every product, ordered by id.
    async fn list_products(&mut self) -> Result<Vec<ProductRecord>>;

    /// Changes a product's list price. Returns false if it does not exist.
    async fn update_product_price(&mut self, id: ProductId, price: Money) -> Result<bool>;

    /// Deletes a product and any cart lines pointing at it.
    ///
    /// Fails with `ProductReferenced` when an order line refers to it.
    /// Returns false if it does not exist.
    async fn delete_product(&mut self, id: ProductId) -> Result<bool>;

    // Stock

    /// Takes `quantity` units if at least that many are available.
    async fn decrement_stock(&mut self, id: ProductId, quantity: u32) -> Result<StockChange>;

    /// Gives back `quantity` units.
    async fn increment_stock(&mut self, id: ProductId, quantity: u32) -> Result<StockChange>;

    // Cart

    /// Returns a user's cart lines, newest first.
    async fn cart_lines(&mut self, user_id: UserId) -> Result<Vec<CartLineRecord>>;

    /// Returns a cart line if it exists and belongs to `user_id`.
    async fn cart_line(
        &mut self,
        user_id: UserId,
        line_id: CartLineId,
    ) -> Result<Option<CartLineRecord>>;

    /// Returns the user's line for a product, locking it for the rest of the
    /// transaction.
    async fn cart_line_for_product(
        &mut self,
        user_id: UserId,
        product_id: ProductId,
    ) -> Result<Option<CartLineRecord>>;

    /// Creates the (user, product) line or overwrites its quantity.
    async fn upsert_cart_line(
        &mut self,
        user_id: UserId,
        product_id: ProductId,
        quantity: u32,
    ) -> Result<CartLineId>;

    /// Sets the quantity of a line owned by `user_id`. Returns false if no
    /// such line.
    async fn update_cart_line(
        &mut self,
        user_id: UserId,
        line_id: CartLineId,
        quantity: u32,
    ) -> Result<bool>;

    /// Deletes a line owned by `user_id`. Returns false if no such line.
    async fn delete_cart_line(&mut self, user_id: UserId, line_id: CartLineId) -> Result<bool>;

    /// Deletes all of a user's lines, returning how many went.
    async fn clear_cart(&mut self, user_id: UserId) -> Result<u64>;

    // Orders

    /// Inserts an order with its lines.
    async fn insert_order(&mut self, order: NewOrder) -> Result<OrderRecord>;

    /// Fetches an order with its lines.
    async fn order(&mut self, id: OrderId) -> Result<Option<OrderRecord>>;

    /// Fetches an order and locks it against concurrent status changes until
    /// the transaction ends.
    async fn lock_order(&mut self, id: OrderId) -> Result<Option<OrderRecord>>;

    /// Writes a status, replacing notes when `notes` is `Some`. Returns false
    /// if the order does not exist.
    async fn set_order_status(
        &mut self,
        id: OrderId,
        status: OrderStatus,
        notes: Option<String>,
    ) -> Result<bool>;

    /// Returns one page of matching orders plus the total match count.
    async fn list_orders(&mut self, query: &OrderQuery) -> Result<(Vec<OrderRecord>, u64)>;

    /// Counts orders per status and sums completed revenue.
    async fn order_stats(&mut self) -> Result<OrderStats>;

    /// Makes every change in this transaction visible, atomically.
    async fn commit(self) -> Result<()>;
}
