use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use common::{CartLineId, Money, OrderId, OrderLineId, OrderStatus, ProductId, UserId};
use tokio::sync::{Mutex, OwnedMutexGuard};

use crate::{
    CartLineRecord, NewOrder, NewProduct, OrderLineRecord, OrderQuery, OrderRecord, OrderStats,
    ProductRecord, Result, StockChange, StoreError,
    store::{Store, StoreTransaction},
};

#[derive(Debug, Clone)]
struct StoredCartLine {
    id: CartLineId,
    user_id: UserId,
    product_id: ProductId,
    quantity: u32,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default)]
struct MemoryState {
    products: BTreeMap<ProductId, ProductRecord>,
    cart_lines: BTreeMap<CartLineId, StoredCartLine>,
    orders: BTreeMap<OrderId, OrderRecord>,
    next_product_id: i64,
    next_cart_line_id: i64,
    next_order_id: i64,
    next_order_line_id: i64,
}

impl MemoryState {
    fn next_id(counter: &mut i64) -> i64 {
        *counter += 1;
        *counter
    }

    fn join_cart_line(&self, line: &StoredCartLine) -> Option<CartLineRecord> {
        let product = self.products.get(&line.product_id)?.clone();
        Some(CartLineRecord {
            id: line.id,
            user_id: line.user_id,
            quantity: line.quantity,
            product,
            created_at: line.created_at,
            updated_at: line.updated_at,
        })
    }
}

/// In-memory store implementation for testing and local runs.
///
/// A transaction holds the store's single lock from `begin` until it is
/// committed or dropped, so transactions are fully serialised. Writes go to a
/// private copy of the state which replaces the shared state on commit.
#[derive(Debug, Clone, Default)]
pub struct InMemoryStore {
    state: Arc<Mutex<MemoryState>>,
    fail_on_commit: Arc<AtomicBool>,
}

impl InMemoryStore {
    /// Creates a new empty in-memory store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every subsequent commit fail until reset.
    pub fn set_fail_on_commit(&self, fail: bool) {
        self.fail_on_commit.store(fail, Ordering::SeqCst);
    }

    /// Returns the committed stock of a product.
    pub async fn stock_of(&self, id: ProductId) -> Option<u32> {
        self.state.lock().await.products.get(&id).map(|p| p.stock)
    }

    /// Returns the number of committed orders.
    pub async fn order_count(&self) -> usize {
        self.state.lock().await.orders.len()
    }

    /// Returns the number of committed cart lines across all users.
    pub async fn cart_line_count(&self) -> usize {
        self.state.lock().await.cart_lines.len()
    }
}

#[async_trait]
impl Store for InMemoryStore {
    type Tx = InMemoryTransaction;

    async fn begin(&self) -> Result<Self::Tx> {
        let guard = self.state.clone().lock_owned().await;
        let working = guard.clone();
        Ok(InMemoryTransaction {
            guard,
            working,
            fail_on_commit: self.fail_on_commit.load(Ordering::SeqCst),
        })
    }
}

/// Transaction over an [`InMemoryStore`].
pub struct InMemoryTransaction {
    guard: OwnedMutexGuard<MemoryState>,
    working: MemoryState,
    fail_on_commit: bool,
}

impl std::fmt::Debug for InMemoryTransaction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InMemoryTransaction")
            .field("fail_on_commit", &self.fail_on_commit)
            .finish_non_exhaustive()
    }
}

impl InMemoryTransaction {
    fn change_stock(&mut self, id: ProductId, delta: i64) -> Result<StockChange> {
        let Some(product) = self.working.products.get_mut(&id) else {
            return Ok(StockChange::UnknownProduct);
        };
        let next = i64::from(product.stock) + delta;
        if next < 0 {
            return Ok(StockChange::Insufficient {
                available: product.stock,
            });
        }
        let remaining = u32::try_from(next).map_err(|_| {
            StoreError::OutOfRange(format!("stock of product {id} exceeds {}", u32::MAX))
        })?;
        product.stock = remaining;
        product.updated_at = Utc::now();
        Ok(StockChange::Applied { remaining })
    }

    fn owned_line_mut(
        &mut self,
        user_id: UserId,
        line_id: CartLineId,
    ) -> Option<&mut StoredCartLine> {
        self.working
            .cart_lines
            .get_mut(&line_id)
            .filter(|line| line.user_id == user_id)
    }
}

#[async_trait]
impl StoreTransaction for InMemoryTransaction {
    async fn insert_product(&mut self, product: NewProduct) -> Result<ProductRecord> {
        let id = ProductId::new(MemoryState::next_id(&mut self.working.next_product_id));
        let now = Utc::now();
        let record = ProductRecord {
            id,
            name: product.name,
            description: product.description,
            price: product.price,
            stock: product.stock,
            created_at: now,
            updated_at: now,
        };
        self.working.products.insert(id, record.clone());
        Ok(record)
    }

    async fn product(&mut self, id: ProductId) -> Result<Option<ProductRecord>> {
        Ok(self.working.products.get(&id).cloned())
    }

    async fn lock_product(&mut self, id: ProductId) -> Result<Option<ProductRecord>> {
        // The whole store is already locked by this transaction.
        self.product(id).await
    }

    async fn list_products(&mut self) -> Result<Vec<ProductRecord>> {
        Ok(self.working.products.values().cloned().collect())
    }

    async fn update_product_price(&mut self, id: ProductId, price: Money) -> Result<bool> {
        match self.working.products.get_mut(&id) {
            Some(product) => {
                product.price = price;
                product.updated_at = Utc::now();
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn delete_product(&mut self, id: ProductId) -> Result<bool> {
        let referenced = self
            .working
            .orders
            .values()
            .flat_map(|order| order.lines.iter())
            .any(|line| line.product_id == id);
        if referenced {
            return Err(StoreError::ProductReferenced(id));
        }
        if self.working.products.remove(&id).is_none() {
            return Ok(false);
        }
        self.working
            .cart_lines
            .retain(|_, line| line.product_id != id);
        Ok(true)
    }

    async fn decrement_stock(&mut self, id: ProductId, quantity: u32) -> Result<StockChange> {
        self.change_stock(id, -i64::from(quantity))
    }

    async fn increment_stock(&mut self, id: ProductId, quantity: u32) -> Result<StockChange> {
        self.change_stock(id, i64::from(quantity))
    }

    async fn cart_lines(&mut self, user_id: UserId) -> Result<Vec<CartLineRecord>> {
        let state = &self.working;
        Ok(state
            .cart_lines
            .values()
            .rev()
            .filter(|line| line.user_id == user_id)
            .filter_map(|line| state.join_cart_line(line))
            .collect())
    }

    async fn cart_line(
        &mut self,
        user_id: UserId,
        line_id: CartLineId,
    ) -> Result<Option<CartLineRecord>> {
        let state = &self.working;
        Ok(state
            .cart_lines
            .get(&line_id)
            .filter(|line| line.user_id == user_id)
            .and_then(|line| state.join_cart_line(line)))
    }

    async fn cart_line_for_product(
        &mut self,
        user_id: UserId,
        product_id: ProductId,
    ) -> Result<Option<CartLineRecord>> {
        let state = &self.working;
        Ok(state
            .cart_lines
            .values()
            .find(|line| line.user_id == user_id && line.product_id == product_id)
            .and_then(|line| state.join_cart_line(line)))
    }

    async fn upsert_cart_line(
        &mut self,
        user_id: UserId,
        product_id: ProductId,
        quantity: u32,
    ) -> Result<CartLineId> {
        let now = Utc::now();
        if let Some(line) = self
            .working
            .cart_lines
            .values_mut()
            .find(|line| line.user_id == user_id && line.product_id == product_id)
        {
            line.quantity = quantity;
            line.updated_at = now;
            return Ok(line.id);
        }

        let id = CartLineId::new(MemoryState::next_id(&mut self.working.next_cart_line_id));
        self.working.cart_lines.insert(
            id,
            StoredCartLine {
                id,
                user_id,
                product_id,
                quantity,
                created_at: now,
                updated_at: now,
            },
        );
        Ok(id)
    }

    async fn update_cart_line(
        &mut self,
        user_id: UserId,
        line_id: CartLineId,
        quantity: u32,
    ) -> Result<bool> {
        match self.owned_line_mut(user_id, line_id) {
            Some(line) => {
                line.quantity = quantity;
                line.updated_at = Utc::now();
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn delete_cart_line(&mut self, user_id: UserId, line_id: CartLineId) -> Result<bool> {
        if self.owned_line_mut(user_id, line_id).is_none() {
            return Ok(false);
        }
        Ok(self.working.cart_lines.remove(&line_id).is_some())
    }

    async fn clear_cart(&mut self, user_id: UserId) -> Result<u64> {
        let before = self.working.cart_lines.len();
        self.working
            .cart_lines
            .retain(|_, line| line.user_id != user_id);
        Ok((before - self.working.cart_lines.len()) as u64)
    }

    async fn insert_order(&mut self, order: NewOrder) -> Result<OrderRecord> {
        let id = OrderId::new(MemoryState::next_id(&mut self.working.next_order_id));
        let now = Utc::now();
        let mut lines = Vec::with_capacity(order.lines.len());
        for line in order.lines {
            lines.push(OrderLineRecord {
                id: OrderLineId::new(MemoryState::next_id(
                    &mut self.working.next_order_line_id,
                )),
                order_id: id,
                product_id: line.product_id,
                product_name: line.product_name,
                quantity: line.quantity,
                unit_price: line.unit_price,
            });
        }
        let record = OrderRecord {
            id,
            user_id: order.user_id,
            total: order.total,
            status: order.status,
            notes: order.notes,
            created_at: now,
            updated_at: now,
            lines,
        };
        self.working.orders.insert(id, record.clone());
        Ok(record)
    }

    async fn order(&mut self, id: OrderId) -> Result<Option<OrderRecord>> {
        Ok(self.working.orders.get(&id).cloned())
    }

    async fn lock_order(&mut self, id: OrderId) -> Result<Option<OrderRecord>> {
        // The whole store is already locked by this transaction.
        self.order(id).await
    }

    async fn set_order_status(
        &mut self,
        id: OrderId,
        status: OrderStatus,
        notes: Option<String>,
    ) -> Result<bool> {
        let Some(order) = self.working.orders.get_mut(&id) else {
            return Ok(false);
        };
        order.status = status;
        if notes.is_some() {
            order.notes = notes;
        }
        order.updated_at = Utc::now();
        Ok(true)
    }

    async fn list_orders(&mut self, query: &OrderQuery) -> Result<(Vec<OrderRecord>, u64)> {
        let matching: Vec<&OrderRecord> = self
            .working
            .orders
            .values()
            .rev()
            .filter(|order| query.matches(order.user_id, order.status))
            .collect();
        let total = matching.len() as u64;

        let offset = usize::try_from(query.offset.unwrap_or(0)).unwrap_or(usize::MAX);
        let limit = query
            .limit
            .map_or(usize::MAX, |l| usize::try_from(l).unwrap_or(usize::MAX));
        let page = matching
            .into_iter()
            .skip(offset)
            .take(limit)
            .cloned()
            .collect();

        Ok((page, total))
    }

    async fn order_stats(&mut self) -> Result<OrderStats> {
        let mut stats = OrderStats::default();
        for order in self.working.orders.values() {
            stats.total_orders += 1;
            match order.status {
                OrderStatus::Pending => stats.pending_orders += 1,
                OrderStatus::Completed => {
                    stats.completed_orders += 1;
                    stats.total_revenue = stats
                        .total_revenue
                        .checked_add(order.total)
                        .ok_or_else(|| StoreError::OutOfRange("total revenue".into()))?;
                }
                OrderStatus::Cancelled => stats.cancelled_orders += 1,
            }
        }
        Ok(stats)
    }

    async fn commit(self) -> Result<()> {
        let Self {
            mut guard,
            working,
            fail_on_commit,
        } = self;
        if fail_on_commit {
            return Err(StoreError::Unavailable("commit rejected".to_string()));
        }
        *guard = working;
        Ok(())
    }
}
