//! Order service: placement, lookup and status changes.

use std::time::Instant;

use common::{Money, OrderId, OrderStatus, PageInfo};
use store::{NewOrder, OrderQuery, OrderRecord, Store, StoreTransaction};

use crate::context::RequestContext;
use crate::error::DomainError;
use crate::ledger::StockLedger;
use crate::pricing;

use super::{ListOrders, PlaceOrder, Transition, UpdateOrderStatus};

/// One page of orders.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderPage {
    pub orders: Vec<OrderRecord>,
    pub page: PageInfo,
}

/// Order counts and revenue across all users.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OrderStatistics {
    pub total_orders: u64,
    pub pending_orders: u64,
    pub completed_orders: u64,
    pub cancelled_orders: u64,
    /// Σ total over completed orders.
    pub total_revenue: Money,
    /// Revenue per completed order, rounded half-even. Zero when none.
    pub average_order_value: Money,
}

/// Service for managing orders.
///
/// Placement and cancellation each run in a single store transaction: either
/// every stock movement, order row and cart deletion lands, or none does.
#[derive(Debug, Clone)]
pub struct OrderService<S: Store> {
    store: S,
    ledger: StockLedger,
}

impl<S: Store> OrderService<S> {
    /// Creates a new order service over the given store.
    pub fn new(store: S) -> Self {
        Self {
            store,
            ledger: StockLedger,
        }
    }

    /// Converts the caller's cart into a PENDING order.
    ///
    /// Prices and product names are frozen onto the order lines, stock is
    /// taken for every line and the cart is emptied. Any failure leaves
    /// stock, cart and orders as they were.
    #[tracing::instrument(skip(self, cmd), fields(user_id = %ctx.user_id))]
    pub async fn create_order(
        &self,
        ctx: &RequestContext,
        cmd: PlaceOrder,
    ) -> Result<OrderRecord, DomainError> {
        let started = Instant::now();

        let mut tx = self.store.begin().await?;
        let cart = tx.cart_lines(ctx.user_id).await?;
        if cart.is_empty() {
            tracing::warn!("order placement with empty cart");
            return Err(DomainError::EmptyCart);
        }

        if let Some(short) = cart.iter().find(|line| line.quantity > line.product.stock) {
            tracing::warn!(
                product_id = %short.product.id,
                available = short.product.stock,
                requested = short.quantity,
                "order line exceeds stock"
            );
            return Err(DomainError::InsufficientStock {
                product_id: short.product.id,
                product_name: short.product.name.clone(),
                available: short.product.stock,
                requested: short.quantity,
            });
        }

        let lines = pricing::snapshot_lines(&cart);
        let total = pricing::snapshot_total(&lines)?;

        // The conditional decrement is the authoritative check; the scan above
        // only names the first short line early. Rows are locked in product id
        // order so concurrent placements never wait on each other in a cycle.
        let mut by_product: Vec<_> = lines.iter().collect();
        by_product.sort_by_key(|line| line.product_id);
        for line in by_product {
            self.ledger
                .reserve(&mut tx, line.product_id, &line.product_name, line.quantity)
                .await?;
        }

        let order = tx
            .insert_order(NewOrder {
                user_id: ctx.user_id,
                total,
                status: OrderStatus::Pending,
                notes: cmd.notes,
                lines,
            })
            .await?;
        tx.clear_cart(ctx.user_id).await?;
        tx.commit().await?;

        metrics::counter!("orders_created_total").increment(1);
        metrics::histogram!("order_creation_duration_seconds")
            .record(started.elapsed().as_secs_f64());
        tracing::info!(order_id = %order.id, total = %order.total, "order placed");

        Ok(order)
    }

    /// Loads one of the caller's orders.
    ///
    /// Orders placed by someone else are reported as missing.
    #[tracing::instrument(skip(self))]
    pub async fn get_order(
        &self,
        ctx: &RequestContext,
        order_id: OrderId,
    ) -> Result<OrderRecord, DomainError> {
        let mut tx = self.store.begin().await?;
        tx.order(order_id)
            .await?
            .filter(|order| order.user_id == ctx.user_id)
            .ok_or_else(|| DomainError::not_found("Order", order_id))
    }

    /// Lists the caller's orders, newest first.
    #[tracing::instrument(skip(self))]
    pub async fn list_my_orders(
        &self,
        ctx: &RequestContext,
        params: ListOrders,
    ) -> Result<OrderPage, DomainError> {
        self.list(OrderQuery::for_user(ctx.user_id), params).await
    }

    /// Lists every user's orders, newest first.
    #[tracing::instrument(skip(self))]
    pub async fn list_all_orders(
        &self,
        ctx: &RequestContext,
        params: ListOrders,
    ) -> Result<OrderPage, DomainError> {
        ctx.require_admin()?;
        self.list(OrderQuery::new(), params).await
    }

    async fn list(&self, query: OrderQuery, params: ListOrders) -> Result<OrderPage, DomainError> {
        let mut query = query.page(params.page);
        query.status = params.status;

        let mut tx = self.store.begin().await?;
        let (orders, total) = tx.list_orders(&query).await?;
        Ok(OrderPage {
            orders,
            page: params.page.info(total),
        })
    }

    /// Moves an order to a new status.
    ///
    /// Cancelling an order that is not already cancelled releases the stock
    /// of every line in the same transaction as the status write. The order
    /// row is locked first, so racing cancellations release stock once.
    #[tracing::instrument(skip(self))]
    pub async fn update_status(
        &self,
        ctx: &RequestContext,
        cmd: UpdateOrderStatus,
    ) -> Result<OrderRecord, DomainError> {
        ctx.require_admin()?;

        let mut tx = self.store.begin().await?;
        let order = tx
            .lock_order(cmd.order_id)
            .await?
            .ok_or_else(|| DomainError::not_found("Order", cmd.order_id))?;

        let transition = Transition::plan(order.id, order.status, cmd.status)?;
        if transition.restores_stock() {
            let mut by_product: Vec<_> = order.lines.iter().collect();
            by_product.sort_by_key(|line| line.product_id);
            for line in by_product {
                self.ledger
                    .release(&mut tx, line.product_id, line.quantity)
                    .await?;
            }
        }

        if !tx
            .set_order_status(order.id, cmd.status, cmd.notes)
            .await?
        {
            return Err(DomainError::not_found("Order", order.id));
        }
        let updated = tx
            .order(order.id)
            .await?
            .ok_or_else(|| DomainError::not_found("Order", order.id))?;
        tx.commit().await?;

        if !transition.is_unchanged() {
            metrics::counter!("order_status_updates_total", "status" => cmd.status.as_str())
                .increment(1);
        }
        if transition.restores_stock() {
            metrics::counter!("orders_cancelled_total").increment(1);
        }
        tracing::info!(
            order_id = %updated.id,
            from = %transition.from,
            to = %transition.to,
            "order status updated"
        );

        Ok(updated)
    }

    /// Computes order counts and revenue.
    #[tracing::instrument(skip(self))]
    pub async fn stats(&self, ctx: &RequestContext) -> Result<OrderStatistics, DomainError> {
        ctx.require_admin()?;

        let mut tx = self.store.begin().await?;
        let stats = tx.order_stats().await?;

        Ok(OrderStatistics {
            total_orders: stats.total_orders,
            pending_orders: stats.pending_orders,
            completed_orders: stats.completed_orders,
            cancelled_orders: stats.cancelled_orders,
            total_revenue: stats.total_revenue,
            average_order_value: stats
                .total_revenue
                .div_round_half_even(stats.completed_orders),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cart::{AddToCart, CartService};
    use common::{PageRequest, ProductId, UserId};
    use store::{InMemoryStore, NewProduct};

    struct Fixture {
        store: InMemoryStore,
        carts: CartService<InMemoryStore>,
        orders: OrderService<InMemoryStore>,
    }

    impl Fixture {
        fn new() -> Self {
            let store = InMemoryStore::new();
            Self {
                carts: CartService::new(store.clone()),
                orders: OrderService::new(store.clone()),
                store,
            }
        }

        async fn product(&self, name: &str, cents: i64, stock: u32) -> ProductId {
            let mut tx = self.store.begin().await.unwrap();
            let product = tx
                .insert_product(NewProduct::new(name, Money::from_cents(cents), stock))
                .await
                .unwrap();
            tx.commit().await.unwrap();
            product.id
        }
    }

    fn alice() -> RequestContext {
        RequestContext::user(UserId::new(1))
    }

    fn admin() -> RequestContext {
        RequestContext::admin(UserId::new(99))
    }

    #[tokio::test]
    async fn test_create_order_snapshots_cart() {
        let fx = Fixture::new();
        let widget = fx.product("Widget", 1000, 5).await;
        fx.carts
            .add_item(&alice(), AddToCart::new(widget, 3))
            .await
            .unwrap();

        let order = fx
            .orders
            .create_order(&alice(), PlaceOrder::new().with_notes("ring twice"))
            .await
            .unwrap();

        assert_eq!(order.status, OrderStatus::Pending);
        assert_eq!(order.total, Money::from_cents(3000));
        assert_eq!(order.notes.as_deref(), Some("ring twice"));
        assert_eq!(order.lines.len(), 1);
        assert_eq!(order.lines[0].quantity, 3);
        assert_eq!(order.lines[0].product_name, "Widget");
        assert_eq!(fx.store.stock_of(widget).await, Some(2));
        assert_eq!(fx.store.cart_line_count().await, 0);
    }

    #[tokio::test]
    async fn test_empty_cart_is_rejected() {
        let fx = Fixture::new();
        let err = fx
            .orders
            .create_order(&alice(), PlaceOrder::new())
            .await
            .unwrap_err();
        assert!(matches!(err, DomainError::EmptyCart));
        assert_eq!(fx.store.order_count().await, 0);
    }

    #[tokio::test]
    async fn test_get_order_is_owner_scoped() {
        let fx = Fixture::new();
        let widget = fx.product("Widget", 1000, 5).await;
        fx.carts
            .add_item(&alice(), AddToCart::new(widget, 1))
            .await
            .unwrap();
        let order = fx
            .orders
            .create_order(&alice(), PlaceOrder::new())
            .await
            .unwrap();

        assert_eq!(
            fx.orders.get_order(&alice(), order.id).await.unwrap().id,
            order.id
        );
        let bob = RequestContext::user(UserId::new(2));
        assert!(matches!(
            fx.orders.get_order(&bob, order.id).await,
            Err(DomainError::NotFound { .. })
        ));
    }

    #[tokio::test]
    async fn test_admin_operations_require_admin() {
        let fx = Fixture::new();
        assert!(matches!(
            fx.orders.stats(&alice()).await,
            Err(DomainError::Forbidden)
        ));
        assert!(matches!(
            fx.orders
                .list_all_orders(&alice(), ListOrders::default())
                .await,
            Err(DomainError::Forbidden)
        ));
        assert!(matches!(
            fx.orders
                .update_status(&alice(), UpdateOrderStatus::cancel(OrderId::new(1)))
                .await,
            Err(DomainError::Forbidden)
        ));
    }

    #[tokio::test]
    async fn test_update_unknown_order() {
        let fx = Fixture::new();
        let err = fx
            .orders
            .update_status(&admin(), UpdateOrderStatus::complete(OrderId::new(7)))
            .await
            .unwrap_err();
        assert!(matches!(err, DomainError::NotFound { .. }));
    }

    #[tokio::test]
    async fn test_stats_average_rounds_half_even() {
        let fx = Fixture::new();
        let cheap = fx.product("Cheap", 1, 10).await;
        let mid = fx.product("Mid", 2, 10).await;

        // Completed totals of 1 and 2 cents average to 1.5 cents, which
        // rounds to 2.
        for (product, quantity) in [(cheap, 1), (mid, 1)] {
            fx.carts
                .add_item(&alice(), AddToCart::new(product, quantity))
                .await
                .unwrap();
            let order = fx
                .orders
                .create_order(&alice(), PlaceOrder::new())
                .await
                .unwrap();
            fx.orders
                .update_status(&admin(), UpdateOrderStatus::complete(order.id))
                .await
                .unwrap();
        }

        let stats = fx.orders.stats(&admin()).await.unwrap();
        assert_eq!(stats.completed_orders, 2);
        assert_eq!(stats.total_revenue, Money::from_cents(3));
        assert_eq!(stats.average_order_value, Money::from_cents(2));
    }

    #[tokio::test]
    async fn test_stats_with_no_orders() {
        let fx = Fixture::new();
        let stats = fx.orders.stats(&admin()).await.unwrap();
        assert_eq!(stats.total_orders, 0);
        assert_eq!(stats.average_order_value, Money::zero());
    }

    #[tokio::test]
    async fn test_list_pages() {
        let fx = Fixture::new();
        let widget = fx.product("Widget", 100, 10).await;
        for _ in 0..3 {
            fx.carts
                .add_item(&alice(), AddToCart::new(widget, 1))
                .await
                .unwrap();
            fx.orders
                .create_order(&alice(), PlaceOrder::new())
                .await
                .unwrap();
        }

        let page = PageRequest::new(Some(2), Some(2)).unwrap();
        let result = fx
            .orders
            .list_my_orders(&alice(), ListOrders::new(page))
            .await
            .unwrap();

        assert_eq!(result.orders.len(), 1);
        assert_eq!(result.page.total, 3);
        assert_eq!(result.page.pages, 2);
        assert_eq!(result.orders[0].id, OrderId::new(1));
    }
}
