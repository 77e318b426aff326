//! Integration tests for the cart-to-order lifecycle.
//!
//! These tests drive the services against the in-memory store and check the
//! stock, cart and order tables after every step.

use std::sync::Arc;

use common::{Money, OrderStatus, ProductId, UserId};
use domain::{
    AddToCart, CartService, CatalogService, DomainError, ListOrders, OrderService, PlaceOrder,
    RequestContext, UpdateOrderStatus,
};
use store::{InMemoryStore, NewProduct, StoreError};

struct Shop {
    store: InMemoryStore,
    catalog: CatalogService<InMemoryStore>,
    carts: CartService<InMemoryStore>,
    orders: OrderService<InMemoryStore>,
}

impl Shop {
    fn new() -> Self {
        let store = InMemoryStore::new();
        Self {
            catalog: CatalogService::new(store.clone()),
            carts: CartService::new(store.clone()),
            orders: OrderService::new(store.clone()),
            store,
        }
    }

    async fn product(&self, name: &str, price: &str, stock: u32) -> ProductId {
        self.catalog
            .create_product(
                &admin(),
                NewProduct::new(name, price.parse().unwrap(), stock),
            )
            .await
            .unwrap()
            .id
    }

    async fn stock(&self, id: ProductId) -> u32 {
        self.store.stock_of(id).await.unwrap()
    }
}

fn user(id: i64) -> RequestContext {
    RequestContext::user(UserId::new(id))
}

fn admin() -> RequestContext {
    RequestContext::admin(UserId::new(1000))
}

mod placement {
    use super::*;

    #[tokio::test]
    async fn scenario_order_then_cancel_restores_stock() {
        let shop = Shop::new();
        let a = shop.product("A", "10.00", 5).await;
        let alice = user(1);

        shop.carts
            .add_item(&alice, AddToCart::new(a, 3))
            .await
            .unwrap();
        let order = shop
            .orders
            .create_order(&alice, PlaceOrder::new())
            .await
            .unwrap();

        assert_eq!(order.total, Money::from_cents(3000));
        assert_eq!(order.total.to_string(), "30.00");
        assert_eq!(shop.stock(a).await, 2);
        assert!(shop.carts.get_cart(&alice).await.unwrap().is_empty());

        let cancelled = shop
            .orders
            .update_status(&admin(), UpdateOrderStatus::cancel(order.id))
            .await
            .unwrap();

        assert_eq!(cancelled.status, OrderStatus::Cancelled);
        assert_eq!(shop.stock(a).await, 5);
    }

    #[tokio::test]
    async fn successful_order_matches_cart_exactly() {
        let shop = Shop::new();
        let a = shop.product("A", "2.50", 10).await;
        let b = shop.product("B", "0.99", 4).await;
        let alice = user(1);

        shop.carts
            .add_item(&alice, AddToCart::new(a, 2))
            .await
            .unwrap();
        shop.carts
            .add_item(&alice, AddToCart::new(b, 4))
            .await
            .unwrap();
        let cart = shop.carts.get_cart(&alice).await.unwrap();

        let order = shop
            .orders
            .create_order(&alice, PlaceOrder::new())
            .await
            .unwrap();

        assert_eq!(order.total, cart.total);
        assert_eq!(order.total, Money::from_cents(2 * 250 + 4 * 99));
        let mut quantities: Vec<_> = order
            .lines
            .iter()
            .map(|l| (l.product_id, l.quantity))
            .collect();
        quantities.sort();
        assert_eq!(quantities, vec![(a, 2), (b, 4)]);
        assert_eq!(shop.stock(a).await, 8);
        assert_eq!(shop.stock(b).await, 0);
        assert_eq!(shop.store.cart_line_count().await, 0);
    }

    #[tokio::test]
    async fn line_over_stock_changes_nothing() {
        let shop = Shop::new();
        let a = shop.product("A", "1.00", 3).await;
        let b = shop.product("Scarce", "1.00", 3).await;
        let alice = user(1);

        shop.carts
            .add_item(&alice, AddToCart::new(a, 1))
            .await
            .unwrap();
        shop.carts
            .add_item(&alice, AddToCart::new(b, 3))
            .await
            .unwrap();

        // Another buyer drains the scarce product after Alice filled her cart.
        let bob = user(2);
        shop.carts
            .add_item(&bob, AddToCart::new(b, 2))
            .await
            .unwrap();
        shop.orders
            .create_order(&bob, PlaceOrder::new())
            .await
            .unwrap();

        let err = shop
            .orders
            .create_order(&alice, PlaceOrder::new())
            .await
            .unwrap_err();

        match err {
            DomainError::InsufficientStock {
                product_id,
                product_name,
                available,
                requested,
            } => {
                assert_eq!(product_id, b);
                assert_eq!(product_name, "Scarce");
                assert_eq!(available, 1);
                assert_eq!(requested, 3);
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert_eq!(shop.stock(a).await, 3);
        assert_eq!(shop.stock(b).await, 1);
        assert_eq!(shop.carts.get_cart(&alice).await.unwrap().lines.len(), 2);
        assert_eq!(shop.store.order_count().await, 1);
    }

    #[tokio::test]
    async fn empty_cart_fails() {
        let shop = Shop::new();
        let err = shop
            .orders
            .create_order(&user(1), PlaceOrder::new())
            .await
            .unwrap_err();
        assert!(matches!(err, DomainError::EmptyCart));
        assert_eq!(err.code(), "EMPTY_CART");
    }

    #[tokio::test]
    async fn order_keeps_price_after_catalog_change() {
        let shop = Shop::new();
        let a = shop.product("A", "10.00", 5).await;
        let alice = user(1);

        shop.carts
            .add_item(&alice, AddToCart::new(a, 1))
            .await
            .unwrap();
        let order = shop
            .orders
            .create_order(&alice, PlaceOrder::new())
            .await
            .unwrap();

        shop.catalog
            .update_price(&admin(), a, Money::from_cents(2500))
            .await
            .unwrap();

        let reloaded = shop.orders.get_order(&alice, order.id).await.unwrap();
        assert_eq!(reloaded.lines[0].unit_price, Money::from_cents(1000));
        assert_eq!(reloaded.total, Money::from_cents(1000));
    }

    #[tokio::test]
    async fn failed_commit_applies_nothing() {
        let shop = Shop::new();
        let a = shop.product("A", "1.00", 5).await;
        let alice = user(1);
        shop.carts
            .add_item(&alice, AddToCart::new(a, 2))
            .await
            .unwrap();

        shop.store.set_fail_on_commit(true);
        let err = shop
            .orders
            .create_order(&alice, PlaceOrder::new())
            .await
            .unwrap_err();
        shop.store.set_fail_on_commit(false);

        assert!(matches!(err, DomainError::Store(StoreError::Unavailable(_))));
        assert!(err.is_retryable());
        assert_eq!(shop.stock(a).await, 5);
        assert_eq!(shop.store.cart_line_count().await, 1);
        assert_eq!(shop.store.order_count().await, 0);
    }

    #[tokio::test]
    async fn unrepresentable_total_is_rejected_before_any_write() {
        let shop = Shop::new();
        let a = shop.product("A", "0.01", 5).await;
        let alice = user(1);
        shop.carts
            .add_item(&alice, AddToCart::new(a, 2))
            .await
            .unwrap();

        shop.catalog
            .update_price(&admin(), a, "50000000000000000.00".parse().unwrap())
            .await
            .unwrap();

        let err = shop.carts.get_cart(&alice).await.unwrap_err();
        assert!(matches!(err, DomainError::Validation(_)));

        let err = shop
            .orders
            .create_order(&alice, PlaceOrder::new())
            .await
            .unwrap_err();
        assert!(matches!(err, DomainError::Validation(_)));
        assert_eq!(shop.stock(a).await, 5);
        assert_eq!(shop.store.cart_line_count().await, 1);
        assert_eq!(shop.store.order_count().await, 0);
    }
}

mod cart {
    use super::*;

    #[tokio::test]
    async fn repeated_adds_accumulate() {
        let shop = Shop::new();
        let a = shop.product("A", "1.00", 5).await;
        let alice = user(1);

        shop.carts
            .add_item(&alice, AddToCart::new(a, 2))
            .await
            .unwrap();
        let line = shop
            .carts
            .add_item(&alice, AddToCart::new(a, 3))
            .await
            .unwrap();
        assert_eq!(line.quantity, 5);

        let err = shop
            .carts
            .add_item(&alice, AddToCart::new(a, 1))
            .await
            .unwrap_err();
        assert!(matches!(err, DomainError::InsufficientStock { .. }));
        assert_eq!(
            shop.carts.get_line(&alice, line.id).await.unwrap().quantity,
            5
        );
    }

    #[tokio::test]
    async fn lines_are_listed_newest_first() {
        let shop = Shop::new();
        let a = shop.product("A", "1.00", 5).await;
        let b = shop.product("B", "1.00", 5).await;
        let alice = user(1);

        shop.carts
            .add_item(&alice, AddToCart::new(a, 1))
            .await
            .unwrap();
        shop.carts
            .add_item(&alice, AddToCart::new(b, 1))
            .await
            .unwrap();

        let cart = shop.carts.get_cart(&alice).await.unwrap();
        let products: Vec<_> = cart.lines.iter().map(|l| l.product.id).collect();
        assert_eq!(products, vec![b, a]);
        assert_eq!(cart.item_count, 2);
    }
}

mod status {
    use super::*;

    async fn placed_order(shop: &Shop, quantity: u32) -> (ProductId, common::OrderId) {
        let a = shop.product("A", "4.00", 10).await;
        let alice = user(1);
        shop.carts
            .add_item(&alice, AddToCart::new(a, quantity))
            .await
            .unwrap();
        let order = shop
            .orders
            .create_order(&alice, PlaceOrder::new())
            .await
            .unwrap();
        (a, order.id)
    }

    #[tokio::test]
    async fn cancelling_twice_restores_once() {
        let shop = Shop::new();
        let (a, order_id) = placed_order(&shop, 4).await;
        assert_eq!(shop.stock(a).await, 6);

        shop.orders
            .update_status(&admin(), UpdateOrderStatus::cancel(order_id))
            .await
            .unwrap();
        shop.orders
            .update_status(&admin(), UpdateOrderStatus::cancel(order_id))
            .await
            .unwrap();

        assert_eq!(shop.stock(a).await, 10);
    }

    #[tokio::test]
    async fn completing_keeps_stock_and_cancel_after_restores() {
        let shop = Shop::new();
        let (a, order_id) = placed_order(&shop, 4).await;

        let completed = shop
            .orders
            .update_status(
                &admin(),
                UpdateOrderStatus::complete(order_id).with_notes("shipped"),
            )
            .await
            .unwrap();
        assert_eq!(completed.status, OrderStatus::Completed);
        assert_eq!(completed.notes.as_deref(), Some("shipped"));
        assert_eq!(shop.stock(a).await, 6);

        shop.orders
            .update_status(&admin(), UpdateOrderStatus::cancel(order_id))
            .await
            .unwrap();
        assert_eq!(shop.stock(a).await, 10);
    }

    #[tokio::test]
    async fn cancelled_orders_cannot_be_reopened() {
        let shop = Shop::new();
        let (a, order_id) = placed_order(&shop, 2).await;
        shop.orders
            .update_status(&admin(), UpdateOrderStatus::cancel(order_id))
            .await
            .unwrap();

        let err = shop
            .orders
            .update_status(
                &admin(),
                UpdateOrderStatus::new(order_id, OrderStatus::Pending),
            )
            .await
            .unwrap_err();

        assert!(matches!(err, DomainError::Conflict(_)));
        assert_eq!(shop.stock(a).await, 10);
    }

    #[tokio::test]
    async fn referenced_product_cannot_be_deleted() {
        let shop = Shop::new();
        let (a, _) = placed_order(&shop, 1).await;
        let err = shop.catalog.delete_product(&admin(), a).await.unwrap_err();
        assert!(matches!(err, DomainError::Conflict(_)));
    }

    #[tokio::test]
    async fn admin_listing_filters_by_status() {
        let shop = Shop::new();
        let (_, first) = placed_order(&shop, 1).await;
        let (_, _second) = placed_order(&shop, 1).await;
        shop.orders
            .update_status(&admin(), UpdateOrderStatus::complete(first))
            .await
            .unwrap();

        let page = shop
            .orders
            .list_all_orders(
                &admin(),
                ListOrders::default().with_status(OrderStatus::Pending),
            )
            .await
            .unwrap();
        assert_eq!(page.page.total, 1);
        assert_eq!(page.orders[0].status, OrderStatus::Pending);

        let stats = shop.orders.stats(&admin()).await.unwrap();
        assert_eq!(stats.total_orders, 2);
        assert_eq!(stats.completed_orders, 1);
        assert_eq!(stats.total_revenue, Money::from_cents(400));
        assert_eq!(stats.average_order_value, Money::from_cents(400));
    }
}

mod concurrency {
    use super::*;
    use futures_util::future::join_all;

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn last_unit_is_sold_once() {
        let shop = Arc::new(Shop::new());
        let a = shop.product("A", "1.00", 1).await;

        for id in [1, 2] {
            shop.carts
                .add_item(&user(id), AddToCart::new(a, 1))
                .await
                .unwrap();
        }

        let attempts = [1, 2].map(|id| {
            let shop = shop.clone();
            tokio::spawn(async move {
                shop.orders
                    .create_order(&user(id), PlaceOrder::new())
                    .await
            })
        });
        let results: Vec<_> = join_all(attempts)
            .await
            .into_iter()
            .map(|joined| joined.unwrap())
            .collect();

        let placed = results.iter().filter(|r| r.is_ok()).count();
        let short = results
            .iter()
            .filter(|r| matches!(r, Err(DomainError::InsufficientStock { .. })))
            .count();
        assert_eq!((placed, short), (1, 1));
        assert_eq!(shop.stock(a).await, 0);
        assert_eq!(shop.store.order_count().await, 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_cancellations_restore_once() {
        let shop = Arc::new(Shop::new());
        let a = shop.product("A", "1.00", 3).await;
        let alice = user(1);
        shop.carts
            .add_item(&alice, AddToCart::new(a, 3))
            .await
            .unwrap();
        let order = shop
            .orders
            .create_order(&alice, PlaceOrder::new())
            .await
            .unwrap();
        let order_id = order.id;

        let cancels = (0..4).map(|_| {
            let shop = shop.clone();
            tokio::spawn(async move {
                shop.orders
                    .update_status(&admin(), UpdateOrderStatus::cancel(order_id))
                    .await
            })
        });
        for joined in join_all(cancels).await {
            joined.unwrap().unwrap();
        }

        assert_eq!(shop.stock(a).await, 3);
    }
}
