use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use common::{CartLineId, Money, OrderId, OrderLineId, OrderStatus, ProductId, UserId};
use sqlx::{
    PgPool, Postgres, Row, Transaction,
    postgres::{PgPoolOptions, PgRow},
};

use crate::{
    CartLineRecord, NewOrder, NewProduct, OrderLineRecord, OrderQuery, OrderRecord, OrderStats,
    ProductRecord, Result, StockChange, StoreError,
    store::{Store, StoreTransaction},
};

const CART_LINE_COLUMNS: &str = r#"
    c.id, c.user_id, c.quantity, c.created_at, c.updated_at,
    p.id AS product_id, p.name, p.description, p.price_cents, p.stock,
    p.created_at AS product_created_at, p.updated_at AS product_updated_at
"#;

/// Connection settings for [`PostgresStore::connect`].
#[derive(Debug, Clone)]
pub struct PostgresOptions {
    pub max_connections: u32,
    pub acquire_timeout: Duration,
    /// Upper bound on any single statement, applied to every transaction.
    pub statement_timeout: Duration,
}

impl Default for PostgresOptions {
    fn default() -> Self {
        Self {
            max_connections: 10,
            acquire_timeout: Duration::from_secs(5),
            statement_timeout: Duration::from_millis(5000),
        }
    }
}

/// PostgreSQL-backed store implementation.
///
/// Transactions run at READ COMMITTED. Stock decrements are conditional
/// updates, so two transactions racing for the last units serialise on the
/// product row and the loser sees the winner's committed value.
#[derive(Debug, Clone)]
pub struct PostgresStore {
    pool: PgPool,
    statement_timeout_ms: u64,
}

impl PostgresStore {
    /// Creates a new PostgreSQL store over an existing pool.
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool,
            statement_timeout_ms: duration_ms(PostgresOptions::default().statement_timeout),
        }
    }

    /// Opens a pool against `database_url`.
    pub async fn connect(database_url: &str, options: PostgresOptions) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(options.max_connections)
            .acquire_timeout(options.acquire_timeout)
            .connect(database_url)
            .await?;

        Ok(Self {
            pool,
            statement_timeout_ms: duration_ms(options.statement_timeout),
        })
    }

    /// Runs the database migrations.
    pub async fn run_migrations(&self) -> Result<()> {
        sqlx::migrate!("../../migrations").run(&self.pool).await?;
        Ok(())
    }
}

fn duration_ms(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}

#[async_trait]
impl Store for PostgresStore {
    type Tx = PostgresTransaction;

    async fn begin(&self) -> Result<Self::Tx> {
        let mut tx = self.pool.begin().await?;
        if self.statement_timeout_ms > 0 {
            // SET does not take bind parameters.
            let sql = format!("SET LOCAL statement_timeout = {}", self.statement_timeout_ms);
            sqlx::query(&sql).execute(&mut *tx).await?;
        }
        Ok(PostgresTransaction { tx })
    }
}

/// Transaction over a [`PostgresStore`]. Dropping it rolls back.
#[derive(Debug)]
pub struct PostgresTransaction {
    tx: Transaction<'static, Postgres>,
}

fn decode_u32(value: i32, column: &str) -> Result<u32> {
    u32::try_from(value)
        .map_err(|_| StoreError::Decode(format!("negative value {value} in column {column}")))
}

fn encode_u32(value: u32) -> Result<i32> {
    i32::try_from(value).map_err(|_| StoreError::Decode(format!("value {value} exceeds INTEGER")))
}

fn decode_status(value: &str) -> Result<OrderStatus> {
    value
        .parse()
        .map_err(|e: common::UnknownStatus| StoreError::Decode(e.to_string()))
}

fn row_to_product(row: &PgRow) -> Result<ProductRecord> {
    Ok(ProductRecord {
        id: ProductId::new(row.try_get("id")?),
        name: row.try_get("name")?,
        description: row.try_get("description")?,
        price: Money::from_cents(row.try_get("price_cents")?),
        stock: decode_u32(row.try_get("stock")?, "stock")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

fn row_to_cart_line(row: &PgRow) -> Result<CartLineRecord> {
    Ok(CartLineRecord {
        id: CartLineId::new(row.try_get("id")?),
        user_id: UserId::new(row.try_get("user_id")?),
        quantity: decode_u32(row.try_get("quantity")?, "quantity")?,
        product: ProductRecord {
            id: ProductId::new(row.try_get("product_id")?),
            name: row.try_get("name")?,
            description: row.try_get("description")?,
            price: Money::from_cents(row.try_get("price_cents")?),
            stock: decode_u32(row.try_get("stock")?, "stock")?,
            created_at: row.try_get("product_created_at")?,
            updated_at: row.try_get("product_updated_at")?,
        },
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

fn row_to_order_line(row: &PgRow) -> Result<OrderLineRecord> {
    Ok(OrderLineRecord {
        id: OrderLineId::new(row.try_get("id")?),
        order_id: OrderId::new(row.try_get("order_id")?),
        product_id: ProductId::new(row.try_get("product_id")?),
        product_name: row.try_get("product_name")?,
        quantity: decode_u32(row.try_get("quantity")?, "quantity")?,
        unit_price: Money::from_cents(row.try_get("unit_price_cents")?),
    })
}

fn row_to_order(row: &PgRow) -> Result<OrderRecord> {
    let status: String = row.try_get("status")?;
    Ok(OrderRecord {
        id: OrderId::new(row.try_get("id")?),
        user_id: UserId::new(row.try_get("user_id")?),
        total: Money::from_cents(row.try_get("total_cents")?),
        status: decode_status(&status)?,
        notes: row.try_get("notes")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
        lines: Vec::new(),
    })
}

/// Appends the WHERE clause for `query`, returning the next free parameter
/// index.
fn push_order_filters(sql: &mut String, query: &OrderQuery) -> usize {
    let mut param_count = 0;
    sql.push_str(" WHERE 1=1");
    if query.user_id.is_some() {
        param_count += 1;
        sql.push_str(&format!(" AND user_id = ${param_count}"));
    }
    if query.status.is_some() {
        param_count += 1;
        sql.push_str(&format!(" AND status = ${param_count}"));
    }
    param_count
}

impl PostgresTransaction {
    async fn stock_of(&mut self, id: ProductId) -> Result<Option<u32>> {
        let stock: Option<i32> = sqlx::query_scalar("SELECT stock FROM products WHERE id = $1")
            .bind(id.get())
            .fetch_optional(&mut *self.tx)
            .await?;
        stock.map(|s| decode_u32(s, "stock")).transpose()
    }

    async fn attach_lines(&mut self, orders: &mut [OrderRecord]) -> Result<()> {
        if orders.is_empty() {
            return Ok(());
        }
        let ids: Vec<i64> = orders.iter().map(|o| o.id.get()).collect();
        let rows = sqlx::query(
            r#"
            SELECT id, order_id, product_id, product_name, quantity, unit_price_cents
            FROM order_items
            WHERE order_id = ANY($1)
            ORDER BY id ASC
            "#,
        )
        .bind(&ids)
        .fetch_all(&mut *self.tx)
        .await?;

        let mut by_order: HashMap<OrderId, Vec<OrderLineRecord>> = HashMap::new();
        for row in &rows {
            let line = row_to_order_line(row)?;
            by_order.entry(line.order_id).or_default().push(line);
        }
        for order in orders.iter_mut() {
            order.lines = by_order.remove(&order.id).unwrap_or_default();
        }
        Ok(())
    }

    async fn fetch_order(&mut self, id: OrderId, lock: bool) -> Result<Option<OrderRecord>> {
        let sql = if lock {
            "SELECT id, user_id, total_cents, status, notes, created_at, updated_at FROM orders WHERE id = $1 FOR UPDATE"
        } else {
            "SELECT id, user_id, total_cents, status, notes, created_at, updated_at FROM orders WHERE id = $1"
        };
        let row = sqlx::query(sql)
            .bind(id.get())
            .fetch_optional(&mut *self.tx)
            .await?;

        let Some(row) = row else {
            return Ok(None);
        };
        let mut orders = [row_to_order(&row)?];
        self.attach_lines(&mut orders).await?;
        let [order] = orders;
        Ok(Some(order))
    }
}

#[async_trait]
impl StoreTransaction for PostgresTransaction {
    async fn insert_product(&mut self, product: NewProduct) -> Result<ProductRecord> {
        let row = sqlx::query(
            r#"
            INSERT INTO products (name, description, price_cents, stock)
            VALUES ($1, $2, $3, $4)
            RETURNING id, name, description, price_cents, stock, created_at, updated_at
            "#,
        )
        .bind(&product.name)
        .bind(&product.description)
        .bind(product.price.cents())
        .bind(encode_u32(product.stock)?)
        .fetch_one(&mut *self.tx)
        .await?;

        row_to_product(&row)
    }

    async fn product(&mut self, id: ProductId) -> Result<Option<ProductRecord>> {
        let row = sqlx::query(
            r#"
            SELECT id, name, description, price_cents, stock, created_at, updated_at
            FROM products
            WHERE id = $1
            "#,
        )
        .bind(id.get())
        .fetch_optional(&mut *self.tx)
        .await?;

        row.as_ref().map(row_to_product).transpose()
    }

    async fn lock_product(&mut self, id: ProductId) -> Result<Option<ProductRecord>> {
        let row = sqlx::query(
            r#"
            SELECT id, name, description, price_cents, stock, created_at, updated_at
            FROM products
            WHERE id = $1
            FOR UPDATE
            "#,
        )
        .bind(id.get())
        .fetch_optional(&mut *self.tx)
        .await?;

        row.as_ref().map(row_to_product).transpose()
    }

    async fn list_products(&mut self) -> Result<Vec<ProductRecord>> {
        let rows = sqlx::query(
            r#"
            SELECT id, name, description, price_cents, stock, created_at, updated_at
            FROM products
            ORDER BY id ASC
            "#,
        )
        .fetch_all(&mut *self.tx)
        .await?;

        rows.iter().map(row_to_product).collect()
    }

    async fn update_product_price(&mut self, id: ProductId, price: Money) -> Result<bool> {
        let result = sqlx::query(
            "UPDATE products SET price_cents = $2, updated_at = NOW() WHERE id = $1",
        )
        .bind(id.get())
        .bind(price.cents())
        .execute(&mut *self.tx)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn delete_product(&mut self, id: ProductId) -> Result<bool> {
        let referenced: bool =
            sqlx::query_scalar("SELECT EXISTS (SELECT 1 FROM order_items WHERE product_id = $1)")
                .bind(id.get())
                .fetch_one(&mut *self.tx)
                .await?;
        if referenced {
            return Err(StoreError::ProductReferenced(id));
        }

        let result = sqlx::query("DELETE FROM products WHERE id = $1")
            .bind(id.get())
            .execute(&mut *self.tx)
            .await
            .map_err(StoreError::from)
            .map_err(|e| {
                // An order line committed after the EXISTS check.
                if e.is_foreign_key_violation() {
                    StoreError::ProductReferenced(id)
                } else {
                    e
                }
            })?;

        Ok(result.rows_affected() > 0)
    }

    async fn decrement_stock(&mut self, id: ProductId, quantity: u32) -> Result<StockChange> {
        let remaining: Option<i32> = sqlx::query_scalar(
            r#"
            UPDATE products
            SET stock = stock - $2, updated_at = NOW()
            WHERE id = $1 AND stock >= $2
            RETURNING stock
            "#,
        )
        .bind(id.get())
        .bind(encode_u32(quantity)?)
        .fetch_optional(&mut *self.tx)
        .await?;

        if let Some(remaining) = remaining {
            return Ok(StockChange::Applied {
                remaining: decode_u32(remaining, "stock")?,
            });
        }

        Ok(match self.stock_of(id).await? {
            Some(available) => StockChange::Insufficient { available },
            None => StockChange::UnknownProduct,
        })
    }

    async fn increment_stock(&mut self, id: ProductId, quantity: u32) -> Result<StockChange> {
        let remaining: Option<i32> = sqlx::query_scalar(
            r#"
            UPDATE products
            SET stock = stock + $2, updated_at = NOW()
            WHERE id = $1
            RETURNING stock
            "#,
        )
        .bind(id.get())
        .bind(encode_u32(quantity)?)
        .fetch_optional(&mut *self.tx)
        .await?;

        match remaining {
            Some(remaining) => Ok(StockChange::Applied {
                remaining: decode_u32(remaining, "stock")?,
            }),
            None => Ok(StockChange::UnknownProduct),
        }
    }

    async fn cart_lines(&mut self, user_id: UserId) -> Result<Vec<CartLineRecord>> {
        let sql = format!(
            "SELECT {CART_LINE_COLUMNS} FROM cart_items c JOIN products p ON p.id = c.product_id \
             WHERE c.user_id = $1 ORDER BY c.created_at DESC, c.id DESC"
        );
        let rows = sqlx::query(&sql)
            .bind(user_id.get())
            .fetch_all(&mut *self.tx)
            .await?;

        rows.iter().map(row_to_cart_line).collect()
    }

    async fn cart_line(
        &mut self,
        user_id: UserId,
        line_id: CartLineId,
    ) -> Result<Option<CartLineRecord>> {
        let sql = format!(
            "SELECT {CART_LINE_COLUMNS} FROM cart_items c JOIN products p ON p.id = c.product_id \
             WHERE c.id = $1 AND c.user_id = $2"
        );
        let row = sqlx::query(&sql)
            .bind(line_id.get())
            .bind(user_id.get())
            .fetch_optional(&mut *self.tx)
            .await?;

        row.as_ref().map(row_to_cart_line).transpose()
    }

    async fn cart_line_for_product(
        &mut self,
        user_id: UserId,
        product_id: ProductId,
    ) -> Result<Option<CartLineRecord>> {
        let sql = format!(
            "SELECT {CART_LINE_COLUMNS} FROM cart_items c JOIN products p ON p.id = c.product_id \
             WHERE c.user_id = $1 AND c.product_id = $2 FOR UPDATE OF c"
        );
        let row = sqlx::query(&sql)
            .bind(user_id.get())
            .bind(product_id.get())
            .fetch_optional(&mut *self.tx)
            .await?;

        row.as_ref().map(row_to_cart_line).transpose()
    }

    async fn upsert_cart_line(
        &mut self,
        user_id: UserId,
        product_id: ProductId,
        quantity: u32,
    ) -> Result<CartLineId> {
        let id: i64 = sqlx::query_scalar(
            r#"
            INSERT INTO cart_items (user_id, product_id, quantity)
            VALUES ($1, $2, $3)
            ON CONFLICT (user_id, product_id) DO UPDATE SET
                quantity = EXCLUDED.quantity,
                updated_at = NOW()
            RETURNING id
            "#,
        )
        .bind(user_id.get())
        .bind(product_id.get())
        .bind(encode_u32(quantity)?)
        .fetch_one(&mut *self.tx)
        .await?;

        Ok(CartLineId::new(id))
    }

    async fn update_cart_line(
        &mut self,
        user_id: UserId,
        line_id: CartLineId,
        quantity: u32,
    ) -> Result<bool> {
        let result = sqlx::query(
            r#"
            UPDATE cart_items
            SET quantity = $3, updated_at = NOW()
            WHERE id = $1 AND user_id = $2
            "#,
        )
        .bind(line_id.get())
        .bind(user_id.get())
        .bind(encode_u32(quantity)?)
        .execute(&mut *self.tx)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn delete_cart_line(&mut self, user_id: UserId, line_id: CartLineId) -> Result<bool> {
        let result = sqlx::query("DELETE FROM cart_items WHERE id = $1 AND user_id = $2")
            .bind(line_id.get())
            .bind(user_id.get())
            .execute(&mut *self.tx)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn clear_cart(&mut self, user_id: UserId) -> Result<u64> {
        let result = sqlx::query("DELETE FROM cart_items WHERE user_id = $1")
            .bind(user_id.get())
            .execute(&mut *self.tx)
            .await?;

        Ok(result.rows_affected())
    }

    async fn insert_order(&mut self, order: NewOrder) -> Result<OrderRecord> {
        let row = sqlx::query(
            r#"
            INSERT INTO orders (user_id, total_cents, status, notes)
            VALUES ($1, $2, $3, $4)
            RETURNING id, user_id, total_cents, status, notes, created_at, updated_at
            "#,
        )
        .bind(order.user_id.get())
        .bind(order.total.cents())
        .bind(order.status.as_str())
        .bind(&order.notes)
        .fetch_one(&mut *self.tx)
        .await?;
        let mut record = row_to_order(&row)?;

        for line in order.lines {
            let id: i64 = sqlx::query_scalar(
                r#"
                INSERT INTO order_items (order_id, product_id, product_name, quantity, unit_price_cents)
                VALUES ($1, $2, $3, $4, $5)
                RETURNING id
                "#,
            )
            .bind(record.id.get())
            .bind(line.product_id.get())
            .bind(&line.product_name)
            .bind(encode_u32(line.quantity)?)
            .bind(line.unit_price.cents())
            .fetch_one(&mut *self.tx)
            .await?;

            record.lines.push(OrderLineRecord {
                id: OrderLineId::new(id),
                order_id: record.id,
                product_id: line.product_id,
                product_name: line.product_name,
                quantity: line.quantity,
                unit_price: line.unit_price,
            });
        }

        Ok(record)
    }

    async fn order(&mut self, id: OrderId) -> Result<Option<OrderRecord>> {
        self.fetch_order(id, false).await
    }

    async fn lock_order(&mut self, id: OrderId) -> Result<Option<OrderRecord>> {
        self.fetch_order(id, true).await
    }

    async fn set_order_status(
        &mut self,
        id: OrderId,
        status: OrderStatus,
        notes: Option<String>,
    ) -> Result<bool> {
        let result = sqlx::query(
            r#"
            UPDATE orders
            SET status = $2, notes = COALESCE($3, notes), updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(id.get())
        .bind(status.as_str())
        .bind(&notes)
        .execute(&mut *self.tx)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn list_orders(&mut self, query: &OrderQuery) -> Result<(Vec<OrderRecord>, u64)> {
        let mut count_sql = String::from("SELECT COUNT(*) FROM orders");
        push_order_filters(&mut count_sql, query);

        let mut sql = String::from(
            "SELECT id, user_id, total_cents, status, notes, created_at, updated_at FROM orders",
        );
        let mut param_count = push_order_filters(&mut sql, query);
        sql.push_str(" ORDER BY id DESC");
        if query.limit.is_some() {
            param_count += 1;
            sql.push_str(&format!(" LIMIT ${param_count}"));
        }
        if query.offset.is_some() {
            param_count += 1;
            sql.push_str(&format!(" OFFSET ${param_count}"));
        }

        let mut count_query = sqlx::query_scalar::<_, i64>(&count_sql);
        let mut page_query = sqlx::query(&sql);
        if let Some(user_id) = query.user_id {
            count_query = count_query.bind(user_id.get());
            page_query = page_query.bind(user_id.get());
        }
        if let Some(status) = query.status {
            count_query = count_query.bind(status.as_str());
            page_query = page_query.bind(status.as_str());
        }
        if let Some(limit) = query.limit {
            page_query = page_query.bind(i64::try_from(limit).unwrap_or(i64::MAX));
        }
        if let Some(offset) = query.offset {
            page_query = page_query.bind(i64::try_from(offset).unwrap_or(i64::MAX));
        }

        let total = count_query.fetch_one(&mut *self.tx).await?;
        let rows = page_query.fetch_all(&mut *self.tx).await?;
        let mut orders = rows.iter().map(row_to_order).collect::<Result<Vec<_>>>()?;
        self.attach_lines(&mut orders).await?;

        Ok((orders, u64::try_from(total).unwrap_or(0)))
    }

    async fn order_stats(&mut self) -> Result<OrderStats> {
        let row = sqlx::query(
            r#"
            SELECT
                COUNT(*) AS total_orders,
                COUNT(*) FILTER (WHERE status = 'PENDING') AS pending_orders,
                COUNT(*) FILTER (WHERE status = 'COMPLETED') AS completed_orders,
                COUNT(*) FILTER (WHERE status = 'CANCELLED') AS cancelled_orders,
                COALESCE(SUM(total_cents) FILTER (WHERE status = 'COMPLETED'), 0)::BIGINT AS total_revenue
            FROM orders
            "#,
        )
        .fetch_one(&mut *self.tx)
        .await?;

        let count = |column: &str| -> Result<u64> {
            let value: i64 = row.try_get(column)?;
            Ok(u64::try_from(value).unwrap_or(0))
        };

        Ok(OrderStats {
            total_orders: count("total_orders")?,
            pending_orders: count("pending_orders")?,
            completed_orders: count("completed_orders")?,
            cancelled_orders: count("cancelled_orders")?,
            total_revenue: Money::from_cents(row.try_get("total_revenue")?),
        })
    }

    async fn commit(self) -> Result<()> {
        self.tx.commit().await?;
        Ok(())
    }
}
