use std::str::FromStr;

use async_trait::async_trait;
use common::{OrderId, OrderItemId, ProductId, UserId};
use domain::{
    DomainError, Money, Order, OrderItem, OrderItemParts, OrderNumber, OrderParts, Product,
};
use sqlx::{PgPool, Postgres, Row, postgres::PgRow};
use uuid::Uuid;

use crate::{
    Result, StoreError,
    store::{Store, Transaction},
};

const PRODUCT_COLUMNS: &str =
    "id, seller_id, name, price_cents, stock, status, version, created_at, updated_at";

const ORDER_COLUMNS: &str = "id, customer_id, order_number, total_cents, status, payment_status, \
     delivery, shipping_address, billing_address, metadata, cancellation_reason, status_history, \
     version, created_at, updated_at";

const ITEM_COLUMNS: &str = "id, order_id, product_id, seller_id, product_name, quantity, \
     unit_price_cents, status, cancelled, cancellation_reason, stock_released, version, \
     created_at, updated_at";

/// PostgreSQL-backed store implementation.
///
/// Reads lock their rows with `SELECT ... FOR UPDATE`; updates are
/// additionally conditional on the row version that was read.
#[derive(Clone)]
pub struct PostgresStore {
    pool: PgPool,
}

impl PostgresStore {
    /// Creates a new PostgreSQL store.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Connects a pool of at most `max_connections` to `database_url`.
    pub async fn connect(database_url: &str, max_connections: u32) -> Result<Self> {
        let pool = sqlx::postgres::PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(database_url)
            .await?;
        Ok(Self::new(pool))
    }

    /// Gets a reference to the underlying connection pool.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Runs the database migrations.
    pub async fn run_migrations(&self) -> Result<()> {
        sqlx::migrate!("../../migrations").run(&self.pool).await?;
        Ok(())
    }
}

#[async_trait]
impl Store for PostgresStore {
    type Tx = PostgresTransaction;

    async fn begin(&self) -> Result<Self::Tx> {
        Ok(PostgresTransaction {
            tx: self.pool.begin().await?,
        })
    }
}

/// Transaction over a [`PostgresStore`].
pub struct PostgresTransaction {
    tx: sqlx::Transaction<'static, Postgres>,
}

fn parse<T>(column: &'static str, value: String) -> Result<T>
where
    T: FromStr<Err = DomainError>,
{
    value
        .parse()
        .map_err(|_| StoreError::Corrupt { column, value })
}

fn to_u32(column: &'static str, value: i64) -> Result<u32> {
    u32::try_from(value).map_err(|_| StoreError::Corrupt {
        column,
        value: value.to_string(),
    })
}

fn row_to_product(row: PgRow) -> Result<Product> {
    Ok(Product::restore(
        ProductId::from_uuid(row.try_get::<Uuid, _>("id")?),
        UserId::from_uuid(row.try_get::<Uuid, _>("seller_id")?),
        row.try_get("name")?,
        Money::from_cents(row.try_get("price_cents")?),
        to_u32("stock", row.try_get("stock")?)?,
        parse("status", row.try_get("status")?)?,
        row.try_get("version")?,
        row.try_get("created_at")?,
        row.try_get("updated_at")?,
    ))
}

fn row_to_order(row: PgRow) -> Result<Order> {
    let delivery: serde_json::Value = row.try_get("delivery")?;
    let metadata: serde_json::Value = row.try_get("metadata")?;
    let history: serde_json::Value = row.try_get("status_history")?;

    Ok(Order::from_parts(OrderParts {
        id: OrderId::from_uuid(row.try_get::<Uuid, _>("id")?),
        customer_id: UserId::from_uuid(row.try_get::<Uuid, _>("customer_id")?),
        order_number: OrderNumber::new(row.try_get::<String, _>("order_number")?),
        total: Money::from_cents(row.try_get("total_cents")?),
        status: parse("status", row.try_get("status")?)?,
        payment_status: parse("payment_status", row.try_get("payment_status")?)?,
        delivery: serde_json::from_value(delivery)?,
        shipping_address: row.try_get("shipping_address")?,
        billing_address: row.try_get("billing_address")?,
        metadata: serde_json::from_value(metadata)?,
        cancellation_reason: row.try_get("cancellation_reason")?,
        history: serde_json::from_value(history)?,
        version: row.try_get("version")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    }))
}

fn row_to_item(row: PgRow) -> Result<OrderItem> {
    Ok(OrderItem::from_parts(OrderItemParts {
        id: OrderItemId::from_uuid(row.try_get::<Uuid, _>("id")?),
        order_id: OrderId::from_uuid(row.try_get::<Uuid, _>("order_id")?),
        product_id: ProductId::from_uuid(row.try_get::<Uuid, _>("product_id")?),
        seller_id: UserId::from_uuid(row.try_get::<Uuid, _>("seller_id")?),
        product_name: row.try_get("product_name")?,
        quantity: to_u32("quantity", i64::from(row.try_get::<i32, _>("quantity")?))?,
        unit_price: Money::from_cents(row.try_get("unit_price_cents")?),
        status: parse("status", row.try_get("status")?)?,
        cancelled: row.try_get("cancelled")?,
        cancellation_reason: row.try_get("cancellation_reason")?,
        stock_released: row.try_get("stock_released")?,
        version: row.try_get("version")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    }))
}

fn quantity_column(quantity: u32) -> Result<i32> {
    i32::try_from(quantity).map_err(|_| StoreError::Corrupt {
        column: "quantity",
        value: quantity.to_string(),
    })
}

/// Turns "no row matched" into a conflict or a missing row.
async fn version_mismatch(
    tx: &mut sqlx::Transaction<'static, Postgres>,
    table: &str,
    entity: &'static str,
    id: Uuid,
) -> StoreError {
    let exists = sqlx::query_scalar::<_, bool>(&format!(
        "SELECT EXISTS (SELECT 1 FROM {table} WHERE id = $1)"
    ))
    .bind(id)
    .fetch_one(&mut **tx)
    .await;

    match exists {
        Ok(false) => StoreError::not_found(entity, id),
        Ok(true) => StoreError::conflict(entity, id),
        Err(e) => e.into(),
    }
}

#[async_trait]
impl Transaction for PostgresTransaction {
    async fn get_product(&mut self, id: ProductId) -> Result<Option<Product>> {
        let row = sqlx::query(&format!(
            "SELECT {PRODUCT_COLUMNS} FROM products WHERE id = $1 FOR UPDATE"
        ))
        .bind(id.as_uuid())
        .fetch_optional(&mut *self.tx)
        .await?;

        row.map(row_to_product).transpose()
    }

    async fn insert_product(&mut self, product: &Product) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO products (id, seller_id, name, price_cents, stock, status, version, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            "#,
        )
        .bind(product.id.as_uuid())
        .bind(product.seller_id.as_uuid())
        .bind(&product.name)
        .bind(product.price.cents())
        .bind(i64::from(product.stock()))
        .bind(product.status().as_str())
        .bind(product.version)
        .bind(product.created_at)
        .bind(product.updated_at)
        .execute(&mut *self.tx)
        .await?;
        Ok(())
    }

    async fn update_product(&mut self, product: &mut Product) -> Result<()> {
        let result = sqlx::query(
            r#"
            UPDATE products
            SET name = $3, price_cents = $4, stock = $5, status = $6,
                version = version + 1, updated_at = $7
            WHERE id = $1 AND version = $2
            "#,
        )
        .bind(product.id.as_uuid())
        .bind(product.version)
        .bind(&product.name)
        .bind(product.price.cents())
        .bind(i64::from(product.stock()))
        .bind(product.status().as_str())
        .bind(product.updated_at)
        .execute(&mut *self.tx)
        .await?;

        if result.rows_affected() == 0 {
            return Err(
                version_mismatch(&mut self.tx, "products", "product", product.id.as_uuid()).await,
            );
        }
        product.version += 1;
        Ok(())
    }

    async fn get_order(&mut self, id: OrderId) -> Result<Option<Order>> {
        let row = sqlx::query(&format!(
            "SELECT {ORDER_COLUMNS} FROM orders WHERE id = $1 FOR UPDATE"
        ))
        .bind(id.as_uuid())
        .fetch_optional(&mut *self.tx)
        .await?;

        row.map(row_to_order).transpose()
    }

    async fn insert_order(&mut self, order: &Order, items: &[OrderItem]) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO orders (id, customer_id, order_number, total_cents, status, payment_status,
                                delivery, shipping_address, billing_address, metadata,
                                cancellation_reason, status_history, version, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15)
            "#,
        )
        .bind(order.id.as_uuid())
        .bind(order.customer_id.as_uuid())
        .bind(order.order_number.as_str())
        .bind(order.total().cents())
        .bind(order.status().as_str())
        .bind(order.payment_status().as_str())
        .bind(serde_json::to_value(order.delivery())?)
        .bind(&order.shipping_address)
        .bind(&order.billing_address)
        .bind(serde_json::to_value(&order.metadata)?)
        .bind(order.cancellation_reason())
        .bind(serde_json::to_value(order.history())?)
        .bind(order.version)
        .bind(order.created_at)
        .bind(order.updated_at)
        .execute(&mut *self.tx)
        .await?;

        for item in items {
            sqlx::query(
                r#"
                INSERT INTO order_items (id, order_id, product_id, seller_id, product_name, quantity,
                                         unit_price_cents, status, cancelled, cancellation_reason,
                                         stock_released, version, created_at, updated_at)
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14)
                "#,
            )
            .bind(item.id.as_uuid())
            .bind(item.order_id.as_uuid())
            .bind(item.product_id.as_uuid())
            .bind(item.seller_id.as_uuid())
            .bind(&item.product_name)
            .bind(quantity_column(item.quantity)?)
            .bind(item.unit_price.cents())
            .bind(item.status().as_str())
            .bind(item.is_cancelled())
            .bind(item.cancellation_reason())
            .bind(item.stock_released())
            .bind(item.version)
            .bind(item.created_at)
            .bind(item.updated_at)
            .execute(&mut *self.tx)
            .await?;
        }

        tracing::debug!(order_id = %order.id, items = items.len(), "order inserted");
        Ok(())
    }

    async fn update_order(&mut self, order: &mut Order) -> Result<()> {
        let result = sqlx::query(
            r#"
            UPDATE orders
            SET status = $3, payment_status = $4, delivery = $5, shipping_address = $6,
                billing_address = $7, metadata = $8, cancellation_reason = $9,
                status_history = $10, version = version + 1, updated_at = $11
            WHERE id = $1 AND version = $2
            "#,
        )
        .bind(order.id.as_uuid())
        .bind(order.version)
        .bind(order.status().as_str())
        .bind(order.payment_status().as_str())
        .bind(serde_json::to_value(order.delivery())?)
        .bind(&order.shipping_address)
        .bind(&order.billing_address)
        .bind(serde_json::to_value(&order.metadata)?)
        .bind(order.cancellation_reason())
        .bind(serde_json::to_value(order.history())?)
        .bind(order.updated_at)
        .execute(&mut *self.tx)
        .await?;

        if result.rows_affected() == 0 {
            return Err(version_mismatch(&mut self.tx, "orders", "order", order.id.as_uuid()).await);
        }
        order.version += 1;
        Ok(())
    }

    async fn get_order_items(&mut self, order_id: OrderId) -> Result<Vec<OrderItem>> {
        let rows = sqlx::query(&format!(
            "SELECT {ITEM_COLUMNS} FROM order_items WHERE order_id = $1 \
             ORDER BY product_id ASC, id ASC FOR UPDATE"
        ))
        .bind(order_id.as_uuid())
        .fetch_all(&mut *self.tx)
        .await?;

        rows.into_iter().map(row_to_item).collect()
    }

    async fn order_id_for_item(&mut self, item_id: OrderItemId) -> Result<Option<OrderId>> {
        let order_id: Option<Uuid> =
            sqlx::query_scalar("SELECT order_id FROM order_items WHERE id = $1")
                .bind(item_id.as_uuid())
                .fetch_optional(&mut *self.tx)
                .await?;
        Ok(order_id.map(OrderId::from_uuid))
    }

    async fn update_order_item(&mut self, item: &mut OrderItem) -> Result<()> {
        let result = sqlx::query(
            r#"
            UPDATE order_items
            SET status = $3, cancelled = $4, cancellation_reason = $5, stock_released = $6,
                version = version + 1, updated_at = $7
            WHERE id = $1 AND version = $2
            "#,
        )
        .bind(item.id.as_uuid())
        .bind(item.version)
        .bind(item.status().as_str())
        .bind(item.is_cancelled())
        .bind(item.cancellation_reason())
        .bind(item.stock_released())
        .bind(item.updated_at)
        .execute(&mut *self.tx)
        .await?;

        if result.rows_affected() == 0 {
            return Err(
                version_mismatch(&mut self.tx, "order_items", "order_item", item.id.as_uuid())
                    .await,
            );
        }
        item.version += 1;
        Ok(())
    }

    async fn commit(self) -> Result<()> {
        self.tx.commit().await?;
        Ok(())
    }

    async fn rollback(self) -> Result<()> {
        self.tx.rollback().await?;
        Ok(())
    }
}
