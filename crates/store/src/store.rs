use async_trait::async_trait;
use common::{OrderId, OrderItemId, ProductId};
use domain::{Order, OrderItem, Product};

use crate::Result;

/// Name of the unique constraint on order numbers.
pub const ORDER_NUMBER_CONSTRAINT: &str = "orders_order_number_key";

/// Entry point to a transactional store.
///
/// A store hands out transactions; all reads and writes happen inside one.
/// Implementations must be cheap to clone and thread-safe.
#[async_trait]
pub trait Store: Clone + Send + Sync + 'static {
    type Tx: Transaction;

    /// Begins a new transaction.
    async fn begin(&self) -> Result<Self::Tx>;
}

/// A unit of work over products, orders and order items.
///
/// Rows read through a transaction are locked or version-tracked, so a
/// concurrent writer of the same row makes one of the two commits fail with
/// a transient [`StoreError`](crate::StoreError).
///
/// Update methods are conditional on the version carried by the value and
/// bump it on success. Dropping a transaction without committing rolls it
/// back.
#[async_trait]
pub trait Transaction: Send + Sized {
    /// Loads a product for update.
    async fn get_product(&mut self, id: ProductId) -> Result<Option<Product>>;

    async fn insert_product(&mut self, product: &Product) -> Result<()>;

    async fn update_product(&mut self, product: &mut Product) -> Result<()>;

    /// Loads an order for update.
    async fn get_order(&mut self, id: OrderId) -> Result<Option<Order>>;

    /// Inserts an order together with its items.
    ///
    /// A duplicate order number fails with a unique violation of
    /// [`ORDER_NUMBER_CONSTRAINT`].
    async fn insert_order(&mut self, order: &Order, items: &[OrderItem]) -> Result<()>;

    async fn update_order(&mut self, order: &mut Order) -> Result<()>;

    /// Loads every item of an order for update, ordered by product id.
    async fn get_order_items(&mut self, order_id: OrderId) -> Result<Vec<OrderItem>>;

    /// Resolves the order an item belongs to without locking anything.
    async fn order_id_for_item(&mut self, item_id: OrderItemId) -> Result<Option<OrderId>>;

    async fn update_order_item(&mut self, item: &mut OrderItem) -> Result<()>;

    /// Makes every write of this transaction visible atomically.
    async fn commit(self) -> Result<()>;

    /// Discards every write of this transaction.
    async fn rollback(self) -> Result<()>;
}
