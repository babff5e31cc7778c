use std::collections::HashMap;
use std::fmt::Display;
use std::hash::Hash;
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};

use async_trait::async_trait;
use common::{OrderId, OrderItemId, ProductId};
use domain::{Order, OrderItem, Product};
use tokio::sync::RwLock;

use crate::{
    Result, StoreError,
    store::{ORDER_NUMBER_CONSTRAINT, Store, Transaction},
};

#[derive(Default)]
struct Tables {
    products: HashMap<ProductId, Product>,
    orders: HashMap<OrderId, Order>,
    items: HashMap<OrderItemId, OrderItem>,
}

#[derive(Default)]
struct Faults {
    commit_conflicts: AtomicU32,
    order_number_collisions: AtomicU32,
}

/// Consumes one unit of an injected fault, if any is left.
fn take_fault(counter: &AtomicU32) -> bool {
    counter
        .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
        .is_ok()
}

/// In-memory store implementation for tests and database-less deployments.
///
/// Transactions stage their reads and writes privately and validate row
/// versions at commit, so the first of two overlapping writers wins and the
/// second gets [`StoreError::Conflict`].
#[derive(Clone, Default)]
pub struct InMemoryStore {
    tables: Arc<RwLock<Tables>>,
    faults: Arc<Faults>,
}

impl InMemoryStore {
    /// Creates a new empty in-memory store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes the next `n` commits fail with a write conflict.
    pub fn inject_commit_conflicts(&self, n: u32) {
        self.faults.commit_conflicts.store(n, Ordering::SeqCst);
    }

    /// Makes the next `n` order inserts fail as duplicate order numbers.
    pub fn inject_order_number_collisions(&self, n: u32) {
        self.faults.order_number_collisions.store(n, Ordering::SeqCst);
    }

    /// Returns the number of committed orders.
    pub async fn order_count(&self) -> usize {
        self.tables.read().await.orders.len()
    }

    /// Returns the number of committed order items.
    pub async fn order_item_count(&self) -> usize {
        self.tables.read().await.items.len()
    }

    /// Clears all tables.
    pub async fn clear(&self) {
        let mut tables = self.tables.write().await;
        tables.products.clear();
        tables.orders.clear();
        tables.items.clear();
    }
}

#[async_trait]
impl Store for InMemoryStore {
    type Tx = InMemoryTransaction;

    async fn begin(&self) -> Result<Self::Tx> {
        Ok(InMemoryTransaction {
            tables: Arc::clone(&self.tables),
            faults: Arc::clone(&self.faults),
            products: HashMap::new(),
            orders: HashMap::new(),
            items: HashMap::new(),
        })
    }
}

trait Row: Clone {
    const ENTITY: &'static str;
    const PRIMARY_KEY: &'static str;

    fn version(&self) -> i64;
    fn version_mut(&mut self) -> &mut i64;
}

macro_rules! impl_row {
    ($ty:ty, $entity:literal, $pkey:literal) => {
        impl Row for $ty {
            const ENTITY: &'static str = $entity;
            const PRIMARY_KEY: &'static str = $pkey;

            fn version(&self) -> i64 {
                self.version
            }

            fn version_mut(&mut self) -> &mut i64 {
                &mut self.version
            }
        }
    };
}

impl_row!(Product, "product", "products_pkey");
impl_row!(Order, "order", "orders_pkey");
impl_row!(OrderItem, "order_item", "order_items_pkey");

/// A row as seen by one transaction.
struct Staged<T> {
    /// Committed version the transaction started from; None for inserts.
    base: Option<i64>,
    value: T,
    dirty: bool,
}

type Staging<K, T> = HashMap<K, Staged<T>>;

fn stage_read<K, T>(staged: &mut Staging<K, T>, table: &HashMap<K, T>, id: K) -> Option<T>
where
    K: Hash + Eq + Copy,
    T: Row,
{
    if let Some(row) = staged.get(&id) {
        return Some(row.value.clone());
    }
    let row = table.get(&id)?.clone();
    staged.insert(
        id,
        Staged {
            base: Some(row.version()),
            value: row.clone(),
            dirty: false,
        },
    );
    Some(row)
}

fn stage_insert<K, T>(staged: &mut Staging<K, T>, table: &HashMap<K, T>, id: K, row: &T) -> Result<()>
where
    K: Hash + Eq + Copy,
    T: Row,
{
    if staged.contains_key(&id) || table.contains_key(&id) {
        return Err(StoreError::UniqueViolation {
            constraint: T::PRIMARY_KEY.to_string(),
        });
    }
    staged.insert(
        id,
        Staged {
            base: None,
            value: row.clone(),
            dirty: true,
        },
    );
    Ok(())
}

fn stage_update<K, T>(
    staged: &mut Staging<K, T>,
    table: &HashMap<K, T>,
    id: K,
    row: &mut T,
) -> Result<()>
where
    K: Hash + Eq + Copy + Display,
    T: Row,
{
    let (base, current) = match staged.get(&id) {
        Some(existing) => (existing.base, existing.value.version()),
        None => {
            let committed = table
                .get(&id)
                .ok_or_else(|| StoreError::not_found(T::ENTITY, id))?
                .version();
            (Some(committed), committed)
        }
    };
    if current != row.version() {
        return Err(StoreError::conflict(T::ENTITY, id));
    }

    *row.version_mut() += 1;
    staged.insert(
        id,
        Staged {
            base,
            value: row.clone(),
            dirty: true,
        },
    );
    Ok(())
}

fn validate<K, T>(staged: &Staging<K, T>, table: &HashMap<K, T>) -> Result<()>
where
    K: Hash + Eq + Display,
    T: Row,
{
    for (id, row) in staged {
        match row.base {
            Some(base) => match table.get(id) {
                Some(committed) if committed.version() == base => {}
                _ => return Err(StoreError::conflict(T::ENTITY, id)),
            },
            None if table.contains_key(id) => {
                return Err(StoreError::UniqueViolation {
                    constraint: T::PRIMARY_KEY.to_string(),
                });
            }
            None => {}
        }
    }
    Ok(())
}

fn apply<K, T>(staged: Staging<K, T>, table: &mut HashMap<K, T>)
where
    K: Hash + Eq,
{
    for (id, row) in staged {
        if row.dirty {
            table.insert(id, row.value);
        }
    }
}

/// Transaction over an [`InMemoryStore`].
pub struct InMemoryTransaction {
    tables: Arc<RwLock<Tables>>,
    faults: Arc<Faults>,
    products: Staging<ProductId, Product>,
    orders: Staging<OrderId, Order>,
    items: Staging<OrderItemId, OrderItem>,
}

impl InMemoryTransaction {
    fn order_number_taken(&self, tables: &Tables, order: &Order) -> bool {
        let committed = tables
            .orders
            .values()
            .any(|o| o.id != order.id && o.order_number == order.order_number);
        let staged = self
            .orders
            .values()
            .any(|o| o.value.id != order.id && o.value.order_number == order.order_number);
        committed || staged
    }
}

#[async_trait]
impl Transaction for InMemoryTransaction {
    async fn get_product(&mut self, id: ProductId) -> Result<Option<Product>> {
        let tables = self.tables.read().await;
        Ok(stage_read(&mut self.products, &tables.products, id))
    }

    async fn insert_product(&mut self, product: &Product) -> Result<()> {
        let tables = self.tables.read().await;
        stage_insert(&mut self.products, &tables.products, product.id, product)
    }

    async fn update_product(&mut self, product: &mut Product) -> Result<()> {
        let tables = self.tables.read().await;
        stage_update(&mut self.products, &tables.products, product.id, product)
    }

    async fn get_order(&mut self, id: OrderId) -> Result<Option<Order>> {
        let tables = self.tables.read().await;
        Ok(stage_read(&mut self.orders, &tables.orders, id))
    }

    async fn insert_order(&mut self, order: &Order, items: &[OrderItem]) -> Result<()> {
        if take_fault(&self.faults.order_number_collisions) {
            return Err(StoreError::UniqueViolation {
                constraint: ORDER_NUMBER_CONSTRAINT.to_string(),
            });
        }

        let tables = self.tables.read().await;
        if self.order_number_taken(&tables, order) {
            return Err(StoreError::UniqueViolation {
                constraint: ORDER_NUMBER_CONSTRAINT.to_string(),
            });
        }
        for item in items {
            if tables.items.contains_key(&item.id) || self.items.contains_key(&item.id) {
                return Err(StoreError::UniqueViolation {
                    constraint: OrderItem::PRIMARY_KEY.to_string(),
                });
            }
        }

        stage_insert(&mut self.orders, &tables.orders, order.id, order)?;
        for item in items {
            stage_insert(&mut self.items, &tables.items, item.id, item)?;
        }
        Ok(())
    }

    async fn update_order(&mut self, order: &mut Order) -> Result<()> {
        let tables = self.tables.read().await;
        stage_update(&mut self.orders, &tables.orders, order.id, order)
    }

    async fn get_order_items(&mut self, order_id: OrderId) -> Result<Vec<OrderItem>> {
        let tables = self.tables.read().await;
        let mut ids: Vec<OrderItemId> = tables
            .items
            .values()
            .filter(|item| item.order_id == order_id)
            .map(|item| item.id)
            .collect();
        ids.extend(
            self.items
                .values()
                .filter(|row| row.base.is_none() && row.value.order_id == order_id)
                .map(|row| row.value.id),
        );

        let mut items: Vec<OrderItem> = ids
            .into_iter()
            .filter_map(|id| stage_read(&mut self.items, &tables.items, id))
            .collect();
        items.sort_by_key(|item| (item.product_id, item.id));
        Ok(items)
    }

    async fn order_id_for_item(&mut self, item_id: OrderItemId) -> Result<Option<OrderId>> {
        if let Some(row) = self.items.get(&item_id) {
            return Ok(Some(row.value.order_id));
        }
        let tables = self.tables.read().await;
        Ok(tables.items.get(&item_id).map(|item| item.order_id))
    }

    async fn update_order_item(&mut self, item: &mut OrderItem) -> Result<()> {
        let tables = self.tables.read().await;
        stage_update(&mut self.items, &tables.items, item.id, item)
    }

    async fn commit(self) -> Result<()> {
        let mut tables = self.tables.write().await;

        if take_fault(&self.faults.commit_conflicts) {
            return Err(StoreError::conflict("transaction", "injected"));
        }

        validate(&self.products, &tables.products)?;
        validate(&self.orders, &tables.orders)?;
        validate(&self.items, &tables.items)?;
        for row in self.orders.values().filter(|row| row.base.is_none()) {
            if tables
                .orders
                .values()
                .any(|o| o.order_number == row.value.order_number)
            {
                return Err(StoreError::UniqueViolation {
                    constraint: ORDER_NUMBER_CONSTRAINT.to_string(),
                });
            }
        }

        apply(self.products, &mut tables.products);
        apply(self.orders, &mut tables.orders);
        apply(self.items, &mut tables.items);
        Ok(())
    }

    async fn rollback(self) -> Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use common::UserId;
    use domain::{Metadata, Money, OrderNumber, ProductStatus};

    fn product(stock: u32) -> Product {
        Product::new(
            UserId::new(),
            "Widget",
            Money::from_cents(500),
            stock,
            ProductStatus::Published,
        )
        .unwrap()
    }

    fn order_for(product: &Product) -> (Order, Vec<OrderItem>) {
        let id = OrderId::new();
        let items = vec![OrderItem::new(id, product, 1).unwrap()];
        let order = Order::new(
            id,
            UserId::new(),
            OrderNumber::generate(chrono::Utc::now()),
            &items,
            "1 Main St",
            None,
            Metadata::new(),
        )
        .unwrap();
        (order, items)
    }

    async fn seeded(store: &InMemoryStore, stock: u32) -> Product {
        let product = product(stock);
        let mut tx = store.begin().await.unwrap();
        tx.insert_product(&product).await.unwrap();
        tx.commit().await.unwrap();
        product
    }

    #[tokio::test]
    async fn uncommitted_writes_are_invisible() {
        let store = InMemoryStore::new();
        let product = product(3);

        let mut tx = store.begin().await.unwrap();
        tx.insert_product(&product).await.unwrap();
        assert!(tx.get_product(product.id).await.unwrap().is_some());
        drop(tx);

        let mut reader = store.begin().await.unwrap();
        assert!(reader.get_product(product.id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn update_bumps_version() {
        let store = InMemoryStore::new();
        let product = seeded(&store, 3).await;

        let mut tx = store.begin().await.unwrap();
        let mut loaded = tx.get_product(product.id).await.unwrap().unwrap();
        loaded.reserve(1).unwrap();
        tx.update_product(&mut loaded).await.unwrap();
        assert_eq!(loaded.version, 2);
        tx.commit().await.unwrap();

        let mut tx = store.begin().await.unwrap();
        let reloaded = tx.get_product(product.id).await.unwrap().unwrap();
        assert_eq!(reloaded.version, 2);
        assert_eq!(reloaded.stock(), 2);
    }

    #[tokio::test]
    async fn overlapping_writers_conflict() {
        let store = InMemoryStore::new();
        let product = seeded(&store, 3).await;

        let mut first = store.begin().await.unwrap();
        let mut second = store.begin().await.unwrap();

        let mut a = first.get_product(product.id).await.unwrap().unwrap();
        let mut b = second.get_product(product.id).await.unwrap().unwrap();
        a.reserve(1).unwrap();
        b.reserve(2).unwrap();
        first.update_product(&mut a).await.unwrap();
        second.update_product(&mut b).await.unwrap();

        first.commit().await.unwrap();
        let err = second.commit().await.unwrap_err();
        assert!(err.is_transient());
    }

    #[tokio::test]
    async fn stale_version_is_rejected_at_update() {
        let store = InMemoryStore::new();
        let product = seeded(&store, 3).await;

        let mut tx = store.begin().await.unwrap();
        let mut stale = product.clone();
        stale.version = 7;
        let err = tx.update_product(&mut stale).await.unwrap_err();
        assert!(matches!(err, StoreError::Conflict { .. }));
    }

    #[tokio::test]
    async fn duplicate_order_number_rejected() {
        let store = InMemoryStore::new();
        let product = seeded(&store, 5).await;
        let (order, items) = order_for(&product);

        let mut tx = store.begin().await.unwrap();
        tx.insert_order(&order, &items).await.unwrap();
        tx.commit().await.unwrap();

        let (mut other, other_items) = order_for(&product);
        other.order_number = order.order_number.clone();
        let mut tx = store.begin().await.unwrap();
        let err = tx.insert_order(&other, &other_items).await.unwrap_err();
        assert!(err.is_unique_violation_of(ORDER_NUMBER_CONSTRAINT));
    }

    #[tokio::test]
    async fn order_items_listed_with_staged_inserts() {
        let store = InMemoryStore::new();
        let product = seeded(&store, 5).await;
        let (order, items) = order_for(&product);

        let mut tx = store.begin().await.unwrap();
        tx.insert_order(&order, &items).await.unwrap();
        let listed = tx.get_order_items(order.id).await.unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(
            tx.order_id_for_item(items[0].id).await.unwrap(),
            Some(order.id)
        );
        tx.commit().await.unwrap();

        assert_eq!(store.order_count().await, 1);
        assert_eq!(store.order_item_count().await, 1);
    }

    #[tokio::test]
    async fn injected_conflicts_fail_commits() {
        let store = InMemoryStore::new();
        store.inject_commit_conflicts(1);

        let tx = store.begin().await.unwrap();
        assert!(tx.commit().await.unwrap_err().is_transient());

        let tx = store.begin().await.unwrap();
        tx.commit().await.unwrap();
    }

    #[tokio::test]
    async fn injected_collisions_fail_inserts() {
        let store = InMemoryStore::new();
        let product = seeded(&store, 5).await;
        store.inject_order_number_collisions(1);

        let (order, items) = order_for(&product);
        let mut tx = store.begin().await.unwrap();
        let err = tx.insert_order(&order, &items).await.unwrap_err();
        assert!(err.is_unique_violation_of(ORDER_NUMBER_CONSTRAINT));
        tx.insert_order(&order, &items).await.unwrap();
    }
}
