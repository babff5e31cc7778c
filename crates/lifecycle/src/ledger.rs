//! Stock ledger: the only writer of product stock counters.

use common::ProductId;
use domain::{Product, ProductStatus};
use store::Transaction;

use crate::error::{LifecycleError, Result};

/// Atomic stock adjustments inside the caller's transaction.
///
/// Nothing here commits or notifies. Availability flips between `published`
/// and `out_of_stock` follow the stock counter.
#[derive(Debug, Clone, Copy, Default)]
pub struct StockLedger;

impl StockLedger {
    pub fn new() -> Self {
        Self
    }

    /// Takes `quantity` units of a product out of stock.
    pub async fn reserve<T: Transaction>(
        &self,
        tx: &mut T,
        product_id: ProductId,
        quantity: u32,
    ) -> Result<Product> {
        let mut product = load(tx, product_id).await?;
        let before = product.status();
        product.reserve(quantity)?;
        tx.update_product(&mut product).await?;
        log_adjustment("reserve", &product, before, quantity);
        Ok(product)
    }

    /// Puts `quantity` units of a product back into stock.
    pub async fn release<T: Transaction>(
        &self,
        tx: &mut T,
        product_id: ProductId,
        quantity: u32,
    ) -> Result<Product> {
        let mut product = load(tx, product_id).await?;
        let before = product.status();
        product.release(quantity)?;
        tx.update_product(&mut product).await?;
        log_adjustment("release", &product, before, quantity);
        Ok(product)
    }

    /// Replaces a product's stock with an absolute value.
    pub async fn set_stock<T: Transaction>(
        &self,
        tx: &mut T,
        product_id: ProductId,
        stock: u32,
    ) -> Result<Product> {
        let mut product = load(tx, product_id).await?;
        let before = product.status();
        product.set_stock(stock);
        tx.update_product(&mut product).await?;
        log_adjustment("set_stock", &product, before, stock);
        Ok(product)
    }
}

async fn load<T: Transaction>(tx: &mut T, product_id: ProductId) -> Result<Product> {
    tx.get_product(product_id)
        .await?
        .ok_or_else(|| LifecycleError::not_found("product", product_id))
}

fn log_adjustment(action: &'static str, product: &Product, before: ProductStatus, quantity: u32) {
    tracing::debug!(
        action,
        product_id = %product.id,
        quantity,
        stock = product.stock(),
        "stock adjusted"
    );
    if before != product.status() {
        tracing::info!(
            product_id = %product.id,
            from = %before,
            to = %product.status(),
            "product availability changed"
        );
    }
}

#[cfg(test)]
mod tests {
    use common::UserId;
    use domain::{DomainError, Money};
    use store::{InMemoryStore, Store};

    use super::*;

    async fn seeded(store: &InMemoryStore, stock: u32, status: ProductStatus) -> ProductId {
        let product =
            Product::new(UserId::new(), "Widget", Money::from_cents(100), stock, status).unwrap();
        let mut tx = store.begin().await.unwrap();
        tx.insert_product(&product).await.unwrap();
        tx.commit().await.unwrap();
        product.id
    }

    #[tokio::test]
    async fn reserve_to_zero_flips_out_of_stock() {
        let store = InMemoryStore::new();
        let id = seeded(&store, 2, ProductStatus::Published).await;
        let ledger = StockLedger::new();

        let mut tx = store.begin().await.unwrap();
        let product = ledger.reserve(&mut tx, id, 2).await.unwrap();
        assert_eq!(product.stock(), 0);
        assert_eq!(product.status(), ProductStatus::OutOfStock);

        let product = ledger.release(&mut tx, id, 1).await.unwrap();
        assert_eq!(product.stock(), 1);
        assert_eq!(product.status(), ProductStatus::Published);
    }

    #[tokio::test]
    async fn over_reserve_is_insufficient_stock() {
        let store = InMemoryStore::new();
        let id = seeded(&store, 5, ProductStatus::Published).await;

        let mut tx = store.begin().await.unwrap();
        let err = StockLedger::new().reserve(&mut tx, id, 10).await.unwrap_err();
        assert!(matches!(
            err,
            LifecycleError::Domain(DomainError::InsufficientStock {
                requested: 10,
                available: 5,
                ..
            })
        ));
        let product = tx.get_product(id).await.unwrap().unwrap();
        assert_eq!(product.stock(), 5);
    }

    #[tokio::test]
    async fn draft_products_cannot_be_reserved() {
        let store = InMemoryStore::new();
        let id = seeded(&store, 5, ProductStatus::Draft).await;

        let mut tx = store.begin().await.unwrap();
        let err = StockLedger::new().reserve(&mut tx, id, 1).await.unwrap_err();
        assert!(matches!(
            err,
            LifecycleError::Domain(DomainError::ProductUnavailable { .. })
        ));
    }

    #[tokio::test]
    async fn release_overflow_is_rejected() {
        let store = InMemoryStore::new();
        let id = seeded(&store, u32::MAX, ProductStatus::Published).await;

        let mut tx = store.begin().await.unwrap();
        let err = StockLedger::new().release(&mut tx, id, 1).await.unwrap_err();
        assert!(matches!(
            err,
            LifecycleError::Domain(DomainError::StockOverflow { .. })
        ));
    }

    #[tokio::test]
    async fn set_stock_restocks_out_of_stock_product() {
        let store = InMemoryStore::new();
        let id = seeded(&store, 0, ProductStatus::Published).await;
        let ledger = StockLedger::new();

        let mut tx = store.begin().await.unwrap();
        let product = tx.get_product(id).await.unwrap().unwrap();
        assert_eq!(product.status(), ProductStatus::OutOfStock);

        let product = ledger.set_stock(&mut tx, id, 7).await.unwrap();
        assert_eq!(product.stock(), 7);
        assert_eq!(product.status(), ProductStatus::Published);
    }

    #[tokio::test]
    async fn unknown_product_is_not_found() {
        let store = InMemoryStore::new();
        let mut tx = store.begin().await.unwrap();
        let err = StockLedger::new()
            .reserve(&mut tx, ProductId::new(), 1)
            .await
            .unwrap_err();
        assert!(matches!(err, LifecycleError::NotFound { entity: "product", .. }));
    }
}
