//! Catalog products and their stock counter.

use chrono::{DateTime, Utc};
use common::{ProductId, UserId};
use serde::{Deserialize, Serialize};

use crate::{DomainError, Money};

/// Availability of a product.
///
/// `OutOfStock` is owned by the stock counter: it is entered when stock hits
/// zero and left when stock becomes positive again.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ProductStatus {
    #[default]
    Draft,
    Published,
    Archived,
    OutOfStock,
}

impl ProductStatus {
    /// Returns the status name as a string.
    pub fn as_str(&self) -> &'static str {
        match self {
            ProductStatus::Draft => "draft",
            ProductStatus::Published => "published",
            ProductStatus::Archived => "archived",
            ProductStatus::OutOfStock => "out_of_stock",
        }
    }

    /// Returns true if orders may reserve this product.
    pub fn is_sellable(&self) -> bool {
        matches!(self, ProductStatus::Published | ProductStatus::OutOfStock)
    }
}

impl std::fmt::Display for ProductStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for ProductStatus {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "draft" => Ok(ProductStatus::Draft),
            "published" => Ok(ProductStatus::Published),
            "archived" => Ok(ProductStatus::Archived),
            "out_of_stock" => Ok(ProductStatus::OutOfStock),
            other => Err(DomainError::Validation(format!(
                "unknown product status: {other}"
            ))),
        }
    }
}

/// A seller's sellable unit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Product {
    pub id: ProductId,
    pub seller_id: UserId,
    pub name: String,
    pub price: Money,
    stock: u32,
    status: ProductStatus,
    /// Row version for optimistic concurrency.
    pub version: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Product {
    /// Creates a new product.
    ///
    /// A product published with zero stock starts out of stock.
    pub fn new(
        seller_id: UserId,
        name: impl Into<String>,
        price: Money,
        stock: u32,
        status: ProductStatus,
    ) -> Result<Self, DomainError> {
        if !price.is_positive() {
            return Err(DomainError::InvalidPrice {
                price: price.cents(),
            });
        }
        let name = name.into();
        if name.trim().is_empty() {
            return Err(DomainError::Validation(
                "product name is required".to_string(),
            ));
        }
        if status == ProductStatus::OutOfStock {
            return Err(DomainError::ProductStatusLocked {
                status: status.to_string(),
                reason: "managed by the stock counter",
            });
        }

        let now = Utc::now();
        let mut product = Self {
            id: ProductId::new(),
            seller_id,
            name,
            price,
            stock,
            status,
            version: 1,
            created_at: now,
            updated_at: now,
        };
        product.sync_availability();
        Ok(product)
    }

    /// Rebuilds a product from persisted fields.
    #[allow(clippy::too_many_arguments)]
    pub fn restore(
        id: ProductId,
        seller_id: UserId,
        name: String,
        price: Money,
        stock: u32,
        status: ProductStatus,
        version: i64,
        created_at: DateTime<Utc>,
        updated_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            seller_id,
            name,
            price,
            stock,
            status,
            version,
            created_at,
            updated_at,
        }
    }

    pub fn stock(&self) -> u32 {
        self.stock
    }

    pub fn status(&self) -> ProductStatus {
        self.status
    }

    /// Takes `quantity` units out of stock.
    pub fn reserve(&mut self, quantity: u32) -> Result<(), DomainError> {
        if quantity == 0 {
            return Err(DomainError::InvalidQuantity { quantity });
        }
        if !self.status.is_sellable() {
            return Err(DomainError::ProductUnavailable {
                product_id: self.id,
                status: self.status.to_string(),
            });
        }

        let remaining =
            self.stock
                .checked_sub(quantity)
                .ok_or(DomainError::InsufficientStock {
                    product_id: self.id,
                    requested: quantity,
                    available: self.stock,
                })?;

        self.stock = remaining;
        self.sync_availability();
        self.touch();
        Ok(())
    }

    /// Puts `quantity` units back into stock.
    pub fn release(&mut self, quantity: u32) -> Result<(), DomainError> {
        if quantity == 0 {
            return Err(DomainError::InvalidQuantity { quantity });
        }
        self.stock = self
            .stock
            .checked_add(quantity)
            .ok_or(DomainError::StockOverflow {
                product_id: self.id,
            })?;
        self.sync_availability();
        self.touch();
        Ok(())
    }

    /// Replaces the stock counter with an absolute value.
    pub fn set_stock(&mut self, stock: u32) {
        self.stock = stock;
        self.sync_availability();
        self.touch();
    }

    /// Applies a seller-requested status.
    ///
    /// `Published` with zero stock lands on `OutOfStock`; `OutOfStock` itself
    /// cannot be requested.
    pub fn set_status(&mut self, status: ProductStatus) -> Result<(), DomainError> {
        if status == ProductStatus::OutOfStock {
            return Err(DomainError::ProductStatusLocked {
                status: status.to_string(),
                reason: "managed by the stock counter",
            });
        }
        if status == ProductStatus::Published && self.stock == 0 {
            return Err(DomainError::ProductStatusLocked {
                status: status.to_string(),
                reason: "stock is zero",
            });
        }
        self.status = status;
        self.touch();
        Ok(())
    }

    fn sync_availability(&mut self) {
        self.status = match (self.status, self.stock) {
            (ProductStatus::Published, 0) => ProductStatus::OutOfStock,
            (ProductStatus::OutOfStock, n) if n > 0 => ProductStatus::Published,
            (status, _) => status,
        };
    }

    fn touch(&mut self) {
        self.updated_at = Utc::now();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn published(stock: u32) -> Product {
        Product::new(
            UserId::new(),
            "Widget",
            Money::from_cents(1000),
            stock,
            ProductStatus::Published,
        )
        .unwrap()
    }

    #[test]
    fn reserve_decrements_stock() {
        let mut product = published(5);
        product.reserve(2).unwrap();
        assert_eq!(product.stock(), 3);
        assert_eq!(product.status(), ProductStatus::Published);
    }

    #[test]
    fn reserve_more_than_available_fails_without_change() {
        let mut product = published(5);
        let err = product.reserve(10).unwrap_err();
        assert_eq!(
            err,
            DomainError::InsufficientStock {
                product_id: product.id,
                requested: 10,
                available: 5,
            }
        );
        assert_eq!(product.stock(), 5);
    }

    #[test]
    fn reaching_zero_flips_to_out_of_stock_and_back() {
        let mut product = published(2);
        product.reserve(2).unwrap();
        assert_eq!(product.stock(), 0);
        assert_eq!(product.status(), ProductStatus::OutOfStock);

        product.release(1).unwrap();
        assert_eq!(product.status(), ProductStatus::Published);
    }

    #[test]
    fn out_of_stock_product_reports_insufficient_stock() {
        let mut product = published(0);
        assert_eq!(product.status(), ProductStatus::OutOfStock);
        assert!(matches!(
            product.reserve(1),
            Err(DomainError::InsufficientStock { available: 0, .. })
        ));
    }

    #[test]
    fn draft_product_cannot_be_reserved() {
        let mut product = Product::new(
            UserId::new(),
            "Draft",
            Money::from_cents(100),
            3,
            ProductStatus::Draft,
        )
        .unwrap();
        assert!(matches!(
            product.reserve(1),
            Err(DomainError::ProductUnavailable { .. })
        ));
    }

    #[test]
    fn release_of_draft_does_not_publish() {
        let mut product = Product::new(
            UserId::new(),
            "Draft",
            Money::from_cents(100),
            0,
            ProductStatus::Draft,
        )
        .unwrap();
        product.release(3).unwrap();
        assert_eq!(product.status(), ProductStatus::Draft);
    }

    #[test]
    fn release_overflow_is_rejected() {
        let mut product = published(u32::MAX);
        assert!(matches!(
            product.release(1),
            Err(DomainError::StockOverflow { .. })
        ));
        assert_eq!(product.stock(), u32::MAX);
    }

    #[test]
    fn out_of_stock_is_not_settable() {
        let mut product = published(3);
        assert!(product.set_status(ProductStatus::OutOfStock).is_err());

        let mut empty = published(0);
        assert!(empty.set_status(ProductStatus::Published).is_err());
        empty.set_status(ProductStatus::Archived).unwrap();
        assert_eq!(empty.status(), ProductStatus::Archived);
    }

    #[test]
    fn set_stock_flips_availability() {
        let mut product = published(0);
        product.set_stock(4);
        assert_eq!(product.status(), ProductStatus::Published);
        product.set_stock(0);
        assert_eq!(product.status(), ProductStatus::OutOfStock);
    }

    #[test]
    fn zero_price_rejected() {
        let result = Product::new(
            UserId::new(),
            "Free",
            Money::zero(),
            1,
            ProductStatus::Published,
        );
        assert!(matches!(result, Err(DomainError::InvalidPrice { .. })));
    }
}
