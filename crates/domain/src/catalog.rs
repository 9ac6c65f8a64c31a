//! Catalog and configuration records consumed by checkout.

use chrono::{DateTime, Utc};
use common::{BookId, StoreId};
use serde::{Deserialize, Serialize};

use crate::money::{FeePercentage, Money};

/// The fields of a catalog book that settlement depends on.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Book {
    pub id: BookId,
    pub store_id: StoreId,
    pub title: String,
    pub price: Money,
    pub stock_quantity: u32,
}

impl Book {
    /// Returns true if `quantity` units can be taken from stock.
    pub fn has_stock_for(&self, quantity: u32) -> bool {
        self.stock_quantity >= quantity
    }
}

/// Process-wide marketplace configuration (a single row).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SiteConfig {
    pub admin_fee_percentage: FeePercentage,
    pub updated_at: DateTime<Utc>,
}

impl SiteConfig {
    /// The configuration created when none exists yet.
    pub fn initial(now: DateTime<Utc>) -> Self {
        Self {
            admin_fee_percentage: FeePercentage::DEFAULT,
            updated_at: now,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_has_stock_for() {
        let book = Book {
            id: BookId::new(),
            store_id: StoreId::new(),
            title: "Dune".to_string(),
            price: Money::from_cents(1000),
            stock_quantity: 2,
        };
        assert!(book.has_stock_for(2));
        assert!(!book.has_stock_for(3));
    }

    #[test]
    fn test_initial_config_uses_default_fee() {
        let config = SiteConfig::initial(Utc::now());
        assert_eq!(config.admin_fee_percentage, FeePercentage::DEFAULT);
    }
}
