//! Marketplace fee configuration service.

use chrono::Utc;
use domain::{Actor, FeePercentage, FeeSplit, Money, SiteConfig};
use rust_decimal::Decimal;
use store::MarketplaceStore;

use crate::error::{Result, SettlementError};

/// Reads and updates the site-wide admin fee.
///
/// The configuration row is created on first use; readers never observe it
/// missing.
#[derive(Clone)]
pub struct FeePolicy<S: MarketplaceStore> {
    store: S,
}

impl<S: MarketplaceStore> FeePolicy<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    /// Creates the configuration row with defaults if it does not exist.
    #[tracing::instrument(skip(self))]
    pub async fn ensure_initialized(&self) -> Result<SiteConfig> {
        let mut uow = self.store.begin().await?;
        let config = uow.site_config().await?;
        uow.commit().await?;
        tracing::info!(
            admin_fee_percentage = %config.admin_fee_percentage,
            "Fee policy initialized"
        );
        Ok(config)
    }

    /// Returns the current configuration.
    pub async fn current(&self) -> Result<SiteConfig> {
        let mut uow = self.store.begin().await?;
        let config = uow.site_config().await?;
        uow.commit().await?;
        Ok(config)
    }

    /// Splits `gross` using the current percentage.
    pub async fn compute_split(&self, gross: Money) -> Result<FeeSplit> {
        let config = self.current().await?;
        Ok(FeeSplit::compute(gross, config.admin_fee_percentage))
    }

    /// Replaces the admin fee percentage. Admins only.
    ///
    /// Orders already placed keep the split they were created with.
    #[tracing::instrument(skip(self))]
    pub async fn update(&self, actor: &Actor, percentage: Decimal) -> Result<SiteConfig> {
        if !actor.is_staff {
            return Err(SettlementError::Forbidden("change the site configuration"));
        }
        let percentage = FeePercentage::new(percentage)?;

        let mut uow = self.store.begin().await?;
        let mut config = uow.lock_site_config().await?;
        config.admin_fee_percentage = percentage;
        config.updated_at = Utc::now();
        uow.save_site_config(&config).await?;
        uow.commit().await?;

        tracing::info!(admin_fee_percentage = %percentage, "Admin fee updated");
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use common::UserId;
    use store::InMemoryMarketplaceStore;

    use super::*;

    #[tokio::test]
    async fn test_defaults_to_ten_percent() {
        let policy = FeePolicy::new(InMemoryMarketplaceStore::new());
        let config = policy.ensure_initialized().await.unwrap();
        assert_eq!(config.admin_fee_percentage, FeePercentage::DEFAULT);

        let split = policy.compute_split(Money::from_cents(2000)).await.unwrap();
        assert_eq!(split.admin_fee, Money::from_cents(200));
        assert_eq!(split.store_earnings, Money::from_cents(1800));
    }

    #[tokio::test]
    async fn test_admin_updates_percentage() {
        let policy = FeePolicy::new(InMemoryMarketplaceStore::new());
        let admin = Actor::admin(UserId::new());

        policy.update(&admin, Decimal::new(1250, 2)).await.unwrap();

        let split = policy.compute_split(Money::from_cents(1000)).await.unwrap();
        assert_eq!(split.admin_fee, Money::from_cents(125));
        assert_eq!(split.store_earnings, Money::from_cents(875));
    }

    #[tokio::test]
    async fn test_update_rejects_non_admin_and_out_of_range() {
        let policy = FeePolicy::new(InMemoryMarketplaceStore::new());

        let err = policy
            .update(&Actor::customer(UserId::new()), Decimal::new(5, 0))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), "NotAuthorized");

        let err = policy
            .update(&Actor::admin(UserId::new()), Decimal::new(101, 0))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), "InvalidRequest");

        assert_eq!(
            policy.current().await.unwrap().admin_fee_percentage,
            FeePercentage::DEFAULT
        );
    }
}
