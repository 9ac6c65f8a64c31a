//! Read access to the transaction ledger.

use common::TransactionId;
use domain::{Actor, Transaction};
use store::MarketplaceStore;

use crate::error::{Result, SettlementError};

/// Serves transactions to admins (all of them) and store owners (their own).
#[derive(Clone)]
pub struct TransactionLedger<S: MarketplaceStore> {
    store: S,
}

impl<S: MarketplaceStore> TransactionLedger<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    /// Lists the transactions visible to `actor`, newest first.
    pub async fn list(&self, actor: &Actor) -> Result<Vec<Transaction>> {
        let scope = if actor.is_staff {
            None
        } else {
            Some(
                actor
                    .store_id
                    .ok_or(SettlementError::Forbidden("view transactions"))?,
            )
        };
        Ok(self.store.transactions(scope).await?)
    }

    /// Retrieves one transaction if `actor` is an admin or owns its store.
    pub async fn get(&self, actor: &Actor, transaction_id: TransactionId) -> Result<Transaction> {
        let transaction = self
            .store
            .transaction(transaction_id)
            .await?
            .ok_or_else(|| SettlementError::not_found("Transaction", transaction_id))?;

        if !actor.is_staff && !actor.owns_store(transaction.store_id) {
            return Err(SettlementError::Forbidden("view this transaction"));
        }
        Ok(transaction)
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use common::{BookId, StoreId, UserId};
    use domain::{
        FeePercentage, FeeSplit, Money, Order, OrderItem, PaymentMethod, ShippingInfo,
    };
    use store::InMemoryMarketplaceStore;

    use super::*;

    async fn record(store: &InMemoryMarketplaceStore, store_id: StoreId) -> Transaction {
        let order = Order::place(
            UserId::new(),
            store_id,
            vec![OrderItem {
                book_id: BookId::new(),
                quantity: 1,
                unit_price: Money::from_cents(3000),
            }],
            PaymentMethod::Online,
            ShippingInfo::new(Some("addr"), Some("phone")).unwrap(),
            Utc::now(),
        );
        let txn = Transaction::for_order(
            &order,
            FeeSplit::compute(order.total_price, FeePercentage::DEFAULT),
            Utc::now(),
        );
        let mut uow = store.begin().await.unwrap();
        uow.insert_order(&order).await.unwrap();
        uow.insert_transaction(&txn).await.unwrap();
        uow.commit().await.unwrap();
        txn
    }

    #[tokio::test]
    async fn test_visibility_by_role() {
        let store = InMemoryMarketplaceStore::new();
        let mine = StoreId::new();
        let theirs = StoreId::new();
        let own_txn = record(&store, mine).await;
        let other_txn = record(&store, theirs).await;
        let ledger = TransactionLedger::new(store);

        let admin = Actor::admin(UserId::new());
        let vendor = Actor::vendor(UserId::new(), mine);
        let customer = Actor::customer(UserId::new());

        assert_eq!(ledger.list(&admin).await.unwrap().len(), 2);
        let listed = ledger.list(&vendor).await.unwrap();
        assert_eq!(listed, vec![own_txn.clone()]);
        assert_eq!(
            ledger.list(&customer).await.unwrap_err().kind(),
            "NotAuthorized"
        );

        assert_eq!(ledger.get(&vendor, own_txn.id).await.unwrap(), own_txn);
        assert_eq!(
            ledger.get(&vendor, other_txn.id).await.unwrap_err().kind(),
            "NotAuthorized"
        );
        assert!(ledger.get(&admin, other_txn.id).await.is_ok());
        assert_eq!(
            ledger
                .get(&admin, TransactionId::new())
                .await
                .unwrap_err()
                .kind(),
            "NotFound"
        );
    }
}
