//! Order views and status transitions.

use chrono::Utc;
use common::OrderId;
use domain::{Actor, Order, OrderStatus};
use store::MarketplaceStore;

use crate::error::{Result, SettlementError};

/// Drives orders through the status machine and serves order views.
///
/// Payment and transaction statuses change here only as consequences of a
/// transition; there is no way to set them directly.
#[derive(Clone)]
pub struct OrderLifecycle<S: MarketplaceStore> {
    store: S,
}

impl<S: MarketplaceStore> OrderLifecycle<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    /// Retrieves an order visible to `actor`.
    ///
    /// Orders the actor may not see are reported as missing.
    pub async fn order(&self, actor: &Actor, order_id: OrderId) -> Result<Order> {
        self.store
            .order(order_id)
            .await?
            .filter(|order| order.visible_to(actor))
            .ok_or_else(|| SettlementError::not_found("Order", order_id))
    }

    /// Orders placed by the actor, newest first.
    pub async fn orders_for_customer(&self, actor: &Actor) -> Result<Vec<Order>> {
        Ok(self.store.orders_for_customer(actor.user_id).await?)
    }

    /// Orders received by the actor's store, newest first.
    pub async fn orders_for_store(&self, actor: &Actor) -> Result<Vec<Order>> {
        let store_id = actor
            .store_id
            .ok_or(SettlementError::Forbidden("view store orders"))?;
        Ok(self.store.orders_for_store(store_id).await?)
    }

    /// Moves an order to the status named by `status`.
    pub async fn transition(
        &self,
        actor: &Actor,
        order_id: OrderId,
        status: &str,
    ) -> Result<Order> {
        let to: OrderStatus = status.parse()?;
        self.transition_to(actor, order_id, to).await
    }

    /// Cancels an order, returning its stock.
    pub async fn cancel(&self, actor: &Actor, order_id: OrderId) -> Result<Order> {
        self.transition_to(actor, order_id, OrderStatus::Canceled).await
    }

    #[tracing::instrument(skip(self, actor), fields(user_id = %actor.user_id))]
    async fn transition_to(
        &self,
        actor: &Actor,
        order_id: OrderId,
        to: OrderStatus,
    ) -> Result<Order> {
        let mut uow = self.store.begin().await?;
        let mut order = uow
            .lock_order(order_id)
            .await?
            .ok_or_else(|| SettlementError::not_found("Order", order_id))?;

        let plan = order.plan_transition(actor, to)?;
        order.apply_transition(&plan);

        if plan.restore_stock {
            let mut items = order.items.clone();
            // Same lock order as checkout.
            items.sort_by_key(|item| item.book_id);
            for item in &items {
                uow.restore_stock(item.book_id, item.quantity).await?;
            }
        }

        if !uow.update_order(&order, plan.from).await? {
            return Err(SettlementError::Conflict(order_id));
        }

        if let Some(status) = plan.transaction_status {
            uow.update_transaction_status(order_id, status, Utc::now())
                .await?;
        }

        uow.commit().await?;

        metrics::counter!("order_transitions_total", "to" => to.as_str()).increment(1);
        tracing::info!(
            from = %plan.from,
            to = %plan.to,
            payment_status = %order.payment_status,
            "Order status changed"
        );
        Ok(order)
    }
}

#[cfg(test)]
mod tests {
    use common::{BookId, StoreId, UserId};
    use domain::{
        Book, FeePercentage, FeeSplit, Money, OrderItem, PaymentMethod, PaymentStatus,
        ShippingInfo, Transaction, TransactionStatus,
    };
    use store::InMemoryMarketplaceStore;

    use super::*;

    struct Fixture {
        store: InMemoryMarketplaceStore,
        lifecycle: OrderLifecycle<InMemoryMarketplaceStore>,
        order: Order,
        book: Book,
        customer: Actor,
        vendor: Actor,
    }

    async fn fixture(method: PaymentMethod) -> Fixture {
        let store = InMemoryMarketplaceStore::new();
        let book = Book {
            id: BookId::new(),
            store_id: StoreId::new(),
            title: "Parable of the Sower".to_string(),
            price: Money::from_cents(1200),
            stock_quantity: 3,
        };
        store.insert_book(book.clone()).await;

        let customer = Actor::customer(UserId::new());
        let vendor = Actor::vendor(UserId::new(), book.store_id);
        let order = Order::place(
            customer.user_id,
            book.store_id,
            vec![OrderItem {
                book_id: book.id,
                quantity: 2,
                unit_price: book.price,
            }],
            method,
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

        Fixture {
            lifecycle: OrderLifecycle::new(store.clone()),
            store,
            order,
            book,
            customer,
            vendor,
        }
    }

    #[tokio::test]
    async fn test_vendor_drives_cod_order_to_completion() {
        let f = fixture(PaymentMethod::Cod).await;

        for status in ["processing", "shipped", "completed"] {
            f.lifecycle
                .transition(&f.vendor, f.order.id, status)
                .await
                .unwrap();
        }

        let order = f.lifecycle.order(&f.customer, f.order.id).await.unwrap();
        assert_eq!(order.status, OrderStatus::Completed);
        assert_eq!(order.payment_status, PaymentStatus::Paid);
        let txn = f.store.transaction_for_order(f.order.id).await.unwrap().unwrap();
        assert_eq!(txn.status, TransactionStatus::Completed);
    }

    #[tokio::test]
    async fn test_customer_cancel_restores_stock() {
        let f = fixture(PaymentMethod::Cod).await;

        let order = f.lifecycle.cancel(&f.customer, f.order.id).await.unwrap();

        assert_eq!(order.status, OrderStatus::Canceled);
        assert_eq!(order.payment_status, PaymentStatus::Failed);
        assert_eq!(f.store.stock_of(f.book.id).await, Some(5));
    }

    #[tokio::test]
    async fn test_customer_cannot_advance() {
        let f = fixture(PaymentMethod::Cod).await;

        let err = f
            .lifecycle
            .transition(&f.customer, f.order.id, "processing")
            .await
            .unwrap_err();
        assert_eq!(err.kind(), "NotAuthorized");
    }

    #[tokio::test]
    async fn test_illegal_transition_changes_nothing() {
        let f = fixture(PaymentMethod::Cod).await;

        let err = f
            .lifecycle
            .transition(&f.vendor, f.order.id, "shipped")
            .await
            .unwrap_err();
        assert_eq!(err.kind(), "IllegalTransition");

        let order = f.store.order(f.order.id).await.unwrap().unwrap();
        assert_eq!(order, f.order);
        assert_eq!(f.store.stock_of(f.book.id).await, Some(3));
    }

    #[tokio::test]
    async fn test_unknown_status() {
        let f = fixture(PaymentMethod::Cod).await;
        let err = f
            .lifecycle
            .transition(&f.vendor, f.order.id, "teleported")
            .await
            .unwrap_err();
        assert_eq!(err.kind(), "UnknownStatus");
    }

    #[tokio::test]
    async fn test_strangers_see_not_found() {
        let f = fixture(PaymentMethod::Cod).await;
        let stranger = Actor::customer(UserId::new());

        let err = f.lifecycle.order(&stranger, f.order.id).await.unwrap_err();
        assert_eq!(err.kind(), "NotFound");
        assert!(f.lifecycle.order(&f.vendor, f.order.id).await.is_ok());
        assert!(
            f.lifecycle
                .order(&Actor::admin(UserId::new()), f.order.id)
                .await
                .is_ok()
        );
    }

    #[tokio::test]
    async fn test_store_orders_require_a_store() {
        let f = fixture(PaymentMethod::Online).await;

        assert_eq!(
            f.lifecycle.orders_for_store(&f.vendor).await.unwrap().len(),
            1
        );
        assert_eq!(
            f.lifecycle
                .orders_for_store(&f.customer)
                .await
                .unwrap_err()
                .kind(),
            "NotAuthorized"
        );
        assert_eq!(
            f.lifecycle
                .orders_for_customer(&f.customer)
                .await
                .unwrap()
                .len(),
            1
        );
    }
}
