//! Order aggregate: a single store's share of a checkout.

use chrono::{DateTime, Utc};
use common::{BookId, OrderId, StoreId, UserId};
use serde::{Deserialize, Serialize};

use crate::actor::Actor;
use crate::checkout::ShippingInfo;
use crate::money::Money;
use crate::transaction::TransactionStatus;

use super::{OrderError, OrderStatus, PaymentMethod, PaymentStatus};

/// A purchased book with the price captured at order time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderItem {
    pub book_id: BookId,
    pub quantity: u32,
    pub unit_price: Money,
}

impl OrderItem {
    /// Returns the total price for this item (quantity * unit_price).
    pub fn line_total(&self) -> Money {
        self.unit_price.multiply(self.quantity)
    }
}

/// Order aggregate root.
///
/// `total_price` is a settlement snapshot taken when the order is placed and
/// is never recomputed. `payment_status` only changes through
/// [`Order::apply_transition`] and [`Order::mark_paid`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Order {
    pub id: OrderId,
    pub customer_id: UserId,
    pub store_id: StoreId,
    pub total_price: Money,
    pub status: OrderStatus,
    pub payment_method: PaymentMethod,
    pub payment_status: PaymentStatus,
    pub shipping: ShippingInfo,
    /// External checkout session covering this order, once one is created.
    pub payment_session: Option<String>,
    pub created_at: DateTime<Utc>,
    pub items: Vec<OrderItem>,
}

/// The effects of one legal status transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransitionPlan {
    pub from: OrderStatus,
    pub to: OrderStatus,
    /// Give every item's quantity back to its book.
    pub restore_stock: bool,
    /// New payment status, if the transition changes it.
    pub payment_status: Option<PaymentStatus>,
    /// New status for the paired transaction, if the transition changes it.
    pub transaction_status: Option<TransactionStatus>,
}

impl Order {
    /// Places a new pending order over `items`.
    pub fn place(
        customer_id: UserId,
        store_id: StoreId,
        items: Vec<OrderItem>,
        payment_method: PaymentMethod,
        shipping: ShippingInfo,
        now: DateTime<Utc>,
    ) -> Self {
        let total_price = items.iter().map(OrderItem::line_total).sum();
        Self {
            id: OrderId::new(),
            customer_id,
            store_id,
            total_price,
            status: OrderStatus::Pending,
            payment_method,
            payment_status: PaymentStatus::Pending,
            shipping,
            payment_session: None,
            created_at: now,
            items,
        }
    }

    /// Returns the total quantity of all items.
    pub fn total_quantity(&self) -> u32 {
        self.items.iter().map(|item| item.quantity).sum()
    }

    /// Returns true if `actor` may read this order.
    pub fn visible_to(&self, actor: &Actor) -> bool {
        actor.access_to(self.customer_id, self.store_id).can_view()
    }

    /// Checks that `actor` may move this order to `to` and works out what the
    /// move changes. Nothing is mutated.
    pub fn plan_transition(
        &self,
        actor: &Actor,
        to: OrderStatus,
    ) -> Result<TransitionPlan, OrderError> {
        let access = actor.access_to(self.customer_id, self.store_id);
        let permitted = match to {
            OrderStatus::Canceled => access.can_cancel(),
            _ => access.can_advance(),
        };
        if !permitted {
            return Err(OrderError::NotAuthorized {
                order_id: self.id,
                action: "change the status of",
            });
        }

        if !self.status.can_transition_to(to) {
            return Err(OrderError::IllegalTransition {
                from: self.status,
                to,
            });
        }

        let (payment_status, transaction_status) = self.payment_effects(to);

        Ok(TransitionPlan {
            from: self.status,
            to,
            restore_stock: to == OrderStatus::Canceled,
            payment_status,
            transaction_status,
        })
    }

    fn payment_effects(
        &self,
        to: OrderStatus,
    ) -> (Option<PaymentStatus>, Option<TransactionStatus>) {
        use PaymentMethod::{Cod, Online};

        match (to, self.payment_method, self.payment_status) {
            (OrderStatus::Canceled, Online, PaymentStatus::Paid) => (
                Some(PaymentStatus::Refunded),
                Some(TransactionStatus::Refunded),
            ),
            (OrderStatus::Canceled, Cod, PaymentStatus::Pending) => {
                (Some(PaymentStatus::Failed), Some(TransactionStatus::Failed))
            }
            (OrderStatus::Completed, Cod, _) => {
                (Some(PaymentStatus::Paid), Some(TransactionStatus::Completed))
            }
            (OrderStatus::Refunded, Cod, _) => {
                (Some(PaymentStatus::Failed), Some(TransactionStatus::Failed))
            }
            (OrderStatus::Refunded, Online, _) => (
                Some(PaymentStatus::Refunded),
                Some(TransactionStatus::Refunded),
            ),
            _ => (None, None),
        }
    }

    /// Applies a plan produced by [`Order::plan_transition`].
    pub fn apply_transition(&mut self, plan: &TransitionPlan) {
        self.status = plan.to;
        if let Some(payment_status) = plan.payment_status {
            self.payment_status = payment_status;
        }
    }

    /// Returns true if a confirmed gateway payment should settle this order.
    pub fn awaiting_online_payment(&self) -> bool {
        self.payment_method == PaymentMethod::Online
            && self.payment_status == PaymentStatus::Pending
            && self.status != OrderStatus::Canceled
    }

    /// Records a confirmed gateway payment.
    ///
    /// Returns false, changing nothing, if the order is not awaiting one.
    pub fn mark_paid(&mut self) -> bool {
        if !self.awaiting_online_payment() {
            return false;
        }
        self.payment_status = PaymentStatus::Paid;
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn order(method: PaymentMethod) -> (Order, Actor, Actor) {
        let customer = UserId::new();
        let store = StoreId::new();
        let order = Order::place(
            customer,
            store,
            vec![
                OrderItem {
                    book_id: BookId::new(),
                    quantity: 2,
                    unit_price: Money::from_cents(1000),
                },
                OrderItem {
                    book_id: BookId::new(),
                    quantity: 1,
                    unit_price: Money::from_cents(450),
                },
            ],
            method,
            ShippingInfo::new(Some("addr"), Some("phone")).unwrap(),
            Utc::now(),
        );
        (
            order,
            Actor::customer(customer),
            Actor::vendor(UserId::new(), store),
        )
    }

    #[test]
    fn test_place_snapshots_total() {
        let (order, _, _) = order(PaymentMethod::Cod);
        assert_eq!(order.total_price, Money::from_cents(2450));
        assert_eq!(order.total_quantity(), 3);
        assert_eq!(order.status, OrderStatus::Pending);
        assert_eq!(order.payment_status, PaymentStatus::Pending);
        assert!(order.payment_session.is_none());
    }

    #[test]
    fn test_cancel_pending_cod_fails_payment() {
        let (mut order, customer, _) = order(PaymentMethod::Cod);

        let plan = order
            .plan_transition(&customer, OrderStatus::Canceled)
            .unwrap();
        assert!(plan.restore_stock);
        assert_eq!(plan.payment_status, Some(PaymentStatus::Failed));
        assert_eq!(plan.transaction_status, Some(TransactionStatus::Failed));

        order.apply_transition(&plan);
        assert_eq!(order.status, OrderStatus::Canceled);
        assert_eq!(order.payment_status, PaymentStatus::Failed);
    }

    #[test]
    fn test_cancel_paid_online_refunds() {
        let (mut order, _, vendor) = order(PaymentMethod::Online);
        assert!(order.mark_paid());

        let plan = order.plan_transition(&vendor, OrderStatus::Canceled).unwrap();
        assert!(plan.restore_stock);
        assert_eq!(plan.payment_status, Some(PaymentStatus::Refunded));
        assert_eq!(plan.transaction_status, Some(TransactionStatus::Refunded));
    }

    #[test]
    fn test_cancel_unpaid_online_leaves_payment() {
        let (order, customer, _) = order(PaymentMethod::Online);
        let plan = order
            .plan_transition(&customer, OrderStatus::Canceled)
            .unwrap();
        assert!(plan.restore_stock);
        assert_eq!(plan.payment_status, None);
        assert_eq!(plan.transaction_status, None);
    }

    #[test]
    fn test_forward_path_cod() {
        let (mut order, _, vendor) = order(PaymentMethod::Cod);

        for to in [OrderStatus::Processing, OrderStatus::Shipped] {
            let plan = order.plan_transition(&vendor, to).unwrap();
            assert!(!plan.restore_stock);
            assert_eq!(plan.payment_status, None);
            assert_eq!(plan.transaction_status, None);
            order.apply_transition(&plan);
        }

        let plan = order
            .plan_transition(&vendor, OrderStatus::Completed)
            .unwrap();
        assert_eq!(plan.payment_status, Some(PaymentStatus::Paid));
        assert_eq!(plan.transaction_status, Some(TransactionStatus::Completed));
        order.apply_transition(&plan);
        assert_eq!(order.payment_status, PaymentStatus::Paid);
        assert!(order.status.is_terminal());
    }

    #[test]
    fn test_refund_effects_by_method() {
        let (mut cod, _, cod_vendor) = order(PaymentMethod::Cod);
        cod.status = OrderStatus::Shipped;
        let plan = cod
            .plan_transition(&cod_vendor, OrderStatus::Refunded)
            .unwrap();
        assert_eq!(plan.payment_status, Some(PaymentStatus::Failed));
        assert_eq!(plan.transaction_status, Some(TransactionStatus::Failed));

        let (mut online, _, online_vendor) = order(PaymentMethod::Online);
        online.mark_paid();
        online.status = OrderStatus::Shipped;
        let plan = online
            .plan_transition(&online_vendor, OrderStatus::Refunded)
            .unwrap();
        assert_eq!(plan.payment_status, Some(PaymentStatus::Refunded));
        assert_eq!(plan.transaction_status, Some(TransactionStatus::Refunded));
    }

    #[test]
    fn test_completing_online_order_leaves_payment() {
        let (mut order, _, vendor) = order(PaymentMethod::Online);
        order.mark_paid();
        order.status = OrderStatus::Shipped;
        let plan = order
            .plan_transition(&vendor, OrderStatus::Completed)
            .unwrap();
        assert_eq!(plan.payment_status, None);
        assert_eq!(plan.transaction_status, None);
    }

    #[test]
    fn test_illegal_transitions_rejected() {
        let (base, _, vendor) = order(PaymentMethod::Cod);
        for from in OrderStatus::ALL {
            for to in OrderStatus::ALL {
                if from.can_transition_to(to) {
                    continue;
                }
                let mut order = base.clone();
                order.status = from;
                let before = order.clone();

                let err = order.plan_transition(&vendor, to).unwrap_err();
                assert!(
                    matches!(err, OrderError::IllegalTransition { from: f, to: t } if f == from && t == to)
                );
                assert_eq!(order, before);
            }
        }
    }

    #[test]
    fn test_customer_cannot_advance() {
        let (order, customer, _) = order(PaymentMethod::Cod);
        let err = order
            .plan_transition(&customer, OrderStatus::Processing)
            .unwrap_err();
        assert!(matches!(err, OrderError::NotAuthorized { .. }));
    }

    #[test]
    fn test_stranger_cannot_cancel() {
        let (order, _, _) = order(PaymentMethod::Cod);
        let stranger = Actor::customer(UserId::new());
        let err = order
            .plan_transition(&stranger, OrderStatus::Canceled)
            .unwrap_err();
        assert!(matches!(err, OrderError::NotAuthorized { .. }));
        assert!(!order.visible_to(&stranger));
    }

    #[test]
    fn test_admin_can_advance() {
        let (order, _, _) = order(PaymentMethod::Cod);
        let admin = Actor::admin(UserId::new());
        assert!(order.plan_transition(&admin, OrderStatus::Processing).is_ok());
    }

    #[test]
    fn test_mark_paid_is_idempotent() {
        let (mut order, _, _) = order(PaymentMethod::Online);
        assert!(order.awaiting_online_payment());
        assert!(order.mark_paid());
        assert!(!order.mark_paid());
        assert_eq!(order.payment_status, PaymentStatus::Paid);
    }

    #[test]
    fn test_mark_paid_ignores_cod_and_canceled() {
        let (mut cod, _, _) = order(PaymentMethod::Cod);
        assert!(!cod.mark_paid());

        let (mut canceled, _, _) = order(PaymentMethod::Online);
        canceled.status = OrderStatus::Canceled;
        assert!(!canceled.mark_paid());
        assert_eq!(canceled.payment_status, PaymentStatus::Pending);
    }
}
