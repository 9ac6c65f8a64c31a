//! Integration tests for the order rules.
//!
//! These tests drive carts through selection, grouping and assembly, then walk
//! the resulting orders through every status pair.

use chrono::Utc;
use common::{BookId, CartItemId, StoreId, UserId};
use domain::{
    Actor, CartItem, CartLine, CartSelection, FeePercentage, FeeSplit, Money, Order, OrderError,
    OrderStatus, PaymentMethod, PaymentStatus, ShippingInfo, TransactionStatus,
    assemble_store_order, group_by_store,
};

fn line(store_id: StoreId, quantity: u32, cents: i64) -> CartLine {
    CartLine {
        item: CartItem {
            id: CartItemId::new(),
            book_id: BookId::new(),
            quantity,
            unit_price: Money::from_cents(cents),
        },
        store_id,
    }
}

fn shipping() -> ShippingInfo {
    ShippingInfo::new(Some("77 Shevek St"), Some("555-0177")).unwrap()
}

fn place(lines: &[CartLine], method: PaymentMethod) -> Order {
    let customer = UserId::new();
    let (order, _) = assemble_store_order(
        customer,
        lines[0].store_id,
        lines,
        method,
        &shipping(),
        FeePercentage::DEFAULT,
        Utc::now(),
    );
    order
}

mod checkout_assembly {
    use super::*;

    #[test]
    fn totals_are_preserved_across_stores() {
        let stores = [StoreId::new(), StoreId::new(), StoreId::new()];
        let cart: Vec<CartLine> = (0..9)
            .map(|i| line(stores[i % 3], (i + 1) as u32, 333 + i as i64))
            .collect();
        let expected: Money = cart.iter().map(|l| l.item.line_total()).sum();

        let selected = CartSelection::All.apply(cart).unwrap();
        let customer = UserId::new();
        let mut total = Money::zero();
        let mut previous: Option<StoreId> = None;

        for (store_id, lines) in group_by_store(selected) {
            assert!(previous.is_none_or(|p| p < store_id));
            previous = Some(store_id);

            let (order, txn) = assemble_store_order(
                customer,
                store_id,
                &lines,
                PaymentMethod::Online,
                &shipping(),
                FeePercentage::DEFAULT,
                Utc::now(),
            );
            assert_eq!(order.items.len(), 3);
            assert_eq!(txn.amount, order.total_price);
            assert_eq!(txn.admin_fee + txn.store_earnings, txn.amount);
            assert_eq!(txn.store_id, store_id);
            assert_eq!(txn.status, TransactionStatus::Pending);
            total += order.total_price;
        }

        assert_eq!(total, expected);
    }

    #[test]
    fn fee_split_sums_for_every_whole_percentage() {
        for pct in 0..=100u32 {
            let fee = FeePercentage::from_basis_points(pct * 100).unwrap();
            for cents in [0, 1, 5, 99, 1_000, 123_457, 9_999_999] {
                let split = FeeSplit::compute(Money::from_cents(cents), fee);
                assert_eq!(
                    split.admin_fee + split.store_earnings,
                    split.amount,
                    "{pct}% of {cents}"
                );
                assert!(!split.admin_fee.is_negative());
                assert!(!split.store_earnings.is_negative());
            }
        }
    }

    #[test]
    fn ten_percent_of_twenty() {
        let split = FeeSplit::compute(Money::from_cents(2000), FeePercentage::DEFAULT);
        assert_eq!(split.admin_fee, Money::from_cents(200));
        assert_eq!(split.store_earnings, Money::from_cents(1800));
    }
}

mod status_machine {
    use super::*;

    #[test]
    fn illegal_pairs_change_nothing() {
        let store = StoreId::new();
        let admin = Actor::admin(UserId::new());

        for from in OrderStatus::ALL {
            for to in OrderStatus::ALL {
                if from.can_transition_to(to) {
                    continue;
                }
                let mut order = place(&[line(store, 1, 1000)], PaymentMethod::Cod);
                order.status = from;
                let before = order.clone();

                let err = order.plan_transition(&admin, to).unwrap_err();
                assert_eq!(err, OrderError::IllegalTransition { from, to });
                assert_eq!(order, before);
            }
        }
    }

    #[test]
    fn terminal_states_have_no_exits() {
        for status in OrderStatus::ALL {
            assert_eq!(status.is_terminal(), status.allowed_next().is_empty());
        }
        assert!(OrderStatus::Completed.is_terminal());
        assert!(OrderStatus::Canceled.is_terminal());
        assert!(OrderStatus::Refunded.is_terminal());
        assert!(!OrderStatus::Shipped.can_cancel());
    }

    #[test]
    fn cod_order_full_lifecycle() {
        let store = StoreId::new();
        let mut order = place(&[line(store, 2, 1000)], PaymentMethod::Cod);
        let vendor = Actor::vendor(UserId::new(), store);

        let mut last_transaction = None;
        for to in [
            OrderStatus::Processing,
            OrderStatus::Shipped,
            OrderStatus::Completed,
        ] {
            let plan = order.plan_transition(&vendor, to).unwrap();
            assert!(!plan.restore_stock);
            order.apply_transition(&plan);
            last_transaction = plan.transaction_status.or(last_transaction);
        }

        assert_eq!(order.status, OrderStatus::Completed);
        assert_eq!(order.payment_status, PaymentStatus::Paid);
        assert_eq!(last_transaction, Some(TransactionStatus::Completed));
    }

    #[test]
    fn online_cancel_before_payment_keeps_payment_pending() {
        let store = StoreId::new();
        let mut order = place(&[line(store, 1, 700)], PaymentMethod::Online);
        let customer = Actor::customer(order.customer_id);

        let plan = order
            .plan_transition(&customer, OrderStatus::Canceled)
            .unwrap();
        assert!(plan.restore_stock);
        assert_eq!(plan.payment_status, None);
        order.apply_transition(&plan);

        assert_eq!(order.payment_status, PaymentStatus::Pending);
        assert!(!order.awaiting_online_payment());
        assert!(!order.mark_paid());
    }

    #[test]
    fn refund_of_cod_order_fails_payment() {
        let store = StoreId::new();
        let mut order = place(&[line(store, 1, 700)], PaymentMethod::Cod);
        order.status = OrderStatus::Shipped;

        let plan = order
            .plan_transition(&Actor::vendor(UserId::new(), store), OrderStatus::Refunded)
            .unwrap();
        assert!(!plan.restore_stock);
        assert_eq!(plan.payment_status, Some(PaymentStatus::Failed));
        assert_eq!(plan.transaction_status, Some(TransactionStatus::Failed));
    }

    #[test]
    fn outsiders_cannot_touch_orders() {
        let store = StoreId::new();
        let order = place(&[line(store, 1, 700)], PaymentMethod::Online);
        let other_vendor = Actor::vendor(UserId::new(), StoreId::new());

        assert!(!order.visible_to(&other_vendor));
        assert!(matches!(
            order.plan_transition(&other_vendor, OrderStatus::Canceled),
            Err(OrderError::NotAuthorized { .. })
        ));
    }
}
