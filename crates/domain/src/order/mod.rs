//! Order aggregate, lifecycle statuses and transition rules.

mod aggregate;
mod status;

pub use aggregate::{Order, OrderItem, TransitionPlan};
pub use status::{OrderStatus, PaymentMethod, PaymentStatus};

use common::OrderId;
use thiserror::Error;

/// Errors that can occur during order lifecycle operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum OrderError {
    /// The requested status is not reachable from the current one.
    #[error("Invalid status transition: cannot move from {from} to {to}")]
    IllegalTransition { from: OrderStatus, to: OrderStatus },

    /// The status string does not name a known status.
    #[error("Unknown status: {0}")]
    UnknownStatus(String),

    /// The payment method string does not name a known method.
    #[error("Unknown payment method: {0}")]
    UnknownPaymentMethod(String),

    /// The acting user lacks rights over the order.
    #[error("Not authorized to {action} order {order_id}")]
    NotAuthorized {
        order_id: OrderId,
        action: &'static str,
    },
}
