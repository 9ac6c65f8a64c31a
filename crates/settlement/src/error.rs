//! Settlement error types.

use common::OrderId;
use domain::{CheckoutError, InvalidPercentage, OrderError};
use store::StoreError;
use thiserror::Error;

use crate::gateway::GatewayError;
use crate::webhook::SignatureError;

/// Errors that can occur during settlement operations.
#[derive(Debug, Error)]
pub enum SettlementError {
    /// Cart selection or order assembly failed.
    #[error(transparent)]
    Checkout(#[from] CheckoutError),

    /// An order lifecycle rule was violated.
    #[error(transparent)]
    Order(#[from] OrderError),

    /// The acting user lacks a capability outside any single order.
    #[error("Not authorized to {0}")]
    Forbidden(&'static str),

    /// A referenced record does not exist or is not visible to the actor.
    #[error("{what} not found: {id}")]
    NotFound { what: &'static str, id: String },

    /// None of the requested orders can be paid through the gateway.
    #[error("No eligible orders to pay")]
    NoEligibleOrders,

    /// No order carries the payment session.
    #[error("Payment session not found: {0}")]
    SessionNotFound(String),

    /// The payment gateway could not be reached or refused the request.
    #[error("Payment gateway error: {0}")]
    Gateway(#[from] GatewayError),

    /// A gateway callback failed signature verification.
    #[error("Invalid webhook signature: {0}")]
    InvalidSignature(#[from] SignatureError),

    /// Input that is well-formed but unacceptable.
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// The order already carries a gateway session that is open or paid.
    #[error("Order {order_id} already has payment session {session_id}")]
    SessionInProgress { order_id: OrderId, session_id: String },

    /// The order changed underneath a status update.
    #[error("Order {0} was modified concurrently")]
    Conflict(OrderId),

    /// Storage failure.
    #[error("Storage error: {0}")]
    Store(#[from] StoreError),
}

impl SettlementError {
    pub(crate) fn not_found(what: &'static str, id: impl ToString) -> Self {
        SettlementError::NotFound {
            what,
            id: id.to_string(),
        }
    }

    /// Stable machine-readable name of the error.
    pub fn kind(&self) -> &'static str {
        match self {
            SettlementError::Checkout(e) => match e {
                CheckoutError::EmptyCart => "EmptyCart",
                CheckoutError::NoItemsSelected => "NoItemsSelected",
                CheckoutError::MissingShippingInfo => "MissingShippingInfo",
                CheckoutError::AllItemsOutOfStock => "AllItemsOutOfStock",
            },
            SettlementError::Order(e) => match e {
                OrderError::IllegalTransition { .. } => "IllegalTransition",
                OrderError::UnknownStatus(_) => "UnknownStatus",
                OrderError::UnknownPaymentMethod(_) => "InvalidRequest",
                OrderError::NotAuthorized { .. } => "NotAuthorized",
            },
            SettlementError::Forbidden(_) => "NotAuthorized",
            SettlementError::NotFound { .. } => "NotFound",
            SettlementError::NoEligibleOrders | SettlementError::SessionNotFound(_) => {
                "SessionNotFound"
            }
            SettlementError::Gateway(_) => "GatewayError",
            SettlementError::InvalidSignature(_) => "InvalidSignature",
            SettlementError::InvalidRequest(_) => "InvalidRequest",
            SettlementError::Conflict(_) | SettlementError::SessionInProgress { .. } => {
                "Conflict"
            }
            SettlementError::Store(_) => "Internal",
        }
    }
}

impl From<InvalidPercentage> for SettlementError {
    fn from(e: InvalidPercentage) -> Self {
        SettlementError::InvalidRequest(e.to_string())
    }
}

/// Convenience type alias for settlement results.
pub type Result<T> = std::result::Result<T, SettlementError>;
