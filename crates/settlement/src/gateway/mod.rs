//! External payment gateway contract and its implementations.

pub mod http;
pub mod memory;

pub use http::{HttpGatewayConfig, HttpPaymentGateway};
pub use memory::InMemoryPaymentGateway;

use async_trait::async_trait;
use common::{OrderId, UserId};
use domain::Money;
use thiserror::Error;

/// What the gateway needs to open a hosted checkout page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionRequest {
    pub customer_id: UserId,
    pub order_ids: Vec<OrderId>,
    pub amount: Money,
    pub currency: String,
    pub success_url: String,
    pub cancel_url: String,
}

/// A hosted checkout page opened by the gateway.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckoutSession {
    pub id: String,
    pub url: String,
}

/// Payment state of a checkout session as reported by the gateway.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionStatus {
    Open,
    Paid,
    Expired,
}

/// Trait for the external payment processor.
///
/// Implementations never touch marketplace storage.
#[async_trait]
pub trait PaymentGateway: Send + Sync {
    /// Opens a checkout session charging `request.amount`.
    async fn create_session(
        &self,
        request: SessionRequest,
    ) -> Result<CheckoutSession, GatewayError>;

    /// Fetches the current payment state of a session.
    async fn session_status(&self, session_id: &str) -> Result<SessionStatus, GatewayError>;
}

/// Errors that can occur when talking to the payment gateway.
#[derive(Debug, Error)]
pub enum GatewayError {
    /// An HTTP transport or serialization error occurred.
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    /// The gateway returned a non-2xx response or an unexpected body.
    #[error("unexpected response from gateway: {0}")]
    UnexpectedResponse(String),

    /// The gateway does not know the session.
    #[error("unknown session: {0}")]
    UnknownSession(String),

    /// The gateway refused the request.
    #[error("request declined: {0}")]
    Declined(String),
}
