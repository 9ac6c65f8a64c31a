//! In-memory payment gateway for testing and local runs.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use domain::Money;
use tokio::sync::RwLock;

use super::{CheckoutSession, GatewayError, PaymentGateway, SessionRequest, SessionStatus};

#[derive(Debug, Default)]
struct InMemoryGatewayState {
    sessions: HashMap<String, (SessionRequest, SessionStatus)>,
    next_id: u32,
    fail_on_create: bool,
    fail_on_status: bool,
}

/// In-memory payment gateway.
///
/// Sessions start open; tests settle them with [`mark_session_paid`].
///
/// [`mark_session_paid`]: InMemoryPaymentGateway::mark_session_paid
#[derive(Debug, Clone, Default)]
pub struct InMemoryPaymentGateway {
    state: Arc<RwLock<InMemoryGatewayState>>,
}

impl InMemoryPaymentGateway {
    /// Creates a new in-memory gateway.
    pub fn new() -> Self {
        Self::default()
    }

    /// Configures the gateway to fail every session creation.
    pub async fn set_fail_on_create(&self, fail: bool) {
        self.state.write().await.fail_on_create = fail;
    }

    /// Configures the gateway to fail every status lookup.
    pub async fn set_fail_on_status(&self, fail: bool) {
        self.state.write().await.fail_on_status = fail;
    }

    /// Simulates the customer completing payment. Returns false for an
    /// unknown session.
    pub async fn mark_session_paid(&self, session_id: &str) -> bool {
        let mut state = self.state.write().await;
        match state.sessions.get_mut(session_id) {
            Some((_, status)) => {
                *status = SessionStatus::Paid;
                true
            }
            None => false,
        }
    }

    /// Simulates the session timing out unpaid.
    pub async fn expire_session(&self, session_id: &str) -> bool {
        let mut state = self.state.write().await;
        match state.sessions.get_mut(session_id) {
            Some((_, status)) => {
                *status = SessionStatus::Expired;
                true
            }
            None => false,
        }
    }

    /// Returns the amount charged by a session.
    pub async fn session_amount(&self, session_id: &str) -> Option<Money> {
        self.state
            .read()
            .await
            .sessions
            .get(session_id)
            .map(|(request, _)| request.amount)
    }

    /// Returns the number of sessions created.
    pub async fn session_count(&self) -> usize {
        self.state.read().await.sessions.len()
    }
}

#[async_trait]
impl PaymentGateway for InMemoryPaymentGateway {
    async fn create_session(
        &self,
        request: SessionRequest,
    ) -> Result<CheckoutSession, GatewayError> {
        let mut state = self.state.write().await;

        if state.fail_on_create {
            return Err(GatewayError::Declined("Gateway unavailable".to_string()));
        }

        state.next_id += 1;
        let id = format!("cs_test_{:04}", state.next_id);
        let url = format!("https://checkout.gateway.test/pay/{id}");
        state
            .sessions
            .insert(id.clone(), (request, SessionStatus::Open));

        Ok(CheckoutSession { id, url })
    }

    async fn session_status(&self, session_id: &str) -> Result<SessionStatus, GatewayError> {
        let state = self.state.read().await;

        if state.fail_on_status {
            return Err(GatewayError::UnexpectedResponse(
                "Gateway unavailable".to_string(),
            ));
        }

        state
            .sessions
            .get(session_id)
            .map(|(_, status)| *status)
            .ok_or_else(|| GatewayError::UnknownSession(session_id.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use common::{OrderId, UserId};

    use super::*;

    fn request(cents: i64) -> SessionRequest {
        SessionRequest {
            customer_id: UserId::new(),
            order_ids: vec![OrderId::new()],
            amount: Money::from_cents(cents),
            currency: "usd".to_string(),
            success_url: "https://shop.test/success".to_string(),
            cancel_url: "https://shop.test/cancel".to_string(),
        }
    }

    #[tokio::test]
    async fn test_sequential_session_ids() {
        let gateway = InMemoryPaymentGateway::new();

        let s1 = gateway.create_session(request(1000)).await.unwrap();
        let s2 = gateway.create_session(request(2000)).await.unwrap();

        assert_eq!(s1.id, "cs_test_0001");
        assert_eq!(s2.id, "cs_test_0002");
        assert!(s2.url.ends_with("cs_test_0002"));
        assert_eq!(gateway.session_count().await, 2);
        assert_eq!(
            gateway.session_amount(&s2.id).await,
            Some(Money::from_cents(2000))
        );
    }

    #[tokio::test]
    async fn test_session_lifecycle() {
        let gateway = InMemoryPaymentGateway::new();
        let session = gateway.create_session(request(1000)).await.unwrap();

        assert_eq!(
            gateway.session_status(&session.id).await.unwrap(),
            SessionStatus::Open
        );
        assert!(gateway.mark_session_paid(&session.id).await);
        assert_eq!(
            gateway.session_status(&session.id).await.unwrap(),
            SessionStatus::Paid
        );
        assert!(!gateway.mark_session_paid("cs_missing").await);
        assert!(matches!(
            gateway.session_status("cs_missing").await,
            Err(GatewayError::UnknownSession(_))
        ));
    }

    #[tokio::test]
    async fn test_failure_toggles() {
        let gateway = InMemoryPaymentGateway::new();
        gateway.set_fail_on_create(true).await;
        assert!(gateway.create_session(request(1000)).await.is_err());
        assert_eq!(gateway.session_count().await, 0);

        gateway.set_fail_on_create(false).await;
        let session = gateway.create_session(request(1000)).await.unwrap();
        gateway.set_fail_on_status(true).await;
        assert!(gateway.session_status(&session.id).await.is_err());
    }
}
