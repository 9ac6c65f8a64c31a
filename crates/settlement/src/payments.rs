//! Online payment: checkout sessions, reconciliation and gateway callbacks.

use std::collections::BTreeSet;
use std::sync::Arc;

use chrono::Utc;
use common::OrderId;
use domain::{Actor, Money, Order, TransactionStatus};
use store::MarketplaceStore;

use crate::error::{Result, SettlementError};
use crate::gateway::{GatewayError, PaymentGateway, SessionRequest, SessionStatus};
use crate::webhook::{WebhookEvent, WebhookVerifier};

/// Per-deployment settings for hosted checkout.
#[derive(Debug, Clone)]
pub struct PaymentSettings {
    pub currency: String,
    pub success_url: String,
    pub cancel_url: String,
}

impl Default for PaymentSettings {
    fn default() -> Self {
        Self {
            currency: "usd".to_string(),
            success_url: "http://localhost:3000/payment/success".to_string(),
            cancel_url: "http://localhost:3000/payment/cancel".to_string(),
        }
    }
}

/// A hosted checkout page covering one or more orders.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreatedSession {
    pub session_id: String,
    pub redirect_url: String,
    pub order_ids: Vec<OrderId>,
    pub amount: Money,
}

/// Result of reconciling a session against the gateway.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reconciliation {
    pub session_id: String,
    /// Whether the gateway reports the session as paid.
    pub paid: bool,
    /// Orders that moved to `paid` during this call.
    pub settled_orders: Vec<OrderId>,
}

/// Outcome of a verified gateway callback.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CallbackOutcome {
    Reconciled(Reconciliation),
    /// The event type does not affect settlement.
    Ignored(String),
    /// A paid session that no order refers to. Acknowledged so the gateway
    /// stops redelivering it.
    UnknownSession(String),
}

/// Connects marketplace orders to the external payment gateway.
///
/// Gateway round trips never happen inside a unit of work; state read before
/// a call is re-checked under lock afterwards.
pub struct PaymentService<S: MarketplaceStore> {
    store: S,
    gateway: Arc<dyn PaymentGateway>,
    verifier: WebhookVerifier,
    settings: PaymentSettings,
}

impl<S: MarketplaceStore + Clone> Clone for PaymentService<S> {
    fn clone(&self) -> Self {
        Self {
            store: self.store.clone(),
            gateway: Arc::clone(&self.gateway),
            verifier: self.verifier.clone(),
            settings: self.settings.clone(),
        }
    }
}

impl<S: MarketplaceStore> PaymentService<S> {
    pub fn new(
        store: S,
        gateway: Arc<dyn PaymentGateway>,
        verifier: WebhookVerifier,
        settings: PaymentSettings,
    ) -> Self {
        Self {
            store,
            gateway,
            verifier,
            settings,
        }
    }

    /// Opens one gateway session charging the sum of the actor's payable
    /// orders among `order_ids`.
    ///
    /// An order is payable if it belongs to the actor, is paid online, has a
    /// pending payment and is not canceled. Other ids are ignored. Fails with
    /// [`SettlementError::SessionInProgress`] while one of them carries a
    /// session the gateway reports open or paid.
    #[tracing::instrument(skip(self, actor, order_ids), fields(user_id = %actor.user_id))]
    pub async fn create_checkout_session(
        &self,
        actor: &Actor,
        order_ids: &[OrderId],
    ) -> Result<CreatedSession> {
        let unique: BTreeSet<OrderId> = order_ids.iter().copied().collect();

        let mut eligible: Vec<Order> = Vec::with_capacity(unique.len());
        for order_id in unique {
            if let Some(order) = self.store.order(order_id).await?
                && is_payable_by(&order, actor)
            {
                eligible.push(order);
            }
        }
        if eligible.is_empty() {
            return Err(SettlementError::NoEligibleOrders);
        }
        for order in &eligible {
            if let Some(previous) = &order.payment_session {
                self.ensure_replaceable(order.id, previous).await?;
            }
        }

        let amount: Money = eligible.iter().map(|o| o.total_price).sum();
        let session = self
            .gateway
            .create_session(SessionRequest {
                customer_id: actor.user_id,
                order_ids: eligible.iter().map(|o| o.id).collect(),
                amount,
                currency: self.settings.currency.clone(),
                success_url: self.settings.success_url.clone(),
                cancel_url: self.settings.cancel_url.clone(),
            })
            .await?;

        let mut uow = self.store.begin().await?;
        let mut linked = Vec::with_capacity(eligible.len());
        for candidate in &eligible {
            // The session amount covers every candidate, so any change since
            // the first read abandons the whole link.
            let Some(mut order) = uow.lock_order(candidate.id).await? else {
                return Err(SettlementError::Conflict(candidate.id));
            };
            if !is_payable_by(&order, actor) || order.payment_session != candidate.payment_session
            {
                return Err(SettlementError::Conflict(order.id));
            }
            order.payment_session = Some(session.id.clone());
            if !uow.update_order(&order, order.status).await? {
                return Err(SettlementError::Conflict(order.id));
            }
            linked.push(order.id);
        }
        uow.commit().await?;

        metrics::counter!("payment_sessions_created_total").increment(1);
        tracing::info!(
            session_id = %session.id,
            order_count = linked.len(),
            %amount,
            "Checkout session created"
        );

        Ok(CreatedSession {
            session_id: session.id,
            redirect_url: session.url,
            order_ids: linked,
            amount,
        })
    }

    /// Fails unless the gateway reports `session_id` expired or no longer
    /// knows it.
    async fn ensure_replaceable(&self, order_id: OrderId, session_id: &str) -> Result<()> {
        match self.gateway.session_status(session_id).await {
            Ok(SessionStatus::Expired) | Err(GatewayError::UnknownSession(_)) => Ok(()),
            Ok(SessionStatus::Open | SessionStatus::Paid) => {
                tracing::debug!(%order_id, session_id, "Order has a live payment session");
                Err(SettlementError::SessionInProgress {
                    order_id,
                    session_id: session_id.to_string(),
                })
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Reconciles on behalf of a caller. Only admins and customers owning an
    /// order on the session may trigger it; everyone else sees the session as
    /// unknown.
    #[tracing::instrument(skip(self, actor), fields(user_id = %actor.user_id))]
    pub async fn reconcile_as(&self, actor: &Actor, session_id: &str) -> Result<Reconciliation> {
        let orders = self.store.orders_for_session(session_id).await?;
        let permitted =
            actor.is_staff || orders.iter().any(|o| o.customer_id == actor.user_id);
        if !permitted {
            return Err(SettlementError::SessionNotFound(session_id.to_string()));
        }
        self.reconcile(session_id).await
    }

    /// Settles every order carrying `session_id` if the gateway reports the
    /// session paid. Calling it again changes nothing.
    #[tracing::instrument(skip(self))]
    pub async fn reconcile(&self, session_id: &str) -> Result<Reconciliation> {
        if self.store.orders_for_session(session_id).await?.is_empty() {
            return Err(SettlementError::SessionNotFound(session_id.to_string()));
        }

        let status = self.gateway.session_status(session_id).await?;
        if status != SessionStatus::Paid {
            tracing::debug!(?status, "Session not paid yet");
            return Ok(Reconciliation {
                session_id: session_id.to_string(),
                paid: false,
                settled_orders: Vec::new(),
            });
        }

        let now = Utc::now();
        let mut uow = self.store.begin().await?;
        let mut settled = Vec::new();
        for mut order in uow.lock_orders_for_session(session_id).await? {
            let expected = order.status;
            if !order.mark_paid() {
                continue;
            }
            if !uow.update_order(&order, expected).await? {
                return Err(SettlementError::Conflict(order.id));
            }
            uow.update_transaction_status(order.id, TransactionStatus::Completed, now)
                .await?;
            settled.push(order.id);
        }
        uow.commit().await?;

        if !settled.is_empty() {
            metrics::counter!("payments_reconciled_total").increment(settled.len() as u64);
            tracing::info!(order_count = settled.len(), "Payment reconciled");
        }

        Ok(Reconciliation {
            session_id: session_id.to_string(),
            paid: true,
            settled_orders: settled,
        })
    }

    /// Verifies and handles a gateway callback.
    ///
    /// Nothing is read or written before the signature checks out.
    #[tracing::instrument(skip(self, payload, signature))]
    pub async fn handle_callback(
        &self,
        payload: &[u8],
        signature: &str,
    ) -> Result<CallbackOutcome> {
        if let Err(e) = self.verifier.verify(payload, signature, Utc::now()) {
            metrics::counter!("webhooks_rejected_total").increment(1);
            tracing::warn!(error = %e, "Rejected gateway callback");
            return Err(e.into());
        }

        let event: WebhookEvent = serde_json::from_slice(payload)
            .map_err(|e| SettlementError::InvalidRequest(format!("malformed event: {e}")))?;

        match event.paid_session() {
            Some(session_id) => match self.reconcile(session_id).await {
                Ok(reconciliation) => Ok(CallbackOutcome::Reconciled(reconciliation)),
                Err(SettlementError::SessionNotFound(_)) => {
                    tracing::warn!(session_id, "Paid session has no orders");
                    Ok(CallbackOutcome::UnknownSession(session_id.to_string()))
                }
                Err(e) => Err(e),
            },
            None => {
                tracing::debug!(event_type = %event.event_type, "Ignoring gateway event");
                Ok(CallbackOutcome::Ignored(event.event_type))
            }
        }
    }
}

fn is_payable_by(order: &Order, actor: &Actor) -> bool {
    order.customer_id == actor.user_id && order.awaiting_online_payment()
}
