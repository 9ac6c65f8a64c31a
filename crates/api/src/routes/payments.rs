//! Hosted checkout sessions and gateway callbacks.

use std::sync::Arc;

use axum::Json;
use axum::body::Bytes;
use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::http::HeaderMap;
use common::OrderId;
use serde::{Deserialize, Serialize};
use settlement::{CallbackOutcome, Reconciliation};
use store::MarketplaceStore;

use crate::error::ApiError;
use crate::identity::Identity;
use crate::state::AppState;

/// Header carrying the `t=<unix>,v1=<hex>` callback signature.
pub const SIGNATURE_HEADER: &str = "payment-signature";

#[derive(Deserialize)]
pub struct CreateSessionRequest {
    pub order_ids: Vec<OrderId>,
}

#[derive(Serialize)]
pub struct SessionResponse {
    pub session_id: String,
    pub redirect_url: String,
    pub order_ids: Vec<OrderId>,
    pub amount: String,
}

#[derive(Serialize)]
pub struct ReconcileResponse {
    pub session_id: String,
    pub paid: bool,
    pub settled_orders: Vec<OrderId>,
}

impl From<Reconciliation> for ReconcileResponse {
    fn from(r: Reconciliation) -> Self {
        Self {
            session_id: r.session_id,
            paid: r.paid,
            settled_orders: r.settled_orders,
        }
    }
}

#[derive(Serialize)]
pub struct WebhookResponse {
    pub received: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reconciled: Option<ReconcileResponse>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ignored: Option<String>,
}

/// POST /payments/checkout-session: open one gateway session for the
/// caller's payable orders.
#[tracing::instrument(skip(state, actor, payload), fields(user_id = %actor.user_id))]
pub async fn create_session<S: MarketplaceStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Identity(actor): Identity,
    payload: Result<Json<CreateSessionRequest>, JsonRejection>,
) -> Result<Json<SessionResponse>, ApiError> {
    let Json(req) = payload?;
    let session = state
        .payments
        .create_checkout_session(&actor, &req.order_ids)
        .await?;

    Ok(Json(SessionResponse {
        session_id: session.session_id,
        redirect_url: session.redirect_url,
        order_ids: session.order_ids,
        amount: session.amount.to_string(),
    }))
}

/// POST /payments/reconcile/{session_id}: settle a session after the
/// customer returns from the hosted page. Limited to the session's customer
/// and admins.
pub async fn reconcile<S: MarketplaceStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Identity(actor): Identity,
    Path(session_id): Path<String>,
) -> Result<Json<ReconcileResponse>, ApiError> {
    let outcome = state.payments.reconcile_as(&actor, &session_id).await?;
    Ok(Json(outcome.into()))
}

/// POST /payments/webhook: signed gateway event. The body is verified
/// byte-for-byte, so it is taken raw.
pub async fn webhook<S: MarketplaceStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<WebhookResponse>, ApiError> {
    let signature = headers
        .get(SIGNATURE_HEADER)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default();

    let response = match state.payments.handle_callback(&body, signature).await? {
        CallbackOutcome::Reconciled(r) => WebhookResponse {
            received: true,
            reconciled: Some(r.into()),
            ignored: None,
        },
        CallbackOutcome::Ignored(event_type) => WebhookResponse {
            received: true,
            reconciled: None,
            ignored: Some(event_type),
        },
        CallbackOutcome::UnknownSession(session_id) => WebhookResponse {
            received: true,
            reconciled: None,
            ignored: Some(format!("unknown session {session_id}")),
        },
    };
    Ok(Json(response))
}
