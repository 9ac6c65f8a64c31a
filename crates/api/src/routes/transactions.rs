//! Settlement ledger endpoints for admins and store owners.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, State};
use chrono::{DateTime, Utc};
use common::{OrderId, StoreId, TransactionId};
use domain::{PaymentMethod, Transaction, TransactionStatus};
use serde::Serialize;
use store::MarketplaceStore;

use crate::error::ApiError;
use crate::identity::Identity;
use crate::routes::parse_id;
use crate::state::AppState;

#[derive(Serialize)]
pub struct TransactionResponse {
    pub id: TransactionId,
    pub order_id: OrderId,
    pub store_id: StoreId,
    pub amount: String,
    pub admin_fee: String,
    pub store_earnings: String,
    pub payment_method: PaymentMethod,
    pub status: TransactionStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<Transaction> for TransactionResponse {
    fn from(t: Transaction) -> Self {
        Self {
            id: t.id,
            order_id: t.order_id,
            store_id: t.store_id,
            amount: t.amount.to_string(),
            admin_fee: t.admin_fee.to_string(),
            store_earnings: t.store_earnings.to_string(),
            payment_method: t.payment_method,
            status: t.status,
            created_at: t.created_at,
            updated_at: t.updated_at,
        }
    }
}

/// GET /transactions
pub async fn list<S: MarketplaceStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Identity(actor): Identity,
) -> Result<Json<Vec<TransactionResponse>>, ApiError> {
    let transactions = state.ledger.list(&actor).await?;
    Ok(Json(transactions.into_iter().map(Into::into).collect()))
}

/// GET /transactions/{id}
pub async fn get<S: MarketplaceStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Identity(actor): Identity,
    Path(id): Path<String>,
) -> Result<Json<TransactionResponse>, ApiError> {
    let transaction_id: TransactionId = parse_id("transaction", &id)?;
    let transaction = state.ledger.get(&actor, transaction_id).await?;
    Ok(Json(transaction.into()))
}
