//! Site configuration endpoints.

use std::sync::Arc;

use axum::Json;
use axum::extract::State;
use axum::extract::rejection::JsonRejection;
use chrono::{DateTime, Utc};
use domain::SiteConfig;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use settlement::SettlementError;
use store::MarketplaceStore;

use crate::error::ApiError;
use crate::identity::Identity;
use crate::state::AppState;

#[derive(Deserialize)]
pub struct UpdateSiteConfigRequest {
    pub admin_fee_percentage: Decimal,
}

#[derive(Serialize)]
pub struct SiteConfigResponse {
    pub admin_fee_percentage: String,
    pub updated_at: DateTime<Utc>,
}

impl From<SiteConfig> for SiteConfigResponse {
    fn from(config: SiteConfig) -> Self {
        Self {
            admin_fee_percentage: config.admin_fee_percentage.to_string(),
            updated_at: config.updated_at,
        }
    }
}

/// GET /admin/site-config
pub async fn get<S: MarketplaceStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Identity(actor): Identity,
) -> Result<Json<SiteConfigResponse>, ApiError> {
    if !actor.is_staff {
        return Err(SettlementError::Forbidden("view the site configuration").into());
    }
    Ok(Json(state.fees.current().await?.into()))
}

/// PUT /admin/site-config
#[tracing::instrument(skip(state, actor, payload), fields(user_id = %actor.user_id))]
pub async fn update<S: MarketplaceStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Identity(actor): Identity,
    payload: Result<Json<UpdateSiteConfigRequest>, JsonRejection>,
) -> Result<Json<SiteConfigResponse>, ApiError> {
    let Json(req) = payload?;
    let config = state.fees.update(&actor, req.admin_fee_percentage).await?;
    Ok(Json(config.into()))
}
