//! Customer cart endpoints.

use std::sync::Arc;

use axum::Json;
use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use common::{BookId, CartItemId, StoreId};
use domain::{CartItem, CartLine, Money};
use serde::{Deserialize, Serialize};
use store::MarketplaceStore;

use crate::error::ApiError;
use crate::identity::Identity;
use crate::routes::parse_id;
use crate::state::AppState;

#[derive(Deserialize)]
pub struct AddItemRequest {
    pub book_id: BookId,
    pub quantity: u32,
}

#[derive(Deserialize)]
pub struct UpdateQuantityRequest {
    pub quantity: u32,
}

#[derive(Serialize)]
pub struct CartItemResponse {
    pub id: CartItemId,
    pub book_id: BookId,
    pub quantity: u32,
    pub unit_price: String,
    pub line_total: String,
}

impl From<CartItem> for CartItemResponse {
    fn from(item: CartItem) -> Self {
        Self {
            id: item.id,
            book_id: item.book_id,
            quantity: item.quantity,
            unit_price: item.unit_price.to_string(),
            line_total: item.line_total().to_string(),
        }
    }
}

#[derive(Serialize)]
pub struct CartLineResponse {
    pub store_id: StoreId,
    #[serde(flatten)]
    pub item: CartItemResponse,
}

#[derive(Serialize)]
pub struct CartResponse {
    pub items: Vec<CartLineResponse>,
    pub total: String,
}

impl From<Vec<CartLine>> for CartResponse {
    fn from(lines: Vec<CartLine>) -> Self {
        let total: Money = lines.iter().map(|l| l.item.line_total()).sum();
        Self {
            items: lines
                .into_iter()
                .map(|line| CartLineResponse {
                    store_id: line.store_id,
                    item: line.item.into(),
                })
                .collect(),
            total: total.to_string(),
        }
    }
}

#[derive(Serialize)]
pub struct ContainsResponse {
    pub exists: bool,
}

#[derive(Serialize)]
pub struct ClearedResponse {
    pub removed: u64,
}

/// GET /cart
pub async fn get<S: MarketplaceStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Identity(actor): Identity,
) -> Result<Json<CartResponse>, ApiError> {
    let lines = state.cart.cart(actor.user_id).await?;
    Ok(Json(lines.into()))
}

/// POST /cart/items: add a book, or top up its quantity if already present.
pub async fn add_item<S: MarketplaceStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Identity(actor): Identity,
    payload: Result<Json<AddItemRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<CartItemResponse>), ApiError> {
    let Json(req) = payload?;
    let item = state
        .cart
        .add_item(actor.user_id, req.book_id, req.quantity)
        .await?;
    Ok((StatusCode::CREATED, Json(item.into())))
}

/// PATCH /cart/items/{id}: set a line's quantity; zero removes it.
pub async fn update_item<S: MarketplaceStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Identity(actor): Identity,
    Path(id): Path<String>,
    payload: Result<Json<UpdateQuantityRequest>, JsonRejection>,
) -> Result<Json<CartResponse>, ApiError> {
    let item_id: CartItemId = parse_id("cart item", &id)?;
    let Json(req) = payload?;
    state
        .cart
        .update_quantity(actor.user_id, item_id, req.quantity)
        .await?;
    let lines = state.cart.cart(actor.user_id).await?;
    Ok(Json(lines.into()))
}

/// DELETE /cart/items/{id}
pub async fn remove_item<S: MarketplaceStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Identity(actor): Identity,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    let item_id: CartItemId = parse_id("cart item", &id)?;
    state.cart.remove_item(actor.user_id, item_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// DELETE /cart
pub async fn clear<S: MarketplaceStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Identity(actor): Identity,
) -> Result<Json<ClearedResponse>, ApiError> {
    let removed = state.cart.clear(actor.user_id).await?;
    Ok(Json(ClearedResponse { removed }))
}

/// GET /cart/check/{book_id}: whether the book is already in the cart.
pub async fn check<S: MarketplaceStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Identity(actor): Identity,
    Path(book_id): Path<String>,
) -> Result<Json<ContainsResponse>, ApiError> {
    let book_id: BookId = parse_id("book", &book_id)?;
    let exists = state.cart.contains_book(actor.user_id, book_id).await?;
    Ok(Json(ContainsResponse { exists }))
}
