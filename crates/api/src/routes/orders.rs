//! Checkout, order view and status transition endpoints.

use std::sync::Arc;

use axum::Json;
use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use chrono::{DateTime, Utc};
use common::{BookId, CartItemId, OrderId, StoreId, UserId};
use domain::{CheckoutRequest, Order, OrderStatus, PaymentMethod, PaymentStatus};
use serde::{Deserialize, Serialize};
use settlement::SettlementError;
use store::MarketplaceStore;

use crate::error::ApiError;
use crate::identity::Identity;
use crate::routes::parse_id;
use crate::state::AppState;

// -- Request types --

#[derive(Deserialize)]
pub struct PlaceOrdersRequest {
    /// Cart lines to buy; omitted means the whole cart.
    pub cart_item_ids: Option<Vec<CartItemId>>,
    pub payment_method: String,
    pub address: Option<String>,
    pub phone: Option<String>,
}

#[derive(Deserialize)]
pub struct UpdateStatusRequest {
    pub order_status: String,
}

// -- Response types --

#[derive(Serialize)]
pub struct OrderResponse {
    pub id: OrderId,
    pub customer_id: UserId,
    pub store_id: StoreId,
    pub total_price: String,
    pub order_status: OrderStatus,
    pub payment_method: PaymentMethod,
    pub payment_status: PaymentStatus,
    pub address: String,
    pub phone: String,
    pub payment_session: Option<String>,
    pub created_at: DateTime<Utc>,
    pub items: Vec<OrderItemResponse>,
}

#[derive(Serialize)]
pub struct OrderItemResponse {
    pub book_id: BookId,
    pub quantity: u32,
    pub unit_price: String,
    pub line_total: String,
}

impl From<Order> for OrderResponse {
    fn from(order: Order) -> Self {
        Self {
            id: order.id,
            customer_id: order.customer_id,
            store_id: order.store_id,
            total_price: order.total_price.to_string(),
            order_status: order.status,
            payment_method: order.payment_method,
            payment_status: order.payment_status,
            address: order.shipping.address,
            phone: order.shipping.phone,
            payment_session: order.payment_session,
            created_at: order.created_at,
            items: order
                .items
                .into_iter()
                .map(|item| OrderItemResponse {
                    book_id: item.book_id,
                    quantity: item.quantity,
                    unit_price: item.unit_price.to_string(),
                    line_total: item.line_total().to_string(),
                })
                .collect(),
        }
    }
}

fn respond(orders: Vec<Order>) -> Json<Vec<OrderResponse>> {
    Json(orders.into_iter().map(OrderResponse::from).collect())
}

// -- Handlers --

/// POST /orders: check out the caller's cart into one order per store.
#[tracing::instrument(skip(state, actor, payload), fields(user_id = %actor.user_id))]
pub async fn create<S: MarketplaceStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Identity(actor): Identity,
    payload: Result<Json<PlaceOrdersRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<Vec<OrderResponse>>), ApiError> {
    let Json(req) = payload?;
    let payment_method: PaymentMethod = req
        .payment_method
        .parse()
        .map_err(SettlementError::from)?;

    let orders = state
        .checkout
        .checkout(CheckoutRequest {
            customer_id: actor.user_id,
            cart_item_ids: req.cart_item_ids,
            payment_method,
            address: req.address,
            phone: req.phone,
        })
        .await?;

    Ok((StatusCode::CREATED, respond(orders)))
}

/// GET /orders: the caller's own orders, newest first.
pub async fn list<S: MarketplaceStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Identity(actor): Identity,
) -> Result<Json<Vec<OrderResponse>>, ApiError> {
    Ok(respond(state.orders.orders_for_customer(&actor).await?))
}

/// GET /orders/{id}: one order, if the caller is its customer, its vendor or an admin.
pub async fn get<S: MarketplaceStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Identity(actor): Identity,
    Path(id): Path<String>,
) -> Result<Json<OrderResponse>, ApiError> {
    let order_id: OrderId = parse_id("order", &id)?;
    let order = state.orders.order(&actor, order_id).await?;
    Ok(Json(order.into()))
}

/// PATCH /orders/{id}/status: move an order along its lifecycle.
#[tracing::instrument(skip(state, actor, payload), fields(user_id = %actor.user_id))]
pub async fn update_status<S: MarketplaceStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Identity(actor): Identity,
    Path(id): Path<String>,
    payload: Result<Json<UpdateStatusRequest>, JsonRejection>,
) -> Result<Json<OrderResponse>, ApiError> {
    let order_id: OrderId = parse_id("order", &id)?;
    let Json(req) = payload?;
    let order = state
        .orders
        .transition(&actor, order_id, &req.order_status)
        .await?;
    Ok(Json(order.into()))
}

/// POST /orders/{id}/cancel
#[tracing::instrument(skip(state, actor), fields(user_id = %actor.user_id))]
pub async fn cancel<S: MarketplaceStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Identity(actor): Identity,
    Path(id): Path<String>,
) -> Result<Json<OrderResponse>, ApiError> {
    let order_id: OrderId = parse_id("order", &id)?;
    let order = state.orders.cancel(&actor, order_id).await?;
    Ok(Json(order.into()))
}

/// GET /store/orders: orders received by the caller's store.
pub async fn store_orders<S: MarketplaceStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Identity(actor): Identity,
) -> Result<Json<Vec<OrderResponse>>, ApiError> {
    Ok(respond(state.orders.orders_for_store(&actor).await?))
}
