//! HTTP API server for the marketplace settlement backend.
//!
//! Exposes checkout, order lifecycle, cart, payment and ledger endpoints,
//! with structured logging (tracing) and Prometheus metrics.

pub mod config;
pub mod error;
pub mod identity;
pub mod routes;
pub mod state;

use std::sync::Arc;

use axum::Router;
use axum::routing::{get, patch, post};
use metrics_exporter_prometheus::PrometheusHandle;
use settlement::{PaymentGateway, WebhookVerifier};
use store::MarketplaceStore;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

pub use config::Config;
pub use state::AppState;

/// Creates the Axum application router with all routes and shared state.
pub fn create_app<S: MarketplaceStore + Clone + 'static>(
    state: Arc<AppState<S>>,
    metrics_handle: PrometheusHandle,
) -> Router {
    let metrics_router = Router::new()
        .route("/metrics", get(routes::metrics::get))
        .with_state(metrics_handle);

    Router::new()
        .route("/health", get(routes::health::check))
        .route(
            "/orders",
            post(routes::orders::create::<S>).get(routes::orders::list::<S>),
        )
        .route("/orders/{id}", get(routes::orders::get::<S>))
        .route(
            "/orders/{id}/status",
            patch(routes::orders::update_status::<S>),
        )
        .route("/orders/{id}/cancel", post(routes::orders::cancel::<S>))
        .route("/store/orders", get(routes::orders::store_orders::<S>))
        .route(
            "/cart",
            get(routes::cart::get::<S>).delete(routes::cart::clear::<S>),
        )
        .route("/cart/items", post(routes::cart::add_item::<S>))
        .route(
            "/cart/items/{id}",
            patch(routes::cart::update_item::<S>).delete(routes::cart::remove_item::<S>),
        )
        .route("/cart/check/{book_id}", get(routes::cart::check::<S>))
        .route(
            "/payments/checkout-session",
            post(routes::payments::create_session::<S>),
        )
        .route(
            "/payments/reconcile/{session_id}",
            post(routes::payments::reconcile::<S>),
        )
        .route("/payments/webhook", post(routes::payments::webhook::<S>))
        .route("/transactions", get(routes::transactions::list::<S>))
        .route("/transactions/{id}", get(routes::transactions::get::<S>))
        .route(
            "/admin/site-config",
            get(routes::admin::get::<S>).put(routes::admin::update::<S>),
        )
        .with_state(state)
        .merge(metrics_router)
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(TraceLayer::new_for_http())
}

/// Creates the application state over `store`, paying through `gateway`.
pub fn create_default_state<S: MarketplaceStore + Clone + 'static>(
    store: S,
    gateway: Arc<dyn PaymentGateway>,
    config: &Config,
) -> Arc<AppState<S>> {
    Arc::new(AppState::new(
        store,
        gateway,
        WebhookVerifier::new(config.webhook_secret.clone()),
        config.payment.clone(),
    ))
}
