//! API server entry point.

use std::sync::Arc;

use api::Config;
use metrics_exporter_prometheus::PrometheusHandle;
use settlement::{HttpPaymentGateway, InMemoryPaymentGateway, PaymentGateway};
use sqlx::postgres::PgPoolOptions;
use store::{InMemoryMarketplaceStore, MarketplaceStore, PostgresMarketplaceStore};
use tokio::signal;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

/// Waits for a shutdown signal (SIGINT or SIGTERM).
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install SIGINT handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            tracing::info!("received SIGINT, starting graceful shutdown");
        }
        () = terminate => {
            tracing::info!("received SIGTERM, starting graceful shutdown");
        }
    }
}

async fn serve<S: MarketplaceStore + Clone + 'static>(
    config: Config,
    store: S,
    gateway: Arc<dyn PaymentGateway>,
    metrics_handle: PrometheusHandle,
) {
    let state = api::create_default_state(store, gateway, &config);
    state
        .fees
        .ensure_initialized()
        .await
        .expect("failed to initialize site configuration");

    let app = api::create_app(state, metrics_handle);

    let addr = config.addr();
    tracing::info!(%addr, "starting API server");

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .expect("failed to bind address");
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .expect("server error");

    tracing::info!("server shut down gracefully");
}

#[tokio::main]
async fn main() {
    let config = Config::from_env();

    // 1. Initialize tracing
    tracing_subscriber::registry()
        .with(EnvFilter::try_new(&config.log_level).unwrap_or_else(|_| EnvFilter::new("info")))
        .with(tracing_subscriber::fmt::layer())
        .init();

    // 2. Install Prometheus metrics recorder
    let metrics_handle = metrics_exporter_prometheus::PrometheusBuilder::new()
        .install_recorder()
        .expect("failed to install Prometheus recorder");

    // 3. Pick the payment gateway
    let gateway: Arc<dyn PaymentGateway> = match config.gateway() {
        Some(gateway_config) => {
            tracing::info!(base_url = %gateway_config.base_url, "using HTTP payment gateway");
            Arc::new(HttpPaymentGateway::new(gateway_config))
        }
        None => {
            tracing::warn!("PAYMENT_GATEWAY_URL not set, using in-memory payment gateway");
            Arc::new(InMemoryPaymentGateway::new())
        }
    };

    // 4. Pick the store, migrate, and serve
    match config.database_url.clone() {
        Some(url) => {
            let pool = PgPoolOptions::new()
                .max_connections(10)
                .connect(&url)
                .await
                .expect("failed to connect to database");
            let store = PostgresMarketplaceStore::new(pool);
            store
                .run_migrations()
                .await
                .expect("failed to run migrations");
            tracing::info!("using PostgreSQL store");
            serve(config, store, gateway, metrics_handle).await;
        }
        None => {
            tracing::warn!("DATABASE_URL not set, using in-memory store");
            serve(config, InMemoryMarketplaceStore::new(), gateway, metrics_handle).await;
        }
    }
}
