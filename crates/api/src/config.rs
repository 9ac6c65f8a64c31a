//! Application configuration loaded from environment variables.

use settlement::{HttpGatewayConfig, PaymentSettings};

const DEFAULT_WEBHOOK_SECRET: &str = "whsec_dev";

/// Server configuration with sensible defaults.
///
/// Reads from environment variables:
/// - `HOST`: bind address (default: `"0.0.0.0"`)
/// - `PORT`: listen port (default: `3000`)
/// - `RUST_LOG`: tracing filter directive (default: `"info"`)
/// - `DATABASE_URL`: PostgreSQL connection string; absent means in-memory storage
/// - `PAYMENT_GATEWAY_URL`: gateway API base; absent means the in-memory gateway
/// - `PAYMENT_GATEWAY_API_KEY`: bearer token for the gateway
/// - `PAYMENT_WEBHOOK_SECRET`: shared secret for callback signatures (default: `"whsec_dev"`)
/// - `CHECKOUT_SUCCESS_URL` / `CHECKOUT_CANCEL_URL`: hosted checkout redirects
/// - `CURRENCY`: ISO currency code sent to the gateway (default: `"usd"`)
#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub log_level: String,
    pub database_url: Option<String>,
    pub payment_gateway_url: Option<String>,
    pub payment_gateway_api_key: String,
    pub webhook_secret: String,
    pub payment: PaymentSettings,
}

impl Config {
    /// Loads configuration from environment variables, falling back to defaults.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds configuration from an arbitrary key lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        Self {
            host: non_empty("HOST").unwrap_or(defaults.host),
            port: non_empty("PORT")
                .and_then(|p| p.parse().ok())
                .unwrap_or(defaults.port),
            log_level: non_empty("RUST_LOG").unwrap_or(defaults.log_level),
            database_url: non_empty("DATABASE_URL"),
            payment_gateway_url: non_empty("PAYMENT_GATEWAY_URL"),
            payment_gateway_api_key: non_empty("PAYMENT_GATEWAY_API_KEY").unwrap_or_default(),
            webhook_secret: non_empty("PAYMENT_WEBHOOK_SECRET").unwrap_or(defaults.webhook_secret),
            payment: PaymentSettings {
                currency: non_empty("CURRENCY").unwrap_or(defaults.payment.currency),
                success_url: non_empty("CHECKOUT_SUCCESS_URL")
                    .unwrap_or(defaults.payment.success_url),
                cancel_url: non_empty("CHECKOUT_CANCEL_URL")
                    .unwrap_or(defaults.payment.cancel_url),
            },
        }
    }

    /// Returns the `"host:port"` bind address string.
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Returns the HTTP gateway settings when a gateway URL is configured.
    pub fn gateway(&self) -> Option<HttpGatewayConfig> {
        self.payment_gateway_url
            .as_ref()
            .map(|base_url| HttpGatewayConfig {
                base_url: base_url.clone(),
                api_key: self.payment_gateway_api_key.clone(),
            })
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3000,
            log_level: "info".to_string(),
            database_url: None,
            payment_gateway_url: None,
            payment_gateway_api_key: String::new(),
            webhook_secret: DEFAULT_WEBHOOK_SECRET.to_string(),
            payment: PaymentSettings::default(),
        }
    }
}
