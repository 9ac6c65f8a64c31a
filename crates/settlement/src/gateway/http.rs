//! HTTP client for a hosted-checkout payment gateway.

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};

use super::{CheckoutSession, GatewayError, PaymentGateway, SessionRequest, SessionStatus};

/// Configuration for connecting to the payment gateway.
#[derive(Debug, Clone)]
pub struct HttpGatewayConfig {
    /// Gateway API base address, e.g. `"https://api.gateway.example"`.
    pub base_url: String,

    /// Secret API key sent as a bearer token.
    pub api_key: String,
}

/// Payment gateway reached over its REST API.
#[derive(Debug, Clone)]
pub struct HttpPaymentGateway {
    config: HttpGatewayConfig,
    http: Client,
}

impl HttpPaymentGateway {
    /// Create a new client from the given configuration.
    #[must_use]
    pub fn new(config: HttpGatewayConfig) -> Self {
        Self {
            config,
            http: Client::new(),
        }
    }

    fn sessions_url(&self) -> String {
        format!(
            "{}/v1/checkout/sessions",
            self.config.base_url.trim_end_matches('/')
        )
    }
}

#[derive(Debug, Serialize)]
struct CreateSessionBody<'a> {
    amount: i64,
    currency: &'a str,
    client_reference_id: String,
    success_url: &'a str,
    cancel_url: &'a str,
    metadata: SessionMetadata,
}

#[derive(Debug, Serialize)]
struct SessionMetadata {
    order_ids: String,
}

#[derive(Debug, Deserialize)]
struct SessionResponse {
    id: String,
    #[serde(default)]
    url: Option<String>,
    #[serde(default)]
    status: Option<String>,
    #[serde(default)]
    payment_status: Option<String>,
}

impl SessionResponse {
    fn session_status(&self) -> SessionStatus {
        match (self.payment_status.as_deref(), self.status.as_deref()) {
            (Some("paid"), _) => SessionStatus::Paid,
            (_, Some("expired")) => SessionStatus::Expired,
            _ => SessionStatus::Open,
        }
    }
}

#[async_trait]
impl PaymentGateway for HttpPaymentGateway {
    #[tracing::instrument(skip(self, request), fields(amount = %request.amount))]
    async fn create_session(
        &self,
        request: SessionRequest,
    ) -> Result<CheckoutSession, GatewayError> {
        let body = CreateSessionBody {
            amount: request.amount.cents(),
            currency: &request.currency,
            client_reference_id: request.customer_id.to_string(),
            success_url: &request.success_url,
            cancel_url: &request.cancel_url,
            metadata: SessionMetadata {
                order_ids: request
                    .order_ids
                    .iter()
                    .map(ToString::to_string)
                    .collect::<Vec<_>>()
                    .join(","),
            },
        };

        let response = self
            .http
            .post(self.sessions_url())
            .bearer_auth(&self.config.api_key)
            .json(&body)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();

            if status.is_client_error() {
                return Err(GatewayError::Declined(format!("{status}: {text}")));
            }
            return Err(GatewayError::UnexpectedResponse(format!(
                "create session failed with status {status}: {text}"
            )));
        }

        let parsed: SessionResponse = response.json().await?;
        let url = parsed.url.ok_or_else(|| {
            GatewayError::UnexpectedResponse(format!("session {} has no checkout url", parsed.id))
        })?;

        Ok(CheckoutSession { id: parsed.id, url })
    }

    #[tracing::instrument(skip(self))]
    async fn session_status(&self, session_id: &str) -> Result<SessionStatus, GatewayError> {
        let url = format!("{}/{}", self.sessions_url(), session_id);

        let response = self
            .http
            .get(&url)
            .bearer_auth(&self.config.api_key)
            .send()
            .await?;

        if response.status() == StatusCode::NOT_FOUND {
            return Err(GatewayError::UnknownSession(session_id.to_string()));
        }

        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();

            return Err(GatewayError::UnexpectedResponse(format!(
                "session lookup failed with status {status}: {text}"
            )));
        }

        let parsed: SessionResponse = response.json().await?;
        Ok(parsed.session_status())
    }
}
