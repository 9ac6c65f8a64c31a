//! API error types with HTTP response mapping.

use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use settlement::SettlementError;
use thiserror::Error;

/// API-level error type that maps to HTTP responses.
///
/// Every variant renders as `{"error": <kind>, "message": <text>}`.
#[derive(Debug, Error)]
pub enum ApiError {
    /// No usable identity headers on the request.
    #[error("{0}")]
    Unauthenticated(String),
    /// Bad request from the client.
    #[error("{0}")]
    BadRequest(String),
    /// Failure reported by a settlement service.
    #[error(transparent)]
    Settlement(#[from] SettlementError),
}

impl ApiError {
    fn parts(&self) -> (StatusCode, &'static str) {
        match self {
            ApiError::Unauthenticated(_) => (StatusCode::UNAUTHORIZED, "Unauthenticated"),
            ApiError::BadRequest(_) => (StatusCode::BAD_REQUEST, "InvalidRequest"),
            ApiError::Settlement(err) => {
                let kind = err.kind();
                (status_for_kind(kind), kind)
            }
        }
    }
}

fn status_for_kind(kind: &str) -> StatusCode {
    match kind {
        "NotFound" | "SessionNotFound" => StatusCode::NOT_FOUND,
        "NotAuthorized" => StatusCode::FORBIDDEN,
        "Conflict" => StatusCode::CONFLICT,
        "GatewayError" => StatusCode::BAD_GATEWAY,
        "Internal" => StatusCode::INTERNAL_SERVER_ERROR,
        _ => StatusCode::BAD_REQUEST,
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, kind) = self.parts();
        let message = self.to_string();

        if status.is_server_error() {
            tracing::error!(error = %message, kind, "request failed");
        } else {
            tracing::debug!(error = %message, kind, "request rejected");
        }

        let body = serde_json::json!({ "error": kind, "message": message });
        (status, axum::Json(body)).into_response()
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::BadRequest(rejection.body_text())
    }
}
