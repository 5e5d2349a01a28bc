use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;
use thiserror::Error;

use crate::upstream::ForwardError;

pub const RATE_LIMIT_REMAINING: &str = "X-RateLimit-Remaining";
pub const RATE_LIMIT_RESET: &str = "X-RateLimit-Reset";
pub const RETRY_AFTER: &str = "Retry-After";

/// Everything a gated request can fail with. Each variant maps to one
/// response shape; nothing below the gateway reaches the caller unconverted.
#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("{0}")]
    Validation(String),

    #[error("rate limit exceeded, window resets at {reset_at}")]
    RateLimitExceeded { reset_at: i64, retry_after_secs: i64 },

    #[error("upstream returned {status}")]
    Upstream { status: u16, body: String },

    #[error("internal error: {0}")]
    Internal(String),
}

impl From<ForwardError> for GatewayError {
    fn from(err: ForwardError) -> Self {
        GatewayError::Internal(err.to_string())
    }
}

impl IntoResponse for GatewayError {
    fn into_response(self) -> Response {
        match self {
            GatewayError::Validation(message) => {
                (StatusCode::BAD_REQUEST, Json(json!({ "error": message }))).into_response()
            }
            GatewayError::RateLimitExceeded {
                reset_at,
                retry_after_secs,
            } => (
                StatusCode::TOO_MANY_REQUESTS,
                [
                    (RATE_LIMIT_REMAINING, "0".to_string()),
                    (RATE_LIMIT_RESET, reset_at.to_string()),
                    (RETRY_AFTER, retry_after_secs.to_string()),
                ],
                Json(json!({ "error": "Rate limit exceeded", "resetAt": reset_at })),
            )
                .into_response(),
            GatewayError::Upstream { status, body } => {
                let status = StatusCode::from_u16(status).unwrap_or(StatusCode::BAD_GATEWAY);
                (
                    status,
                    Json(json!({ "error": "Upstream API error", "details": body })),
                )
                    .into_response()
            }
            GatewayError::Internal(detail) => {
                tracing::error!(error = %detail, "Image gateway error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    Json(json!({ "error": "Internal server error" })),
                )
                    .into_response()
            }
        }
    }
}

// Startup failures
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid upstream url {url}: {reason}")]
    UpstreamUrl { url: String, reason: String },

    #[error("no image models configured")]
    NoModels,

    #[error(transparent)]
    Forwarder(#[from] ForwardError),
}
