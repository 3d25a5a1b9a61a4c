//! Control-API error type.
//!
//! Every failure leaves the API as `{ "error": "…" }` JSON with the status
//! the error kind dictates. Rate-limit denials additionally carry the retry
//! metadata and a `Retry-After` header.

use axum::{
    Json,
    http::{HeaderValue, StatusCode, header},
    response::{IntoResponse, Response},
};
use serde_json::json;

use crate::config::store::ConfigError;
use crate::database::StoreError;
use crate::inference::InferenceError;
use crate::monitor::MonitorError;
use crate::telegram::TelegramError;

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("{0}")]
    Validation(String),

    #[error("authentication required")]
    AuthRequired,

    #[error("invalid credentials")]
    InvalidCredentials,

    #[error("admin role required")]
    Forbidden,

    #[error("{0}")]
    NotFound(String),

    /// 2FA-required resumption of the session-complete flow.
    #[error("two-factor password required")]
    PasswordRequired { request_id: String },

    #[error("{message}")]
    RateLimited {
        action: &'static str,
        retry_after_ms: u64,
        message: &'static str,
    },

    #[error("{0}")]
    Upstream(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self {
            ApiError::RateLimited {
                action,
                retry_after_ms,
                message,
            } => {
                let retry_after_sec = retry_after_ms.div_ceil(1_000);
                let body = json!({
                    "error": message,
                    "action": action,
                    "retryAfterMs": retry_after_ms,
                    "retryAfterSec": retry_after_sec,
                });
                let mut response =
                    (StatusCode::TOO_MANY_REQUESTS, Json(body)).into_response();
                if let Ok(value) = HeaderValue::from_str(&retry_after_sec.to_string()) {
                    response.headers_mut().insert(header::RETRY_AFTER, value);
                }
                response
            }
            ApiError::PasswordRequired { ref request_id } => {
                let body = json!({
                    "error": self.to_string(),
                    "requiresPassword": true,
                    "requestId": request_id,
                });
                (StatusCode::CONFLICT, Json(body)).into_response()
            }
            _ => {
                let status = match &self {
                    ApiError::Validation(_) => StatusCode::BAD_REQUEST,
                    ApiError::AuthRequired | ApiError::InvalidCredentials => {
                        StatusCode::UNAUTHORIZED
                    }
                    ApiError::Forbidden => StatusCode::FORBIDDEN,
                    ApiError::NotFound(_) => StatusCode::NOT_FOUND,
                    ApiError::Upstream(_) => StatusCode::INTERNAL_SERVER_ERROR,
                    // Handled above.
                    ApiError::RateLimited { .. } | ApiError::PasswordRequired { .. } => {
                        StatusCode::INTERNAL_SERVER_ERROR
                    }
                };
                (status, Json(json!({ "error": self.to_string() }))).into_response()
            }
        }
    }
}

// ─── Conversions ─────────────────────────────────────────────────────────────

impl From<ConfigError> for ApiError {
    fn from(e: ConfigError) -> Self {
        ApiError::Upstream(e.to_string())
    }
}

impl From<StoreError> for ApiError {
    fn from(e: StoreError) -> Self {
        ApiError::Upstream(e.to_string())
    }
}

impl From<InferenceError> for ApiError {
    fn from(e: InferenceError) -> Self {
        ApiError::Upstream(e.to_string())
    }
}

impl From<TelegramError> for ApiError {
    fn from(e: TelegramError) -> Self {
        match e {
            TelegramError::InvalidCredentials(msg) => ApiError::Validation(msg),
            other => ApiError::Upstream(other.to_string()),
        }
    }
}

impl From<MonitorError> for ApiError {
    fn from(e: MonitorError) -> Self {
        match e {
            MonitorError::AlreadyRunning => ApiError::Validation(e.to_string()),
            MonitorError::Validation(msg) => ApiError::Validation(msg),
            // Telegram/inference/config failures during start surface as 500
            // with the raw error text.
            other => ApiError::Upstream(other.to_string()),
        }
    }
}

// ─── Tests ───────────────────────────────────────────────────────────────────
