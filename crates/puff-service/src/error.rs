//! API error types and responses.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;

use crate::payments::PaymentError;
use crate::providers::ProviderError;

/// API error type.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// Unauthorized - missing or invalid credentials.
    #[error("unauthorized")]
    Unauthorized,

    /// Webhook signature missing, malformed, or wrong.
    #[error("invalid webhook signature")]
    InvalidSignature,

    /// Resource not found.
    #[error("not found: {0}")]
    NotFound(String),

    /// Bad request - invalid input.
    #[error("bad request: {0}")]
    BadRequest(String),

    /// Conflict - resource already exists or invalid state transition.
    #[error("conflict: {0}")]
    Conflict(String),

    /// No registered or active provider under that name.
    #[error("provider not available: {0}")]
    UnknownProvider(String),

    /// Insufficient points for a redemption.
    #[error("insufficient balance: balance={balance}, required={required}")]
    InsufficientBalance {
        /// Current spendable balance.
        balance: i64,
        /// Points the redemption needs.
        required: i64,
    },

    /// The reward cannot currently be redeemed.
    #[error("reward unavailable: {0}")]
    RewardUnavailable(String),

    /// The provider rejected or failed to handle the request.
    #[error("provider failure: {0}")]
    ProviderFailure(String),

    /// The provider did not answer within the deadline. The payment state
    /// is unknown; the caller must not blindly retry.
    #[error("provider timed out; payment state is unknown, do not retry blindly")]
    ProviderTimeout,

    /// Internal server error.
    #[error("internal error: {0}")]
    Internal(String),
}

/// JSON error response body.
#[derive(Debug, Serialize)]
struct ErrorResponse {
    error: ErrorBody,
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    code: String,
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    details: Option<serde_json::Value>,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, code, message, details) = match &self {
            Self::Unauthorized => (
                StatusCode::UNAUTHORIZED,
                "unauthorized",
                self.to_string(),
                None,
            ),
            Self::InvalidSignature => (
                StatusCode::UNAUTHORIZED,
                "invalid_signature",
                self.to_string(),
                None,
            ),
            Self::NotFound(msg) => (StatusCode::NOT_FOUND, "not_found", msg.clone(), None),
            Self::BadRequest(msg) => (StatusCode::BAD_REQUEST, "bad_request", msg.clone(), None),
            Self::Conflict(msg) => (StatusCode::CONFLICT, "conflict", msg.clone(), None),
            Self::UnknownProvider(name) => (
                StatusCode::NOT_FOUND,
                "unknown_provider",
                format!("provider not available: {name}"),
                None,
            ),
            Self::InsufficientBalance { balance, required } => (
                StatusCode::BAD_REQUEST,
                "insufficient_balance",
                self.to_string(),
                Some(serde_json::json!({
                    "balance": balance,
                    "required": required
                })),
            ),
            Self::RewardUnavailable(msg) => (
                StatusCode::BAD_REQUEST,
                "reward_unavailable",
                msg.clone(),
                None,
            ),
            Self::ProviderFailure(msg) => {
                (StatusCode::BAD_GATEWAY, "provider_failure", msg.clone(), None)
            }
            Self::ProviderTimeout => (
                StatusCode::GATEWAY_TIMEOUT,
                "provider_timeout",
                self.to_string(),
                None,
            ),
            Self::Internal(msg) => {
                tracing::error!(error = %msg, "Internal server error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "internal_error",
                    "An internal error occurred".to_string(),
                    None,
                )
            }
        };

        let body = ErrorResponse {
            error: ErrorBody {
                code: code.to_string(),
                message,
                details,
            },
        };

        (status, Json(body)).into_response()
    }
}

impl From<puff_store::StoreError> for ApiError {
    fn from(err: puff_store::StoreError) -> Self {
        match err {
            puff_store::StoreError::NotFound => Self::NotFound("record not found".to_string()),
            puff_store::StoreError::InsufficientPoints { balance, required } => {
                Self::InsufficientBalance { balance, required }
            }
            puff_store::StoreError::RewardUnavailable { reason } => Self::RewardUnavailable(reason),
            puff_store::StoreError::DuplicateProviderRef { .. }
            | puff_store::StoreError::RedemptionNotPending { .. } => {
                Self::Conflict(err.to_string())
            }
            puff_store::StoreError::PointsMismatch { .. }
            | puff_store::StoreError::Constraint(_) => Self::BadRequest(err.to_string()),
            puff_store::StoreError::Database(msg)
            | puff_store::StoreError::Serialization(msg) => Self::Internal(msg),
        }
    }
}

impl From<PaymentError> for ApiError {
    fn from(err: PaymentError) -> Self {
        match err {
            PaymentError::Validation(msg) => Self::BadRequest(msg),
            PaymentError::UnknownProvider(name) => Self::UnknownProvider(name),
            PaymentError::Declined(reason) => Self::ProviderFailure(reason),
            PaymentError::Provider(ProviderError::Timeout) => Self::ProviderTimeout,
            PaymentError::Provider(e) => Self::ProviderFailure(e.to_string()),
            PaymentError::Store(e) => e.into(),
        }
    }
}
