//! API error types: the concrete implementation of spec.md §7's error
//! taxonomy. Every handler returns `ApiResult<T>`; `IntoResponse` is the
//! single point where internal errors collapse into the client-visible
//! `{error, details?, code?}` envelope.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use thiserror::Error;

use vms_models::token::TokenError;

pub type ApiResult<T> = Result<T, ApiError>;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// Unauthorized specifically because the access token expired; carries
    /// `code: TOKEN_EXPIRED` so clients know to call `/api/auth/refresh`.
    #[error("Token expired")]
    TokenExpired,

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Payload too large")]
    PayloadTooLarge,

    #[error("Range not satisfiable")]
    RangeNotSatisfiable { total: u64 },

    #[error("Rate limited")]
    RateLimited,

    #[error("Internal error: {0}")]
    Internal(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Storage error: {0}")]
    Storage(#[from] vms_storage::StorageError),

    #[error("Firestore error: {0}")]
    Firestore(#[from] vms_firestore::FirestoreError),

    #[error("Queue error: {0}")]
    Queue(#[from] vms_queue::QueueError),
}

impl ApiError {
    pub fn unauthorized(msg: impl Into<String>) -> Self {
        Self::Unauthorized(msg.into())
    }

    pub fn forbidden(msg: impl Into<String>) -> Self {
        Self::Forbidden(msg.into())
    }

    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }

    pub fn bad_request(msg: impl Into<String>) -> Self {
        Self::BadRequest(msg.into())
    }

    pub fn conflict(msg: impl Into<String>) -> Self {
        Self::Conflict(msg.into())
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    /// Maps a [`TokenError`] to the 401 variant spec.md §4.1/§7 call for,
    /// distinguishing expiry (which prompts a client-side refresh) from
    /// every other verification failure.
    pub fn from_token_error(e: TokenError) -> Self {
        match e {
            TokenError::Expired => Self::TokenExpired,
            other => Self::Unauthorized(other.to_string()),
        }
    }

    fn status_code(&self) -> StatusCode {
        match self {
            ApiError::Unauthorized(_) | ApiError::TokenExpired => StatusCode::UNAUTHORIZED,
            ApiError::Forbidden(_) => StatusCode::FORBIDDEN,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::BadRequest(_) | ApiError::Validation(_) => StatusCode::BAD_REQUEST,
            ApiError::Conflict(_) => StatusCode::CONFLICT,
            ApiError::PayloadTooLarge => StatusCode::PAYLOAD_TOO_LARGE,
            ApiError::RangeNotSatisfiable { .. } => StatusCode::RANGE_NOT_SATISFIABLE,
            ApiError::RateLimited => StatusCode::TOO_MANY_REQUESTS,
            ApiError::Internal(_) | ApiError::Storage(_) | ApiError::Firestore(_) | ApiError::Queue(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    fn code(&self) -> Option<&'static str> {
        match self {
            ApiError::TokenExpired => Some("TOKEN_EXPIRED"),
            _ => None,
        }
    }
}

#[derive(Serialize)]
struct ErrorResponse {
    error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    code: Option<&'static str>,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let code = self.code();

        // Internal-dependency failures never leak detail in production;
        // everything else is already a client-safe message.
        let message = match &self {
            ApiError::Internal(_) | ApiError::Storage(_) | ApiError::Firestore(_) | ApiError::Queue(_) => {
                if std::env::var("ENVIRONMENT").unwrap_or_default() == "production" {
                    "An internal error occurred".to_string()
                } else {
                    self.to_string()
                }
            }
            _ => self.to_string(),
        };

        if let ApiError::RangeNotSatisfiable { total } = self {
            let body = ErrorResponse { error: message, code: None };
            return (
                status,
                [(
                    axum::http::header::CONTENT_RANGE,
                    format!("bytes */{total}"),
                )],
                Json(body),
            )
                .into_response();
        }

        let body = ErrorResponse { error: message, code };

        (status, Json(body)).into_response()
    }
}
