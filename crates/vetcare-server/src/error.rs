use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use thiserror::Error;
use vetcare_shared::access::DenyReason;
use vetcare_shared::error::{PasswordError, ValidationError};
use vetcare_store::StoreError;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{0}")]
    Unauthenticated(&'static str),

    #[error("{0}")]
    Forbidden(String),

    /// Missing, or outside the caller's scope. The two are deliberately
    /// reported the same way.
    #[error("Not found")]
    NotFound,

    #[error("{0}")]
    Conflict(String),

    #[error(transparent)]
    Invalid(#[from] ValidationError),

    #[error("Invalid request: {0}")]
    BadRequest(String),

    #[error("Too many failed login attempts, retry in {retry_after_secs}s")]
    TooManyAttempts { retry_after_secs: u64 },

    #[error("Internal error: {0}")]
    Internal(String),
}

impl ApiError {
    pub fn rule(message: impl Into<String>) -> Self {
        ApiError::Invalid(ValidationError::Rule(message.into()))
    }

    /// A referenced record that does not exist is a bad request, not a 404.
    pub fn missing_reference(err: StoreError, what: &str) -> Self {
        match err {
            StoreError::NotFound => ApiError::rule(format!("{what} not found")),
            other => other.into(),
        }
    }
}

impl From<DenyReason> for ApiError {
    fn from(reason: DenyReason) -> Self {
        ApiError::Forbidden(reason.to_string())
    }
}

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound => ApiError::NotFound,
            StoreError::SlotTaken => ApiError::Conflict(err.to_string()),
            StoreError::DuplicateEmail => ApiError::BadRequest(err.to_string()),
            StoreError::Transition(e) => ApiError::rule(e.to_string()),
            other => ApiError::Internal(other.to_string()),
        }
    }
}

impl From<PasswordError> for ApiError {
    fn from(err: PasswordError) -> Self {
        ApiError::Internal(err.to_string())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self {
            ApiError::Unauthenticated(_) => StatusCode::UNAUTHORIZED,
            ApiError::Forbidden(_) => StatusCode::FORBIDDEN,
            ApiError::NotFound => StatusCode::NOT_FOUND,
            ApiError::Conflict(_) => StatusCode::CONFLICT,
            ApiError::Invalid(_) | ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::TooManyAttempts { .. } => StatusCode::TOO_MANY_REQUESTS,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };

        let message = match &self {
            ApiError::Internal(detail) => {
                tracing::error!(error = %detail, "request failed");
                "Internal server error".to_string()
            }
            other => other.to_string(),
        };

        let body = axum::Json(serde_json::json!({
            "error": message,
        }));

        match self {
            ApiError::TooManyAttempts { retry_after_secs } => (
                status,
                [(header::RETRY_AFTER, retry_after_secs.to_string())],
                body,
            )
                .into_response(),
            _ => (status, body).into_response(),
        }
    }
}
