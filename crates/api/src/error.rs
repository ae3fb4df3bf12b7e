//! API error types with HTTP response mapping.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use common::IdParseError;
use domain::DomainError;
use payments::PaymentError;
use projections::ProjectionError;

/// Error returned by handlers. The body is always `{"error": "<message>"}`.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("{0}")]
    BadRequest(String),
    /// No caller identity on the request.
    #[error("{0}")]
    Unauthorized(String),
    /// The caller's role or ownership does not allow the operation.
    #[error("{0}")]
    Forbidden(String),
    #[error("{0}")]
    NotFound(String),
    #[error("{0}")]
    Conflict(String),
    /// The payment provider failed.
    #[error("{0}")]
    BadGateway(String),
    #[error("{0}")]
    Internal(String),
}

impl ApiError {
    fn status(&self) -> StatusCode {
        match self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            ApiError::Forbidden(_) => StatusCode::FORBIDDEN,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Conflict(_) => StatusCode::CONFLICT,
            ApiError::BadGateway(_) => StatusCode::BAD_GATEWAY,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(%status, error = %self, "request failed");
        }
        let body = serde_json::json!({ "error": self.to_string() });
        (status, Json(body)).into_response()
    }
}

impl From<DomainError> for ApiError {
    fn from(err: DomainError) -> Self {
        let message = err.to_string();
        match err {
            DomainError::NotFound(_) => ApiError::NotFound(message),
            DomainError::ConcurrencyExhausted { .. } => ApiError::Conflict(message),
            ref e if e.is_client_error() => ApiError::BadRequest(message),
            _ => ApiError::Internal(message),
        }
    }
}

impl From<PaymentError> for ApiError {
    fn from(err: PaymentError) -> Self {
        match err {
            PaymentError::Domain(e) => e.into(),
            PaymentError::Verification(_) => ApiError::BadRequest(err.to_string()),
            PaymentError::Provider(_) => ApiError::BadGateway(err.to_string()),
            PaymentError::UnknownSession(_) | PaymentError::NothingToResume(_) => {
                ApiError::NotFound(err.to_string())
            }
            PaymentError::Reconciliation { .. } | PaymentError::Projection(_) => {
                ApiError::Internal(err.to_string())
            }
        }
    }
}

impl From<ProjectionError> for ApiError {
    fn from(err: ProjectionError) -> Self {
        ApiError::Internal(err.to_string())
    }
}

impl From<IdParseError> for ApiError {
    fn from(err: IdParseError) -> Self {
        DomainError::from(err).into()
    }
}
