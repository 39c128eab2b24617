//! Session service error types.
//!
//! All errors map to HTTP status codes via the `IntoResponse` impl.
//! Messages returned to clients are generic; detail is logged server-side.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

/// Service-level error type.
///
/// Maps to HTTP status codes:
/// - Unauthenticated, AuthenticationFailed: 401 Unauthorized
/// - Forbidden: 403 Forbidden
/// - BadRequest: 400 Bad Request
/// - ServiceUnavailable: 503 Service Unavailable
/// - Database, Internal: 500 Internal Server Error
#[derive(Debug, Error)]
pub enum ApiError {
    /// No usable session on a route that needs one. Deliberately does not
    /// say whether the token was missing, expired or forged.
    #[error("Authentication required")]
    Unauthenticated,

    /// External identity assertion was rejected.
    #[error("Identity verification failed")]
    AuthenticationFailed,

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Service unavailable: {0}")]
    ServiceUnavailable(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl ApiError {
    /// Returns the HTTP status code for this error.
    pub fn status_code(&self) -> u16 {
        match self {
            ApiError::Unauthenticated | ApiError::AuthenticationFailed => 401,
            ApiError::Forbidden(_) => 403,
            ApiError::BadRequest(_) => 400,
            ApiError::ServiceUnavailable(_) => 503,
            ApiError::Database(_) | ApiError::Internal(_) => 500,
        }
    }
}

#[derive(Serialize)]
struct ErrorResponse {
    error: ErrorDetail,
}

#[derive(Serialize)]
struct ErrorDetail {
    code: String,
    message: String,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, code, message) = match &self {
            ApiError::Unauthenticated => (
                StatusCode::UNAUTHORIZED,
                "UNAUTHENTICATED",
                "Authentication required".to_string(),
            ),
            ApiError::AuthenticationFailed => (
                StatusCode::UNAUTHORIZED,
                "AUTHENTICATION_FAILED",
                "Google authentication failed".to_string(),
            ),
            ApiError::Forbidden(reason) => {
                (StatusCode::FORBIDDEN, "PREMIUM_REQUIRED", reason.clone())
            }
            ApiError::BadRequest(reason) => (StatusCode::BAD_REQUEST, "BAD_REQUEST", reason.clone()),
            ApiError::ServiceUnavailable(reason) => {
                tracing::warn!(target: "session.availability", reason = %reason, "Service unavailable");
                (
                    StatusCode::SERVICE_UNAVAILABLE,
                    "SERVICE_UNAVAILABLE",
                    "Service temporarily unavailable".to_string(),
                )
            }
            ApiError::Database(err) => {
                tracing::error!(target: "session.database", error = %err, "Database operation failed");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "DATABASE_ERROR",
                    "An internal database error occurred".to_string(),
                )
            }
            ApiError::Internal(err) => {
                tracing::error!(target: "session.internal", error = %err, "Internal error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "INTERNAL_ERROR",
                    "An internal error occurred".to_string(),
                )
            }
        };

        let error_response = ErrorResponse {
            error: ErrorDetail {
                code: code.to_string(),
                message,
            },
        };

        let mut response = (status, Json(error_response)).into_response();

        if status == StatusCode::UNAUTHORIZED {
            if let Ok(header_value) = "Bearer realm=\"nutrebirth\", error=\"invalid_token\"".parse()
            {
                response
                    .headers_mut()
                    .insert("WWW-Authenticate", header_value);
            }
        }

        response
    }
}
