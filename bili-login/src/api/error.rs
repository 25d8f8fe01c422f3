//! API error handling.
//!
//! Every failure is reported as `{code, message}` with a numeric code so the
//! page script can branch on it the same way it branches on upstream codes.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use bilibili_api::ApiError as UpstreamError;
use serde::Serialize;

use crate::error::Error;
use crate::login::LOCAL_EXPIRED_CODE;

/// Request was missing a required parameter.
pub const CODE_BAD_REQUEST: i64 = -100;
/// Bilibili could not be reached.
pub const CODE_NETWORK: i64 = -101;
/// Anything else that went wrong on our side.
pub const CODE_INTERNAL: i64 = -102;

/// API error response body.
#[derive(Debug, Serialize)]
pub struct ApiErrorResponse {
    pub code: i64,
    pub message: String,
}

/// API error type that can be converted to HTTP responses.
#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub code: i64,
    pub message: String,
}

impl ApiError {
    pub fn new(status: StatusCode, code: i64, message: impl Into<String>) -> Self {
        Self {
            status,
            code,
            message: message.into(),
        }
    }

    /// Create a 400 Bad Request error.
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, CODE_BAD_REQUEST, message)
    }

    /// Create a 404 Not Found error.
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, LOCAL_EXPIRED_CODE, message)
    }

    /// Create a 500 Internal Server Error.
    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, CODE_INTERNAL, message)
    }

    /// Create a 503 Service Unavailable error.
    pub fn service_unavailable(message: impl Into<String>) -> Self {
        Self::new(StatusCode::SERVICE_UNAVAILABLE, CODE_NETWORK, message)
    }

    /// Override the status while keeping code and message.
    pub fn with_status(mut self, status: StatusCode) -> Self {
        self.status = status;
        self
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = ApiErrorResponse {
            code: self.code,
            message: self.message,
        };
        (self.status, Json(body)).into_response()
    }
}

impl From<Error> for ApiError {
    fn from(err: Error) -> Self {
        match err {
            Error::SessionNotFound(_) => ApiError::not_found("Invalid or expired qrcode_key"),
            Error::SessionExpired(_) => ApiError::not_found("QR code expired"),
            Error::Api(UpstreamError::Network(e)) => {
                tracing::error!(error = %e, "Bilibili request failed");
                ApiError::service_unavailable(format!("Network error: {}", e))
            }
            Error::Api(e @ UpstreamError::Protocol { .. }) => {
                tracing::error!(error = %e, "Bilibili returned an HTTP error");
                ApiError::service_unavailable(format!("Network error: {}", e))
            }
            Error::Api(UpstreamError::Upstream { code, message }) => {
                tracing::error!(code, message = %message, "Bilibili rejected the request");
                ApiError::new(StatusCode::INTERNAL_SERVER_ERROR, code, message)
            }
            Error::QrRender(msg) => {
                tracing::error!(error = %msg, "Failed to render QR code");
                ApiError::internal("Failed to render QR code")
            }
            _ => {
                tracing::error!(error = %err, "Unexpected error");
                ApiError::internal(format!("Internal error: {}", err))
            }
        }
    }
}

/// Result type for API handlers.
pub type ApiResult<T> = Result<T, ApiError>;
