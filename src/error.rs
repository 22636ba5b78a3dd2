//! Error types and HTTP error response handling.
//!
//! This module defines all application errors and how they are converted
//! into HTTP responses with appropriate status codes and JSON bodies.

use axum::{
    Json,
    extract::rejection::JsonRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;

use crate::auth::AuthError;
use crate::db::StoreError;
use crate::models::certificate::ValidationError;
use crate::pdf::RenderError;
use crate::storage::StorageError;

/// Application-wide error type.
///
/// Each variant maps to a specific HTTP status code and error message.
///
/// # Error Categories
///
/// - **Validation Errors**: missing certificate fields, unknown template, malformed bodies
/// - **Authorization Errors**: missing, invalid or exhausted API keys, bad sessions
/// - **Resource Errors**: requested object or record not found
/// - **Infrastructure Errors**: metadata store, object storage, rendering, mail
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    /// Request body or parameters are invalid.
    ///
    /// Returns HTTP 400 Bad Request.
    #[error("{0}")]
    InvalidRequest(String),

    /// The `X-API-Key` header was not supplied.
    ///
    /// Returns HTTP 401 Unauthorized.
    #[error("API key is required")]
    MissingApiKey,

    /// API key does not exist.
    ///
    /// Returns HTTP 401 Unauthorized.
    #[error("Invalid API key")]
    InvalidApiKey,

    /// API key exists but its usage counter would pass the limit.
    ///
    /// Returns HTTP 403 Forbidden.
    #[error("API key usage limit exceeded")]
    ApiKeyLimitExceeded,

    /// Bearer session is missing, expired or otherwise rejected.
    ///
    /// Returns HTTP 401 Unauthorized.
    #[error("Unauthorized")]
    Unauthorized(String),

    /// Signed object URL is malformed or expired.
    ///
    /// Returns HTTP 403 Forbidden.
    #[error("Invalid or expired signature")]
    InvalidSignature,

    /// Requested resource does not exist.
    ///
    /// Returns HTTP 404 Not Found. The payload names the resource.
    #[error("{0} not found")]
    NotFound(&'static str),

    /// Resource already exists (e.g. duplicate signup).
    ///
    /// Returns HTTP 409 Conflict.
    #[error("{0}")]
    Conflict(String),

    /// Metadata store operation failed.
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    /// Object storage operation failed.
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    /// PDF rendering failed.
    #[error("Render error: {0}")]
    Render(#[from] RenderError),

    /// Password hashing or token signing failed.
    #[error("Auth error: {0}")]
    Auth(#[from] AuthError),

    /// Any other upstream failure (mail API, archive building).
    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<ValidationError> for AppError {
    fn from(err: ValidationError) -> Self {
        AppError::InvalidRequest(err.to_string())
    }
}

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        AppError::InvalidRequest(format!("Malformed request body: {}", rejection.body_text()))
    }
}

/// Convert AppError into an HTTP response.
///
/// # Response Format
///
/// All errors return JSON in this format:
/// ```json
/// {
///   "error": "Human-readable error message",
///   "details": "optional detail"
/// }
/// ```
///
/// # Status Code Mapping
///
/// - `InvalidRequest` → 400 Bad Request
/// - `MissingApiKey`, `InvalidApiKey`, `Unauthorized` → 401 Unauthorized
/// - `ApiKeyLimitExceeded`, `InvalidSignature` → 403 Forbidden
/// - `NotFound` → 404 Not Found
/// - `Conflict` → 409 Conflict
/// - everything else → 500 Internal Server Error (details are logged, not returned)
impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message, details) = match self {
            AppError::InvalidRequest(ref msg) => (StatusCode::BAD_REQUEST, msg.clone(), None),
            AppError::MissingApiKey | AppError::InvalidApiKey => {
                (StatusCode::UNAUTHORIZED, self.to_string(), None)
            }
            AppError::Unauthorized(ref reason) => (
                StatusCode::UNAUTHORIZED,
                self.to_string(),
                Some(reason.clone()),
            ),
            AppError::ApiKeyLimitExceeded | AppError::InvalidSignature => {
                (StatusCode::FORBIDDEN, self.to_string(), None)
            }
            AppError::NotFound(_) | AppError::Store(StoreError::NotFound) => {
                (StatusCode::NOT_FOUND, self.to_string(), None)
            }
            AppError::Storage(StorageError::NotFound(_)) => {
                (StatusCode::NOT_FOUND, "Object not found".to_string(), None)
            }
            AppError::Conflict(ref msg) => (StatusCode::CONFLICT, msg.clone(), None),
            AppError::Store(_)
            | AppError::Storage(_)
            | AppError::Render(_)
            | AppError::Auth(_)
            | AppError::Internal(_) => {
                tracing::error!(error = %self, "request failed");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "An internal error occurred".to_string(),
                    None,
                )
            }
        };

        let body = match details {
            Some(details) => json!({ "error": message, "details": details }),
            None => json!({ "error": message }),
        };

        (status, Json(body)).into_response()
    }
}
