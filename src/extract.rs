//! Request extractors that report failures in the JSON error shape.

use axum::{
    extract::{FromRequest, FromRequestParts},
    http::request::Parts,
    response::{IntoResponse, Response},
};
use serde::Serialize;

use crate::error::AppError;

/// `axum::Json` whose rejections become `AppError::InvalidRequest`.
#[derive(Debug, FromRequest)]
#[from_request(via(axum::Json), rejection(AppError))]
pub struct AppJson<T>(pub T);

impl<T: Serialize> IntoResponse for AppJson<T> {
    fn into_response(self) -> Response {
        axum::Json(self.0).into_response()
    }
}

pub const API_KEY_HEADER: &str = "x-api-key";

/// Value of the `X-API-Key` header. Missing or blank is a 401.
#[derive(Debug, Clone)]
pub struct ApiKeyHeader(pub String);

impl<S: Send + Sync> FromRequestParts<S> for ApiKeyHeader {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .headers
            .get(API_KEY_HEADER)
            .and_then(|v| v.to_str().ok())
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .map(|v| ApiKeyHeader(v.to_string()))
            .ok_or(AppError::MissingApiKey)
    }
}
