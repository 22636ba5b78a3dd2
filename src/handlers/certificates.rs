//! Certificate HTTP handlers.
//!
//! This module implements:
//! - POST /generate-certificate - Render and store one certificate
//! - GET /verify-certificate/{id} - Look up a certificate by id

use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;

use crate::{
    error::AppError,
    extract::{ApiKeyHeader, AppJson},
    models::certificate::{CertificateRequestBody, GenerateCertificateResponse},
    services::certificate_service,
    state::AppState,
};

/// Generate a single certificate.
///
/// # Endpoint
///
/// `POST /generate-certificate`
///
/// # Authentication
///
/// Requires an API key in the `X-API-Key` header. Each successful call
/// consumes one unit of the key's quota.
///
/// # Request Body
///
/// ```json
/// {
///   "name": "Ada Lovelace",
///   "course": "Analytical Engines",
///   "date": "2024-05-01",
///   "certificateType": "completion",
///   "issuer": "Babbage Institute",
///   "additionalInfo": "With distinction",
///   "logo": "data:image/png;base64,...",
///   "signatures": [{ "name": "C. Babbage", "image": "..." }],
///   "template": "classic-elegance"
/// }
/// ```
///
/// # Response
///
/// - **Success (200 OK)**: `{ "id": "...", "url": "<signed PDF URL>" }`
/// - **Error (400)**: Missing field, unknown template or type, bad image
/// - **Error (401)**: Missing or unknown API key
/// - **Error (403)**: API key quota exhausted
/// - **Error (500)**: Rendering or storage failure
pub async fn generate_certificate(
    State(state): State<AppState>,
    ApiKeyHeader(api_key): ApiKeyHeader,
    AppJson(body): AppJson<CertificateRequestBody>,
) -> Result<Json<GenerateCertificateResponse>, AppError> {
    let response = certificate_service::generate_certificate(&state, &api_key, body).await?;
    Ok(Json(response))
}

/// Verify a certificate.
///
/// # Endpoint
///
/// `GET /verify-certificate/{id}`
///
/// # Response
///
/// - **Success (200 OK)**: the stored metadata plus `pdfUrl` and `isValid: true`
/// - **Error (404)**: `{ "error": "Certificate not found", "isValid": false }`
pub async fn verify_certificate(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Response, AppError> {
    match certificate_service::verify_certificate(&state, &id).await {
        Ok(verified) => Ok(Json(verified).into_response()),
        Err(AppError::NotFound(_)) => Ok((
            StatusCode::NOT_FOUND,
            Json(json!({ "error": "Certificate not found", "isValid": false })),
        )
            .into_response()),
        Err(e) => Err(e),
    }
}
