//! Download endpoint behind presigned URLs.

use axum::{
    body::Body,
    extract::{Path, Query, State},
    http::{HeaderValue, header},
    response::{IntoResponse, Response},
};
use chrono::Utc;
use serde::Deserialize;

use crate::{error::AppError, state::AppState};

#[derive(Debug, Deserialize)]
pub struct SignedQuery {
    pub expires: Option<i64>,
    pub signature: Option<String>,
}

/// Serve an object when the query carries a valid, unexpired signature.
///
/// # Endpoint
///
/// `GET /objects/{*key}?expires={unix}&signature={hex}`
///
/// # Response
///
/// - **Success (200 OK)**: the raw bytes with a content type guessed from
///   the key's extension
/// - **Error (403)**: Missing, tampered or expired signature
/// - **Error (404)**: Signature is valid but the object is gone
pub async fn get_object(
    State(state): State<AppState>,
    Path(key): Path<String>,
    Query(query): Query<SignedQuery>,
) -> Result<Response, AppError> {
    let (Some(expires), Some(signature)) = (query.expires, query.signature) else {
        return Err(AppError::InvalidSignature);
    };
    state
        .persistence
        .signer()
        .verify(&key, expires, &signature, Utc::now())
        .map_err(|e| {
            tracing::debug!(key = %key, reason = %e, "rejected signed url");
            AppError::InvalidSignature
        })?;

    let bytes = state.persistence.get(&key).await?;

    let content_type = mime_guess::from_path(&key).first_or_octet_stream();
    let filename = key.rsplit('/').next().unwrap_or(&key);
    let disposition = HeaderValue::from_str(&format!("inline; filename=\"{filename}\""))
        .unwrap_or_else(|_| HeaderValue::from_static("inline"));

    Ok((
        [
            (
                header::CONTENT_TYPE,
                HeaderValue::from_str(content_type.as_ref())
                    .unwrap_or_else(|_| HeaderValue::from_static("application/octet-stream")),
            ),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        Body::from(bytes),
    )
        .into_response())
}
