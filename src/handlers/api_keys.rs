//! API key management for the signed-in user.
//!
//! All routes sit behind the session middleware, so `SessionContext` is
//! always present and every operation is scoped to its `user_id`.

use axum::{Extension, Json, extract::State, http::StatusCode};

use crate::{
    error::AppError,
    extract::AppJson,
    middleware::session::SessionContext,
    models::api_key::{ApiKeyListResponse, ApiKeyRecord, ApiKeyRequest, CreateApiKeyRequest},
    models::user::MessageResponse,
    services::api_key_service,
    state::AppState,
};

/// Generate a new API key.
///
/// # Endpoint
///
/// `POST /generate-api-key`
///
/// # Request Body
///
/// ```json
/// { "name": "CI pipeline", "reason": "nightly certificates" }
/// ```
///
/// # Response
///
/// - **Success (201 Created)**: the new key record, including the key value
///   and a fresh usage counter with the configured default limit
/// - **Error (400)**: Empty name
/// - **Error (401)**: Missing or invalid session
pub async fn generate_api_key(
    State(state): State<AppState>,
    Extension(session): Extension<SessionContext>,
    AppJson(request): AppJson<CreateApiKeyRequest>,
) -> Result<(StatusCode, Json<ApiKeyRecord>), AppError> {
    let record = api_key_service::create_api_key(
        state.metadata.as_ref(),
        session.user_id,
        request,
        state.config.default_api_key_limit,
    )
    .await?;
    Ok((StatusCode::CREATED, Json(record)))
}

pub async fn get_api_keys(
    State(state): State<AppState>,
    Extension(session): Extension<SessionContext>,
) -> Result<Json<ApiKeyListResponse>, AppError> {
    let api_keys = api_key_service::list_api_keys(state.metadata.as_ref(), session.user_id).await?;
    Ok(Json(ApiKeyListResponse { api_keys }))
}

/// `DELETE /delete-api-key` with `{ "apiKey": "..." }`. Keys owned by other
/// users are reported as not found.
pub async fn delete_api_key(
    State(state): State<AppState>,
    Extension(session): Extension<SessionContext>,
    AppJson(request): AppJson<ApiKeyRequest>,
) -> Result<Json<MessageResponse>, AppError> {
    api_key_service::delete_api_key(state.metadata.as_ref(), session.user_id, &request.api_key)
        .await?;
    Ok(Json(MessageResponse::ok("API key deleted")))
}

pub async fn regenerate_api_key(
    State(state): State<AppState>,
    Extension(session): Extension<SessionContext>,
    AppJson(request): AppJson<ApiKeyRequest>,
) -> Result<Json<ApiKeyRecord>, AppError> {
    let record = api_key_service::regenerate_api_key(
        state.metadata.as_ref(),
        session.user_id,
        &request.api_key,
    )
    .await?;
    Ok(Json(record))
}
