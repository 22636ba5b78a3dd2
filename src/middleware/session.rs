//! Bearer session authentication middleware.
//!
//! This middleware guards the account routes:
//! 1. Extract the token from `Authorization: Bearer <token>`
//! 2. Verify signature and expiry against `JWT_SECRET`
//! 3. Inject a `SessionContext` into the request
//! 4. Reject everything else with HTTP 401

use axum::{
    extract::{Request, State},
    http::header::AUTHORIZATION,
    middleware::Next,
    response::Response,
};
use uuid::Uuid;

use crate::auth::{AuthError, token};
use crate::error::AppError;
use crate::state::AppState;

/// Identity of the signed-in user, available to handlers as
/// `Extension<SessionContext>`.
#[derive(Debug, Clone)]
pub struct SessionContext {
    pub user_id: Uuid,
    pub email: String,
}

pub async fn session_middleware(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let token = request
        .headers()
        .get(AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .and_then(|h| h.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .ok_or_else(|| AppError::Unauthorized("Missing bearer token".to_string()))?;

    let claims =
        token::decode_session_token(token, &state.config.jwt_secret).map_err(|e| match e {
            AuthError::TokenExpired => AppError::Unauthorized("Session expired".to_string()),
            _ => AppError::Unauthorized("Invalid session token".to_string()),
        })?;
    let user_id = claims
        .user_id()
        .map_err(|_| AppError::Unauthorized("Invalid session token".to_string()))?;

    request.extensions_mut().insert(SessionContext {
        user_id,
        email: claims.email,
    });
    Ok(next.run(request).await)
}
