//! Account HTTP handlers.
//!
//! Public:
//! - POST /signup - Create an account
//! - POST /login - Exchange credentials for a session token
//! - POST /send-otp - Mail a password reset code
//! - POST /reset-password - Reset a password with the mailed code
//!
//! Behind the session middleware:
//! - POST /change-password
//! - GET /get-user-data

use axum::{Extension, Json, extract::State, http::StatusCode};

use crate::{
    error::AppError,
    extract::AppJson,
    middleware::session::SessionContext,
    models::user::{
        ChangePasswordRequest, LoginRequest, LoginResponse, MessageResponse,
        ResetPasswordRequest, SendOtpRequest, SignupRequest, UserDataResponse,
    },
    services::account_service,
    state::AppState,
};

/// Create a new account.
///
/// # Endpoint
///
/// `POST /signup`
///
/// # Request Body
///
/// ```json
/// { "email": "ada@example.com", "name": "Ada", "password": "correct horse" }
/// ```
///
/// # Response
///
/// - **Success (201 Created)**: `{ "success": true, "message": "Account created" }`
/// - **Error (400)**: Invalid email, empty name or short password
/// - **Error (409)**: Email already registered
pub async fn signup(
    State(state): State<AppState>,
    AppJson(request): AppJson<SignupRequest>,
) -> Result<(StatusCode, Json<MessageResponse>), AppError> {
    account_service::signup(state.metadata.as_ref(), request).await?;
    Ok((
        StatusCode::CREATED,
        Json(MessageResponse::ok("Account created")),
    ))
}

/// `POST /login`. Returns `{ "token": "<jwt>" }`; wrong credentials are a 401
/// that does not say which half was wrong.
pub async fn login(
    State(state): State<AppState>,
    AppJson(request): AppJson<LoginRequest>,
) -> Result<Json<LoginResponse>, AppError> {
    let token = account_service::login(&state, request).await?;
    Ok(Json(LoginResponse { token }))
}

pub async fn send_otp(
    State(state): State<AppState>,
    AppJson(request): AppJson<SendOtpRequest>,
) -> Result<Json<MessageResponse>, AppError> {
    account_service::send_otp(&state, &request.email).await?;
    Ok(Json(MessageResponse::ok("OTP sent")))
}

pub async fn reset_password(
    State(state): State<AppState>,
    AppJson(request): AppJson<ResetPasswordRequest>,
) -> Result<Json<MessageResponse>, AppError> {
    account_service::reset_password(state.metadata.as_ref(), request).await?;
    Ok(Json(MessageResponse::ok("Password reset")))
}

pub async fn change_password(
    State(state): State<AppState>,
    Extension(session): Extension<SessionContext>,
    AppJson(request): AppJson<ChangePasswordRequest>,
) -> Result<Json<MessageResponse>, AppError> {
    account_service::change_password(
        state.metadata.as_ref(),
        &session.email,
        &request.new_password,
    )
    .await?;
    Ok(Json(MessageResponse::ok("Password changed")))
}

/// Profile of the signed-in user together with their bulk generations.
pub async fn get_user_data(
    State(state): State<AppState>,
    Extension(session): Extension<SessionContext>,
) -> Result<Json<UserDataResponse>, AppError> {
    Ok(Json(
        account_service::user_data(state.metadata.as_ref(), session.user_id).await?,
    ))
}
