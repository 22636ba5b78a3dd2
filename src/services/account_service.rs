//! Account flows: signup, login, OTP password reset, password change and
//! the dashboard payload.

use chrono::Utc;
use rand::Rng;
use subtle::ConstantTimeEq;
use uuid::Uuid;

use crate::auth::{password, token};
use crate::clients::MailMessage;
use crate::db::{MetadataStore, StoreError};
use crate::error::AppError;
use crate::models::user::{
    LoginRequest, OtpRecord, ResetPasswordRequest, SignupRequest, User, UserDataResponse,
};
use crate::state::AppState;

pub const MIN_PASSWORD_LEN: usize = 8;

/// Wrong codes tolerated before the pending OTP is discarded.
pub const MAX_OTP_ATTEMPTS: i32 = 5;

fn normalize_email(email: &str) -> Result<String, AppError> {
    let email = email.trim().to_ascii_lowercase();
    match email.split_once('@') {
        Some((local, domain)) if !local.is_empty() && domain.contains('.') => Ok(email),
        _ => Err(AppError::InvalidRequest("A valid email is required".to_string())),
    }
}

fn check_password(password: &str) -> Result<(), AppError> {
    if password.chars().count() < MIN_PASSWORD_LEN {
        return Err(AppError::InvalidRequest(format!(
            "Password must be at least {MIN_PASSWORD_LEN} characters"
        )));
    }
    Ok(())
}

/// Six decimal digits, leading zeros kept.
pub fn generate_otp() -> String {
    format!("{:06}", rand::rng().random_range(0..1_000_000))
}

pub async fn signup(store: &dyn MetadataStore, request: SignupRequest) -> Result<User, AppError> {
    let email = normalize_email(&request.email)?;
    let name = request.name.trim();
    if name.is_empty() {
        return Err(AppError::InvalidRequest("Name is required".to_string()));
    }
    check_password(&request.password)?;

    let user = User {
        user_id: Uuid::new_v4(),
        email,
        name: name.to_string(),
        password_hash: password::hash_password_blocking(request.password).await?,
        created_at: Utc::now(),
    };
    match store.create_user(&user).await {
        Ok(()) => {
            tracing::info!(user_id = %user.user_id, "account created");
            Ok(user)
        }
        Err(StoreError::AlreadyExists) => Err(AppError::Conflict(
            "An account with this email already exists".to_string(),
        )),
        Err(e) => Err(e.into()),
    }
}

/// Check credentials and issue a session token.
pub async fn login(state: &AppState, request: LoginRequest) -> Result<String, AppError> {
    let invalid = || AppError::Unauthorized("Invalid email or password".to_string());

    let email = normalize_email(&request.email).map_err(|_| invalid())?;
    let user = state
        .metadata
        .find_user_by_email(&email)
        .await?
        .ok_or_else(invalid)?;
    if !password::verify_password_blocking(request.password, user.password_hash.clone()).await? {
        return Err(invalid());
    }

    Ok(token::issue_session_token(
        user.user_id,
        &user.email,
        &state.config.jwt_secret,
        state.config.session_ttl_secs,
    )?)
}

/// Store a fresh OTP for `email` and mail it. A new OTP replaces any
/// earlier one.
pub async fn send_otp(state: &AppState, email: &str) -> Result<(), AppError> {
    let email = normalize_email(email)?;
    if state.metadata.find_user_by_email(&email).await?.is_none() {
        return Err(AppError::NotFound("User"));
    }

    let ttl = state.config.otp_ttl_secs;
    let otp = OtpRecord {
        email: email.clone(),
        otp: generate_otp(),
        expires_at: Utc::now() + chrono::Duration::seconds(ttl as i64),
        attempts: 0,
    };
    state.metadata.put_otp(&otp).await?;
    state
        .mailer
        .send(&MailMessage::otp(&email, &otp.otp, ttl))
        .await
        .map_err(|e| AppError::Internal(format!("OTP mail failed: {e}")))?;

    tracing::info!(email = %email, "otp issued");
    Ok(())
}

fn otp_matches(stored: &str, presented: &str) -> bool {
    stored.as_bytes().ct_eq(presented.as_bytes()).into()
}

/// Verify the OTP, then overwrite the password and consume the OTP.
///
/// Each wrong code is counted; after [`MAX_OTP_ATTEMPTS`] the OTP is
/// discarded and a new one has to be requested.
pub async fn reset_password(
    store: &dyn MetadataStore,
    request: ResetPasswordRequest,
) -> Result<(), AppError> {
    let email = normalize_email(&request.email)?;
    let stored = store
        .find_otp(&email)
        .await?
        .ok_or_else(|| AppError::InvalidRequest("Invalid OTP".to_string()))?;

    if stored.is_expired(Utc::now()) {
        store.delete_otp(&email).await?;
        return Err(AppError::InvalidRequest("OTP has expired".to_string()));
    }
    if !otp_matches(&stored.otp, request.otp.trim()) {
        let attempts = store.record_otp_failure(&email).await?.unwrap_or(MAX_OTP_ATTEMPTS);
        if attempts >= MAX_OTP_ATTEMPTS {
            store.delete_otp(&email).await?;
            tracing::warn!(email = %email, attempts, "otp discarded after repeated failures");
            return Err(AppError::InvalidRequest(
                "Too many invalid attempts; request a new OTP".to_string(),
            ));
        }
        return Err(AppError::InvalidRequest("Invalid OTP".to_string()));
    }
    check_password(&request.new_password)?;

    let hash = password::hash_password_blocking(request.new_password).await?;
    match store.update_password(&email, &hash).await {
        Ok(()) => {}
        Err(StoreError::NotFound) => return Err(AppError::NotFound("User")),
        Err(e) => return Err(e.into()),
    }
    store.delete_otp(&email).await?;
    tracing::info!(email = %email, "password reset");
    Ok(())
}

/// Overwrite the signed-in user's password.
pub async fn change_password(
    store: &dyn MetadataStore,
    email: &str,
    new_password: &str,
) -> Result<(), AppError> {
    check_password(new_password)?;
    let hash = password::hash_password_blocking(new_password.to_string()).await?;
    match store.update_password(email, &hash).await {
        Ok(()) => Ok(()),
        Err(StoreError::NotFound) => Err(AppError::NotFound("User")),
        Err(e) => Err(e.into()),
    }
}

pub async fn user_data(
    store: &dyn MetadataStore,
    user_id: Uuid,
) -> Result<UserDataResponse, AppError> {
    let user = store
        .find_user_by_id(user_id)
        .await?
        .ok_or(AppError::NotFound("User"))?;
    let generations = store.list_generations(user_id).await?;
    Ok(UserDataResponse {
        user_id: user.user_id,
        email: user.email,
        name: user.name,
        created_at: user.created_at,
        generations,
    })
}
