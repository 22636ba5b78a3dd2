//! Password hashing and session tokens for the account endpoints.

pub mod password;
pub mod token;

#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("crypto error: {0}")]
    Crypto(String),

    #[error("token expired")]
    TokenExpired,

    #[error("invalid token: {0}")]
    TokenInvalid(String),
}
