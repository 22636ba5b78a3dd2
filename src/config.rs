//! Application configuration management.
//!
//! Configuration is read from environment variables with the `envy` crate,
//! after optionally loading a `.env` file.

use serde::Deserialize;

/// Application configuration loaded from environment variables.
///
/// # Environment Variables
///
/// - `DATABASE_URL` (optional): PostgreSQL connection string; without it the
///   metadata store is kept in memory
/// - `SERVER_PORT` (optional): HTTP server port, defaults to 3000
/// - `PUBLIC_BASE_URL` (optional): externally reachable origin used for signed
///   URLs and the verification link printed on certificates
/// - `STORAGE_ROOT` (optional): directory backing the object store
/// - `URL_SIGNING_SECRET`, `JWT_SECRET` (required)
/// - `ANTHROPIC_API_KEY` (optional): enables AI name suggestions
/// - `MAIL_API_URL`, `MAIL_API_KEY` (optional): enables OTP delivery by mail
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub database_url: Option<String>,

    #[serde(default = "default_port")]
    pub server_port: u16,

    #[serde(default = "default_public_base_url")]
    pub public_base_url: String,

    #[serde(default = "default_storage_root")]
    pub storage_root: String,

    pub url_signing_secret: String,

    pub jwt_secret: String,

    /// Lifetime of login session tokens.
    #[serde(default = "default_one_hour")]
    pub session_ttl_secs: u64,

    /// Lifetime of presigned object URLs.
    #[serde(default = "default_one_hour")]
    pub signed_url_ttl_secs: u64,

    #[serde(default = "default_otp_ttl")]
    pub otp_ttl_secs: u64,

    /// Quota assigned to freshly generated API keys.
    #[serde(default = "default_api_key_limit")]
    pub default_api_key_limit: i64,

    #[serde(default)]
    pub anthropic_api_key: Option<String>,

    #[serde(default = "default_name_model")]
    pub name_model: String,

    #[serde(default)]
    pub mail_api_url: Option<String>,

    #[serde(default)]
    pub mail_api_key: Option<String>,

    #[serde(default = "default_mail_from")]
    pub mail_from: String,
}

fn default_port() -> u16 {
    3000
}

fn default_public_base_url() -> String {
    "http://localhost:3000".to_string()
}

fn default_storage_root() -> String {
    "storage".to_string()
}

fn default_one_hour() -> u64 {
    3600
}

fn default_otp_ttl() -> u64 {
    600
}

fn default_api_key_limit() -> i64 {
    100
}

fn default_name_model() -> String {
    "claude-3-haiku-20240307".to_string()
}

fn default_mail_from() -> String {
    "no-reply@certforge.local".to_string()
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// # Errors
    ///
    /// Returns an error if required variables (`URL_SIGNING_SECRET`,
    /// `JWT_SECRET`) are missing or a value cannot be parsed.
    pub fn from_env() -> Result<Self, envy::Error> {
        dotenvy::dotenv().ok();
        envy::from_env::<Config>()
    }

    /// Base URL with any trailing slash removed.
    pub fn base_url(&self) -> &str {
        self.public_base_url.trim_end_matches('/')
    }

    /// Link printed on certificates and returned by the verify endpoint.
    pub fn verification_url(&self, certificate_id: &str) -> String {
        format!("{}/verify-certificate/{}", self.base_url(), certificate_id)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            database_url: None,
            server_port: default_port(),
            public_base_url: default_public_base_url(),
            storage_root: default_storage_root(),
            url_signing_secret: "dev-url-signing-secret".to_string(),
            jwt_secret: "dev-jwt-secret".to_string(),
            session_ttl_secs: default_one_hour(),
            signed_url_ttl_secs: default_one_hour(),
            otp_ttl_secs: default_otp_ttl(),
            default_api_key_limit: default_api_key_limit(),
            anthropic_api_key: None,
            name_model: default_name_model(),
            mail_api_url: None,
            mail_api_key: None,
            mail_from: default_mail_from(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn verification_url_ignores_trailing_slash() {
        let config = Config {
            public_base_url: "https://certs.example.com/".to_string(),
            ..Config::default()
        };
        assert_eq!(
            config.verification_url("abc"),
            "https://certs.example.com/verify-certificate/abc"
        );
    }
}
