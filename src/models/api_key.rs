//! API key model for certificate generation quotas.
//!
//! Each key belongs to a user account and carries a usage counter that the
//! gate increments on every accepted request.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Represents an API key record from the metadata store.
///
/// # Database Table
///
/// Maps to the `api_keys` table, keyed by `(user_id, api_key)` with a unique
/// index on `api_key` for the gate lookup.
#[derive(Debug, Clone, PartialEq, sqlx::FromRow, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiKeyRecord {
    /// Owner of the key
    pub user_id: Uuid,

    /// The key value callers send in `X-API-Key`
    pub api_key: String,

    /// Human-readable label chosen by the owner
    pub name: String,

    /// Why the key was requested
    pub reason: String,

    pub created_at: DateTime<Utc>,

    /// Certificates generated with this key so far (never negative)
    pub usage_count: i64,

    /// Maximum value `usage_count` may reach
    #[serde(rename = "limit")]
    pub usage_limit: i64,
}

impl ApiKeyRecord {
    pub fn remaining(&self) -> i64 {
        (self.usage_limit - self.usage_count).max(0)
    }
}

/// Result of trying to charge a key.
#[derive(Debug, Clone, PartialEq)]
pub enum QuotaOutcome {
    /// Counter was incremented; holds the updated record.
    Granted(ApiKeyRecord),
    /// Key exists but `usage_count + cost` would pass the limit.
    Exhausted(ApiKeyRecord),
    /// No such key.
    Unknown,
}

/// Request body for `POST /generate-api-key`.
#[derive(Debug, Deserialize)]
pub struct CreateApiKeyRequest {
    pub name: String,

    #[serde(default)]
    pub reason: String,
}

/// Request body for `DELETE /delete-api-key` and `POST /regenerate-api-key`.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiKeyRequest {
    pub api_key: String,
}

/// Response for `GET /get-api-keys`.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiKeyListResponse {
    pub api_keys: Vec<ApiKeyRecord>,
}
