//! API key quota gate and key management.
//!
//! # Quota Accounting
//!
//! `authorize` charges the key before any rendering happens, using the
//! store's atomic conditional increment. When the downstream render or
//! persist step fails the caller gives the units back with `release`, so a
//! failed generation does not count against the key.

use chrono::Utc;
use uuid::Uuid;

use crate::db::MetadataStore;
use crate::error::AppError;
use crate::models::api_key::{ApiKeyRecord, CreateApiKeyRequest, QuotaOutcome};

/// Prefix that makes keys recognisable in logs and config files.
pub const API_KEY_PREFIX: &str = "cf_";

/// Generate a new key: prefix plus 32 random bytes, hex encoded.
pub fn generate_api_key() -> String {
    let bytes: [u8; 32] = rand::random();
    format!("{API_KEY_PREFIX}{}", hex::encode(bytes))
}

/// Charge `cost` units to `api_key`.
///
/// # Errors
///
/// - `InvalidApiKey`: no such key
/// - `ApiKeyLimitExceeded`: `usage_count + cost` would pass the limit
pub async fn authorize(
    store: &dyn MetadataStore,
    api_key: &str,
    cost: i64,
) -> Result<ApiKeyRecord, AppError> {
    match store.consume_quota(api_key, cost).await? {
        QuotaOutcome::Granted(record) => {
            tracing::debug!(
                user_id = %record.user_id,
                usage = record.usage_count,
                limit = record.usage_limit,
                "api key charged"
            );
            Ok(record)
        }
        QuotaOutcome::Exhausted(record) => {
            tracing::warn!(
                user_id = %record.user_id,
                usage = record.usage_count,
                limit = record.usage_limit,
                cost,
                "api key quota exhausted"
            );
            Err(AppError::ApiKeyLimitExceeded)
        }
        QuotaOutcome::Unknown => Err(AppError::InvalidApiKey),
    }
}

/// Return `cost` units to the key. Failures are logged, not propagated:
/// the caller is already reporting the error that triggered the release.
pub async fn release(store: &dyn MetadataStore, api_key: &str, cost: i64) {
    if cost <= 0 {
        return;
    }
    if let Err(e) = store.release_quota(api_key, cost).await {
        tracing::error!(error = %e, cost, "failed to release api key quota");
    }
}

pub async fn create_api_key(
    store: &dyn MetadataStore,
    user_id: Uuid,
    request: CreateApiKeyRequest,
    usage_limit: i64,
) -> Result<ApiKeyRecord, AppError> {
    let name = request.name.trim();
    if name.is_empty() {
        return Err(AppError::InvalidRequest("API key name is required".to_string()));
    }

    let record = ApiKeyRecord {
        user_id,
        api_key: generate_api_key(),
        name: name.to_string(),
        reason: request.reason.trim().to_string(),
        created_at: Utc::now(),
        usage_count: 0,
        usage_limit,
    };
    store.create_api_key(&record).await?;
    tracing::info!(user_id = %user_id, "api key created");
    Ok(record)
}

pub async fn list_api_keys(
    store: &dyn MetadataStore,
    user_id: Uuid,
) -> Result<Vec<ApiKeyRecord>, AppError> {
    Ok(store.list_api_keys(user_id).await?)
}

pub async fn delete_api_key(
    store: &dyn MetadataStore,
    user_id: Uuid,
    api_key: &str,
) -> Result<(), AppError> {
    if store.delete_api_key(user_id, api_key).await? {
        tracing::info!(user_id = %user_id, "api key deleted");
        Ok(())
    } else {
        Err(AppError::NotFound("API key"))
    }
}

/// Swap the key value, keeping its usage counter and limit.
pub async fn regenerate_api_key(
    store: &dyn MetadataStore,
    user_id: Uuid,
    api_key: &str,
) -> Result<ApiKeyRecord, AppError> {
    store
        .rotate_api_key(user_id, api_key, &generate_api_key())
        .await?
        .ok_or(AppError::NotFound("API key"))
}
