//! PostgreSQL-backed metadata store.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use super::{DbPool, MetadataStore, StoreError};
use crate::models::api_key::{ApiKeyRecord, QuotaOutcome};
use crate::models::generation::{BulkGeneration, GenerationStatus};
use crate::models::user::{OtpRecord, User};

const API_KEY_COLUMNS: &str = "user_id, api_key, name, reason, created_at, usage_count, usage_limit";
const GENERATION_COLUMNS: &str =
    "generation_id, user_id, status, total, s3_key, error, created_at, updated_at";

pub struct PgMetadataStore {
    pool: DbPool,
}

impl PgMetadataStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

/// Row shape of `bulk_generations`; `status` is stored as text.
#[derive(sqlx::FromRow)]
struct GenerationRow {
    generation_id: Uuid,
    user_id: Uuid,
    status: String,
    total: i32,
    s3_key: Option<String>,
    error: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<GenerationRow> for BulkGeneration {
    type Error = StoreError;

    fn try_from(row: GenerationRow) -> Result<Self, Self::Error> {
        Ok(Self {
            generation_id: row.generation_id,
            user_id: row.user_id,
            status: row.status.parse().map_err(StoreError::Corrupt)?,
            total: row.total,
            s3_key: row.s3_key,
            error: row.error,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

#[async_trait]
impl MetadataStore for PgMetadataStore {
    fn backend_tag(&self) -> &'static str {
        "postgres"
    }

    async fn ping(&self) -> Result<(), StoreError> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }

    async fn create_user(&self, user: &User) -> Result<(), StoreError> {
        // ON CONFLICT keeps the existence check and the insert in one statement
        let inserted = sqlx::query(
            r#"
            INSERT INTO users (user_id, email, name, password_hash, created_at)
            VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT (email) DO NOTHING
            "#,
        )
        .bind(user.user_id)
        .bind(&user.email)
        .bind(&user.name)
        .bind(&user.password_hash)
        .bind(user.created_at)
        .execute(&self.pool)
        .await?
        .rows_affected();

        if inserted == 0 {
            return Err(StoreError::AlreadyExists);
        }
        Ok(())
    }

    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, StoreError> {
        let user = sqlx::query_as::<_, User>(
            "SELECT user_id, email, name, password_hash, created_at FROM users WHERE email = $1",
        )
        .bind(email)
        .fetch_optional(&self.pool)
        .await?;
        Ok(user)
    }

    async fn find_user_by_id(&self, user_id: Uuid) -> Result<Option<User>, StoreError> {
        let user = sqlx::query_as::<_, User>(
            "SELECT user_id, email, name, password_hash, created_at FROM users WHERE user_id = $1",
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(user)
    }

    async fn update_password(&self, email: &str, password_hash: &str) -> Result<(), StoreError> {
        let updated = sqlx::query("UPDATE users SET password_hash = $1 WHERE email = $2")
            .bind(password_hash)
            .bind(email)
            .execute(&self.pool)
            .await?
            .rows_affected();

        if updated == 0 {
            return Err(StoreError::NotFound);
        }
        Ok(())
    }

    async fn put_otp(&self, otp: &OtpRecord) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO otps (email, otp, expires_at, attempts)
            VALUES ($1, $2, $3, 0)
            ON CONFLICT (email) DO UPDATE
                SET otp = EXCLUDED.otp, expires_at = EXCLUDED.expires_at, attempts = 0
            "#,
        )
        .bind(&otp.email)
        .bind(&otp.otp)
        .bind(otp.expires_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn find_otp(&self, email: &str) -> Result<Option<OtpRecord>, StoreError> {
        let otp = sqlx::query_as::<_, OtpRecord>(
            "SELECT email, otp, expires_at, attempts FROM otps WHERE email = $1",
        )
        .bind(email)
        .fetch_optional(&self.pool)
        .await?;
        Ok(otp)
    }

    async fn delete_otp(&self, email: &str) -> Result<(), StoreError> {
        sqlx::query("DELETE FROM otps WHERE email = $1")
            .bind(email)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn record_otp_failure(&self, email: &str) -> Result<Option<i32>, StoreError> {
        let attempts = sqlx::query_scalar::<_, i32>(
            "UPDATE otps SET attempts = attempts + 1 WHERE email = $1 RETURNING attempts",
        )
        .bind(email)
        .fetch_optional(&self.pool)
        .await?;
        Ok(attempts)
    }

    async fn create_api_key(&self, record: &ApiKeyRecord) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO api_keys (user_id, api_key, name, reason, created_at, usage_count, usage_limit)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            "#,
        )
        .bind(record.user_id)
        .bind(&record.api_key)
        .bind(&record.name)
        .bind(&record.reason)
        .bind(record.created_at)
        .bind(record.usage_count)
        .bind(record.usage_limit)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn list_api_keys(&self, user_id: Uuid) -> Result<Vec<ApiKeyRecord>, StoreError> {
        let keys = sqlx::query_as::<_, ApiKeyRecord>(&format!(
            "SELECT {API_KEY_COLUMNS} FROM api_keys WHERE user_id = $1 ORDER BY created_at DESC"
        ))
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(keys)
    }

    async fn find_api_key(&self, api_key: &str) -> Result<Option<ApiKeyRecord>, StoreError> {
        let key = sqlx::query_as::<_, ApiKeyRecord>(&format!(
            "SELECT {API_KEY_COLUMNS} FROM api_keys WHERE api_key = $1"
        ))
        .bind(api_key)
        .fetch_optional(&self.pool)
        .await?;
        Ok(key)
    }

    async fn consume_quota(&self, api_key: &str, cost: i64) -> Result<QuotaOutcome, StoreError> {
        // The limit check lives in the WHERE clause so the row lock taken by
        // UPDATE serializes concurrent callers; no read-modify-write here.
        let granted = sqlx::query_as::<_, ApiKeyRecord>(&format!(
            r#"
            UPDATE api_keys
            SET usage_count = usage_count + $2
            WHERE api_key = $1 AND usage_count + $2 <= usage_limit
            RETURNING {API_KEY_COLUMNS}
            "#
        ))
        .bind(api_key)
        .bind(cost)
        .fetch_optional(&self.pool)
        .await?;

        if let Some(record) = granted {
            return Ok(QuotaOutcome::Granted(record));
        }

        Ok(match self.find_api_key(api_key).await? {
            Some(record) => QuotaOutcome::Exhausted(record),
            None => QuotaOutcome::Unknown,
        })
    }

    async fn release_quota(&self, api_key: &str, cost: i64) -> Result<(), StoreError> {
        sqlx::query(
            "UPDATE api_keys SET usage_count = GREATEST(usage_count - $2, 0) WHERE api_key = $1",
        )
        .bind(api_key)
        .bind(cost)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn delete_api_key(&self, user_id: Uuid, api_key: &str) -> Result<bool, StoreError> {
        let deleted = sqlx::query("DELETE FROM api_keys WHERE user_id = $1 AND api_key = $2")
            .bind(user_id)
            .bind(api_key)
            .execute(&self.pool)
            .await?
            .rows_affected();
        Ok(deleted > 0)
    }

    async fn rotate_api_key(
        &self,
        user_id: Uuid,
        old_key: &str,
        new_key: &str,
    ) -> Result<Option<ApiKeyRecord>, StoreError> {
        let record = sqlx::query_as::<_, ApiKeyRecord>(&format!(
            r#"
            UPDATE api_keys SET api_key = $3
            WHERE user_id = $1 AND api_key = $2
            RETURNING {API_KEY_COLUMNS}
            "#
        ))
        .bind(user_id)
        .bind(old_key)
        .bind(new_key)
        .fetch_optional(&self.pool)
        .await?;
        Ok(record)
    }

    async fn create_generation(&self, generation: &BulkGeneration) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO bulk_generations
                (generation_id, user_id, status, total, s3_key, error, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            "#,
        )
        .bind(generation.generation_id)
        .bind(generation.user_id)
        .bind(generation.status.as_str())
        .bind(generation.total)
        .bind(&generation.s3_key)
        .bind(&generation.error)
        .bind(generation.created_at)
        .bind(generation.updated_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn find_generation(
        &self,
        generation_id: Uuid,
    ) -> Result<Option<BulkGeneration>, StoreError> {
        sqlx::query_as::<_, GenerationRow>(&format!(
            "SELECT {GENERATION_COLUMNS} FROM bulk_generations WHERE generation_id = $1"
        ))
        .bind(generation_id)
        .fetch_optional(&self.pool)
        .await?
        .map(BulkGeneration::try_from)
        .transpose()
    }

    async fn list_generations(&self, user_id: Uuid) -> Result<Vec<BulkGeneration>, StoreError> {
        sqlx::query_as::<_, GenerationRow>(&format!(
            "SELECT {GENERATION_COLUMNS} FROM bulk_generations WHERE user_id = $1 ORDER BY created_at DESC"
        ))
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?
        .into_iter()
        .map(BulkGeneration::try_from)
        .collect()
    }

    async fn update_generation(
        &self,
        generation_id: Uuid,
        status: GenerationStatus,
        s3_key: Option<&str>,
        error: Option<&str>,
    ) -> Result<BulkGeneration, StoreError> {
        let mut tx = self.pool.begin().await?;

        let current: String = sqlx::query_scalar(
            "SELECT status FROM bulk_generations WHERE generation_id = $1 FOR UPDATE",
        )
        .bind(generation_id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or(StoreError::NotFound)?;

        let current: GenerationStatus = current.parse().map_err(StoreError::Corrupt)?;
        if !current.can_transition_to(status) {
            tx.rollback().await?;
            return Err(StoreError::InvalidTransition {
                from: current,
                to: status,
            });
        }

        let row = sqlx::query_as::<_, GenerationRow>(&format!(
            r#"
            UPDATE bulk_generations
            SET status = $2, s3_key = COALESCE($3, s3_key), error = $4, updated_at = NOW()
            WHERE generation_id = $1
            RETURNING {GENERATION_COLUMNS}
            "#
        ))
        .bind(generation_id)
        .bind(status.as_str())
        .bind(s3_key)
        .bind(error)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;
        row.try_into()
    }
}
