//! Metadata store: users, one-time passwords, API keys and bulk generations.
//!
//! Handlers never talk to a concrete database. They receive an
//! `Arc<dyn MetadataStore>` through the application state, which is either a
//! PostgreSQL-backed store or the in-memory store used for local runs and
//! tests.

mod memory;
mod postgres;

pub use memory::MemoryMetadataStore;
pub use postgres::PgMetadataStore;

use async_trait::async_trait;
use sqlx::{Pool, Postgres};
use uuid::Uuid;

use crate::models::api_key::{ApiKeyRecord, QuotaOutcome};
use crate::models::generation::{BulkGeneration, GenerationStatus};
use crate::models::user::{OtpRecord, User};

/// Type alias for PostgreSQL connection pool.
pub type DbPool = Pool<Postgres>;

/// Errors surfaced by metadata store backends.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Record not found")]
    NotFound,

    #[error("Record already exists")]
    AlreadyExists,

    /// A status change the generation state machine does not allow.
    #[error("Invalid status transition from {from} to {to}")]
    InvalidTransition {
        from: GenerationStatus,
        to: GenerationStatus,
    },

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Corrupt record: {0}")]
    Corrupt(String),
}

/// Storage operations the request handlers depend on.
///
/// Implementations must make `consume_quota` atomic: concurrent calls for the
/// same key never push `usage_count` past `usage_limit`.
#[async_trait]
pub trait MetadataStore: Send + Sync + 'static {
    fn backend_tag(&self) -> &'static str;

    /// Round trip to the backend, used by the health check.
    async fn ping(&self) -> Result<(), StoreError> {
        Ok(())
    }

    // Users

    /// Insert a user unless one already exists for the email.
    ///
    /// Returns `StoreError::AlreadyExists` on conflict.
    async fn create_user(&self, user: &User) -> Result<(), StoreError>;
    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, StoreError>;
    async fn find_user_by_id(&self, user_id: Uuid) -> Result<Option<User>, StoreError>;
    async fn update_password(&self, email: &str, password_hash: &str) -> Result<(), StoreError>;

    // One-time passwords

    /// Store an OTP, replacing any earlier one for the same email.
    async fn put_otp(&self, otp: &OtpRecord) -> Result<(), StoreError>;
    async fn find_otp(&self, email: &str) -> Result<Option<OtpRecord>, StoreError>;
    async fn delete_otp(&self, email: &str) -> Result<(), StoreError>;

    /// Count one wrong code against the email's OTP and return the new
    /// total, or `None` when no OTP is pending.
    async fn record_otp_failure(&self, email: &str) -> Result<Option<i32>, StoreError>;

    // API keys

    async fn create_api_key(&self, record: &ApiKeyRecord) -> Result<(), StoreError>;
    async fn list_api_keys(&self, user_id: Uuid) -> Result<Vec<ApiKeyRecord>, StoreError>;
    async fn find_api_key(&self, api_key: &str) -> Result<Option<ApiKeyRecord>, StoreError>;

    /// Atomically add `cost` to the key's counter if it stays within the limit.
    async fn consume_quota(&self, api_key: &str, cost: i64) -> Result<QuotaOutcome, StoreError>;

    /// Give back `cost` units previously consumed; the counter never goes below zero.
    async fn release_quota(&self, api_key: &str, cost: i64) -> Result<(), StoreError>;

    /// Returns `false` when the user owns no such key.
    async fn delete_api_key(&self, user_id: Uuid, api_key: &str) -> Result<bool, StoreError>;

    /// Replace the key value in place, keeping its counter and limit.
    async fn rotate_api_key(
        &self,
        user_id: Uuid,
        old_key: &str,
        new_key: &str,
    ) -> Result<Option<ApiKeyRecord>, StoreError>;

    // Bulk generations

    async fn create_generation(&self, generation: &BulkGeneration) -> Result<(), StoreError>;
    async fn find_generation(&self, generation_id: Uuid)
    -> Result<Option<BulkGeneration>, StoreError>;
    async fn list_generations(&self, user_id: Uuid) -> Result<Vec<BulkGeneration>, StoreError>;

    /// Move a generation to `status`, rejecting transitions the state
    /// machine does not allow.
    async fn update_generation(
        &self,
        generation_id: Uuid,
        status: GenerationStatus,
        s3_key: Option<&str>,
        error: Option<&str>,
    ) -> Result<BulkGeneration, StoreError>;
}

/// Create a new PostgreSQL connection pool.
///
/// # Configuration
///
/// - Maximum connections: 5
/// - Connections are created lazily as needed
///
/// # Errors
///
/// Returns an error if the connection string is invalid or the server is
/// unreachable.
pub async fn create_pool(database_url: &str) -> Result<DbPool, sqlx::Error> {
    sqlx::postgres::PgPoolOptions::new()
        .max_connections(5)
        .connect(database_url)
        .await
}

/// Run database migrations from the `migrations/` directory.
///
/// Migrations are tracked in the `_sqlx_migrations` table, so each one runs
/// only once.
pub async fn run_migrations(pool: &DbPool) -> Result<(), sqlx::migrate::MigrateError> {
    sqlx::migrate!("./migrations").run(pool).await
}
