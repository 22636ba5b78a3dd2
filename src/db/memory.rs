//! In-memory metadata store.
//!
//! Used when no `DATABASE_URL` is configured and as the fake behind the
//! handler and service tests. Every operation takes the single lock, so
//! quota consumption is as atomic as the SQL version.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::Mutex;
use uuid::Uuid;

use super::{MetadataStore, StoreError};
use crate::models::api_key::{ApiKeyRecord, QuotaOutcome};
use crate::models::generation::{BulkGeneration, GenerationStatus};
use crate::models::user::{OtpRecord, User};

#[derive(Default)]
struct Tables {
    users: HashMap<String, User>,
    otps: HashMap<String, OtpRecord>,
    api_keys: HashMap<String, ApiKeyRecord>,
    generations: HashMap<Uuid, BulkGeneration>,
}

#[derive(Default)]
pub struct MemoryMetadataStore {
    tables: Mutex<Tables>,
}

impl MemoryMetadataStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl MetadataStore for MemoryMetadataStore {
    fn backend_tag(&self) -> &'static str {
        "memory"
    }

    async fn create_user(&self, user: &User) -> Result<(), StoreError> {
        let mut tables = self.tables.lock().await;
        if tables.users.contains_key(&user.email) {
            return Err(StoreError::AlreadyExists);
        }
        tables.users.insert(user.email.clone(), user.clone());
        Ok(())
    }

    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, StoreError> {
        Ok(self.tables.lock().await.users.get(email).cloned())
    }

    async fn find_user_by_id(&self, user_id: Uuid) -> Result<Option<User>, StoreError> {
        Ok(self
            .tables
            .lock()
            .await
            .users
            .values()
            .find(|u| u.user_id == user_id)
            .cloned())
    }

    async fn update_password(&self, email: &str, password_hash: &str) -> Result<(), StoreError> {
        let mut tables = self.tables.lock().await;
        let user = tables.users.get_mut(email).ok_or(StoreError::NotFound)?;
        user.password_hash = password_hash.to_string();
        Ok(())
    }

    async fn put_otp(&self, otp: &OtpRecord) -> Result<(), StoreError> {
        let fresh = OtpRecord {
            attempts: 0,
            ..otp.clone()
        };
        self.tables
            .lock()
            .await
            .otps
            .insert(otp.email.clone(), fresh);
        Ok(())
    }

    async fn find_otp(&self, email: &str) -> Result<Option<OtpRecord>, StoreError> {
        Ok(self.tables.lock().await.otps.get(email).cloned())
    }

    async fn delete_otp(&self, email: &str) -> Result<(), StoreError> {
        self.tables.lock().await.otps.remove(email);
        Ok(())
    }

    async fn record_otp_failure(&self, email: &str) -> Result<Option<i32>, StoreError> {
        Ok(self.tables.lock().await.otps.get_mut(email).map(|otp| {
            otp.attempts += 1;
            otp.attempts
        }))
    }

    async fn create_api_key(&self, record: &ApiKeyRecord) -> Result<(), StoreError> {
        let mut tables = self.tables.lock().await;
        if tables.api_keys.contains_key(&record.api_key) {
            return Err(StoreError::AlreadyExists);
        }
        tables
            .api_keys
            .insert(record.api_key.clone(), record.clone());
        Ok(())
    }

    async fn list_api_keys(&self, user_id: Uuid) -> Result<Vec<ApiKeyRecord>, StoreError> {
        let tables = self.tables.lock().await;
        let mut keys: Vec<_> = tables
            .api_keys
            .values()
            .filter(|k| k.user_id == user_id)
            .cloned()
            .collect();
        keys.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(keys)
    }

    async fn find_api_key(&self, api_key: &str) -> Result<Option<ApiKeyRecord>, StoreError> {
        Ok(self.tables.lock().await.api_keys.get(api_key).cloned())
    }

    async fn consume_quota(&self, api_key: &str, cost: i64) -> Result<QuotaOutcome, StoreError> {
        let mut tables = self.tables.lock().await;
        let Some(record) = tables.api_keys.get_mut(api_key) else {
            return Ok(QuotaOutcome::Unknown);
        };
        if record.usage_count + cost > record.usage_limit {
            return Ok(QuotaOutcome::Exhausted(record.clone()));
        }
        record.usage_count += cost;
        Ok(QuotaOutcome::Granted(record.clone()))
    }

    async fn release_quota(&self, api_key: &str, cost: i64) -> Result<(), StoreError> {
        if let Some(record) = self.tables.lock().await.api_keys.get_mut(api_key) {
            record.usage_count = (record.usage_count - cost).max(0);
        }
        Ok(())
    }

    async fn delete_api_key(&self, user_id: Uuid, api_key: &str) -> Result<bool, StoreError> {
        let mut tables = self.tables.lock().await;
        match tables.api_keys.get(api_key) {
            Some(record) if record.user_id == user_id => {
                tables.api_keys.remove(api_key);
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn rotate_api_key(
        &self,
        user_id: Uuid,
        old_key: &str,
        new_key: &str,
    ) -> Result<Option<ApiKeyRecord>, StoreError> {
        let mut tables = self.tables.lock().await;
        match tables.api_keys.get(old_key) {
            Some(record) if record.user_id == user_id => {}
            _ => return Ok(None),
        }
        if tables.api_keys.contains_key(new_key) {
            return Err(StoreError::AlreadyExists);
        }
        let Some(mut record) = tables.api_keys.remove(old_key) else {
            return Ok(None);
        };
        record.api_key = new_key.to_string();
        tables.api_keys.insert(new_key.to_string(), record.clone());
        Ok(Some(record))
    }

    async fn create_generation(&self, generation: &BulkGeneration) -> Result<(), StoreError> {
        let mut tables = self.tables.lock().await;
        if tables.generations.contains_key(&generation.generation_id) {
            return Err(StoreError::AlreadyExists);
        }
        tables
            .generations
            .insert(generation.generation_id, generation.clone());
        Ok(())
    }

    async fn find_generation(
        &self,
        generation_id: Uuid,
    ) -> Result<Option<BulkGeneration>, StoreError> {
        Ok(self
            .tables
            .lock()
            .await
            .generations
            .get(&generation_id)
            .cloned())
    }

    async fn list_generations(&self, user_id: Uuid) -> Result<Vec<BulkGeneration>, StoreError> {
        let tables = self.tables.lock().await;
        let mut generations: Vec<_> = tables
            .generations
            .values()
            .filter(|g| g.user_id == user_id)
            .cloned()
            .collect();
        generations.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(generations)
    }

    async fn update_generation(
        &self,
        generation_id: Uuid,
        status: GenerationStatus,
        s3_key: Option<&str>,
        error: Option<&str>,
    ) -> Result<BulkGeneration, StoreError> {
        let mut tables = self.tables.lock().await;
        let generation = tables
            .generations
            .get_mut(&generation_id)
            .ok_or(StoreError::NotFound)?;

        if !generation.status.can_transition_to(status) {
            return Err(StoreError::InvalidTransition {
                from: generation.status,
                to: status,
            });
        }

        generation.status = status;
        if let Some(key) = s3_key {
            generation.s3_key = Some(key.to_string());
        }
        generation.error = error.map(str::to_string);
        generation.updated_at = Utc::now();
        Ok(generation.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(limit: i64, used: i64) -> ApiKeyRecord {
        ApiKeyRecord {
            user_id: Uuid::new_v4(),
            api_key: "cf_test".to_string(),
            name: "test".to_string(),
            reason: String::new(),
            created_at: Utc::now(),
            usage_count: used,
            usage_limit: limit,
        }
    }

    #[tokio::test]
    async fn consume_respects_limit() {
        let store = MemoryMetadataStore::new();
        store.create_api_key(&key(2, 1)).await.unwrap();

        assert!(matches!(
            store.consume_quota("cf_test", 1).await.unwrap(),
            QuotaOutcome::Granted(r) if r.usage_count == 2
        ));
        assert!(matches!(
            store.consume_quota("cf_test", 1).await.unwrap(),
            QuotaOutcome::Exhausted(r) if r.usage_count == 2
        ));
        assert_eq!(
            store.consume_quota("missing", 1).await.unwrap(),
            QuotaOutcome::Unknown
        );
    }

    #[tokio::test]
    async fn release_never_goes_negative() {
        let store = MemoryMetadataStore::new();
        store.create_api_key(&key(5, 1)).await.unwrap();
        store.release_quota("cf_test", 3).await.unwrap();
        let record = store.find_api_key("cf_test").await.unwrap().unwrap();
        assert_eq!(record.usage_count, 0);
    }

    #[tokio::test]
    async fn rotate_keeps_counter_and_owner() {
        let store = MemoryMetadataStore::new();
        let original = key(10, 4);
        store.create_api_key(&original).await.unwrap();

        assert!(
            store
                .rotate_api_key(Uuid::new_v4(), "cf_test", "cf_new")
                .await
                .unwrap()
                .is_none()
        );

        let rotated = store
            .rotate_api_key(original.user_id, "cf_test", "cf_new")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(rotated.usage_count, 4);
        assert!(store.find_api_key("cf_test").await.unwrap().is_none());
        assert!(store.find_api_key("cf_new").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn generation_rejects_skipping_states() {
        let store = MemoryMetadataStore::new();
        let generation = BulkGeneration::new(Uuid::new_v4(), 2);
        store.create_generation(&generation).await.unwrap();

        let err = store
            .update_generation(generation.generation_id, GenerationStatus::Completed, None, None)
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::InvalidTransition { .. }));

        store
            .update_generation(generation.generation_id, GenerationStatus::InProgress, None, None)
            .await
            .unwrap();
        let done = store
            .update_generation(
                generation.generation_id,
                GenerationStatus::Completed,
                Some("bulk-certificates/x.zip"),
                None,
            )
            .await
            .unwrap();
        assert_eq!(done.s3_key.as_deref(), Some("bulk-certificates/x.zip"));
    }

    #[tokio::test]
    async fn duplicate_user_email_conflicts() {
        let store = MemoryMetadataStore::new();
        let user = User {
            user_id: Uuid::new_v4(),
            email: "a@example.com".to_string(),
            name: "A".to_string(),
            password_hash: "x".to_string(),
            created_at: Utc::now(),
        };
        store.create_user(&user).await.unwrap();
        assert!(matches!(
            store.create_user(&user).await,
            Err(StoreError::AlreadyExists)
        ));
    }
}
