use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use tokio::sync::Mutex;

use super::{ObjectStore, StorageError};

/// In-memory object store for tests. Counts writes and can be told to fail
/// them so callers' error paths can be exercised.
#[derive(Default)]
pub struct MemoryObjectStore {
    objects: Mutex<BTreeMap<String, (String, Vec<u8>)>>,
    pub put_calls: AtomicU64,
    fail_puts_matching: Mutex<Option<String>>,
}

impl MemoryObjectStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent `put` whose key contains `fragment` fail.
    pub async fn fail_puts_matching(&self, fragment: &str) {
        *self.fail_puts_matching.lock().await = Some(fragment.to_string());
    }

    pub async fn keys(&self) -> Vec<String> {
        self.objects.lock().await.keys().cloned().collect()
    }

    pub async fn content_type(&self, key: &str) -> Option<String> {
        self.objects.lock().await.get(key).map(|(ct, _)| ct.clone())
    }
}

#[async_trait]
impl ObjectStore for MemoryObjectStore {
    fn backend_tag(&self) -> &'static str {
        "memory"
    }

    async fn put(&self, key: &str, bytes: Vec<u8>, content_type: &str) -> Result<(), StorageError> {
        self.put_calls.fetch_add(1, Ordering::Relaxed);
        if let Some(fragment) = self.fail_puts_matching.lock().await.as_deref() {
            if key.contains(fragment) {
                return Err(StorageError::Io(std::io::Error::other("injected put failure")));
            }
        }
        self.objects
            .lock()
            .await
            .insert(key.to_string(), (content_type.to_string(), bytes));
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Vec<u8>, StorageError> {
        self.objects
            .lock()
            .await
            .get(key)
            .map(|(_, bytes)| bytes.clone())
            .ok_or_else(|| StorageError::NotFound(key.to_string()))
    }

    async fn delete(&self, key: &str) -> Result<(), StorageError> {
        self.objects
            .lock()
            .await
            .remove(key)
            .map(|_| ())
            .ok_or_else(|| StorageError::NotFound(key.to_string()))
    }

    async fn list(&self, prefix: &str) -> Result<Vec<String>, StorageError> {
        Ok(self
            .objects
            .lock()
            .await
            .keys()
            .filter(|k| {
                k.strip_prefix(prefix)
                    .is_some_and(|rest| !rest.is_empty() && !rest.contains('/'))
            })
            .cloned()
            .collect())
    }
}
