//! Filesystem-backed object store rooted at `STORAGE_ROOT`.

use std::io::ErrorKind;
use std::path::PathBuf;

use async_trait::async_trait;
use tokio::fs;
use tracing::instrument;

use super::{ObjectStore, StorageError, validate_key};

pub struct LocalFsStore {
    root: PathBuf,
}

impl LocalFsStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Create the root directory if missing.
    pub async fn ensure_root(&self) -> Result<(), StorageError> {
        fs::create_dir_all(&self.root).await?;
        Ok(())
    }

    fn path_for(&self, key: &str) -> Result<PathBuf, StorageError> {
        validate_key(key)?;
        Ok(self.root.join(key))
    }
}

fn not_found(key: &str, err: std::io::Error) -> StorageError {
    if err.kind() == ErrorKind::NotFound {
        StorageError::NotFound(key.to_string())
    } else {
        StorageError::Io(err)
    }
}

#[async_trait]
impl ObjectStore for LocalFsStore {
    fn backend_tag(&self) -> &'static str {
        "localfs"
    }

    #[instrument(name = "localfs_put", skip(self, bytes), fields(size = bytes.len()))]
    async fn put(&self, key: &str, bytes: Vec<u8>, _content_type: &str) -> Result<(), StorageError> {
        let path = self.path_for(key)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await?;
        }
        // write-then-rename so readers never observe a partial object
        let tmp = path.with_extension(format!("tmp-{}", uuid::Uuid::new_v4()));
        fs::write(&tmp, &bytes).await?;
        if let Err(e) = fs::rename(&tmp, &path).await {
            let _ = fs::remove_file(&tmp).await;
            return Err(e.into());
        }
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Vec<u8>, StorageError> {
        let path = self.path_for(key)?;
        fs::read(&path).await.map_err(|e| not_found(key, e))
    }

    async fn delete(&self, key: &str) -> Result<(), StorageError> {
        let path = self.path_for(key)?;
        fs::remove_file(&path).await.map_err(|e| not_found(key, e))
    }

    async fn list(&self, prefix: &str) -> Result<Vec<String>, StorageError> {
        let dir = prefix.trim_end_matches('/');
        let path = self.path_for(dir)?;
        let mut entries = match fs::read_dir(&path).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut keys = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            if !entry.file_type().await?.is_file() {
                continue;
            }
            if let Some(name) = entry.file_name().to_str() {
                if !name.contains(".tmp-") {
                    keys.push(format!("{dir}/{name}"));
                }
            }
        }
        keys.sort();
        Ok(keys)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn put_get_list_delete() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalFsStore::new(dir.path());
        store.ensure_root().await.unwrap();

        store
            .put("templates/a.json", b"{}".to_vec(), "application/json")
            .await
            .unwrap();
        store
            .put("templates/b.json", b"[]".to_vec(), "application/json")
            .await
            .unwrap();

        assert_eq!(store.get("templates/a.json").await.unwrap(), b"{}");
        assert_eq!(
            store.list("templates/").await.unwrap(),
            vec!["templates/a.json".to_string(), "templates/b.json".to_string()]
        );

        store.delete("templates/a.json").await.unwrap();
        assert!(matches!(
            store.get("templates/a.json").await,
            Err(StorageError::NotFound(_))
        ));
        assert!(matches!(
            store.delete("templates/a.json").await,
            Err(StorageError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn listing_a_missing_prefix_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalFsStore::new(dir.path());
        assert!(store.list("templates/").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn traversal_is_blocked() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalFsStore::new(dir.path());
        assert!(matches!(
            store.get("../secret").await,
            Err(StorageError::InvalidKey(_))
        ));
    }
}
