//! Object storage for rendered PDFs, metadata sidecars, templates and
//! bulk archives.
//!
//! # Layout
//!
//! - `certificates/{id}.pdf` and `certificates/{id}.json`
//! - `templates/{id}.json`
//! - `bulk-certificates/{generationId}.zip`
//!
//! Backends implement [`ObjectStore`]; [`Persistence`] wraps one together
//! with the [`UrlSigner`] and owns the key scheme.

mod local;
mod memory;
mod signing;

pub use local::LocalFsStore;
pub use memory::MemoryObjectStore;
pub use signing::{SignatureError, UrlSigner};

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use uuid::Uuid;

use crate::models::certificate::CertificateRecord;
use crate::models::template::Template;

pub const PDF_CONTENT_TYPE: &str = "application/pdf";
pub const JSON_CONTENT_TYPE: &str = "application/json";
pub const ZIP_CONTENT_TYPE: &str = "application/zip";

#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    /// The key does not exist. Mapped to HTTP 404.
    #[error("object not found: {0}")]
    NotFound(String),

    #[error("invalid object key: {0}")]
    InvalidKey(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("corrupt object {key}: {source}")]
    Corrupt {
        key: String,
        source: serde_json::Error,
    },
}

/// Minimal blob store contract.
#[async_trait]
pub trait ObjectStore: Send + Sync + 'static {
    fn backend_tag(&self) -> &'static str;

    async fn put(&self, key: &str, bytes: Vec<u8>, content_type: &str) -> Result<(), StorageError>;

    /// Fails with [`StorageError::NotFound`] for unknown keys.
    async fn get(&self, key: &str) -> Result<Vec<u8>, StorageError>;

    async fn delete(&self, key: &str) -> Result<(), StorageError>;

    /// Keys directly under `prefix` (a directory-like prefix ending in `/`).
    async fn list(&self, prefix: &str) -> Result<Vec<String>, StorageError>;
}

/// Deterministic object keys.
pub mod keys {
    use uuid::Uuid;

    pub const TEMPLATES_PREFIX: &str = "templates/";

    pub fn certificate_pdf(id: Uuid) -> String {
        format!("certificates/{id}.pdf")
    }

    pub fn certificate_metadata(id: Uuid) -> String {
        format!("certificates/{id}.json")
    }

    pub fn template(id: Uuid) -> String {
        format!("{TEMPLATES_PREFIX}{id}.json")
    }

    pub fn bulk_archive(generation_id: Uuid) -> String {
        format!("bulk-certificates/{generation_id}.zip")
    }
}

/// Reject keys that could escape the store root or produce odd URLs.
pub fn validate_key(key: &str) -> Result<(), StorageError> {
    let valid = !key.is_empty()
        && !key.starts_with('/')
        && key
            .split('/')
            .all(|segment| !segment.is_empty() && segment != "." && segment != "..")
        && key
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '/' | '-' | '_' | '.'));
    if valid {
        Ok(())
    } else {
        Err(StorageError::InvalidKey(key.to_string()))
    }
}

/// Persistence adapter used by the services.
#[derive(Clone)]
pub struct Persistence {
    store: Arc<dyn ObjectStore>,
    signer: UrlSigner,
    url_ttl: Duration,
}

impl Persistence {
    pub fn new(store: Arc<dyn ObjectStore>, signer: UrlSigner, url_ttl: Duration) -> Self {
        Self {
            store,
            signer,
            url_ttl,
        }
    }

    pub fn signer(&self) -> &UrlSigner {
        &self.signer
    }

    pub fn backend_tag(&self) -> &'static str {
        self.store.backend_tag()
    }

    pub async fn put(&self, key: &str, bytes: Vec<u8>, content_type: &str) -> Result<(), StorageError> {
        validate_key(key)?;
        self.store.put(key, bytes, content_type).await
    }

    pub async fn get(&self, key: &str) -> Result<Vec<u8>, StorageError> {
        validate_key(key)?;
        self.store.get(key).await
    }

    /// Short-lived read URL for `key`.
    pub fn presign(&self, key: &str, ttl: Duration) -> Result<String, StorageError> {
        validate_key(key)?;
        Ok(self.signer.sign(key, ttl))
    }

    /// Read URL valid for the configured window (one hour by default).
    pub fn presign_default(&self, key: &str) -> Result<String, StorageError> {
        self.presign(key, self.url_ttl)
    }

    /// Store the PDF, then its sidecar. The sidecar is what makes the
    /// certificate verifiable, so it is written last.
    pub async fn store_certificate(
        &self,
        record: &CertificateRecord,
        pdf: Vec<u8>,
    ) -> Result<(), StorageError> {
        let metadata_key = keys::certificate_metadata(record.id);
        let metadata = serde_json::to_vec(record).map_err(|source| StorageError::Corrupt {
            key: metadata_key.clone(),
            source,
        })?;
        self.put(&keys::certificate_pdf(record.id), pdf, PDF_CONTENT_TYPE)
            .await?;
        self.put(&metadata_key, metadata, JSON_CONTENT_TYPE).await
    }

    pub async fn load_certificate_record(&self, id: Uuid) -> Result<CertificateRecord, StorageError> {
        let key = keys::certificate_metadata(id);
        let bytes = self.get(&key).await?;
        serde_json::from_slice(&bytes).map_err(|source| StorageError::Corrupt { key, source })
    }

    pub async fn save_template(&self, id: Uuid, template: &Template) -> Result<(), StorageError> {
        let key = keys::template(id);
        let bytes = serde_json::to_vec(template).map_err(|source| StorageError::Corrupt {
            key: key.clone(),
            source,
        })?;
        self.put(&key, bytes, JSON_CONTENT_TYPE).await
    }

    pub async fn load_template(&self, id: Uuid) -> Result<Template, StorageError> {
        let key = keys::template(id);
        let bytes = self.get(&key).await?;
        serde_json::from_slice(&bytes).map_err(|source| StorageError::Corrupt { key, source })
    }

    pub async fn list_templates(&self) -> Result<Vec<Template>, StorageError> {
        let mut templates = Vec::new();
        for key in self.store.list(keys::TEMPLATES_PREFIX).await? {
            if !key.ends_with(".json") {
                continue;
            }
            let bytes = match self.store.get(&key).await {
                Ok(bytes) => bytes,
                // deleted between list and get
                Err(StorageError::NotFound(_)) => continue,
                Err(e) => return Err(e),
            };
            match serde_json::from_slice::<Template>(&bytes) {
                Ok(template) => templates.push(template),
                Err(e) => tracing::warn!(key = %key, error = %e, "skipping unreadable template"),
            }
        }
        templates.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
        Ok(templates)
    }

    pub async fn delete_template(&self, id: Uuid) -> Result<(), StorageError> {
        self.store.delete(&keys::template(id)).await
    }

    /// Upload a finished bulk archive and return its key.
    pub async fn store_archive(
        &self,
        generation_id: Uuid,
        archive: Vec<u8>,
    ) -> Result<String, StorageError> {
        let key = keys::bulk_archive(generation_id);
        self.put(&key, archive, ZIP_CONTENT_TYPE).await?;
        Ok(key)
    }
}
