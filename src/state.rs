//! Shared handler state.

use std::sync::Arc;
use std::time::Duration;

use crate::clients::{Mailer, NameSuggester};
use crate::config::Config;
use crate::db::MetadataStore;
use crate::storage::{ObjectStore, Persistence, UrlSigner};

/// Collaborators injected into every handler. Cloning is cheap; every field
/// is reference counted.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub metadata: Arc<dyn MetadataStore>,
    pub persistence: Persistence,
    pub mailer: Arc<dyn Mailer>,
    pub names: Arc<dyn NameSuggester>,
}

impl AppState {
    /// # Errors
    ///
    /// Fails when `PUBLIC_BASE_URL` is not an absolute URL.
    pub fn new(
        config: Config,
        metadata: Arc<dyn MetadataStore>,
        objects: Arc<dyn ObjectStore>,
        mailer: Arc<dyn Mailer>,
        names: Arc<dyn NameSuggester>,
    ) -> Result<Self, url::ParseError> {
        let signer = UrlSigner::new(config.base_url(), &config.url_signing_secret)?;
        let persistence = Persistence::new(
            objects,
            signer,
            Duration::from_secs(config.signed_url_ttl_secs),
        );
        Ok(Self {
            config: Arc::new(config),
            metadata,
            persistence,
            mailer,
            names,
        })
    }
}
