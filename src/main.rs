//! certforge server entry point.
//!
//! # Startup Flow
//!
//! 1. Load configuration from environment variables
//! 2. Connect the metadata store (PostgreSQL + migrations, or in-memory)
//! 3. Prepare the object store directory
//! 4. Pick the mail and name-suggestion clients
//! 5. Build the router and serve on the configured port

use std::sync::Arc;

use tracing_subscriber::EnvFilter;

use certforge::{
    clients::{
        ClaudeNameSuggester, HttpMailer, LogMailer, Mailer, NameSuggester,
        UnconfiguredNameSuggester,
    },
    config::Config,
    db::{self, MemoryMetadataStore, MetadataStore, PgMetadataStore},
    state::AppState,
    storage::LocalFsStore,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Reads RUST_LOG, falling back to info for this crate and the HTTP layer
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "certforge=info,tower_http=info".into()),
        )
        .init();

    let config = Config::from_env()?;
    tracing::info!("Configuration loaded");

    let metadata: Arc<dyn MetadataStore> = match config.database_url.as_deref() {
        Some(url) => {
            let pool = db::create_pool(url).await?;
            tracing::info!("Database pool created");
            db::run_migrations(&pool).await?;
            tracing::info!("Database migrations complete");
            Arc::new(PgMetadataStore::new(pool))
        }
        None => {
            tracing::warn!("DATABASE_URL not set; metadata is kept in memory");
            Arc::new(MemoryMetadataStore::new())
        }
    };

    let objects = LocalFsStore::new(config.storage_root.clone());
    objects.ensure_root().await?;
    tracing::info!(root = %config.storage_root, "Object store ready");

    let mailer: Arc<dyn Mailer> = match (&config.mail_api_url, &config.mail_api_key) {
        (Some(url), Some(key)) => Arc::new(HttpMailer::new(
            url.clone(),
            key.clone(),
            config.mail_from.clone(),
        )?),
        _ => {
            tracing::warn!("Mail API not configured; OTP mails are logged only");
            Arc::new(LogMailer)
        }
    };

    let names: Arc<dyn NameSuggester> = match &config.anthropic_api_key {
        Some(key) => Arc::new(ClaudeNameSuggester::new(
            key.clone(),
            config.name_model.clone(),
        )?),
        None => Arc::new(UnconfiguredNameSuggester),
    };

    let addr = format!("0.0.0.0:{}", config.server_port);
    let state = AppState::new(config, metadata, Arc::new(objects), mailer, names)?;
    let app = certforge::router(state);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("Server listening on {}", addr);

    axum::serve(listener, app).await?;

    Ok(())
}
