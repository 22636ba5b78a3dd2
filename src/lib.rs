//! Certificate issuance service.
//!
//! Renders PDF certificates from a fixed set of styles, stores them behind
//! presigned URLs, verifies them by id, runs bulk batches into ZIP archives,
//! and manages the accounts and API keys that gate generation.
//!
//! # Architecture
//!
//! - **Web Framework**: Axum (async HTTP server)
//! - **Metadata**: PostgreSQL with sqlx, or an in-memory store
//! - **Objects**: local filesystem store with HMAC-signed read URLs
//! - **Rendering**: printpdf, A4 landscape
//! - **Authentication**: `X-API-Key` quotas for generation, JWT sessions for accounts

pub mod auth;
pub mod clients;
pub mod config;
pub mod db;
pub mod error;
pub mod extract;
pub mod handlers;
pub mod middleware;
pub mod models;
pub mod pdf;
pub mod services;
pub mod state;
pub mod storage;

use axum::{
    Router,
    extract::DefaultBodyLimit,
    middleware as axum_middleware,
    routing::{delete, get, post},
};
use tower_http::trace::TraceLayer;

use crate::state::AppState;

/// Uploads carry base64 logos, signature images and name files.
pub const MAX_BODY_BYTES: usize = 10 * 1024 * 1024;

/// Build the full HTTP router.
pub fn router(state: AppState) -> Router {
    // Routes that need a signed-in user
    let session_routes = Router::new()
        .route(
            "/change-password",
            post(handlers::accounts::change_password),
        )
        .route("/get-user-data", get(handlers::accounts::get_user_data))
        .route(
            "/generate-api-key",
            post(handlers::api_keys::generate_api_key),
        )
        .route("/get-api-keys", get(handlers::api_keys::get_api_keys))
        .route(
            "/delete-api-key",
            delete(handlers::api_keys::delete_api_key),
        )
        .route(
            "/regenerate-api-key",
            post(handlers::api_keys::regenerate_api_key),
        )
        .route(
            "/bulk-generation/{id}",
            get(handlers::bulk::get_bulk_generation),
        )
        .route_layer(axum_middleware::from_fn_with_state(
            state.clone(),
            middleware::session::session_middleware,
        ));

    Router::new()
        .route("/health", get(handlers::health::health_check))
        // Generation routes authenticate with X-API-Key inside the handler
        .route(
            "/generate-certificate",
            post(handlers::certificates::generate_certificate),
        )
        .route(
            "/verify-certificate/{id}",
            get(handlers::certificates::verify_certificate),
        )
        .route(
            "/generate-bulk-certificates",
            post(handlers::bulk::generate_bulk_certificates),
        )
        .route("/save-template", post(handlers::templates::save_template))
        .route(
            "/get-template/{id}",
            get(handlers::templates::get_template),
        )
        .route("/get-templates", get(handlers::templates::get_templates))
        .route(
            "/delete-template/{id}",
            delete(handlers::templates::delete_template),
        )
        .route("/signup", post(handlers::accounts::signup))
        .route("/login", post(handlers::accounts::login))
        .route("/send-otp", post(handlers::accounts::send_otp))
        .route("/reset-password", post(handlers::accounts::reset_password))
        .route("/objects/{*key}", get(handlers::objects::get_object))
        .merge(session_routes)
        .layer(DefaultBodyLimit::max(MAX_BODY_BYTES))
        .layer(middleware::cors::cors_layer())
        .layer(axum_middleware::from_fn(
            middleware::cors::preflight_no_content,
        ))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
