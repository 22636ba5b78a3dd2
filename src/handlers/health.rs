//! Health check endpoint for service monitoring.

use crate::{error::AppError, state::AppState};
use axum::{Json, extract::State};
use chrono::{DateTime, Utc};
use serde::Serialize;

/// Health check response.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    /// Overall service status
    pub status: String,

    /// Metadata store backend (`postgres` or `memory`)
    pub database: String,

    /// Object store backend (`localfs` or `memory`)
    pub storage: String,

    /// Current server timestamp
    pub timestamp: DateTime<Utc>,
}

/// Health check handler.
///
/// # Checks
///
/// - Metadata store connectivity (`SELECT 1` on Postgres)
///
/// # Response (200 OK)
///
/// ```json
/// {
///   "status": "healthy",
///   "database": "postgres",
///   "storage": "localfs",
///   "timestamp": "2025-12-21T19:00:00Z"
/// }
/// ```
///
/// # Response (500 Internal Server Error)
///
/// If the metadata store is unreachable, returns the standard error response.
pub async fn health_check(State(state): State<AppState>) -> Result<Json<HealthResponse>, AppError> {
    state.metadata.ping().await?;

    Ok(Json(HealthResponse {
        status: "healthy".to_string(),
        database: state.metadata.backend_tag().to_string(),
        storage: state.persistence.backend_tag().to_string(),
        timestamp: Utc::now(),
    }))
}
