//! Canvas template CRUD handlers.
//!
//! - POST /save-template
//! - GET /get-template/{id}
//! - GET /get-templates
//! - DELETE /delete-template/{id}

use axum::{
    Json,
    extract::{Path, State},
};

use crate::{
    error::AppError,
    extract::AppJson,
    models::template::{
        DeleteTemplateResponse, SaveTemplateResponse, Template, TemplateListResponse,
    },
    services::template_service,
    state::AppState,
};

/// Save a template, overwriting the stored document when `id` is given.
///
/// Returns `{ "success": true, "templateId": "..." }`.
pub async fn save_template(
    State(state): State<AppState>,
    AppJson(template): AppJson<Template>,
) -> Result<Json<SaveTemplateResponse>, AppError> {
    let template_id = template_service::save_template(&state.persistence, template).await?;
    Ok(Json(SaveTemplateResponse {
        success: true,
        template_id,
    }))
}

pub async fn get_template(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Template>, AppError> {
    Ok(Json(
        template_service::get_template(&state.persistence, &id).await?,
    ))
}

/// Most recently updated first.
pub async fn get_templates(
    State(state): State<AppState>,
) -> Result<Json<TemplateListResponse>, AppError> {
    let templates = template_service::list_templates(&state.persistence).await?;
    Ok(Json(TemplateListResponse { templates }))
}

pub async fn delete_template(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<DeleteTemplateResponse>, AppError> {
    template_service::delete_template(&state.persistence, &id).await?;
    Ok(Json(DeleteTemplateResponse { success: true }))
}
