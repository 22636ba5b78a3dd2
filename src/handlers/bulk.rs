//! Bulk generation handlers.

use axum::{
    Extension, Json,
    extract::{
        Multipart, Path, State,
        multipart::{Field, MultipartError, MultipartRejection},
    },
    http::StatusCode,
};

use crate::{
    error::AppError,
    extract::ApiKeyHeader,
    middleware::session::SessionContext,
    models::certificate::SignatureBody,
    models::generation::{BulkGenerationAccepted, BulkGenerationResponse},
    services::bulk_service::{self, BulkForm, BulkRequest},
    state::AppState,
};

fn multipart_error(err: MultipartError) -> AppError {
    AppError::InvalidRequest(format!("Malformed multipart body: {}", err.body_text()))
}

async fn field_bytes(field: Field<'_>) -> Result<Vec<u8>, AppError> {
    Ok(field.bytes().await.map_err(multipart_error)?.to_vec())
}

async fn read_form(multipart: &mut Multipart) -> Result<BulkForm, AppError> {
    let mut form = BulkForm::default();

    while let Some(field) = multipart.next_field().await.map_err(multipart_error)? {
        let name = field.name().unwrap_or_default().to_string();
        let is_file = field.file_name().is_some();

        match name.as_str() {
            "logo" if is_file => form.logo_file = Some(field_bytes(field).await?),
            "namesFile" => form.names_file = Some(field_bytes(field).await?),
            _ => {
                let value = field.text().await.map_err(multipart_error)?;
                match name.as_str() {
                    "course" => form.fields.course = Some(value),
                    "date" => form.fields.date = Some(value),
                    "certificateType" => form.fields.certificate_type = Some(value),
                    "issuer" => form.fields.issuer = Some(value),
                    "additionalInfo" => form.fields.additional_info = Some(value),
                    "template" => form.fields.template = Some(value),
                    "logo" => form.fields.logo = Some(value),
                    "signatures" if !value.trim().is_empty() => {
                        form.fields.signatures = serde_json::from_str::<Vec<SignatureBody>>(&value)
                            .map_err(|e| {
                                AppError::InvalidRequest(format!("Invalid signatures: {e}"))
                            })?;
                    }
                    "nameSource" => form.name_source = Some(value),
                    "names" => form.names = Some(value),
                    "count" => form.count = Some(value),
                    "context" => form.context = Some(value),
                    other => tracing::debug!(field = other, "ignoring form field"),
                }
            }
        }
    }
    Ok(form)
}

/// Start a bulk generation.
///
/// # Endpoint
///
/// `POST /generate-bulk-certificates` (multipart form)
///
/// # Authentication
///
/// `X-API-Key`; one quota unit is charged per name before the batch starts.
///
/// # Form Fields
///
/// - `course`, `date`, `certificateType`, `issuer`, `template`, `additionalInfo`
/// - `logo`: image file or base64 text
/// - `signatures`: JSON array of `{ "name", "image"? }`
/// - `nameSource`: `list` (default) or `ai`
/// - `names`: JSON array or one name per line; `namesFile`: CSV upload
/// - `count`, `context`: for `ai`
///
/// # Response
///
/// - **Accepted (202)**: `{ "generationId", "status": "pending", "total" }`
/// - **Error (400/401/403)**: invalid form, missing/invalid/exhausted key
pub async fn generate_bulk_certificates(
    State(state): State<AppState>,
    ApiKeyHeader(api_key): ApiKeyHeader,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<(StatusCode, Json<BulkGenerationAccepted>), AppError> {
    let mut multipart =
        multipart.map_err(|e| AppError::InvalidRequest(format!("Expected multipart form: {}", e.body_text())))?;
    let form = read_form(&mut multipart).await?;
    let request = BulkRequest::try_from(form)?;

    let accepted = bulk_service::start_bulk_generation(&state, &api_key, request).await?;
    Ok((StatusCode::ACCEPTED, Json(accepted)))
}

/// `GET /bulk-generation/{id}` for the signed-in owner.
pub async fn get_bulk_generation(
    State(state): State<AppState>,
    Extension(session): Extension<SessionContext>,
    Path(id): Path<String>,
) -> Result<Json<BulkGenerationResponse>, AppError> {
    Ok(Json(
        bulk_service::generation_status(&state, session.user_id, &id).await?,
    ))
}
