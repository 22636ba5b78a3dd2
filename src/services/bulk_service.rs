//! Bulk certificate generation.
//!
//! # Lifecycle
//!
//! ```text
//! pending -> in-progress -> completed
//!                        \-> failed (with reason)
//! ```
//!
//! The request charges one quota unit per name up front, records the
//! generation as `pending` and returns. A spawned task then renders the
//! names strictly in order, persists every certificate (PDF and sidecar)
//! so its verification link resolves, zips the PDFs and uploads the
//! archive. The record moves to `completed` only after the archive is
//! stored.
//!
//! On a mid-batch failure the certificates already persisted stay valid
//! and keep their charge; units for the names never rendered are released
//! and the record moves to `failed`.

use std::collections::HashSet;
use std::io::{Cursor, Write};

use uuid::Uuid;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

use crate::clients::NameSuggester;
use crate::clients::names::placeholder_names;
use crate::error::AppError;
use crate::models::certificate::{CertificateRequest, CertificateRequestBody};
use crate::models::generation::{
    BulkGeneration, BulkGenerationAccepted, BulkGenerationResponse, GenerationStatus,
};
use crate::services::{api_key_service, certificate_service};
use crate::state::AppState;

/// Upper bound on names per batch.
pub const MAX_BULK_NAMES: usize = 500;

/// Raw multipart fields, collected by the handler.
#[derive(Debug, Default)]
pub struct BulkForm {
    pub fields: CertificateRequestBody,
    /// Logo uploaded as a file part rather than base64 text.
    pub logo_file: Option<Vec<u8>>,
    pub name_source: Option<String>,
    pub names: Option<String>,
    pub names_file: Option<Vec<u8>>,
    pub count: Option<String>,
    pub context: Option<String>,
}

/// Where recipient names come from.
#[derive(Debug, Clone, PartialEq)]
pub enum NameSource {
    List(Vec<String>),
    Suggested { count: usize, context: String },
}

/// A validated batch.
#[derive(Debug, Clone)]
pub struct BulkRequest {
    /// Shared fields; `name` is empty until a recipient is filled in.
    pub base: CertificateRequest,
    pub names: NameSource,
}

impl BulkRequest {
    pub fn total(&self) -> usize {
        match &self.names {
            NameSource::List(names) => names.len(),
            NameSource::Suggested { count, .. } => *count,
        }
    }
}

impl TryFrom<BulkForm> for BulkRequest {
    type Error = AppError;

    fn try_from(form: BulkForm) -> Result<Self, Self::Error> {
        let mut base = form.fields.into_batch_request()?;
        if let Some(logo) = form.logo_file.filter(|bytes| !bytes.is_empty()) {
            base.logo = Some(logo);
        }

        let source = form
            .name_source
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .unwrap_or("list");

        let names = match source {
            "list" => {
                let mut names = Vec::new();
                if let Some(text) = form.names.as_deref() {
                    names.extend(parse_name_list(text)?);
                }
                if let Some(file) = form.names_file.as_deref() {
                    names.extend(parse_names_csv(&String::from_utf8_lossy(file)));
                }
                if names.is_empty() {
                    return Err(AppError::InvalidRequest("No names provided".to_string()));
                }
                NameSource::List(names)
            }
            "ai" => {
                let count = form
                    .count
                    .as_deref()
                    .map(str::trim)
                    .unwrap_or_default()
                    .parse::<usize>()
                    .ok()
                    .filter(|c| *c > 0)
                    .ok_or_else(|| {
                        AppError::InvalidRequest("count must be a positive integer".to_string())
                    })?;
                NameSource::Suggested {
                    count,
                    context: form.context.unwrap_or_default().trim().to_string(),
                }
            }
            other => {
                return Err(AppError::InvalidRequest(format!(
                    "Unknown nameSource: {other}"
                )));
            }
        };

        let request = BulkRequest { base, names };
        if request.total() > MAX_BULK_NAMES {
            return Err(AppError::InvalidRequest(format!(
                "At most {MAX_BULK_NAMES} names per batch"
            )));
        }
        Ok(request)
    }
}

/// `names` form field: a JSON array of strings, or one name per line.
pub fn parse_name_list(text: &str) -> Result<Vec<String>, AppError> {
    let text = text.trim();
    let names: Vec<String> = if text.starts_with('[') {
        serde_json::from_str(text)
            .map_err(|e| AppError::InvalidRequest(format!("names must be a JSON array of strings: {e}")))?
    } else {
        text.lines().map(str::to_string).collect()
    };
    Ok(names
        .into_iter()
        .map(|n| n.trim().to_string())
        .filter(|n| !n.is_empty())
        .collect())
}

/// Uploaded names file: the first CSV column of each row, skipping blank
/// rows and a leading `name` header.
pub fn parse_names_csv(text: &str) -> Vec<String> {
    let text = text.trim_start_matches('\u{feff}');
    let mut names: Vec<String> = text
        .lines()
        .map(first_csv_column)
        .filter(|n| !n.is_empty())
        .collect();
    if names
        .first()
        .is_some_and(|first| first.eq_ignore_ascii_case("name"))
    {
        names.remove(0);
    }
    names
}

fn first_csv_column(line: &str) -> String {
    let line = line.trim();
    if let Some(rest) = line.strip_prefix('"') {
        let mut value = String::new();
        let mut chars = rest.chars().peekable();
        while let Some(c) = chars.next() {
            match c {
                '"' if chars.peek() == Some(&'"') => {
                    value.push('"');
                    chars.next();
                }
                '"' => break,
                c => value.push(c),
            }
        }
        value.trim().to_string()
    } else {
        line.split(',').next().unwrap_or_default().trim().to_string()
    }
}

/// Archive entry for `name`: `{name}_certificate.pdf`, with characters
/// that are unsafe in file names replaced and `_2`, `_3`... inserted for
/// repeats.
pub fn archive_entry_name(name: &str, used: &mut HashSet<String>) -> String {
    let stem: String = name
        .trim()
        .chars()
        .map(|c| {
            if c.is_control() || matches!(c, '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|') {
                '_'
            } else {
                c
            }
        })
        .collect();
    let stem = if stem.is_empty() { "recipient".to_string() } else { stem };

    let mut candidate = format!("{stem}_certificate.pdf");
    let mut n = 2;
    while !used.insert(candidate.clone()) {
        candidate = format!("{stem}_{n}_certificate.pdf");
        n += 1;
    }
    candidate
}

/// Zip `entries` in the given order.
pub fn build_archive(entries: &[(String, Vec<u8>)]) -> Result<Vec<u8>, zip::result::ZipError> {
    let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
    let options = SimpleFileOptions::default()
        .compression_method(CompressionMethod::Deflated)
        .unix_permissions(0o644);
    for (name, bytes) in entries {
        writer.start_file(name.as_str(), options)?;
        writer.write_all(bytes)?;
    }
    Ok(writer.finish()?.into_inner())
}

/// Resolve the batch's names. Suggestion failures fall back to
/// placeholders; short replies are padded.
pub async fn resolve_names(suggester: &dyn NameSuggester, source: &NameSource) -> Vec<String> {
    match source {
        NameSource::List(names) => names.clone(),
        NameSource::Suggested { count, context } => {
            let mut names = match suggester.suggest(*count, context).await {
                Ok(names) => names,
                Err(e) => {
                    tracing::warn!(error = %e, "name suggestion failed; using placeholders");
                    Vec::new()
                }
            };
            names.truncate(*count);
            if names.len() < *count {
                names.extend(placeholder_names(*count - names.len()));
            }
            names
        }
    }
}

/// Charge the key, record the generation and start the batch.
pub async fn start_bulk_generation(
    state: &AppState,
    api_key: &str,
    request: BulkRequest,
) -> Result<BulkGenerationAccepted, AppError> {
    let total = request.total();
    let key = api_key_service::authorize(state.metadata.as_ref(), api_key, total as i64).await?;

    let generation = BulkGeneration::new(key.user_id, total as i32);
    if let Err(e) = state.metadata.create_generation(&generation).await {
        api_key_service::release(state.metadata.as_ref(), api_key, total as i64).await;
        return Err(e.into());
    }
    tracing::info!(
        generation_id = %generation.generation_id,
        user_id = %key.user_id,
        total,
        "bulk generation accepted"
    );

    let task_state = state.clone();
    let task_key = api_key.to_string();
    let generation_id = generation.generation_id;
    tokio::spawn(async move {
        run_generation(&task_state, generation_id, &task_key, request).await;
    });

    Ok(BulkGenerationAccepted {
        generation_id,
        status: generation.status,
        total: generation.total,
    })
}

struct BatchFailure {
    /// Certificates persisted before the failure.
    rendered: usize,
    reason: String,
}

/// Drive one generation to a terminal state. Never returns an error: every
/// failure ends up on the record.
pub async fn run_generation(
    state: &AppState,
    generation_id: Uuid,
    api_key: &str,
    request: BulkRequest,
) {
    let total = request.total();
    let store = state.metadata.as_ref();

    if let Err(e) = store
        .update_generation(generation_id, GenerationStatus::InProgress, None, None)
        .await
    {
        tracing::error!(generation_id = %generation_id, error = %e, "could not start bulk generation");
        api_key_service::release(store, api_key, total as i64).await;
        return;
    }
    tracing::info!(generation_id = %generation_id, total, "bulk generation in progress");

    let names = resolve_names(state.names.as_ref(), &request.names).await;
    let outcome = render_batch(state, generation_id, &request.base, &names).await;

    let update = match outcome {
        Ok(archive_key) => {
            tracing::info!(generation_id = %generation_id, key = %archive_key, "bulk generation completed");
            store
                .update_generation(
                    generation_id,
                    GenerationStatus::Completed,
                    Some(&archive_key),
                    None,
                )
                .await
        }
        Err(failure) => {
            tracing::warn!(
                generation_id = %generation_id,
                rendered = failure.rendered,
                reason = %failure.reason,
                "bulk generation failed"
            );
            api_key_service::release(store, api_key, (total - failure.rendered) as i64).await;
            store
                .update_generation(
                    generation_id,
                    GenerationStatus::Failed,
                    None,
                    Some(&failure.reason),
                )
                .await
        }
    };
    if let Err(e) = update {
        tracing::error!(generation_id = %generation_id, error = %e, "could not record bulk outcome");
    }
}

async fn render_batch(
    state: &AppState,
    generation_id: Uuid,
    base: &CertificateRequest,
    names: &[String],
) -> Result<String, BatchFailure> {
    let mut entries = Vec::with_capacity(names.len());
    let mut used = HashSet::new();

    for (index, name) in names.iter().enumerate() {
        let failed = |e: AppError| BatchFailure {
            rendered: index,
            reason: format!("certificate {} ({name}): {e}", index + 1),
        };

        let generated =
            certificate_service::assemble_blocking(base.for_recipient(name), state.config.clone())
                .await
                .map_err(failed)?;
        state
            .persistence
            .store_certificate(&generated.record, generated.pdf.clone())
            .await
            .map_err(|e| failed(e.into()))?;
        tracing::debug!(generation_id = %generation_id, index, certificate_id = %generated.id, "bulk certificate stored");

        entries.push((archive_entry_name(name, &mut used), generated.pdf));
    }

    let rendered = names.len();
    let archive = tokio::task::spawn_blocking(move || build_archive(&entries))
        .await
        .map_err(|e| BatchFailure {
            rendered,
            reason: format!("archive task failed: {e}"),
        })?
        .map_err(|e| BatchFailure {
            rendered,
            reason: format!("archive: {e}"),
        })?;

    state
        .persistence
        .store_archive(generation_id, archive)
        .await
        .map_err(|e| BatchFailure {
            rendered,
            reason: format!("archive upload: {e}"),
        })
}

/// `GET /bulk-generation/{id}`: the caller's own generation, with a signed
/// archive URL once completed.
pub async fn generation_status(
    state: &AppState,
    user_id: Uuid,
    generation_id: &str,
) -> Result<BulkGenerationResponse, AppError> {
    let generation_id =
        Uuid::parse_str(generation_id).map_err(|_| AppError::NotFound("Generation"))?;
    let generation = state
        .metadata
        .find_generation(generation_id)
        .await?
        .filter(|g| g.user_id == user_id)
        .ok_or(AppError::NotFound("Generation"))?;

    let download_url = match (&generation.status, &generation.s3_key) {
        (GenerationStatus::Completed, Some(key)) => Some(state.persistence.presign_default(key)?),
        _ => None,
    };
    Ok(BulkGenerationResponse {
        generation,
        download_url,
    })
}
