//! Single-certificate generation and verification.
//!
//! # Flow
//!
//! 1. Validate the body into a `CertificateRequest` (400 on failure)
//! 2. Charge one unit to the caller's API key (401/403)
//! 3. Assemble: fresh id, render, metadata record
//! 4. Persist PDF and sidecar, presign the PDF
//!
//! If step 3 or 4 fails the unit is released and nothing is left behind
//! except possibly an orphaned PDF without a sidecar, which verification
//! treats as unknown.

use std::sync::Arc;

use uuid::Uuid;

use crate::config::Config;
use crate::error::AppError;
use crate::models::certificate::{
    CertificateRecord, CertificateRequest, CertificateRequestBody, GenerateCertificateResponse,
    VerifyCertificateResponse,
};
use crate::pdf::{self, RenderError};
use crate::services::api_key_service;
use crate::state::AppState;
use crate::storage::{StorageError, keys};

/// Output of the assembler: nothing is persisted yet.
#[derive(Debug)]
pub struct GeneratedCertificate {
    pub id: Uuid,
    pub pdf: Vec<u8>,
    pub record: CertificateRecord,
}

/// Assign a fresh id and render `request`.
pub fn assemble(request: &CertificateRequest, config: &Config) -> Result<GeneratedCertificate, RenderError> {
    request.check()?;
    let id = Uuid::new_v4();
    let pdf = pdf::render(request, id, &config.verification_url(&id.to_string()))?;
    Ok(GeneratedCertificate {
        id,
        pdf,
        record: CertificateRecord::new(id, request),
    })
}

/// Run [`assemble`] on the blocking pool; rendering is CPU bound.
pub async fn assemble_blocking(
    request: CertificateRequest,
    config: Arc<Config>,
) -> Result<GeneratedCertificate, AppError> {
    tokio::task::spawn_blocking(move || assemble(&request, &config))
        .await
        .map_err(|e| AppError::Internal(format!("render task failed: {e}")))?
        .map_err(AppError::from)
}

/// Render, persist and presign one certificate. Charges nothing.
pub async fn issue(
    state: &AppState,
    request: CertificateRequest,
) -> Result<GenerateCertificateResponse, AppError> {
    let generated = assemble_blocking(request, state.config.clone()).await?;
    state
        .persistence
        .store_certificate(&generated.record, generated.pdf)
        .await?;
    let url = state
        .persistence
        .presign_default(&keys::certificate_pdf(generated.id))?;

    tracing::info!(
        certificate_id = %generated.id,
        template = %generated.record.template,
        "certificate generated"
    );
    Ok(GenerateCertificateResponse {
        id: generated.id,
        url,
    })
}

/// `POST /generate-certificate`.
pub async fn generate_certificate(
    state: &AppState,
    api_key: &str,
    body: CertificateRequestBody,
) -> Result<GenerateCertificateResponse, AppError> {
    let request = CertificateRequest::try_from(body)?;
    api_key_service::authorize(state.metadata.as_ref(), api_key, 1).await?;

    match issue(state, request).await {
        Ok(response) => Ok(response),
        Err(e) => {
            api_key_service::release(state.metadata.as_ref(), api_key, 1).await;
            Err(e)
        }
    }
}

/// Look up a certificate by id. Unknown and malformed ids are both
/// reported as not found.
pub async fn verify_certificate(
    state: &AppState,
    id: &str,
) -> Result<VerifyCertificateResponse, AppError> {
    let id = Uuid::parse_str(id).map_err(|_| AppError::NotFound("Certificate"))?;
    let record = match state.persistence.load_certificate_record(id).await {
        Ok(record) => record,
        Err(StorageError::NotFound(_)) => return Err(AppError::NotFound("Certificate")),
        Err(e) => return Err(e.into()),
    };
    let pdf_url = state.persistence.presign_default(&keys::certificate_pdf(id))?;

    Ok(VerifyCertificateResponse {
        record,
        pdf_url,
        is_valid: true,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::certificate::{CertificateType, TemplateId};
    use std::collections::HashSet;

    fn request() -> CertificateRequest {
        CertificateRequest {
            name: "Grace Hopper".into(),
            course: "Compilers".into(),
            date: "1952-05-01".into(),
            certificate_type: CertificateType::Achievement,
            issuer: "Navy".into(),
            additional_info: None,
            logo: None,
            signatures: Vec::new(),
            template: TemplateId::VibrantAchievement,
        }
    }

    #[test]
    fn assembled_ids_are_fresh() {
        let config = Config::default();
        let mut seen = HashSet::new();
        for _ in 0..3 {
            let generated = assemble(&request(), &config).unwrap();
            assert!(!generated.pdf.is_empty());
            assert_eq!(generated.record.id, generated.id);
            assert!(seen.insert(generated.id));
        }
    }

    #[test]
    fn missing_field_fails_before_render() {
        let mut req = request();
        req.course.clear();
        assert!(matches!(
            assemble(&req, &Config::default()),
            Err(RenderError::Invalid(_))
        ));
    }
}
