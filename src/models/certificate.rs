//! Certificate request and record types.
//!
//! This module defines:
//! - `CertificateRequestBody`: the loosely-typed JSON body clients send
//! - `CertificateRequest`: the validated request the assembler renders
//! - `CertificateRecord`: the immutable metadata sidecar stored beside each PDF

use std::fmt;
use std::str::FromStr;

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Maximum number of signature blocks a certificate can carry.
pub const MAX_SIGNATURES: usize = 3;

/// Reasons a certificate request is rejected before rendering.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("Missing required field: {0}")]
    MissingField(&'static str),

    #[error("Unknown template: {0}")]
    UnknownTemplate(String),

    #[error("Unknown certificate type: {0}")]
    UnknownCertificateType(String),

    #[error("At most 3 signatures are allowed, got {0}")]
    TooManySignatures(usize),

    #[error("Invalid base64 image in field: {0}")]
    InvalidImage(&'static str),
}

/// The kind of recognition a certificate grants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CertificateType {
    Completion,
    Achievement,
    Participation,
    Excellence,
    Training,
    Appreciation,
}

impl CertificateType {
    pub fn as_str(&self) -> &'static str {
        match self {
            CertificateType::Completion => "completion",
            CertificateType::Achievement => "achievement",
            CertificateType::Participation => "participation",
            CertificateType::Excellence => "excellence",
            CertificateType::Training => "training",
            CertificateType::Appreciation => "appreciation",
        }
    }

    /// Heading printed at the top of the page.
    pub fn heading(&self) -> String {
        format!("CERTIFICATE OF {}", self.as_str().to_uppercase())
    }

    /// Line printed between the recipient name and the course.
    pub fn citation(&self) -> &'static str {
        match self {
            CertificateType::Completion => "has successfully completed",
            CertificateType::Achievement => "has achieved outstanding results in",
            CertificateType::Participation => "has actively participated in",
            CertificateType::Excellence => "is recognized for excellence in",
            CertificateType::Training => "has successfully completed the training",
            CertificateType::Appreciation => "is presented in appreciation for contributions to",
        }
    }
}

impl FromStr for CertificateType {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "completion" => Ok(CertificateType::Completion),
            "achievement" => Ok(CertificateType::Achievement),
            "participation" => Ok(CertificateType::Participation),
            "excellence" => Ok(CertificateType::Excellence),
            "training" => Ok(CertificateType::Training),
            "appreciation" => Ok(CertificateType::Appreciation),
            other => Err(ValidationError::UnknownCertificateType(other.to_string())),
        }
    }
}

/// Built-in visual templates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TemplateId {
    ClassicElegance,
    ModernMinimalist,
    VibrantAchievement,
}

impl TemplateId {
    pub const ALL: [TemplateId; 3] = [
        TemplateId::ClassicElegance,
        TemplateId::ModernMinimalist,
        TemplateId::VibrantAchievement,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            TemplateId::ClassicElegance => "classic-elegance",
            TemplateId::ModernMinimalist => "modern-minimalist",
            TemplateId::VibrantAchievement => "vibrant-achievement",
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            TemplateId::ClassicElegance => "Classic Elegance",
            TemplateId::ModernMinimalist => "Modern Minimalist",
            TemplateId::VibrantAchievement => "Vibrant Achievement",
        }
    }
}

impl fmt::Display for TemplateId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TemplateId {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "classic-elegance" | "classic" => Ok(TemplateId::ClassicElegance),
            "modern-minimalist" | "modern" => Ok(TemplateId::ModernMinimalist),
            "vibrant-achievement" | "vibrant" => Ok(TemplateId::VibrantAchievement),
            other => Err(ValidationError::UnknownTemplate(other.to_string())),
        }
    }
}

/// One signature block. Its position depends only on its index and the
/// number of signatures on the page.
#[derive(Debug, Clone, PartialEq)]
pub struct Signature {
    pub name: String,
    pub image: Option<Vec<u8>>,
}

/// A validated certificate request.
#[derive(Debug, Clone)]
pub struct CertificateRequest {
    pub name: String,
    pub course: String,
    pub date: String,
    pub certificate_type: CertificateType,
    pub issuer: String,
    pub additional_info: Option<String>,
    pub logo: Option<Vec<u8>>,
    pub signatures: Vec<Signature>,
    pub template: TemplateId,
}

impl CertificateRequest {
    /// Re-check the invariants the renderer depends on.
    pub fn check(&self) -> Result<(), ValidationError> {
        for (field, value) in [
            ("name", &self.name),
            ("course", &self.course),
            ("date", &self.date),
            ("issuer", &self.issuer),
        ] {
            if value.trim().is_empty() {
                return Err(ValidationError::MissingField(field));
            }
        }
        if self.signatures.len() > MAX_SIGNATURES {
            return Err(ValidationError::TooManySignatures(self.signatures.len()));
        }
        Ok(())
    }

    /// Same request addressed to another recipient.
    pub fn for_recipient(&self, name: &str) -> Self {
        Self {
            name: name.to_string(),
            ..self.clone()
        }
    }
}

/// Signature entry as sent on the wire.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SignatureBody {
    #[serde(default)]
    pub name: Option<String>,
    /// Base64 image, optionally with a `data:` URL prefix.
    #[serde(default)]
    pub image: Option<String>,
}

/// JSON body for `POST /generate-certificate`.
///
/// Every field is optional here so that missing values produce a
/// descriptive validation error instead of a generic parse failure.
///
/// # JSON Example
///
/// ```json
/// {
///   "name": "Ada Lovelace",
///   "course": "Analytical Engines",
///   "date": "2024-05-01",
///   "certificateType": "completion",
///   "issuer": "Babbage Institute",
///   "template": "classic-elegance",
///   "signatures": [{ "name": "C. Babbage" }]
/// }
/// ```
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CertificateRequestBody {
    pub name: Option<String>,
    pub course: Option<String>,
    pub date: Option<String>,
    pub certificate_type: Option<String>,
    pub issuer: Option<String>,
    pub additional_info: Option<String>,
    pub logo: Option<String>,
    #[serde(default)]
    pub signatures: Vec<SignatureBody>,
    pub template: Option<String>,
}

fn required(value: Option<String>, field: &'static str) -> Result<String, ValidationError> {
    match value {
        Some(v) if !v.trim().is_empty() => Ok(v.trim().to_string()),
        _ => Err(ValidationError::MissingField(field)),
    }
}

/// Decode a base64 image, accepting `data:image/png;base64,` prefixes.
/// Empty strings are treated as absent.
pub fn decode_image(
    value: Option<&str>,
    field: &'static str,
) -> Result<Option<Vec<u8>>, ValidationError> {
    let Some(raw) = value.map(str::trim).filter(|v| !v.is_empty()) else {
        return Ok(None);
    };
    let payload = match raw.split_once(',') {
        Some((prefix, data)) if prefix.starts_with("data:") => data,
        _ => raw,
    };
    STANDARD
        .decode(payload.trim())
        .map(Some)
        .map_err(|_| ValidationError::InvalidImage(field))
}

impl TryFrom<CertificateRequestBody> for CertificateRequest {
    type Error = ValidationError;

    fn try_from(body: CertificateRequestBody) -> Result<Self, Self::Error> {
        let name = required(body.name, "name")?;
        let course = required(body.course, "course")?;
        let date = required(body.date, "date")?;
        let certificate_type = required(body.certificate_type, "certificateType")?.parse()?;
        let issuer = required(body.issuer, "issuer")?;
        let template = required(body.template, "template")?.parse()?;

        if body.signatures.len() > MAX_SIGNATURES {
            return Err(ValidationError::TooManySignatures(body.signatures.len()));
        }
        let signatures = body
            .signatures
            .into_iter()
            .map(|sig| {
                Ok(Signature {
                    name: sig.name.unwrap_or_default().trim().to_string(),
                    image: decode_image(sig.image.as_deref(), "signatures")?,
                })
            })
            .collect::<Result<Vec<_>, ValidationError>>()?;

        Ok(Self {
            name,
            course,
            date,
            certificate_type,
            issuer,
            additional_info: body
                .additional_info
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty()),
            logo: decode_image(body.logo.as_deref(), "logo")?,
            signatures,
            template,
        })
    }
}

impl CertificateRequestBody {
    /// Validate the fields every certificate of a batch shares. The
    /// recipient is left empty and filled in per name.
    pub fn into_batch_request(mut self) -> Result<CertificateRequest, ValidationError> {
        self.name = Some("recipient".to_string());
        let mut request = CertificateRequest::try_from(self)?;
        request.name.clear();
        Ok(request)
    }
}

/// Immutable metadata sidecar stored as `certificates/{id}.json`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CertificateRecord {
    pub id: Uuid,
    pub name: String,
    pub course: String,
    pub date: String,
    pub certificate_type: CertificateType,
    pub issuer: String,
    pub template: TemplateId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub additional_info: Option<String>,
    pub issued_at: DateTime<Utc>,
}

impl CertificateRecord {
    pub fn new(id: Uuid, request: &CertificateRequest) -> Self {
        Self {
            id,
            name: request.name.clone(),
            course: request.course.clone(),
            date: request.date.clone(),
            certificate_type: request.certificate_type,
            issuer: request.issuer.clone(),
            template: request.template,
            additional_info: request.additional_info.clone(),
            issued_at: Utc::now(),
        }
    }
}

/// Response for `POST /generate-certificate`.
#[derive(Debug, Serialize)]
pub struct GenerateCertificateResponse {
    pub id: Uuid,
    pub url: String,
}

/// Response for a successful `GET /verify-certificate/{id}`.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VerifyCertificateResponse {
    #[serde(flatten)]
    pub record: CertificateRecord,
    pub pdf_url: String,
    pub is_valid: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn body() -> CertificateRequestBody {
        CertificateRequestBody {
            name: Some("Ada Lovelace".into()),
            course: Some("Analytical Engines".into()),
            date: Some("2024-05-01".into()),
            certificate_type: Some("completion".into()),
            issuer: Some("Babbage Institute".into()),
            template: Some("classic-elegance".into()),
            ..Default::default()
        }
    }

    #[test]
    fn valid_body_converts() {
        let request = CertificateRequest::try_from(body()).unwrap();
        assert_eq!(request.name, "Ada Lovelace");
        assert_eq!(request.certificate_type, CertificateType::Completion);
        assert_eq!(request.template, TemplateId::ClassicElegance);
        assert!(request.logo.is_none());
    }

    #[test]
    fn each_required_field_is_enforced() {
        let strip: [(&str, fn(&mut CertificateRequestBody)); 6] = [
            ("name", |b| b.name = None),
            ("course", |b| b.course = Some("  ".into())),
            ("date", |b| b.date = None),
            ("certificateType", |b| b.certificate_type = None),
            ("issuer", |b| b.issuer = Some(String::new())),
            ("template", |b| b.template = None),
        ];
        for (field, apply) in strip {
            let mut b = body();
            apply(&mut b);
            assert_eq!(
                CertificateRequest::try_from(b).unwrap_err(),
                ValidationError::MissingField(field)
            );
        }
    }

    #[test]
    fn unknown_template_is_rejected() {
        let mut b = body();
        b.template = Some("gothic".into());
        let err = CertificateRequest::try_from(b).unwrap_err();
        assert!(err.to_string().starts_with("Unknown template"));
    }

    #[test]
    fn template_aliases_resolve() {
        assert_eq!("classic".parse::<TemplateId>().unwrap(), TemplateId::ClassicElegance);
        assert_eq!("modern".parse::<TemplateId>().unwrap(), TemplateId::ModernMinimalist);
        assert_eq!(
            "vibrant-achievement".parse::<TemplateId>().unwrap(),
            TemplateId::VibrantAchievement
        );
    }

    #[test]
    fn more_than_three_signatures_is_rejected() {
        let mut b = body();
        b.signatures = vec![SignatureBody::default(); 4];
        assert_eq!(
            CertificateRequest::try_from(b).unwrap_err(),
            ValidationError::TooManySignatures(4)
        );
    }

    #[test]
    fn data_url_prefix_is_stripped() {
        let decoded = decode_image(Some("data:image/png;base64,aGVsbG8="), "logo").unwrap();
        assert_eq!(decoded.as_deref(), Some(&b"hello"[..]));
        assert_eq!(decode_image(Some(""), "logo").unwrap(), None);
        assert!(decode_image(Some("!!not base64!!"), "logo").is_err());
    }

    #[test]
    fn record_serializes_camel_case() {
        let request = CertificateRequest::try_from(body()).unwrap();
        let record = CertificateRecord::new(Uuid::new_v4(), &request);
        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["certificateType"], "completion");
        assert_eq!(json["template"], "classic-elegance");
        assert!(json.get("issuedAt").is_some());
        assert!(json.get("additionalInfo").is_none());
    }

    #[test]
    fn batch_request_does_not_need_a_recipient() {
        let mut shared = body();
        shared.name = None;
        let request = shared.into_batch_request().unwrap();
        assert!(request.name.is_empty());
        assert_eq!(request.for_recipient("Grace").name, "Grace");

        let mut missing_course = body();
        missing_course.course = None;
        assert!(matches!(
            missing_course.into_batch_request(),
            Err(ValidationError::MissingField("course"))
        ));
    }
}
