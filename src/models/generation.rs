//! Bulk generation status records.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Lifecycle of one bulk generation.
///
/// `pending → in-progress → completed`, or `failed` from either of the
/// first two states. `completed` and `failed` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum GenerationStatus {
    Pending,
    InProgress,
    Completed,
    Failed,
}

impl GenerationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            GenerationStatus::Pending => "pending",
            GenerationStatus::InProgress => "in-progress",
            GenerationStatus::Completed => "completed",
            GenerationStatus::Failed => "failed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, GenerationStatus::Completed | GenerationStatus::Failed)
    }

    /// Whether the state machine allows moving from `self` to `next`.
    pub fn can_transition_to(&self, next: GenerationStatus) -> bool {
        use GenerationStatus::*;
        matches!(
            (self, next),
            (Pending, InProgress) | (Pending, Failed) | (InProgress, Completed) | (InProgress, Failed)
        )
    }
}

impl fmt::Display for GenerationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for GenerationStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(GenerationStatus::Pending),
            "in-progress" => Ok(GenerationStatus::InProgress),
            "completed" => Ok(GenerationStatus::Completed),
            "failed" => Ok(GenerationStatus::Failed),
            other => Err(format!("unknown generation status: {other}")),
        }
    }
}

/// Maps to the `bulk_generations` table.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BulkGeneration {
    pub generation_id: Uuid,
    pub user_id: Uuid,
    pub status: GenerationStatus,

    /// Number of names in the batch
    pub total: i32,

    /// Storage key of the finished archive
    #[serde(rename = "s3Key")]
    pub s3_key: Option<String>,

    /// Failure reason, set only when `status` is `failed`
    pub error: Option<String>,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl BulkGeneration {
    pub fn new(user_id: Uuid, total: i32) -> Self {
        let now = Utc::now();
        Self {
            generation_id: Uuid::new_v4(),
            user_id,
            status: GenerationStatus::Pending,
            total,
            s3_key: None,
            error: None,
            created_at: now,
            updated_at: now,
        }
    }
}

/// Response for `POST /generate-bulk-certificates`.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BulkGenerationAccepted {
    pub generation_id: Uuid,
    pub status: GenerationStatus,
    pub total: i32,
}

/// Response for `GET /bulk-generation/{id}`.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BulkGenerationResponse {
    #[serde(flatten)]
    pub generation: BulkGeneration,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub download_url: Option<String>,
}
