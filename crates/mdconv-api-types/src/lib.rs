//! Serializable boundary types shared by mdconv and any HTTP layer that
//! serves its conversion jobs.

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

/// Summary of a finished conversion job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobResponse {
    pub job_id: Uuid,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    pub files: Vec<JobArtifact>,
}

/// One downloadable artifact produced by a job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobArtifact {
    pub format: String,
    pub filename: String,
    pub download_url: String,
    pub mimetype: String,
    pub size_bytes: u64,
    pub size_display: String,
    pub sha256: String,
}

/// Error payload returned to callers. Carries a stable code and a
/// human-readable message only.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: String,
    pub code: String,
    pub status: u16,
    #[serde(with = "time::serde::rfc3339")]
    pub timestamp: OffsetDateTime,
}

impl ErrorBody {
    pub fn new(error: impl Into<String>, code: impl Into<String>, status: u16) -> Self {
        Self {
            error: error.into(),
            code: code.into(),
            status,
            timestamp: OffsetDateTime::now_utc(),
        }
    }
}

/// Status of a job as reported by a status probe.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobStatus {
    pub job_id: Uuid,
    pub expired: bool,
    pub files: Vec<StoredFile>,
}

/// A file currently present in a job directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredFile {
    pub filename: String,
    pub size_bytes: u64,
    pub size_display: String,
    #[serde(with = "time::serde::rfc3339")]
    pub modified: OffsetDateTime,
    pub mimetype: String,
}
