//! Conversion jobs, their identifiers and the artifacts they own.

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

use super::error::ValidationError;

/// Opaque job identifier. Always a syntactically valid UUID.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobId(Uuid);

impl JobId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Parses an untrusted identifier. Anything that is not a UUID, including
    /// path fragments such as `../../etc`, is rejected.
    pub fn parse(value: &str) -> Result<Self, ValidationError> {
        Uuid::try_parse(value.trim())
            .map(Self)
            .map_err(|_| ValidationError::invalid_job_id(value))
    }

    pub fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl Default for JobId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Hyphenated lowercase; this is also the on-disk directory name.
        write!(f, "{}", self.0.hyphenated())
    }
}

impl FromStr for JobId {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

/// Output kinds a job can produce. The declaration order is the render order.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    Docx,
    Pdf,
}

impl OutputFormat {
    pub const ALL: [OutputFormat; 2] = [OutputFormat::Docx, OutputFormat::Pdf];

    pub fn extension(self) -> &'static str {
        match self {
            Self::Docx => "docx",
            Self::Pdf => "pdf",
        }
    }

    pub fn mime_type(self) -> &'static str {
        match self {
            Self::Docx => {
                "application/vnd.openxmlformats-officedocument.wordprocessingml.document"
            }
            Self::Pdf => "application/pdf",
        }
    }
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}

impl FromStr for OutputFormat {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "docx" => Ok(Self::Docx),
            "pdf" => Ok(Self::Pdf),
            _ => Err(ValidationError::invalid_format(s)),
        }
    }
}

/// A successfully written artifact.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderResult {
    pub format: OutputFormat,
    pub output_path: PathBuf,
    pub byte_size: u64,
    /// Lowercase hex SHA-256 of the written bytes.
    pub checksum: String,
}

impl RenderResult {
    pub fn filename(&self) -> String {
        self.output_path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Job {
    pub id: JobId,
    pub directory: PathBuf,
    pub created_at: OffsetDateTime,
    pub results: Vec<RenderResult>,
}

impl Job {
    pub fn new(id: JobId, directory: PathBuf, created_at: OffsetDateTime) -> Self {
        Self {
            id,
            directory,
            created_at,
            results: Vec::new(),
        }
    }

    /// Download route exposed by the HTTP layer for one of this job's formats.
    pub fn download_path(&self, format: OutputFormat) -> String {
        download_path(self.id, format)
    }

    pub fn result(&self, format: OutputFormat) -> Option<&RenderResult> {
        self.results.iter().find(|result| result.format == format)
    }
}

pub fn download_path(id: JobId, format: OutputFormat) -> String {
    format!("/api/download/{id}/{format}")
}
