use thiserror::Error;

/// Input rejected before any rendering or storage work starts.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("content too large: {size} bytes (max: {max})")]
    ContentTooLarge { size: usize, max: usize },
    #[error("binary content detected in text input")]
    BinaryContentDetected,
    #[error("input is not valid UTF-8")]
    InvalidEncoding,
    #[error("invalid job id `{value}`")]
    InvalidJobId { value: String },
    #[error("invalid output format `{value}`")]
    InvalidFormat { value: String },
    #[error("no output formats requested")]
    NoFormatsRequested,
    #[error("file type not allowed: `{name}`")]
    UnsupportedExtension { name: String },
}

impl ValidationError {
    pub fn invalid_job_id(value: impl Into<String>) -> Self {
        Self::InvalidJobId {
            value: value.into(),
        }
    }

    pub fn invalid_format(value: impl Into<String>) -> Self {
        Self::InvalidFormat {
            value: value.into(),
        }
    }

    /// Stable machine-readable code.
    pub fn code(&self) -> &'static str {
        match self {
            Self::ContentTooLarge { .. } => "CONTENT_TOO_LARGE",
            Self::BinaryContentDetected => "BINARY_CONTENT",
            Self::InvalidEncoding => "INVALID_ENCODING",
            Self::InvalidJobId { .. } => "INVALID_JOB_ID",
            Self::InvalidFormat { .. } => "INVALID_FORMAT",
            Self::NoFormatsRequested => "NO_FORMATS",
            Self::UnsupportedExtension { .. } => "INVALID_FILE_TYPE",
        }
    }
}
