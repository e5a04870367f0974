use std::error::Error as StdError;
use std::io;

use mdconv_api_types::ErrorBody;
use thiserror::Error;

use crate::{
    application::render::ConversionError,
    domain::error::ValidationError,
    infra::{error::InfraError, storage::StoreError},
};

/// Full error chain captured for logs; never shown to callers.
#[derive(Debug, Clone)]
pub struct ErrorReport {
    pub source: &'static str,
    pub status: u16,
    pub messages: Vec<String>,
}

impl ErrorReport {
    pub fn from_error(source: &'static str, status: u16, error: &dyn StdError) -> Self {
        let mut messages = Vec::new();
        messages.push(error.to_string());
        let mut current = error.source();
        while let Some(inner) = current {
            messages.push(inner.to_string());
            current = inner.source();
        }
        Self {
            source,
            status,
            messages,
        }
    }

    pub fn chain(&self) -> String {
        self.messages.join(": ")
    }
}

/// Failure of a conversion, download-resolution or storage operation.
#[derive(Debug, Error)]
pub enum ConvertError {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error(transparent)]
    Conversion(#[from] ConversionError),
    #[error("path traversal detected for job `{job_id}`")]
    PathTraversal { job_id: String },
    #[error("storage failure")]
    Storage(#[source] io::Error),
}

impl From<StoreError> for ConvertError {
    fn from(error: StoreError) -> Self {
        match error {
            StoreError::Validation(err) => Self::Validation(err),
            StoreError::PathTraversal { job_id } => Self::PathTraversal { job_id },
            StoreError::Io(err) => Self::Storage(err),
        }
    }
}

impl ConvertError {
    pub fn code(&self) -> &'static str {
        match self {
            Self::Validation(err) => err.code(),
            Self::Conversion(_) => "CONVERSION_FAILED",
            Self::PathTraversal { .. } => "PATH_TRAVERSAL",
            Self::Storage(_) => "STORAGE_ERROR",
        }
    }

    pub fn status(&self) -> u16 {
        match self {
            Self::Validation(ValidationError::ContentTooLarge { .. }) => 413,
            Self::Validation(ValidationError::UnsupportedExtension { .. }) => 415,
            Self::Validation(_) | Self::PathTraversal { .. } => 400,
            Self::Conversion(_) | Self::Storage(_) => 500,
        }
    }

    /// Message safe to hand to callers. Renderer stderr, filesystem paths and
    /// io details stay in the logs.
    pub fn public_message(&self) -> String {
        match self {
            Self::Validation(err) => err.to_string(),
            Self::Conversion(err) => format!("Conversion to {} failed", err.format),
            Self::PathTraversal { .. } => "Invalid file path".to_string(),
            Self::Storage(_) => "Internal storage error".to_string(),
        }
    }

    pub fn to_payload(&self) -> ErrorBody {
        ErrorBody::new(self.public_message(), self.code(), self.status())
    }

    pub fn report(&self) -> ErrorReport {
        ErrorReport::from_error("application::error::ConvertError", self.status(), self)
    }
}

/// Binary-level error reported through tracing before a non-zero exit.
#[derive(Debug, Error)]
pub enum AppError {
    #[error(transparent)]
    Convert(#[from] ConvertError),
    #[error(transparent)]
    Infra(#[from] InfraError),
    #[error("resource not found")]
    NotFound,
    #[error("validation failed: {0}")]
    Validation(String),
    #[error("unexpected error: {0}")]
    Unexpected(String),
}

impl AppError {
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    pub fn unexpected(message: impl Into<String>) -> Self {
        Self::Unexpected(message.into())
    }

    pub fn status_code(&self) -> u16 {
        match self {
            AppError::Convert(err) => err.status(),
            AppError::NotFound => 404,
            AppError::Validation(_) => 400,
            AppError::Infra(_) | AppError::Unexpected(_) => 500,
        }
    }

    pub fn presentation_message(&self) -> String {
        match self {
            AppError::Convert(err) => err.public_message(),
            AppError::NotFound => "Resource not found".to_string(),
            AppError::Validation(message) => message.clone(),
            AppError::Infra(InfraError::Configuration { .. }) => "Service misconfigured".to_string(),
            AppError::Infra(InfraError::Telemetry(_)) => {
                "Logging subsystem could not start".to_string()
            }
            AppError::Infra(InfraError::Io(_)) => "I/O failure".to_string(),
            AppError::Unexpected(_) => "Unexpected error occurred".to_string(),
        }
    }
}

impl From<StoreError> for AppError {
    fn from(error: StoreError) -> Self {
        Self::Convert(error.into())
    }
}

impl From<ValidationError> for AppError {
    fn from(error: ValidationError) -> Self {
        Self::Convert(error.into())
    }
}
