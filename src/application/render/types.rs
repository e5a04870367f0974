use std::io;
use std::path::PathBuf;

use thiserror::Error;

use crate::domain::job::OutputFormat;
use crate::domain::metadata::Metadata;

/// Caller-supplied rendering options. The pipeline never mutates them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConversionOptions {
    /// Prepend a human-readable rendering of the front matter.
    pub include_front_matter: bool,
    /// Reference document for the structured-document target. Ignored when the
    /// file does not exist.
    pub template_path: Option<PathBuf>,
    /// Replaces the default print stylesheet for the PDF target.
    pub css_override: Option<String>,
    /// Base name for the artifacts; sanitized and stripped of its extension.
    pub output_name: Option<String>,
}

impl Default for ConversionOptions {
    fn default() -> Self {
        Self {
            include_front_matter: true,
            template_path: None,
            css_override: None,
            output_name: None,
        }
    }
}

impl ConversionOptions {
    pub fn with_front_matter(mut self, include: bool) -> Self {
        self.include_front_matter = include;
        self
    }

    pub fn with_template(mut self, path: impl Into<PathBuf>) -> Self {
        self.template_path = Some(path.into());
        self
    }

    pub fn with_css(mut self, css: impl Into<String>) -> Self {
        self.css_override = Some(css.into());
        self
    }

    pub fn with_output_name(mut self, name: impl Into<String>) -> Self {
        self.output_name = Some(name.into());
        self
    }
}

/// Failures raised by a rendering capability (external tool or in-process).
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("{tool} unavailable: {source}")]
    NotFound {
        tool: String,
        #[source]
        source: io::Error,
    },
    #[error("io error: {0}")]
    Io(#[from] io::Error),
    #[error("{tool} invocation failed (exit {exit_code:?}): {stderr}")]
    Exit {
        tool: String,
        exit_code: Option<i32>,
        stderr: String,
    },
    #[error("{tool} produced no output")]
    EmptyOutput { tool: String },
    #[error("markdown rendering failed: {message}")]
    Markdown { message: String },
    #[error("syntax highlighting failed: {language}: {message}")]
    Highlighting { language: String, message: String },
}

/// A renderer failure for one output format. The engine error is kept as the
/// source for diagnostics and never shown to callers.
#[derive(Debug, Error)]
#[error("{format} conversion failed: {message}")]
pub struct ConversionError {
    pub format: OutputFormat,
    pub message: String,
    #[source]
    pub source: EngineError,
}

impl ConversionError {
    pub fn new(format: OutputFormat, source: EngineError) -> Self {
        Self {
            format,
            message: source.to_string(),
            source,
        }
    }
}

/// Lifecycle of a single render call. There are no retries; a failed render
/// stays failed.
#[derive(Debug)]
pub enum RenderState {
    Pending,
    Rendering,
    Succeeded(Vec<u8>),
    Failed(ConversionError),
}

impl RenderState {
    pub fn label(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Rendering => "rendering",
            Self::Succeeded(_) => "succeeded",
            Self::Failed(_) => "failed",
        }
    }

    /// Runs `render` if the state is still pending and records its outcome.
    pub fn drive<F>(self, render: F) -> Self
    where
        F: FnOnce() -> Result<Vec<u8>, ConversionError>,
    {
        match self {
            Self::Pending => Self::Rendering.complete(render()),
            other => other,
        }
    }

    fn complete(self, outcome: Result<Vec<u8>, ConversionError>) -> Self {
        match (self, outcome) {
            (Self::Rendering, Ok(bytes)) => Self::Succeeded(bytes),
            (Self::Rendering, Err(err)) => Self::Failed(err),
            (other, _) => other,
        }
    }

    pub fn into_result(self, format: OutputFormat) -> Result<Vec<u8>, ConversionError> {
        match self {
            Self::Succeeded(bytes) => Ok(bytes),
            Self::Failed(err) => Err(err),
            Self::Pending | Self::Rendering => Err(ConversionError {
                format,
                message: "render did not complete".to_string(),
                source: EngineError::EmptyOutput {
                    tool: format.to_string(),
                },
            }),
        }
    }
}

/// One output-format renderer. Implementations are selected by
/// [`Renderer::format`], never by type inspection.
pub trait Renderer: Send + Sync {
    fn format(&self) -> OutputFormat;

    fn render(
        &self,
        body: &str,
        metadata: &Metadata,
        options: &ConversionOptions,
    ) -> Result<Vec<u8>, ConversionError>;
}

/// Markdown to structured-document capability.
pub trait DocumentEngine: Send + Sync {
    fn markdown_to_document(
        &self,
        markdown: &str,
        reference_template: Option<&std::path::Path>,
    ) -> Result<Vec<u8>, EngineError>;
}

/// Markdown to HTML fragment capability.
pub trait HtmlEngine: Send + Sync {
    fn markdown_to_html(&self, markdown: &str) -> Result<String, EngineError>;

    /// Stylesheet for the classes the fragment uses (highlighting and the like).
    fn fragment_css(&self) -> String {
        String::new()
    }
}

/// HTML document to PDF capability.
pub trait PdfEngine: Send + Sync {
    fn html_to_pdf(&self, html: &str) -> Result<Vec<u8>, EngineError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn render_state_records_success() {
        let state = RenderState::Pending.drive(|| Ok(b"%PDF".to_vec()));
        assert_eq!(state.label(), "succeeded");
        assert_eq!(state.into_result(OutputFormat::Pdf).unwrap(), b"%PDF");
    }

    #[test]
    fn render_state_does_not_rerun_finished_render() {
        let failed = RenderState::Pending.drive(|| {
            Err(ConversionError::new(
                OutputFormat::Docx,
                EngineError::EmptyOutput {
                    tool: "pandoc".to_string(),
                },
            ))
        });
        assert_eq!(failed.label(), "failed");

        let still_failed = failed.drive(|| Ok(Vec::new()));
        let err = still_failed.into_result(OutputFormat::Docx).unwrap_err();
        assert_eq!(err.message, "pandoc produced no output");
    }

    #[test]
    fn conversion_error_keeps_engine_source() {
        let err = ConversionError::new(
            OutputFormat::Pdf,
            EngineError::Exit {
                tool: "weasyprint".to_string(),
                exit_code: Some(1),
                stderr: "bad css".to_string(),
            },
        );
        assert_eq!(
            err.to_string(),
            "pdf conversion failed: weasyprint invocation failed (exit Some(1)): bad css"
        );
        assert!(std::error::Error::source(&err).is_some());
    }
}
