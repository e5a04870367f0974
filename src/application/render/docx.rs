use std::sync::Arc;

use tracing::debug;

use crate::domain::job::OutputFormat;
use crate::domain::metadata::Metadata;

use super::front_matter_block::FrontMatterSummary;
use super::types::{ConversionError, ConversionOptions, DocumentEngine, Renderer};

/// Structured-document (DOCX) renderer. The front-matter header is prepended
/// as plain Markdown and the whole source goes to the document engine.
pub struct DocxRenderer {
    engine: Arc<dyn DocumentEngine>,
}

impl DocxRenderer {
    pub fn new(engine: Arc<dyn DocumentEngine>) -> Self {
        Self { engine }
    }
}

/// Markdown actually handed to the document engine.
pub(crate) fn compose_markdown(body: &str, metadata: &Metadata, include_front_matter: bool) -> String {
    let header = include_front_matter
        .then(|| FrontMatterSummary::from_metadata(metadata))
        .flatten();
    match header {
        Some(summary) => format!("{}\n{body}", summary.to_markdown()),
        None => body.to_string(),
    }
}

impl Renderer for DocxRenderer {
    fn format(&self) -> OutputFormat {
        OutputFormat::Docx
    }

    fn render(
        &self,
        body: &str,
        metadata: &Metadata,
        options: &ConversionOptions,
    ) -> Result<Vec<u8>, ConversionError> {
        let document = compose_markdown(body, metadata, options.include_front_matter);

        let template = options.template_path.as_deref().filter(|path| {
            let exists = path.is_file();
            if !exists {
                debug!(
                    target = "application::render::docx",
                    op = "render",
                    template = %path.display(),
                    "reference template not found; rendering without it"
                );
            }
            exists
        });

        self.engine
            .markdown_to_document(&document, template)
            .map_err(|err| ConversionError::new(OutputFormat::Docx, err))
    }
}
