use std::sync::Arc;

use crate::domain::job::OutputFormat;
use crate::domain::metadata::Metadata;

use super::front_matter_block::FrontMatterSummary;
use super::stylesheet::{default_css, html_document};
use super::types::{ConversionError, ConversionOptions, HtmlEngine, PdfEngine, Renderer};

/// Paginated PDF renderer: Markdown to an HTML document with print CSS, then
/// HTML to PDF.
pub struct PdfRenderer {
    html: Arc<dyn HtmlEngine>,
    pdf: Arc<dyn PdfEngine>,
}

impl PdfRenderer {
    pub fn new(html: Arc<dyn HtmlEngine>, pdf: Arc<dyn PdfEngine>) -> Self {
        Self { html, pdf }
    }

    /// Builds the complete HTML document without converting it.
    pub fn compose_document(
        &self,
        body: &str,
        metadata: &Metadata,
        options: &ConversionOptions,
    ) -> Result<String, ConversionError> {
        let fragment = self
            .html
            .markdown_to_html(body)
            .map_err(|err| ConversionError::new(OutputFormat::Pdf, err))?;

        let panel = if options.include_front_matter {
            FrontMatterSummary::from_metadata(metadata)
                .map(|summary| summary.to_html_panel())
                .unwrap_or_default()
        } else {
            String::new()
        };

        let title = metadata.get("title").map(|value| value.to_string());
        let stylesheet = match &options.css_override {
            Some(css) => css.clone(),
            None => default_css(title.as_deref().unwrap_or_default()),
        };

        Ok(html_document(
            title.as_deref(),
            &self.html.fragment_css(),
            &stylesheet,
            &panel,
            &fragment,
        ))
    }
}

impl Renderer for PdfRenderer {
    fn format(&self) -> OutputFormat {
        OutputFormat::Pdf
    }

    fn render(
        &self,
        body: &str,
        metadata: &Metadata,
        options: &ConversionOptions,
    ) -> Result<Vec<u8>, ConversionError> {
        let document = self.compose_document(body, metadata, options)?;
        self.pdf
            .html_to_pdf(&document)
            .map_err(|err| ConversionError::new(OutputFormat::Pdf, err))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::render::service::ComrakHtmlEngine;
    use crate::application::render::types::EngineError;
    use crate::domain::metadata::MetaValue;

    struct EchoPdf;

    impl PdfEngine for EchoPdf {
        fn html_to_pdf(&self, html: &str) -> Result<Vec<u8>, EngineError> {
            Ok(html.as_bytes().to_vec())
        }
    }

    fn renderer() -> PdfRenderer {
        PdfRenderer::new(Arc::new(ComrakHtmlEngine::default()), Arc::new(EchoPdf))
    }

    fn metadata() -> Metadata {
        [
            ("title", MetaValue::from("Report")),
            ("author", MetaValue::from("Jane")),
        ]
        .into_iter()
        .collect()
    }

    #[test]
    fn wraps_body_with_panel_and_default_css() {
        let html = renderer()
            .compose_document("Body *text*", &metadata(), &ConversionOptions::default())
            .unwrap();

        assert!(html.starts_with("<!DOCTYPE html>"));
        assert!(html.contains("<title>Report</title>"));
        assert!(html.contains(r#"content: "Report";"#));
        assert!(html.contains("<strong>Author:</strong> Jane"));
        let panel = html.find("class=\"front-matter\"").unwrap();
        let body = html.find("Body <em>text</em>").unwrap();
        assert!(panel < body);
    }

    #[test]
    fn css_override_replaces_default_stylesheet() {
        let options = ConversionOptions::default()
            .with_css("body { color: teal; }")
            .with_front_matter(false);
        let html = renderer()
            .compose_document("Body", &metadata(), &options)
            .unwrap();

        assert!(html.contains("body { color: teal; }"));
        assert!(!html.contains("size: A4"));
        assert!(!html.contains("class=\"front-matter\""));
    }

    #[test]
    fn pdf_engine_failure_is_wrapped() {
        struct Broken;
        impl PdfEngine for Broken {
            fn html_to_pdf(&self, _html: &str) -> Result<Vec<u8>, EngineError> {
                Err(EngineError::EmptyOutput {
                    tool: "weasyprint".into(),
                })
            }
        }

        let err = PdfRenderer::new(Arc::new(ComrakHtmlEngine::default()), Arc::new(Broken))
            .render("Body", &Metadata::new(), &ConversionOptions::default())
            .unwrap_err();
        assert_eq!(err.format, OutputFormat::Pdf);
        assert_eq!(err.message, "weasyprint produced no output");
    }
}
