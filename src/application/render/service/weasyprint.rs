use std::{ffi::OsStr, fs, io::Write, path::PathBuf};

use tracing::debug;

use crate::application::render::types::{EngineError, PdfEngine};

use super::process::ExternalTool;

/// HTML to PDF through the `weasyprint` CLI (`weasyprint <in.html> <out.pdf>`).
#[derive(Debug, Clone)]
pub struct WeasyPrintEngine {
    tool: ExternalTool,
}

impl WeasyPrintEngine {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            tool: ExternalTool::new("weasyprint", path),
        }
    }

    pub fn tool(&self) -> &ExternalTool {
        &self.tool
    }
}

impl PdfEngine for WeasyPrintEngine {
    fn html_to_pdf(&self, html: &str) -> Result<Vec<u8>, EngineError> {
        let mut input = tempfile::Builder::new().suffix(".html").tempfile()?;
        input.write_all(html.as_bytes())?;
        input.flush()?;
        let output = tempfile::Builder::new().suffix(".pdf").tempfile()?;

        self.tool.run([
            OsStr::new("--encoding"),
            OsStr::new("utf-8"),
            input.path().as_os_str(),
            output.path().as_os_str(),
        ])?;

        let bytes = fs::read(output.path())?;
        if bytes.is_empty() {
            return Err(EngineError::EmptyOutput {
                tool: self.tool.name().to_string(),
            });
        }
        debug!(
            target = "application::render::weasyprint",
            op = "html_to_pdf",
            html_bytes = html.len(),
            pdf_bytes = bytes.len(),
        );
        Ok(bytes)
    }
}
