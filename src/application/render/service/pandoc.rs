use std::{
    fs,
    io::Write,
    path::{Path, PathBuf},
};

use tempfile::NamedTempFile;
use tracing::debug;

use crate::application::render::types::{DocumentEngine, EngineError};

use super::process::ExternalTool;

/// Markdown to DOCX through the `pandoc` CLI.
#[derive(Debug, Clone)]
pub struct PandocEngine {
    tool: ExternalTool,
    highlight_style: String,
}

impl PandocEngine {
    pub fn new(path: impl Into<PathBuf>, highlight_style: impl Into<String>) -> Self {
        Self {
            tool: ExternalTool::new("pandoc", path),
            highlight_style: highlight_style.into(),
        }
    }

    pub fn tool(&self) -> &ExternalTool {
        &self.tool
    }
}

impl DocumentEngine for PandocEngine {
    fn markdown_to_document(
        &self,
        markdown: &str,
        reference_template: Option<&Path>,
    ) -> Result<Vec<u8>, EngineError> {
        let mut input = tempfile::Builder::new().suffix(".md").tempfile()?;
        input.write_all(markdown.as_bytes())?;
        input.flush()?;

        let output: NamedTempFile = tempfile::Builder::new().suffix(".docx").tempfile()?;

        let mut args = vec![
            "--from=markdown".to_string(),
            "--to=docx".to_string(),
            "--standalone".to_string(),
            format!("--highlight-style={}", self.highlight_style),
        ];
        if let Some(template) = reference_template {
            args.push(format!("--reference-doc={}", template.display()));
        }
        args.push(format!("--output={}", output.path().display()));
        args.push(input.path().display().to_string());

        self.tool.run(&args)?;

        let bytes = fs::read(output.path())?;
        if bytes.is_empty() {
            return Err(EngineError::EmptyOutput {
                tool: self.tool.name().to_string(),
            });
        }
        debug!(
            target = "application::render::pandoc",
            op = "markdown_to_document",
            reference_template = ?reference_template,
            bytes = bytes.len(),
        );
        Ok(bytes)
    }
}
