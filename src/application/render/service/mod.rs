mod config;
mod highlight;
mod pandoc;
mod process;
mod rewrite;
mod weasyprint;

use std::{cell::RefCell, rc::Rc, time::Instant};

use comrak::{Arena, format_html, nodes::AstNode, parse_document};
use lol_html::{RewriteStrSettings, element, rewrite_str};
use syntect::parsing::SyntaxSet;
use tracing::{debug, warn};

use crate::application::render::types::{EngineError, HtmlEngine};

use config::{build_sanitizer, default_options};
use rewrite::{HeadingInfo, RewriteOutcome, TOC_PLACEHOLDER, build_toc, rewrite_ast};

pub use pandoc::PandocEngine;
pub use process::{ExternalTool, ToolProbe};
pub use weasyprint::WeasyPrintEngine;

/// In-process Markdown to HTML: comrak parsing, syntect highlighting,
/// ammonia sanitisation, then heading anchors and the table of contents.
pub struct ComrakHtmlEngine {
    options: comrak::Options<'static>,
    syntax_set: SyntaxSet,
    sanitizer: ammonia::Builder<'static>,
    code_theme: String,
}

impl ComrakHtmlEngine {
    pub fn new(code_theme: impl Into<String>) -> Self {
        Self {
            options: default_options(),
            syntax_set: SyntaxSet::load_defaults_newlines(),
            sanitizer: build_sanitizer(),
            code_theme: code_theme.into(),
        }
    }
}

impl Default for ComrakHtmlEngine {
    fn default() -> Self {
        Self::new("InspiredGitHub")
    }
}

impl HtmlEngine for ComrakHtmlEngine {
    fn markdown_to_html(&self, markdown: &str) -> Result<String, EngineError> {
        let started_at = Instant::now();
        let arena = Arena::new();
        let root = parse_document(&arena, markdown, &self.options);

        let outcome = rewrite_stage(root, &self.syntax_set)?;
        let rendered = render_html_stage(root, &self.options)?;
        let sanitized = self.sanitizer.clean(&rendered).to_string();
        let anchored = anchor_stage(&sanitized, &outcome.headings)?;
        let html = restore_stage(anchored, &outcome);

        debug!(
            target = "application::render::html",
            op = "markdown_to_html",
            elapsed_ms = started_at.elapsed().as_millis() as u64,
            headings = outcome.headings.len(),
            contains_code = outcome.contains_code,
            toc = outcome.toc_requested,
            html_bytes = html.len(),
        );
        Ok(html)
    }

    fn fragment_css(&self) -> String {
        highlight::theme_css(&self.code_theme)
    }
}

fn rewrite_stage<'a>(
    root: &'a AstNode<'a>,
    syntax_set: &SyntaxSet,
) -> Result<RewriteOutcome, EngineError> {
    rewrite_ast(root, syntax_set)
}

fn render_html_stage<'a>(
    root: &'a AstNode<'a>,
    options: &comrak::Options<'static>,
) -> Result<String, EngineError> {
    let mut html = String::new();
    format_html(root, options, &mut html).map_err(|err| EngineError::Markdown {
        message: err.to_string(),
    })?;
    Ok(html)
}

/// Assigns each rendered heading the anchor recorded during the rewrite,
/// matching them up in document order.
fn anchor_stage(html: &str, headings: &[HeadingInfo]) -> Result<String, EngineError> {
    let shared = Rc::new(headings.to_vec());
    let index = Rc::new(RefCell::new(0usize));

    let rewritten = rewrite_str(
        html,
        RewriteStrSettings {
            element_content_handlers: vec![element!("h1, h2, h3, h4, h5, h6", {
                let shared = Rc::clone(&shared);
                let index = Rc::clone(&index);
                move |el| {
                    let mut idx = index.borrow_mut();
                    let Some(info) = shared.get(*idx) else {
                        return Ok(());
                    };
                    *idx += 1;

                    let level = el
                        .tag_name()
                        .strip_prefix('h')
                        .and_then(|value| value.parse::<u8>().ok());
                    if level == Some(info.level) {
                        el.set_attribute("id", &info.slug)?;
                    } else {
                        warn!(
                            target = "application::render::html",
                            op = "anchor_headings",
                            expected = info.level,
                            found = %el.tag_name(),
                            "heading order mismatch; anchor skipped"
                        );
                    }
                    Ok(())
                }
            })],
            ..RewriteStrSettings::default()
        },
    )
    .map_err(|err| EngineError::Markdown {
        message: err.to_string(),
    })?;

    Ok(rewritten)
}

fn restore_stage(html: String, outcome: &RewriteOutcome) -> String {
    if !outcome.toc_requested {
        return html;
    }
    let placeholder = format!("<div>{TOC_PLACEHOLDER}</div>");
    html.replace(&placeholder, &build_toc(&outcome.headings))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn renders_tables_breaks_and_anchors() {
        let engine = ComrakHtmlEngine::default();
        let html = engine
            .markdown_to_html("# Title\n\nline one\nline two\n\n| a | b |\n|---|---|\n| 1 | 2 |\n")
            .unwrap();

        assert!(html.contains("<h1 id=\"title\">Title</h1>"));
        assert!(html.contains("line one<br"));
        assert!(html.contains("<table>"));
    }

    #[test]
    fn fills_table_of_contents() {
        let engine = ComrakHtmlEngine::default();
        let html = engine
            .markdown_to_html("[TOC]\n\n# Alpha\n\n## Beta\n")
            .unwrap();

        assert!(html.contains("<nav class=\"toc\">"));
        assert!(html.contains("<a href=\"#alpha\">Alpha</a>"));
        assert!(html.contains("<a href=\"#beta\">Beta</a>"));
        assert!(html.contains("<h2 id=\"beta\">Beta</h2>"));
        assert!(!html.contains(TOC_PLACEHOLDER));
    }

    #[test]
    fn strips_script_links() {
        let engine = ComrakHtmlEngine::default();
        let html = engine
            .markdown_to_html("[click](javascript:alert(1))\n")
            .unwrap();
        assert!(!html.contains("javascript:"));
    }

    #[test]
    fn exposes_theme_css() {
        let engine = ComrakHtmlEngine::new("base16-ocean.dark");
        assert!(engine.fragment_css().contains(".syntax-"));
    }
}
