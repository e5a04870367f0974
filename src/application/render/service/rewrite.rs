use std::collections::HashMap;

use comrak::nodes::{AstNode, NodeHtmlBlock, NodeValue};
use slug::slugify;
use syntect::parsing::SyntaxSet;

use crate::application::render::front_matter_block::escape_html;
use crate::application::render::types::EngineError;

use super::highlight;

pub(crate) const TOC_PLACEHOLDER: &str = "__MDCONV_TOC__";
const TOC_MARKER: &str = "[TOC]";

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct HeadingInfo {
    pub(crate) level: u8,
    pub(crate) slug: String,
    pub(crate) text: String,
}

#[derive(Debug, Default)]
pub(crate) struct RewriteOutcome {
    pub(crate) headings: Vec<HeadingInfo>,
    pub(crate) contains_code: bool,
    pub(crate) toc_requested: bool,
}

/// Walks the document once: escapes raw HTML from the source, highlights
/// fenced code, records headings and swaps `[TOC]` paragraphs for a
/// placeholder that is filled in after sanitisation.
pub(crate) fn rewrite_ast<'a>(
    root: &'a AstNode<'a>,
    syntax_set: &SyntaxSet,
) -> Result<RewriteOutcome, EngineError> {
    let mut walker = RewriteWalker {
        syntax_set,
        slugger: HeadingSlugger::default(),
        outcome: RewriteOutcome::default(),
    };
    walker.visit(root)?;
    Ok(walker.outcome)
}

struct RewriteWalker<'s> {
    syntax_set: &'s SyntaxSet,
    slugger: HeadingSlugger,
    outcome: RewriteOutcome,
}

impl RewriteWalker<'_> {
    fn visit<'a>(&mut self, node: &'a AstNode<'a>) -> Result<(), EngineError> {
        if escape_raw_html(node) {
            return Ok(());
        }

        if let Some(level) = heading_level(node) {
            let text = collect_inline_text(node)
                .split_whitespace()
                .collect::<Vec<_>>()
                .join(" ");
            let slug = self.slugger.anchor_for(&text);
            self.outcome.headings.push(HeadingInfo { level, slug, text });
        } else if is_toc_marker(node) {
            replace_with_html(node, format!("<div>{TOC_PLACEHOLDER}</div>"));
            self.outcome.toc_requested = true;
            return Ok(());
        } else if let Some((info, literal)) = extract_code_block(node) {
            let language = info.split_whitespace().next();
            let html = highlight::highlight_block(language, &literal, self.syntax_set)?;
            replace_with_html(node, html);
            self.outcome.contains_code = true;
            return Ok(());
        }

        let mut child = node.first_child();
        while let Some(next) = child {
            self.visit(next)?;
            child = next.next_sibling();
        }
        Ok(())
    }
}

/// Turns source-level raw HTML into text. Returns true when the node was raw HTML.
fn escape_raw_html(node: &AstNode<'_>) -> bool {
    let mut data = node.data.borrow_mut();
    let replacement = match &data.value {
        NodeValue::HtmlBlock(block) => NodeValue::HtmlBlock(NodeHtmlBlock {
            block_type: 0,
            literal: format!("<p>{}</p>\n", escape_html(block.literal.trim_end())),
        }),
        NodeValue::HtmlInline(raw) => NodeValue::Text(raw.clone().into()),
        _ => return false,
    };
    data.value = replacement;
    true
}

fn replace_with_html(node: &AstNode<'_>, html: String) {
    while let Some(child) = node.first_child() {
        child.detach();
    }
    let mut data = node.data.borrow_mut();
    data.value = NodeValue::HtmlBlock(NodeHtmlBlock {
        block_type: 0,
        literal: html,
    });
}

fn is_toc_marker(node: &AstNode<'_>) -> bool {
    if !matches!(node.data.borrow().value, NodeValue::Paragraph) {
        return false;
    }
    let mut text = String::new();
    let mut child = node.first_child();
    while let Some(next) = child {
        match &next.data.borrow().value {
            NodeValue::Text(part) => text.push_str(part),
            _ => return false,
        }
        child = next.next_sibling();
    }
    text.trim() == TOC_MARKER
}

fn heading_level(node: &AstNode<'_>) -> Option<u8> {
    match &node.data.borrow().value {
        NodeValue::Heading(heading) => Some(heading.level),
        _ => None,
    }
}

fn extract_code_block(node: &AstNode<'_>) -> Option<(String, String)> {
    match &node.data.borrow().value {
        NodeValue::CodeBlock(block) => Some((block.info.trim().to_string(), block.literal.clone())),
        _ => None,
    }
}

fn collect_inline_text(node: &AstNode<'_>) -> String {
    fn walk(node: &AstNode<'_>, buffer: &mut String) {
        match &node.data.borrow().value {
            NodeValue::Text(text) => buffer.push_str(text),
            NodeValue::Code(code) => buffer.push_str(&code.literal),
            NodeValue::LineBreak | NodeValue::SoftBreak => buffer.push(' '),
            _ => {}
        }
        let mut child = node.first_child();
        while let Some(next) = child {
            walk(next, buffer);
            child = next.next_sibling();
        }
    }

    let mut text = String::new();
    let mut child = node.first_child();
    while let Some(next) = child {
        walk(next, &mut text);
        child = next.next_sibling();
    }
    text
}

/// Unique anchors within one document: `intro`, `intro-2`, `intro-3`.
#[derive(Debug, Default)]
struct HeadingSlugger {
    occurrences: HashMap<String, usize>,
}

impl HeadingSlugger {
    fn anchor_for(&mut self, heading: &str) -> String {
        let mut base = slugify(heading);
        if base.is_empty() {
            base = "section".to_string();
        }
        let count = self.occurrences.entry(base.clone()).or_insert(0);
        *count += 1;
        if *count == 1 {
            base
        } else {
            format!("{base}-{count}")
        }
    }
}

/// Nested list of links to every heading, in document order.
pub(crate) fn build_toc(headings: &[HeadingInfo]) -> String {
    let mut html = String::from("<nav class=\"toc\">\n");
    let mut open_levels: Vec<u8> = Vec::new();

    for heading in headings {
        match open_levels.last().copied() {
            None => {
                html.push_str("<ul>\n");
                open_levels.push(heading.level);
            }
            Some(current) if heading.level > current => {
                html.push_str("\n<ul>\n");
                open_levels.push(heading.level);
            }
            Some(_) => {
                while open_levels.len() > 1
                    && open_levels.last().is_some_and(|level| heading.level < *level)
                {
                    html.push_str("</li>\n</ul>\n");
                    open_levels.pop();
                }
                html.push_str("</li>\n");
            }
        }
        html.push_str(&format!(
            "<li><a href=\"#{}\">{}</a>",
            heading.slug,
            escape_html(&heading.text)
        ));
    }

    while open_levels.pop().is_some() {
        html.push_str("</li>\n</ul>\n");
    }
    html.push_str("</nav>");
    html
}

#[cfg(test)]
mod tests {
    use super::*;
    use comrak::{Arena, format_html, parse_document};

    fn render(markdown: &str) -> (String, RewriteOutcome) {
        let options = super::super::config::default_options();
        let arena = Arena::new();
        let root = parse_document(&arena, markdown, &options);
        let syntax_set = SyntaxSet::load_defaults_newlines();
        let outcome = rewrite_ast(root, &syntax_set).expect("rewrite");
        let mut html = String::new();
        format_html(root, &options, &mut html).expect("html");
        (html, outcome)
    }

    #[test]
    fn records_unique_heading_slugs() {
        let (_, outcome) = render("# Intro\n\n## Setup *fast*\n\n# Intro\n");
        let slugs: Vec<&str> = outcome.headings.iter().map(|h| h.slug.as_str()).collect();
        assert_eq!(slugs, ["intro", "setup-fast", "intro-2"]);
        assert_eq!(outcome.headings[1].text, "Setup fast");
        assert_eq!(outcome.headings[1].level, 2);
    }

    #[test]
    fn replaces_toc_paragraph_with_placeholder() {
        let (html, outcome) = render("[TOC]\n\n# One\n");
        assert!(outcome.toc_requested);
        assert!(html.contains(&format!("<div>{TOC_PLACEHOLDER}</div>")));
        assert!(!html.contains("[TOC]"));
    }

    #[test]
    fn toc_inside_text_is_left_alone() {
        let (html, outcome) = render("See [TOC] below.\n");
        assert!(!outcome.toc_requested);
        assert!(html.contains("[TOC]"));
    }

    #[test]
    fn highlights_fenced_code() {
        let (html, outcome) = render("```python\nprint('hi')\n```\n");
        assert!(outcome.contains_code);
        assert!(html.contains("data-language=\"python\""));
        assert!(html.contains("syntax-"));
    }

    #[test]
    fn escapes_raw_html_from_source() {
        let (html, _) = render("<div onclick=\"x()\">raw</div>\n\nText with <b>inline</b> tags.\n");
        assert!(html.contains("&lt;div onclick=&quot;x()&quot;&gt;raw&lt;/div&gt;"));
        assert!(html.contains("&lt;b&gt;inline&lt;/b&gt;"));
        assert!(!html.contains("<b>"));
    }

    #[test]
    fn toc_nests_by_level() {
        let headings = vec![
            HeadingInfo {
                level: 1,
                slug: "a".into(),
                text: "A".into(),
            },
            HeadingInfo {
                level: 2,
                slug: "b".into(),
                text: "B & C".into(),
            },
            HeadingInfo {
                level: 1,
                slug: "d".into(),
                text: "D".into(),
            },
        ];
        let toc = build_toc(&headings);
        assert_eq!(
            toc,
            "<nav class=\"toc\">\n<ul>\n<li><a href=\"#a\">A</a>\n<ul>\n<li><a href=\"#b\">B &amp; C</a></li>\n</ul>\n</li>\n<li><a href=\"#d\">D</a></li>\n</ul>\n</nav>"
        );
    }
}
