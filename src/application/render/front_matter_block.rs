//! Human-readable front-matter header shared by both output targets.

use crate::domain::metadata::{MetaValue, Metadata};

pub(crate) const DEFAULT_TITLE: &str = "Untitled Document";
const RESERVED: [&str; 4] = ["title", "author", "date", "tags"];

/// Display fields in header order: title, author, date, tags, then the
/// remaining keys in document order with title-cased labels.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct FrontMatterSummary {
    pub(crate) title: String,
    pub(crate) fields: Vec<(String, String)>,
}

impl FrontMatterSummary {
    /// Returns `None` for empty metadata: no header is rendered at all.
    pub(crate) fn from_metadata(metadata: &Metadata) -> Option<Self> {
        if metadata.is_empty() {
            return None;
        }

        let title = metadata
            .get("title")
            .map(MetaValue::to_string)
            .unwrap_or_else(|| DEFAULT_TITLE.to_string());

        let mut fields = Vec::new();
        for (key, label) in [("author", "Author"), ("date", "Date"), ("tags", "Tags")] {
            if let Some(value) = metadata.get(key) {
                fields.push((label.to_string(), value.to_string()));
            }
        }
        for (key, value) in metadata.iter() {
            if !RESERVED.contains(&key) {
                fields.push((title_case(&key.replace('_', " ")), value.to_string()));
            }
        }

        Some(Self { title, fields })
    }

    /// Markdown block prepended to the structured-document source.
    pub(crate) fn to_markdown(&self) -> String {
        let mut lines = Vec::with_capacity(self.fields.len() + 2);
        lines.push(format!("# {}\n", self.title));
        for (label, value) in &self.fields {
            // Two trailing spaces force a hard line break.
            lines.push(format!("**{label}:** {value}  "));
        }
        lines.push("\n---\n".to_string());
        lines.join("\n")
    }

    /// Bordered info panel placed above the PDF body. Values are escaped.
    pub(crate) fn to_html_panel(&self) -> String {
        let mut html = String::from("<div class=\"front-matter\">\n");
        html.push_str("<h1 class=\"front-matter-title\">");
        html.push_str(&escape_html(&self.title));
        html.push_str("</h1>\n");
        for (label, value) in &self.fields {
            html.push_str("<p><strong>");
            html.push_str(&escape_html(label));
            html.push_str(":</strong> ");
            html.push_str(&escape_html(value));
            html.push_str("</p>\n");
        }
        html.push_str("</div>\n");
        html
    }
}

pub(crate) fn escape_html(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for ch in value.chars() {
        match ch {
            '&' => escaped.push_str("&amp;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            _ => escaped.push(ch),
        }
    }
    escaped
}

/// Upper-cases the first letter of every alphabetic run and lower-cases the rest.
fn title_case(text: &str) -> String {
    let mut output = String::with_capacity(text.len());
    let mut previous_alpha = false;
    for ch in text.chars() {
        if ch.is_alphabetic() {
            if previous_alpha {
                output.extend(ch.to_lowercase());
            } else {
                output.extend(ch.to_uppercase());
            }
            previous_alpha = true;
        } else {
            output.push(ch);
            previous_alpha = false;
        }
    }
    output
}

#[cfg(test)]
mod tests {
    use super::*;

    fn metadata(entries: &[(&str, MetaValue)]) -> Metadata {
        entries.iter().cloned().collect()
    }

    #[test]
    fn markdown_block_orders_reserved_fields_first() {
        let meta = metadata(&[
            ("project_code", MetaValue::from("X-1")),
            ("tags", MetaValue::List(vec!["a".into(), "b".into()])),
            ("author", MetaValue::from("Jane")),
            ("title", MetaValue::from("Report")),
            ("date", MetaValue::from("2024-05-01")),
        ]);
        let summary = FrontMatterSummary::from_metadata(&meta).unwrap();

        assert_eq!(
            summary.to_markdown(),
            "# Report\n\n**Author:** Jane  \n**Date:** 2024-05-01  \n**Tags:** a, b  \n**Project Code:** X-1  \n\n---\n"
        );
    }

    #[test]
    fn missing_title_uses_default() {
        let meta = metadata(&[("author", MetaValue::from("Jane"))]);
        let summary = FrontMatterSummary::from_metadata(&meta).unwrap();
        assert_eq!(summary.title, DEFAULT_TITLE);
    }

    #[test]
    fn empty_metadata_renders_nothing() {
        assert!(FrontMatterSummary::from_metadata(&Metadata::new()).is_none());
    }

    #[test]
    fn html_panel_escapes_values() {
        let meta = metadata(&[
            ("title", MetaValue::from("A & B")),
            ("reviewer", MetaValue::from("\"quoted\" 1 < 2")),
        ]);
        let panel = FrontMatterSummary::from_metadata(&meta)
            .unwrap()
            .to_html_panel();

        insta::assert_snapshot!(panel, @r#"
        <div class="front-matter">
        <h1 class="front-matter-title">A &amp; B</h1>
        <p><strong>Reviewer:</strong> &quot;quoted&quot; 1 &lt; 2</p>
        </div>
        "#);
    }

    #[test]
    fn title_case_matches_label_rules() {
        assert_eq!(title_case("project code"), "Project Code");
        assert_eq!(title_case("mIXED cASE"), "Mixed Case");
        assert_eq!(title_case("2nd draft-v2"), "2Nd Draft-V2");
    }
}
