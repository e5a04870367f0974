use std::collections::HashSet;

use ammonia::Builder as AmmoniaBuilder;
use comrak::options::{ListStyleType, Options};

/// Markdown extensions for the print path: tables, fenced code, footnotes,
/// definition lists, task lists, and newline-to-break.
pub(crate) fn default_options() -> Options<'static> {
    let mut options = Options::default();
    configure_extensions(&mut options);
    options
}

pub(crate) fn build_sanitizer() -> AmmoniaBuilder<'static> {
    let mut builder = AmmoniaBuilder::default();

    let tags: HashSet<&'static str> = HashSet::from([
        "a",
        "abbr",
        "blockquote",
        "br",
        "code",
        "dd",
        "del",
        "div",
        "dl",
        "dt",
        "em",
        "h1",
        "h2",
        "h3",
        "h4",
        "h5",
        "h6",
        "hr",
        "img",
        "input",
        "li",
        "nav",
        "ol",
        "p",
        "pre",
        "section",
        "span",
        "strong",
        "sub",
        "sup",
        "table",
        "tbody",
        "td",
        "th",
        "thead",
        "tr",
        "ul",
    ]);
    builder.tags(tags);

    let generic: HashSet<&'static str> = HashSet::from([
        "class",
        "id",
        "title",
        "lang",
        "dir",
        "data-footnote-ref",
        "data-footnotes",
        "data-footnote-backref",
    ]);
    builder.generic_attributes(generic);

    builder.add_tag_attributes("img", &["alt", "width", "height"]);
    builder.add_tag_attributes("code", &["data-language", "data-meta"]);
    builder.add_tag_attributes("pre", &["data-language"]);
    builder.add_tag_attributes("th", &["align", "colspan", "rowspan"]);
    builder.add_tag_attributes("td", &["align", "colspan", "rowspan"]);
    builder.add_tag_attributes("input", &["type", "checked", "disabled"]);

    builder.add_url_schemes(["http", "https", "mailto", "tel", "data"].iter().copied());

    builder
}

fn configure_extensions(options: &mut Options<'static>) {
    let ext = &mut options.extension;
    ext.strikethrough = true;
    ext.table = true;
    ext.autolink = true;
    ext.tasklist = true;
    ext.footnotes = true;
    ext.description_lists = true;

    let render = &mut options.render;
    render.hardbreaks = true;
    render.github_pre_lang = true;
    render.full_info_string = true;
    render.list_style = ListStyleType::Dash;
    // Raw HTML from the source is escaped during the rewrite pass; only
    // blocks generated by the pipeline reach the output as HTML.
    render.r#unsafe = true;
    render.sourcepos = false;
}

#[cfg(test)]
mod tests {
    use super::build_sanitizer;

    #[test]
    fn sanitizer_drops_scripts_and_handlers() {
        let html = build_sanitizer()
            .clean("<p onclick=\"x()\">Hi<script>alert(1)</script></p>")
            .to_string();
        assert_eq!(html, "<p>Hi</p>");
    }

    #[test]
    fn sanitizer_keeps_fragment_links_and_ids() {
        let html = build_sanitizer()
            .clean("<h2 id=\"intro\">Intro</h2><a href=\"#intro\">Intro</a>")
            .to_string();
        assert!(html.contains("<h2 id=\"intro\">"));
        assert!(html.contains("href=\"#intro\""));
    }

    #[test]
    fn sanitizer_rejects_javascript_links() {
        let html = build_sanitizer()
            .clean("<a href=\"javascript:alert(1)\">x</a>")
            .to_string();
        assert!(!html.contains("javascript"));
    }
}
